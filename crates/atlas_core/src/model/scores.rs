//! Seven-dimension mood score vector.
//!
//! # Responsibility
//! - Define the per-day score vector produced by the external analysis step.
//! - Parse persisted/collaborator payloads leniently into strict values.
//!
//! # Invariants
//! - `sanitized()` always yields finite values within `0..=100`.
//! - Non-finite or non-numeric inputs degrade to the neutral midpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// Lower bound of the conventional score range.
pub const SCORE_MIN: f64 = 0.0;
/// Upper bound of the conventional score range.
pub const SCORE_MAX: f64 = 100.0;
/// Neutral value substituted for non-finite or missing scores.
pub const SCORE_NEUTRAL: f64 = 50.0;

/// One axis of the mood vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoodDimension {
    SelfAwareness,
    Resilience,
    Empathy,
    SelfDirection,
    MeaningOrientation,
    Openness,
    SelfAcceptance,
}

impl MoodDimension {
    /// All dimensions in canonical wire order.
    pub const ALL: [MoodDimension; 7] = [
        Self::SelfAwareness,
        Self::Resilience,
        Self::Empathy,
        Self::SelfDirection,
        Self::MeaningOrientation,
        Self::Openness,
        Self::SelfAcceptance,
    ];

    /// Stable wire key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfAwareness => "selfAwareness",
            Self::Resilience => "resilience",
            Self::Empathy => "empathy",
            Self::SelfDirection => "selfDirection",
            Self::MeaningOrientation => "meaningOrientation",
            Self::Openness => "openness",
            Self::SelfAcceptance => "selfAcceptance",
        }
    }
}

/// Per-day mood vector. Each value is conventionally within `0..=100`.
///
/// Deserialization never fails on individual fields: absent, `null`,
/// non-numeric and non-finite values all become [`SCORE_NEUTRAL`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodScores {
    #[serde(default = "neutral", deserialize_with = "lenient_score")]
    pub self_awareness: f64,
    #[serde(default = "neutral", deserialize_with = "lenient_score")]
    pub resilience: f64,
    #[serde(default = "neutral", deserialize_with = "lenient_score")]
    pub empathy: f64,
    #[serde(default = "neutral", deserialize_with = "lenient_score")]
    pub self_direction: f64,
    #[serde(default = "neutral", deserialize_with = "lenient_score")]
    pub meaning_orientation: f64,
    #[serde(default = "neutral", deserialize_with = "lenient_score")]
    pub openness: f64,
    #[serde(default = "neutral", deserialize_with = "lenient_score")]
    pub self_acceptance: f64,
}

impl Default for MoodScores {
    fn default() -> Self {
        Self::uniform(SCORE_NEUTRAL)
    }
}

impl MoodScores {
    /// Builds a vector with every dimension set to `value`.
    pub fn uniform(value: f64) -> Self {
        Self {
            self_awareness: value,
            resilience: value,
            empathy: value,
            self_direction: value,
            meaning_orientation: value,
            openness: value,
            self_acceptance: value,
        }
    }

    /// Returns the raw value of one dimension.
    pub fn get(&self, dimension: MoodDimension) -> f64 {
        match dimension {
            MoodDimension::SelfAwareness => self.self_awareness,
            MoodDimension::Resilience => self.resilience,
            MoodDimension::Empathy => self.empathy,
            MoodDimension::SelfDirection => self.self_direction,
            MoodDimension::MeaningOrientation => self.meaning_orientation,
            MoodDimension::Openness => self.openness,
            MoodDimension::SelfAcceptance => self.self_acceptance,
        }
    }

    /// Sets the raw value of one dimension.
    pub fn set(&mut self, dimension: MoodDimension, value: f64) {
        let slot = match dimension {
            MoodDimension::SelfAwareness => &mut self.self_awareness,
            MoodDimension::Resilience => &mut self.resilience,
            MoodDimension::Empathy => &mut self.empathy,
            MoodDimension::SelfDirection => &mut self.self_direction,
            MoodDimension::MeaningOrientation => &mut self.meaning_orientation,
            MoodDimension::Openness => &mut self.openness,
            MoodDimension::SelfAcceptance => &mut self.self_acceptance,
        };
        *slot = value;
    }

    /// Returns a copy with every dimension passed through [`sanitize_score`].
    pub fn sanitized(&self) -> Self {
        let mut out = *self;
        for dimension in MoodDimension::ALL {
            out.set(dimension, sanitize_score(self.get(dimension)));
        }
        out
    }

    /// Unweighted mean of all seven (sanitized) dimensions.
    pub fn mean(&self) -> f64 {
        let clean = self.sanitized();
        let sum: f64 = MoodDimension::ALL.iter().map(|d| clean.get(*d)).sum();
        sum / MoodDimension::ALL.len() as f64
    }

    /// Euclidean distance between two (sanitized) vectors.
    pub fn distance_to(&self, other: &MoodScores) -> f64 {
        let a = self.sanitized();
        let b = other.sanitized();
        MoodDimension::ALL
            .iter()
            .map(|d| (a.get(*d) - b.get(*d)).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Maps a raw score into `SCORE_MIN..=SCORE_MAX`; non-finite becomes neutral.
pub fn sanitize_score(value: f64) -> f64 {
    if !value.is_finite() {
        return SCORE_NEUTRAL;
    }
    value.clamp(SCORE_MIN, SCORE_MAX)
}

fn neutral() -> f64 {
    SCORE_NEUTRAL
}

fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match value {
        serde_json::Value::Number(number) => number.as_f64().unwrap_or(SCORE_NEUTRAL),
        serde_json::Value::String(text) => text.trim().parse::<f64>().unwrap_or(SCORE_NEUTRAL),
        _ => SCORE_NEUTRAL,
    };
    Ok(if parsed.is_finite() {
        parsed
    } else {
        SCORE_NEUTRAL
    })
}
