//! Mood-vector to canvas projection.
//!
//! # Responsibility
//! - Map a 7-dimension score vector onto the 2D atlas canvas.
//! - Derive a bounded visual size from content length and scores.
//! - Provide a deterministic position for days without analysis.
//!
//! # Invariants
//! - Output coordinates are always within `view_min..=view_max`.
//! - Output sizes are always within `size_min()..=size_max()`.
//! - Never panics on malformed input; bad values degrade to neutral.

use crate::config::ProjectorConfig;
use crate::model::scores::{sanitize_score, MoodDimension, MoodScores, SCORE_MAX, SCORE_NEUTRAL};
use crate::model::star::Point;

/// Dimensions averaged into the horizontal axis.
pub const AXIS_X_DIMENSIONS: [MoodDimension; 3] = [
    MoodDimension::SelfAwareness,
    MoodDimension::Openness,
    MoodDimension::MeaningOrientation,
];

/// Dimensions averaged into the vertical axis.
pub const AXIS_Y_DIMENSIONS: [MoodDimension; 3] = [
    MoodDimension::SelfAcceptance,
    MoodDimension::Resilience,
    MoodDimension::Empathy,
];

/// Dimensions that add visual weight to a star.
pub const SIZE_DIMENSIONS: [MoodDimension; 2] =
    [MoodDimension::SelfAcceptance, MoodDimension::Resilience];

const SIZE_SCORE_OFFSET: f64 = 2.0;
const SIZE_SCORE_DIVISOR: f64 = 25.0;

/// Projected canvas point and visual weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub position: Point,
    pub size: f64,
}

/// Stateless projector bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct Projector {
    config: ProjectorConfig,
}

impl Projector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Projects a score vector and optional content length.
    pub fn project(&self, scores: &MoodScores, content_length: Option<usize>) -> Projection {
        let clean = scores.sanitized();
        let x = self.to_view(axis_mean(&clean, &AXIS_X_DIMENSIONS));
        let y = self.to_view(axis_mean(&clean, &AXIS_Y_DIMENSIONS));

        let weight: f64 = SIZE_DIMENSIONS.iter().map(|d| clean.get(*d)).sum();
        let base = SIZE_SCORE_OFFSET + weight / SIZE_SCORE_DIVISOR;
        let size = (base * self.content_scale(content_length))
            .clamp(self.config.base_size_min, self.config.base_size_max)
            * self.config.size_gain;

        Projection {
            position: Point::new(x, y),
            size: self.clamp_size(size),
        }
    }

    /// Projects scores when present, otherwise falls back to the date hash.
    pub fn project_or_fallback(
        &self,
        scores: Option<&MoodScores>,
        date: &str,
        content_length: Option<usize>,
    ) -> Projection {
        match scores {
            Some(scores) => self.project(scores, content_length),
            None => self.fallback_for_date(date, content_length),
        }
    }

    /// Deterministic projection for a day that has no score vector.
    ///
    /// The synthetic vector is seeded by the sum of the date's character codes
    /// and keeps every dimension in a mid band, so unanalyzed days land near,
    /// but not on, the canvas center. Dates that are digit permutations of
    /// each other share a seed.
    pub fn fallback_for_date(&self, date: &str, content_length: Option<usize>) -> Projection {
        let n: u64 = date.chars().map(|c| u64::from(u32::from(c))).sum();
        let band = |base: u64, factor: u64, span: u64| (base + (n * factor) % span) as f64;
        let scores = MoodScores {
            self_awareness: band(40, 1, 35),
            resilience: band(45, 7, 30),
            empathy: band(50, 13, 25),
            self_direction: band(40, 11, 35),
            meaning_orientation: band(55, 3, 30),
            openness: band(50, 17, 25),
            self_acceptance: band(45, 19, 30),
        };
        self.project(&scores, content_length)
    }

    /// Size used by merge when only the content length is known.
    pub fn merge_size(&self, content_length: Option<usize>) -> f64 {
        self.clamp_size(self.config.merge_base_size * self.content_scale(content_length))
    }

    /// Saturating scale factor in `1.0..=content_scale_cap`.
    pub fn content_scale(&self, content_length: Option<usize>) -> f64 {
        let length = content_length.unwrap_or(0) as f64;
        (1.0 + length / self.config.content_length_unit).min(self.config.content_scale_cap)
    }

    /// Pulls an arbitrary point into the display range.
    ///
    /// Non-finite coordinates become the range center.
    pub fn clamp_point(&self, point: Point) -> Point {
        Point::new(self.clamp_axis(point.x), self.clamp_axis(point.y))
    }

    /// Pulls an arbitrary size into the size bounds.
    pub fn clamp_size(&self, size: f64) -> f64 {
        if !size.is_finite() {
            return self.merge_size(None);
        }
        size.clamp(self.config.size_min(), self.config.size_max())
    }

    fn clamp_axis(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.config.view_center();
        }
        value.clamp(self.config.view_min, self.config.view_max)
    }

    fn to_view(&self, raw: f64) -> f64 {
        let pct = sanitize_score(raw);
        let range = self.config.view_max - self.config.view_min;
        self.config.view_min + (pct / SCORE_MAX) * range
    }
}

fn axis_mean(scores: &MoodScores, dimensions: &[MoodDimension]) -> f64 {
    if dimensions.is_empty() {
        return SCORE_NEUTRAL;
    }
    let sum: f64 = dimensions.iter().map(|d| scores.get(*d)).sum();
    sum / dimensions.len() as f64
}
