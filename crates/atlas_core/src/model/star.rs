//! Star domain model.
//!
//! # Responsibility
//! - Define one diary day's point in the atlas.
//! - Own the date-key <-> star-id derivation.
//!
//! # Invariants
//! - `id == "star-" + date` for every star created through merge.
//! - `date` is a `YYYY-MM-DD` calendar date.
//! - `keywords` keep caller order and are not deduplicated.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Prefix shared by every star id.
pub const STAR_ID_PREFIX: &str = "star-";

/// `chrono` format of a date key.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

static DATE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date key regex"));

/// Stable star identifier (`star-YYYY-MM-DD`).
pub type StarId = String;

/// Validation errors for star identity inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StarValidationError {
    /// Date key is not a `YYYY-MM-DD` calendar date.
    InvalidDate(String),
}

impl Display for StarValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate(value) => {
                write!(f, "invalid date key `{value}`; expected YYYY-MM-DD")
            }
        }
    }
}

impl Error for StarValidationError {}

/// 2D point on the 0..100 atlas canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One calendar day's point in the atlas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub id: StarId,
    pub date: String,
    /// Serialized flat as `x` / `y`.
    #[serde(flatten)]
    pub position: Point,
    pub size: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Star {
    /// Creates a star for `date`, deriving its id.
    ///
    /// # Errors
    /// - Returns `InvalidDate` when `date` is not a calendar date key.
    pub fn new(
        date: &str,
        position: Point,
        size: f64,
        keywords: Vec<String>,
    ) -> Result<Self, StarValidationError> {
        let date = normalize_date_key(date)?;
        Ok(Self {
            id: star_id_for_date(&date),
            date,
            position,
            size,
            keywords,
        })
    }

    /// Distance between the stored positions of two stars.
    pub fn distance_to(&self, other: &Star) -> f64 {
        self.position.distance_to(&other.position)
    }
}

/// Returns `star-<date>`.
pub fn star_id_for_date(date: &str) -> StarId {
    format!("{STAR_ID_PREFIX}{date}")
}

/// Extracts the date key from a star id, if it carries the star prefix.
pub fn date_from_star_id(star_id: &str) -> Option<&str> {
    star_id
        .strip_prefix(STAR_ID_PREFIX)
        .filter(|date| is_valid_date_key(date))
}

/// Parses a zero-padded `YYYY-MM-DD` key into a calendar date.
///
/// Returns `None` for other shapes and for days that do not exist
/// (`2023-02-29`, `2024-04-31`).
pub fn parse_date_key(value: &str) -> Option<NaiveDate> {
    if !DATE_KEY_RE.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_KEY_FORMAT).ok()
}

/// Returns whether `value` names a real calendar day as `YYYY-MM-DD`.
pub fn is_valid_date_key(value: &str) -> bool {
    parse_date_key(value).is_some()
}

/// Formats a calendar date as a date key.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Trims and validates a date key.
pub fn normalize_date_key(value: &str) -> Result<String, StarValidationError> {
    let trimmed = value.trim();
    if !is_valid_date_key(trimmed) {
        return Err(StarValidationError::InvalidDate(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}
