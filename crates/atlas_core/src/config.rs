//! Tunable engine parameters.
//!
//! # Responsibility
//! - Hold every threshold and viewport constant the engine uses.
//! - Load partial JSON documents, defaulting absent fields.
//!
//! # Invariants
//! - One `cluster.threshold` value drives both clustering and every
//!   downstream "visually close" check.
//! - `validate()` must pass before a config reaches engine code.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Configuration load/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Score-to-canvas projection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Display coordinate for raw score 0.
    pub view_min: f64,
    /// Display coordinate for raw score 100.
    pub view_max: f64,
    /// Clamp floor for the pre-gain size.
    pub base_size_min: f64,
    /// Clamp ceiling for the pre-gain size.
    pub base_size_max: f64,
    /// Multiplier applied after clamping; final bounds are `base_* * gain`.
    pub size_gain: f64,
    /// Smallest rendered size, raising the lower bound above `base_size_min * gain`.
    pub size_floor: f64,
    /// Characters per +1.0 of content scale.
    pub content_length_unit: f64,
    /// Saturation cap of the content scale.
    pub content_scale_cap: f64,
    /// Base size used by merge when only content length is known.
    pub merge_base_size: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            view_min: 10.0,
            view_max: 90.0,
            base_size_min: 2.0,
            base_size_max: 4.0,
            size_gain: 1.5,
            size_floor: 4.0,
            content_length_unit: 400.0,
            content_scale_cap: 2.0,
            merge_base_size: 3.0,
        }
    }
}

impl ProjectorConfig {
    /// Smallest size a star can have.
    ///
    /// Never exceeds `size_max()`, even for an unvalidated config.
    pub fn size_min(&self) -> f64 {
        (self.base_size_min * self.size_gain)
            .max(self.size_floor)
            .min(self.size_max())
    }

    /// Largest size a star can have.
    pub fn size_max(&self) -> f64 {
        self.base_size_max * self.size_gain
    }

    /// Center of the display range.
    pub fn view_center(&self) -> f64 {
        (self.view_min + self.view_max) / 2.0
    }
}

/// Clustering and edge synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Pairs strictly closer than this (canvas units) share a cluster.
    pub threshold: f64,
    /// Nearest neighbours each star connects to inside its cluster.
    pub fan_out: usize,
    /// Also derive edges between stars sharing a keyword.
    pub link_shared_keywords: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: 28.0,
            fan_out: 2,
            link_shared_keywords: false,
        }
    }
}

/// Display-only layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Side length of the square viewport.
    pub viewport: f64,
    /// Margin kept free on every side.
    pub padding: f64,
    /// Upper bound of the bounding-box scale factor.
    pub max_zoom: f64,
    /// Smallest allowed distance between two display points.
    pub min_separation: f64,
    /// Upper bound on repulsion passes; a pass that moves nothing ends the loop.
    pub iterations: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            viewport: 100.0,
            padding: 10.0,
            max_zoom: 2.5,
            min_separation: 6.0,
            iterations: 256,
        }
    }
}

impl LayoutConfig {
    pub fn inner_min(&self) -> f64 {
        self.padding
    }

    pub fn inner_max(&self) -> f64 {
        self.viewport - self.padding
    }
}

/// Host-side visibility defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Days kept visible by the recent-window filter.
    pub recent_window_days: u32,
    /// Recent members a constellation needs to graduate.
    pub graduation_min_stars: usize,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            recent_window_days: 7,
            graduation_min_stars: 3,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub projector: ProjectorConfig,
    pub cluster: ClusterConfig,
    pub layout: LayoutConfig,
    pub visibility: VisibilityConfig,
}

impl AtlasConfig {
    /// Parses a (possibly partial) JSON document and validates it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Rejects non-finite values and inverted ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.projector;
        ensure_finite("projector.view_min", p.view_min)?;
        ensure_finite("projector.view_max", p.view_max)?;
        if p.view_min >= p.view_max {
            return Err(ConfigError::Invalid(format!(
                "projector.view_min ({}) must be < view_max ({})",
                p.view_min, p.view_max
            )));
        }
        ensure_positive("projector.base_size_min", p.base_size_min)?;
        ensure_positive("projector.size_gain", p.size_gain)?;
        ensure_positive("projector.content_length_unit", p.content_length_unit)?;
        ensure_positive("projector.merge_base_size", p.merge_base_size)?;
        ensure_finite("projector.base_size_max", p.base_size_max)?;
        if p.base_size_min > p.base_size_max {
            return Err(ConfigError::Invalid(format!(
                "projector.base_size_min ({}) must be <= base_size_max ({})",
                p.base_size_min, p.base_size_max
            )));
        }
        ensure_finite("projector.size_floor", p.size_floor)?;
        if p.size_floor > p.size_max() {
            return Err(ConfigError::Invalid(format!(
                "projector.size_floor ({}) must be <= base_size_max * size_gain ({})",
                p.size_floor,
                p.size_max()
            )));
        }
        ensure_finite("projector.content_scale_cap", p.content_scale_cap)?;
        if p.content_scale_cap < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "projector.content_scale_cap must be >= 1, got {}",
                p.content_scale_cap
            )));
        }

        ensure_positive("cluster.threshold", self.cluster.threshold)?;

        let l = &self.layout;
        ensure_positive("layout.viewport", l.viewport)?;
        ensure_finite("layout.padding", l.padding)?;
        if l.padding < 0.0 || l.padding * 2.0 >= l.viewport {
            return Err(ConfigError::Invalid(format!(
                "layout.padding ({}) must be >= 0 and leave room inside viewport ({})",
                l.padding, l.viewport
            )));
        }
        ensure_positive("layout.max_zoom", l.max_zoom)?;
        ensure_finite("layout.min_separation", l.min_separation)?;
        if l.min_separation < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "layout.min_separation must be >= 0, got {}",
                l.min_separation
            )));
        }
        Ok(())
    }
}

fn ensure_finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::Invalid(format!(
            "{field} must be finite, got {value}"
        )));
    }
    Ok(())
}

fn ensure_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    ensure_finite(field, value)?;
    if value <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{field} must be > 0, got {value}"
        )));
    }
    Ok(())
}
