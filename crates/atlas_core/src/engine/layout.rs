//! Display-time layout normalization.
//!
//! # Responsibility
//! - Rescale stored positions into the padded viewport.
//! - Push overlapping points apart so every star stays clickable.
//!
//! # Invariants
//! - Pure: input slices are never mutated and output is never persisted.
//! - Output is in input order and independent of it: pairs are processed in
//!   `(id, x, y)` order.
//! - Every output coordinate lies within `inner_min()..=inner_max()`.

use crate::config::LayoutConfig;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f64::consts::TAU;

/// Fraction of a full turn between successive coincident-pair directions.
const GOLDEN_TURN: f64 = 0.381_966_011_250_105_1;
/// Distances below this are treated as coincident.
const COINCIDENT_EPSILON: f64 = 1e-9;

/// One display point keyed by star id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPoint {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl LayoutPoint {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
        }
    }

    pub fn distance_to(&self, other: &LayoutPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Returns transient display coordinates for `points`.
///
/// Empty input returns empty output. Repulsion runs until a pass moves no
/// pair, at most `iterations` times, so minimum separation holds whenever
/// the point set fits inside the viewport within that budget.
pub fn normalize_for_display(points: &[LayoutPoint], config: &LayoutConfig) -> Vec<LayoutPoint> {
    if points.is_empty() {
        return Vec::new();
    }

    let center = config.viewport / 2.0;
    let mut order = (0..points.len()).collect::<Vec<_>>();
    order.sort_by(|a, b| compare_points(&points[*a], &points[*b]));

    let mut coords = order
        .iter()
        .map(|index| {
            let point = &points[*index];
            (finite_or(point.x, center), finite_or(point.y, center))
        })
        .collect::<Vec<_>>();

    fit_to_viewport(&mut coords, config);
    separate(&mut coords, config);

    let mut output = points.to_vec();
    for (slot, index) in order.into_iter().enumerate() {
        let (x, y) = coords[slot];
        output[index].x = x;
        output[index].y = y;
    }
    output
}

fn compare_points(a: &LayoutPoint, b: &LayoutPoint) -> Ordering {
    a.id.cmp(&b.id)
        .then_with(|| a.x.total_cmp(&b.x))
        .then_with(|| a.y.total_cmp(&b.y))
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn fit_to_viewport(coords: &mut [(f64, f64)], config: &LayoutConfig) {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in coords.iter() {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }

    let span = (max_x - min_x).max(max_y - min_y);
    let inner = config.inner_max() - config.inner_min();
    let scale = if span > COINCIDENT_EPSILON {
        (inner / span).min(config.max_zoom)
    } else {
        1.0
    };
    let (mid_x, mid_y) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
    let center = config.viewport / 2.0;

    for (x, y) in coords.iter_mut() {
        *x = center + (*x - mid_x) * scale;
        *y = center + (*y - mid_y) * scale;
    }
    clamp_all(coords, config);
}

fn separate(coords: &mut [(f64, f64)], config: &LayoutConfig) {
    let n = coords.len();
    for _ in 0..config.iterations {
        let mut moved = false;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = coords[j].0 - coords[i].0;
                let dy = coords[j].1 - coords[i].1;
                let distance = dx.hypot(dy);
                if distance >= config.min_separation - COINCIDENT_EPSILON {
                    continue;
                }

                let (ux, uy) = if distance > COINCIDENT_EPSILON {
                    (dx / distance, dy / distance)
                } else {
                    pair_direction(i, j, n)
                };
                let push = (config.min_separation - distance) / 2.0;
                coords[i].0 -= ux * push;
                coords[i].1 -= uy * push;
                coords[j].0 += ux * push;
                coords[j].1 += uy * push;
                moved = true;
            }
        }
        clamp_all(coords, config);
        if !moved {
            break;
        }
    }
}

// Unit vector for a coincident pair, spread by golden-angle steps over the
// pair's index so stacked points fan out instead of sliding along one line.
fn pair_direction(i: usize, j: usize, n: usize) -> (f64, f64) {
    let step = (i * n + j) as f64;
    let angle = TAU * (step * GOLDEN_TURN).fract();
    (angle.cos(), angle.sin())
}

fn clamp_all(coords: &mut [(f64, f64)], config: &LayoutConfig) {
    let (low, high) = (config.inner_min(), config.inner_max());
    for (x, y) in coords.iter_mut() {
        *x = x.clamp(low, high);
        *y = y.clamp(low, high);
    }
}
