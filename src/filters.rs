//! Filter primitives
//!
//! Outlier-gated median filters for scalar angles and 3D points, plus the
//! wrap-aware angular difference every angle comparison goes through.
//!
//! The median (not the mean) is what suppresses single-frame misdetections
//! without adding multi-frame lag.

use crate::types::Point3;
use std::collections::VecDeque;

/// Signed difference `a - b` wrapped into (-180, 180] degrees.
///
/// Non-finite input yields 0.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let diff = a - b;
    if !diff.is_finite() {
        return 0.0;
    }
    let wrapped = diff.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// True when `value` jumps further than `max_delta` degrees from the most
/// recent history entry. An empty history never rejects.
pub fn reject_outlier_scalar(value: f64, history: &VecDeque<f64>, max_delta: f64) -> bool {
    match history.back() {
        Some(&last) => angle_diff(value, last).abs() > max_delta,
        None => false,
    }
}

/// Admit `value` into the history unless it is an outlier, then return the
/// median of the history (0 when empty).
pub fn smooth_scalar(
    value: f64,
    history: &mut VecDeque<f64>,
    window_size: usize,
    max_delta: f64,
) -> f64 {
    if !reject_outlier_scalar(value, history, max_delta) {
        push_bounded(history, value, window_size);
    }
    median(history.iter().copied()).unwrap_or(0.0)
}

/// Admit `point` unless its x/y distance from the last accepted point exceeds
/// `max_delta`, then return the per-axis median of the history.
///
/// z is excluded from the gate because detector depth is much noisier than
/// the image-plane coordinates.
pub fn smooth_point3(
    point: Point3,
    history: &mut VecDeque<Point3>,
    window_size: usize,
    max_delta: f64,
) -> Point3 {
    let rejected = history
        .back()
        .map(|last| last.planar_distance(&point) > max_delta)
        .unwrap_or(false);

    if rejected {
        tracing::debug!(
            x = point.x,
            y = point.y,
            "rejected pose point jump beyond {max_delta}"
        );
    } else {
        push_bounded(history, point, window_size);
    }

    median_point(history).unwrap_or(point)
}

/// Push to the back, evicting from the front once longer than `window_size`
pub(crate) fn push_bounded<T>(history: &mut VecDeque<T>, value: T, window_size: usize) {
    history.push_back(value);
    while history.len() > window_size {
        history.pop_front();
    }
}

/// Median of a sequence; even lengths average the two middle values
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn median_point(history: &VecDeque<Point3>) -> Option<Point3> {
    Some(Point3 {
        x: median(history.iter().map(|p| p.x))?,
        y: median(history.iter().map(|p| p.y))?,
        z: median(history.iter().map(|p| p.z))?,
    })
}
