//! Raw wrist angle computation
//!
//! Computes deviation, pronation and extension for one hand from its hand
//! landmarks and, where needed, the smoothed forearm of the same side.
//! All angles are in degrees and signed so that a positive value means the
//! same anatomical direction on both hands.

use crate::landmarks::{HandLandmarks, INDEX_MCP, MIDDLE_MCP, PINKY_MCP, WRIST};
use crate::types::{HandSide, LimbPose, RawAngles};

/// Angle engine for one hand per frame
pub struct AngleEngine;

impl AngleEngine {
    /// Compute all three raw angles for a hand
    pub fn compute(
        hand: &HandLandmarks<'_>,
        side: HandSide,
        limb: Option<&LimbPose>,
        min_hand_width: f64,
    ) -> RawAngles {
        RawAngles {
            deviation: limb.map_or(0.0, |l| compute_deviation(hand, side, l)),
            pronation: compute_pronation(hand, side, min_hand_width),
            extension: limb.map_or(0.0, |l| compute_extension(hand, side, l)),
        }
    }
}

/// Radial/ulnar deviation in the image plane
///
/// Formula: `atan2(forearm × hand, forearm · hand)` where forearm is
/// elbow→wrist from the pose and hand is wrist→middle MCP, both in (x, y).
fn compute_deviation(hand: &HandLandmarks<'_>, side: HandSide, limb: &LimbPose) -> f64 {
    let fx = limb.wrist.x - limb.elbow.x;
    let fy = limb.wrist.y - limb.elbow.y;
    let hx = hand.get(MIDDLE_MCP).x - hand.get(WRIST).x;
    let hy = hand.get(MIDDLE_MCP).y - hand.get(WRIST).y;

    let cross = fx * hy - fy * hx;
    let dot = fx * hx + fy * hy;

    finite_or_zero(cross.atan2(dot).to_degrees() * side.sign())
}

/// Palm rotation from the depth offset across the knuckles
///
/// Formula: `atan2(z_index_mcp - z_pinky_mcp, |index_mcp - pinky_mcp|_xy)`
/// Dividing by the apparent hand width keeps the reading stable as the hand
/// moves toward or away from the camera. Hands narrower than
/// `min_hand_width` read 0.
fn compute_pronation(hand: &HandLandmarks<'_>, side: HandSide, min_hand_width: f64) -> f64 {
    let index = hand.get(INDEX_MCP);
    let pinky = hand.get(PINKY_MCP);
    let z_diff = index.z - pinky.z;
    let width = index.point().planar_distance(&pinky.point());

    if width < min_hand_width {
        return 0.0;
    }

    finite_or_zero(z_diff.atan2(width).to_degrees() * side.sign())
}

/// Wrist flexion/extension in the (y, z) plane
///
/// Formula: `atan2(hand_z, hand_y) - atan2(forearm_z, forearm_y)`, folded once
/// into (-90, 90] by ±180.
fn compute_extension(hand: &HandLandmarks<'_>, side: HandSide, limb: &LimbPose) -> f64 {
    let fy = limb.wrist.y - limb.elbow.y;
    let fz = limb.wrist.z - limb.elbow.z;
    let hy = hand.get(MIDDLE_MCP).y - hand.get(WRIST).y;
    let hz = hand.get(MIDDLE_MCP).z - hand.get(WRIST).z;

    let forearm_angle = fz.atan2(fy).to_degrees();
    let hand_angle = hz.atan2(hy).to_degrees();

    let mut extension = hand_angle - forearm_angle;
    if extension > 90.0 {
        extension -= 180.0;
    } else if extension <= -90.0 {
        extension += 180.0;
    }

    finite_or_zero(extension * side.sign())
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
