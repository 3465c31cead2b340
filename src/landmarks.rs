//! Landmark layouts and input screening
//!
//! Index constants for the 21-point hand and 33-point pose layouts, and the
//! checks that keep corrupt detector output out of every history buffer.

use crate::types::{Finger, Landmark, Point3};

pub const HAND_LANDMARK_COUNT: usize = 21;
pub const POSE_LANDMARK_COUNT: usize = 33;

// Hand layout
pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

// Pose layout (detector-labelled sides)
pub const POSE_LEFT_SHOULDER: usize = 11;
pub const POSE_RIGHT_SHOULDER: usize = 12;
pub const POSE_LEFT_ELBOW: usize = 13;
pub const POSE_RIGHT_ELBOW: usize = 14;
pub const POSE_LEFT_WRIST: usize = 15;
pub const POSE_RIGHT_WRIST: usize = 16;

/// Fingertip landmark index for a finger
pub fn fingertip_index(finger: Finger) -> usize {
    match finger {
        Finger::Thumb => THUMB_TIP,
        Finger::Index => INDEX_TIP,
        Finger::Middle => MIDDLE_TIP,
        Finger::Ring => RING_TIP,
        Finger::Pinky => PINKY_TIP,
    }
}

/// Why a hand observation was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandRejection {
    WrongLandmarkCount(usize),
    NonFiniteLandmark(usize),
    UnknownLabel,
}

/// A hand that passed screening: exactly 21 finite landmarks
#[derive(Debug, Clone, Copy)]
pub struct HandLandmarks<'a> {
    points: &'a [Landmark],
}

impl<'a> HandLandmarks<'a> {
    /// Screen raw landmarks. Any non-finite coordinate discards the whole hand.
    pub fn screen(points: &'a [Landmark]) -> Result<Self, HandRejection> {
        if points.len() != HAND_LANDMARK_COUNT {
            return Err(HandRejection::WrongLandmarkCount(points.len()));
        }
        if let Some(idx) = points.iter().position(|p| !p.is_finite()) {
            return Err(HandRejection::NonFiniteLandmark(idx));
        }
        Ok(Self { points })
    }

    pub fn get(&self, index: usize) -> &Landmark {
        &self.points[index]
    }

    pub fn fingertip(&self, finger: Finger) -> &Landmark {
        &self.points[fingertip_index(finger)]
    }
}

/// A pose landmark usable this frame: in range, finite and visible enough
pub fn pose_point(pose: &[Landmark], index: usize, min_visibility: f64) -> Option<Point3> {
    let landmark = pose.get(index)?;
    if !landmark.is_finite() {
        return None;
    }
    match landmark.visibility {
        Some(v) if v.is_nan() || v < min_visibility => None,
        _ => Some(landmark.point()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_hand() -> Vec<Landmark> {
        (0..HAND_LANDMARK_COUNT)
            .map(|i| Landmark::new(0.4 + i as f64 * 0.01, 0.5, 0.0))
            .collect()
    }

    #[test]
    fn test_screen_accepts_valid_hand() {
        let hand = flat_hand();
        let screened = HandLandmarks::screen(&hand).unwrap();
        assert_eq!(screened.fingertip(Finger::Pinky).x, hand[PINKY_TIP].x);
    }

    #[test]
    fn test_screen_rejects_nan() {
        let mut hand = flat_hand();
        hand[7].z = f64::NAN;
        assert_eq!(
            HandLandmarks::screen(&hand).unwrap_err(),
            HandRejection::NonFiniteLandmark(7)
        );
    }

    #[test]
    fn test_screen_rejects_short_hand() {
        let hand = flat_hand()[..20].to_vec();
        assert_eq!(
            HandLandmarks::screen(&hand).unwrap_err(),
            HandRejection::WrongLandmarkCount(20)
        );
    }

    #[test]
    fn test_pose_point_visibility() {
        let pose = vec![
            Landmark::new(0.1, 0.2, 0.0).with_visibility(0.9),
            Landmark::new(0.1, 0.2, 0.0).with_visibility(0.2),
            Landmark::new(0.1, 0.2, 0.0),
            Landmark::new(f64::NAN, 0.2, 0.0),
        ];
        assert!(pose_point(&pose, 0, 0.5).is_some());
        assert!(pose_point(&pose, 1, 0.5).is_none());
        assert!(pose_point(&pose, 2, 0.5).is_some());
        assert!(pose_point(&pose, 3, 0.5).is_none());
        assert!(pose_point(&pose, 40, 0.5).is_none());
    }
}
