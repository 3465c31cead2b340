//! Limb disambiguation
//!
//! Assigns the pose detector's elbow/wrist pairs to the user's anatomical
//! left and right, then smooths each side's points. Assignment happens on raw
//! points and smoothing after it, so a corrected mis-assignment never lands in
//! the wrong side's history.

use crate::config::PipelineConfig;
use crate::filters::smooth_point3;
use crate::landmarks::{
    pose_point, POSE_LEFT_ELBOW, POSE_LEFT_SHOULDER, POSE_LEFT_WRIST, POSE_RIGHT_ELBOW,
    POSE_RIGHT_SHOULDER, POSE_RIGHT_WRIST,
};
use crate::types::{HandSide, Landmark, LimbPose, Point3};
use std::collections::VecDeque;

/// Raw elbow/wrist pair as found in one pose frame
#[derive(Debug, Clone, Copy)]
struct RawArm {
    elbow: Point3,
    wrist: Point3,
}

#[derive(Debug, Clone, Default)]
struct SideTrack {
    elbow_history: VecDeque<Point3>,
    wrist_history: VecDeque<Point3>,
    current: Option<LimbPose>,
}

/// Smoothed per-side limb state, stale-but-valid between pose frames
#[derive(Debug, Clone, Default)]
pub struct LimbDisambiguator {
    sides: [SideTrack; 2],
}

impl LimbDisambiguator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest smoothed limb pose for a side, if one has ever been seen
    pub fn limb(&self, side: HandSide) -> Option<&LimbPose> {
        self.sides[side.index()].current.as_ref()
    }

    /// Ingest one pose frame. `None` or missing landmarks leave state untouched.
    pub fn update(&mut self, pose: Option<&[Landmark]>, config: &PipelineConfig) {
        let Some(pose) = pose else {
            return;
        };
        let min_vis = config.min_pose_visibility;
        let arm = |elbow: usize, wrist: usize| -> Option<RawArm> {
            Some(RawArm {
                elbow: pose_point(pose, elbow, min_vis)?,
                wrist: pose_point(pose, wrist, min_vis)?,
            })
        };
        let detector_left = arm(POSE_LEFT_ELBOW, POSE_LEFT_WRIST);
        let detector_right = arm(POSE_RIGHT_ELBOW, POSE_RIGHT_WRIST);

        let midline = match (
            pose_point(pose, POSE_LEFT_SHOULDER, min_vis),
            pose_point(pose, POSE_RIGHT_SHOULDER, min_vis),
        ) {
            (Some(l), Some(r)) => Some((l.x + r.x) / 2.0),
            _ => None,
        };

        match (detector_left, detector_right) {
            (Some(a), Some(b)) => {
                let (left, right) = if Self::first_is_user_left(&a, &b, midline) {
                    (a, b)
                } else {
                    (b, a)
                };
                self.assign(HandSide::Left, left, config);
                self.assign(HandSide::Right, right, config);
            }
            // Single arm: best effort with the detector's own label
            (Some(a), None) => self.assign(HandSide::Left, a, config),
            (None, Some(b)) => self.assign(HandSide::Right, b, config),
            (None, None) => {}
        }
    }

    /// The camera view is mirrored, so the user's left arm appears on the
    /// image's right (larger x).
    fn first_is_user_left(a: &RawArm, b: &RawArm, midline: Option<f64>) -> bool {
        if let Some(mid) = midline {
            let a_left = a.wrist.x > mid;
            let b_left = b.wrist.x > mid;
            if a_left != b_left {
                return a_left;
            }
            tracing::debug!(midline = mid, "both wrists on one side of midline");
        }
        a.wrist.x >= b.wrist.x
    }

    fn assign(&mut self, side: HandSide, raw: RawArm, config: &PipelineConfig) {
        let track = &mut self.sides[side.index()];
        let elbow = smooth_point3(
            raw.elbow,
            &mut track.elbow_history,
            config.pose_window,
            config.max_pose_delta,
        );
        let wrist = smooth_point3(
            raw.wrist,
            &mut track.wrist_history,
            config.pose_window,
            config.max_pose_delta,
        );
        track.current = Some(LimbPose { elbow, wrist });
    }

    /// Forget all limb state
    pub fn clear(&mut self) {
        self.sides = Default::default();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::landmarks::POSE_LANDMARK_COUNT;

    /// Pose with shoulders at x=0.4/0.6 and both arms hanging below them.
    /// `detector_left_wrist_x` places the detector-left wrist.
    pub(crate) fn pose_frame(
        detector_left_wrist_x: f64,
        detector_right_wrist_x: f64,
        with_shoulders: bool,
    ) -> Vec<Landmark> {
        let mut pose = vec![Landmark::new(0.5, 0.5, 0.0).with_visibility(0.0); POSE_LANDMARK_COUNT];
        if with_shoulders {
            pose[POSE_LEFT_SHOULDER] = Landmark::new(0.6, 0.3, 0.0).with_visibility(0.99);
            pose[POSE_RIGHT_SHOULDER] = Landmark::new(0.4, 0.3, 0.0).with_visibility(0.99);
        }
        pose[POSE_LEFT_ELBOW] =
            Landmark::new(detector_left_wrist_x, 0.5, 0.0).with_visibility(0.99);
        pose[POSE_LEFT_WRIST] =
            Landmark::new(detector_left_wrist_x, 0.7, 0.0).with_visibility(0.99);
        pose[POSE_RIGHT_ELBOW] =
            Landmark::new(detector_right_wrist_x, 0.5, 0.0).with_visibility(0.99);
        pose[POSE_RIGHT_WRIST] =
            Landmark::new(detector_right_wrist_x, 0.7, 0.0).with_visibility(0.99);
        pose
    }

    #[test]
    fn test_midline_assignment() {
        let mut limbs = LimbDisambiguator::new();
        let config = PipelineConfig::default();
        limbs.update(Some(&pose_frame(0.7, 0.3, true)), &config);

        assert_eq!(limbs.limb(HandSide::Left).unwrap().wrist.x, 0.7);
        assert_eq!(limbs.limb(HandSide::Right).unwrap().wrist.x, 0.3);
    }

    #[test]
    fn test_swapped_detector_labels_are_corrected() {
        let mut limbs = LimbDisambiguator::new();
        let config = PipelineConfig::default();
        // Detector got the arms backwards
        limbs.update(Some(&pose_frame(0.3, 0.7, true)), &config);

        assert_eq!(limbs.limb(HandSide::Left).unwrap().wrist.x, 0.7);
        assert_eq!(limbs.limb(HandSide::Right).unwrap().wrist.x, 0.3);
    }

    #[test]
    fn test_wrist_comparison_without_shoulders() {
        let mut limbs = LimbDisambiguator::new();
        let config = PipelineConfig::default();
        limbs.update(Some(&pose_frame(0.35, 0.65, false)), &config);

        assert_eq!(limbs.limb(HandSide::Left).unwrap().wrist.x, 0.65);
        assert_eq!(limbs.limb(HandSide::Right).unwrap().wrist.x, 0.35);
    }

    #[test]
    fn test_single_arm_uses_detector_label() {
        let mut limbs = LimbDisambiguator::new();
        let config = PipelineConfig::default();
        let mut pose = pose_frame(0.3, 0.7, true);
        pose[POSE_RIGHT_WRIST].visibility = Some(0.1);
        limbs.update(Some(&pose), &config);

        assert_eq!(limbs.limb(HandSide::Left).unwrap().wrist.x, 0.3);
        assert!(limbs.limb(HandSide::Right).is_none());
    }

    #[test]
    fn test_missing_pose_keeps_last_state() {
        let mut limbs = LimbDisambiguator::new();
        let config = PipelineConfig::default();
        limbs.update(Some(&pose_frame(0.7, 0.3, true)), &config);
        let before = *limbs.limb(HandSide::Left).unwrap();

        limbs.update(None, &config);
        let mut empty = pose_frame(0.7, 0.3, true);
        for lm in empty.iter_mut() {
            lm.visibility = Some(0.0);
        }
        limbs.update(Some(&empty), &config);

        assert_eq!(*limbs.limb(HandSide::Left).unwrap(), before);
    }

    #[test]
    fn test_points_are_smoothed_after_assignment() {
        let mut limbs = LimbDisambiguator::new();
        let config = PipelineConfig::default();
        limbs.update(Some(&pose_frame(0.70, 0.30, true)), &config);
        limbs.update(Some(&pose_frame(0.72, 0.30, true)), &config);
        limbs.update(Some(&pose_frame(0.74, 0.30, true)), &config);

        let wrist_x = limbs.limb(HandSide::Left).unwrap().wrist.x;
        assert!((wrist_x - 0.72).abs() < 1e-9);
    }
}
