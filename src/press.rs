//! Press-finger detection
//!
//! Keeps a short motion history for each of the ten fingertips and, when a
//! discrete press happens, picks the finger whose tip moved the most toward
//! the keyboard plane just before it. The heuristic knows nothing about key
//! layout; callers fall back to their own key map on an unknown result.

use crate::config::PipelineConfig;
use crate::filters::push_bounded;
use crate::landmarks::HandLandmarks;
use crate::types::{Finger, HandSide, PressDetection};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// One fingertip sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TipSample {
    pub y: f64,
    pub z: f64,
    pub at: DateTime<Utc>,
}

/// Per-side, per-finger fingertip histories
#[derive(Debug, Clone, Default)]
pub struct PressFingerDetector {
    /// Indexed by `side.index() * 5 + finger.index()`
    histories: [VecDeque<TipSample>; 10],
}

impl PressFingerDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(side: HandSide, finger: Finger) -> usize {
        side.index() * Finger::ALL.len() + finger.index()
    }

    pub fn history(&self, side: HandSide, finger: Finger) -> &VecDeque<TipSample> {
        &self.histories[Self::slot(side, finger)]
    }

    /// Append all five fingertips of one hand
    pub fn record(
        &mut self,
        side: HandSide,
        hand: &HandLandmarks<'_>,
        at: DateTime<Utc>,
        capacity: usize,
    ) {
        for finger in Finger::ALL {
            let tip = hand.fingertip(finger);
            push_bounded(
                &mut self.histories[Self::slot(side, finger)],
                TipSample {
                    y: tip.y,
                    z: tip.z,
                    at,
                },
                capacity,
            );
        }
    }

    /// Infer which finger caused a press at `now`.
    ///
    /// For every finger the sample with the earliest timestamp aged
    /// (late, early] and the one with the latest timestamp aged [0, late]
    /// are compared; score = `wy * dy + wz * dz`.
    /// The highest positive score wins.
    pub fn detect(&self, now: DateTime<Utc>, config: &PipelineConfig) -> PressDetection {
        let early = Duration::milliseconds(config.press_early_window_ms);
        let late = Duration::milliseconds(config.press_late_window_ms);

        let mut best = PressDetection::unknown();
        for side in HandSide::ALL {
            for finger in Finger::ALL {
                let history = self.history(side, finger);
                let Some(score) = finger_score(history, now, early, late, config) else {
                    continue;
                };
                if score > best.score {
                    best = PressDetection {
                        finger: Some((side, finger)),
                        score,
                    };
                }
            }
        }

        tracing::debug!(finger = %best.label(), score = best.score, "press detection");
        best
    }

    pub fn clear(&mut self) {
        for history in self.histories.iter_mut() {
            history.clear();
        }
    }
}

fn finger_score(
    history: &VecDeque<TipSample>,
    now: DateTime<Utc>,
    early: Duration,
    late: Duration,
    config: &PipelineConfig,
) -> Option<f64> {
    let mut early_first: Option<&TipSample> = None;
    let mut late_last: Option<&TipSample> = None;

    // Frames may arrive out of order; pick by timestamp, not position
    for sample in history {
        let age = now - sample.at;
        if age < Duration::zero() {
            continue;
        }
        if age <= late {
            if late_last.map_or(true, |last| sample.at >= last.at) {
                late_last = Some(sample);
            }
        } else if age <= early && early_first.map_or(true, |first| sample.at < first.at) {
            early_first = Some(sample);
        }
    }

    let (start, end) = (early_first?, late_last?);
    let dy = end.y - start.y;
    let dz = end.z - start.z;
    let score = config.press_y_weight * dy + config.press_z_weight * dz;
    score.is_finite().then_some(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{fingertip_index, HAND_LANDMARK_COUNT};
    use crate::types::Landmark;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    /// Hand at rest with one fingertip displaced by (dy, dz)
    fn hand(moving: Option<(Finger, f64, f64)>) -> Vec<Landmark> {
        let mut hand = vec![Landmark::new(0.5, 0.5, 0.0); HAND_LANDMARK_COUNT];
        if let Some((finger, dy, dz)) = moving {
            hand[fingertip_index(finger)] = Landmark::new(0.5, 0.5 + dy, dz);
        }
        hand
    }

    fn record(detector: &mut PressFingerDetector, side: HandSide, landmarks: &[Landmark], ms: i64) {
        let hand = HandLandmarks::screen(landmarks).unwrap();
        detector.record(side, &hand, t(ms), 10);
    }

    #[test]
    fn test_detects_moving_finger() {
        let config = PipelineConfig::default();
        let mut detector = PressFingerDetector::new();
        let rest = hand(None);

        for ms in [0, 33, 66, 100] {
            record(&mut detector, HandSide::Left, &rest, ms);
            record(&mut detector, HandSide::Right, &rest, ms);
        }
        let pressed = hand(Some((Finger::Middle, 0.02, 0.03)));
        for ms in [133, 166, 200] {
            record(&mut detector, HandSide::Left, &rest, ms);
            record(&mut detector, HandSide::Right, &pressed, ms);
        }

        let detection = detector.detect(t(210), &config);
        assert_eq!(detection.finger, Some((HandSide::Right, Finger::Middle)));
        assert!((detection.score - (0.3 * 0.02 + 0.7 * 0.03)).abs() < 1e-9);
        assert_eq!(detection.label(), "right_middle");
    }

    #[test]
    fn test_depth_outweighs_vertical_drift() {
        let config = PipelineConfig::default();
        let mut detector = PressFingerDetector::new();
        let rest = hand(None);
        record(&mut detector, HandSide::Left, &rest, 0);
        record(&mut detector, HandSide::Right, &rest, 0);

        record(&mut detector, HandSide::Left, &hand(Some((Finger::Index, 0.03, 0.0))), 180);
        record(&mut detector, HandSide::Right, &hand(Some((Finger::Ring, 0.0, 0.03))), 180);

        let detection = detector.detect(t(200), &config);
        assert_eq!(detection.finger, Some((HandSide::Right, Finger::Ring)));
    }

    #[test]
    fn test_unknown_without_early_window() {
        let config = PipelineConfig::default();
        let mut detector = PressFingerDetector::new();
        // Only recent samples
        record(&mut detector, HandSide::Right, &hand(None), 980);
        record(&mut detector, HandSide::Right, &hand(Some((Finger::Index, 0.05, 0.05))), 1000);

        assert_eq!(detector.detect(t(1000), &config), PressDetection::unknown());
    }

    #[test]
    fn test_unknown_without_positive_score() {
        let config = PipelineConfig::default();
        let mut detector = PressFingerDetector::new();
        record(&mut detector, HandSide::Right, &hand(None), 0);
        // Finger lifts away (negative y and z)
        record(&mut detector, HandSide::Right, &hand(Some((Finger::Index, -0.02, -0.02))), 190);

        assert_eq!(detector.detect(t(200), &config).label(), "unknown");
    }

    #[test]
    fn test_stale_samples_are_ignored() {
        let config = PipelineConfig::default();
        let mut detector = PressFingerDetector::new();
        record(&mut detector, HandSide::Right, &hand(None), 0);
        record(&mut detector, HandSide::Right, &hand(Some((Finger::Index, 0.05, 0.05))), 40);

        // Both samples are older than the early window
        assert_eq!(detector.detect(t(1000), &config).finger, None);
    }

    #[test]
    fn test_delayed_frame_does_not_hide_press() {
        let config = PipelineConfig::default();
        let mut detector = PressFingerDetector::new();
        let rest = hand(None);
        record(&mut detector, HandSide::Left, &rest, 0);
        record(&mut detector, HandSide::Left, &hand(Some((Finger::Index, 0.02, 0.03))), 140);
        // Rest frame from t=110 arrives after the pressed one
        record(&mut detector, HandSide::Left, &rest, 110);

        let detection = detector.detect(t(150), &config);
        assert_eq!(detection.finger, Some((HandSide::Left, Finger::Index)));
        assert!((detection.score - 0.027).abs() < 1e-9);
        assert_eq!(detection.label(), "left_index");
    }

    #[test]
    fn test_early_window_uses_earliest_timestamp() {
        let config = PipelineConfig::default();
        let mut detector = PressFingerDetector::new();
        let pressed = hand(Some((Finger::Index, 0.02, 0.03)));
        // Half-pressed sample recorded before the older rest sample
        record(&mut detector, HandSide::Right, &hand(Some((Finger::Index, 0.01, 0.01))), 80);
        record(&mut detector, HandSide::Right, &hand(None), 20);
        record(&mut detector, HandSide::Right, &pressed, 200);

        let detection = detector.detect(t(210), &config);
        assert_eq!(detection.finger, Some((HandSide::Right, Finger::Index)));
        assert!((detection.score - 0.027).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_frames_score_like_single_frames() {
        let config = PipelineConfig::default();
        let rest = hand(None);
        let pressed = hand(Some((Finger::Ring, 0.01, 0.02)));

        let mut once = PressFingerDetector::new();
        record(&mut once, HandSide::Left, &rest, 0);
        record(&mut once, HandSide::Left, &pressed, 140);

        let mut twice = PressFingerDetector::new();
        for ms in [0, 0, 140, 140] {
            let landmarks = if ms == 0 { &rest } else { &pressed };
            record(&mut twice, HandSide::Left, landmarks, ms);
        }

        assert_eq!(twice.detect(t(150), &config), once.detect(t(150), &config));
        assert_eq!(twice.detect(t(150), &config).label(), "left_ring");
    }

    #[test]
    fn test_history_is_capped() {
        let mut detector = PressFingerDetector::new();
        for ms in 0..25 {
            record(&mut detector, HandSide::Left, &hand(None), ms * 10);
        }
        for finger in Finger::ALL {
            let history = detector.history(HandSide::Left, finger);
            assert_eq!(history.len(), 10);
            assert_eq!(history.front().map(|s| s.at), Some(t(150)));
        }
        assert!(detector.history(HandSide::Right, Finger::Thumb).is_empty());
    }
}
