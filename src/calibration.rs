//! Baseline self-calibration
//!
//! Owns the six angle channels (three angle kinds per hand). Each channel
//! smooths its raw readings, captures a baseline once per calibration epoch,
//! and reports readings relative to that baseline.

use crate::config::PipelineConfig;
use crate::filters::{angle_diff, smooth_scalar};
use crate::types::{AngleKind, AngleReadings, HandSide, RawAngles};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One angle stream for one hand
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AngleChannel {
    /// Raw readings admitted by the outlier gate, oldest first
    history: VecDeque<f64>,
    /// Reference angle captured at rest, `None` until captured this epoch
    baseline: Option<f64>,
    /// Last calibrated value emitted
    last: Option<f64>,
}

impl AngleChannel {
    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn clear(&mut self) {
        self.history.clear();
        self.baseline = None;
        self.last = None;
    }
}

/// Per-channel baseline capture and subtraction with epoch-scoped resets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationController {
    /// Indexed by `side.index() * 3 + kind.index()`
    channels: [AngleChannel; 6],
    /// Start of the current calibration epoch; set by the first update or a reset
    epoch_start: Option<DateTime<Utc>>,
}

impl Default for CalibrationController {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationController {
    pub fn new() -> Self {
        Self {
            channels: Default::default(),
            epoch_start: None,
        }
    }

    fn slot(side: HandSide, kind: AngleKind) -> usize {
        side.index() * AngleKind::ALL.len() + kind.index()
    }

    pub fn channel(&self, side: HandSide, kind: AngleKind) -> &AngleChannel {
        &self.channels[Self::slot(side, kind)]
    }

    pub fn epoch_start(&self) -> Option<DateTime<Utc>> {
        self.epoch_start
    }

    /// Smooth one hand's raw angles, capture baselines when allowed, and
    /// return the calibrated values written to that hand's three channels.
    pub fn update(
        &mut self,
        side: HandSide,
        raw: &RawAngles,
        at: DateTime<Utc>,
        config: &PipelineConfig,
    ) -> [f64; 3] {
        let epoch_start = *self.epoch_start.get_or_insert(at);
        let stabilized = at - epoch_start >= Duration::milliseconds(config.stabilization_delay_ms);

        let mut out = [0.0; 3];
        for kind in AngleKind::ALL {
            let channel = &mut self.channels[Self::slot(side, kind)];
            let smoothed = smooth_scalar(
                raw.get(kind),
                &mut channel.history,
                config.angle_window,
                config.max_angle_delta,
            );

            if channel.baseline.is_none()
                && stabilized
                && channel.history.len() >= config.angle_window
            {
                tracing::debug!(
                    side = side.as_str(),
                    kind = ?kind,
                    baseline = smoothed,
                    "captured calibration baseline"
                );
                channel.baseline = Some(smoothed);
            }

            let calibrated = match channel.baseline {
                Some(baseline) => angle_diff(smoothed, baseline),
                None => smoothed,
            };
            channel.last = Some(calibrated);
            out[kind.index()] = calibrated;
        }
        out
    }

    /// True once any channel on either hand has captured a baseline
    pub fn is_calibrated(&self) -> bool {
        self.channels.iter().any(|c| c.baseline.is_some())
    }

    /// Latest calibrated value of every channel
    pub fn readings(&self) -> AngleReadings {
        let mut readings = AngleReadings::default();
        for side in HandSide::ALL {
            for kind in AngleKind::ALL {
                readings.set(side, kind, self.channel(side, kind).last);
            }
        }
        readings
    }

    /// Start a new epoch: clear every baseline and history together
    pub fn reset(&mut self, at: DateTime<Utc>) {
        for channel in self.channels.iter_mut() {
            channel.clear();
        }
        self.epoch_start = Some(at);
        tracing::info!(epoch_start = %at, "calibration epoch reset");
    }

    /// Serialize calibration state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Load calibration state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    fn pronation(value: f64) -> RawAngles {
        RawAngles {
            pronation: value,
            ..RawAngles::default()
        }
    }

    #[test]
    fn test_uncalibrated_reports_smoothed_value() {
        let mut controller = CalibrationController::new();
        let config = PipelineConfig::default();
        let out = controller.update(HandSide::Left, &pronation(20.0), at_ms(0), &config);

        assert_eq!(out[AngleKind::Pronation.index()], 20.0);
        assert!(!controller.is_calibrated());
        assert_eq!(controller.readings().left_pronation, Some(20.0));
        assert_eq!(controller.readings().right_pronation, None);
    }

    #[test]
    fn test_baseline_waits_for_full_history() {
        let mut controller = CalibrationController::new();
        let config = PipelineConfig::default();
        // Well past the delay but only 5 readings
        controller.update(HandSide::Left, &pronation(20.0), at_ms(0), &config);
        for i in 1..5 {
            controller.update(HandSide::Left, &pronation(20.0), at_ms(1000 * i), &config);
        }
        assert!(!controller.is_calibrated());
    }

    #[test]
    fn test_baseline_waits_for_stabilization_delay() {
        let mut controller = CalibrationController::new();
        let config = PipelineConfig::default();
        for i in 0..20 {
            controller.update(HandSide::Left, &pronation(20.0), at_ms(i * 20), &config);
        }
        // 20 frames at 20ms: last frame at 380ms
        assert!(!controller.is_calibrated());

        controller.update(HandSide::Left, &pronation(20.0), at_ms(500), &config);
        assert!(controller.is_calibrated());
        assert_eq!(
            controller.channel(HandSide::Left, AngleKind::Pronation).baseline(),
            Some(20.0)
        );
    }

    #[test]
    fn test_late_and_repeated_frames_do_not_shift_epoch() {
        let mut controller = CalibrationController::new();
        let config = PipelineConfig::default();
        controller.update(HandSide::Left, &pronation(20.0), at_ms(100), &config);
        // Delayed frame stamped before the epoch start, then a duplicate
        controller.update(HandSide::Left, &pronation(20.0), at_ms(40), &config);
        controller.update(HandSide::Left, &pronation(20.0), at_ms(40), &config);
        assert_eq!(controller.epoch_start(), Some(at_ms(100)));

        for i in 3..15 {
            controller.update(HandSide::Left, &pronation(20.0), at_ms(100 + i * 10), &config);
        }
        // Full history but only 140ms into the epoch
        assert!(!controller.is_calibrated());

        controller.update(HandSide::Left, &pronation(20.0), at_ms(600), &config);
        assert!(controller.is_calibrated());
        assert_eq!(controller.readings().left_pronation, Some(0.0));
    }

    #[test]
    fn test_any_channel_calibrates() {
        let mut controller = CalibrationController::new();
        let config = PipelineConfig::default();
        for i in 0..15 {
            controller.update(HandSide::Right, &pronation(5.0), at_ms(i * 40), &config);
        }
        assert!(controller.is_calibrated());
        assert!(controller
            .channel(HandSide::Left, AngleKind::Pronation)
            .baseline()
            .is_none());
    }

    #[test]
    fn test_calibrated_output_is_wrap_correct() {
        let mut controller = CalibrationController::new();
        let config = PipelineConfig::default();
        for i in 0..15 {
            controller.update(HandSide::Right, &pronation(175.0), at_ms(i * 40), &config);
        }
        // Move across the ±180 seam a little at a time
        let mut out = [0.0; 3];
        for (i, value) in [179.0, -179.0, -175.0].iter().enumerate() {
            for j in 0..15 {
                out = controller.update(
                    HandSide::Right,
                    &pronation(*value),
                    at_ms(1000 + (i as i64) * 1000 + j * 40),
                    &config,
                );
            }
        }
        assert!((out[AngleKind::Pronation.index()] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_everything_and_restarts_epoch() {
        let mut controller = CalibrationController::new();
        let config = PipelineConfig::default();
        for i in 0..15 {
            controller.update(HandSide::Left, &pronation(12.0), at_ms(i * 40), &config);
        }
        assert!(controller.is_calibrated());

        controller.reset(at_ms(2000));
        assert!(!controller.is_calibrated());
        assert_eq!(controller.epoch_start(), Some(at_ms(2000)));
        for side in HandSide::ALL {
            for kind in AngleKind::ALL {
                let channel = controller.channel(side, kind);
                assert_eq!(channel.history_len(), 0);
                assert_eq!(channel.baseline(), None);
                assert_eq!(channel.last(), None);
            }
        }

        // New epoch gates on its own start time
        for i in 0..15 {
            controller.update(HandSide::Left, &pronation(12.0), at_ms(2000 + i * 20), &config);
        }
        assert!(!controller.is_calibrated());
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut controller = CalibrationController::new();
        let config = PipelineConfig::default();
        for i in 0..15 {
            controller.update(HandSide::Left, &pronation(8.0), at_ms(i * 40), &config);
        }
        let loaded = CalibrationController::from_json(&controller.to_json().unwrap()).unwrap();
        assert_eq!(loaded.readings(), controller.readings());
        assert_eq!(loaded.epoch_start(), controller.epoch_start());
    }
}
