//! Pipeline configuration
//!
//! All tunables of the pipeline live here. The defaults are the values the
//! pipeline is calibrated for; hosts may load overrides from JSON.

use crate::error::FluxError;
use serde::{Deserialize, Serialize};

/// Default smoothing window for pose limb points (frames)
pub const DEFAULT_POSE_WINDOW: usize = 10;
/// Default maximum frame-to-frame pose point jump (normalized units)
pub const DEFAULT_MAX_POSE_DELTA: f64 = 0.15;
/// Default smoothing window for angle channels (frames)
pub const DEFAULT_ANGLE_WINDOW: usize = 15;
/// Default maximum frame-to-frame angle jump (degrees)
pub const DEFAULT_MAX_ANGLE_DELTA: f64 = 50.0;
/// Default fingertip jitter threshold (normalized units)
pub const DEFAULT_JITTER_THRESHOLD: f64 = 0.005;
/// Default delay after a calibration epoch starts before baselines may be captured
pub const DEFAULT_STABILIZATION_DELAY_MS: i64 = 500;

/// Tunables for every pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Median window for smoothed elbow/wrist points
    pub pose_window: usize,
    /// Pose points jumping further than this (x/y distance) are rejected
    pub max_pose_delta: f64,
    /// Median window for each angle channel
    pub angle_window: usize,
    /// Angle readings jumping further than this (degrees) are rejected
    pub max_angle_delta: f64,
    /// Fingertip displacements below this count as zero travel
    pub jitter_threshold: f64,
    /// Minimum time since the calibration epoch before a baseline is captured
    pub stabilization_delay_ms: i64,
    /// Hands narrower than this (x/y distance index MCP to pinky MCP) read 0° pronation
    pub min_hand_width: f64,
    /// Pose landmarks with lower visibility are treated as absent
    pub min_pose_visibility: f64,
    /// Maximum samples kept per fingertip for press detection
    pub fingertip_history: usize,
    /// Oldest sample age considered by press detection
    pub press_early_window_ms: i64,
    /// Samples younger than this form the late press window
    pub press_late_window_ms: i64,
    /// Weight of vertical displacement in the press score
    pub press_y_weight: f64,
    /// Weight of depth displacement in the press score
    pub press_z_weight: f64,
    /// Whether detector handedness labels are mirrored (selfie view)
    pub mirrored_labels: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pose_window: DEFAULT_POSE_WINDOW,
            max_pose_delta: DEFAULT_MAX_POSE_DELTA,
            angle_window: DEFAULT_ANGLE_WINDOW,
            max_angle_delta: DEFAULT_MAX_ANGLE_DELTA,
            jitter_threshold: DEFAULT_JITTER_THRESHOLD,
            stabilization_delay_ms: DEFAULT_STABILIZATION_DELAY_MS,
            min_hand_width: 0.01,
            min_pose_visibility: 0.5,
            fingertip_history: 10,
            press_early_window_ms: 200,
            press_late_window_ms: 50,
            press_y_weight: 0.3,
            press_z_weight: 0.7,
            mirrored_labels: true,
        }
    }
}

impl PipelineConfig {
    /// Check that the configuration is internally consistent
    pub fn validate(&self) -> Result<(), FluxError> {
        if self.pose_window == 0 || self.angle_window == 0 {
            return Err(FluxError::ConfigError(
                "smoothing windows must hold at least one frame".to_string(),
            ));
        }
        if self.fingertip_history == 0 {
            return Err(FluxError::ConfigError(
                "fingertip_history must be at least 1".to_string(),
            ));
        }
        let positive = [
            ("max_pose_delta", self.max_pose_delta),
            ("max_angle_delta", self.max_angle_delta),
            ("min_hand_width", self.min_hand_width),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(FluxError::ConfigError(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if !self.jitter_threshold.is_finite() || self.jitter_threshold < 0.0 {
            return Err(FluxError::ConfigError(format!(
                "jitter_threshold must be non-negative, got {}",
                self.jitter_threshold
            )));
        }
        if self.stabilization_delay_ms < 0 {
            return Err(FluxError::ConfigError(
                "stabilization_delay_ms must be non-negative".to_string(),
            ));
        }
        if self.press_late_window_ms < 0 || self.press_early_window_ms <= self.press_late_window_ms
        {
            return Err(FluxError::ConfigError(format!(
                "press windows must satisfy 0 <= late ({}) < early ({})",
                self.press_late_window_ms, self.press_early_window_ms
            )));
        }
        Ok(())
    }

    /// Load and validate a configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, FluxError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
