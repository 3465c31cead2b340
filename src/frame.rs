//! wrist.frame.v1 record format
//!
//! A serializable form of one video frame's landmark results plus the
//! discrete control events that happened during it, so that landmark streams
//! can be recorded and replayed through the pipeline.

use crate::error::FluxError;
use crate::landmarks::{HAND_LANDMARK_COUNT, POSE_LANDMARK_COUNT};
use crate::pipeline::{PressSnapshot, WristPipeline};
use crate::types::{HandObservation, HandSide, Landmark};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current frame record schema version
pub const FRAME_SCHEMA_VERSION: &str = "wrist.frame.v1";

/// Discrete event applied after the frame's landmarks are ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    /// A key went down; triggers press-finger detection
    KeyPress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    /// Session logic started or stopped measuring
    Session { active: bool },
    ResetCalibration,
    ResetSession,
}

/// One frame of landmark source output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    /// 33 pose landmarks, absent when pose detection failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<Vec<Landmark>>,
    /// Zero or more detected hands with raw detector labels
    #[serde(default)]
    pub hands: Vec<HandObservation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ControlEvent>,
}

/// Press detected while replaying a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPressResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub finger: String,
    #[serde(flatten)]
    pub snapshot: PressSnapshot,
}

impl FrameRecord {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            schema_version: FRAME_SCHEMA_VERSION.to_string(),
            timestamp,
            pose: None,
            hands: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Validate the record structure
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != FRAME_SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: FRAME_SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if let Some(pose) = &self.pose {
            if pose.len() != POSE_LANDMARK_COUNT {
                return Err(ValidationError::PoseLandmarkCount(pose.len()));
            }
        }

        for (index, hand) in self.hands.iter().enumerate() {
            if hand.landmarks.len() != HAND_LANDMARK_COUNT {
                return Err(ValidationError::HandLandmarkCount {
                    index,
                    count: hand.landmarks.len(),
                });
            }
            if HandSide::from_detector_label(&hand.label, false).is_none() {
                return Err(ValidationError::UnknownHandLabel {
                    index,
                    label: hand.label.clone(),
                });
            }
        }

        Ok(())
    }

    /// Feed this frame through the pipeline, then apply its events in order.
    ///
    /// Returns one result per key press.
    pub fn apply(&self, pipeline: &mut WristPipeline) -> Vec<KeyPressResult> {
        pipeline.on_pose_frame(self.pose.as_deref());
        if !self.hands.is_empty() {
            pipeline.on_hand_frame(&self.hands, self.timestamp);
        }

        let mut presses = Vec::new();
        for event in &self.events {
            match event {
                ControlEvent::KeyPress { key } => {
                    let snapshot = pipeline.press_snapshot(self.timestamp);
                    presses.push(KeyPressResult {
                        key: key.clone(),
                        finger: snapshot.press.label(),
                        snapshot,
                    });
                }
                ControlEvent::Session { active } => pipeline.set_session_active(*active),
                ControlEvent::ResetCalibration => pipeline.reset_calibration(self.timestamp),
                ControlEvent::ResetSession => pipeline.reset_session(self.timestamp),
            }
        }
        presses
    }
}

/// Adapter for reading frame records in bulk
pub struct FrameRecordAdapter;

impl FrameRecordAdapter {
    /// Parse a JSON array of frame records
    pub fn parse_array(json: &str) -> Result<Vec<FrameRecord>, FluxError> {
        let records: Vec<FrameRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (one frame record per line, blank lines skipped)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FrameRecord>, FluxError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record = serde_json::from_str::<FrameRecord>(trimmed).map_err(|e| {
                FluxError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Validate records and return only the failures
    pub fn validate_records(records: &[FrameRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index,
                    timestamp: record.timestamp,
                    error,
                })
            })
            .collect()
    }
}

/// A record that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub error: ValidationError,
}

/// Structural problems with a frame record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Pose has {0} landmarks, expected 33")]
    PoseLandmarkCount(usize),

    #[error("Hand {index} has {count} landmarks, expected 21")]
    HandLandmarkCount { index: usize, count: usize },

    #[error("Hand {index} has unknown label {label:?}")]
    UnknownHandLabel { index: usize, label: String },
}
