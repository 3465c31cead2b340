//! Snapshot encoding
//!
//! This module encodes pipeline state into versioned JSON snapshots for
//! downstream consumers (session logic, recorders, the FFI host).

use crate::error::FluxError;
use crate::frame::KeyPressResult;
use crate::pipeline::{PipelineStats, WristPipeline};
use crate::types::{AngleReadings, FingerTravel};
use crate::{FLUX_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: &str = "wrist.snapshot.v1";

/// Who produced a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Press attached to a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// `left_index`, `right_thumb`, ... or `unknown`
    pub finger: String,
    pub score: f64,
}

/// Pipeline state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WristSnapshot {
    pub snapshot_version: String,
    pub producer: SnapshotProducer,
    pub timestamp: String,
    pub calibrated: bool,
    pub session_active: bool,
    pub angles: AngleReadings,
    pub finger_travel: FingerTravel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presses: Vec<SnapshotPress>,
    pub stats: PipelineStats,
}

/// Snapshot encoder with a stable producer identity
pub struct SnapshotEncoder {
    instance_id: String,
}

impl Default for SnapshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Capture the pipeline state at `at`, attaching any presses from the same frame
    pub fn encode(
        &self,
        pipeline: &WristPipeline,
        at: DateTime<Utc>,
        presses: &[KeyPressResult],
    ) -> WristSnapshot {
        WristSnapshot {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            timestamp: at.to_rfc3339(),
            calibrated: pipeline.is_calibrated(),
            session_active: pipeline.session_active(),
            angles: pipeline.angles(),
            finger_travel: pipeline.finger_travel(),
            presses: presses
                .iter()
                .map(|p| SnapshotPress {
                    key: p.key.clone(),
                    finger: p.finger.clone(),
                    score: p.snapshot.press.score,
                })
                .collect(),
            stats: pipeline.stats(),
        }
    }

    /// Encode to a single-line JSON string
    pub fn encode_to_json(
        &self,
        pipeline: &WristPipeline,
        at: DateTime<Utc>,
        presses: &[KeyPressResult],
    ) -> Result<String, FluxError> {
        let snapshot = self.encode(pipeline, at, presses);
        serde_json::to_string(&snapshot).map_err(|e| FluxError::EncodingError(e.to_string()))
    }
}
