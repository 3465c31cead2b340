//! Wrist Flux - Landmark-to-metric engine for wrist posture and finger motion
//!
//! Flux turns per-frame pose and hand landmarks from a camera-based detector
//! into three calibrated wrist angles per hand, cumulative fingertip travel,
//! and a best guess of which finger pressed a key, through a deterministic
//! pipeline: de-mirroring → limb disambiguation → angle computation →
//! smoothing and self-calibration.
//!
//! ## Surfaces
//!
//! - **Library**: `WristPipeline` / `SharedPipeline`, driven by the host's frame loop
//! - **Frame records**: replayable `wrist.frame.v1` NDJSON landmark streams
//! - **Snapshots**: versioned `wrist.snapshot.v1` JSON output
//! - **FFI**: C bindings around an opaque pipeline handle

pub mod angles;
pub mod calibration;
pub mod config;
pub mod error;
pub mod filters;
pub mod frame;
pub mod landmarks;
pub mod limb;
pub mod pipeline;
pub mod press;
pub mod snapshot;
pub mod travel;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::PipelineConfig;
pub use error::FluxError;
pub use filters::angle_diff;
pub use pipeline::{PipelineStats, PressSnapshot, SharedPipeline, WristPipeline};
pub use types::{
    AngleKind, AngleReadings, Finger, FingerTravel, HandObservation, HandSide, Landmark,
    PressDetection,
};

// Record and snapshot exports
pub use frame::{ControlEvent, FrameRecord, FrameRecordAdapter, FRAME_SCHEMA_VERSION};
pub use snapshot::{SnapshotEncoder, WristSnapshot, SNAPSHOT_VERSION};

/// Flux version embedded in all snapshots
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for snapshots
pub const PRODUCER_NAME: &str = "wrist-flux";
