//! Pipeline orchestration
//!
//! This module provides the public API for Wrist Flux. `WristPipeline` owns
//! every piece of session state and is driven synchronously by the host's
//! frame loop:
//!
//! 1. Hand frames are screened and de-mirrored once, on ingestion
//! 2. LimbDisambiguator - pose frames update smoothed forearm state
//! 3. AngleEngine - raw deviation/pronation/extension per hand
//! 4. CalibrationController - smoothing, baseline capture, calibrated output
//! 5. FingerTravelIntegrator / PressFingerDetector - fed from the same hands

use crate::angles::AngleEngine;
use crate::calibration::CalibrationController;
use crate::config::PipelineConfig;
use crate::error::FluxError;
use crate::landmarks::{HandLandmarks, HandRejection};
use crate::limb::LimbDisambiguator;
use crate::press::PressFingerDetector;
use crate::travel::FingerTravelIntegrator;
use crate::types::{
    AngleReadings, FingerTravel, HandObservation, HandSide, Landmark, PressDetection,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Counters describing what the pipeline has ingested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub pose_frames: u64,
    pub hand_frames: u64,
    pub hands_accepted: u64,
    pub hands_rejected: u64,
    /// Hands dropped because a later hand in the same frame had the same side
    pub hands_superseded: u64,
}

/// Angle readings plus the press guess for one discrete input event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressSnapshot {
    pub at: DateTime<Utc>,
    pub press: PressDetection,
    pub angles: AngleReadings,
}

/// Single-owner landmark-to-metric pipeline
#[derive(Debug, Clone)]
pub struct WristPipeline {
    config: PipelineConfig,
    limbs: LimbDisambiguator,
    calibration: CalibrationController,
    travel: FingerTravelIntegrator,
    press: PressFingerDetector,
    session_active: bool,
    stats: PipelineStats,
}

impl Default for WristPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl WristPipeline {
    /// Create a pipeline with default settings
    pub fn new() -> Self {
        Self::build(PipelineConfig::default())
    }

    /// Create a pipeline with a validated configuration
    pub fn with_config(config: PipelineConfig) -> Result<Self, FluxError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PipelineConfig) -> Self {
        Self {
            config,
            limbs: LimbDisambiguator::new(),
            calibration: CalibrationController::new(),
            travel: FingerTravelIntegrator::new(),
            press: PressFingerDetector::new(),
            session_active: false,
            stats: PipelineStats::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn limbs(&self) -> &LimbDisambiguator {
        &self.limbs
    }

    pub fn calibration(&self) -> &CalibrationController {
        &self.calibration
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Ingest the pose result of one frame. `None` is a no-op.
    pub fn on_pose_frame(&mut self, pose: Option<&[Landmark]>) {
        if pose.is_some() {
            self.stats.pose_frames += 1;
        }
        self.limbs.update(pose, &self.config);
    }

    /// Ingest the hand results of one frame.
    ///
    /// Each hand is de-mirrored to its anatomical side and screened; a hand
    /// with any non-finite coordinate is dropped before touching any history.
    /// At most one hand per side is processed: when several resolve to the
    /// same side, the last one in the frame wins.
    /// Returns the number of hands processed.
    pub fn on_hand_frame(&mut self, hands: &[HandObservation], at: DateTime<Utc>) -> usize {
        self.stats.hand_frames += 1;
        let mut by_side: [Option<HandLandmarks<'_>>; 2] = [None, None];

        for observation in hands {
            match self.screen(observation) {
                Ok((side, hand)) => {
                    if by_side[side.index()].replace(hand).is_some() {
                        self.stats.hands_superseded += 1;
                        tracing::debug!(
                            side = side.as_str(),
                            "superseded duplicate hand for side"
                        );
                    }
                }
                Err(reason) => {
                    self.stats.hands_rejected += 1;
                    tracing::warn!(
                        label = %observation.label,
                        reason = ?reason,
                        "discarded hand observation"
                    );
                }
            }
        }

        let mut accepted = 0;
        for side in HandSide::ALL {
            if let Some(hand) = by_side[side.index()] {
                self.process_hand(side, &hand, at);
                accepted += 1;
            }
        }

        self.stats.hands_accepted += accepted as u64;
        accepted
    }

    fn screen<'a>(
        &self,
        observation: &'a HandObservation,
    ) -> Result<(HandSide, HandLandmarks<'a>), HandRejection> {
        let side = HandSide::from_detector_label(&observation.label, self.config.mirrored_labels)
            .ok_or(HandRejection::UnknownLabel)?;
        let hand = HandLandmarks::screen(&observation.landmarks)?;
        Ok((side, hand))
    }

    fn process_hand(&mut self, side: HandSide, hand: &HandLandmarks<'_>, at: DateTime<Utc>) {
        let raw = AngleEngine::compute(
            hand,
            side,
            self.limbs.limb(side),
            self.config.min_hand_width,
        );
        self.calibration.update(side, &raw, at, &self.config);

        self.travel.update(
            side,
            hand,
            self.session_active,
            self.config.jitter_threshold,
        );
        self.press.record(side, hand, at, self.config.fingertip_history);
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// Latest calibrated angles; each is absent until first computed
    pub fn angles(&self) -> AngleReadings {
        self.calibration.readings()
    }

    /// True once any angle channel has captured a baseline
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_calibrated()
    }

    /// Cumulative fingertip travel per side
    pub fn finger_travel(&self) -> FingerTravel {
        self.travel.travel()
    }

    /// Which finger most likely caused a press at `at`
    pub fn detect_pressing_finger(&self, at: DateTime<Utc>) -> PressDetection {
        self.press.detect(at, &self.config)
    }

    /// Press detection together with the angles at the moment of the press
    pub fn press_snapshot(&self, at: DateTime<Utc>) -> PressSnapshot {
        PressSnapshot {
            at,
            press: self.detect_pressing_finger(at),
            angles: self.angles(),
        }
    }

    pub fn session_active(&self) -> bool {
        self.session_active
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Start a new calibration epoch, clearing all baselines and histories
    pub fn reset_calibration(&mut self, at: DateTime<Utc>) {
        self.calibration.reset(at);
    }

    /// Gate finger-travel accumulation
    pub fn set_session_active(&mut self, active: bool) {
        if self.session_active != active {
            tracing::info!(active, "session active changed");
        }
        self.session_active = active;
    }

    /// Reset all session state: calibration, travel, fingertip and limb histories
    pub fn reset_session(&mut self, at: DateTime<Utc>) {
        self.calibration.reset(at);
        self.travel.reset();
        self.press.clear();
        self.limbs.clear();
        tracing::info!("session state reset");
    }
}

/// Mutex-guarded pipeline handle for multi-threaded hosts.
///
/// Every call takes the single lock, so a press query or reset never
/// observes a half-applied frame.
#[derive(Debug, Clone, Default)]
pub struct SharedPipeline {
    inner: Arc<Mutex<WristPipeline>>,
}

impl SharedPipeline {
    pub fn new(pipeline: WristPipeline) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// Lock the pipeline. A panic on another thread does not poison the state
    /// permanently; the last fully applied frame remains usable.
    pub fn lock(&self) -> MutexGuard<'_, WristPipeline> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ingest both results of one frame under a single lock
    pub fn on_frame(
        &self,
        pose: Option<&[Landmark]>,
        hands: &[HandObservation],
        at: DateTime<Utc>,
    ) -> usize {
        let mut pipeline = self.lock();
        pipeline.on_pose_frame(pose);
        pipeline.on_hand_frame(hands, at)
    }

    pub fn angles(&self) -> AngleReadings {
        self.lock().angles()
    }

    pub fn finger_travel(&self) -> FingerTravel {
        self.lock().finger_travel()
    }

    pub fn press_snapshot(&self, at: DateTime<Utc>) -> PressSnapshot {
        self.lock().press_snapshot(at)
    }

    pub fn reset_calibration(&self, at: DateTime<Utc>) {
        self.lock().reset_calibration(at);
    }

    pub fn set_session_active(&self, active: bool) {
        self.lock().set_session_active(active);
    }
}
