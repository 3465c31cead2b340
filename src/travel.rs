//! Finger travel integration
//!
//! Accumulates how far the five fingertips of each hand move in the image
//! plane while a session is active. Displacements below the jitter threshold
//! are sensor noise and count as zero.

use crate::landmarks::HandLandmarks;
use crate::types::{Finger, FingerTravel, HandSide};

#[derive(Debug, Clone, Copy, Default)]
struct SideTravel {
    total: f64,
    /// Last seen (x, y) of each fingertip, thumb first
    previous: Option<[(f64, f64); 5]>,
}

/// Per-side cumulative fingertip travel
#[derive(Debug, Clone, Default)]
pub struct FingerTravelIntegrator {
    sides: [SideTravel; 2],
}

impl FingerTravelIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate one hand frame and return the frame's jitter-gated delta.
    ///
    /// Previous positions are always updated; the delta is only added to the
    /// accumulator when `active` is set, so toggling the session mid-motion
    /// never produces a jump on the next active frame.
    pub fn update(
        &mut self,
        side: HandSide,
        hand: &HandLandmarks<'_>,
        active: bool,
        jitter_threshold: f64,
    ) -> f64 {
        let mut current = [(0.0, 0.0); 5];
        for finger in Finger::ALL {
            let tip = hand.fingertip(finger);
            current[finger.index()] = (tip.x, tip.y);
        }

        let state = &mut self.sides[side.index()];
        let delta = match state.previous {
            Some(previous) => frame_delta(&previous, &current, jitter_threshold),
            None => 0.0,
        };
        state.previous = Some(current);

        if active {
            state.total += delta;
        }
        delta
    }

    pub fn total(&self, side: HandSide) -> f64 {
        self.sides[side.index()].total
    }

    pub fn travel(&self) -> FingerTravel {
        FingerTravel {
            left: self.total(HandSide::Left),
            right: self.total(HandSide::Right),
        }
    }

    /// Zero both accumulators and forget previous positions
    pub fn reset(&mut self) {
        self.sides = Default::default();
    }
}

/// Sum of per-fingertip displacements, each gated by the jitter threshold
fn frame_delta(
    previous: &[(f64, f64); 5],
    current: &[(f64, f64); 5],
    jitter_threshold: f64,
) -> f64 {
    previous
        .iter()
        .zip(current.iter())
        .map(|(p, c)| {
            let dx = c.0 - p.0;
            let dy = c.1 - p.1;
            (dx * dx + dy * dy).sqrt()
        })
        .filter(|d| *d >= jitter_threshold)
        .sum()
}
