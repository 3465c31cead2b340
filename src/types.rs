//! Core types for the Wrist Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw landmarks, anatomical sides, smoothed limb positions, angle
//! readings, and the on-demand query results.

use serde::{Deserialize, Serialize};

/// A single tracked point in the normalized image-relative frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Detector confidence that the point is visible (pose landmarks only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// True when x, y and z are all finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn point(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

/// Plain 3D point used for smoothed positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane, ignoring z
    pub fn planar_distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The user's anatomical side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandSide {
    Left,
    Right,
}

impl HandSide {
    pub const ALL: [HandSide; 2] = [HandSide::Left, HandSide::Right];

    pub fn index(self) -> usize {
        match self {
            HandSide::Left => 0,
            HandSide::Right => 1,
        }
    }

    pub fn opposite(self) -> HandSide {
        match self {
            HandSide::Left => HandSide::Right,
            HandSide::Right => HandSide::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandSide::Left => "left",
            HandSide::Right => "right",
        }
    }

    /// Resolve a raw detector handedness label to the anatomical side.
    ///
    /// Selfie-view detectors report handedness mirrored relative to the user,
    /// so with `mirrored` set a "Left" label is the user's right hand.
    pub fn from_detector_label(label: &str, mirrored: bool) -> Option<HandSide> {
        let raw = match label.trim().to_ascii_lowercase().as_str() {
            "left" => HandSide::Left,
            "right" => HandSide::Right,
            _ => return None,
        };
        Some(if mirrored { raw.opposite() } else { raw })
    }

    /// Multiplier that makes a signed angle read the same anatomical
    /// direction on both hands
    pub(crate) fn sign(self) -> f64 {
        match self {
            HandSide::Left => -1.0,
            HandSide::Right => 1.0,
        }
    }
}

/// Finger identifier, thumb first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn index(self) -> usize {
        match self {
            Finger::Thumb => 0,
            Finger::Index => 1,
            Finger::Middle => 2,
            Finger::Ring => 3,
            Finger::Pinky => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }
}

/// The three wrist angle types tracked per hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleKind {
    /// Radial/ulnar bend in the image plane
    Deviation,
    /// Palm rotation
    Pronation,
    /// Wrist up/down bend
    Extension,
}

impl AngleKind {
    pub const ALL: [AngleKind; 3] = [
        AngleKind::Deviation,
        AngleKind::Pronation,
        AngleKind::Extension,
    ];

    pub fn index(self) -> usize {
        match self {
            AngleKind::Deviation => 0,
            AngleKind::Pronation => 1,
            AngleKind::Extension => 2,
        }
    }
}

/// One hand as delivered by the landmark source, before de-mirroring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    /// Raw detector handedness label ("Left" / "Right")
    pub label: String,
    /// The 21 hand landmarks
    pub landmarks: Vec<Landmark>,
}

/// Smoothed forearm endpoints for one side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimbPose {
    pub elbow: Point3,
    pub wrist: Point3,
}

/// Raw (unsmoothed) angles for one hand in one frame, in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAngles {
    pub deviation: f64,
    pub pronation: f64,
    pub extension: f64,
}

impl RawAngles {
    pub fn get(&self, kind: AngleKind) -> f64 {
        match kind {
            AngleKind::Deviation => self.deviation,
            AngleKind::Pronation => self.pronation,
            AngleKind::Extension => self.extension,
        }
    }
}

/// Calibrated angle readings, absent until first computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleReadings {
    pub left_deviation: Option<f64>,
    pub right_deviation: Option<f64>,
    pub left_pronation: Option<f64>,
    pub right_pronation: Option<f64>,
    pub left_extension: Option<f64>,
    pub right_extension: Option<f64>,
}

impl AngleReadings {
    pub fn get(&self, side: HandSide, kind: AngleKind) -> Option<f64> {
        match (side, kind) {
            (HandSide::Left, AngleKind::Deviation) => self.left_deviation,
            (HandSide::Right, AngleKind::Deviation) => self.right_deviation,
            (HandSide::Left, AngleKind::Pronation) => self.left_pronation,
            (HandSide::Right, AngleKind::Pronation) => self.right_pronation,
            (HandSide::Left, AngleKind::Extension) => self.left_extension,
            (HandSide::Right, AngleKind::Extension) => self.right_extension,
        }
    }

    pub(crate) fn set(&mut self, side: HandSide, kind: AngleKind, value: Option<f64>) {
        let slot = match (side, kind) {
            (HandSide::Left, AngleKind::Deviation) => &mut self.left_deviation,
            (HandSide::Right, AngleKind::Deviation) => &mut self.right_deviation,
            (HandSide::Left, AngleKind::Pronation) => &mut self.left_pronation,
            (HandSide::Right, AngleKind::Pronation) => &mut self.right_pronation,
            (HandSide::Left, AngleKind::Extension) => &mut self.left_extension,
            (HandSide::Right, AngleKind::Extension) => &mut self.right_extension,
        };
        *slot = value;
    }
}

/// Cumulative fingertip travel per side (normalized image units)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerTravel {
    pub left: f64,
    pub right: f64,
}

/// Result of a press-finger query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressDetection {
    /// The most likely presser, `None` when unknown
    pub finger: Option<(HandSide, Finger)>,
    /// Weighted displacement score of the winning finger (0 when unknown)
    pub score: f64,
}

impl PressDetection {
    pub fn unknown() -> Self {
        Self {
            finger: None,
            score: 0.0,
        }
    }

    /// Label such as `"left_index"`, or `"unknown"`
    pub fn label(&self) -> String {
        match self.finger {
            Some((side, finger)) => format!("{}_{}", side.as_str(), finger.as_str()),
            None => "unknown".to_string(),
        }
    }
}
