//! Replays a recorded landmark stream through the public API.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use wrist_flux::frame::{ControlEvent, FrameRecord, FrameRecordAdapter, KeyPressResult};
use wrist_flux::landmarks::{
    HAND_LANDMARK_COUNT, INDEX_MCP, INDEX_TIP, MIDDLE_MCP, PINKY_MCP, POSE_LANDMARK_COUNT,
    POSE_LEFT_ELBOW, POSE_LEFT_SHOULDER, POSE_LEFT_WRIST, POSE_RIGHT_ELBOW, POSE_RIGHT_SHOULDER,
    POSE_RIGHT_WRIST,
};
use wrist_flux::{
    Finger, HandObservation, HandSide, Landmark, PipelineStats, SnapshotEncoder, WristPipeline,
};

const FRAME_MS: i64 = 33;
const PRESS_FRAME: i64 = 30;

fn at(frame: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap() + Duration::milliseconds(frame * FRAME_MS)
}

fn pose() -> Vec<Landmark> {
    let mut pose = vec![Landmark::new(0.5, 0.5, 0.0).with_visibility(0.0); POSE_LANDMARK_COUNT];
    pose[POSE_LEFT_SHOULDER] = Landmark::new(0.6, 0.3, 0.0).with_visibility(0.95);
    pose[POSE_RIGHT_SHOULDER] = Landmark::new(0.4, 0.3, 0.0).with_visibility(0.95);
    // Forearms raised toward the keyboard
    pose[POSE_LEFT_ELBOW] = Landmark::new(0.7, 0.9, 0.0).with_visibility(0.9);
    pose[POSE_LEFT_WRIST] = Landmark::new(0.7, 0.7, 0.0).with_visibility(0.9);
    pose[POSE_RIGHT_ELBOW] = Landmark::new(0.3, 0.9, 0.0).with_visibility(0.9);
    pose[POSE_RIGHT_WRIST] = Landmark::new(0.3, 0.7, 0.0).with_visibility(0.9);
    pose
}

/// Index fingertip position at a given frame: still, then sliding right,
/// then pressing down and into the keyboard just before `PRESS_FRAME`.
fn index_tip(frame: i64) -> (f64, f64, f64) {
    match frame {
        0..=19 => (0.46, 0.35, 0.0),
        20..=24 => (0.46 + 0.01 * (frame - 19) as f64, 0.35, 0.0),
        25..=27 => (0.51, 0.35, 0.0),
        28 => (0.51, 0.36, 0.01),
        29 => (0.51, 0.37, 0.02),
        _ => (0.51, 0.37, 0.03),
    }
}

/// The user's left hand; the mirrored detector labels it "Right"
fn left_hand(frame: i64) -> HandObservation {
    let mut landmarks = vec![Landmark::new(0.5, 0.6, 0.0); HAND_LANDMARK_COUNT];
    landmarks[MIDDLE_MCP] = Landmark::new(0.5, 0.5, 0.0);
    landmarks[INDEX_MCP] = Landmark::new(0.46, 0.5, -0.02);
    landmarks[PINKY_MCP] = Landmark::new(0.54, 0.5, 0.02);
    let (x, y, z) = index_tip(frame);
    landmarks[INDEX_TIP] = Landmark::new(x, y, z);
    HandObservation {
        label: "Right".to_string(),
        landmarks,
    }
}

fn recording() -> String {
    (0..=PRESS_FRAME)
        .map(|frame| {
            let mut record = FrameRecord::new(at(frame));
            record.pose = Some(pose());
            record.hands.push(left_hand(frame));
            if frame == 0 {
                record.events.push(ControlEvent::Session { active: true });
            }
            if frame == PRESS_FRAME {
                record.events.push(ControlEvent::KeyPress {
                    key: Some("r".to_string()),
                });
            }
            serde_json::to_string(&record).unwrap()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn replay(records: &[FrameRecord], pipeline: &mut WristPipeline) -> Vec<KeyPressResult> {
    records
        .iter()
        .flat_map(|record| record.apply(pipeline))
        .collect()
}

#[test]
fn replay_calibrates_tracks_travel_and_detects_press() {
    let records = FrameRecordAdapter::parse_ndjson(&recording()).unwrap();
    assert_eq!(records.len(), (PRESS_FRAME + 1) as usize);
    assert!(FrameRecordAdapter::validate_records(&records).is_empty());

    let mut pipeline = WristPipeline::new();
    let presses = replay(&records, &mut pipeline);

    assert!(pipeline.is_calibrated());
    assert!(pipeline.session_active());
    let angles = pipeline.angles();
    for value in [
        angles.left_deviation,
        angles.left_pronation,
        angles.left_extension,
    ] {
        assert!(value.unwrap().abs() < 1e-6, "uncalibrated angle {value:?}");
    }
    assert_eq!(angles.right_pronation, None);

    let travel = pipeline.finger_travel();
    assert!(travel.left >= 0.05 - 1e-9, "left travel {}", travel.left);
    assert_eq!(travel.right, 0.0);

    assert_eq!(presses.len(), 1);
    assert_eq!(presses[0].key.as_deref(), Some("r"));
    assert_eq!(
        presses[0].snapshot.press.finger,
        Some((HandSide::Left, Finger::Index))
    );
    assert_eq!(presses[0].finger, "left_index");
    assert!((presses[0].snapshot.press.score - (0.3 * 0.02 + 0.7 * 0.03)).abs() < 1e-9);

    let frames = (PRESS_FRAME + 1) as u64;
    assert_eq!(
        pipeline.stats(),
        PipelineStats {
            pose_frames: frames,
            hand_frames: frames,
            hands_accepted: frames,
            hands_rejected: 0,
            hands_superseded: 0,
        }
    );
}

#[test]
fn replay_as_json_array_matches_ndjson() {
    let ndjson_records = FrameRecordAdapter::parse_ndjson(&recording()).unwrap();
    let array = serde_json::to_string(&ndjson_records).unwrap();
    let array_records = FrameRecordAdapter::parse_array(&array).unwrap();

    let mut a = WristPipeline::new();
    let mut b = WristPipeline::new();
    replay(&ndjson_records, &mut a);
    replay(&array_records, &mut b);

    assert_eq!(a.angles(), b.angles());
    assert_eq!(a.finger_travel(), b.finger_travel());
}

#[test]
fn snapshots_follow_the_stream() {
    let records = FrameRecordAdapter::parse_ndjson(&recording()).unwrap();
    let encoder = SnapshotEncoder::with_instance_id("replay".to_string());
    let mut pipeline = WristPipeline::new();

    let snapshots: Vec<_> = records
        .iter()
        .map(|record| {
            let presses = record.apply(&mut pipeline);
            encoder.encode(&pipeline, record.timestamp, &presses)
        })
        .collect();

    let first_calibrated = snapshots.iter().position(|s| s.calibrated).unwrap();
    // 500ms stabilization at 33ms per frame
    assert_eq!(first_calibrated, 16);
    assert!(snapshots[..first_calibrated].iter().all(|s| !s.calibrated));

    let last = snapshots.last().unwrap();
    assert_eq!(last.presses.len(), 1);
    assert_eq!(last.presses[0].finger, "left_index");
    assert!(snapshots[..snapshots.len() - 1]
        .iter()
        .all(|s| s.presses.is_empty()));
}

#[test]
fn recalibration_event_restarts_epoch_mid_stream() {
    let mut records = FrameRecordAdapter::parse_ndjson(&recording()).unwrap();
    let mut reset = FrameRecord::new(at(PRESS_FRAME + 1));
    reset.events.push(ControlEvent::ResetCalibration);
    reset.events.push(ControlEvent::Session { active: false });
    records.push(reset);

    let mut pipeline = WristPipeline::new();
    replay(&records, &mut pipeline);

    assert!(!pipeline.is_calibrated());
    assert!(!pipeline.session_active());
    assert_eq!(pipeline.angles().left_pronation, None);
    // Travel belongs to the session, not to calibration
    assert!(pipeline.finger_travel().left > 0.0);
    assert_eq!(
        pipeline.calibration().epoch_start(),
        Some(at(PRESS_FRAME + 1))
    );
}

#[test]
fn invalid_records_are_reported_by_index() {
    let mut lines: Vec<String> = recording().lines().map(str::to_string).collect();
    lines[3] = lines[3].replace("wrist.frame.v1", "wrist.frame.v9");
    let records = FrameRecordAdapter::parse_ndjson(&lines.join("\n")).unwrap();

    let failures = FrameRecordAdapter::validate_records(&records);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 3);
    assert_eq!(failures[0].timestamp, at(3));
}
