//! Calibration persistence tests

use robovoice::calibration::{MOTOR_SPEED, MOVEMENT_DURATION, VOICE_RECOGNITION};
use robovoice::{CalibrationStore, Command, RobotController, Setting};
use std::sync::Arc;
use std::thread;

#[test]
fn test_saved_settings_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robot_calibration.json");

    let store = CalibrationStore::open(&path);
    store.set(MOTOR_SPEED, "forward", 72.5).unwrap();
    store.set(VOICE_RECOGNITION, "volume_threshold", 0.45).unwrap();
    store.set(MOVEMENT_DURATION, "turn_duration", 0.8).unwrap();
    store.set("gripper", "grip_force", 12.0).unwrap();
    store.save().unwrap();

    let reloaded = CalibrationStore::open(&path);
    assert_eq!(reloaded.snapshot(), store.snapshot());
    assert_eq!(reloaded.get(MOTOR_SPEED, "forward"), 72.5);
    assert_eq!(reloaded.get(MOVEMENT_DURATION, "turn_duration"), 0.8);
    assert_eq!(reloaded.get("gripper", "grip_force"), 12.0);
}

#[test]
fn test_unsaved_changes_are_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robot_calibration.json");

    let store = CalibrationStore::open(&path);
    store.set(MOTOR_SPEED, "backward", 10.0).unwrap();

    assert!(!path.exists());
    assert_eq!(CalibrationStore::open(&path).get(MOTOR_SPEED, "backward"), 50.0);
}

#[test]
fn test_reset_persists_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robot_calibration.json");

    let store = CalibrationStore::open(&path);
    store.set(MOTOR_SPEED, "forward", 99.0).unwrap();
    store.save().unwrap();

    store.reset_to_defaults().unwrap();
    assert_eq!(store.get(MOTOR_SPEED, "forward"), 50.0);

    let reloaded = CalibrationStore::open(&path);
    assert_eq!(reloaded.get(MOTOR_SPEED, "forward"), 50.0);
    assert_eq!(reloaded.get_setting(Setting::ConfidenceThreshold), 0.7);
}

#[test]
fn test_unknown_keys_read_zero() {
    let dir = tempfile::tempdir().unwrap();
    let store = CalibrationStore::open(dir.path().join("robot_calibration.json"));

    assert_eq!(store.get(MOTOR_SPEED, "warp"), 0.0);
    assert_eq!(store.get("lasers", "power"), 0.0);
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robot_calibration.json");
    std::fs::write(&path, r#"{"motor_speed": {"forward": 65}}"#).unwrap();

    let store = CalibrationStore::open(&path);
    assert_eq!(store.get(MOTOR_SPEED, "forward"), 65.0);
    assert_eq!(store.get(MOTOR_SPEED, "backward"), 50.0);
    assert_eq!(store.get(MOVEMENT_DURATION, "default_duration"), 1.0);
}

#[test]
fn test_corrupt_file_is_backed_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robot_calibration.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = CalibrationStore::open(&path);
    assert_eq!(store.get(MOTOR_SPEED, "forward"), 50.0);
    assert!(dir.path().join("robot_calibration.json.corrupt").exists());
}

#[test]
fn test_out_of_range_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robot_calibration.json");
    std::fs::write(&path, r#"{"voice_recognition": {"confidence_threshold": 7}}"#).unwrap();

    let store = CalibrationStore::open(&path);
    assert_eq!(store.get(VOICE_RECOGNITION, "confidence_threshold"), 0.7);
}

#[test]
fn test_robot_sees_updates_while_readers_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CalibrationStore::open(dir.path().join("cal.json")));
    let robot = RobotController::new(Arc::clone(&store));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    let speed = store.get(MOTOR_SPEED, "forward");
                    assert!(speed == 50.0 || speed == 80.0);
                }
            })
        })
        .collect();

    store.set(MOTOR_SPEED, "forward", 80.0).unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(robot.plan(Command::Forward).unwrap().speed, 80.0);
}
