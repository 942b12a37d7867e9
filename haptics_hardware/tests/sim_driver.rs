//! Simulated driver behavior through the `HapticDriver` port, with a live servo thread.

use haptics_hardware::{SimParams, SimulatedDriver};
use haptics_traits::{
    CallbackHandle, DeviceHandle, DriverErrorCode, HapticDriver, Scheduling, ServoOpExit, Vector3,
};
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

fn opened_and_started() -> (SimulatedDriver, DeviceHandle) {
    let mut d = SimulatedDriver::new(SimParams::default()).unwrap();
    let h = d.open(None);
    assert!(h.is_valid());
    d.start();
    assert_eq!(d.last_error(), None);
    (d, h)
}

#[rstest]
#[case(SimParams { present: false, ..SimParams::default() }, None)]
#[case(SimParams::default(), Some("other-device"))]
fn open_fails_with_device_not_found(#[case] params: SimParams, #[case] name: Option<&str>) {
    let mut d = SimulatedDriver::new(params).unwrap();
    assert_eq!(d.open(name), DeviceHandle::INVALID);
    assert_eq!(d.last_error(), Some(DriverErrorCode::DeviceNotFound));
    // last_error clears on read
    assert_eq!(d.last_error(), None);
}

#[test]
fn second_open_reports_busy() {
    let mut d = SimulatedDriver::new(SimParams::default()).unwrap();
    assert!(d.open(Some("simulated")).is_valid());
    assert!(!d.open(None).is_valid());
    assert_eq!(d.last_error(), Some(DriverErrorCode::DeviceBusy));
}

#[test]
fn register_before_start_is_rejected() {
    let mut d = SimulatedDriver::new(SimParams::default()).unwrap();
    let _ = d.open(None);
    let h = d.register_servo_op(Box::new(|_| ServoOpExit::Continue), Scheduling::Continuous);
    assert_eq!(h, CallbackHandle::INVALID);
    assert_eq!(d.last_error(), Some(DriverErrorCode::NotStarted));
}

#[test]
fn continuous_op_runs_until_unregistered() {
    let (mut d, _h) = opened_and_started();
    let runs = Arc::new(AtomicU64::new(0));
    let r = runs.clone();
    let cb = d.register_servo_op(
        Box::new(move |_| {
            r.fetch_add(1, Ordering::Relaxed);
            ServoOpExit::Continue
        }),
        Scheduling::Continuous,
    );
    assert!(cb.is_valid());
    assert!(wait_until(Duration::from_secs(2), || runs.load(Ordering::Relaxed) >= 5));

    d.unregister_servo_op(cb);
    // Let the unregister land, then make sure the count stops moving.
    let ticks = d.servo_ticks();
    assert!(wait_until(Duration::from_secs(2), || d.servo_ticks() >= ticks + 3));
    let frozen = runs.load(Ordering::Relaxed);
    let ticks = d.servo_ticks();
    assert!(wait_until(Duration::from_secs(2), || d.servo_ticks() >= ticks + 5));
    assert_eq!(runs.load(Ordering::Relaxed), frozen);
    d.stop();
    assert_eq!(d.last_error(), None);
}

#[test]
fn one_shot_op_runs_exactly_once() {
    let (mut d, _h) = opened_and_started();
    let runs = Arc::new(AtomicU64::new(0));
    let r = runs.clone();
    // Returning Continue does not re-arm a one-shot registration.
    let cb = d.register_servo_op(
        Box::new(move |_| {
            r.fetch_add(1, Ordering::Relaxed);
            ServoOpExit::Continue
        }),
        Scheduling::OneShot,
    );
    assert!(cb.is_valid());
    assert!(wait_until(Duration::from_secs(2), || runs.load(Ordering::Relaxed) == 1));
    let ticks = d.servo_ticks();
    assert!(wait_until(Duration::from_secs(2), || d.servo_ticks() >= ticks + 5));
    assert_eq!(runs.load(Ordering::Relaxed), 1);
}

#[test]
fn continuous_op_returning_exit_is_removed() {
    let (mut d, _h) = opened_and_started();
    let runs = Arc::new(AtomicU64::new(0));
    let r = runs.clone();
    let _ = d.register_servo_op(
        Box::new(move |_| {
            r.fetch_add(1, Ordering::Relaxed);
            ServoOpExit::Exit
        }),
        Scheduling::Continuous,
    );
    assert!(wait_until(Duration::from_secs(2), || runs.load(Ordering::Relaxed) == 1));
    let ticks = d.servo_ticks();
    assert!(wait_until(Duration::from_secs(2), || d.servo_ticks() >= ticks + 5));
    assert_eq!(runs.load(Ordering::Relaxed), 1);
}

#[test]
fn ops_see_button_and_move_tool_with_force() {
    let (mut d, h) = opened_and_started();
    d.make_current(h);
    let ws = d.workspace();
    assert_eq!(d.last_error(), None);
    let button = d.button();
    button.press();

    let saw_button = Arc::new(AtomicBool::new(false));
    let reached_top = Arc::new(AtomicBool::new(false));
    let (sb, rt) = (saw_button.clone(), reached_top.clone());
    let top = ws.max.z;
    let _ = d.register_servo_op(
        Box::new(move |tool| {
            if tool.tool_button() {
                sb.store(true, Ordering::Relaxed);
            }
            if tool.tool_position().z >= top {
                rt.store(true, Ordering::Relaxed);
            }
            tool.set_tool_force(Vector3::new(0.0, 0.0, 5.0));
            ServoOpExit::Continue
        }),
        Scheduling::Continuous,
    );
    assert!(wait_until(Duration::from_secs(5), || {
        saw_button.load(Ordering::Relaxed) && reached_top.load(Ordering::Relaxed)
    }));
}

#[test]
fn workspace_requires_current_device() {
    let mut d = SimulatedDriver::new(SimParams::default()).unwrap();
    let h = d.open(None);
    let _ = d.workspace();
    assert_eq!(d.last_error(), Some(DriverErrorCode::InvalidHandle));
    d.make_current(h);
    assert_eq!(d.workspace(), SimParams::default().workspace);
    assert_eq!(d.last_error(), None);
}

#[test]
fn stop_and_close_release_everything_and_allow_reopen() {
    let (mut d, h) = opened_and_started();
    d.stop();
    assert!(!d.is_running());
    d.stop();
    d.close(h);
    assert_eq!(d.last_error(), None);
    assert!(!d.is_open());
    assert!(d.open(None).is_valid());
}

#[test]
fn closing_unknown_handle_reports_invalid_handle() {
    let mut d = SimulatedDriver::new(SimParams::default()).unwrap();
    d.close(DeviceHandle(7));
    assert_eq!(d.last_error(), Some(DriverErrorCode::InvalidHandle));
}

#[test]
fn servo_faults_do_not_leak_into_last_error() {
    let (mut d, _h) = opened_and_started();
    let cb = d.register_servo_op(
        Box::new(|tool| {
            tool.set_tool_force(Vector3::new(f64::NAN, 0.0, 0.0));
            ServoOpExit::Continue
        }),
        Scheduling::Continuous,
    );
    assert!(cb.is_valid());
    assert_eq!(d.last_error(), None);
    assert!(wait_until(Duration::from_secs(2), || d.servo_fault_count() > 0));
    // A later driver call is checked against its own outcome only.
    d.unregister_servo_op(cb);
    assert_eq!(d.last_error(), None);
    assert_eq!(d.take_servo_fault(), Some(DriverErrorCode::ForceOutOfRange));
}
