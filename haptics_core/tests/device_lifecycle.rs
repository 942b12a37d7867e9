//! Start/stop lifecycle of `HapticsDevice` against the manual driver double.

use haptics_core::mocks::{DriverOp, ManualDriver};
use haptics_core::{DeviceSettings, HapticsDevice, HapticsError, LifecycleState};
use haptics_traits::{DriverErrorCode, WorkspaceBox};
use rstest::rstest;

fn device() -> HapticsDevice<ManualDriver> {
    HapticsDevice::new(ManualDriver::new())
}

#[test]
fn stop_is_idempotent_and_safe_without_start() {
    let mut dev = device();
    dev.stop_device().unwrap();
    dev.stop_device().unwrap();
    assert_eq!(dev.state(), LifecycleState::Uninitialized);
    assert!(!dev.is_initialized());

    dev.start_device().unwrap();
    dev.stop_device().unwrap();
    dev.stop_device().unwrap();
    assert_eq!(dev.state(), LifecycleState::Uninitialized);
    assert_eq!(dev.driver().open_handles(), 0);
}

#[test]
fn initialized_only_while_running() {
    let mut dev = device();
    assert!(!dev.is_initialized());
    dev.start_device().unwrap();
    assert!(dev.is_initialized());
    assert_eq!(dev.state(), LifecycleState::Running);
    dev.stop_device().unwrap();
    assert!(!dev.is_initialized());
    assert!(dev.transform().is_none());
}

#[test]
fn start_while_running_does_not_acquire_more_handles() {
    let mut dev = device();
    dev.start_device().unwrap();
    let calls = dev.driver().calls().len();
    dev.start_device().unwrap();
    dev.start_device().unwrap();
    assert_eq!(dev.driver().calls().len(), calls);
    assert_eq!(dev.driver().open_handles(), 1);
    assert_eq!(dev.driver().registered_ops(), 1);
}

#[test]
fn open_failure_reports_driver_open_and_stays_uninitialized() {
    let mut dev = device();
    dev.driver_mut()
        .fail_on(DriverOp::Open, DriverErrorCode::DeviceNotFound);
    let err = dev.start_device().unwrap_err();
    assert_eq!(
        err,
        HapticsError::DriverOpen {
            name: None,
            code: Some(DriverErrorCode::DeviceNotFound)
        }
    );
    assert_eq!(dev.state(), LifecycleState::Uninitialized);
    // Nothing past open was attempted.
    assert_eq!(dev.driver().calls(), &[DriverOp::Open]);
}

#[test]
fn invalid_handle_without_code_is_still_an_open_failure() {
    let mut dev = device();
    dev.driver_mut().open_returns_invalid(true);
    assert!(matches!(
        dev.start_device(),
        Err(HapticsError::DriverOpen { code: None, .. })
    ));
}

#[rstest]
#[case(DriverOp::Start, "start")]
#[case(DriverOp::Register, "register_servo_op")]
#[case(DriverOp::MakeCurrent, "make_current")]
#[case(DriverOp::Workspace, "workspace")]
fn failing_step_aborts_the_rest_of_start(#[case] op: DriverOp, #[case] name: &str) {
    let mut dev = device();
    dev.driver_mut().fail_on(op, DriverErrorCode::CommunicationLost);
    match dev.start_device() {
        Err(HapticsError::DriverOperation { op: failed, code }) => {
            assert_eq!(failed, name);
            assert_eq!(code, DriverErrorCode::CommunicationLost);
        }
        other => panic!("expected driver operation failure, got {other:?}"),
    }
    assert!(!dev.is_initialized());
    assert_eq!(dev.driver().calls().last(), Some(&op));
}

#[test]
fn partial_start_must_be_stopped_before_retry() {
    let mut dev = device();
    dev.driver_mut()
        .fail_on(DriverOp::MakeCurrent, DriverErrorCode::InvalidHandle);
    assert!(dev.start_device().is_err());
    // The open handle and the contact op are still held.
    assert_eq!(dev.driver().open_handles(), 1);
    assert_eq!(dev.driver().registered_ops(), 1);

    dev.driver_mut().clear_failures();
    assert!(matches!(dev.start_device(), Err(HapticsError::State(_))));
    assert_eq!(dev.driver().open_handles(), 1);

    dev.stop_device().unwrap();
    assert_eq!(dev.driver().open_handles(), 0);
    assert_eq!(dev.driver().registered_ops(), 0);
    dev.start_device().unwrap();
    assert!(dev.is_initialized());
}

#[test]
fn teardown_continues_past_a_failing_step() {
    let mut dev = device();
    dev.start_device().unwrap();
    dev.driver_mut()
        .fail_on(DriverOp::Unregister, DriverErrorCode::ServoThread);
    let err = dev.stop_device().unwrap_err();
    assert_eq!(err.driver_code(), Some(DriverErrorCode::ServoThread));
    // stop and close still ran
    assert!(!dev.driver().is_started());
    assert_eq!(dev.driver().open_handles(), 0);
    assert_eq!(dev.state(), LifecycleState::Uninitialized);
}

#[test]
fn degenerate_device_workspace_fails_start() {
    let flat = WorkspaceBox::from_extents([-1.0, -1.0, 0.0, 1.0, 1.0, 0.0]);
    let mut dev = HapticsDevice::new(ManualDriver::with_workspace(flat));
    assert!(matches!(
        dev.start_device(),
        Err(HapticsError::InvalidWorkspace(_))
    ));
    assert!(!dev.is_initialized());
}

#[test]
fn custom_app_workspace_is_used_for_the_transform() {
    let settings = DeviceSettings {
        app_workspace: WorkspaceBox::from_extents([0.0, 0.0, 0.0, 10.0, 10.0, 10.0]),
        preserve_aspect: true,
        ..DeviceSettings::default()
    };
    let mut dev = HapticsDevice::with_settings(ManualDriver::new(), settings);
    dev.start_device().unwrap();
    let t = dev.transform().unwrap();
    let origin = t.apply(haptics_traits::Vector3::ZERO);
    assert!((origin - haptics_traits::Vector3::new(5.0, 5.0, 5.0)).norm() < 1e-12);
}

#[test]
fn drop_releases_the_device() {
    let mut dev = device();
    dev.start_device().unwrap();
    let log = dev.driver().call_log();
    log.clear();
    drop(dev);
    assert_eq!(
        log.snapshot(),
        vec![DriverOp::Unregister, DriverOp::Stop, DriverOp::Close]
    );
}

#[test]
fn drop_after_failed_start_closes_the_open_handle() {
    let mut dev = device();
    dev.driver_mut()
        .fail_on(DriverOp::Start, DriverErrorCode::ServoThread);
    assert!(dev.start_device().is_err());
    let log = dev.driver().call_log();
    log.clear();
    drop(dev);
    assert_eq!(log.snapshot(), vec![DriverOp::Stop, DriverOp::Close]);
}

#[test]
fn drop_of_an_idle_device_makes_no_driver_calls() {
    let dev = device();
    let log = dev.driver().call_log();
    drop(dev);
    assert!(log.snapshot().is_empty());
}

#[test]
fn registered_op_is_released_when_registration_reports_an_error() {
    let mut dev = device();
    dev.driver_mut()
        .fail_after(DriverOp::Register, DriverErrorCode::CommunicationLost);
    let err = dev.start_device().unwrap_err();
    assert_eq!(
        err,
        HapticsError::DriverOperation {
            op: "register_servo_op",
            code: DriverErrorCode::CommunicationLost,
        }
    );
    assert!(!dev.is_initialized());
    assert_eq!(dev.driver().registered_ops(), 1);

    dev.driver_mut().clear_failures();
    dev.driver_mut().clear_calls();
    dev.stop_device().unwrap();
    assert_eq!(
        dev.driver().calls(),
        vec![DriverOp::Unregister, DriverOp::Stop, DriverOp::Close]
    );
    assert_eq!(dev.driver().registered_ops(), 0);
    assert_eq!(dev.driver().open_handles(), 0);

    // Clean retry after teardown.
    dev.start_device().unwrap();
    assert_eq!(dev.driver().registered_ops(), 1);
}
