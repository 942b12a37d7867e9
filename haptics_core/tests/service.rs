use haptics_core::mocks::{DriverOp, ManualDriver};
use haptics_core::{HapticsDevice, HapticsService};
use haptics_traits::{DriverErrorCode, Vector3};
use rstest::rstest;

fn service() -> HapticsService<ManualDriver> {
    HapticsService::new(HapticsDevice::new(ManualDriver::new()))
}

#[test]
fn start_and_stop_report_the_initialized_flag() {
    let mut svc = service();
    assert!(!svc.is_initialized());
    assert!(svc.start_device());
    assert!(svc.is_initialized());
    assert!(!svc.stop_device());
    assert!(!svc.is_initialized());
    assert!(!svc.stop_device());
}

#[test]
fn failed_start_is_cleaned_up_so_a_retry_can_succeed() {
    let mut svc = service();
    svc.device_mut()
        .driver_mut()
        .fail_on(DriverOp::Workspace, DriverErrorCode::CommunicationLost);
    assert!(!svc.start_device());
    assert_eq!(svc.device().driver().open_handles(), 0);
    assert_eq!(svc.device().driver().registered_ops(), 0);

    svc.device_mut().driver_mut().clear_failures();
    assert!(svc.start_device());
}

#[rstest]
#[case(&[])]
#[case(&[1.0, 2.0])]
#[case(&[1.0, 2.0, 3.0, 4.0])]
#[case(&[f64::NAN, 0.0, 0.0])]
#[case(&[0.0, f64::INFINITY, 0.0])]
fn malformed_force_is_rejected_and_buffer_kept(#[case] force: &[f64]) {
    let mut svc = service();
    assert!(svc.start_device());
    assert!(svc.send_force(&[0.5, 0.25, 0.125]));
    assert!(!svc.send_force(force));
    svc.device_mut().driver_mut().run_servo_cycle();
    assert_eq!(
        svc.device().driver().last_force(),
        Some(Vector3::new(0.5, 0.25, 0.125))
    );
}

#[test]
fn reads_are_safe_before_anything_happens() {
    let svc = service();
    assert_eq!(svc.get_position(), [0.0, 0.0, 0.0]);
    assert!(!svc.is_button_down());
}

#[test]
fn synchronize_round_trip_through_the_facade() {
    let mut svc = service();
    assert!(!svc.synchronize());
    assert!(svc.start_device());
    svc.device_mut()
        .driver_mut()
        .set_position(Vector3::new(0.25, 0.5, 0.75));
    svc.device_mut().driver_mut().set_button(true);
    let ticket = svc.sync_ticket().unwrap();
    svc.device_mut().driver_mut().run_servo_cycle();
    assert!(svc.device().sync_completed(ticket));
    assert_eq!(svc.get_position(), [0.25, 0.5, 0.75]);
    assert!(svc.is_button_down());
}

#[test]
fn debug_flag_round_trips() {
    let mut svc = service();
    assert!(!svc.debug());
    svc.set_debug(true);
    assert!(svc.debug());
    // Debug output only adds log events; behavior is unchanged.
    assert!(svc.start_device());
}
