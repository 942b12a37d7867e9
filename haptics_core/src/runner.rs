//! Application haptic loop: synchronize, read, compute, command.
use crate::device::{HapticsDevice, SyncTicket};
use crate::effects::ForceEffect;
use crate::error::Result;
use haptics_traits::clock::{Clock, period_for_hz};
use haptics_traits::{HapticDriver, Vector3};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopParams {
    pub loop_hz: u32,
    /// Stop after this long; `None` runs until shutdown.
    pub duration: Option<Duration>,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            loop_hz: 1000,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopStats {
    pub iterations: u64,
    /// Updates that saw the copy requested by the previous update.
    pub fresh_updates: u64,
    /// Updates that started late and were resynchronized.
    pub overruns: u64,
    pub last_position: Vector3,
    pub last_force: Vector3,
    pub elapsed: Duration,
}

/// Drive `effect` on `device` at `params.loop_hz` until `shutdown` is set,
/// the duration elapses or the device reports an error.
///
/// The pending force is zeroed on every exit path.
pub fn run_effect<D, C>(
    device: &mut HapticsDevice<D>,
    effect: &mut dyn ForceEffect,
    params: &LoopParams,
    clock: &C,
    shutdown: &AtomicBool,
) -> Result<LoopStats>
where
    D: HapticDriver,
    C: Clock,
{
    let period = period_for_hz(params.loop_hz);
    let start = clock.now();
    let deadline = params.duration.map(|d| start + d);
    let mut stats = LoopStats::default();
    let mut pending: Option<SyncTicket> = None;
    let mut next = start;
    tracing::info!(effect = effect.name(), loop_hz = params.loop_hz, "haptic loop started");

    let outcome = loop {
        if shutdown.load(Ordering::Acquire) {
            tracing::debug!("haptic loop shutdown requested");
            break Ok(());
        }
        if deadline.is_some_and(|d| clock.now() >= d) {
            break Ok(());
        }
        if pending.is_some_and(|t| device.sync_completed(t)) {
            stats.fresh_updates += 1;
        }
        match device.synchronize() {
            Ok(t) => pending = Some(t),
            Err(e) => break Err(e),
        }
        let position = device.get_position();
        let force = effect.force(position);
        if let Err(e) = device.send_force(force) {
            break Err(e);
        }
        stats.iterations += 1;
        stats.last_position = position;
        stats.last_force = force;

        next += period;
        let now = clock.now();
        if next < now {
            stats.overruns += 1;
            next = now;
        }
        clock.sleep_until(next);
    };

    if let Err(e) = device.send_force(Vector3::ZERO) {
        tracing::warn!(error = %e, "failed to zero force on loop exit");
    }
    stats.elapsed = clock.now().saturating_duration_since(start);
    match outcome {
        Ok(()) => {
            tracing::info!(
                iterations = stats.iterations,
                fresh = stats.fresh_updates,
                overruns = stats.overruns,
                "haptic loop finished"
            );
            Ok(stats)
        }
        Err(e) => {
            tracing::error!(error = %e, iterations = stats.iterations, "haptic loop aborted");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::VirtualWall;
    use crate::error::HapticsError;
    use crate::mocks::ManualDriver;
    use haptics_traits::clock::test_clock::TestClock;

    #[test]
    fn runs_for_the_configured_duration_and_zeroes_force() {
        let mut dev = HapticsDevice::new(ManualDriver::new());
        dev.start_device().unwrap();
        let clock = TestClock::new();
        let mut wall = VirtualWall {
            wall_z: 0.01,
            stiffness: 1000.0,
        };
        let params = LoopParams {
            loop_hz: 1000,
            duration: Some(Duration::from_millis(10)),
        };
        let stats = run_effect(&mut dev, &mut wall, &params, &clock, &AtomicBool::new(false)).unwrap();
        assert_eq!(stats.iterations, 10);
        assert_eq!(stats.overruns, 0);
        assert!((stats.last_force.z - 10.0).abs() < 1e-9);
        assert_eq!(stats.elapsed, Duration::from_millis(10));
        assert_eq!(dev.servo_state().pending_force(), Vector3::ZERO);
        // One sync request per update, none served without servo cycles.
        assert_eq!(dev.driver().registered_ops(), 11);
        assert_eq!(stats.fresh_updates, 0);
    }

    #[test]
    fn preset_shutdown_runs_nothing() {
        let mut dev = HapticsDevice::new(ManualDriver::new());
        dev.start_device().unwrap();
        let stats = run_effect(
            &mut dev,
            &mut VirtualWall::default(),
            &LoopParams::default(),
            &TestClock::new(),
            &AtomicBool::new(true),
        )
        .unwrap();
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn stopped_device_aborts_the_loop() {
        let mut dev = HapticsDevice::new(ManualDriver::new());
        let err = run_effect(
            &mut dev,
            &mut VirtualWall::default(),
            &LoopParams::default(),
            &TestClock::new(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert_eq!(err, HapticsError::NotInitialized);
    }
}
