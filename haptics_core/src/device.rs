//! `HapticsDevice`: lifecycle, servo-op ownership and the application-side API.
//!
//! The device owns the driver, the driver handles, the session transform and
//! the shared `ServoState`. Servo ops hold an `Arc<ServoState>` so they reach
//! the buffers without borrowing the device.

use crate::check::{DriverCheck, ErrorPolicy};
use crate::error::{HapticsError, Result};
use crate::servo::{ServoSnapshot, ServoState};
use crate::transform::Transform;
use haptics_traits::{CallbackHandle, DeviceHandle, HapticDriver, Scheduling, Vector3, WorkspaceBox};
use std::sync::Arc;

/// Application workspace used when the caller does not supply one.
pub const DEFAULT_APP_WORKSPACE: WorkspaceBox =
    WorkspaceBox::from_extents([-2.0, -2.0, -2.0, 2.0, 2.0, 3.0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    /// Named device; `None` opens the driver's default device.
    pub name: Option<String>,
    pub app_workspace: WorkspaceBox,
    pub preserve_aspect: bool,
    pub error_policy: ErrorPolicy,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: None,
            app_workspace: DEFAULT_APP_WORKSPACE,
            preserve_aspect: true,
            error_policy: ErrorPolicy::Propagate,
        }
    }
}

/// Generation number of a synchronize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncTicket(pub u64);

pub struct HapticsDevice<D: HapticDriver> {
    driver: D,
    settings: DeviceSettings,
    check: DriverCheck,
    state: LifecycleState,
    servo: Arc<ServoState>,
    device: DeviceHandle,
    callback: CallbackHandle,
    transform: Option<Transform>,
}

impl<D: HapticDriver> HapticsDevice<D> {
    pub fn new(driver: D) -> Self {
        Self::with_settings(driver, DeviceSettings::default())
    }

    pub fn with_settings(driver: D, settings: DeviceSettings) -> Self {
        Self {
            driver,
            check: DriverCheck::new(settings.error_policy),
            settings,
            state: LifecycleState::Uninitialized,
            servo: Arc::new(ServoState::new()),
            device: DeviceHandle::INVALID,
            callback: CallbackHandle::INVALID,
            transform: None,
        }
    }

    /// Open, start and hook the device, then compute the session transform.
    ///
    /// Calling it while running is a no-op. After a failed start the partially
    /// acquired handles stay held until `stop_device`; starting again before
    /// that is rejected with `HapticsError::State`.
    pub fn start_device(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Running => {
                tracing::warn!("start_device while running; ignored");
                return Ok(());
            }
            LifecycleState::Uninitialized => {}
            other => {
                return Err(HapticsError::State(format!("cannot start from {other:?}")));
            }
        }
        if self.device.is_valid() || self.callback.is_valid() {
            return Err(HapticsError::State(
                "previous start left handles open; call stop_device first".into(),
            ));
        }

        self.state = LifecycleState::Starting;
        match self.start_sequence() {
            Ok(transform) => {
                self.transform = Some(transform);
                self.state = LifecycleState::Running;
                tracing::info!(
                    device = ?self.device,
                    callback = ?self.callback,
                    scale = ?transform.scale(),
                    "haptic device running"
                );
                Ok(())
            }
            Err(e) => {
                self.state = LifecycleState::Uninitialized;
                Err(e)
            }
        }
    }

    fn start_sequence(&mut self) -> Result<Transform> {
        let check = self.check;
        let name = self.settings.name.clone();

        let handle = self.driver.open(name.as_deref());
        if !handle.is_valid() {
            let code = self.driver.last_error();
            return Err(check.fail(HapticsError::DriverOpen { name, code }));
        }
        self.device = handle;
        check.after(&mut self.driver, "open")?;
        tracing::debug!(device = ?handle, "device opened");

        check.call(&mut self.driver, "start", |d| d.start())?;

        // Stale command from an earlier session must not reach the new one.
        self.servo.reset_force();
        let op = ServoState::contact_op(self.servo.clone());
        // Keep a handle the driver issued even if it then reports an error, so
        // teardown unregisters it.
        let callback = self.driver.register_servo_op(op, Scheduling::Continuous);
        if callback.is_valid() {
            self.callback = callback;
        }
        check.after(&mut self.driver, "register_servo_op")?;
        if !callback.is_valid() {
            return Err(check.fail(HapticsError::DriverOperation {
                op: "register_servo_op",
                code: haptics_traits::DriverErrorCode::InvalidHandle,
            }));
        }

        check.call(&mut self.driver, "make_current", |d| d.make_current(handle))?;
        let device_ws = check.call(&mut self.driver, "workspace", |d| d.workspace())?;
        tracing::debug!(workspace = ?device_ws.extents(), "device workspace");

        let transform = Transform::compute(
            &device_ws,
            &self.settings.app_workspace,
            self.settings.preserve_aspect,
        )?;
        Ok(transform)
    }

    /// Release whatever the device holds. Safe in any state and idempotent.
    ///
    /// Teardown always runs to the end; the first driver error seen is returned.
    pub fn stop_device(&mut self) -> Result<()> {
        let check = self.check;
        self.state = LifecycleState::Stopping;
        let mut first_err: Option<HapticsError> = None;
        let mut keep = |r: Result<()>| {
            if let Err(e) = r {
                first_err.get_or_insert(e);
            }
        };

        if self.callback.is_valid() {
            let cb = self.callback;
            keep(check.call(&mut self.driver, "unregister_servo_op", |d| {
                d.unregister_servo_op(cb);
            }));
            self.callback = CallbackHandle::INVALID;
        }
        keep(check.call(&mut self.driver, "stop", |d| d.stop()));
        if self.device.is_valid() {
            let h = self.device;
            keep(check.call(&mut self.driver, "close", |d| d.close(h)));
            self.device = DeviceHandle::INVALID;
        }

        self.transform = None;
        self.state = LifecycleState::Uninitialized;
        match first_err {
            None => {
                tracing::debug!("haptic device stopped");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }

    /// Overwrite the pending force command. Last write wins.
    pub fn send_force(&mut self, force: Vector3) -> Result<()> {
        if !force.is_finite() {
            return Err(HapticsError::InvalidArgument(format!(
                "force must be finite, got {force:?}"
            )));
        }
        self.servo.set_force(force);
        Ok(())
    }

    /// Last synchronized tool position (device units). Zero before the first sync.
    pub fn get_position(&self) -> Vector3 {
        self.servo.app_snapshot().position
    }

    pub fn is_button_down(&self) -> bool {
        self.servo.app_snapshot().button_down
    }

    pub fn snapshot(&self) -> ServoSnapshot {
        self.servo.app_snapshot()
    }

    pub fn is_initialized(&self) -> bool {
        self.state == LifecycleState::Running
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Ask the servo thread for one copy of its state. Does not wait for it.
    pub fn synchronize(&mut self) -> Result<SyncTicket> {
        if self.state != LifecycleState::Running {
            return Err(HapticsError::NotInitialized);
        }
        let generation = self.servo.next_sync_generation();
        let op = ServoState::state_op(self.servo.clone(), generation);
        let handle = self.check.call(&mut self.driver, "register_servo_op", |d| {
            d.register_servo_op(op, Scheduling::OneShot)
        })?;
        if !handle.is_valid() {
            return Err(self.check.fail(HapticsError::DriverOperation {
                op: "register_servo_op",
                code: haptics_traits::DriverErrorCode::InvalidHandle,
            }));
        }
        Ok(SyncTicket(generation))
    }

    /// True once the copy requested by `ticket` (or a later one) has landed.
    pub fn sync_completed(&self, ticket: SyncTicket) -> bool {
        self.servo.last_synced() >= ticket.0
    }

    pub fn last_synced(&self) -> Option<SyncTicket> {
        match self.servo.last_synced() {
            0 => None,
            g => Some(SyncTicket(g)),
        }
    }

    /// Device-to-application transform of the running session.
    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Synchronized position mapped into application units.
    pub fn position_in_app_space(&self) -> Option<Vector3> {
        self.transform.map(|t| t.apply(self.get_position()))
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn servo_state(&self) -> &Arc<ServoState> {
        &self.servo
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: HapticDriver> Drop for HapticsDevice<D> {
    fn drop(&mut self) {
        if self.state == LifecycleState::Uninitialized
            && !self.device.is_valid()
            && !self.callback.is_valid()
        {
            return;
        }
        if let Err(e) = self.stop_device() {
            tracing::warn!(error = %e, "stop_device failed during drop");
        }
    }
}
