//! Boolean facade for an embedding layer (script bindings, FFI).
//!
//! Calls map one-to-one onto `HapticsDevice` but never return errors: failures
//! are logged and reported as `false`. Debug messages go to the
//! `haptics::console` tracing target while the debug flag is set.

use crate::device::{HapticsDevice, SyncTicket};
use haptics_traits::{HapticDriver, Vector3};

pub struct HapticsService<D: HapticDriver> {
    device: HapticsDevice<D>,
    debug: bool,
}

impl<D: HapticDriver> HapticsService<D> {
    pub fn new(device: HapticsDevice<D>) -> Self {
        Self {
            device,
            debug: false,
        }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, on: bool) {
        self.debug = on;
    }

    fn console(&self, msg: &str) {
        if self.debug {
            tracing::debug!(target: "haptics::console", "{msg}");
        }
    }

    /// Returns the initialized flag after the attempt.
    ///
    /// A failed start is torn down right away so the next call starts clean.
    pub fn start_device(&mut self) -> bool {
        self.console("StartDevice");
        if let Err(e) = self.device.start_device() {
            tracing::error!(error = %e, "start_device failed");
            if let Err(e) = self.device.stop_device() {
                tracing::warn!(error = %e, "cleanup after failed start");
            }
        }
        self.device.is_initialized()
    }

    /// Returns the initialized flag after stopping, i.e. `false`.
    pub fn stop_device(&mut self) -> bool {
        self.console("StopDevice");
        if let Err(e) = self.device.stop_device() {
            tracing::error!(error = %e, "stop_device failed");
        }
        self.device.is_initialized()
    }

    /// Accepts exactly three finite components; anything else is rejected and
    /// the pending force stays as it was.
    pub fn send_force(&mut self, force: &[f64]) -> bool {
        let Some(v) = Vector3::from_slice(force) else {
            self.console("SendForce: expected 3 components");
            tracing::debug!(len = force.len(), "send_force rejected");
            return false;
        };
        match self.device.send_force(v) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "send_force rejected");
                false
            }
        }
    }

    pub fn get_position(&self) -> [f64; 3] {
        self.device.get_position().to_array()
    }

    pub fn is_button_down(&self) -> bool {
        self.device.is_button_down()
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_initialized()
    }

    pub fn synchronize(&mut self) -> bool {
        self.sync_ticket().is_some()
    }

    /// Like `synchronize`, keeping the ticket for completion polling.
    pub fn sync_ticket(&mut self) -> Option<SyncTicket> {
        match self.device.synchronize() {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::debug!(error = %e, "synchronize failed");
                None
            }
        }
    }

    pub fn device(&self) -> &HapticsDevice<D> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut HapticsDevice<D> {
        &mut self.device
    }

    pub fn into_inner(self) -> HapticsDevice<D> {
        self.device
    }
}
