//! Driver call-then-check wrapper.
//!
//! Every state-mutating driver call is followed by `last_error()`. `DriverCheck`
//! performs the call, reads the code, turns it into a typed `HapticsError` and
//! applies the configured `ErrorPolicy`.

use crate::error::{HapticsError, Result};
use haptics_traits::HapticDriver;

/// What to do once a driver error has been detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Return the error to the caller; the device stays usable for a retry.
    #[default]
    Propagate,
    /// Log the error and abort the process.
    Abort,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DriverCheck {
    policy: ErrorPolicy,
}

impl DriverCheck {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Run `f` against the driver and check `last_error()` right after it.
    pub fn call<D, T>(&self, driver: &mut D, op: &'static str, f: impl FnOnce(&mut D) -> T) -> Result<T>
    where
        D: HapticDriver + ?Sized,
    {
        let out = f(driver);
        self.after(driver, op)?;
        Ok(out)
    }

    /// Check `last_error()` for a call that was already made.
    pub fn after<D>(&self, driver: &mut D, op: &'static str) -> Result<()>
    where
        D: HapticDriver + ?Sized,
    {
        match driver.last_error() {
            None => Ok(()),
            Some(code) => Err(self.fail(HapticsError::DriverOperation { op, code })),
        }
    }

    /// Apply the policy to an already-built error and hand it back.
    pub fn fail(&self, err: HapticsError) -> HapticsError {
        match self.policy {
            ErrorPolicy::Propagate => {
                tracing::warn!(error = %err, "driver error");
                err
            }
            ErrorPolicy::Abort => {
                tracing::error!(error = %err, "fatal driver error; aborting");
                std::process::abort()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{DriverOp, ManualDriver};
    use haptics_traits::DriverErrorCode;

    #[test]
    fn call_returns_value_when_driver_is_clean() {
        let mut d = ManualDriver::new();
        let check = DriverCheck::default();
        let h = check.call(&mut d, "open", |d| d.open(None)).unwrap();
        assert!(h.is_valid());
    }

    #[test]
    fn call_maps_error_code_to_typed_error() {
        let mut d = ManualDriver::new();
        d.fail_on(DriverOp::Start, DriverErrorCode::ServoThread);
        let check = DriverCheck::new(ErrorPolicy::Propagate);
        let _ = d.open(None);
        let err = check.call(&mut d, "start", |d| d.start()).unwrap_err();
        assert_eq!(
            err,
            HapticsError::DriverOperation {
                op: "start",
                code: DriverErrorCode::ServoThread
            }
        );
        // the code was consumed by the check
        assert!(check.after(&mut d, "start").is_ok());
    }
}
