pub mod clock;
pub mod geometry;

pub use clock::{Clock, MonotonicClock};
pub use geometry::{Vector3, WorkspaceBox};

use core::fmt;

/// Opaque device identifier issued by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

impl DeviceHandle {
    pub const INVALID: Self = Self(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Opaque servo-op identifier issued by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(pub u32);

impl CallbackHandle {
    pub const INVALID: Self = Self(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Value returned by a servo op after each invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoOpExit {
    /// Invoke again on the next servo cycle.
    Continue,
    /// Remove the op; it will not be invoked again.
    Exit,
}

/// How a servo op is scheduled once registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// Re-armed every cycle until it returns `Exit` or is unregistered.
    Continuous,
    /// Invoked exactly once on the next cycle.
    OneShot,
}

/// Error codes reported by `HapticDriver::last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorCode {
    DeviceNotFound,
    DeviceBusy,
    InvalidHandle,
    NotStarted,
    ServoThread,
    CommunicationLost,
    ForceOutOfRange,
    Vendor(i32),
}

impl DriverErrorCode {
    /// Stable numeric code for logs and exit statuses.
    pub fn code(self) -> i32 {
        match self {
            Self::DeviceNotFound => 1,
            Self::DeviceBusy => 2,
            Self::InvalidHandle => 3,
            Self::NotStarted => 4,
            Self::ServoThread => 5,
            Self::CommunicationLost => 6,
            Self::ForceOutOfRange => 7,
            Self::Vendor(c) => c,
        }
    }

    /// Inverse of `code`; unknown values map to `Vendor`. Zero means "no error".
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => return None,
            1 => Self::DeviceNotFound,
            2 => Self::DeviceBusy,
            3 => Self::InvalidHandle,
            4 => Self::NotStarted,
            5 => Self::ServoThread,
            6 => Self::CommunicationLost,
            7 => Self::ForceOutOfRange,
            other => Self::Vendor(other),
        })
    }
}

impl fmt::Display for DriverErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => f.write_str("device not found"),
            Self::DeviceBusy => f.write_str("device busy"),
            Self::InvalidHandle => f.write_str("invalid handle"),
            Self::NotStarted => f.write_str("servo processing not started"),
            Self::ServoThread => f.write_str("servo thread failure"),
            Self::CommunicationLost => f.write_str("communication with device lost"),
            Self::ForceOutOfRange => f.write_str("force out of range"),
            Self::Vendor(c) => write!(f, "vendor error {c}"),
        }
    }
}

impl std::error::Error for DriverErrorCode {}

/// Tool kinematics and force output, available to servo ops on the servo thread.
pub trait ToolIo {
    fn tool_position(&mut self) -> Vector3;
    fn tool_button(&mut self) -> bool;
    fn set_tool_force(&mut self, force: Vector3);
}

/// Callback run by the driver on its servo thread.
pub type ServoOp = Box<dyn FnMut(&mut dyn ToolIo) -> ServoOpExit + Send + 'static>;

/// Haptic device driver port.
///
/// Calls follow the vendor model: they do not return errors directly, the
/// caller reads `last_error` after each call. Drivers invoke registered ops
/// serially from a single servo thread.
pub trait HapticDriver {
    /// Open the named device, or the default one. `DeviceHandle::INVALID` on failure.
    fn open(&mut self, name: Option<&str>) -> DeviceHandle;
    /// Start servo processing.
    fn start(&mut self);
    /// Stop servo processing; pending ops are discarded.
    fn stop(&mut self);
    fn close(&mut self, handle: DeviceHandle);
    fn register_servo_op(&mut self, op: ServoOp, scheduling: Scheduling) -> CallbackHandle;
    fn unregister_servo_op(&mut self, handle: CallbackHandle);
    /// Direct subsequent calls to `handle`.
    fn make_current(&mut self, handle: DeviceHandle);
    /// Workspace of the current device.
    fn workspace(&mut self) -> WorkspaceBox;
    /// Return and clear the most recent error.
    fn last_error(&mut self) -> Option<DriverErrorCode>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_round_trip_through_numbers() {
        for c in [
            DriverErrorCode::DeviceNotFound,
            DriverErrorCode::CommunicationLost,
            DriverErrorCode::Vendor(4096),
        ] {
            assert_eq!(DriverErrorCode::from_code(c.code()), Some(c));
        }
        assert_eq!(DriverErrorCode::from_code(0), None);
    }

    #[test]
    fn invalid_handles_are_not_valid() {
        assert!(!DeviceHandle::INVALID.is_valid());
        assert!(!CallbackHandle::INVALID.is_valid());
        assert!(DeviceHandle(1).is_valid());
    }
}
