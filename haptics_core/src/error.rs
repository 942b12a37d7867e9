use haptics_traits::DriverErrorCode;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HapticsError {
    /// `open` returned an invalid handle.
    #[error("failed to open haptic device{}{}", fmt_name(.name), fmt_code(.code))]
    DriverOpen {
        name: Option<String>,
        code: Option<DriverErrorCode>,
    },
    /// The driver reported an error code right after `op`.
    #[error("driver {op} failed: {code}")]
    DriverOperation {
        op: &'static str,
        code: DriverErrorCode,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid workspace: {0}")]
    InvalidWorkspace(String),
    #[error("device is not initialized")]
    NotInitialized,
    #[error("invalid state: {0}")]
    State(String),
}

fn fmt_name(name: &Option<String>) -> String {
    name.as_deref().map(|n| format!(" '{n}'")).unwrap_or_default()
}

fn fmt_code(code: &Option<DriverErrorCode>) -> String {
    code.map(|c| format!(": {c}")).unwrap_or_default()
}

impl HapticsError {
    /// Driver error code carried by this error, if any.
    pub fn driver_code(&self) -> Option<DriverErrorCode> {
        match self {
            Self::DriverOpen { code, .. } => *code,
            Self::DriverOperation { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HapticsError>;
