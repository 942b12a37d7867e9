use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("invalid simulator parameters: {0}")]
    InvalidParams(String),
    #[error("servo thread: {0}")]
    ServoThread(String),
    #[error("real-time scheduling: {0}")]
    Rt(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
