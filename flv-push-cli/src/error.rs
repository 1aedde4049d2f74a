use flv_push_engine::PushError;
use rtmp::RtmpError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Application-level errors for the flv-push CLI.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Push(#[from] PushError),

    #[error("invalid destination: {0}")]
    Destination(#[from] RtmpError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),
}

impl AppError {
    /// Process exit code for this error. Interrupted runs use the
    /// conventional SIGINT code.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Push(e) if e.is_cancelled() => 130,
            AppError::InvalidArgument(_) | AppError::Destination(_) => 2,
            _ => 1,
        }
    }
}
