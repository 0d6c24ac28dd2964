use std::path::PathBuf;

/// Errors that can occur while reaching the usbmux daemon.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the daemon endpoint.
    #[error("failed to connect to usbmux at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
