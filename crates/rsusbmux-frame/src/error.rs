/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header carries a protocol version other than 1.
    #[error("unsupported protocol version {version} from usbmux stream (expected 1)")]
    UnsupportedVersion { version: u32 },

    /// The declared frame length is shorter than the 16-byte header.
    #[error("declared frame length {length} is shorter than the 16-byte header")]
    InvalidLength { length: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload is not a well-formed property list.
    #[error("malformed plist payload: {0}")]
    Plist(#[from] plist::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True if the stream produced data that cannot be trusted further.
    ///
    /// A connection that yields one of these must be torn down; I/O errors and
    /// clean closes are ordinary transport outcomes, not protocol violations.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            FrameError::UnsupportedVersion { .. }
                | FrameError::InvalidLength { .. }
                | FrameError::PayloadTooLarge { .. }
                | FrameError::Plist(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
