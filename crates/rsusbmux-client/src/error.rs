use std::time::Duration;

/// Errors that can occur in usbmux client operations.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Transport-level error reaching the daemon.
    #[error("transport error: {0}")]
    Transport(#[from] rsusbmux_transport::TransportError),

    /// Frame-level error on a control connection.
    #[error("frame error: {0}")]
    Frame(#[from] rsusbmux_frame::FrameError),

    /// The requested device id is not currently attached.
    #[error("device {device_id} is not currently connected")]
    DeviceNotConnected { device_id: u32 },

    /// The daemon refused the requested port on an otherwise-valid device.
    #[error("connection refused to device_id={device_id} port={port}")]
    ConnectionRefused { device_id: u32, port: u16 },

    /// Generic handshake failure, including the transport closing before a
    /// result arrived.
    #[error("usbmux connection failed: {0}")]
    ConnectionFailed(String),

    /// A bounded wait elapsed without a qualifying event.
    ///
    /// `devices_tried` distinguishes "devices were found but none worked"
    /// from "nothing attached at all".
    #[error("timed out after {waited:?} ({devices_tried} devices tried)")]
    Timeout {
        waited: Duration,
        devices_tried: usize,
    },

    /// The listen connection reached its terminal closed state.
    #[error("usbmux listen connection closed: {0}")]
    Disconnected(String),
}

impl MuxError {
    /// True for per-device handshake failures worth retrying on another
    /// device; transport loss and timeouts are not in this family.
    pub fn is_device_error(&self) -> bool {
        match self {
            MuxError::DeviceNotConnected { .. }
            | MuxError::ConnectionRefused { .. }
            | MuxError::ConnectionFailed(_) => true,
            MuxError::Frame(err) => err.is_protocol_violation(),
            _ => false,
        }
    }

    /// True when the error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MuxError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_are_retryable() {
        assert!(MuxError::DeviceNotConnected { device_id: 1 }.is_device_error());
        assert!(MuxError::ConnectionRefused {
            device_id: 1,
            port: 80
        }
        .is_device_error());
        assert!(MuxError::ConnectionFailed("nope".to_string()).is_device_error());
        assert!(
            MuxError::Frame(rsusbmux_frame::FrameError::UnsupportedVersion { version: 9 })
                .is_device_error()
        );
    }

    #[test]
    fn transport_and_timeout_are_not_retryable() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(!MuxError::Transport(rsusbmux_transport::TransportError::Io(io)).is_device_error());
        assert!(!MuxError::Timeout {
            waited: Duration::from_secs(1),
            devices_tried: 0
        }
        .is_device_error());
        assert!(!MuxError::Disconnected("gone".to_string()).is_device_error());
        assert!(
            !MuxError::Frame(rsusbmux_frame::FrameError::ConnectionClosed).is_device_error()
        );
    }
}
