use std::path::PathBuf;
use std::time::Duration;

use rsusbmux_frame::{CLIENT_VERSION_STRING, PROG_NAME};
use rsusbmux_transport::{MuxEndpoint, DEFAULT_SOCKET_PATH, DEFAULT_SOCKET_PORT};

/// Default budget for waiting on a device in `connect_to_first_device`.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(2);

/// Configuration for connecting to the usbmux daemon.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Daemon socket path (Unix-like platforms).
    pub socket_path: PathBuf,
    /// Daemon TCP port on 127.0.0.1 (Windows).
    pub socket_port: u16,
    /// Timeout for each blocking handshake operation.
    pub handshake_timeout: Duration,
    /// Client version string reported in request payloads.
    pub client_version: String,
    /// Program name reported in request payloads.
    pub prog_name: String,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            socket_port: DEFAULT_SOCKET_PORT,
            handshake_timeout: Duration::from_secs(5),
            client_version: CLIENT_VERSION_STRING.to_string(),
            prog_name: PROG_NAME.to_string(),
        }
    }
}

impl MuxConfig {
    /// The daemon endpoint this configuration points at.
    pub fn endpoint(&self) -> MuxEndpoint {
        MuxEndpoint::new(&self.socket_path, self.socket_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_daemon_defaults() {
        let config = MuxConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/var/run/usbmuxd"));
        assert_eq!(config.socket_port, 27015);
        assert_eq!(config.client_version, "rsusbmux");
        assert_eq!(config.prog_name, "rsusbmux");
    }

    #[test]
    fn endpoint_carries_both_addresses() {
        let config = MuxConfig {
            socket_path: PathBuf::from("/tmp/muxd.sock"),
            socket_port: 9999,
            ..MuxConfig::default()
        };
        let endpoint = config.endpoint();
        assert_eq!(endpoint.socket_path(), config.socket_path.as_path());
        assert_eq!(endpoint.socket_port(), 9999);
    }
}
