//! Client for the usbmux device multiplexer daemon.
//!
//! rsusbmux speaks the daemon's length-prefixed plist control protocol:
//! it tracks device attach/detach events and opens TCP-like tunnels to
//! ports on attached devices.
//!
//! # Crate Structure
//!
//! - [`transport`] — Platform transport to the daemon (UDS, loopback TCP)
//! - [`frame`] — Length-prefixed plist message framing
//! - [`client`] — Device registry, attach waiters and tunnels

/// Re-export transport types.
pub mod transport {
    pub use rsusbmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rsusbmux_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use rsusbmux_client::*;
}
