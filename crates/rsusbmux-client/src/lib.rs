//! High-level client for the usbmux daemon.
//!
//! This is the "just works" layer. Connect to the daemon, watch devices
//! attach and detach, and open TCP-like tunnels to ports on a device.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! let mux = rsusbmux_client::connect_to_usbmux()?;
//! let device_id = mux.wait_for_attach(Some(Duration::from_secs(5)))?;
//! let tunnel = mux.connect_to_device(device_id, 5000)?;
//! # let _ = tunnel;
//! # Ok::<(), rsusbmux_client::MuxError>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod mux;
pub mod registry;
pub mod tunnel;

pub use config::{MuxConfig, DEFAULT_MAX_WAIT};
pub use error::{MuxError, Result};
pub use events::{DeviceEvent, EventSubscription};
pub use mux::{connect_to_usbmux, connect_to_usbmux_with_config, UsbMux};
pub use registry::DeviceRegistry;
pub use tunnel::{DeviceTunnel, TunnelReader, TunnelWriter};
