use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::Shutdown;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rsusbmux_frame::{device_id_of, FrameConfig, FrameError, FrameReader, FrameWriter, Message};
use rsusbmux_transport::{MuxStream, TransportError};
use tracing::{debug, info, trace, warn};

use crate::config::MuxConfig;
use crate::error::{MuxError, Result};
use crate::events::EventSubscription;
use crate::registry::DeviceRegistry;
use crate::tunnel::DeviceTunnel;

/// A connection to the usbmux daemon.
///
/// Holds the long-lived listen connection. A background thread reads
/// attach/detach events off it and feeds the device registry; tunnels are
/// opened over fresh connections, one per [`connect_to_device`] call.
///
/// The attached-device table populates asynchronously and may still be empty
/// right after [`connect`] returns; use [`wait_for_attach`] or [`events`] to
/// synchronize with the daemon.
///
/// [`connect`]: UsbMux::connect
/// [`connect_to_device`]: UsbMux::connect_to_device
/// [`wait_for_attach`]: UsbMux::wait_for_attach
/// [`events`]: UsbMux::events
pub struct UsbMux {
    config: MuxConfig,
    registry: Arc<DeviceRegistry>,
    control: MuxStream,
    listener: Option<JoinHandle<()>>,
}

/// Connect to the usbmux daemon with default configuration.
pub fn connect_to_usbmux() -> Result<UsbMux> {
    UsbMux::connect(MuxConfig::default())
}

/// Connect to the usbmux daemon with explicit configuration.
pub fn connect_to_usbmux_with_config(config: MuxConfig) -> Result<UsbMux> {
    UsbMux::connect(config)
}

impl UsbMux {
    /// Open the listen connection and subscribe to device events.
    ///
    /// Sends a `Listen` request and blocks until the daemon acknowledges it
    /// with `Result 0`; any other number fails with
    /// [`MuxError::ConnectionFailed`].
    pub fn connect(config: MuxConfig) -> Result<Self> {
        let stream = config.endpoint().connect()?;
        let control = stream.try_clone()?;

        let frame_config = FrameConfig {
            read_timeout: Some(config.handshake_timeout),
            write_timeout: Some(config.handshake_timeout),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_stream(stream.try_clone()?, frame_config.clone())?;
        let mut reader = FrameReader::with_config_stream(stream, frame_config)?;

        let registry = Arc::new(DeviceRegistry::new());

        writer.send_message(&Message::listen(&config.client_version, &config.prog_name))?;
        await_listen_result(&mut reader, &registry, config.handshake_timeout)?;

        // The event stream has no natural cadence; reads block indefinitely
        // from here on.
        reader.get_ref().set_read_timeout(None)?;
        reader.get_ref().set_write_timeout(None)?;

        let thread_registry = Arc::clone(&registry);
        let listener = thread::Builder::new()
            .name("usbmux-listen".to_string())
            .spawn(move || listen_loop(reader, thread_registry))
            .map_err(|err| {
                MuxError::ConnectionFailed(format!("failed to spawn listen thread: {err}"))
            })?;

        info!("listening for usbmux device events");

        Ok(Self {
            config,
            registry,
            control,
            listener: Some(listener),
        })
    }

    /// Snapshot of currently attached devices, keyed by device id.
    pub fn attached(&self) -> std::collections::HashMap<u32, rsusbmux_frame::DeviceProperties> {
        self.registry.snapshot()
    }

    /// The device registry backing this handle.
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Block until the next device attaches. See
    /// [`DeviceRegistry::wait_for_attach`].
    pub fn wait_for_attach(&self, timeout: Option<Duration>) -> Result<u32> {
        self.registry.wait_for_attach(timeout)
    }

    /// Subscribe to attach/detach events.
    ///
    /// With `include_existing`, attach events for already-known devices are
    /// replayed ahead of live ones.
    pub fn events(&self, include_existing: bool) -> EventSubscription {
        self.registry.subscribe(include_existing)
    }

    /// Wait for a device with the given serial number to attach.
    ///
    /// Already-attached devices are checked first; the comparison is
    /// case-insensitive. Fails with [`MuxError::Timeout`] if no matching
    /// device appears within `timeout`.
    pub fn wait_for_serial(&self, serial: &str, timeout: Duration) -> Result<u32> {
        let subscription = self.events(true);
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(MuxError::Timeout {
                    waited: timeout,
                    devices_tried: 0,
                });
            }

            match subscription.next_timeout(remaining) {
                Ok(event) => {
                    if let crate::events::DeviceEvent::Attached {
                        device_id,
                        properties,
                    } = event
                    {
                        let matches = properties
                            .get("SerialNumber")
                            .and_then(|value| value.as_string())
                            .is_some_and(|found| found.eq_ignore_ascii_case(serial));
                        if matches {
                            return Ok(device_id);
                        }
                    }
                }
                Err(MuxError::Timeout { .. }) => {
                    return Err(MuxError::Timeout {
                        waited: timeout,
                        devices_tried: 0,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Open a tunnel to a TCP port on a specific device.
    ///
    /// The handshake runs on a fresh connection to the daemon; on success
    /// that connection stops carrying frames and is returned as the tunnel.
    pub fn connect_to_device(&self, device_id: u32, port: u16) -> Result<DeviceTunnel> {
        let timeout = self.config.handshake_timeout;
        let stream = self.config.endpoint().connect()?;
        let write_half = stream.try_clone()?;

        let frame_config = FrameConfig {
            read_timeout: Some(timeout),
            write_timeout: Some(timeout),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_stream(write_half, frame_config.clone())?;
        let mut reader = FrameReader::with_config_stream(stream, frame_config)?;

        writer.send_message(&Message::connect(
            &self.config.client_version,
            &self.config.prog_name,
            device_id,
            port,
        ))?;
        debug!(device_id, port, "sent connect request");

        let deadline = Instant::now() + timeout;
        let number = loop {
            if Instant::now() >= deadline {
                return Err(MuxError::Timeout {
                    waited: timeout,
                    devices_tried: 0,
                });
            }
            match reader.read_message() {
                Ok(Message::Result { number }) => break number,
                Ok(message) => trace!(
                    message_type = message.message_type(),
                    "ignoring message before connect result"
                ),
                Err(FrameError::Io(err)) if is_read_timeout(&err) => continue,
                Err(FrameError::ConnectionClosed) => {
                    return Err(MuxError::ConnectionFailed(format!(
                        "connection closed before a result for device {device_id}"
                    )));
                }
                Err(err) => return Err(err.into()),
            }
        };

        match number {
            0 => {
                // No frame is decoded past this point; whatever the reader
                // already buffered belongs to the tunnel.
                let (read_half, residual) = reader.into_parts();
                read_half.set_read_timeout(None)?;
                read_half.set_write_timeout(None)?;
                debug!(
                    device_id,
                    port,
                    residual = residual.len(),
                    "connect handshake complete"
                );
                Ok(DeviceTunnel::from_parts(
                    read_half,
                    residual,
                    writer.into_inner(),
                ))
            }
            2 => Err(MuxError::DeviceNotConnected { device_id }),
            3 => Err(MuxError::ConnectionRefused { device_id, port }),
            number => Err(MuxError::ConnectionFailed(format!(
                "unexpected result {number} connecting to device {device_id}"
            ))),
        }
    }

    /// Open a tunnel to the first device that accepts the requested port.
    ///
    /// Tries every currently attached device once, then waits (within the
    /// remaining `max_wait` budget) for new devices to attach and tries
    /// those. Fails with [`MuxError::Timeout`] once the budget is spent.
    pub fn connect_to_first_device(&self, port: u16, max_wait: Duration) -> Result<DeviceTunnel> {
        self.connect_to_first_device_filtered(port, max_wait, None, None)
    }

    /// [`connect_to_first_device`](UsbMux::connect_to_first_device) with
    /// optional device-id allowlist/denylist.
    pub fn connect_to_first_device_filtered(
        &self,
        port: u16,
        max_wait: Duration,
        include: Option<&[u32]>,
        exclude: Option<&[u32]>,
    ) -> Result<DeviceTunnel> {
        // A queued subscription (with already-attached devices replayed)
        // rather than a snapshot-then-wait loop: an attach landing between
        // two looks can never be missed.
        let subscription = self.events(true);
        let deadline = Instant::now() + max_wait;
        let mut seen: HashSet<u32> = HashSet::new();
        let mut devices_tried = 0usize;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(MuxError::Timeout {
                    waited: max_wait,
                    devices_tried,
                });
            }

            let device_id = match subscription.next_timeout(remaining) {
                Ok(crate::events::DeviceEvent::Attached { device_id, .. }) => device_id,
                Ok(crate::events::DeviceEvent::Detached { .. }) => continue,
                Err(MuxError::Timeout { .. }) => {
                    return Err(MuxError::Timeout {
                        waited: max_wait,
                        devices_tried,
                    });
                }
                Err(err) => return Err(err),
            };

            if !seen.insert(device_id) {
                continue;
            }
            if let Some(include) = include {
                if !include.contains(&device_id) {
                    continue;
                }
            }
            if let Some(exclude) = exclude {
                if exclude.contains(&device_id) {
                    continue;
                }
            }

            devices_tried += 1;
            match self.connect_to_device(device_id, port) {
                Ok(tunnel) => return Ok(tunnel),
                Err(err) if err.is_device_error() => {
                    debug!(device_id, %err, "device rejected tunnel, trying next");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Shut down the listen connection and wait for the reader thread.
    ///
    /// Pending waiters and subscriptions fail with
    /// [`MuxError::Disconnected`]; later calls fail fast. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.registry.close("usbmux handle closed".to_string());
        match self.control.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(TransportError::Io(err)) if err.kind() == ErrorKind::NotConnected => {}
            Err(err) => return Err(err.into()),
        }
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for UsbMux {
    fn drop(&mut self) {
        // Unblock the reader thread; it exits on its own once the socket dies.
        let _ = self.control.shutdown(Shutdown::Both);
    }
}

impl std::fmt::Debug for UsbMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbMux")
            .field("socket_path", &self.config.socket_path)
            .field("attached", &self.registry.device_ids())
            .finish()
    }
}

fn await_listen_result(
    reader: &mut FrameReader<MuxStream>,
    registry: &DeviceRegistry,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() >= deadline {
            return Err(MuxError::Timeout {
                waited: timeout,
                devices_tried: 0,
            });
        }
        match reader.read_message() {
            Ok(Message::Result { number: 0 }) => return Ok(()),
            Ok(Message::Result { number }) => {
                return Err(MuxError::ConnectionFailed(format!(
                    "listen request rejected with result {number}"
                )));
            }
            // The daemon may flush device events around the acknowledgement.
            Ok(message) => apply_event(registry, message),
            Err(FrameError::Io(err)) if is_read_timeout(&err) => continue,
            Err(FrameError::ConnectionClosed) => {
                return Err(MuxError::ConnectionFailed(
                    "connection closed before listen result".to_string(),
                ));
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn listen_loop(mut reader: FrameReader<MuxStream>, registry: Arc<DeviceRegistry>) {
    loop {
        match reader.read_message() {
            Ok(message) => apply_event(&registry, message),
            Err(FrameError::ConnectionClosed) => {
                debug!("usbmux listen connection closed");
                registry.close("usbmux daemon closed the listen connection".to_string());
                return;
            }
            Err(err) => {
                warn!(%err, "usbmux listen connection failed");
                registry.close(err.to_string());
                return;
            }
        }
    }
}

fn apply_event(registry: &DeviceRegistry, message: Message) {
    match message {
        Message::Attached { properties } => match device_id_of(&properties) {
            Some(device_id) => registry.apply_attached(device_id, properties),
            None => warn!("attached event without a usable DeviceID"),
        },
        Message::Detached { device_id } => registry.apply_detached(device_id),
        Message::Unknown => trace!("ignoring unrecognized message type"),
        other => warn!(
            message_type = other.message_type(),
            "unexpected message on listen connection"
        ),
    }
}

fn is_read_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
