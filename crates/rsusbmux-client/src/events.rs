use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use rsusbmux_frame::DeviceProperties;

use crate::error::{MuxError, Result};
use crate::registry::DeviceRegistry;

/// A device lifecycle notification from the listen connection.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A device became available through the mux.
    Attached {
        device_id: u32,
        properties: DeviceProperties,
    },
    /// A device went away. Carries the properties it attached with.
    Detached {
        device_id: u32,
        properties: DeviceProperties,
    },
}

impl DeviceEvent {
    /// The device this event is about.
    pub fn device_id(&self) -> u32 {
        match self {
            DeviceEvent::Attached { device_id, .. } | DeviceEvent::Detached { device_id, .. } => {
                *device_id
            }
        }
    }
}

/// A live subscription to attach/detach events.
///
/// Events arrive in the order their frames were received on the listen
/// connection. Multiple subscriptions each receive every event. Dropping
/// the subscription unregisters it.
pub struct EventSubscription {
    registry: Arc<DeviceRegistry>,
    token: u64,
    rx: mpsc::Receiver<DeviceEvent>,
}

impl EventSubscription {
    pub(crate) fn new(
        registry: Arc<DeviceRegistry>,
        token: u64,
        rx: mpsc::Receiver<DeviceEvent>,
    ) -> Self {
        Self {
            registry,
            token,
            rx,
        }
    }

    /// Block until the next event arrives.
    ///
    /// Fails with [`MuxError::Disconnected`] once the listen connection is
    /// gone and all buffered events have been drained.
    pub fn next(&self) -> Result<DeviceEvent> {
        self.rx.recv().map_err(|_| self.disconnected())
    }

    /// Block until the next event arrives or `timeout` elapses.
    pub fn next_timeout(&self, timeout: Duration) -> Result<DeviceEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(event),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(MuxError::Timeout {
                waited: timeout,
                devices_tried: 0,
            }),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(self.disconnected()),
        }
    }

    fn disconnected(&self) -> MuxError {
        MuxError::Disconnected(self.registry.close_reason())
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.token);
    }
}
