use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rsusbmux_frame::DeviceProperties;
use tracing::debug;

use crate::error::{MuxError, Result};
use crate::events::{DeviceEvent, EventSubscription};

/// Tracks currently attached devices and wakes attach waiters.
///
/// Only the listen-connection reader thread mutates device membership;
/// everything read out of here is a point-in-time snapshot taken under the
/// lock, and may be stale by the time the caller looks at it.
pub struct DeviceRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    devices: HashMap<u32, DeviceProperties>,
    waiters: HashMap<u64, mpsc::Sender<u32>>,
    subscribers: HashMap<u64, mpsc::Sender<DeviceEvent>>,
    next_token: u64,
    closed: Option<String>,
}

impl RegistryInner {
    fn alloc_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    fn notify(&mut self, event: DeviceEvent) {
        self.subscribers
            .retain(|_, subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn close_reason(&self) -> String {
        self.closed
            .clone()
            .unwrap_or_else(|| "usbmux listen connection closed".to_string())
    }
}

impl DeviceRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                devices: HashMap::new(),
                waiters: HashMap::new(),
                subscribers: HashMap::new(),
                next_token: 0,
                closed: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of currently attached devices, keyed by device id.
    pub fn snapshot(&self) -> HashMap<u32, DeviceProperties> {
        self.lock().devices.clone()
    }

    /// Currently attached device ids, in ascending order.
    pub fn device_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.lock().devices.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Properties of one attached device, if present.
    pub fn properties(&self, device_id: u32) -> Option<DeviceProperties> {
        self.lock().devices.get(&device_id).cloned()
    }

    /// True once the listen connection reached its terminal closed state.
    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    pub(crate) fn close_reason(&self) -> String {
        self.lock().close_reason()
    }

    /// Record a device and wake every pending attach waiter with its id.
    pub(crate) fn apply_attached(&self, device_id: u32, properties: DeviceProperties) {
        let mut inner = self.lock();
        debug!(device_id, "device attached");
        inner.devices.insert(device_id, properties.clone());
        for (_, waiter) in std::mem::take(&mut inner.waiters) {
            let _ = waiter.send(device_id);
        }
        inner.notify(DeviceEvent::Attached {
            device_id,
            properties,
        });
    }

    /// Drop a device. A detach for an unknown id is tolerated silently.
    pub(crate) fn apply_detached(&self, device_id: u32) {
        let mut inner = self.lock();
        if let Some(properties) = inner.devices.remove(&device_id) {
            debug!(device_id, "device detached");
            inner.notify(DeviceEvent::Detached {
                device_id,
                properties,
            });
        }
    }

    /// Enter the terminal closed state. The first reason recorded wins;
    /// every pending waiter and subscription is woken with it.
    pub(crate) fn close(&self, reason: String) {
        let mut inner = self.lock();
        if inner.closed.is_none() {
            debug!(%reason, "device registry closed");
            inner.closed = Some(reason);
        }
        inner.waiters.clear();
        inner.subscribers.clear();
    }

    /// Block until the next device attaches, or until `timeout` elapses.
    ///
    /// The waiter is removed from the pending set on every exit path, so a
    /// late attach can never resolve a call that already timed out.
    pub fn wait_for_attach(&self, timeout: Option<Duration>) -> Result<u32> {
        let (tx, rx) = mpsc::channel();
        let token = {
            let mut inner = self.lock();
            if let Some(reason) = &inner.closed {
                return Err(MuxError::Disconnected(reason.clone()));
            }
            let token = inner.alloc_token();
            inner.waiters.insert(token, tx);
            token
        };

        let received = match timeout {
            Some(timeout) => rx.recv_timeout(timeout),
            None => rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(device_id) => Ok(device_id),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let mut inner = self.lock();
                if inner.waiters.remove(&token).is_some() {
                    Err(MuxError::Timeout {
                        waited: timeout.unwrap_or_default(),
                        devices_tried: 0,
                    })
                } else if let Ok(device_id) = rx.try_recv() {
                    // An attach resolved this waiter just as the timeout
                    // fired; deliver it instead of dropping the event.
                    Ok(device_id)
                } else {
                    Err(MuxError::Disconnected(inner.close_reason()))
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let mut inner = self.lock();
                inner.waiters.remove(&token);
                Err(MuxError::Disconnected(inner.close_reason()))
            }
        }
    }

    /// Register a subscription for subsequent attach/detach events.
    ///
    /// With `include_existing`, attach events for already-known devices are
    /// replayed into the subscription ahead of live ones.
    pub fn subscribe(self: &Arc<Self>, include_existing: bool) -> EventSubscription {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.lock();

        if include_existing {
            let mut ids: Vec<u32> = inner.devices.keys().copied().collect();
            ids.sort_unstable();
            for device_id in ids {
                let properties = inner.devices[&device_id].clone();
                let _ = tx.send(DeviceEvent::Attached {
                    device_id,
                    properties,
                });
            }
        }

        let token = inner.alloc_token();
        if inner.closed.is_none() {
            inner.subscribers.insert(token, tx);
        }
        drop(inner);

        EventSubscription::new(Arc::clone(self), token, rx)
    }

    pub(crate) fn unsubscribe(&self, token: u64) {
        self.lock().subscribers.remove(&token);
    }
}
