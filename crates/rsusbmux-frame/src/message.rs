use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Client identifier reported in request payloads.
pub const CLIENT_VERSION_STRING: &str = "rsusbmux";

/// Program name reported in request payloads.
pub const PROG_NAME: &str = "rsusbmux";

/// Device properties reported by the daemon in `Attached` events.
///
/// Opaque beyond `DeviceID`; known keys include `SerialNumber`,
/// `ConnectionType`, `ProductID` and `LocationID`.
pub type DeviceProperties = plist::Dictionary;

/// A control message, tagged by the `MessageType` payload key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "MessageType")]
pub enum Message {
    /// Subscribe to attach/detach events on this connection.
    Listen {
        #[serde(rename = "ClientVersionString")]
        client_version_string: String,
        #[serde(rename = "ProgName")]
        prog_name: String,
    },

    /// Open a tunnel to a TCP port on an attached device.
    Connect {
        #[serde(rename = "ClientVersionString")]
        client_version_string: String,
        #[serde(rename = "ProgName")]
        prog_name: String,
        #[serde(rename = "DeviceID")]
        device_id: u32,
        /// Port in network byte order, as the daemon expects it.
        #[serde(rename = "PortNumber")]
        port_number: u16,
    },

    /// Daemon verdict on the previous request.
    ///
    /// 0 = success, 2 = device not connected, 3 = port refused; anything
    /// else is a generic failure.
    Result {
        #[serde(rename = "Number")]
        number: u32,
    },

    /// A device became available through the mux.
    Attached {
        #[serde(rename = "Properties")]
        properties: DeviceProperties,
    },

    /// A device went away.
    Detached {
        #[serde(rename = "DeviceID")]
        device_id: u32,
    },

    /// Any message type this client does not interpret.
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Build a `Listen` request.
    pub fn listen(client_version_string: &str, prog_name: &str) -> Self {
        Message::Listen {
            client_version_string: client_version_string.to_string(),
            prog_name: prog_name.to_string(),
        }
    }

    /// Build a `Connect` request for a device/port pair.
    ///
    /// `port` is taken in host order and transmitted in network byte order.
    pub fn connect(
        client_version_string: &str,
        prog_name: &str,
        device_id: u32,
        port: u16,
    ) -> Self {
        Message::Connect {
            client_version_string: client_version_string.to_string(),
            prog_name: prog_name.to_string(),
            device_id,
            port_number: port.to_be(),
        }
    }

    /// The wire `MessageType` tag for this message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::Listen { .. } => "Listen",
            Message::Connect { .. } => "Connect",
            Message::Result { .. } => "Result",
            Message::Attached { .. } => "Attached",
            Message::Detached { .. } => "Detached",
            Message::Unknown => "Unknown",
        }
    }
}

/// Serialize a message to its XML plist payload bytes.
pub fn encode_payload(message: &Message) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    plist::to_writer_xml(&mut out, message)?;
    Ok(out)
}

/// Deserialize a plist payload into a message.
pub fn decode_payload(payload: &[u8]) -> Result<Message> {
    Ok(plist::from_bytes(payload)?)
}

/// Extract the integer `DeviceID` from an `Attached` property set.
pub fn device_id_of(properties: &DeviceProperties) -> Option<u32> {
    let value = properties.get("DeviceID")?;
    value
        .as_unsigned_integer()
        .and_then(|n| u32::try_from(n).ok())
        .or_else(|| {
            value
                .as_signed_integer()
                .and_then(|n| u32::try_from(n).ok())
        })
}
