//! Length-prefixed plist framing for the usbmux control protocol.
//!
//! Every control message is framed with a 16-byte header:
//! - A 4-byte little-endian total length (header included)
//! - A 4-byte protocol version (always 1)
//! - A 4-byte request type (8 = plist payload)
//! - A 4-byte message tag
//!
//! followed by an XML property-list payload of `length - 16` bytes.
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MESSAGE_TAG,
    PROTOCOL_VERSION, REQUEST_TYPE_PLIST,
};
pub use error::{FrameError, Result};
pub use message::{
    decode_payload, device_id_of, encode_payload, DeviceProperties, Message, CLIENT_VERSION_STRING,
    PROG_NAME,
};
pub use reader::FrameReader;
pub use writer::FrameWriter;
