use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: length (4) + version (4) + request type (4) + message tag (4).
pub const HEADER_SIZE: usize = 16;

/// Protocol version spoken by the daemon.
pub const PROTOCOL_VERSION: u32 = 1;

/// Request type for plist-encoded payloads, the only kind the daemon accepts.
pub const REQUEST_TYPE_PLIST: u32 = 8;

/// Message tag stamped on outgoing frames.
pub const MESSAGE_TAG: u32 = 1;

/// Default maximum payload size: 1 MiB.
///
/// Control payloads are small property lists; anything near this limit is a
/// corrupt length field.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// A decoded control frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Request type field from the header.
    pub request: u32,
    /// Message tag field from the header.
    pub tag: u32,
    /// The raw plist payload.
    pub payload: Bytes,
}

impl Frame {
    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a plist payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────────┬──────────────┬──────────────┬───────────┬──────────────────┐
/// │ Length (4B LE)│ Version (4B) │ Request (4B) │ Tag (4B)  │ Payload           │
/// │ incl. header  │ = 1          │ = 8 (plist)  │ = 1       │ (Length-16 bytes) │
/// └───────────────┴──────────────┴──────────────┴───────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize - HEADER_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize - HEADER_SIZE,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le((HEADER_SIZE + payload.len()) as u32);
    dst.put_u32_le(PROTOCOL_VERSION);
    dst.put_u32_le(REQUEST_TYPE_PLIST);
    dst.put_u32_le(MESSAGE_TAG);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet;
/// a frame is complete only once its declared length is fully buffered.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < 4 {
        return Ok(None); // Need more data
    }

    let total = u32::from_le_bytes(src[0..4].try_into().unwrap()) as usize;

    if total >= HEADER_SIZE && total - HEADER_SIZE > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: total - HEADER_SIZE,
            max: max_payload,
        });
    }

    if src.len() < total {
        return Ok(None); // Need more data
    }

    // Only reject a short length once the declared byte count is actually
    // present; the buffer is never indexed past its end.
    if total < HEADER_SIZE {
        return Err(FrameError::InvalidLength { length: total });
    }

    let version = u32::from_le_bytes(src[4..8].try_into().unwrap());
    if version != PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion { version });
    }
    let request = u32::from_le_bytes(src[8..12].try_into().unwrap());
    let tag = u32::from_le_bytes(src[12..16].try_into().unwrap());

    src.advance(HEADER_SIZE);
    let payload = src.split_to(total - HEADER_SIZE).freeze();

    Ok(Some(Frame {
        request,
        tag,
        payload,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"<plist><dict/></plist>";

        encode_frame(payload, &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.request, REQUEST_TYPE_PLIST);
        assert_eq!(frame.tag, MESSAGE_TAG);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn header_layout_is_exact() {
        let mut buf = BytesMut::new();
        encode_frame(b"abcd", &mut buf).unwrap();

        assert_eq!(&buf[0..4], &20u32.to_le_bytes());
        assert_eq!(&buf[4..8], &1u32.to_le_bytes());
        assert_eq!(&buf[8..12], &8u32.to_le_bytes());
        assert_eq!(&buf[12..16], &1u32.to_le_bytes());
        assert_eq!(&buf[16..], b"abcd");
    }

    #[test]
    fn decode_incomplete_length_prefix() {
        let mut buf = BytesMut::from(&[0x14, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2); // Truncate payload

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(HEADER_SIZE as u32);
        buf.put_u32_le(2); // bad version
        buf.put_u32_le(REQUEST_TYPE_PLIST);
        buf.put_u32_le(MESSAGE_TAG);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(
            result,
            Err(FrameError::UnsupportedVersion { version: 2 })
        ));
    }

    #[test]
    fn short_declared_length_waits_for_declared_bytes() {
        // Length claims 10 bytes; only 8 buffered so far. Not yet decodable,
        // not yet an error.
        let mut buf = BytesMut::new();
        buf.put_u32_le(10);
        buf.put_u32_le(PROTOCOL_VERSION);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());

        // Once the declared 10 bytes are present the frame is corrupt.
        buf.put_u16(0);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength { length: 10 })
        ));
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_le((HEADER_SIZE + 64) as u32);
        buf.put_u32_le(PROTOCOL_VERSION);
        buf.put_u32_le(REQUEST_TYPE_PLIST);
        buf.put_u32_le(MESSAGE_TAG);

        let result = decode_frame(&mut buf, 16);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn decode_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn frame_wire_size() {
        let frame = Frame {
            request: REQUEST_TYPE_PLIST,
            tag: MESSAGE_TAG,
            payload: Bytes::from_static(b"test"),
        };
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
    }
}
