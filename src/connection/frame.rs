//! Length-prefixed framing shared by the agent and monitor sockets
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ S-expression text        │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! - The header always equals the exact byte length of the body.
//! - Header and body are written with a single `write_all` so a frame is never
//!   interleaved with another write on the same socket.
//! - Header and body are read as an atomic pair: once a header is read the body is
//!   read to completion (there is no cancellation mid-frame).

use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Length prefix size in bytes
pub const HEADER_LEN: usize = 4;

/// Largest body we accept from the server (vision frames stay well below this)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Initial capacity for the receive scratch buffer (typical sensor frame)
pub const INITIAL_BUFFER_CAPACITY: usize = 4096;

/// One length-prefixed message body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame {
    body: Vec<u8>,
}

impl RawFrame {
    /// Wrap an already received body
    pub fn new(body: Vec<u8>) -> Self {
        Self { body }
    }

    /// Body bytes (without header)
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Body length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// True for a zero-length body
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Body as lossy UTF-8, for diagnostics
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Take ownership of the body
    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }
}

/// Build header + payload in one contiguous buffer
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Write one frame with a single transport write
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    assert!(
        payload.len() <= u32::MAX as usize,
        "frame payload exceeds the 32-bit length prefix"
    );
    writer
        .write_all(&encode_frame(payload))
        .map_err(Error::from_socket)?;
    writer.flush().map_err(Error::from_socket)
}

/// Read one frame body into `buffer` (cleared first)
///
/// Any short read is reported as [`Error::ConnectionLost`].
pub fn read_frame_into<R: Read>(reader: &mut R, buffer: &mut Vec<u8>) -> Result<()> {
    let mut len_buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut len_buf).map_err(Error::from_socket)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    buffer.clear();
    buffer.resize(len, 0);
    reader.read_exact(buffer).map_err(Error::from_socket)?;
    Ok(())
}

/// Read one frame into a fresh [`RawFrame`]
pub fn read_frame<R: Read>(reader: &mut R) -> Result<RawFrame> {
    let mut body = Vec::new();
    read_frame_into(reader, &mut body)?;
    Ok(RawFrame::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    /// Payload of any length up to the maximum, patterned from a seed
    fn arb_sized_payload() -> impl Strategy<Value = Vec<u8>> {
        (0..=MAX_FRAME_SIZE, any::<u8>()).prop_map(|(len, seed)| {
            (0..len)
                .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_any_length_round_trips(payload in arb_sized_payload()) {
            let mut wire = Vec::new();
            write_frame(&mut wire, &payload).unwrap();
            prop_assert_eq!(wire.len(), HEADER_LEN + payload.len());
            let frame = read_frame(&mut Cursor::new(wire)).unwrap();
            prop_assert_eq!(frame.as_bytes(), payload.as_slice());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_frame_sequences_round_trip(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2048), 1..8)
        ) {
            let mut wire = Vec::new();
            for payload in &payloads {
                write_frame(&mut wire, payload).unwrap();
            }
            let mut cursor = Cursor::new(wire);
            let mut buffer = Vec::new();
            for payload in &payloads {
                read_frame_into(&mut cursor, &mut buffer).unwrap();
                prop_assert_eq!(&buffer, payload);
            }
            prop_assert!(matches!(read_frame(&mut cursor), Err(Error::ConnectionLost)));
        }
    }

    #[test]
    fn test_header_is_big_endian_length() {
        let bytes = encode_frame(b"(syn)");
        assert_eq!(&bytes[..4], &[0, 0, 0, 5]);
        assert_eq!(&bytes[4..], b"(syn)");
    }

    #[test]
    fn test_frame_integrity_across_sizes() {
        // Boundary sizes around the header width, buffer capacity and maximum
        let sizes = [
            0,
            1,
            3,
            4,
            5,
            255,
            256,
            INITIAL_BUFFER_CAPACITY - 1,
            INITIAL_BUFFER_CAPACITY,
            INITIAL_BUFFER_CAPACITY + 1,
            65_536,
            MAX_FRAME_SIZE,
        ];
        for size in sizes {
            let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let mut wire = Vec::new();
            write_frame(&mut wire, &payload).unwrap();
            assert_eq!(wire.len(), HEADER_LEN + size);

            let frame = read_frame(&mut Cursor::new(wire)).unwrap();
            assert_eq!(frame.as_bytes(), payload.as_slice(), "size {}", size);
        }
    }

    #[test]
    fn test_consecutive_frames_are_read_in_order() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"(time (now 1.00))").unwrap();
        write_frame(&mut wire, b"").unwrap();
        write_frame(&mut wire, b"(time (now 1.02))").unwrap();

        let mut cursor = Cursor::new(wire);
        let mut buffer = Vec::new();
        read_frame_into(&mut cursor, &mut buffer).unwrap();
        assert_eq!(buffer, b"(time (now 1.00))");
        read_frame_into(&mut cursor, &mut buffer).unwrap();
        assert!(buffer.is_empty());
        read_frame_into(&mut cursor, &mut buffer).unwrap();
        assert_eq!(buffer, b"(time (now 1.02))");
    }

    #[test]
    fn test_short_header_is_connection_loss() {
        let err = read_frame(&mut Cursor::new(vec![0u8, 0])).unwrap_err();
        assert!(matches!(err, Error::ConnectionLost));
    }

    #[test]
    fn test_short_body_is_connection_loss() {
        let mut wire = encode_frame(b"(GS (t 0.00))");
        wire.truncate(wire.len() - 3);
        let err = read_frame(&mut Cursor::new(wire)).unwrap_err();
        assert!(matches!(err, Error::ConnectionLost));
    }

    #[test]
    fn test_oversized_header_rejected() {
        let wire = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes().to_vec();
        let err = read_frame(&mut Cursor::new(wire)).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { .. }));
    }
}
