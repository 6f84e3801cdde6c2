//! Length-prefixed framing.
//!
//! Each message on the wire is a 4-byte big-endian length followed by that
//! many bytes. TCP does not preserve write boundaries, so the decoder buffers
//! read chunks until a whole frame is available.

use crate::ProtocolError;
use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

pub const FRAME_LENGTH_SIZE: usize = 4;
pub const FRAME_MAX_SIZE: usize = 1 << 20;

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let payload_len = payload.len();
    if payload_len > FRAME_MAX_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            max: FRAME_MAX_SIZE,
            got: payload_len,
        });
    }

    let mut data = Vec::with_capacity(FRAME_LENGTH_SIZE + payload_len);
    data.extend_from_slice(&(payload_len as u32).to_be_bytes());
    data.extend_from_slice(payload);
    Ok(data)
}

/// Buffers incoming bytes and extracts complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Next complete frame, `Ok(None)` if more bytes are needed.
    ///
    /// A length above [`FRAME_MAX_SIZE`] is an error; the stream cannot be
    /// resynchronised after it.
    pub fn decode_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.buffer.len() < FRAME_LENGTH_SIZE {
            return Ok(None);
        }

        let mut len_bytes = [0u8; FRAME_LENGTH_SIZE];
        len_bytes.copy_from_slice(&self.buffer[..FRAME_LENGTH_SIZE]);
        let frame_len = u32::from_be_bytes(len_bytes) as usize;

        if frame_len > FRAME_MAX_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                max: FRAME_MAX_SIZE,
                got: frame_len,
            });
        }

        if self.buffer.len() < FRAME_LENGTH_SIZE + frame_len {
            return Ok(None);
        }

        self.buffer.advance(FRAME_LENGTH_SIZE);
        let frame = self.buffer.split_to(frame_len).freeze();
        trace!("<-- Decoded frame: {} bytes", frame.len());
        Ok(Some(frame))
    }

    /// Bytes buffered but not yet part of a complete frame.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}
