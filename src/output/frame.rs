// Tue Jan 13 2026 - Alex

//! Wire framing for outbound messages.
//!
//! ```text
//! [u32 LE header_len][header JSON][u32 LE payload_len][payload bytes]
//! ```
//!
//! Header-only messages carry a zero payload length.

use crate::output::{MessageHeader, OutboundMessage, SinkError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const LENGTH_PREFIX: usize = 4;

pub fn encode(message: &OutboundMessage) -> Result<Bytes, SinkError> {
    let header = serde_json::to_vec(&message.header())?;
    let payload = message.payload().cloned().unwrap_or_default();

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX * 2 + header.len() + payload.len());
    frame.put_u32_le(frame_len(header.len())?);
    frame.put_slice(&header);
    frame.put_u32_le(frame_len(payload.len())?);
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

fn frame_len(len: usize) -> Result<u32, SinkError> {
    u32::try_from(len).map_err(|_| SinkError::FrameTooLarge(len))
}

/// Incremental decoder for a byte stream of frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the next complete message, or `None` when more bytes are
    /// needed.
    pub fn next_message(&mut self) -> Result<Option<OutboundMessage>, SinkError> {
        let Some(header_len) = peek_len(&self.buffer, 0) else {
            return Ok(None);
        };
        let payload_at = LENGTH_PREFIX + header_len;
        let Some(payload_len) = peek_len(&self.buffer, payload_at) else {
            return Ok(None);
        };
        let total = payload_at + LENGTH_PREFIX + payload_len;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let mut frame = self.buffer.split_to(total);
        frame.advance(LENGTH_PREFIX);
        let header_bytes = frame.split_to(header_len);
        frame.advance(LENGTH_PREFIX);
        let payload = frame.freeze();

        let header: MessageHeader = serde_json::from_slice(&header_bytes)?;
        Ok(Some(OutboundMessage::from_parts(header, payload)))
    }
}

fn peek_len(buffer: &[u8], at: usize) -> Option<usize> {
    let bytes = buffer.get(at..at + LENGTH_PREFIX)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
}
