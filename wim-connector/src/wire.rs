//! Framed JSON-over-SSH wire protocol, grounded on the original SSH connector's
//! `__build_request`/`__parse_response` pair.
//!
//! Framing: a big-endian 32-bit length prefix followed by that many UTF-8 bytes of a
//! JSON object `{"session": <int>, "content": {...}}`. Responses share the same framing
//! and echo the `session` id of the request they answer.

use byteorder::{BigEndian, ByteOrder};
use json::Value;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One framed message exchanged over the SSH channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// The session id this message belongs to. Responses echo the request's session.
    pub session: u32,
    /// The message body (a `{"type": "...", ...}` object).
    pub content: Value,
}

/// Serializes a frame into its wire representation (length prefix + JSON bytes).
pub fn encode(frame: &Frame) -> Result<Vec<u8>, Error> {
    let body = json::to_vec(frame)?;
    let mut out = Vec::with_capacity(4 + body.len());
    let mut len_bytes = [0u8; 4];
    BigEndian::write_u32(&mut len_bytes, body.len() as u32);
    out.extend_from_slice(&len_bytes);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Reads the 4-byte big-endian length prefix from the head of `buf`, if a full prefix
/// is available.
pub fn read_length_prefix(buf: &[u8]) -> Option<u32> {
    if buf.len() < 4 {
        return None;
    }
    Some(BigEndian::read_u32(&buf[..4]))
}

/// Parses a frame body (without its length prefix) into a [`Frame`].
pub fn decode(body: &[u8]) -> Result<Frame, Error> {
    let frame: Frame = json::from_slice(body)?;
    Ok(frame)
}
