//! RESP protocol parser
//!
//! Streaming RESP2 parser: frames are parsed out of a growable read buffer,
//! and an incomplete frame leaves the buffer untouched until more data
//! arrives from the socket.

use std::io::Cursor;

use bytes::{Buf, BytesMut};

use super::Frame;

/// Parser limits enforced before any payload is allocated.
///
/// Dump blobs arrive off the network, so size and nesting caps are applied
/// while scanning the frame header rather than after buffering the body.
#[derive(Debug, Clone)]
pub struct ParserLimits {
    /// Maximum bulk string size in bytes (default: 512MB, matches Redis
    /// proto-max-bulk-len)
    pub max_bulk_len: usize,
    /// Maximum number of elements in an array (default: 1,048,576)
    pub max_array_len: usize,
    /// Maximum array nesting depth (default: 32)
    pub max_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_bulk_len: 512 * 1024 * 1024,
            max_array_len: 1_048_576,
            max_depth: 32,
        }
    }
}

/// Parse error types
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Not enough buffered data for a complete frame
    Incomplete,

    /// Malformed protocol data
    Invalid(String),

    /// Frame exceeds configured limits
    TooLarge(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "incomplete frame"),
            ParseError::Invalid(msg) => write!(f, "invalid protocol: {}", msg),
            ParseError::TooLarge(msg) => write!(f, "frame too large: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one frame from the front of the buffer.
///
/// Returns `Ok(Some(frame))` and consumes the frame's bytes on success,
/// `Ok(None)` if the buffer holds only a partial frame, or `Err` if the
/// data is malformed. Uses default limits; see [`parse_frame_with_limits`].
pub fn parse_frame(buf: &mut BytesMut) -> Result<Option<Frame>, ParseError> {
    parse_frame_with_limits(buf, &ParserLimits::default())
}

/// Parse one frame from the front of the buffer with explicit limits.
pub fn parse_frame_with_limits(
    buf: &mut BytesMut,
    limits: &ParserLimits,
) -> Result<Option<Frame>, ParseError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(&buf[..]);
    match parse_at(&mut cursor, limits, 0) {
        Ok(frame) => {
            let consumed = cursor.position() as usize;
            buf.advance(consumed);
            Ok(Some(frame))
        }
        Err(ParseError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Recursive descent over the cursor. Position is only meaningful to the
/// caller when parsing succeeds; on `Incomplete` the whole frame is retried
/// from scratch once more data has been read.
fn parse_at(
    cursor: &mut Cursor<&[u8]>,
    limits: &ParserLimits,
    depth: usize,
) -> Result<Frame, ParseError> {
    if depth > limits.max_depth {
        return Err(ParseError::TooLarge(format!(
            "nesting depth exceeds {}",
            limits.max_depth
        )));
    }

    match next_byte(cursor)? {
        b'+' => {
            let line = read_line(cursor)?;
            Ok(Frame::Simple(bytes::Bytes::copy_from_slice(line)))
        }
        b'-' => {
            let line = read_line(cursor)?;
            Ok(Frame::Error(bytes::Bytes::copy_from_slice(line)))
        }
        b':' => Ok(Frame::Integer(read_decimal(cursor)?)),
        b'$' => {
            let len = read_decimal(cursor)?;
            if len == -1 {
                return Ok(Frame::Bulk(None));
            }
            if len < -1 {
                return Err(ParseError::Invalid("negative bulk length".into()));
            }
            let len = len as usize;
            if len > limits.max_bulk_len {
                return Err(ParseError::TooLarge(format!(
                    "bulk string of {} bytes exceeds {}",
                    len, limits.max_bulk_len
                )));
            }
            let data = read_exact(cursor, len)?;
            let frame = Frame::Bulk(Some(bytes::Bytes::copy_from_slice(data)));
            expect_crlf(cursor)?;
            Ok(frame)
        }
        b'*' => {
            let count = read_decimal(cursor)?;
            if count == -1 {
                return Ok(Frame::Array(None));
            }
            if count < -1 {
                return Err(ParseError::Invalid("negative array length".into()));
            }
            let count = count as usize;
            if count > limits.max_array_len {
                return Err(ParseError::TooLarge(format!(
                    "array of {} elements exceeds {}",
                    count, limits.max_array_len
                )));
            }
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(parse_at(cursor, limits, depth + 1)?);
            }
            Ok(Frame::Array(Some(items)))
        }
        byte => Err(ParseError::Invalid(format!(
            "unexpected frame type byte {:#04x}",
            byte
        ))),
    }
}

/// Take the next byte or signal that more data is needed.
fn next_byte(cursor: &mut Cursor<&[u8]>) -> Result<u8, ParseError> {
    if !cursor.has_remaining() {
        return Err(ParseError::Incomplete);
    }
    Ok(cursor.get_u8())
}

/// Read up to the next CRLF, returning the line without the terminator.
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ParseError> {
    let start = cursor.position() as usize;
    let slice = *cursor.get_ref();
    let end = slice.len();

    for i in start..end.saturating_sub(1) {
        if slice[i] == b'\r' && slice[i + 1] == b'\n' {
            cursor.set_position((i + 2) as u64);
            return Ok(&slice[start..i]);
        }
    }
    Err(ParseError::Incomplete)
}

/// Read a CRLF-terminated signed decimal (lengths and integer replies).
fn read_decimal(cursor: &mut Cursor<&[u8]>) -> Result<i64, ParseError> {
    let line = read_line(cursor)?;
    let text = std::str::from_utf8(line)
        .map_err(|_| ParseError::Invalid("non-UTF-8 integer".into()))?;
    text.parse::<i64>()
        .map_err(|_| ParseError::Invalid(format!("invalid integer: {}", text)))
}

/// Read exactly `len` bytes of bulk payload.
fn read_exact<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], ParseError> {
    let start = cursor.position() as usize;
    let slice = *cursor.get_ref();
    if slice.len() < start + len {
        return Err(ParseError::Incomplete);
    }
    cursor.set_position((start + len) as u64);
    Ok(&slice[start..start + len])
}

/// Consume the CRLF that terminates a bulk payload.
fn expect_crlf(cursor: &mut Cursor<&[u8]>) -> Result<(), ParseError> {
    if cursor.remaining() < 2 {
        return Err(ParseError::Incomplete);
    }
    if cursor.get_u8() != b'\r' || cursor.get_u8() != b'\n' {
        return Err(ParseError::Invalid("expected CRLF".into()));
    }
    Ok(())
}
