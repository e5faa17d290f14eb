//! RESP protocol implementation
//!
//! The RESP2 subset needed to drive a Redis-compatible store as a client:
//! frame types, a streaming parser, and frame/command encoders.

mod encoder;
mod frame;
mod parser;

pub use encoder::{encode_command, encode_frame};
pub use frame::Frame;
pub use parser::{parse_frame, parse_frame_with_limits, ParseError, ParserLimits};
