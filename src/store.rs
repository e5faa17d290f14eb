//! Store handle
//!
//! An authenticated, database-scoped client connection to one
//! Redis-compatible store. The pipeline uses three operations: paginated
//! SCAN, pipelined DUMP, and pipelined RESTORE. Pipelined operations write
//! every command before reading any reply, so N commands cost one round
//! trip instead of N.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::protocol::{encode_command, parse_frame_with_limits, Frame, ParseError, ParserLimits};

/// Initial read/write buffer size (16KB)
const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Transport-level failures, mapped to an operation-specific
/// [`MigrateError`] variant at each call site.
#[derive(Debug)]
enum WireError {
    Io(std::io::Error),
    Protocol(ParseError),
    /// The server closed the connection mid-reply.
    Closed,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Io(e) => write!(f, "i/o error: {}", e),
            WireError::Protocol(e) => write!(f, "{}", e),
            WireError::Closed => write!(f, "connection closed by peer"),
        }
    }
}

impl From<std::io::Error> for WireError {
    fn from(e: std::io::Error) -> Self {
        WireError::Io(e)
    }
}

/// A client connection to one key-value store.
pub struct StoreHandle {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    limits: ParserLimits,
    addr: String,
}

impl StoreHandle {
    /// Connect to a store: dial, authenticate if a password is given, and
    /// select the database.
    pub async fn connect(addr: &str, db: u32, password: Option<&str>) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| MigrateError::Connection(format!("{}: {}", addr, e)))?;

        let mut handle = Self {
            stream,
            read_buf: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            write_buf: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            limits: ParserLimits::default(),
            addr: addr.to_string(),
        };

        if let Some(password) = password.filter(|p| !p.is_empty()) {
            let reply = handle
                .round_trip(&[Bytes::from_static(b"AUTH"), Bytes::copy_from_slice(password.as_bytes())])
                .await
                .map_err(|e| MigrateError::Auth(e.to_string()))?;
            if let Frame::Error(msg) = reply {
                return Err(MigrateError::Auth(String::from_utf8_lossy(&msg).into_owned()));
            }
        }

        let reply = handle
            .round_trip(&[
                Bytes::from_static(b"SELECT"),
                Bytes::from(db.to_string()),
            ])
            .await
            .map_err(|e| MigrateError::Select(e.to_string()))?;
        if let Frame::Error(msg) = reply {
            return Err(MigrateError::Select(String::from_utf8_lossy(&msg).into_owned()));
        }

        debug!(addr = %handle.addr, db, "store handle connected");
        Ok(handle)
    }

    /// Address this handle is connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// One SCAN step. Returns the next cursor and the keys on this page.
    ///
    /// A returned cursor of 0 means the server has finished iterating.
    pub async fn scan_page(&mut self, cursor: u64) -> Result<(u64, Vec<Bytes>)> {
        let reply = self
            .round_trip(&[
                Bytes::from_static(b"SCAN"),
                Bytes::from(cursor.to_string()),
            ])
            .await
            .map_err(|e| MigrateError::Scan(e.to_string()))?;

        if let Frame::Error(msg) = reply {
            return Err(MigrateError::Scan(String::from_utf8_lossy(&msg).into_owned()));
        }

        // SCAN replies with [cursor, [key, ...]]
        let mut items = reply
            .into_array()
            .ok_or_else(|| MigrateError::Scan("reply is not an array".into()))?;
        if items.len() != 2 {
            return Err(MigrateError::Scan(format!(
                "reply has {} elements, expected 2",
                items.len()
            )));
        }
        let keys_frame = items.pop();
        let cursor_frame = items.pop();

        let next_cursor = cursor_frame
            .as_ref()
            .and_then(Frame::as_str)
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| MigrateError::Scan("malformed cursor".into()))?;

        let keys = match keys_frame {
            Some(Frame::Array(Some(frames))) => {
                let mut keys = Vec::with_capacity(frames.len());
                for frame in frames {
                    let key = frame
                        .into_bytes()
                        .ok_or_else(|| MigrateError::Scan("key is not a bulk string".into()))?;
                    keys.push(key);
                }
                keys
            }
            Some(Frame::Array(None)) => Vec::new(),
            _ => return Err(MigrateError::Scan("keys field is not an array".into())),
        };

        Ok((next_cursor, keys))
    }

    /// Pipelined DUMP of every key: one round trip, replies positionally
    /// aligned with the input keys.
    ///
    /// A nil reply means the key vanished between SCAN and DUMP; it comes
    /// back as `None` and the caller decides whether to skip it.
    pub async fn dump_pipelined(&mut self, keys: &[Bytes]) -> Result<Vec<Option<Bytes>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        for key in keys {
            encode_command(
                &[Bytes::from_static(b"DUMP"), key.clone()],
                &mut self.write_buf,
            );
        }
        self.flush()
            .await
            .map_err(|e| MigrateError::Dump(e.to_string()))?;

        let mut dumps = Vec::with_capacity(keys.len());
        for key in keys {
            let reply = self
                .read_frame()
                .await
                .map_err(|e| MigrateError::Dump(e.to_string()))?;
            match reply {
                Frame::Bulk(Some(blob)) => dumps.push(Some(blob)),
                Frame::Bulk(None) => dumps.push(None),
                Frame::Error(msg) => {
                    return Err(MigrateError::Dump(format!(
                        "key {:?}: {}",
                        String::from_utf8_lossy(key),
                        String::from_utf8_lossy(&msg)
                    )));
                }
                other => {
                    return Err(MigrateError::Dump(format!(
                        "unexpected reply type for key {:?}: {:?}",
                        String::from_utf8_lossy(key),
                        other
                    )));
                }
            }
        }
        Ok(dumps)
    }

    /// Pipelined RESTORE of a whole batch: one round trip, all replies
    /// read, first error reply surfaced.
    ///
    /// `RESTORE key 0 value REPLACE` — TTL 0 (no expiry) and REPLACE so a
    /// key re-scanned after a source mutation overwrites the earlier copy
    /// instead of failing with BUSYKEY.
    pub async fn restore_pipelined(&mut self, batch: &HashMap<Bytes, Bytes>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        for (key, value) in batch {
            encode_command(
                &[
                    Bytes::from_static(b"RESTORE"),
                    key.clone(),
                    Bytes::from_static(b"0"),
                    value.clone(),
                    Bytes::from_static(b"REPLACE"),
                ],
                &mut self.write_buf,
            );
        }
        self.flush()
            .await
            .map_err(|e| MigrateError::Restore(e.to_string()))?;

        let mut first_err: Option<MigrateError> = None;
        for _ in 0..batch.len() {
            let reply = self
                .read_frame()
                .await
                .map_err(|e| MigrateError::Restore(e.to_string()))?;
            if let Frame::Error(msg) = reply {
                if first_err.is_none() {
                    first_err = Some(MigrateError::Restore(
                        String::from_utf8_lossy(&msg).into_owned(),
                    ));
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Write one command and read its single reply.
    async fn round_trip(&mut self, args: &[Bytes]) -> std::result::Result<Frame, WireError> {
        encode_command(args, &mut self.write_buf);
        self.flush().await?;
        self.read_frame().await
    }

    /// Flush everything buffered on the write side in one syscall.
    async fn flush(&mut self) -> std::result::Result<(), WireError> {
        self.stream.write_all(&self.write_buf).await?;
        self.write_buf.clear();
        Ok(())
    }

    /// Read one complete frame, pulling more bytes from the socket until
    /// the parser has a full frame.
    async fn read_frame(&mut self) -> std::result::Result<Frame, WireError> {
        use tokio::io::AsyncReadExt;

        loop {
            match parse_frame_with_limits(&mut self.read_buf, &self.limits) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(e) => return Err(WireError::Protocol(e)),
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(WireError::Closed);
            }
        }
    }
}
