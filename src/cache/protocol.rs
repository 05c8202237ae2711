//! Memcache ASCII protocol codec.
//!
//! Request encoding into a `BytesMut`, and response decoding from any
//! `AsyncBufRead` (normally a buffered TCP stream).

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::MAX_VALUE_SIZE;
use crate::error::{Error, Result};

/// Relative expiry times above this are read by memcached as unix timestamps
const MAX_RELATIVE_EXPTIME: u64 = 60 * 60 * 24 * 30;

/// A request to one memcached server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `get <key1> <key2> ...\r\n`
    Get(Vec<String>),
    /// `set <key> <flags> <exptime> <bytes>\r\n<data>\r\n`
    Set {
        key: String,
        value: Bytes,
        flags: u32,
        exptime: u32,
    },
    /// `delete <key>\r\n`
    Delete(String),
    /// `stats\r\n`
    Stats,
}

impl Command {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get(_) => "get",
            Command::Set { .. } => "set",
            Command::Delete(_) => "delete",
            Command::Stats => "stats",
        }
    }

    /// Append the wire form of this command to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Command::Get(keys) => {
                buf.put_slice(b"get");
                for key in keys {
                    buf.put_u8(b' ');
                    buf.put_slice(key.as_bytes());
                }
                buf.put_slice(b"\r\n");
            }
            Command::Set {
                key,
                value,
                flags,
                exptime,
            } => {
                buf.put_slice(b"set ");
                buf.put_slice(key.as_bytes());
                buf.put_slice(format!(" {} {} {}\r\n", flags, exptime, value.len()).as_bytes());
                buf.put_slice(value);
                buf.put_slice(b"\r\n");
            }
            Command::Delete(key) => {
                buf.put_slice(b"delete ");
                buf.put_slice(key.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Command::Stats => buf.put_slice(b"stats\r\n"),
        }
    }
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Items returned by `get` (possibly none)
    Values(Vec<Value>),
    /// `STORED` (true) or `NOT_STORED` (false)
    Stored(bool),
    /// `DELETED` (true) or `NOT_FOUND` (false)
    Deleted(bool),
    /// `STAT` pairs
    Stats(BTreeMap<String, String>),
}

/// A single item from a `get` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub key: String,
    pub flags: u32,
    pub data: Bytes,
}

/// Convert a TTL to a memcached exptime.
///
/// Zero means "never expire". TTLs longer than 30 days must be sent as an
/// absolute unix timestamp.
pub fn exptime(ttl: Duration) -> u32 {
    let secs = ttl.as_secs();
    if secs == 0 {
        return 0;
    }
    if secs <= MAX_RELATIVE_EXPTIME {
        return secs as u32;
    }
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    u32::try_from(now.saturating_add(secs)).unwrap_or(u32::MAX)
}

/// Read the reply to `command`.
pub async fn read_reply<R>(reader: &mut R, command: &Command) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    match command {
        Command::Get(_) => read_values(reader).await.map(Reply::Values),
        Command::Set { .. } => {
            let line = read_line(reader).await?;
            match line.as_str() {
                "STORED" => Ok(Reply::Stored(true)),
                "NOT_STORED" | "EXISTS" | "NOT_FOUND" => Ok(Reply::Stored(false)),
                _ => Err(unexpected(&line)),
            }
        }
        Command::Delete(_) => {
            let line = read_line(reader).await?;
            match line.as_str() {
                "DELETED" => Ok(Reply::Deleted(true)),
                "NOT_FOUND" => Ok(Reply::Deleted(false)),
                _ => Err(unexpected(&line)),
            }
        }
        Command::Stats => read_stats(reader).await.map(Reply::Stats),
    }
}

/// Read `VALUE` blocks up to the closing `END`.
pub async fn read_values<R>(reader: &mut R) -> Result<Vec<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut values = Vec::new();

    loop {
        let line = read_line(reader).await?;
        if line == "END" {
            return Ok(values);
        }

        let mut fields = line.split(' ');
        if fields.next() != Some("VALUE") {
            return Err(unexpected(&line));
        }

        // VALUE <key> <flags> <bytes> [<cas unique>]
        let key = fields.next().ok_or_else(|| malformed(&line))?;
        let flags = fields
            .next()
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or_else(|| malformed(&line))?;
        let len = fields
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| malformed(&line))?;
        if len > MAX_VALUE_SIZE {
            return Err(Error::Protocol(format!(
                "value for {key} is {len} bytes, limit is {MAX_VALUE_SIZE}"
            )));
        }

        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data).await?;
        if &data[len..] != b"\r\n" {
            return Err(Error::Protocol(format!(
                "data block for {key} not terminated by CRLF"
            )));
        }
        data.truncate(len);

        values.push(Value {
            key: key.to_string(),
            flags,
            data: Bytes::from(data),
        });
    }
}

/// Read `STAT <name> <value>` lines up to the closing `END`.
pub async fn read_stats<R>(reader: &mut R) -> Result<BTreeMap<String, String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = BTreeMap::new();

    loop {
        let line = read_line(reader).await?;
        if line == "END" {
            return Ok(stats);
        }

        let rest = line.strip_prefix("STAT ").ok_or_else(|| unexpected(&line))?;
        let (name, value) = rest.split_once(' ').unwrap_or((rest, ""));
        stats.insert(name.to_string(), value.to_string());
    }
}

/// Read one CRLF-terminated line, with error replies turned into errors.
async fn read_line<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::with_capacity(64);
    let n = reader.read_until(b'\n', &mut raw).await?;
    if n == 0 {
        return Err(Error::Protocol("connection closed by server".into()));
    }
    if !raw.ends_with(b"\r\n") {
        return Err(Error::Protocol("reply line not terminated by CRLF".into()));
    }
    raw.truncate(raw.len() - 2);

    let line = String::from_utf8(raw)
        .map_err(|_| Error::Protocol("reply line is not valid UTF-8".into()))?;

    if line == "ERROR" || line.starts_with("CLIENT_ERROR") || line.starts_with("SERVER_ERROR") {
        return Err(Error::ServerReply(line));
    }

    Ok(line)
}

fn unexpected(line: &str) -> Error {
    Error::Protocol(format!("unexpected reply: {line:?}"))
}

fn malformed(line: &str) -> Error {
    Error::Protocol(format!("malformed VALUE line: {line:?}"))
}
