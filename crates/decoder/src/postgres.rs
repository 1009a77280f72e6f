//! Postgres server log decoder
//!
//! Parses the default `log_line_prefix` shape:
//!
//! ```text
//! 2021-06-22 16:24:27.460 GMT [7291] => [3-1] statement: select 1;
//! ```
//!
//! into `{time, pid, pid_message_number, log}`.

use serde_json::{json, Value};

use crate::error::{DecodeError, Result};

/// Decode one postgres log line.
pub fn decode_postgres(bytes: &[u8]) -> Result<Value> {
    let line = std::str::from_utf8(bytes).map_err(|_| DecodeError::Postgres("not utf-8"))?;
    let line = line.strip_suffix('\n').unwrap_or(line);

    // time is three space-separated tokens: date, clock, timezone
    let mut splits = line.splitn(4, ' ');
    let date = splits.next().ok_or(DecodeError::Postgres("missing date"))?;
    let clock = splits.next().ok_or(DecodeError::Postgres("missing clock"))?;
    let zone = splits.next().ok_or(DecodeError::Postgres("missing timezone"))?;
    let rest = splits.next().ok_or(DecodeError::Postgres("missing pid"))?;

    let rest = rest
        .strip_prefix('[')
        .ok_or(DecodeError::Postgres("missing pid"))?;
    let (pid, rest) = rest
        .split_once(']')
        .ok_or(DecodeError::Postgres("unterminated pid"))?;

    let rest = rest
        .strip_prefix(" => [")
        .ok_or(DecodeError::Postgres("missing message number"))?;
    let (message_number, rest) = rest
        .split_once(']')
        .ok_or(DecodeError::Postgres("unterminated message number"))?;

    let log = rest.strip_prefix(' ').unwrap_or(rest);

    Ok(json!({
        "time": format!("{date} {clock} {zone}"),
        "pid": pid,
        "pid_message_number": message_number,
        "log": log,
    }))
}
