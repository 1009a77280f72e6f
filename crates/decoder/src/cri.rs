//! CRI log line decoder
//!
//! Kubernetes container runtimes write one record per line in the form:
//!
//! ```text
//! 2016-10-06T00:17:09.669794202Z stdout F some message
//! ```
//!
//! The four fields are the RFC 3339 timestamp, the container stream
//! (`stdout`/`stderr`), the partial-line tag (`P` partial, `F` full), and
//! the log content itself.

use serde_json::{json, Value};

use crate::error::{DecodeError, Result};

/// Decode one CRI-formatted line into `{log, time, stream}`.
///
/// The `stream` field is what pipelines usually route on, so stdout and
/// stderr of one container form two independently ordered streams.
pub fn decode_cri(bytes: &[u8]) -> Result<Value> {
    let line = std::str::from_utf8(bytes).map_err(|_| DecodeError::Cri("not utf-8"))?;
    let line = line.strip_suffix('\n').unwrap_or(line);

    let (time, rest) = line
        .split_once(' ')
        .ok_or(DecodeError::Cri("missing time field"))?;
    let (stream, rest) = rest
        .split_once(' ')
        .ok_or(DecodeError::Cri("missing stream field"))?;
    let (tag, log) = rest
        .split_once(' ')
        .ok_or(DecodeError::Cri("missing tag field"))?;

    if stream != "stdout" && stream != "stderr" {
        return Err(DecodeError::Cri("stream is not stdout or stderr"));
    }
    if tag != "F" && tag != "P" {
        return Err(DecodeError::Cri("tag is not F or P"));
    }

    Ok(json!({
        "log": log,
        "time": time,
        "stream": stream,
    }))
}
