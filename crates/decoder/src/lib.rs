//! Lumber - Decoder
//!
//! Intake decoders that turn one raw log record into a mutable document
//! tree (`serde_json::Value`). The pipeline picks the decoder from its
//! settings, or from the input plugin's suggestion when configured as
//! `auto`.
//!
//! # Decoders
//!
//! - `json` - parse the record as a JSON object
//! - `raw` - wrap the record as `{"message": …}`, dropping the trailing
//!   terminator byte
//! - `cri` - Kubernetes container runtime log line (`time stream tag log`)
//! - `postgres` - line-structured postgres server log
//! - `auto` - defer to the input plugin's suggestion, falling back to `json`

mod cri;
mod error;
mod postgres;

pub use cri::decode_cri;
pub use error::{DecodeError, Result};
pub use postgres::decode_postgres;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Which intake decoder a pipeline runs on raw records.
///
/// `Auto` is resolved at intake time: the input plugin's suggested decoder
/// wins, and `json` is the fallback when no suggestion was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    #[default]
    Auto,
    Json,
    Raw,
    Cri,
    Postgres,
}

impl DecoderKind {
    /// Name as it appears in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecoderKind::Auto => "auto",
            DecoderKind::Json => "json",
            DecoderKind::Raw => "raw",
            DecoderKind::Cri => "cri",
            DecoderKind::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecoderKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(DecoderKind::Auto),
            "json" => Ok(DecoderKind::Json),
            "raw" => Ok(DecoderKind::Raw),
            "cri" => Ok(DecoderKind::Cri),
            "postgres" => Ok(DecoderKind::Postgres),
            other => Err(DecodeError::UnknownDecoder(other.to_string())),
        }
    }
}

/// Decode a record with a concrete (non-`auto`) decoder.
///
/// Callers must resolve `Auto` before dispatching; passing it here is a
/// wiring bug and returns `DecodeError::Unresolved`.
pub fn decode(kind: DecoderKind, bytes: &[u8]) -> Result<Value> {
    match kind {
        DecoderKind::Auto => Err(DecodeError::Unresolved),
        DecoderKind::Json => decode_json(bytes),
        DecoderKind::Raw => Ok(decode_raw(bytes)),
        DecoderKind::Cri => decode_cri(bytes),
        DecoderKind::Postgres => decode_postgres(bytes),
    }
}

/// Parse the record as JSON.
pub fn decode_json(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(DecodeError::Json)
}

/// Wrap the raw record as `{"message": …}`.
///
/// Inputs deliver newline-terminated records; the final byte is the
/// terminator and is always dropped.
pub fn decode_raw(bytes: &[u8]) -> Value {
    let trimmed = &bytes[..bytes.len().saturating_sub(1)];
    json!({ "message": String::from_utf8_lossy(trimmed) })
}

#[cfg(test)]
#[path = "decoder_test.rs"]
mod tests;
