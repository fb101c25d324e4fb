//! Conversion between typed values and the Hub wire format (JSON).
//!
//! # Design
//! Encoding runs in two stages. `tree::TreeSerializer` walks the value with
//! serde and records a tree that still knows type names and which fields
//! were never set; `normalize` then produces plain JSON from it. The Hub
//! expects minimal bodies: no unset fields, no type decoration, numbers as
//! numbers, and date/time values as one RFC 3339 string.
//!
//! Decoding is plain `serde_json`. Unknown fields are ignored, so the
//! models stay compatible with servers that add fields.

mod normalize;
mod tree;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure converting to or from the wire format.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl serde::ser::Error for CodecError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CodecError::Encode(msg.to_string())
    }
}

/// Stateless encoder/decoder shared by every call of a transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec;

impl Codec {
    pub fn new() -> Self {
        Codec
    }

    /// Encode `object` as a request body.
    ///
    /// An absent object, or one that is itself unset, produces no bytes.
    pub fn encode<T>(&self, object: Option<&T>) -> Result<Vec<u8>, CodecError>
    where
        T: ?Sized + Serialize,
    {
        let Some(object) = object else {
            return Ok(Vec::new());
        };
        match self.encode_value(object)? {
            Some(value) => {
                serde_json::to_vec(&value).map_err(|e| CodecError::Encode(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    /// The normalized JSON tree for `object`, before it is written out.
    pub fn encode_value<T>(&self, object: &T) -> Result<Option<Value>, CodecError>
    where
        T: ?Sized + Serialize,
    {
        let tree = object.serialize(tree::TreeSerializer)?;
        Ok(normalize::normalize(tree))
    }

    /// Decode a response body into `T`.
    ///
    /// A blank body reads as `null`, which lets `()` and `Option<_>` targets
    /// accept bodiless responses.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            bytes
        };
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode a body into an untyped map, as used for error payloads.
    pub fn decode_map(&self, bytes: &[u8]) -> Result<Map<String, Value>, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
