//! Durable cache envelope
//!
//! The shared store holds `{"etag": "...", "json": <payload>}` where the
//! payload is embedded inline, byte for byte, rather than re-encoded.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// The payload last written to the durable tier and its entity tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub etag: String,
    /// Serialized dataset, kept opaque between tiers
    pub payload: Bytes,
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    etag: &'a str,
    json: &'a RawValue,
}

#[derive(Deserialize)]
struct EnvelopeIn<'a> {
    #[serde(default)]
    etag: String,
    #[serde(borrow)]
    json: &'a RawValue,
}

impl CacheEntry {
    pub fn new(etag: impl Into<String>, payload: Bytes) -> Self {
        Self {
            etag: etag.into(),
            payload,
        }
    }

    /// Encodes the entry as the JSON envelope stored under the cache key
    ///
    /// Fails if the payload is not itself a JSON document.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let text = std::str::from_utf8(&self.payload)
            .map_err(<serde_json::Error as serde::ser::Error>::custom)?;
        let json: &RawValue = serde_json::from_str(text)?;
        serde_json::to_vec(&EnvelopeOut {
            etag: &self.etag,
            json,
        })
    }

    /// Decodes an envelope read back from the store
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let text =
            std::str::from_utf8(bytes).map_err(<serde_json::Error as serde::de::Error>::custom)?;
        let envelope: EnvelopeIn<'_> = serde_json::from_str(text)?;
        Ok(Self {
            etag: envelope.etag,
            payload: Bytes::copy_from_slice(envelope.json.get().as_bytes()),
        })
    }
}
