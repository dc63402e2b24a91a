//! Pluggable value serialization for result cloning and stores.
//!
//! [`Serializer`] turns any serde value into bytes and back. The engine uses
//! it to deep-clone command and query results so no reference into the live
//! model escapes, and the file store uses it to encode images and journal
//! payloads.
//!
//! Two formats are provided:
//!
//! - [`SerializationFormat::Json`]: human-readable JSON (always available)
//! - `SerializationFormat::Bincode`: compact binary format (requires the
//!   `bincode` feature)
//!
//! # Feature Gate
//!
//! ```toml
//! [dependencies]
//! prevalence-rs = { version = "0.1", features = ["bincode"] }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors that can occur while encoding, decoding or cloning a value.
#[derive(Debug, thiserror::Error)]
#[error("serialization error ({format}): {message}")]
pub struct SerializationError {
    /// Which format was in use.
    pub format: &'static str,
    /// Human-readable description of the failure.
    pub message: String,
}

/// The wire format used by a [`Serializer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    /// JSON via `serde_json`.
    #[default]
    Json,
    /// Bincode 2 with the standard configuration.
    #[cfg(feature = "bincode")]
    Bincode,
}

impl SerializationFormat {
    /// Returns the MIME-like content type identifier for this format.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            SerializationFormat::Json => "application/json",
            #[cfg(feature = "bincode")]
            SerializationFormat::Bincode => "application/x-bincode",
        }
    }

    fn name(self) -> &'static str {
        match self {
            SerializationFormat::Json => "json",
            #[cfg(feature = "bincode")]
            SerializationFormat::Bincode => "bincode",
        }
    }
}

/// Encodes and decodes serde values in a fixed [`SerializationFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Serializer {
    format: SerializationFormat,
}

impl Serializer {
    /// Creates a serializer for `format`.
    #[must_use]
    #[inline]
    pub fn new(format: SerializationFormat) -> Self {
        Self { format }
    }

    /// Creates a JSON serializer.
    #[must_use]
    #[inline]
    pub fn json() -> Self {
        Self::new(SerializationFormat::Json)
    }

    /// The format this serializer writes.
    #[must_use]
    #[inline]
    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    /// Serialize `value` into a byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] if the value cannot be encoded.
    pub fn to_bytes<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        match self.format {
            SerializationFormat::Json => serde_json::to_vec(value).map_err(|e| self.error(e)),
            #[cfg(feature = "bincode")]
            SerializationFormat::Bincode => {
                bincode::serde::encode_to_vec(value, bincode::config::standard())
                    .map_err(|e| self.error(e))
            }
        }
    }

    /// Deserialize a value from a byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] if the bytes are malformed or do not
    /// match `T`.
    pub fn from_bytes<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
        match self.format {
            SerializationFormat::Json => serde_json::from_slice(data).map_err(|e| self.error(e)),
            #[cfg(feature = "bincode")]
            SerializationFormat::Bincode => {
                bincode::serde::decode_from_slice(data, bincode::config::standard())
                    .map(|(value, _)| value)
                    .map_err(|e| self.error(e))
            }
        }
    }

    /// Produce a deep copy of `value` that shares nothing with the original.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] if the value does not survive an
    /// encode/decode cycle.
    pub fn deep_clone<T: Serialize + DeserializeOwned>(
        &self,
        value: &T,
    ) -> Result<T, SerializationError> {
        let bytes = self.to_bytes(value)?;
        self.from_bytes(&bytes)
    }

    #[cold]
    fn error(&self, err: impl std::fmt::Display) -> SerializationError {
        SerializationError {
            format: self.format.name(),
            message: err.to_string(),
        }
    }
}
