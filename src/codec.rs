//! Value serialization
//!
//! This module defines the trait abstraction that lets callers swap the codec
//! used for typed cache values, plus the default JSON implementation.
//!
//! Any type implementing `Serialize`/`DeserializeOwned` can be cached; there is
//! no marker trait to opt in to. The codec decides the wire representation.
//! The default is JSON text, with fields emitted in declaration order.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Trait for cache value serialization/deserialization
///
/// This is the pluggable seam between typed facade operations and the wire:
/// outgoing models pass through [`ValueCodec::serialize`], incoming payloads
/// through [`ValueCodec::deserialize`]. Implementations must be
/// `Send + Sync + Debug` so facades can be shared across async tasks.
///
/// # Example: Custom Codec
///
/// ```rust,ignore
/// use typed_redis_cache::ValueCodec;
/// use anyhow::Result;
/// use serde::{Serialize, de::DeserializeOwned};
///
/// #[derive(Debug, Default, Clone)]
/// struct MyCodec;
///
/// impl ValueCodec for MyCodec {
///     fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
///         Ok(mycodec::to_vec(value)?)
///     }
///
///     fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
///         Ok(mycodec::from_slice(bytes)?)
///     }
///
///     fn name(&self) -> &'static str {
///         "mycodec"
///     }
/// }
/// ```
pub trait ValueCodec: Send + Sync + Debug {
    /// Serialize a value to its wire representation
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a wire payload to the requested type
    ///
    /// Fails if the payload's shape does not match `T`'s declared fields.
    /// There is no partial-result or default-value fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded as `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Name of the codec, for logging and debugging.
    fn name(&self) -> &'static str;
}

/// JSON codec using `serde_json`
///
/// The default codec for every facade. Payloads are JSON text, so values
/// written by this crate remain readable by any other JSON-speaking client.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).context("Failed to serialize value to JSON")
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).with_context(|| {
            format!(
                "Failed to deserialize JSON payload ({} bytes)",
                bytes.len()
            )
        })
    }

    fn name(&self) -> &'static str {
        "serde_json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        name: String,
        tags: Vec<String>,
        discount: Option<f64>,
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let codec = JsonCodec;
        let order = Order {
            id: 7,
            name: "widget".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
            discount: Some(0.25),
        };

        let bytes = codec.serialize(&order).unwrap();
        let back: Order = codec.deserialize(&bytes).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn test_fields_emitted_in_declaration_order() {
        let codec = JsonCodec;
        let order = Order {
            id: 1,
            name: "x".to_string(),
            tags: vec![],
            discount: None,
        };

        let json = String::from_utf8(codec.serialize(&order).unwrap()).unwrap();
        let id_pos = json.find("\"id\"").unwrap();
        let name_pos = json.find("\"name\"").unwrap();
        let tags_pos = json.find("\"tags\"").unwrap();
        assert!(id_pos < name_pos && name_pos < tags_pos);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let codec = JsonCodec;
        let bytes = codec.serialize(&serde_json::json!({"unrelated": true})).unwrap();
        let result: Result<Order> = codec.deserialize(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let codec = JsonCodec;
        let result: Result<Order> = codec.deserialize(b"{not json");
        assert!(result.is_err());
    }
}
