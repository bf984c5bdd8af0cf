//! Codec Module
//!
//! Turns argument tuples and results into the opaque bytes stored as
//! `args` and `result` blobs, and back.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{MemoError, Result};

// == Codec Trait ==
/// Byte encoding used for both halves of a durable record.
///
/// Encoding must be deterministic: structurally equal values have to produce
/// identical bytes, otherwise equal calls miss each other. Hash-ordered
/// containers (`HashMap`, `HashSet`) break that, use `BTreeMap`/`BTreeSet`
/// in argument types.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a value into bytes.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decodes bytes previously produced by [`Codec::encode`].
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Human-readable rendering of an encoded blob, for diagnostics only.
    fn render(&self, bytes: &[u8]) -> String;
}

// == JSON Codec ==
/// JSON encoding via serde_json. Readable blobs, default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| MemoError::Encoding(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| MemoError::Encoding(e.to_string()))
    }

    fn render(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

// == Bincode Codec ==
/// Compact binary encoding via bincode's serde integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| MemoError::Encoding(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(value, _)| value)
            .map_err(|e| MemoError::Encoding(e.to_string()))
    }

    fn render(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_equal_args_encode_identically() {
        let codec = JsonCodec;
        let a = codec.encode(&(1u32, "x", vec![1.5f64])).unwrap();
        let b = codec.encode(&(1u32, "x", vec![1.5f64])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_json_argument_order_matters() {
        let codec = JsonCodec;
        let a = codec.encode(&(1u32, 2u32)).unwrap();
        let b = codec.encode(&(2u32, 1u32)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_json_render_is_readable() {
        let codec = JsonCodec;
        let bytes = codec.encode(&("inc", 3)).unwrap();
        assert_eq!(codec.render(&bytes), r#"["inc",3]"#);
    }

    #[test]
    fn test_json_non_string_map_keys_fail() {
        let codec = JsonCodec;
        let mut map = BTreeMap::new();
        map.insert((1u8, 2u8), "v");
        assert!(matches!(codec.encode(&map), Err(MemoError::Encoding(_))));
    }

    #[test]
    fn test_json_decode_type_mismatch() {
        let codec = JsonCodec;
        let bytes = codec.encode(&"text").unwrap();
        let decoded: Result<u64> = codec.decode(&bytes);
        assert!(matches!(decoded, Err(MemoError::Encoding(_))));
    }

    #[test]
    fn test_bincode_decode_restores_value() {
        let codec = BincodeCodec;
        let bytes = codec.encode(&(7u64, "seven".to_string())).unwrap();
        let decoded: (u64, String) = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, (7, "seven".to_string()));
    }

    #[test]
    fn test_bincode_render_is_hex() {
        let codec = BincodeCodec;
        assert_eq!(codec.render(&[0x00, 0xab, 0x10]), "00ab10");
    }
}
