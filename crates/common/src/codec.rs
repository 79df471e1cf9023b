//! Canonical encodings
//!
//! Two encodings are used on the wire:
//!
//! - **Canonical JSON** for inner link bodies. Bodies are plain structs with
//!   a fixed field order and no hash maps, so `serde_json` output is stable.
//! - **DAG-CBOR** for compact binary arrays (outer links, box records, and
//!   signature packets). DAG-CBOR is deterministic by construction.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cbor encode error: {0}")]
    CborEncode(String),
    #[error("cbor decode error: {0}")]
    CborDecode(String),
}

/// Serialize a body to its canonical JSON bytes
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn cbor_encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| CodecError::CborEncode(e.to_string()))
}

pub fn cbor_decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_ipld_dagcbor::from_slice(bytes).map_err(|e| CodecError::CborDecode(e.to_string()))
}

/// A byte string that serializes as a CBOR byte string rather than an
/// array of integers.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Bytes(pub Vec<u8>);

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({})", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes(bytes)
    }
}

impl From<&[u8]> for Bytes {
    fn from(bytes: &[u8]) -> Self {
        Bytes(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Visitor;

        struct BytesVisitor;

        impl<'de> Visitor<'de> for BytesVisitor {
            type Value = Bytes;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte string or sequence of bytes")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Bytes(v.to_vec()))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Bytes(v))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut bytes = Vec::new();
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                Ok(Bytes(bytes))
            }
        }

        // Try bytes first (for CBOR), fallback to seq (for JSON)
        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bytes_encode_as_cbor_byte_string() {
        let encoded = cbor_encode(&Bytes(vec![1, 2, 3])).unwrap();
        // major type 2 (byte string), length 3
        assert_eq!(encoded, vec![0x43, 1, 2, 3]);
        let decoded: Bytes = cbor_decode(&encoded).unwrap();
        assert_eq!(decoded.0, vec![1, 2, 3]);
    }

    #[test]
    fn test_canonical_json_is_stable() {
        #[derive(Serialize)]
        struct Body {
            b: u32,
            a: &'static str,
        }
        let body = Body { b: 1, a: "x" };
        assert_eq!(canonical_json(&body).unwrap(), canonical_json(&body).unwrap());
        assert_eq!(canonical_json(&body).unwrap(), br#"{"b":1,"a":"x"}"#.to_vec());
    }
}
