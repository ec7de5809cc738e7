//! Opaque unit state snapshots.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bytes produced by a unit's `create_checkpoint`.
///
/// The adapter never looks inside; on the wire the blob is a base64 string.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Checkpoint(Vec<u8>);

impl Checkpoint {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Checkpoint {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoint({} bytes)", self.0.len())
    }
}

impl Serialize for Checkpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Checkpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Base64Visitor;

        impl Visitor<'_> for Base64Visitor {
            type Value = Checkpoint;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a base64 encoded checkpoint")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                STANDARD.decode(v).map(Checkpoint).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(Base64Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_is_base64() {
        let checkpoint = Checkpoint::new(vec![0, 1, 2, 255]);
        let json = serde_json::to_string(&checkpoint).unwrap();
        assert_eq!(json, "\"AAEC/w==\"");
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_bytes(), &[0, 1, 2, 255]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Checkpoint>("\"not base64!\"").is_err());
    }
}
