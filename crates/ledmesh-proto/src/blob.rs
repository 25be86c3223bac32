use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque driver-owned bytes (config or schema).
///
/// The registry stores and forwards these without interpreting them; each
/// driver parses its own blob into a typed structure.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Serialize a typed value as a JSON blob.
    pub fn from_json<T: Serialize>(value: &T) -> crate::Result<Self> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    /// Parse the blob as JSON into a typed value.
    pub fn to_json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob(<{} bytes>)", self.0.len())
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Blob {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_helpers_roundtrip_typed_config() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Crop {
            left: u32,
            reverse: bool,
        }

        let blob = Blob::from_json(&Crop {
            left: 4,
            reverse: true,
        })
        .unwrap();
        let back: Crop = blob.to_json().unwrap();
        assert_eq!(
            back,
            Crop {
                left: 4,
                reverse: true
            }
        );
    }

    #[test]
    fn debug_hides_contents() {
        let blob = Blob::from("secret-config");
        assert_eq!(format!("{blob:?}"), "Blob(<13 bytes>)");
    }
}
