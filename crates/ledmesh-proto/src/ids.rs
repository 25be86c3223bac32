use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ProtoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Err(ProtoError::EmptyId($kind));
                }
                Ok(Self(s.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Stable identity of a node, chosen by the node itself.
    NodeId,
    "node"
);
string_id!(
    /// Identity of a capture input, unique across the mesh.
    InputId,
    "input"
);
string_id!(
    /// Identity of a render output, unique across the mesh.
    OutputId,
    "output"
);
string_id!(SourceId, "source");
string_id!(SinkId, "sink");
string_id!(
    /// Registry-assigned profile identity.
    ProfileId,
    "profile"
);

impl ProfileId {
    /// Allocate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = NodeId::new("desk");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"desk\"");
        let back: NodeId = serde_json::from_str("\"desk\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(matches!(
            "".parse::<OutputId>(),
            Err(ProtoError::EmptyId("output"))
        ));
        assert_eq!("strip".parse::<OutputId>().unwrap().as_str(), "strip");
    }

    #[test]
    fn generated_profile_ids_are_unique() {
        assert_ne!(ProfileId::generate(), ProfileId::generate());
    }
}
