use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::ids::{InputId, NodeId, OutputId, ProfileId, SinkId, SourceId};
use crate::model::{IoConfig, Profile, Sink, Source, State};

/// Pixel data for one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFrame {
    pub output_id: OutputId,
    /// Packed RGB bytes, three per LED.
    pub pix: Vec<u8>,
}

/// Where an active input should stream to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub output_id: OutputId,
    pub sink_node_id: NodeId,
    pub leds: u32,
    pub config: Blob,
}

/// Every message exchanged between nodes, the registry and operators.
///
/// The set is closed: frames carrying an unknown `type` fail to decode and
/// are dropped by the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Node -> registry.
    NodeConnected {
        id: NodeId,
        #[serde(default)]
        sources: Vec<Source>,
        #[serde(default)]
        sinks: Vec<Sink>,
    },
    InputConnected {
        id: InputId,
        driver_id: String,
        #[serde(default)]
        schema: Blob,
        #[serde(default)]
        config: Blob,
    },
    InputDisconnected {
        id: InputId,
    },
    OutputConnected {
        id: OutputId,
        driver_id: String,
        leds: u32,
        #[serde(default)]
        schema: Blob,
        #[serde(default)]
        config: Blob,
    },
    OutputDisconnected {
        id: OutputId,
    },
    /// Pixel frame addressed to the node that owns `outputs`.
    Data {
        sink_id: NodeId,
        outputs: Vec<OutputFrame>,
        /// Capture-to-send latency in microseconds.
        #[serde(default)]
        latency: u64,
    },

    // Registry -> node.
    SetInputActive {
        id: InputId,
        outputs: Vec<RouteTarget>,
    },
    SetSourceConfig {
        source_id: SourceId,
        config: Blob,
    },
    SetSinkConfig {
        sink_id: SinkId,
        config: Blob,
    },

    // Operator -> registry.
    CreateProfile {
        name: String,
        io: Vec<IoConfig>,
    },
    EnableProfile {
        id: ProfileId,
    },
    DisableProfile {
        id: ProfileId,
    },
    DeleteProfile {
        id: ProfileId,
    },
    GetState,

    // Replies.
    Ack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ProfileCreated {
        profile: Profile,
    },
    Snapshot {
        state: State,
    },
}

impl Event {
    pub fn ack() -> Self {
        Self::Ack { error: None }
    }

    pub fn nack(error: impl ToString) -> Self {
        Self::Ack {
            error: Some(error.to_string()),
        }
    }

    /// Short variant name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NodeConnected { .. } => "node_connected",
            Self::InputConnected { .. } => "input_connected",
            Self::InputDisconnected { .. } => "input_disconnected",
            Self::OutputConnected { .. } => "output_connected",
            Self::OutputDisconnected { .. } => "output_disconnected",
            Self::Data { .. } => "data",
            Self::SetInputActive { .. } => "set_input_active",
            Self::SetSourceConfig { .. } => "set_source_config",
            Self::SetSinkConfig { .. } => "set_sink_config",
            Self::CreateProfile { .. } => "create_profile",
            Self::EnableProfile { .. } => "enable_profile",
            Self::DisableProfile { .. } => "disable_profile",
            Self::DeleteProfile { .. } => "delete_profile",
            Self::GetState => "get_state",
            Self::Ack { .. } => "ack",
            Self::ProfileCreated { .. } => "profile_created",
            Self::Snapshot { .. } => "snapshot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::InputDisconnected {
            id: InputId::new("screen"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "input_disconnected", "id": "screen" })
        );
    }

    #[test]
    fn unknown_type_fails_to_decode() {
        let result = serde_json::from_str::<Event>(r#"{"type":"self_destruct"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn optional_blobs_default_to_empty() {
        let event: Event = serde_json::from_str(
            r#"{"type":"output_connected","id":"strip","driver_id":"ws281x","leds":30}"#,
        )
        .unwrap();
        match event {
            Event::OutputConnected {
                leds,
                schema,
                config,
                ..
            } => {
                assert_eq!(leds, 30);
                assert!(schema.is_empty());
                assert!(config.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn ack_helpers() {
        assert_eq!(Event::ack(), Event::Ack { error: None });
        assert_eq!(
            Event::nack("bad config"),
            Event::Ack {
                error: Some("bad config".into())
            }
        );
        assert_eq!(Event::GetState.name(), "get_state");
    }
}
