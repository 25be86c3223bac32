//! Registry data model.
//!
//! Records are soft state: nodes, inputs and outputs are never removed, only
//! flagged disconnected, because profiles reference them by id.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::ProtoError;
use crate::ids::{InputId, NodeId, OutputId, ProfileId, SinkId, SourceId};

/// Capture input as known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub id: InputId,
    pub driver_id: String,
    pub schema: Blob,
    pub config: Blob,
    pub connected: bool,
    /// Set when another node has since announced this input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to: Option<NodeId>,
}

/// Render output as known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub id: OutputId,
    pub driver_id: String,
    pub leds: u32,
    pub schema: Blob,
    pub config: Blob,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to: Option<NodeId>,
}

/// Capture driver capability advertised by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub config: Blob,
    pub schema: Blob,
}

/// Render driver capability advertised by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    pub id: SinkId,
    pub config: Blob,
    pub schema: Blob,
}

/// A device in the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub connected: bool,
    /// Session address while connected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<SocketAddr>,
    #[serde(default)]
    pub inputs: BTreeMap<InputId, Input>,
    #[serde(default)]
    pub outputs: BTreeMap<OutputId, Output>,
    #[serde(default)]
    pub sources: BTreeMap<SourceId, Source>,
    #[serde(default)]
    pub sinks: BTreeMap<SinkId, Sink>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            connected: false,
            address: None,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            sources: BTreeMap::new(),
            sinks: BTreeMap::new(),
        }
    }

    /// Mark the node and everything it owns as disconnected.
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.address = None;
        for input in self.inputs.values_mut() {
            input.connected = false;
        }
        for output in self.outputs.values_mut() {
            output.connected = false;
        }
    }
}

/// One route of a profile: `input` drives `output`, optionally with a
/// per-route config override (crop, reverse, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoConfig {
    pub input_id: InputId,
    pub output_id: OutputId,
    #[serde(default)]
    pub config: Blob,
}

impl IoConfig {
    pub fn new(input_id: impl Into<InputId>, output_id: impl Into<OutputId>) -> Self {
        Self {
            input_id: input_id.into(),
            output_id: output_id.into(),
            config: Blob::default(),
        }
    }

    pub fn with_config(mut self, config: impl Into<Blob>) -> Self {
        self.config = config.into();
        self
    }
}

impl FromStr for IoConfig {
    type Err = ProtoError;

    /// Parses `INPUT=OUTPUT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (input, output) = s
            .split_once('=')
            .ok_or_else(|| ProtoError::InvalidRoute(s.to_string()))?;
        if input.is_empty() || output.is_empty() {
            return Err(ProtoError::InvalidRoute(s.to_string()));
        }
        Ok(Self::new(input, output))
    }
}

/// A named routing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub io: Vec<IoConfig>,
}

impl Profile {
    /// Output ids this profile writes to.
    pub fn outputs(&self) -> impl Iterator<Item = &OutputId> {
        self.io.iter().map(|io| &io.output_id)
    }
}

/// The registry's single source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, Node>,
    #[serde(default)]
    pub profiles: BTreeMap<ProfileId, Profile>,
    #[serde(default)]
    pub active_profiles: Vec<ProfileId>,
}

impl State {
    pub fn is_active(&self, id: &ProfileId) -> bool {
        self.active_profiles.contains(id)
    }

    /// Active profiles in activation order. Dangling ids are skipped.
    pub fn active(&self) -> impl Iterator<Item = &Profile> {
        self.active_profiles
            .iter()
            .filter_map(|id| self.profiles.get(id))
    }

    /// Drop all connectivity. Used on load, since no session outlives the process.
    pub fn reset_connectivity(&mut self) {
        for node in self.nodes.values_mut() {
            node.disconnect();
        }
    }

    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
