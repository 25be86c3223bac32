//! The registry state machine.
//!
//! [`Registry`] is plain synchronous code: every method runs to completion
//! against `&mut self`, and outbound traffic goes through an [`Outbound`]
//! that never blocks. Serialization is the caller's job; see
//! [`crate::actor`].

use std::collections::BTreeSet;
use std::net::SocketAddr;

use ledmesh_peer::{Connections, PeerError};
use ledmesh_proto::{
    Blob, Event, Input, InputId, IoConfig, Node, NodeId, Output, OutputFrame, OutputId, Profile,
    ProfileId, RouteTarget, Sink, SinkId, Source, SourceId, State,
};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};
use crate::index::OwnerIndex;
use crate::sessions::Sessions;

/// Where the registry's outbound events go.
pub trait Outbound: Send + 'static {
    /// Queue a control event. Events for one address are delivered in call
    /// order; delivery may complete after the call returns.
    fn send(&self, addr: SocketAddr, event: Event);

    /// Forward a data frame, dropping it if the sink cannot take it now.
    fn relay(&self, addr: SocketAddr, event: Event);
}

impl Outbound for Connections<Event> {
    fn send(&self, addr: SocketAddr, event: Event) {
        let name = event.name();
        if let Err(err) = self.send_control(addr, event) {
            warn!(addr = %addr, event = name, error = %err, "control send failed");
        }
    }

    fn relay(&self, addr: SocketAddr, event: Event) {
        match self.try_write(addr, event) {
            Ok(()) => {}
            Err(PeerError::QueueFull(_)) => debug!(addr = %addr, "sink busy, frame dropped"),
            Err(err) => debug!(addr = %addr, error = %err, "relay failed"),
        }
    }
}

/// Whether an operation changed persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Mutated,
    Unchanged,
}

impl Outcome {
    pub fn is_mutated(self) -> bool {
        self == Self::Mutated
    }
}

pub struct Registry<O> {
    state: State,
    index: OwnerIndex,
    sessions: Sessions,
    outbound: O,
}

impl<O: Outbound> Registry<O> {
    /// Take ownership of previously persisted state.
    ///
    /// Connectivity is cleared since no session outlives the process that
    /// accepted it.
    pub fn new(mut state: State, outbound: O) -> Self {
        state.reset_connectivity();
        let index = OwnerIndex::from_state(&state);
        Self {
            state,
            index,
            sessions: Sessions::default(),
            outbound,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn index(&self) -> &OwnerIndex {
        &self.index
    }

    pub fn outbound(&self) -> &O {
        &self.outbound
    }

    /// Apply one event received on the connection at `addr`.
    pub fn process_event(&mut self, addr: SocketAddr, event: Event) -> Result<Outcome> {
        match event {
            Event::NodeConnected { id, sources, sinks } => {
                self.handle_node_connected(addr, id, sources, sinks)?;
            }
            Event::InputConnected {
                id,
                driver_id,
                schema,
                config,
            } => self.handle_input_connected(addr, id, driver_id, schema, config)?,
            Event::InputDisconnected { id } => self.handle_input_disconnected(addr, &id)?,
            Event::OutputConnected {
                id,
                driver_id,
                leds,
                schema,
                config,
            } => self.handle_output_connected(addr, id, driver_id, leds, schema, config)?,
            Event::OutputDisconnected { id } => self.handle_output_disconnected(addr, &id)?,
            Event::Data {
                sink_id,
                outputs,
                latency,
            } => {
                self.handle_data(addr, sink_id, outputs, latency)?;
                return Ok(Outcome::Unchanged);
            }
            other => return Err(RegistryError::UnexpectedEvent(other.name())),
        }
        Ok(Outcome::Mutated)
    }

    pub fn handle_node_connected(
        &mut self,
        addr: SocketAddr,
        id: NodeId,
        sources: Vec<Source>,
        sinks: Vec<Sink>,
    ) -> Result<()> {
        if self.sessions.node_of(&addr).is_some() {
            return Err(RegistryError::AlreadyConnected);
        }
        if let Some(old) = self.sessions.bind(addr, id.clone()) {
            warn!(node = %id, old = %old, new = %addr, "node reconnected from a new address");
        }

        let node = self
            .state
            .nodes
            .entry(id.clone())
            .or_insert_with(|| Node::new(id.clone()));
        node.connected = true;
        node.address = Some(addr);
        node.sources = sources
            .into_iter()
            .map(|source| (source.id.clone(), source))
            .collect();
        node.sinks = sinks
            .into_iter()
            .map(|sink| (sink.id.clone(), sink))
            .collect();

        info!(node = %id, addr = %addr, "node connected");
        Ok(())
    }

    /// Tear down the session at `addr`, soft-disconnecting the node and
    /// everything it owns.
    pub fn handle_disconnect(&mut self, addr: SocketAddr) -> Result<()> {
        let id = self
            .sessions
            .unbind(&addr)
            .ok_or(RegistryError::AlreadyDisconnected)?;
        if let Some(node) = self.state.nodes.get_mut(&id) {
            node.disconnect();
        }
        info!(node = %id, addr = %addr, "node disconnected");
        Ok(())
    }

    pub fn handle_input_connected(
        &mut self,
        addr: SocketAddr,
        id: InputId,
        driver_id: String,
        schema: Blob,
        config: Blob,
    ) -> Result<()> {
        let owner = self.session_node(&addr)?;
        if let Some(previous) = self.index.claim_input(id.clone(), &owner) {
            warn!(input = %id, from = %previous, to = %owner, "input moved between nodes");
            if let Some(stale) = self
                .state
                .nodes
                .get_mut(&previous)
                .and_then(|node| node.inputs.get_mut(&id))
            {
                stale.connected = false;
                stale.moved_to = Some(owner.clone());
            }
        }

        let node = self.node_mut(&owner)?;
        match node.inputs.get_mut(&id) {
            Some(input) => {
                input.connected = true;
                input.moved_to = None;
                input.driver_id = driver_id;
                if !schema.is_empty() {
                    input.schema = schema;
                }
                if !config.is_empty() {
                    input.config = config;
                }
            }
            None => {
                node.inputs.insert(
                    id.clone(),
                    Input {
                        id: id.clone(),
                        driver_id,
                        schema,
                        config,
                        connected: true,
                        moved_to: None,
                    },
                );
            }
        }
        debug!(node = %owner, input = %id, "input connected");

        // Resume streaming for routes that were active before the input went away.
        let routes = self.routes_for_input(&id);
        if !routes.is_empty() {
            info!(input = %id, routes = routes.len(), "re-arming input");
            self.outbound
                .send(addr, Event::SetInputActive { id, outputs: routes });
        }
        Ok(())
    }

    pub fn handle_input_disconnected(&mut self, addr: SocketAddr, id: &InputId) -> Result<()> {
        let owner = self.session_node(&addr)?;
        if !self.mark_input_disconnected(&owner, id) {
            return Err(RegistryError::UnknownInput(id.clone()));
        }
        debug!(node = %owner, input = %id, "input disconnected");
        Ok(())
    }

    pub fn handle_output_connected(
        &mut self,
        addr: SocketAddr,
        id: OutputId,
        driver_id: String,
        leds: u32,
        schema: Blob,
        config: Blob,
    ) -> Result<()> {
        let owner = self.session_node(&addr)?;
        if let Some(previous) = self.index.claim_output(id.clone(), &owner) {
            warn!(output = %id, from = %previous, to = %owner, "output moved between nodes");
            if let Some(stale) = self
                .state
                .nodes
                .get_mut(&previous)
                .and_then(|node| node.outputs.get_mut(&id))
            {
                stale.connected = false;
                stale.moved_to = Some(owner.clone());
            }
        }

        let node = self.node_mut(&owner)?;
        match node.outputs.get_mut(&id) {
            Some(output) => {
                output.connected = true;
                output.moved_to = None;
                output.driver_id = driver_id;
                output.leds = leds;
                if !schema.is_empty() {
                    output.schema = schema;
                }
                if !config.is_empty() {
                    output.config = config;
                }
            }
            None => {
                node.outputs.insert(
                    id.clone(),
                    Output {
                        id: id.clone(),
                        driver_id,
                        leds,
                        schema,
                        config,
                        connected: true,
                        moved_to: None,
                    },
                );
            }
        }
        debug!(node = %owner, output = %id, "output connected");
        Ok(())
    }

    pub fn handle_output_disconnected(&mut self, addr: SocketAddr, id: &OutputId) -> Result<()> {
        let owner = self.session_node(&addr)?;
        if !self.mark_output_disconnected(&owner, id) {
            return Err(RegistryError::UnknownOutput(id.clone()));
        }
        debug!(node = %owner, output = %id, "output disconnected");
        Ok(())
    }

    pub fn create_profile(&mut self, name: String, io: Vec<IoConfig>) -> Result<Profile> {
        if io.is_empty() {
            return Err(RegistryError::EmptyIo);
        }
        let profile = Profile {
            id: ProfileId::generate(),
            name,
            io,
        };
        info!(profile = %profile.id, name = %profile.name, routes = profile.io.len(), "profile created");
        self.state
            .profiles
            .insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    /// Activate a profile and tell every source node to start streaming.
    ///
    /// All checks run before any state change, so a rejected call leaves
    /// `active_profiles` untouched.
    pub fn enable_profile(&mut self, id: &ProfileId) -> Result<()> {
        let profile = self
            .state
            .profiles
            .get(id)
            .ok_or_else(|| RegistryError::ProfileNotFound(id.clone()))?;
        if self.state.is_active(id) {
            return Err(RegistryError::ProfileAlreadyEnabled(id.clone()));
        }

        let claimed: BTreeSet<&OutputId> = self
            .state
            .active()
            .flat_map(|active| active.outputs())
            .collect();
        if let Some(conflict) = profile.outputs().find(|output| claimed.contains(output)) {
            return Err(RegistryError::OutputInUse(conflict.clone()));
        }

        let inputs = distinct_inputs(&profile.io);
        self.state.active_profiles.push(id.clone());
        info!(profile = %id, "profile enabled");

        for input in inputs {
            self.arm(&input);
        }
        Ok(())
    }

    /// Deactivate a profile. Inputs it routed are re-armed with whatever
    /// routes remain active, which stops them when nothing remains.
    pub fn disable_profile(&mut self, id: &ProfileId) -> Result<()> {
        let profile = self
            .state
            .profiles
            .get(id)
            .ok_or_else(|| RegistryError::ProfileNotFound(id.clone()))?;
        if !self.state.is_active(id) {
            return Err(RegistryError::ProfileNotEnabled(id.clone()));
        }

        let inputs = distinct_inputs(&profile.io);
        self.state.active_profiles.retain(|active| active != id);
        info!(profile = %id, "profile disabled");

        for input in inputs {
            self.arm(&input);
        }
        Ok(())
    }

    pub fn delete_profile(&mut self, id: &ProfileId) -> Result<()> {
        if !self.state.profiles.contains_key(id) {
            return Err(RegistryError::ProfileNotFound(id.clone()));
        }
        if self.state.is_active(id) {
            return Err(RegistryError::ProfileActive(id.clone()));
        }
        self.state.profiles.remove(id);
        info!(profile = %id, "profile deleted");
        Ok(())
    }

    /// Authorize a data frame from `addr` and relay it to the sink node.
    pub fn handle_data(
        &self,
        addr: SocketAddr,
        sink_id: NodeId,
        outputs: Vec<OutputFrame>,
        latency: u64,
    ) -> Result<()> {
        let source = self
            .sessions
            .node_of(&addr)
            .ok_or(RegistryError::NodeDisconnected)?;
        if !self.state.nodes.contains_key(&sink_id) {
            return Err(RegistryError::UnknownSinkNode(sink_id));
        }
        let sink_addr = self
            .sessions
            .addr_of(&sink_id)
            .ok_or_else(|| RegistryError::SinkNodeDisconnected(sink_id.clone()))?;

        let routed = self.outputs_routed_from(source);
        if !outputs
            .iter()
            .any(|frame| routed.contains(&frame.output_id))
        {
            return Err(RegistryError::InvalidOutput);
        }

        self.outbound.relay(
            sink_addr,
            Event::Data {
                sink_id,
                outputs,
                latency,
            },
        );
        Ok(())
    }

    /// Every route from `input` across all active profiles.
    ///
    /// A route's config is the profile's override when set, otherwise the
    /// output's stored config. Outputs with no known owner are skipped.
    pub fn routes_for_input(&self, input: &InputId) -> Vec<RouteTarget> {
        let mut seen = BTreeSet::new();
        let mut routes = Vec::new();
        for profile in self.state.active() {
            for io in profile.io.iter().filter(|io| &io.input_id == input) {
                if !seen.insert(&io.output_id) {
                    continue;
                }
                let Some(owner) = self.index.output_owner(&io.output_id) else {
                    debug!(output = %io.output_id, "route skipped, output never announced");
                    continue;
                };
                let output = self
                    .state
                    .nodes
                    .get(owner)
                    .and_then(|node| node.outputs.get(&io.output_id));
                let (leds, stored) = match output {
                    Some(output) => (output.leds, output.config.clone()),
                    None => (0, Blob::default()),
                };
                routes.push(RouteTarget {
                    output_id: io.output_id.clone(),
                    sink_node_id: owner.clone(),
                    leds,
                    config: if io.config.is_empty() {
                        stored
                    } else {
                        io.config.clone()
                    },
                });
            }
        }
        routes
    }

    /// Live session address of `node`.
    pub fn session_of(&self, node: &NodeId) -> Option<SocketAddr> {
        self.sessions.addr_of(node)
    }

    /// Record a source config the node has accepted.
    pub fn store_source_config(
        &mut self,
        node: &NodeId,
        source_id: &SourceId,
        config: Blob,
    ) -> Result<()> {
        let source = self
            .node_mut(node)?
            .sources
            .get_mut(source_id)
            .ok_or_else(|| RegistryError::UnknownSource {
                node: node.clone(),
                source_id: source_id.clone(),
            })?;
        source.config = config;
        Ok(())
    }

    /// Record a sink config the node has accepted.
    pub fn store_sink_config(&mut self, node: &NodeId, sink_id: &SinkId, config: Blob) -> Result<()> {
        let sink = self
            .node_mut(node)?
            .sinks
            .get_mut(sink_id)
            .ok_or_else(|| RegistryError::UnknownSink {
                node: node.clone(),
                sink_id: sink_id.clone(),
            })?;
        sink.config = config;
        Ok(())
    }

    /// Push the current route set for `input` to its owning node, if live.
    fn arm(&self, input: &InputId) {
        let Some(owner) = self.index.input_owner(input) else {
            warn!(input = %input, "input has no known owner, not armed");
            return;
        };
        let Some(addr) = self.sessions.addr_of(owner) else {
            info!(input = %input, node = %owner, "owner offline, will arm on reconnect");
            return;
        };
        let outputs = self.routes_for_input(input);
        debug!(input = %input, node = %owner, routes = outputs.len(), "arming input");
        self.outbound.send(
            addr,
            Event::SetInputActive {
                id: input.clone(),
                outputs,
            },
        );
    }

    fn outputs_routed_from(&self, source: &NodeId) -> BTreeSet<&OutputId> {
        self.state
            .active()
            .flat_map(|profile| profile.io.iter())
            .filter(|io| self.index.input_owner(&io.input_id) == Some(source))
            .map(|io| &io.output_id)
            .collect()
    }

    fn session_node(&self, addr: &SocketAddr) -> Result<NodeId> {
        self.sessions
            .node_of(addr)
            .cloned()
            .ok_or(RegistryError::NodeDisconnected)
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node> {
        self.state
            .nodes
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownNode(id.clone()))
    }

    fn mark_input_disconnected(&mut self, node: &NodeId, id: &InputId) -> bool {
        match self
            .state
            .nodes
            .get_mut(node)
            .and_then(|node| node.inputs.get_mut(id))
        {
            Some(input) => {
                input.connected = false;
                true
            }
            None => false,
        }
    }

    fn mark_output_disconnected(&mut self, node: &NodeId, id: &OutputId) -> bool {
        match self
            .state
            .nodes
            .get_mut(node)
            .and_then(|node| node.outputs.get_mut(id))
        {
            Some(output) => {
                output.connected = false;
                true
            }
            None => false,
        }
    }
}

/// Input ids of `io` in first-seen order.
fn distinct_inputs(io: &[IoConfig]) -> Vec<InputId> {
    let mut seen = BTreeSet::new();
    io.iter()
        .filter(|io| seen.insert(&io.input_id))
        .map(|io| io.input_id.clone())
        .collect()
}
