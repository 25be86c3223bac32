use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ledmesh_peer::{Handler, PeerHandle};
use ledmesh_proto::{
    Blob, Event, InputId, NodeId, OutputFrame, OutputId, RouteTarget, Sink, SinkId, Source, SourceId,
};
use tracing::{debug, info, warn};

use crate::driver::{Driver, Input, InputConfig, Output};
use crate::error::{NodeError, Result};
use crate::link::RegistryLink;

/// One device as seen by the registry.
///
/// Owns the local drivers, announces them whenever a registry connection
/// comes up, and executes the registry's routing commands.
pub struct NodeSession {
    id: NodeId,
    inputs: BTreeMap<InputId, Arc<dyn Input>>,
    outputs: BTreeMap<OutputId, Arc<dyn Output>>,
    sources: BTreeMap<SourceId, Arc<dyn Driver>>,
    sinks: BTreeMap<SinkId, Arc<dyn Driver>>,
    link: RegistryLink,
}

impl NodeSession {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            sources: BTreeMap::new(),
            sinks: BTreeMap::new(),
            link: RegistryLink::default(),
        }
    }

    pub fn with_input(mut self, input: Arc<dyn Input>) -> Self {
        self.inputs.insert(input.id().clone(), input);
        self
    }

    pub fn with_output(mut self, output: Arc<dyn Output>) -> Self {
        self.outputs.insert(output.id().clone(), output);
        self
    }

    pub fn with_source(mut self, id: impl Into<SourceId>, driver: Arc<dyn Driver>) -> Self {
        self.sources.insert(id.into(), driver);
        self
    }

    pub fn with_sink(mut self, id: impl Into<SinkId>, driver: Arc<dyn Driver>) -> Self {
        self.sinks.insert(id.into(), driver);
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn link(&self) -> &RegistryLink {
        &self.link
    }

    /// Events announcing this node, in the order the registry needs them:
    /// the node itself first, then each input and output.
    pub fn announcements(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(1 + self.inputs.len() + self.outputs.len());
        events.push(Event::NodeConnected {
            id: self.id.clone(),
            sources: self
                .sources
                .iter()
                .map(|(id, driver)| Source {
                    id: id.clone(),
                    config: driver.config(),
                    schema: driver.schema(),
                })
                .collect(),
            sinks: self
                .sinks
                .iter()
                .map(|(id, driver)| Sink {
                    id: id.clone(),
                    config: driver.config(),
                    schema: driver.schema(),
                })
                .collect(),
        });
        events.extend(self.inputs.values().map(|input| Event::InputConnected {
            id: input.id().clone(),
            driver_id: input.driver_id().to_string(),
            schema: input.schema(),
            config: input.config(),
        }));
        events.extend(self.outputs.values().map(|output| Event::OutputConnected {
            id: output.id().clone(),
            driver_id: output.driver_id().to_string(),
            leds: output.leds(),
            schema: output.schema(),
            config: output.config(),
        }));
        events
    }

    /// Arm, re-arm or stop a local input.
    pub fn set_input_active(&self, id: &InputId, routes: Vec<RouteTarget>) -> Result<()> {
        let input = self
            .inputs
            .get(id)
            .ok_or_else(|| NodeError::UnknownInput(id.clone()))?;
        let config = InputConfig::from(routes);
        if config.is_empty() {
            info!(input = %id, "stopping input");
            input.stop();
            return Ok(());
        }
        info!(input = %id, targets = config.targets.len(), "starting input");
        input.start(config, self.link.frames())
    }

    /// Render each frame on its local output. Unknown outputs are skipped.
    pub fn render(&self, frames: Vec<OutputFrame>, latency: Duration) {
        for frame in frames {
            let Some(output) = self.outputs.get(&frame.output_id) else {
                warn!(output = %frame.output_id, "data for unknown output");
                continue;
            };
            let output = Arc::clone(output);
            tokio::task::spawn_blocking(move || {
                if let Err(err) = output.render(&frame.pix, latency) {
                    warn!(output = %frame.output_id, error = %err, "render failed");
                }
            });
        }
    }

    pub fn set_source_config(&self, id: &SourceId, config: Blob) -> Result<()> {
        self.sources
            .get(id)
            .ok_or_else(|| NodeError::UnknownSource(id.clone()))?
            .set_config(config)
    }

    pub fn set_sink_config(&self, id: &SinkId, config: Blob) -> Result<()> {
        self.sinks
            .get(id)
            .ok_or_else(|| NodeError::UnknownSink(id.clone()))?
            .set_config(config)
    }
}

fn ack(result: Result<()>) -> Event {
    match result {
        Ok(()) => Event::ack(),
        Err(err) => Event::nack(err),
    }
}

impl Handler<Event> for NodeSession {
    async fn connected(&self, peer: PeerHandle<Event>) {
        info!(node = %self.id, registry = %peer.addr(), "connected to registry");
        self.link.set(peer.clone());
        for event in self.announcements() {
            if let Err(err) = peer.send(event).await {
                warn!(node = %self.id, error = %err, "announcement failed");
                return;
            }
        }
    }

    async fn disconnected(&self, addr: SocketAddr) {
        info!(node = %self.id, registry = %addr, "disconnected from registry");
        self.link.clear(addr);
    }

    async fn event(&self, _addr: SocketAddr, event: Event) {
        match event {
            Event::SetInputActive { id, outputs } => {
                if let Err(err) = self.set_input_active(&id, outputs) {
                    warn!(input = %id, error = %err, "set input active failed");
                }
            }
            Event::Data {
                outputs, latency, ..
            } => self.render(outputs, Duration::from_micros(latency)),
            other => debug!(event = other.name(), "ignoring event"),
        }
    }

    async fn request(&self, _addr: SocketAddr, event: Event) -> Event {
        match event {
            Event::SetSourceConfig { source_id, config } => {
                ack(self.set_source_config(&source_id, config))
            }
            Event::SetSinkConfig { sink_id, config } => ack(self.set_sink_config(&sink_id, config)),
            other => Event::nack(format!("unsupported request {}", other.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ledmesh_peer::Endpoint;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

    use super::*;
    use crate::link::FrameSender;

    #[derive(Default)]
    struct FakeInput {
        started: Mutex<Vec<InputConfig>>,
        stopped: Mutex<usize>,
        frames: Mutex<Option<FrameSender>>,
    }

    impl Input for FakeInput {
        fn id(&self) -> &InputId {
            static ID: std::sync::OnceLock<InputId> = std::sync::OnceLock::new();
            ID.get_or_init(|| InputId::new("screen"))
        }

        fn driver_id(&self) -> &str {
            "capture"
        }

        fn start(&self, config: InputConfig, frames: FrameSender) -> Result<()> {
            self.started.lock().unwrap().push(config);
            *self.frames.lock().unwrap() = Some(frames);
            Ok(())
        }

        fn stop(&self) {
            *self.stopped.lock().unwrap() += 1;
        }
    }

    struct FakeOutput {
        rendered: UnboundedSender<Vec<u8>>,
    }

    impl Output for FakeOutput {
        fn id(&self) -> &OutputId {
            static ID: std::sync::OnceLock<OutputId> = std::sync::OnceLock::new();
            ID.get_or_init(|| OutputId::new("strip"))
        }

        fn driver_id(&self) -> &str {
            "ws281x"
        }

        fn leds(&self) -> u32 {
            2
        }

        fn render(&self, pix: &[u8], _latency: Duration) -> Result<()> {
            let _ = self.rendered.send(pix.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDriver {
        config: Mutex<Blob>,
    }

    impl Driver for FakeDriver {
        fn config(&self) -> Blob {
            self.config.lock().unwrap().clone()
        }

        fn schema(&self) -> Blob {
            Blob::from("{\"type\":\"object\"}")
        }

        fn set_config(&self, config: Blob) -> Result<()> {
            if config.as_bytes() == b"bad" {
                return Err(NodeError::driver("bad config"));
            }
            *self.config.lock().unwrap() = config;
            Ok(())
        }
    }

    struct Parts {
        session: NodeSession,
        input: Arc<FakeInput>,
        rendered: UnboundedReceiver<Vec<u8>>,
    }

    fn parts() -> Parts {
        let input = Arc::new(FakeInput::default());
        let (tx, rendered) = unbounded_channel();
        let session = NodeSession::new("desk")
            .with_input(input.clone())
            .with_output(Arc::new(FakeOutput { rendered: tx }))
            .with_source("screen-capture", Arc::new(FakeDriver::default()))
            .with_sink("ws281x", Arc::new(FakeDriver::default()));
        Parts {
            session,
            input,
            rendered,
        }
    }

    fn route() -> RouteTarget {
        RouteTarget {
            output_id: OutputId::new("strip"),
            sink_node_id: NodeId::new("desk"),
            leds: 2,
            config: Blob::default(),
        }
    }

    #[test]
    fn node_is_announced_before_its_resources() {
        let events = parts().session.announcements();
        let names: Vec<&str> = events.iter().map(Event::name).collect();
        assert_eq!(
            names,
            ["node_connected", "input_connected", "output_connected"]
        );
        match &events[0] {
            Event::NodeConnected { id, sources, sinks } => {
                assert_eq!(id.as_str(), "desk");
                assert_eq!(sources.len(), 1);
                assert_eq!(sinks[0].schema, Blob::from("{\"type\":\"object\"}"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn set_input_active_starts_and_stops() {
        let parts = parts();
        parts
            .session
            .set_input_active(&InputId::new("screen"), vec![route()])
            .unwrap();
        assert_eq!(parts.input.started.lock().unwrap().len(), 1);

        parts
            .session
            .set_input_active(&InputId::new("screen"), vec![])
            .unwrap();
        assert_eq!(*parts.input.stopped.lock().unwrap(), 1);

        assert!(matches!(
            parts.session.set_input_active(&InputId::new("nope"), vec![route()]),
            Err(NodeError::UnknownInput(_))
        ));
    }

    #[tokio::test]
    async fn data_renders_known_outputs_only() {
        let mut parts = parts();
        parts.session.render(
            vec![
                OutputFrame {
                    output_id: OutputId::new("ghost"),
                    pix: vec![9, 9, 9],
                },
                OutputFrame {
                    output_id: OutputId::new("strip"),
                    pix: vec![1, 2, 3, 4, 5, 6],
                },
            ],
            Duration::from_millis(1),
        );
        assert_eq!(parts.rendered.recv().await.unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn config_requests_are_acknowledged() {
        let session = parts().session;
        let addr = SocketAddr::from(([127, 0, 0, 1], 2110));
        let reply = session
            .request(
                addr,
                Event::SetSinkConfig {
                    sink_id: SinkId::new("ws281x"),
                    config: Blob::from("{}"),
                },
            )
            .await;
        assert_eq!(reply, Event::ack());

        let reply = session
            .request(
                addr,
                Event::SetSourceConfig {
                    source_id: SourceId::new("screen-capture"),
                    config: Blob::from("bad"),
                },
            )
            .await;
        assert!(matches!(reply, Event::Ack { error: Some(ref e) } if e.contains("bad config")));

        let reply = session
            .request(
                addr,
                Event::SetSinkConfig {
                    sink_id: SinkId::new("missing"),
                    config: Blob::default(),
                },
            )
            .await;
        assert!(matches!(reply, Event::Ack { error: Some(_) }));
    }

    struct RegistrySide {
        seen: UnboundedSender<Event>,
    }

    impl Handler<Event> for RegistrySide {
        async fn event(&self, _addr: SocketAddr, event: Event) {
            let _ = self.seen.send(event);
        }

        async fn request(&self, _addr: SocketAddr, _event: Event) -> Event {
            Event::ack()
        }
    }

    #[tokio::test]
    async fn frames_flow_only_while_connected() {
        let parts = parts();
        let input = Arc::clone(&parts.input);
        let node = Endpoint::new(parts.session);
        let (seen, mut registry_rx) = unbounded_channel();
        let registry = Endpoint::new(RegistrySide { seen });

        let registry_addr = SocketAddr::from(([127, 0, 0, 1], 2110));
        let node_addr = SocketAddr::from(([127, 0, 0, 1], 40000));
        let (a, b) = tokio::io::duplex(64 * 1024);
        let node_task = {
            let node = node.clone();
            tokio::spawn(async move { node.serve(a, registry_addr).await })
        };
        {
            let registry = registry.clone();
            tokio::spawn(async move { registry.serve(b, node_addr).await });
        }

        for expected in ["node_connected", "input_connected", "output_connected"] {
            assert_eq!(registry_rx.recv().await.unwrap().name(), expected);
        }

        let peer = loop {
            if let Some(peer) = registry.connections().get(&node_addr) {
                break peer;
            }
            tokio::task::yield_now().await;
        };
        peer.send(Event::SetInputActive {
            id: InputId::new("screen"),
            outputs: vec![route()],
        })
        .await
        .unwrap();

        let frames = loop {
            if let Some(frames) = input.frames.lock().unwrap().clone() {
                break frames;
            }
            tokio::task::yield_now().await;
        };
        assert!(node.handler().link().is_connected());
        let sent = frames.send(
            &NodeId::new("desk"),
            vec![OutputFrame {
                output_id: OutputId::new("strip"),
                pix: vec![0; 6],
            }],
            Duration::from_micros(250),
        );
        assert!(sent);
        match registry_rx.recv().await.unwrap() {
            Event::Data { latency, .. } => assert_eq!(latency, 250),
            other => panic!("unexpected {other:?}"),
        }

        registry.shutdown();
        node_task.await.unwrap().unwrap();
        assert!(!node.handler().link().is_connected());
        assert!(!frames.send(&NodeId::new("desk"), vec![], Duration::ZERO));
    }
}
