use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledmesh_node::{FrameSender, Input, InputConfig, NodeConfig, NodeSession, Output, Result};
use ledmesh_peer::PeerListener;
use ledmesh_proto::{InputId, IoConfig, NodeId, OutputFrame, OutputId};
use ledmesh_registry::{MemoryStateHolder, RegistryConfig, RegistryServer};
use ledmesh_transport::{BackoffPolicy, DialConfig, StaticResolver};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

/// Emits one solid frame per target every time it is started.
struct SolidColor {
    id: InputId,
    starts: Mutex<usize>,
}

impl Input for SolidColor {
    fn id(&self) -> &InputId {
        &self.id
    }

    fn driver_id(&self) -> &str {
        "solid"
    }

    fn start(&self, config: InputConfig, frames: FrameSender) -> Result<()> {
        *self.starts.lock().unwrap() += 1;
        for (sink, targets) in config.by_sink() {
            let outputs = targets
                .iter()
                .map(|target| OutputFrame {
                    output_id: target.output_id.clone(),
                    pix: [255, 0, 0].repeat(target.leds as usize),
                })
                .collect();
            frames.send(sink, outputs, Duration::from_micros(100));
        }
        Ok(())
    }

    fn stop(&self) {}
}

struct Strip {
    id: OutputId,
    rendered: UnboundedSender<Vec<u8>>,
}

impl Output for Strip {
    fn id(&self) -> &OutputId {
        &self.id
    }

    fn driver_id(&self) -> &str {
        "debug"
    }

    fn leds(&self) -> u32 {
        4
    }

    fn render(&self, pix: &[u8], _latency: Duration) -> Result<()> {
        let _ = self.rendered.send(pix.to_vec());
        Ok(())
    }
}

fn node_config() -> NodeConfig {
    NodeConfig {
        dial: DialConfig {
            timeout: Duration::from_millis(500),
            backoff: BackoffPolicy {
                base: Duration::from_millis(20),
                max: Duration::from_millis(100),
                jitter: 0.1,
            },
            nodelay: true,
        },
        ..NodeConfig::default()
    }
}

#[tokio::test]
async fn enabled_profile_streams_from_source_node_to_sink_node() {
    let running =
        RegistryServer::start(MemoryStateHolder::new(), &RegistryConfig::default()).unwrap();
    let listener =
        PeerListener::bind_addr("127.0.0.1:0".parse().unwrap(), running.endpoint.clone())
            .await
            .unwrap();
    let registry_addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run());

    let input = Arc::new(SolidColor {
        id: InputId::new("screen"),
        starts: Mutex::new(0),
    });
    let source = ledmesh_node::spawn(
        NodeSession::new("cam").with_input(input.clone()),
        StaticResolver::new([registry_addr]),
        node_config(),
    );

    let (rendered_tx, mut rendered) = unbounded_channel();
    let sink = ledmesh_node::spawn(
        NodeSession::new("strip").with_output(Arc::new(Strip {
            id: OutputId::new("leds"),
            rendered: rendered_tx,
        })),
        StaticResolver::new([registry_addr]),
        node_config(),
    );

    let handle = running.server().handle().clone();
    for _ in 0..200 {
        let state = handle.snapshot().await.unwrap();
        let ready = state
            .nodes
            .get(&NodeId::new("cam"))
            .is_some_and(|node| node.inputs.contains_key(&InputId::new("screen")))
            && state
                .nodes
                .get(&NodeId::new("strip"))
                .is_some_and(|node| node.outputs.contains_key(&OutputId::new("leds")));
        if ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(source.registry_addr(), Some(registry_addr));

    let profile = handle
        .create_profile("ambient".into(), vec![IoConfig::new("screen", "leds")])
        .await
        .unwrap();
    handle.enable_profile(profile.id).await.unwrap();

    let pix = tokio::time::timeout(Duration::from_secs(5), rendered.recv())
        .await
        .expect("frame should be rendered")
        .unwrap();
    assert_eq!(pix, [255, 0, 0].repeat(4));
    assert_eq!(*input.starts.lock().unwrap(), 1);

    source.shutdown().await;
    sink.shutdown().await;
    running.endpoint.shutdown();
}
