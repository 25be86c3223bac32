//! Interfaces implemented by capture and render drivers.
//!
//! The node never looks inside config or schema blobs; each driver parses
//! and validates its own.

use std::collections::BTreeMap;
use std::time::Duration;

use ledmesh_proto::{Blob, InputId, NodeId, OutputId, RouteTarget};

use crate::error::Result;
use crate::link::FrameSender;

/// One destination an armed input streams to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub output_id: OutputId,
    pub sink: NodeId,
    pub leds: u32,
    pub config: Blob,
}

/// Everything an input needs to stream: its destinations.
///
/// An empty config means stop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputConfig {
    pub targets: Vec<StreamTarget>,
}

impl InputConfig {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Targets grouped by the node that renders them; one data frame goes to
    /// each sink node.
    pub fn by_sink(&self) -> BTreeMap<&NodeId, Vec<&StreamTarget>> {
        let mut grouped: BTreeMap<&NodeId, Vec<&StreamTarget>> = BTreeMap::new();
        for target in &self.targets {
            grouped.entry(&target.sink).or_default().push(target);
        }
        grouped
    }
}

impl From<Vec<RouteTarget>> for InputConfig {
    fn from(routes: Vec<RouteTarget>) -> Self {
        Self {
            targets: routes
                .into_iter()
                .map(|route| StreamTarget {
                    output_id: route.output_id,
                    sink: route.sink_node_id,
                    leds: route.leds,
                    config: route.config,
                })
                .collect(),
        }
    }
}

/// A capture input: screen region, audio analyzer, ...
pub trait Input: Send + Sync + 'static {
    fn id(&self) -> &InputId;

    fn driver_id(&self) -> &str;

    fn schema(&self) -> Blob {
        Blob::default()
    }

    fn config(&self) -> Blob {
        Blob::default()
    }

    /// Start streaming to `config`'s targets, or reconfigure if already
    /// running. Implementations should no-op when `config` matches what is
    /// already running.
    fn start(&self, config: InputConfig, frames: FrameSender) -> Result<()>;

    fn stop(&self);
}

/// A render output: LED strip, debug printer, ...
pub trait Output: Send + Sync + 'static {
    fn id(&self) -> &OutputId;

    fn driver_id(&self) -> &str;

    fn leds(&self) -> u32;

    fn schema(&self) -> Blob {
        Blob::default()
    }

    fn config(&self) -> Blob {
        Blob::default()
    }

    /// Show one frame of packed RGB. May block; the session runs it off the
    /// event loop.
    fn render(&self, pix: &[u8], latency: Duration) -> Result<()>;
}

/// Configurable driver capability, advertised as a source or sink.
pub trait Driver: Send + Sync + 'static {
    fn config(&self) -> Blob;

    fn schema(&self) -> Blob;

    fn set_config(&self, config: Blob) -> Result<()>;
}
