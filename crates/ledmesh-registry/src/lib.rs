//! Registry control plane for ledmesh.
//!
//! Tracks which nodes, inputs and outputs exist, stores routing profiles,
//! arms source nodes when a profile is enabled and relays their data frames
//! to sink nodes.
//!
//! The state machine in [`registry`] is synchronous and owned by a single
//! task ([`actor`]); connections talk to it through [`RegistryHandle`].

pub mod actor;
pub mod config;
pub mod error;
pub mod index;
pub mod registry;
pub mod server;
pub mod sessions;
pub mod store;

pub use actor::RegistryHandle;
pub use config::{RegistryConfig, DEFAULT_PORT};
pub use error::{RegistryError, Result};
pub use index::OwnerIndex;
pub use registry::{Outbound, Outcome, Registry};
pub use server::{RegistryServer, RunningRegistry};
pub use sessions::Sessions;
pub use store::{JsonFileStateHolder, MemoryStateHolder, StateHolder};
