//! Wire events and the shared data model.
//!
//! Both sides of a ledmesh connection speak [`Event`]. The registry's
//! persisted [`State`] lives here too, since operators receive it verbatim
//! in `Snapshot` replies.

pub mod blob;
pub mod error;
pub mod event;
pub mod ids;
pub mod model;

pub use blob::Blob;
pub use error::{ProtoError, Result};
pub use event::{Event, OutputFrame, RouteTarget};
pub use ids::{InputId, NodeId, OutputId, ProfileId, SinkId, SourceId};
pub use model::{Input, IoConfig, Node, Output, Profile, Sink, Source, State};
