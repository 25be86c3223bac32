use serde::{Deserialize, Serialize};

/// How a frame relates to other frames on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Fire-and-forget.
    Event,
    /// Expects a `Response` carrying the same id.
    Request,
    /// Answers the `Request` with the same id.
    Response,
}

/// Correlation wrapper around every payload on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<E> {
    /// Correlation id. Zero for plain events.
    #[serde(default)]
    pub id: u64,
    pub kind: MessageKind,
    pub event: E,
}

impl<E> Envelope<E> {
    pub fn event(event: E) -> Self {
        Self {
            id: 0,
            kind: MessageKind::Event,
            event,
        }
    }

    pub fn request(id: u64, event: E) -> Self {
        Self {
            id,
            kind: MessageKind::Request,
            event,
        }
    }

    pub fn response(id: u64, event: E) -> Self {
        Self {
            id,
            kind: MessageKind::Response,
            event,
        }
    }
}
