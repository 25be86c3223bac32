/// Errors raised while parsing protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// An identifier was empty.
    #[error("empty {0} id")]
    EmptyId(&'static str),

    /// A route specification could not be parsed.
    #[error("invalid route '{0}' (expected INPUT=OUTPUT)")]
    InvalidRoute(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
