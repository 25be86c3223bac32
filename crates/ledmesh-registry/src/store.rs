use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ledmesh_proto::State;
use tracing::debug;

use crate::error::Result;

/// Durable home of the registry state.
///
/// The registry writes the whole snapshot after every mutation and reads it
/// once at startup.
pub trait StateHolder: Send + 'static {
    /// The last saved state, or `None` if nothing was ever saved.
    fn get_state(&self) -> Result<Option<State>>;

    fn set_state(&self, state: &State) -> Result<()>;
}

/// Pretty-printed JSON file, replaced atomically on each save.
#[derive(Debug, Clone)]
pub struct JsonFileStateHolder {
    path: PathBuf,
}

impl JsonFileStateHolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateHolder for JsonFileStateHolder {
    fn get_state(&self) -> Result<Option<State>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(State::from_json(&bytes)?))
    }

    fn set_state(&self, state: &State) -> Result<()> {
        let bytes = state.to_json()?;
        let temp = self.temp_path();
        std::fs::write(&temp, bytes)?;
        std::fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

/// In-process store holding the serialized snapshot.
///
/// Clones share the same slot, so a test can keep one handle while the
/// registry owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateHolder {
    saved: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStateHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_state(state: &State) -> Result<Self> {
        let holder = Self::new();
        holder.set_state(state)?;
        Ok(holder)
    }

    /// Number of bytes in the last save, if any.
    pub fn saved_len(&self) -> Option<usize> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Vec::len)
    }
}

impl StateHolder for MemoryStateHolder {
    fn get_state(&self) -> Result<Option<State>> {
        let saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        match saved.as_deref() {
            Some(bytes) => Ok(Some(State::from_json(bytes)?)),
            None => Ok(None),
        }
    }

    fn set_state(&self, state: &State) -> Result<()> {
        let bytes = state.to_json()?;
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }
}
