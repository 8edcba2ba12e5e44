use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fundrag_core::error::{Error, Result};

/// What was indexed last time, as persisted in the state file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexState {
    pub hash: String,
    pub document_count: usize,
    pub embedding_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted_at: Option<DateTime<Utc>>,
}

impl IndexState {
    pub fn new(hash: impl Into<String>, document_count: usize, embedding_model: impl Into<String>) -> Self {
        Self { hash: hash.into(), document_count, embedding_model: embedding_model.into(), persisted_at: None }
    }
}

/// Result of reading the state file. Corruption is a value, not an error:
/// it means "rebuild", not "stop".
#[derive(Debug, Clone, PartialEq)]
pub enum StateRead {
    Missing,
    Loaded(IndexState),
    Corrupt(String),
}

impl StateRead {
    pub fn state(&self) -> Option<&IndexState> {
        match self {
            Self::Loaded(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RebuildDecision {
    /// No persisted state.
    Cold,
    /// Fingerprint matches and the vector index holds documents.
    WarmMatched,
    /// Source data changed since the last build.
    WarmStale,
    /// State unreadable, or it matches but the vector index is empty or unreachable.
    WarmCorrupt,
    /// The embedder in use is not the one that built the index.
    ModelChanged { from: String, to: String },
}

impl RebuildDecision {
    pub fn should_rebuild(&self) -> bool {
        !matches!(self, Self::WarmMatched)
    }
}

/// Decides whether the vector index must be rebuilt, and records builds.
pub struct IndexStateManager {
    state_path: PathBuf,
    sources: Vec<PathBuf>,
    model_id: String,
    dim: usize,
}

impl IndexStateManager {
    /// `model_id` and `dim` must describe the embedder actually in use.
    pub fn new(state_path: impl Into<PathBuf>, sources: Vec<PathBuf>, model_id: impl Into<String>, dim: usize) -> Self {
        Self { state_path: state_path.into(), sources, model_id: model_id.into(), dim }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// blake3 over every source file's bytes, then the model id and dimension, each
    /// part length-prefixed.
    /// A source that does not exist contributes its path instead, so adding
    /// the file later changes the fingerprint.
    pub fn current_fingerprint(&self) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        for path in &self.sources {
            match fs::read(path) {
                Ok(bytes) => hash_part(&mut hasher, b'f', &bytes),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "source missing, hashing its path");
                    hash_part(&mut hasher, b'p', path.to_string_lossy().as_bytes());
                }
                Err(e) => return Err(e.into()),
            }
        }
        hash_part(&mut hasher, b'm', self.model_id.as_bytes());
        hash_part(&mut hasher, b'd', &(self.dim as u64).to_le_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }

    pub fn read_state(&self) -> StateRead {
        let raw = match fs::read_to_string(&self.state_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return StateRead::Missing,
            Err(e) => {
                tracing::warn!(path = %self.state_path.display(), error = %e, "index state unreadable");
                return StateRead::Corrupt(e.to_string());
            }
        };
        match serde_json::from_str::<IndexState>(&raw) {
            Ok(state) => StateRead::Loaded(state),
            Err(e) => {
                tracing::warn!(path = %self.state_path.display(), error = %e, "index state corrupt");
                StateRead::Corrupt(e.to_string())
            }
        }
    }

    /// `vector_count` is `None` when the vector index could not be asked.
    pub fn decide(&self, read: &StateRead, fingerprint: &str, vector_count: Option<usize>) -> RebuildDecision {
        let state = match read {
            StateRead::Missing => return RebuildDecision::Cold,
            StateRead::Corrupt(_) => return RebuildDecision::WarmCorrupt,
            StateRead::Loaded(state) => state,
        };
        if state.embedding_model != self.model_id {
            return RebuildDecision::ModelChanged { from: state.embedding_model.clone(), to: self.model_id.clone() };
        }
        if state.hash != fingerprint {
            return RebuildDecision::WarmStale;
        }
        match vector_count {
            Some(n) if n > 0 => RebuildDecision::WarmMatched,
            _ => RebuildDecision::WarmCorrupt,
        }
    }

    pub fn should_rebuild(&self, read: &StateRead, vector_count: Option<usize>) -> Result<bool> {
        let fingerprint = self.current_fingerprint()?;
        Ok(self.decide(read, &fingerprint, vector_count).should_rebuild())
    }

    /// Writes to a temp file in the same directory, then renames over the
    /// old state. Readers see either the old file or the new one.
    pub fn persist(&self, state: &IndexState) -> Result<()> {
        let dir = match self.state_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut stamped = state.clone();
        stamped.persisted_at = Some(Utc::now());

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &stamped)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.state_path).map_err(|e| Error::Io(e.error))?;

        tracing::info!(path = %self.state_path.display(), documents = state.document_count, model = %state.embedding_model, "index state persisted");
        Ok(())
    }
}

/// Tagged and length-prefixed so adjacent parts cannot run into each other.
fn hash_part(hasher: &mut blake3::Hasher, tag: u8, bytes: &[u8]) {
    hasher.update(&[tag]);
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
