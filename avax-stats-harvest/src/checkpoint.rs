//! Resumable harvest state.
//!
//! A checkpoint is a JSON file holding the loop position and every record
//! fetched so far. It is rewritten atomically after each window or page,
//! so an interrupted run can continue instead of starting over, and it is
//! removed once the output file has been written.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// On-disk wrapper adding the save time to a state.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<S> {
    saved_at: DateTime<Utc>,
    state: S,
}

/// Location of a checkpoint file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    /// Checkpoint stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved state.
    ///
    /// Returns `None` if the file does not exist or cannot be decoded
    /// (logs a warning and triggers a fresh harvest).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load<S: DeserializeOwned>(&self) -> Result<Option<S>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        match serde_json::from_str::<Envelope<S>>(&data) {
            Ok(envelope) => {
                tracing::info!(
                    path = %self.path.display(),
                    saved_at = %envelope.saved_at,
                    "resuming from checkpoint"
                );
                Ok(Some(envelope.state))
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "corrupted checkpoint, starting fresh"
                );
                Ok(None)
            }
        }
    }

    /// Persist `state` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// file cannot be written.
    pub fn save<S: Serialize>(&self, state: &S) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let envelope = Envelope {
            saved_at: Utc::now(),
            state,
        };
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&envelope)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }

    /// Remove the checkpoint after a completed harvest.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct State {
        next: u64,
        items: Vec<String>,
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cp = Checkpoint::new(dir.path().join("nested/state.json"));
        assert_eq!(cp.load::<State>().unwrap(), None);

        let state = State {
            next: 42,
            items: vec!["a".into(), "b".into()],
        };
        cp.save(&state).unwrap();
        assert!(!cp.path().with_extension("json.tmp").exists(), "tmp left behind");
        assert_eq!(cp.load::<State>().unwrap(), Some(state));

        cp.clear().unwrap();
        assert!(!cp.path().exists(), "checkpoint not removed");
        cp.clear().unwrap();
    }

    #[test]
    fn corrupted_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let cp = Checkpoint::new(dir.path().join("state.json"));
        std::fs::write(cp.path(), "{ not json").unwrap();
        assert_eq!(cp.load::<State>().unwrap(), None);
    }
}
