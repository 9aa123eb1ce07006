//! Durable progress tracking for resumable ingestion runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;

use crate::types::RagError;

/// Tracks which units of each source have already been embedded.
///
/// Units are opaque identifiers — chapter titles, or page labels in the no-ToC
/// fallback. The log is the single source of truth for resumption: a unit
/// recorded here is never re-embedded for its source. Every `mark_done`
/// persists the full state to disk before returning, so a crash loses at most
/// the unit that was in flight.
#[derive(Clone, Debug)]
pub struct ProgressLog {
    path: PathBuf,
    state: Arc<Mutex<HashMap<String, HashSet<String>>>>,
}

impl ProgressLog {
    /// Creates a log that persists to the provided path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads previously persisted state, if any.
    pub async fn load(&self) -> Result<(), RagError> {
        if !self.path.exists() {
            return Ok(());
        }
        let data = fs::read_to_string(&self.path).await?;
        let sources: HashMap<String, Vec<String>> =
            serde_json::from_str(&data).map_err(|err| RagError::Storage(err.to_string()))?;
        let mut guard = self.state.lock().await;
        guard.clear();
        for (source, units) in sources {
            guard.insert(source, units.into_iter().collect());
        }
        Ok(())
    }

    /// Returns `true` if `unit` has already been completed for `source`.
    pub async fn is_done(&self, source: &str, unit: &str) -> bool {
        let guard = self.state.lock().await;
        guard
            .get(source)
            .is_some_and(|units| units.contains(unit))
    }

    /// Records `unit` as completed for `source` and persists the state.
    ///
    /// Marking an already-done unit is a no-op: the state is unchanged and the
    /// file is not rewritten.
    pub async fn mark_done(&self, source: &str, unit: &str) -> Result<(), RagError> {
        let mut guard = self.state.lock().await;
        let inserted = guard
            .entry(source.to_string())
            .or_default()
            .insert(unit.to_string());
        if !inserted && self.path.exists() {
            return Ok(());
        }

        // Sorted maps keep the file diffable across runs.
        let snapshot: BTreeMap<String, Vec<String>> = guard
            .iter()
            .map(|(source, units)| {
                let mut units: Vec<String> = units.iter().cloned().collect();
                units.sort();
                (source.clone(), units)
            })
            .collect();
        drop(guard);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let serialized =
            serde_json::to_string(&snapshot).map_err(|err| RagError::Storage(err.to_string()))?;
        fs::write(&self.path, serialized).await?;
        Ok(())
    }
}
