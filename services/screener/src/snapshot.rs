//! Latest-results snapshot held by the caller between runs

use crate::ranker::AnalysisRun;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Persists the most recent [`AnalysisRun`] as pretty JSON
pub struct ResultsStore {
    path: PathBuf,
}

impl ResultsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a temporary sibling, then rename over the old snapshot
    pub async fn save(&self, run: &AnalysisRun) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(run)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Wrote {}", self.path.display());
        Ok(())
    }

    /// `None` when no run has been saved yet
    pub async fn load(&self) -> anyhow::Result<Option<AnalysisRun>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let run = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt results snapshot {}", self.path.display()))?;
        Ok(Some(run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::RegimeReading;
    use chrono::Utc;
    use uuid::Uuid;

    fn empty_run() -> AnalysisRun {
        AnalysisRun {
            run_id: Uuid::new_v4(),
            regime: RegimeReading::unknown(),
            total_analyzed: 0,
            top_opportunities: Vec::new(),
            all_stocks: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::new(dir.path().join("latest_results.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::new(dir.path().join("storage").join("latest_results.json"));

        store.save(&empty_run()).await.unwrap();
        let second = empty_run();
        store.save(&second).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.run_id, second.run_id);
        assert!(!dir.path().join("storage").join("latest_results.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest_results.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ResultsStore::new(path).load().await.unwrap_err();
        assert!(err.to_string().contains("Corrupt results snapshot"));
    }
}
