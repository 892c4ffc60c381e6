//! Workspace garbage collection background task.
//!
//! Removes session workspaces that were left behind by a crash or a killed
//! process: directories without readable metadata, or older than the
//! retention window. Workspaces of running sessions are never touched.

use std::sync::Arc;

use anyhow::Result;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info};

use crate::state::AppState;

/// Configuration for the cleanup task.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Whether cleanup is enabled
    pub enabled: bool,
    /// How often to run cleanup (in seconds)
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600, // Run every ten minutes
        }
    }
}

impl CleanupConfig {
    /// Load cleanup configuration from environment.
    pub fn from_env() -> Self {
        let enabled = std::env::var("ENABLE_WORKSPACE_GC")
            .ok()
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true); // Enabled by default

        let interval_secs = std::env::var("WORKSPACE_GC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(600);

        Self {
            enabled,
            interval_secs,
        }
    }
}

/// Background cleanup task.
pub struct CleanupTask {
    state: Arc<AppState>,
    config: CleanupConfig,
}

impl CleanupTask {
    /// Create a new cleanup task.
    pub fn new(state: Arc<AppState>, config: CleanupConfig) -> Self {
        Self { state, config }
    }

    /// Run the cleanup task once.
    pub async fn run_once(&self) -> Result<CleanupStats> {
        let sessions = self.state.scheduler.sessions().clone();
        let retention = self.state.scheduler.config().retention_window();

        let sweep = tokio::task::spawn_blocking(move || sessions.sweep_expired(retention)).await?;
        let stats = CleanupStats {
            scanned: sweep.scanned,
            removed: sweep.removed,
            skipped_active: sweep.skipped_active,
            errors: sweep.errors,
        };

        metrics::counter!("exposure_workspaces_swept_total").increment(stats.removed as u64);
        info!(
            scanned = stats.scanned,
            removed = stats.removed,
            skipped_active = stats.skipped_active,
            errors = stats.errors,
            "Workspace cleanup cycle complete"
        );
        Ok(stats)
    }

    /// Run the cleanup task in a loop.
    pub async fn run_forever(self) {
        if !self.config.enabled {
            info!("Workspace cleanup task disabled");
            return;
        }

        info!(
            interval_secs = self.config.interval_secs,
            "Starting workspace cleanup background task"
        );

        let mut ticker = interval(TokioDuration::from_secs(self.config.interval_secs));

        // first tick fires immediately, which covers the startup sweep
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Workspace cleanup cycle failed");
            }
        }
    }
}

/// Statistics from a cleanup run.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct CleanupStats {
    /// Workspace directories examined
    pub scanned: usize,
    /// Workspaces deleted
    pub removed: usize,
    /// Workspaces left alone because their session is running
    pub skipped_active: usize,
    /// Directories that could not be read or removed
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_scheduler::{KernelRegistry, NoObstructions};
    use projection::Planar;
    use test_utils::test_config;

    #[tokio::test]
    async fn test_run_once_removes_orphaned_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(
            AppState::new(
                test_config(dir.path()),
                Arc::new(Planar),
                Arc::new(NoObstructions),
                KernelRegistry::new(),
            )
            .unwrap(),
        );
        let root = state.scheduler.sessions().root().to_path_buf();
        std::fs::create_dir_all(root.join("crashed")).unwrap();
        let live = state.scheduler.sessions().start(Some("live")).unwrap();

        let task = CleanupTask::new(state.clone(), CleanupConfig::default());
        let stats = task.run_once().await.unwrap();

        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.skipped_active, 1);
        assert!(!root.join("crashed").exists());
        live.complete();
    }
}
