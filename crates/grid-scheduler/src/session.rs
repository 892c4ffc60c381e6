//! Session lifecycle and workspace management.
//!
//! Every request runs inside a session with its own workspace directory
//! under the workspace root and its own cancellation token. A session ends
//! exactly once: [`SessionGuard::complete`] on success, or an abort on
//! error, explicit cancel, or when the guard is dropped early (the request
//! future was dropped because the client went away).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};

/// Name of the metadata file written into every workspace.
pub const SESSION_INFO_FILE: &str = "info.json";

/// Longest accepted client-supplied session id.
const MAX_SESSION_ID_LEN: usize = 64;

/// Contents of the workspace metadata file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(rename = "createdTime")]
    pub created_time: DateTime<Utc>,
}

/// An active session as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Handle to a session workspace. The path stays private to this module.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Serialize `value` as JSON into `name` inside the workspace.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let bytes = serde_json::to_vec(value).map_err(|e| {
            SchedulerError::workspace(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(&path, bytes).map_err(|e| SchedulerError::workspace(&path, e))
    }

    /// Whether the workspace directory still exists.
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }
}

struct SessionEntry {
    generation: u64,
    token: CancellationToken,
    created_at: DateTime<Utc>,
    dir: PathBuf,
}

/// Outcome of one workspace sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub removed: usize,
    pub skipped_active: usize,
    pub errors: usize,
}

/// How sessions have ended so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub completed: u64,
    /// Cancelled explicitly or dropped by a disconnected client.
    pub cancelled: u64,
    /// Ended by an error in the pipeline.
    pub failed: u64,
}

/// Tracks active sessions and owns the workspace root.
pub struct SessionManager {
    root: PathBuf,
    active: Mutex<HashMap<String, SessionEntry>>,
    counter: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

impl SessionManager {
    /// Create a manager rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| SchedulerError::workspace(&root, e))?;
        Ok(Self {
            root,
            active: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn counts(&self) -> SessionCounts {
        SessionCounts {
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("exposure_sessions_cancelled_total").increment(1);
    }

    fn active(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start a session, using `requested` as its id when given.
    ///
    /// Creates the workspace and writes its metadata file.
    pub fn start(self: &Arc<Self>, requested: Option<&str>) -> Result<SessionGuard> {
        let generation = self.counter.fetch_add(1, Ordering::Relaxed);
        let id = match requested {
            Some(id) => {
                validate_session_id(id)?;
                id.to_string()
            }
            None => Uuid::new_v4().to_string(),
        };

        let created_at = Utc::now();
        let dir = self.root.join(&id);
        let token = CancellationToken::new();

        {
            let mut active = self.active();
            if active.contains_key(&id) {
                return Err(SchedulerError::SessionConflict(id));
            }
            active.insert(
                id.clone(),
                SessionEntry {
                    generation,
                    token: token.clone(),
                    created_at,
                    dir: dir.clone(),
                },
            );
        }

        let guard = SessionGuard {
            manager: self.clone(),
            id: id.clone(),
            generation,
            token,
            created_at,
            workspace: Workspace { dir: dir.clone() },
            finished: false,
        };

        // on error the guard drops and removes the entry
        std::fs::create_dir_all(&dir).map_err(|e| SchedulerError::workspace(&dir, e))?;
        guard.workspace.write_json(
            SESSION_INFO_FILE,
            &SessionInfo {
                created_time: created_at,
            },
        )?;

        info!(session = %id, "Session started");
        Ok(guard)
    }

    /// Cancel a session on behalf of a disconnected client.
    ///
    /// Fires the session's token and deletes its workspace best-effort.
    /// Returns `false` if no such session is active.
    pub fn cancel(&self, id: &str) -> bool {
        let entry = self.active().remove(id);
        match entry {
            Some(entry) => {
                entry.token.cancel();
                remove_workspace(&entry.dir);
                self.record_cancelled();
                info!(session = %id, "Session cancelled");
                true
            }
            None => false,
        }
    }

    /// Sessions currently running.
    pub fn list(&self) -> Vec<ActiveSession> {
        let mut sessions: Vec<ActiveSession> = self
            .active()
            .iter()
            .map(|(id, entry)| ActiveSession {
                id: id.clone(),
                created_at: entry.created_at,
            })
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        sessions
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active().contains_key(id)
    }

    /// Remove the entry for `id` if it still belongs to `generation`.
    fn finish(&self, id: &str, generation: u64) -> Option<SessionEntry> {
        let mut active = self.active();
        match active.get(id) {
            Some(entry) if entry.generation == generation => active.remove(id),
            _ => None,
        }
    }

    /// Delete workspaces that lack metadata or are older than `retention`.
    ///
    /// Workspaces of active sessions are never touched.
    pub fn sweep_expired(&self, retention: Duration) -> SweepStats {
        let mut stats = SweepStats::default();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Cannot read workspace root");
                stats.errors += 1;
                return stats;
            }
        };

        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            stats.scanned += 1;

            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_active(&name) {
                stats.skipped_active += 1;
                continue;
            }

            let expired = match read_session_info(&path) {
                Some(info) => now.signed_duration_since(info.created_time) > retention,
                None => true,
            };
            if !expired {
                continue;
            }

            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    stats.removed += 1;
                    debug!(workspace = %path.display(), "Removed stale workspace");
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!(workspace = %path.display(), error = %e, "Failed to remove workspace");
                }
            }
        }

        stats
    }
}

fn read_session_info(dir: &Path) -> Option<SessionInfo> {
    let bytes = std::fs::read(dir.join(SESSION_INFO_FILE)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn remove_workspace(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(workspace = %dir.display(), error = %e, "Workspace removal failed"),
    }
}

/// Accept ids made of `[A-Za-z0-9_-]`, 1 to 64 characters.
pub fn validate_session_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(SchedulerError::InvalidSessionId(id.to_string()))
    }
}

/// Owns a running session. Dropping it without calling
/// [`SessionGuard::complete`] aborts the session.
pub struct SessionGuard {
    manager: Arc<SessionManager>,
    id: String,
    generation: u64,
    token: CancellationToken,
    created_at: DateTime<Utc>,
    workspace: Workspace,
    finished: bool,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// End the session normally and delete its workspace.
    pub fn complete(mut self) {
        self.finished = true;
        if self.manager.finish(&self.id, self.generation).is_some() {
            remove_workspace(&self.workspace.dir);
            self.manager.completed.fetch_add(1, Ordering::Relaxed);
            debug!(session = %self.id, "Session completed");
        }
    }

    /// End the session after a pipeline error and delete its workspace.
    pub fn fail(mut self, error: &dyn std::fmt::Display) {
        self.finished = true;
        self.token.cancel();
        if self.manager.finish(&self.id, self.generation).is_some() {
            remove_workspace(&self.workspace.dir);
            self.manager.failed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("exposure_sessions_failed_total").increment(1);
            warn!(session = %self.id, error = %error, "Session failed");
        }
    }
}

impl Drop for SessionGuard {
    /// Reached when the request future is dropped (client disconnect) or
    /// the session was cancelled.
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.token.cancel();
        if self.manager.finish(&self.id, self.generation).is_some() {
            remove_workspace(&self.workspace.dir);
            self.manager.record_cancelled();
            info!(session = %self.id, "Session aborted");
        }
    }
}
