//! Registry of live terminal processes.
//!
//! Every live terminal has exactly one entry, keyed by its [`ProcessId`].
//! Entries leave the registry in exactly one way: whichever of
//! [`TerminalRegistry::release`] or the process's own exit is observed first
//! removes it, and only that path terminates the process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use webterm_protocol::{ProcessId, TerminalGeometry, TerminalSummary};
use webterm_pty::{PtyError, PtyProcess};

use crate::config::TerminalConfig;

/// Why a terminal could not be allocated.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("terminal limit of {0} reached")]
    LimitReached(usize),

    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error("spawn task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Live terminals by id.
pub struct TerminalRegistry {
    config: TerminalConfig,
    terminals: RwLock<HashMap<ProcessId, Arc<PtyProcess>>>,
}

impl TerminalRegistry {
    pub fn new(config: TerminalConfig) -> Self {
        Self {
            config,
            terminals: RwLock::new(HashMap::new()),
        }
    }

    /// Spawn a shell of `geometry` in `cwd` and register it.
    ///
    /// A watcher task removes the entry when the process exits on its own.
    pub async fn allocate(
        self: &Arc<Self>,
        geometry: TerminalGeometry,
        cwd: Option<PathBuf>,
    ) -> Result<ProcessId, SpawnError> {
        let command = self.config.shell_command(cwd);
        let id = ProcessId::generate();

        let limit = self.config.max_terminals;
        if self.terminals.read().await.len() >= limit {
            return Err(SpawnError::LimitReached(limit));
        }

        // Opening the PTY and forking block the calling thread.
        let spawn_id = id.clone();
        let process = Arc::new(
            tokio::task::spawn_blocking(move || PtyProcess::spawn(spawn_id, &command, geometry))
                .await??,
        );

        {
            let mut terminals = self.terminals.write().await;
            if terminals.len() >= limit {
                drop(terminals);
                process.terminate();
                debug!(terminal_id = %id, "Terminal limit reached during spawn");
                return Err(SpawnError::LimitReached(limit));
            }
            terminals.insert(id.clone(), Arc::clone(&process));
        }

        let registry = Arc::clone(self);
        let watch_id = id.clone();
        tokio::spawn(async move {
            let exit = process.wait_exit().await;
            drop(process);
            if registry.remove(&watch_id).await.is_some() {
                debug!(terminal_id = %watch_id, code = ?exit.code, "Removed exited terminal");
            }
        });

        info!(terminal_id = %id, geometry = %geometry, "Terminal allocated");
        Ok(id)
    }

    pub async fn get(&self, id: &ProcessId) -> Option<Arc<PtyProcess>> {
        self.terminals.read().await.get(id).cloned()
    }

    /// Terminate and forget a terminal.
    ///
    /// Returns `false` when the id is unknown or was already removed, in
    /// which case nothing is terminated.
    pub async fn release(&self, id: &ProcessId) -> bool {
        match self.remove(id).await {
            Some(process) => {
                process.terminate();
                info!(terminal_id = %id, "Terminal released");
                true
            }
            None => {
                debug!(terminal_id = %id, "Release of unknown terminal ignored");
                false
            }
        }
    }

    /// Terminate every live terminal.
    pub async fn release_all(&self) {
        let drained: Vec<_> = self.terminals.write().await.drain().collect();
        if drained.is_empty() {
            return;
        }

        info!(count = drained.len(), "Releasing all terminals");
        for (id, process) in drained {
            if !process.terminate() && process.is_live() {
                warn!(terminal_id = %id, "Terminal did not accept termination");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.terminals.read().await.len()
    }

    pub async fn list(&self) -> Vec<TerminalSummary> {
        let terminals = self.terminals.read().await;
        let mut summaries: Vec<_> = terminals
            .values()
            .map(|process| {
                let geometry = process.geometry();
                TerminalSummary {
                    id: process.id().clone(),
                    pid: process.pid(),
                    cols: geometry.cols(),
                    rows: geometry.rows(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        summaries
    }

    async fn remove(&self, id: &ProcessId) -> Option<Arc<PtyProcess>> {
        self.terminals.write().await.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn registry_with(shell: &str, args: &[&str], max_terminals: usize) -> Arc<TerminalRegistry> {
        Arc::new(TerminalRegistry::new(TerminalConfig {
            shell: Some(shell.to_string()),
            args: args.iter().map(|s| s.to_string()).collect(),
            max_terminals,
            ..Default::default()
        }))
    }

    fn sleeper() -> Arc<TerminalRegistry> {
        registry_with("/bin/sh", &["-c", "sleep 30"], 8)
    }

    async fn wait_until_gone(registry: &TerminalRegistry, id: &ProcessId) {
        tokio::time::timeout(TIMEOUT, async {
            while registry.get(id).await.is_some() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("terminal should be removed");
    }

    #[tokio::test]
    async fn test_allocate_and_get() {
        let registry = sleeper();
        let id = registry
            .allocate(TerminalGeometry::default(), None)
            .await
            .expect("allocate");

        let process = registry.get(&id).await.expect("registered");
        assert_eq!(process.id(), &id);
        assert!(process.is_live());
        assert_eq!(registry.len().await, 1);

        registry.release_all().await;
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = sleeper();
        let a = registry.allocate(TerminalGeometry::default(), None).await.unwrap();
        let b = registry.allocate(TerminalGeometry::default(), None).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);

        registry.release_all().await;
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_release_is_single_shot() {
        let registry = sleeper();
        let id = registry.allocate(TerminalGeometry::default(), None).await.unwrap();
        let process = registry.get(&id).await.unwrap();

        assert!(registry.release(&id).await);
        assert!(!registry.release(&id).await);
        assert!(registry.get(&id).await.is_none());

        tokio::time::timeout(TIMEOUT, process.wait_exit())
            .await
            .expect("released process should exit");
    }

    #[tokio::test]
    async fn test_release_unknown_is_noop() {
        let registry = sleeper();
        assert!(!registry.release(&ProcessId::new("nope")).await);
    }

    #[tokio::test]
    async fn test_exit_removes_entry() {
        let registry = registry_with("/bin/sh", &["-c", "exit 0"], 8);
        let id = registry.allocate(TerminalGeometry::default(), None).await.unwrap();

        wait_until_gone(&registry, &id).await;
        assert!(!registry.release(&id).await);
    }

    #[tokio::test]
    async fn test_spawn_failure_registers_nothing() {
        let registry = registry_with("/definitely/not/a/shell", &[], 8);
        let result = registry.allocate(TerminalGeometry::default(), None).await;
        assert!(matches!(result, Err(SpawnError::Pty(_))));
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_limit_reached() {
        let registry = registry_with("/bin/sh", &["-c", "sleep 30"], 1);
        registry.allocate(TerminalGeometry::default(), None).await.unwrap();

        let result = registry.allocate(TerminalGeometry::default(), None).await;
        assert!(matches!(result, Err(SpawnError::LimitReached(1))));
        assert_eq!(registry.len().await, 1);

        registry.release_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_respect_limit() {
        let registry = registry_with("/bin/sh", &["-c", "sleep 30"], 3);

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry.allocate(TerminalGeometry::default(), None).await
                })
            })
            .collect();

        let mut allocated = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => allocated += 1,
                Err(SpawnError::LimitReached(3)) => {}
                Err(e) => panic!("unexpected spawn error: {e}"),
            }
        }

        assert_eq!(allocated, 3);
        assert_eq!(registry.len().await, 3);
        registry.release_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lookups_proceed_while_spawning() {
        let registry = sleeper();
        let id = registry.allocate(TerminalGeometry::default(), None).await.unwrap();

        let spawner = Arc::clone(&registry);
        let spawning = tokio::spawn(async move {
            for _ in 0..4 {
                spawner.allocate(TerminalGeometry::default(), None).await.unwrap();
            }
        });
        for _ in 0..20 {
            assert!(registry.get(&id).await.is_some());
            tokio::task::yield_now().await;
        }

        spawning.await.unwrap();
        assert_eq!(registry.len().await, 5);
        registry.release_all().await;
    }

    #[tokio::test]
    async fn test_list_reports_geometry() {
        let registry = sleeper();
        let geometry = TerminalGeometry::new(100, 30).unwrap();
        let id = registry.allocate(geometry, None).await.unwrap();

        let list = registry.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!((list[0].cols, list[0].rows), (100, 30));

        registry.release_all().await;
    }
}
