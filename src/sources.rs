//! Active repositories and the refresh loop that reconciles them.
//!
//! Every refresh reloads the descriptor list from the configuration file:
//!
//! | Descriptor | Action |
//! |------------|--------|
//! | new | build via the registry, `setup()`, activate on success |
//! | unchanged | left running, sync state kept |
//! | gone | `uninstall()`, deactivate |
//!
//! A configuration that fails to load skips the cycle and keeps the current
//! set untouched.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::load_config;
use crate::error::Result;
use crate::models::RepoDescriptor;
use crate::registry::{RepoContext, RepoRegistry};
use crate::traits::Repository;

/// Owns every active repository, keyed by [`RepoDescriptor::id`].
pub struct RepoManager {
    registry: RepoRegistry,
    ctx: RepoContext,
    active: HashMap<String, Box<dyn Repository>>,
}

impl RepoManager {
    pub fn new(registry: RepoRegistry, ctx: RepoContext) -> Self {
        Self {
            registry,
            ctx,
            active: HashMap::new(),
        }
    }

    /// Reconciles the active set against `descriptors`.
    pub async fn refresh(&mut self, descriptors: &[RepoDescriptor]) {
        let mut wanted = HashSet::new();

        for descriptor in descriptors {
            let id = descriptor.id();
            if self.active.contains_key(&id) {
                wanted.insert(id);
                continue;
            }

            let Some(mut repo) = self.registry.build(descriptor, &self.ctx) else {
                warn!(kind = %descriptor.kind, root = %descriptor.root, "repository type not supported");
                continue;
            };
            if let Err(e) = repo.setup().await {
                warn!(repo = %id, error = %e, "repository setup failed");
                continue;
            }
            info!(repo = %id, "added repository");
            self.active.insert(id.clone(), repo);
            wanted.insert(id);
        }

        let gone: Vec<String> = self
            .active
            .keys()
            .filter(|id| !wanted.contains(*id))
            .cloned()
            .collect();
        for id in gone {
            if let Some(mut repo) = self.active.remove(&id) {
                repo.uninstall().await;
                info!(repo = %id, "removed repository");
            }
        }
    }

    /// Runs one refresh cycle from the configuration file.
    ///
    /// On a load error nothing changes and the error is returned.
    pub async fn reload(&mut self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        self.refresh(&config.repo).await;
        Ok(())
    }

    /// Uninstalls every active repository.
    pub async fn shutdown(&mut self) {
        for (id, mut repo) in self.active.drain() {
            repo.uninstall().await;
            info!(repo = %id, "removed repository");
        }
    }

    /// Ids of the active repositories, sorted.
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Reloads `config_path` every `interval` until `cancel` fires, then
    /// uninstalls everything. The first reload happens immediately.
    pub async fn run(mut self, config_path: PathBuf, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.reload(&config_path).await {
                        warn!(error = %e, "skipping repository refresh");
                    }
                }
            }
        }

        self.shutdown().await;
    }
}
