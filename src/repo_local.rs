//! Local filesystem repository.
//!
//! Polls a directory tree and keeps the store in step with the post files
//! under it:
//!
//! ```text
//! Created ──setup()──▶ Running ──uninstall()──▶ Uninstalled
//!                         │
//!                         └─ every poll: clean() then update()
//! ```
//!
//! A newly discovered file is only tracked on the poll that finds it; its
//! first parse happens on the next poll.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::NaiveDate;
use globset::GlobSet;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::extract::{extract_post, DATE_FORMAT};
use crate::registry::RepoContext;
use crate::render::Renderer;
use crate::store::PostStore;
use crate::traits::{Keyer, Post, Repository, Updater};

/// Kind name the local repository registers under.
pub const KIND: &str = "local";

// ═══════════════════════════════════════════════════════════════════════
// LocalRepo
// ═══════════════════════════════════════════════════════════════════════

pub struct LocalRepo {
    root: PathBuf,
    ctx: RepoContext,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl LocalRepo {
    pub fn new(root: impl AsRef<Path>, ctx: &RepoContext) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ctx: ctx.clone(),
            cancel: CancellationToken::new(),
            worker: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

#[async_trait]
impl Repository for LocalRepo {
    /// Checks that the root is a directory and starts the poll loop.
    async fn setup(&mut self) -> Result<()> {
        check_root(&self.root).await?;
        if self.worker.is_some() {
            return Ok(());
        }

        let tracker = Tracker::new(&self.root, &self.ctx);
        let worker = tokio::spawn(tracker.watch(self.ctx.poll_interval, self.cancel.clone()));
        self.worker = Some(worker);
        Ok(())
    }

    /// Stops the poll loop after its current pass and waits for it.
    async fn uninstall(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(root = %self.root.display(), error = %e, "poll loop ended abnormally");
            }
        }
    }
}

async fn check_root(root: &Path) -> Result<()> {
    let setup_err = |reason: String| Error::RepoSetup {
        root: root.display().to_string(),
        reason,
    };
    let meta = tokio::fs::metadata(root)
        .await
        .map_err(|e| setup_err(e.to_string()))?;
    if !meta.is_dir() {
        return Err(setup_err("root is not a directory".to_string()));
    }
    Ok(())
}

/// Tracks and parses every post under `root` in one go, without starting a
/// poll loop. Returns the number of files tracked.
pub async fn sync_once(root: &Path, ctx: &RepoContext) -> Result<usize> {
    check_root(root).await?;
    let mut tracker = Tracker::new(root, ctx);
    // First pass discovers, second pass parses.
    tracker.update().await;
    tracker.update().await;
    Ok(tracker.posts.len())
}

// ═══════════════════════════════════════════════════════════════════════
// Tracker
// ═══════════════════════════════════════════════════════════════════════

struct Tracked {
    post: LocalPost,
    /// Last update error logged for this file, so a broken file is reported
    /// once rather than on every poll.
    last_error: Option<String>,
}

/// Per-repository map of tracked files, owned by the poll loop.
pub(crate) struct Tracker {
    root: PathBuf,
    include: GlobSet,
    store: PostStore,
    renderer: Arc<dyn Renderer>,
    posts: HashMap<PathBuf, Tracked>,
}

impl Tracker {
    pub(crate) fn new(root: &Path, ctx: &RepoContext) -> Self {
        Self {
            root: root.to_path_buf(),
            include: ctx.include.clone(),
            store: ctx.store.clone(),
            renderer: Arc::clone(&ctx.renderer),
            posts: HashMap::new(),
        }
    }

    async fn watch(mut self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // A pass can be parked on store readers; cancellation abandons it.
            let pass = async {
                self.clean().await;
                self.update().await;
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = pass => {}
            }
        }
        debug!(root = %self.root.display(), tracked = self.posts.len(), "poll loop stopped");
    }

    /// Drops tracked files that no longer exist, removing their posts from
    /// the store.
    pub(crate) async fn clean(&mut self) {
        let gone: Vec<PathBuf> = self
            .posts
            .keys()
            .filter(|rel| is_missing(&self.root.join(rel)))
            .cloned()
            .collect();

        for rel in gone {
            let Some(tracked) = self.posts.remove(&rel) else {
                continue;
            };
            if tracked.post.has_parsed() {
                if let Err(e) = self.release_key(tracked.post.key()).await {
                    warn!(path = %rel.display(), error = %e, "failed to remove local post");
                    self.posts.insert(rel, tracked);
                    continue;
                }
                info!(path = %rel.display(), "removed local post");
            }
        }
    }

    /// Gives up a key no longer held by the file that last stored it.
    ///
    /// Files with identical bytes share a key, so when another tracked post
    /// still has it that post is stored again instead.
    async fn release_key(&self, key: String) -> Result<()> {
        let survivor = self
            .posts
            .values()
            .find(|t| t.post.has_parsed() && t.post.key() == key)
            .map(|t| t.post.clone());

        match survivor {
            Some(post) => {
                debug!(path = %post.path().display(), "key still shared, storing survivor");
                let doc: Arc<dyn Post> = Arc::new(post);
                self.store.add([doc]).await
            }
            None => self.store.remove([key]).await,
        }
    }

    /// Tracks new matching files and refreshes the tracked ones.
    pub(crate) async fn update(&mut self) {
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "error walking local repository");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if self.include.is_match(rel) {
                found.push(rel.to_path_buf());
            }
        }

        let mut stale = Vec::new();
        for rel in found {
            match self.posts.get_mut(&rel) {
                None => {
                    debug!(path = %rel.display(), "tracking new file");
                    let post = LocalPost::new(
                        self.root.join(&rel),
                        self.store.clone(),
                        Arc::clone(&self.renderer),
                    );
                    self.posts.insert(
                        rel,
                        Tracked {
                            post,
                            last_error: None,
                        },
                    );
                }
                Some(tracked) => {
                    let before = tracked.post.has_parsed().then(|| tracked.post.key());
                    match tracked.post.update().await {
                        Ok(()) => {
                            tracked.last_error = None;
                            // The content hash is the key, so an edit moves
                            // the post to a new key.
                            if let Some(old) = before.filter(|k| *k != tracked.post.key()) {
                                stale.push((rel, old));
                            }
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if tracked.last_error.as_deref() != Some(msg.as_str()) {
                                warn!(path = %rel.display(), error = %msg, "local post not updated");
                                tracked.last_error = Some(msg);
                            }
                        }
                    }
                }
            }
        }

        for (rel, key) in stale {
            if let Err(e) = self.release_key(key).await {
                warn!(path = %rel.display(), error = %e, "failed to drop stale post key");
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .posts
            .keys()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        paths.sort();
        paths
    }
}

fn is_missing(path: &Path) -> bool {
    matches!(std::fs::metadata(path), Err(e) if e.kind() == std::io::ErrorKind::NotFound)
}

// ═══════════════════════════════════════════════════════════════════════
// LocalPost
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct PostFields {
    key: String,
    title: String,
    date: Option<NaiveDate>,
    content: String,
    last_update: Option<SystemTime>,
}

struct Shared {
    path: PathBuf,
    fields: RwLock<PostFields>,
    store: PostStore,
    renderer: Arc<dyn Renderer>,
}

/// One post file. Clones share the same fields.
///
/// Reads go through a read lock, so a post handed out by the store can be
/// read while its file is being re-parsed.
#[derive(Clone)]
pub struct LocalPost {
    shared: Arc<Shared>,
}

impl LocalPost {
    pub fn new(path: impl Into<PathBuf>, store: PostStore, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                fields: RwLock::new(PostFields::default()),
                store,
                renderer,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Modification time of the file at its last successful parse.
    pub fn last_update(&self) -> Option<SystemTime> {
        self.read().last_update
    }

    pub fn has_parsed(&self) -> bool {
        self.read().last_update.is_some()
    }

    /// Publish date as `YYYY-MM-DD`, empty until parsed.
    pub fn date_string(&self) -> String {
        self.read()
            .date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, PostFields> {
        self.shared
            .fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PostFields> {
        self.shared
            .fields
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LocalPost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPost")
            .field("path", &self.shared.path)
            .field("fields", &*self.read())
            .finish()
    }
}

impl Keyer for LocalPost {
    fn key(&self) -> String {
        self.read().key.clone()
    }
}

impl Post for LocalPost {
    fn title(&self) -> String {
        self.read().title.clone()
    }

    fn date(&self) -> Option<NaiveDate> {
        self.read().date
    }

    fn content(&self) -> String {
        self.read().content.clone()
    }
}

#[async_trait]
impl Updater for LocalPost {
    /// Re-parses the file if it changed since the last successful parse and
    /// pushes the result into the store.
    ///
    /// On error every previously parsed field is kept, so the store keeps
    /// serving the last good version.
    async fn update(&self) -> Result<()> {
        let path = self.path();
        let modified = tokio::fs::metadata(path).await?.modified()?;
        let last_update = self.read().last_update;
        if last_update.is_some_and(|last| modified <= last) {
            return Ok(());
        }

        let raw = tokio::fs::read(path).await?;
        let parsed = extract_post(path, &raw, self.shared.renderer.as_ref())?;

        {
            let mut fields = self.write();
            fields.key = parsed.key.clone();
            fields.title = parsed.title;
            fields.date = Some(parsed.date);
            fields.content = parsed.content;
            fields.last_update = Some(modified);
        }

        let doc: Arc<dyn Post> = Arc::new(self.clone());
        if let Err(e) = self.shared.store.add([doc]).await {
            warn!(path = %path.display(), error = %e, "failed to store local post");
        }

        info!(
            path = %path.display(),
            key = %parsed.key,
            date = %parsed.date,
            "updated local post"
        );
        Ok(())
    }
}
