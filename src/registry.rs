//! Repository kinds and the constructors that build them.
//!
//! A kind (e.g. `"local"`) maps to a constructor taking the descriptor's
//! root and the shared [`RepoContext`]. Registering a kind again replaces
//! the previous constructor.
//!
//! ```rust
//! use blog_store::registry::RepoRegistry;
//!
//! let mut registry = RepoRegistry::with_builtins();
//! assert!(registry.contains("local"));
//! registry.unregister_repo_type("local");
//! assert!(registry.is_empty());
//! // registry.register_repo_type("git", |root, ctx| Box::new(GitRepo::new(root, ctx)));
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use globset::GlobSet;

use crate::config::SyncConfig;
use crate::models::RepoDescriptor;
use crate::render::{MarkdownRenderer, Renderer};
use crate::repo_local::{self, LocalRepo};
use crate::store::PostStore;
use crate::traits::Repository;

/// Builds a repository for one root.
pub type RepoConstructor = Arc<dyn Fn(&str, &RepoContext) -> Box<dyn Repository> + Send + Sync>;

/// What every repository gets at construction time.
#[derive(Clone)]
pub struct RepoContext {
    /// Store the repository pushes its posts into.
    pub store: PostStore,
    pub poll_interval: Duration,
    /// Files a repository tracks, matched against root-relative paths.
    pub include: GlobSet,
    pub renderer: Arc<dyn Renderer>,
}

impl RepoContext {
    pub fn from_sync(store: PostStore, sync: &SyncConfig) -> Result<Self, globset::Error> {
        Ok(Self {
            store,
            poll_interval: sync.poll_interval(),
            include: sync.include_set()?,
            renderer: Arc::new(MarkdownRenderer),
        })
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

/// Kind name → constructor.
pub struct RepoRegistry {
    kinds: HashMap<String, RepoConstructor>,
}

impl RepoRegistry {
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// A registry with the built-in `"local"` kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_repo_type(repo_local::KIND, |root, ctx| {
            Box::new(LocalRepo::new(root, ctx))
        });
        registry
    }

    /// Registers `kind`. The last registration for a kind wins.
    pub fn register_repo_type<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&str, &RepoContext) -> Box<dyn Repository> + Send + Sync + 'static,
    {
        self.kinds.insert(kind.into(), Arc::new(constructor));
    }

    /// Returns `true` if the kind was registered.
    pub fn unregister_repo_type(&mut self, kind: &str) -> bool {
        self.kinds.remove(kind).is_some()
    }

    /// Builds the repository for `descriptor`, or `None` for an unknown kind.
    pub fn build(&self, descriptor: &RepoDescriptor, ctx: &RepoContext) -> Option<Box<dyn Repository>> {
        self.kinds
            .get(&descriptor.kind)
            .map(|constructor| constructor(&descriptor.root, ctx))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }
}

impl Default for RepoRegistry {
    fn default() -> Self {
        Self::new()
    }
}
