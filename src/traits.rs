//! Capability traits shared by the store and the repository layer.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              RepoRegistry                │
//! │  ┌─────────┐ ┌──────────────────────┐    │
//! │  │  local  │ │ custom (Rust)        │    │
//! │  └─────────┘ └──────────────────────┘    │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!     Repository::setup() → poll loop → Updater::update()
//!                ▼
//!         Store::add / Store::remove
//! ```
//!
//! A new content source only needs a [`Repository`] implementation and a
//! constructor registered under its kind; the store and the refresh loop
//! never change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════
// Keyer
// ═══════════════════════════════════════════════════════════════════════

/// Produces the unique key a value is stored under.
///
/// An empty key means the value carries no key; the store rejects it with
/// [`Error::NotAKeyer`](crate::error::Error::NotAKeyer).
pub trait Keyer {
    fn key(&self) -> String;
}

impl Keyer for str {
    fn key(&self) -> String {
        self.to_string()
    }
}

impl Keyer for String {
    fn key(&self) -> String {
        self.clone()
    }
}

impl<T: Keyer + ?Sized> Keyer for &T {
    fn key(&self) -> String {
        (**self).key()
    }
}

impl<T: Keyer + ?Sized> Keyer for Arc<T> {
    fn key(&self) -> String {
        (**self).key()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Post
// ═══════════════════════════════════════════════════════════════════════

/// A published post, as seen by the presentation layer.
///
/// Implementations hand out owned snapshots; a post may be re-parsed
/// concurrently with these reads.
pub trait Post: Keyer + Send + Sync {
    fn title(&self) -> String;

    /// Publish date from the post header. `None` until the post has parsed.
    fn date(&self) -> Option<NaiveDate>;

    /// Rendered HTML body.
    fn content(&self) -> String;
}

// ═══════════════════════════════════════════════════════════════════════
// Repository / Updater
// ═══════════════════════════════════════════════════════════════════════

/// An external content source with its own synchronization loop.
///
/// # Lifecycle
///
/// 1. Built by the constructor registered for its kind in
///    [`RepoRegistry`](crate::registry::RepoRegistry).
/// 2. [`setup`](Repository::setup) validates the source and starts syncing.
///    A repository whose setup fails is never activated.
/// 3. [`uninstall`](Repository::uninstall) stops syncing. Called once, when
///    the repository disappears from configuration or on shutdown.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn setup(&mut self) -> Result<()>;

    async fn uninstall(&mut self);
}

/// Refreshes one tracked item from its source.
#[async_trait]
pub trait Updater: Send + Sync {
    async fn update(&self) -> Result<()>;
}
