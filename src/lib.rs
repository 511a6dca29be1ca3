//! # Blog Store
//!
//! An in-memory post store kept consistent with pluggable content
//! repositories, serving concurrent readers without corrupting the results
//! they hold.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Config (TOML)│──▶│ Refresh loop │──▶│ Repositories │
//! │  [[repo]]    │   │ RepoManager  │   │ local / ...  │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │ add / remove
//!                                              ▼
//!                    readers ◀── get ──  ┌──────────────┐
//!                    (lease until        │ Store actor  │
//!                     release)           └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! blog --config ./config/blog.toml serve     # keep the store in sync
//! blog --config ./config/blog.toml list      # one-shot sync, print posts
//! blog check posts/hello.md                  # parse a single post
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`store`] | Single-writer store actor |
//! | [`request`] | Store messages, reader leases, results |
//! | [`traits`] | `Keyer`, `Post`, `Repository`, `Updater` |
//! | [`registry`] | Repository kinds and constructors |
//! | [`sources`] | Active repositories and the refresh loop |
//! | [`repo_local`] | Local filesystem repository |
//! | [`extract`] | Post header/body parsing |
//! | [`render`] | Markdown rendering |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Shared data types |
//! | [`error`] | Error taxonomy |

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod registry;
pub mod render;
pub mod repo_local;
pub mod request;
pub mod sources;
pub mod store;
pub mod traits;

pub use error::{Error, Result};
pub use request::StoreResult;
pub use store::{PostStore, Store};
pub use traits::{Keyer, Post, Repository, Updater};
