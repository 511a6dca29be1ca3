//! # Blog CLI (`blog`)
//!
//! Runs the post store against the repositories listed in the configuration
//! file, or inspects posts without starting the long-running loops.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `blog serve` | Keep the store in sync with every configured repository until Ctrl-C |
//! | `blog list` | Sync local repositories once and print their posts, newest first |
//! | `blog check <file>` | Parse a single post file and print the result |
//!
//! ## Examples
//!
//! ```bash
//! RUST_LOG=blog_store=debug blog --config ./config/blog.toml serve
//! blog --config ./config/blog.toml list --json
//! blog check posts/2024/hello.md
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use blog_store::config::{self, Config, SyncConfig};
use blog_store::extract::extract_post;
use blog_store::registry::{RepoContext, RepoRegistry};
use blog_store::render::MarkdownRenderer;
use blog_store::repo_local;
use blog_store::sources::RepoManager;
use blog_store::store::PostStore;
use blog_store::traits::{Keyer, Post};

#[derive(Parser)]
#[command(
    name = "blog",
    about = "Personal blog post store",
    version
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "./config/blog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the store in sync with the configured repositories.
    ///
    /// The repository list is reloaded from the configuration file every
    /// `sync.refresh_interval_secs`. Stops on Ctrl-C.
    Serve,
    /// Sync every local repository once and list the posts.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Parse one post file.
    Check {
        /// Post file (`title | YYYY-MM-DD` header, markdown body).
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct PostRow {
    key: String,
    title: String,
    date: Option<NaiveDate>,
    content: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve => serve(&cli.config).await,
        Commands::List { json } => list(&cli.config, json).await,
        Commands::Check { file } => check(&file),
    }
}

fn load(path: &Path) -> anyhow::Result<Config> {
    config::load_config(path).with_context(|| format!("loading {}", path.display()))
}

async fn serve(config_path: &Path) -> anyhow::Result<()> {
    // The refresh loop keeps retrying a file that fails to load here.
    let sync = match config::load_config(config_path) {
        Ok(cfg) => cfg.sync,
        Err(e) => {
            warn!(error = %e, "using default sync settings until the config loads");
            SyncConfig::default()
        }
    };
    let ctx = RepoContext::from_sync(PostStore::spawn(), &sync)
        .context("building include globs")?;
    let manager = RepoManager::new(RepoRegistry::with_builtins(), ctx);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(
        config_path.to_path_buf(),
        sync.refresh_interval(),
        cancel.clone(),
    ));
    info!(config = %config_path.display(), "serving");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutting down");
    cancel.cancel();
    handle.await.context("refresh loop panicked")?;
    Ok(())
}

async fn list(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = load(config_path)?;
    let store = PostStore::spawn();
    let ctx = RepoContext::from_sync(store.clone(), &cfg.sync)
        .context("building include globs")?;

    for repo in &cfg.repo {
        if repo.kind != repo_local::KIND {
            eprintln!("Skipping {} (only local repositories are listed)", repo.id());
            continue;
        }
        let tracked = repo_local::sync_once(Path::new(&repo.root), &ctx)
            .await
            .with_context(|| format!("syncing {}", repo.root))?;
        eprintln!("Synced {}: {} files", repo.id(), tracked);
    }

    let mut result = store.get_all().await?;
    result.sort_by_date();
    let rows: Vec<PostRow> = result
        .iter()
        .map(|post| PostRow {
            key: post.key(),
            title: post.title(),
            date: post.date(),
            content: post.content(),
        })
        .collect();
    result.release();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No posts.");
        return Ok(());
    }
    println!("{:<12} {:<14} TITLE", "DATE", "KEY");
    for row in &rows {
        let date = row
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<12} {:<14} {}", date, &row.key[..row.key.len().min(12)], row.title);
    }
    Ok(())
}

fn check(file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let post = extract_post(file, &raw, &MarkdownRenderer)?;

    println!("key:   {}", post.key);
    println!("title: {}", post.title);
    println!("date:  {}", post.date);
    println!();
    print!("{}", post.content);
    Ok(())
}
