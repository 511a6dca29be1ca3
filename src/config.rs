use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::RepoDescriptor;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    /// Content sources, in file order.
    #[serde(default)]
    pub repo: Vec<RepoDescriptor>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            include_globs: default_include_globs(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    10
}
fn default_poll_interval_secs() -> u64 {
    1
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

impl SyncConfig {
    /// How often the repository list is reloaded.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// How often each repository polls its source.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn include_set(&self) -> std::result::Result<GlobSet, globset::Error> {
        build_globset(&self.include_globs)
    }
}

/// Reads, filters and validates the configuration file.
///
/// Repository entries with an empty type or root are dropped. Relative
/// `local` roots are resolved against the directory holding the file.
pub fn load_config(path: &Path) -> Result<Config> {
    let load_err = |reason: String| Error::ConfigLoad {
        path: path.to_path_buf(),
        reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
    let mut config: Config = toml::from_str(&content).map_err(|e| load_err(e.to_string()))?;

    if config.sync.refresh_interval_secs == 0 {
        return Err(load_err("sync.refresh_interval_secs must be > 0".into()));
    }
    if config.sync.poll_interval_secs == 0 {
        return Err(load_err("sync.poll_interval_secs must be > 0".into()));
    }
    if let Err(e) = config.sync.include_set() {
        return Err(load_err(format!("sync.include_globs: {}", e)));
    }

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.repo.retain(RepoDescriptor::is_complete);
    for repo in &mut config.repo {
        if repo.kind == "local" && !Path::new(&repo.root).is_absolute() {
            repo.root = resolve_root(base, &repo.root).to_string_lossy().into_owned();
        }
    }

    Ok(config)
}

fn resolve_root(base: &Path, root: &str) -> PathBuf {
    base.join(root)
}

fn build_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, body: &str) -> PathBuf {
        let path = tmp.path().join("blog.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_repos_in_file_order() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[[repo]]
type = "git"
root = "http://github.com/1/1"

[[repo]]
type = "local"
root = "/tmp/1/1"

[[repo]]
type = "github"
root = "http://github.com/2/2"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(
            config.repo,
            vec![
                RepoDescriptor::new("git", "http://github.com/1/1"),
                RepoDescriptor::new("local", "/tmp/1/1"),
                RepoDescriptor::new("github", "http://github.com/2/2"),
            ]
        );
    }

    #[test]
    fn test_incomplete_entries_dropped() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[[repo]]
type = ""
root = "/a"

[[repo]]
type = "local"

[[repo]]
type = "local"
root = "/b"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.repo, vec![RepoDescriptor::new("local", "/b")]);
    }

    #[test]
    fn test_relative_local_root_resolved() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[[repo]]
type = "local"
root = "posts"

[[repo]]
type = "git"
root = "relative/url"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(
            config.repo[0].root,
            tmp.path().join("posts").to_string_lossy()
        );
        assert_eq!(config.repo[1].root, "relative/url");
    }

    #[test]
    fn test_defaults_without_sync_table() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "");
        let config = load_config(&path).unwrap();
        assert_eq!(config.sync.refresh_interval(), Duration::from_secs(10));
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.sync.include_globs, vec!["**/*.md"]);
        assert!(config.repo.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("invalid/path/to/blog.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigLoad { .. }));
    }

    #[test]
    fn test_unparseable_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[[repo]\ntype = ");
        assert!(matches!(
            load_config(&path).unwrap_err(),
            Error::ConfigLoad { .. }
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[sync]\npoll_interval_secs = 0\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"), "{err}");
    }

    #[test]
    fn test_bad_glob_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[sync]\ninclude_globs = [\"a[\"]\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("include_globs"), "{err}");
    }
}
