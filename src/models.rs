//! Data types shared by configuration and the repository layer.

use serde::Deserialize;

/// Identifies one content source: a repository kind plus its root.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct RepoDescriptor {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub root: String,
}

impl RepoDescriptor {
    pub fn new(kind: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            root: root.into(),
        }
    }

    /// Identity of the running instance: `"{kind}-{root}"`.
    ///
    /// A descriptor whose kind or root changed is a different repository.
    pub fn id(&self) -> String {
        format!("{}-{}", self.kind, self.root)
    }

    /// Entries missing either field never reach the refresh loop.
    pub fn is_complete(&self) -> bool {
        !self.kind.is_empty() && !self.root.is_empty()
    }
}
