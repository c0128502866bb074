//! Repository snapshots

use serde::{Deserialize, Serialize};
use std::fmt;

/// The checked-out branch as reported by the repository client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,

    /// Full commit hash of the branch head
    pub commit: String,

    /// Subject line of the head commit
    pub label: String,

    pub is_current: bool,
}

impl Branch {
    /// First 7 characters of the commit hash
    pub fn short_commit(&self) -> &str {
        let end = self
            .commit
            .char_indices()
            .nth(7)
            .map_or(self.commit.len(), |(idx, _)| idx);
        &self.commit[..end]
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.short_commit(), self.label)
    }
}

/// Divergence between the local branch and its remote counterpart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoStatus {
    pub ahead: u32,
    pub behind: u32,
}
