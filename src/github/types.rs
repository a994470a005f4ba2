// GitHub API response types.
// Defines structs for deserializing GitHub REST API responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// GitHub user or organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// GitHub repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub owner: Owner,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub watchers_count: u64,
}

/// Repository search results.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<Repository>,
}

/// A commit in the repository history. `author` is the linked GitHub account,
/// absent when the commit email maps to no account.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    #[serde(default)]
    pub author: Option<Owner>,
}

/// Entry in a repository content listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Well-known repository files surfaced in a project view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Readme,
    Contributing,
    Changelog,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Readme, FileKind::Contributing, FileKind::Changelog];

    /// File name prefix identifying this kind, e.g. `README` for `README.md`.
    pub fn prefix(&self) -> &'static str {
        match self {
            FileKind::Readme => "README",
            FileKind::Contributing => "CONTRIBUTING",
            FileKind::Changelog => "CHANGELOG",
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(self.prefix())
    }
}

/// Links to well-known files. Kinds without a match are absent.
pub type FileInventory = BTreeMap<FileKind, String>;
