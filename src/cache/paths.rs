// Cache path utilities.
// Maps partitions and cache keys onto the on-disk layout used by the file store.

use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use directories::ProjectDirs;

/// Longest encoded key kept verbatim in a file name.
const MAX_ENCODED_LEN: usize = 160;

/// Get the base cache directory (~/.cache/scavenger on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "scavenger").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Directory holding one partition (namespace + segment) of a file store.
pub fn partition_dir(root: &Path, namespace: &str, segment: &str) -> PathBuf {
    let mut dir = root.to_path_buf();
    if !namespace.is_empty() {
        dir.push(sanitize_name(namespace));
    }
    dir.join(sanitize_name(segment))
}

/// Path of the file holding `key` inside a partition directory.
pub fn entry_path(partition: &Path, key: &str) -> PathBuf {
    partition.join(format!("{}.json", file_stem(key)))
}

/// Reversible encoding for short keys, truncated encoding plus hash for long ones.
fn file_stem(key: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());
    if encoded.len() <= MAX_ENCODED_LEN {
        return encoded;
    }

    format!(
        "{}-{:016x}",
        &encoded[..MAX_ENCODED_LEN],
        fnv1a(key.as_bytes())
    )
}

/// 64-bit FNV-1a, stable across builds and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
