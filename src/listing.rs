//! Directory entries as reported by the board's listing program.
//!
//! The board prints a JSON array of records; field names follow the
//! program's capitalised keys:
//!
//! ```json
//! [{"Path": "/lib", "Name": "main.py", "Size": 120, "Type": "file",
//!   "Hash": "9f86…", "Fullname": "/lib/main.py"}]
//! ```
//!
//! `null` means the root itself could not be listed.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of a remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Directory,
    /// `os.stat` failed on the entry; see [`DirEntry::os_error`].
    #[serde(rename = "OSError")]
    Error,
}

/// One remote entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Directory containing the entry.
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Name")]
    pub name: String,
    /// Byte size; 0 for directories and error entries.
    #[serde(rename = "Size", default)]
    pub size: u64,
    #[serde(rename = "Type")]
    pub kind: EntryKind,
    /// Hex SHA-256 of the content (files only, when requested).
    #[serde(rename = "Hash", default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// errno reported by `os.stat` for error entries.
    #[serde(rename = "OSError", default, skip_serializing_if = "Option::is_none")]
    pub os_error: Option<i64>,
    #[serde(rename = "Fullname")]
    pub full_name: String,
}

impl DirEntry {
    /// Synthetic entry for the filesystem root, which never appears in
    /// a listing of its own parent.
    pub fn root() -> Self {
        Self {
            path: "/".into(),
            name: String::new(),
            size: 0,
            kind: EntryKind::Directory,
            hash: None,
            os_error: None,
            full_name: "/".into(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Compare the board-side hash with the SHA-256 of `content`.
    /// `None` when the listing carried no hash.
    pub fn hash_matches(&self, content: &[u8]) -> Option<bool> {
        let remote = hex::decode(self.hash.as_deref()?).ok()?;
        Some(remote.as_slice() == sha256(content).as_slice())
    }
}

/// Raw SHA-256 digest of `content`.
pub fn sha256(content: &[u8]) -> [u8; 32] {
    hmac_sha256::Hash::hash(content)
}

/// Parse the listing program's output. `Ok(None)` when the board
/// reported that the root could not be listed.
pub fn parse_listing(raw: &str) -> Result<Option<Vec<DirEntry>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::Protocol("empty listing output".into()));
    }
    Ok(serde_json::from_str(raw)?)
}

/// Normalise a remote path: single slashes, no trailing slash (except
/// for the root), `.` segments removed.
pub fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    let joined = parts.join("/");
    if path.starts_with('/') || joined.is_empty() {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Split a normalised path into (parent, name).
pub fn split_parent(path: &str) -> (String, String) {
    let path = normalize(path);
    match path.rfind('/') {
        Some(0) => ("/".into(), path[1..].to_string()),
        Some(i) => (path[..i].to_string(), path[i + 1..].to_string()),
        None => (".".into(), path),
    }
}

// ── Tests ────────────────────────────────────────────────────
