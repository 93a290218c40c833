//! Result types produced by a sync run.

use crate::error::ImageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from a reference (exactly as extracted) to its remote URL.
///
/// Entries exist only for confirmed uploads; a reference missing from the
/// map is never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadResult(BTreeMap<String, String>);

impl UploadResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed upload. A later upload of the same reference wins.
    pub fn insert(&mut self, reference: impl Into<String>, url: impl Into<String>) {
        self.0.insert(reference.into(), url.into());
    }

    pub fn get(&self, reference: &str) -> Option<&str> {
        self.0.get(reference).map(String::as_str)
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.0.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(reference, url)` pairs in reference order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UploadResult {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// What happened to one extracted reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageStatus {
    /// Uploaded; occurrences of the reference now point at `url`.
    Uploaded { url: String },
    /// Resolved but reading or uploading failed.
    Failed { error: ImageError },
    /// No matching file in the vault; skipped silently.
    Unresolved,
}

/// Per-reference report entry, in extraction order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOutcome {
    /// Reference exactly as it appears in the note.
    pub reference: String,
    /// Vault path of the file that was uploaded, when resolution succeeded.
    pub vault_path: Option<String>,
    #[serde(flatten)]
    pub status: ImageStatus,
}

impl ImageOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self.status, ImageStatus::Uploaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ImageStatus::Failed { .. })
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// At least one image was uploaded and the links were rewritten.
    Rewritten,
    /// Nothing was uploaded (no references, none resolved, or all failed);
    /// the note was left untouched.
    NothingUploaded,
}

/// Counters and timings for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// References extracted from the note, duplicates included.
    pub references_found: usize,
    /// References that mapped to a vault file.
    pub resolved: usize,
    /// References skipped because no file matched.
    pub unresolved: usize,
    /// Confirmed uploads.
    pub uploaded: usize,
    /// Resolved references whose read or upload failed.
    pub failed: usize,
    /// Wall-clock time of the upload phase.
    pub upload_duration_ms: u64,
    /// Wall-clock time of the whole run.
    pub total_duration_ms: u64,
}

/// The full result of [`crate::sync::sync_document`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutput {
    /// Vault path of the processed note.
    pub note: String,
    pub status: SyncStatus,
    /// The note text after rewriting (equal to the input when nothing was uploaded).
    pub markdown: String,
    /// Whether `markdown` was written back to the vault.
    pub written: bool,
    /// Remote URL per uploaded reference.
    pub uploads: UploadResult,
    /// One entry per extracted reference, in extraction order.
    pub images: Vec<ImageOutcome>,
    pub stats: SyncStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_result_later_insert_wins() {
        let mut map = UploadResult::new();
        map.insert("a.png", "https://cdn/1.png");
        map.insert("a.png", "https://cdn/2.png");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a.png"), Some("https://cdn/2.png"));
        assert!(!map.contains("b.png"));
    }

    #[test]
    fn upload_result_serialises_as_plain_object() {
        let map: UploadResult = [("foo.png", "https://cdn/foo.png")].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"foo.png":"https://cdn/foo.png"}"#);
    }

    #[test]
    fn outcome_json_is_flat() {
        let outcome = ImageOutcome {
            reference: "foo.png".into(),
            vault_path: Some("assets/foo.png".into()),
            status: ImageStatus::Uploaded {
                url: "https://cdn/foo.png".into(),
            },
        };
        let v: serde_json::Value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["status"], "uploaded");
        assert_eq!(v["url"], "https://cdn/foo.png");
        assert!(outcome.is_uploaded());
        assert!(!outcome.is_failed());
    }
}
