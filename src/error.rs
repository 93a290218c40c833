//! Error types for the md2cms library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2CmsError`] (**fatal**): the run cannot proceed at all (missing
//!   URL or token, note not found, settings file unreadable). Returned as
//!   `Err(Md2CmsError)` from [`crate::sync::sync_document`].
//!
//! * [`ImageError`] (**non-fatal**): a single image could not be resolved or
//!   uploaded, but every other image is fine. Stored inside
//!   [`crate::output::ImageOutcome`] so a run that uploads 3 of 5 images still
//!   rewrites those 3 links.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2cms library.
///
/// Per-image failures use [`ImageError`] and are reported through
/// [`crate::output::ImageOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Md2CmsError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Remote base URL or API token is empty.
    #[error("Missing {field}.\nConfigure it with: md2cms config {hint}")]
    MissingConfig { field: &'static str, hint: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Vault errors ──────────────────────────────────────────────────────
    /// The vault root directory does not exist.
    #[error("Vault directory not found: '{path}'")]
    VaultNotFound { path: PathBuf },

    /// The note to process does not exist in the vault.
    #[error("Note not found in vault: '{path}'")]
    NoteNotFound { path: String },

    /// The note exists but could not be read as UTF-8 text.
    #[error("Failed to read note '{path}': {source}")]
    NoteReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The rewritten note could not be written back.
    #[error("Failed to write note '{path}': {source}")]
    NoteWriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── Settings errors ───────────────────────────────────────────────────
    #[error("Failed to read settings file '{path}': {source}")]
    SettingsReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file '{path}' is not valid TOML: {detail}")]
    SettingsParseFailed { path: PathBuf, detail: String },

    #[error("Failed to write settings file '{path}': {detail}")]
    SettingsWriteFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image reference.
///
/// The run continues with the next reference; the failing reference is left
/// untouched in the note.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// No file in the vault matches the reference.
    #[error("'{reference}': no matching file in the vault")]
    NotFound { reference: String },

    /// The file exists but reading it failed.
    #[error("'{reference}': failed to read '{path}': {detail}")]
    ReadFailed {
        reference: String,
        path: String,
        detail: String,
    },

    /// DNS failure, refused connection, timeout, …
    #[error("'{reference}': upload request failed: {detail}")]
    Transport { reference: String, detail: String },

    /// The server answered with a non-2xx status.
    #[error("'{reference}': server returned HTTP {status}: {body}")]
    HttpStatus {
        reference: String,
        status: u16,
        body: String,
    },

    /// 2xx, but the body is not a JSON array whose first element has a `url`.
    #[error("'{reference}': unexpected upload response: {detail}")]
    MalformedResponse { reference: String, detail: String },
}

impl ImageError {
    /// The reference string the error is about.
    pub fn reference(&self) -> &str {
        match self {
            ImageError::NotFound { reference }
            | ImageError::ReadFailed { reference, .. }
            | ImageError::Transport { reference, .. }
            | ImageError::HttpStatus { reference, .. }
            | ImageError::MalformedResponse { reference, .. } => reference,
        }
    }

    /// Resolution misses are skipped silently; everything else is surfaced.
    pub fn is_silent(&self) -> bool {
        matches!(self, ImageError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_display_has_hint() {
        let e = Md2CmsError::MissingConfig {
            field: "API token",
            hint: "set-token <TOKEN>",
        };
        let msg = e.to_string();
        assert!(msg.contains("API token"), "got: {msg}");
        assert!(msg.contains("md2cms config set-token"), "got: {msg}");
    }

    #[test]
    fn http_status_display() {
        let e = ImageError::HttpStatus {
            reference: "bar.jpg".into(),
            status: 500,
            body: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("bar.jpg"));
        assert!(msg.contains("500"));
    }

    #[test]
    fn reference_accessor_covers_all_variants() {
        let errors = [
            ImageError::NotFound { reference: "a".into() },
            ImageError::ReadFailed {
                reference: "a".into(),
                path: "p".into(),
                detail: "d".into(),
            },
            ImageError::Transport {
                reference: "a".into(),
                detail: "d".into(),
            },
            ImageError::MalformedResponse {
                reference: "a".into(),
                detail: "d".into(),
            },
        ];
        for e in &errors {
            assert_eq!(e.reference(), "a");
        }
    }

    #[test]
    fn only_not_found_is_silent() {
        assert!(ImageError::NotFound { reference: "x".into() }.is_silent());
        assert!(!ImageError::Transport {
            reference: "x".into(),
            detail: "refused".into()
        }
        .is_silent());
    }
}
