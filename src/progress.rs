//! Progress-callback trait for per-image sync events.
//!
//! Inject an [`Arc<dyn SyncProgressCallback>`] via
//! [`crate::config::UploadConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its phases and uploads each image.
//! The CLI renders them as a progress bar; a host application would turn
//! them into transient notices.
//!
//! # Example
//!
//! ```rust
//! use md2cms::{SyncProgressCallback, UploadConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     uploaded: AtomicUsize,
//! }
//!
//! impl SyncProgressCallback for CountingCallback {
//!     fn on_image_uploaded(&self, index: usize, total: usize, reference: &str, url: &str) {
//!         self.uploaded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}/{total} {reference} → {url}");
//!     }
//! }
//!
//! let config = UploadConfig::builder()
//!     .base_url("https://cms.example")
//!     .api_token("secret")
//!     .progress_callback(Arc::new(CountingCallback { uploaded: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline phase boundaries reported through [`SyncProgressCallback::on_phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Scanning the note text for image references.
    Extracting,
    /// Mapping references to files in the vault.
    Resolving { references: usize },
    /// Uploading resolved images one at a time.
    Uploading { images: usize },
    /// Substituting remote URLs into the note.
    Rewriting { mapped: usize },
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Extracting => write!(f, "Processing Markdown content…"),
            SyncPhase::Resolving { references } => {
                write!(f, "Resolving {references} image reference(s)…")
            }
            SyncPhase::Uploading { images } => write!(f, "Uploading {images} image(s)…"),
            SyncPhase::Rewriting { mapped } => write!(f, "Replacing {mapped} image path(s)…"),
        }
    }
}

/// Called by the sync pipeline at each phase boundary and for each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Images are uploaded sequentially, so per-image
/// events never overlap.
pub trait SyncProgressCallback: Send + Sync {
    /// Called once, before the note is read.
    fn on_sync_start(&self, note: &str) {
        let _ = note;
    }

    /// Called when the pipeline enters a new phase.
    fn on_phase(&self, phase: SyncPhase) {
        let _ = phase;
    }

    /// Called just before an image is uploaded.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the upload batch
    /// * `total`: size of the upload batch
    /// * `reference`: the reference as it appears in the note
    fn on_image_start(&self, index: usize, total: usize, reference: &str) {
        let _ = (index, total, reference);
    }

    /// Called when the server confirmed an upload.
    fn on_image_uploaded(&self, index: usize, total: usize, reference: &str, url: &str) {
        let _ = (index, total, reference, url);
    }

    /// Called when an image failed to read or upload. The batch continues.
    fn on_image_error(&self, index: usize, total: usize, reference: &str, error: &str) {
        let _ = (index, total, reference, error);
    }

    /// Called instead of [`on_sync_complete`](Self::on_sync_complete) when no
    /// image was uploaded and the note is left untouched.
    ///
    /// `found` is the number of references extracted from the note.
    fn on_nothing_uploaded(&self, found: usize) {
        let _ = found;
    }

    /// Called once after the note has been rewritten.
    fn on_sync_complete(&self, uploaded: usize, attempted: usize) {
        let _ = (uploaded, attempted);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl SyncProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::UploadConfig`].
pub type ProgressCallback = Arc<dyn SyncProgressCallback>;
