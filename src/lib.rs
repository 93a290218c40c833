//! # md2cms
//!
//! Upload the images a Markdown note embeds to a content-management system
//! and point the note's links at the uploaded copies.
//!
//! Notes live in a *vault*: a folder of Markdown files and attachments, as
//! kept by Obsidian and similar editors. Images are referenced either as
//! `![alt](path/to/image.png)` or as `![[image.png|alias]]`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! note.md
//!  │
//!  ├─ 1. Extract  regex scan for ![alt](target) and ![[target|alias]]
//!  ├─ 2. Resolve  vault path, note-relative path, or bare file name
//!  ├─ 3. Upload   POST {base_url}/api/upload, one image at a time
//!  ├─ 4. Rewrite  every occurrence of each uploaded reference → remote URL
//!  └─ 5. Write    note written back once, only if something was uploaded
//! ```
//!
//! A failed image never aborts the run: it keeps its original link and is
//! reported in [`SyncOutput::images`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2cms::{sync_document, UploadConfig, VaultStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vault = VaultStore::open("/home/me/notes")?;
//!     let config = UploadConfig::builder()
//!         .base_url("https://cms.example.com")
//!         .api_token(std::env::var("MD2CMS_TOKEN")?)
//!         .build()?;
//!     let output = sync_document(&vault, "posts/trip.md", &config).await?;
//!     eprintln!("{} of {} images uploaded", output.stats.uploaded, output.stats.resolved);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2cms` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod sync;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionPolicy, ResolutionPolicy, Settings, UploadConfig, UploadConfigBuilder};
pub use error::{ImageError, Md2CmsError};
pub use output::{ImageOutcome, ImageStatus, SyncOutput, SyncStats, SyncStatus, UploadResult};
pub use pipeline::extract::{extract_references, ImageReference, ReferenceSyntax};
pub use pipeline::resolve::{resolve_reference, ResolvedImage};
pub use pipeline::rewrite::rewrite_links;
pub use pipeline::upload::UploadClient;
pub use progress::{NoopProgressCallback, ProgressCallback, SyncPhase, SyncProgressCallback};
pub use store::{FileStore, MemoryStore, VaultStore};
pub use sync::{sync_document, sync_text};
