//! Orchestration: run the whole pipeline over one note.
//!
//! ```text
//! validate config ─▶ read note ─▶ extract ─▶ resolve ─▶ upload ─▶ rewrite ─▶ write back
//! ```
//!
//! The run is all-or-partial, never transactional: images that fail to upload
//! keep their original links while the rest are rewritten. The note is
//! written at most once, at the very end.

use crate::config::UploadConfig;
use crate::error::Md2CmsError;
use crate::output::{ImageOutcome, ImageStatus, SyncOutput, SyncStats, SyncStatus, UploadResult};
use crate::pipeline::{extract, resolve, rewrite, upload};
use crate::progress::SyncPhase;
use crate::store::{self, FileStore};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Upload the images referenced by `note_path` and rewrite its links.
///
/// # Returns
/// `Ok(SyncOutput)` whenever the run reached its end, including runs where
/// nothing was uploaded (`status == NothingUploaded`, note untouched) and runs
/// where only some images succeeded (check `output.stats.failed`).
///
/// # Errors
/// Only for fatal problems:
/// - missing base URL or token (checked before any I/O)
/// - the note does not exist or cannot be read
/// - the rewritten note cannot be written back
pub async fn sync_document(
    store: &dyn FileStore,
    note_path: &str,
    config: &UploadConfig,
) -> Result<SyncOutput, Md2CmsError> {
    config.validate()?;

    let note = store::normalize_vault_path(note_path).ok_or_else(|| Md2CmsError::NoteNotFound {
        path: note_path.to_string(),
    })?;
    if !store.exists(&note) {
        return Err(Md2CmsError::NoteNotFound { path: note });
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_sync_start(&note);
    }

    let text = store
        .read_text(&note)
        .map_err(|e| Md2CmsError::NoteReadFailed {
            path: note.clone(),
            source: e,
        })?;

    let mut output = run_pipeline(store, &note, &text, config).await?;

    if output.status == SyncStatus::Rewritten && !config.dry_run {
        store
            .write_text(&note, &output.markdown)
            .map_err(|e| Md2CmsError::NoteWriteFailed {
                path: note.clone(),
                source: e,
            })?;
        output.written = true;
        info!("Updated {}", note);
    }

    if output.status == SyncStatus::Rewritten {
        if let Some(ref cb) = config.progress_callback {
            cb.on_sync_complete(output.stats.uploaded, output.stats.resolved);
        }
    }

    Ok(output)
}

/// Run the pipeline over `text` as if it were the content of `note_path`,
/// without reading or writing the note.
///
/// Images are still resolved relative to `note_path` and really uploaded.
pub async fn sync_text(
    store: &dyn FileStore,
    note_path: &str,
    text: &str,
    config: &UploadConfig,
) -> Result<SyncOutput, Md2CmsError> {
    config.validate()?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_sync_start(note_path);
    }
    let output = run_pipeline(store, note_path, text, config).await?;
    if output.status == SyncStatus::Rewritten {
        if let Some(ref cb) = config.progress_callback {
            cb.on_sync_complete(output.stats.uploaded, output.stats.resolved);
        }
    }
    Ok(output)
}

/// Extract → resolve → upload → rewrite. Never writes.
async fn run_pipeline(
    store: &dyn FileStore,
    note: &str,
    text: &str,
    config: &UploadConfig,
) -> Result<SyncOutput, Md2CmsError> {
    let total_start = Instant::now();
    let progress = config.progress_callback.as_ref();
    info!("Processing {}", note);

    // ── Step 1: Extract references ───────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_phase(SyncPhase::Extracting);
    }
    let references = extract::extract_references(text, config.extraction);
    debug!("Found {} image reference(s) in {}", references.len(), note);

    // ── Step 2: Resolve to vault files ───────────────────────────────────
    if let Some(cb) = progress {
        cb.on_phase(SyncPhase::Resolving {
            references: references.len(),
        });
    }
    let resolved = resolve::resolve_all(store, &references, note, config.resolution);

    let total_refs = references.len();
    let mut images = Vec::new();
    // Resolved but unreadable: reported at the head of the upload batch.
    let mut unreadable: Vec<(String, String)> = Vec::new();
    // Extraction-order slot per reference; resolution failures are final here.
    let mut slots: Vec<Slot> = Vec::with_capacity(total_refs);
    for (reference, result) in resolved {
        match result {
            Ok(image) => {
                slots.push(Slot::Pending);
                images.push(image);
            }
            Err(e) if e.is_silent() => {
                debug!("Skipping unresolved reference '{}'", reference.target);
                slots.push(Slot::Done(ImageOutcome {
                    reference: reference.target,
                    vault_path: None,
                    status: ImageStatus::Unresolved,
                }));
            }
            Err(e) => {
                warn!("{}", e);
                unreadable.push((reference.target.clone(), e.to_string()));
                slots.push(Slot::Done(ImageOutcome {
                    reference: reference.target,
                    vault_path: None,
                    status: ImageStatus::Failed { error: e },
                }));
            }
        }
    }

    // ── Step 3: Upload sequentially ──────────────────────────────────────
    let batch_size = unreadable.len() + images.len();
    if batch_size > 0 {
        if let Some(cb) = progress {
            cb.on_phase(SyncPhase::Uploading { images: batch_size });
            for (i, (reference, error)) in unreadable.iter().enumerate() {
                cb.on_image_error(i + 1, batch_size, reference, error);
            }
        }
    }
    let upload_start = Instant::now();
    let batch = if images.is_empty() {
        upload::UploadBatch::default()
    } else {
        let client = upload::UploadClient::new(config)?;
        upload::upload_all(&client, images, unreadable.len(), progress).await
    };
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;

    let outcomes = merge_outcomes(slots, batch.attempts);

    let unresolved = outcomes
        .iter()
        .filter(|o| o.status == ImageStatus::Unresolved)
        .count();
    let mut stats = SyncStats {
        references_found: total_refs,
        resolved: total_refs - unresolved,
        unresolved,
        uploaded: outcomes.iter().filter(|o| o.is_uploaded()).count(),
        failed: outcomes.iter().filter(|o| o.is_failed()).count(),
        upload_duration_ms,
        total_duration_ms: 0,
    };

    // ── Step 4: Nothing uploaded → leave the note alone ──────────────────
    if batch.uploads.is_empty() {
        info!("No images found or uploaded for {}", note);
        if let Some(cb) = progress {
            cb.on_nothing_uploaded(total_refs);
        }
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        return Ok(SyncOutput {
            note: note.to_string(),
            status: SyncStatus::NothingUploaded,
            markdown: text.to_string(),
            written: false,
            uploads: UploadResult::new(),
            images: outcomes,
            stats,
        });
    }

    // ── Step 5: Rewrite links ────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_phase(SyncPhase::Rewriting {
            mapped: batch.uploads.len(),
        });
    }
    let markdown = rewrite::rewrite_links(text, &batch.uploads);

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Sync complete: {}/{} image(s) uploaded, {}ms total",
        stats.uploaded, stats.resolved, stats.total_duration_ms
    );

    Ok(SyncOutput {
        note: note.to_string(),
        status: SyncStatus::Rewritten,
        markdown,
        written: false,
        uploads: batch.uploads,
        images: outcomes,
        stats,
    })
}

enum Slot {
    /// Resolved; waiting for its upload attempt.
    Pending,
    Done(ImageOutcome),
}

/// Fill pending slots with upload attempts, which arrive in the same order.
fn merge_outcomes(slots: Vec<Slot>, attempts: Vec<upload::UploadAttempt>) -> Vec<ImageOutcome> {
    let mut attempts = attempts.into_iter();
    slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Done(outcome) => Some(outcome),
            Slot::Pending => attempts.next().map(|a| ImageOutcome {
                reference: a.reference,
                vault_path: Some(a.vault_path),
                status: match a.result {
                    Ok(url) => ImageStatus::Uploaded { url },
                    Err(error) => ImageStatus::Failed { error },
                },
            }),
        })
        .collect()
}
