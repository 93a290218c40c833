//! Reference resolution: map an extracted reference to a file in the vault.

use crate::config::ResolutionPolicy;
use crate::error::ImageError;
use crate::pipeline::extract::ImageReference;
use crate::store::{self, FileStore};
use tracing::debug;

/// A reference paired with the bytes of the file it names.
///
/// Lives only for the duration of one upload attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub reference: ImageReference,
    /// Vault path of the matched file.
    pub vault_path: String,
    /// File name sent as the multipart filename.
    pub file_name: String,
    /// MIME type inferred from the extension.
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ResolvedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedImage")
            .field("reference", &self.reference.target)
            .field("vault_path", &self.vault_path)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// `true` for references that already point at a remote resource.
pub fn is_remote(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Resolve one reference found in the note at `note_path`.
///
/// Returns [`ImageError::NotFound`] on a miss (the caller skips it silently)
/// and [`ImageError::ReadFailed`] when the file exists but cannot be read.
pub fn resolve_reference(
    store: &dyn FileStore,
    reference: &ImageReference,
    note_path: &str,
    policy: ResolutionPolicy,
) -> Result<ResolvedImage, ImageError> {
    let target = reference.target.trim();
    let miss = || ImageError::NotFound {
        reference: reference.target.clone(),
    };

    if target.is_empty() || is_remote(target) {
        return Err(miss());
    }

    let vault_path = match policy {
        ResolutionPolicy::DirectOrRelative => find_direct_or_relative(store, target, note_path),
        ResolutionPolicy::FileName => find_by_file_name(store, target),
    }
    .ok_or_else(miss)?;

    let bytes = store
        .read_binary(&vault_path)
        .map_err(|e| ImageError::ReadFailed {
            reference: reference.target.clone(),
            path: vault_path.clone(),
            detail: e.to_string(),
        })?;

    let file_name = store::file_name(&vault_path).to_string();
    let mime_type = mime_guess::from_path(&file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    debug!(
        "Resolved '{}' → {} ({} bytes, {})",
        reference.target,
        vault_path,
        bytes.len(),
        mime_type
    );

    Ok(ResolvedImage {
        reference: reference.clone(),
        vault_path,
        file_name,
        mime_type,
        bytes,
    })
}

/// Resolve every reference, keeping extraction order.
pub fn resolve_all(
    store: &dyn FileStore,
    references: &[ImageReference],
    note_path: &str,
    policy: ResolutionPolicy,
) -> Vec<(ImageReference, Result<ResolvedImage, ImageError>)> {
    references
        .iter()
        .map(|r| (r.clone(), resolve_reference(store, r, note_path, policy)))
        .collect()
}

/// Vault-rooted lookup first, then relative to the note's folder.
fn find_direct_or_relative(store: &dyn FileStore, target: &str, note_path: &str) -> Option<String> {
    if let Some(direct) = store::normalize_vault_path(target) {
        if store.exists(&direct) {
            return Some(direct);
        }
    }

    let note_dir = store::parent_dir(note_path);
    if note_dir.is_empty() {
        return None;
    }
    let relative = store::normalize_vault_path(&format!("{note_dir}/{target}"))?;
    store.exists(&relative).then_some(relative)
}

/// First file, in lexicographic path order, whose name equals the target's
/// last segment.
fn find_by_file_name(store: &dyn FileStore, target: &str) -> Option<String> {
    let wanted = store::file_name(target);
    if wanted.is_empty() {
        return None;
    }
    let mut files = match store.list_files() {
        Ok(files) => files,
        Err(e) => {
            debug!("Listing vault files failed: {e}");
            return None;
        }
    };
    files.sort();
    files.into_iter().find(|p| store::file_name(p) == wanted)
}
