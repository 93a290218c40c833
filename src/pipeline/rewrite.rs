//! Link rewriting: substitute remote URLs for uploaded references.
//!
//! Every occurrence of every mapped reference is replaced, in one left-to-right
//! pass over the text, so replacement output is never scanned again. The
//! mapped URLs themselves are part of the scan as keep-as-is tokens: running
//! the rewriter a second time with the same mapping leaves already-rewritten
//! links alone even when a URL contains its own reference
//! (`foo.png` → `https://cdn.example/foo.png`).
//!
//! URLs are spliced in verbatim, without Markdown escaping.

use crate::output::UploadResult;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Replace every occurrence of each reference in `uploads` with its URL.
///
/// References absent from `uploads` are left byte-identical.
pub fn rewrite_links(text: &str, uploads: &UploadResult) -> String {
    let references: BTreeSet<&str> = uploads
        .iter()
        .filter(|(reference, url)| !reference.is_empty() && reference != url)
        .map(|(reference, _)| reference)
        .collect();
    if references.is_empty() {
        return text.to_string();
    }

    // A string that is both a reference and some other reference's URL is
    // treated as a reference.
    let urls: BTreeSet<&str> = uploads
        .iter()
        .map(|(_, url)| url)
        .filter(|url| !url.is_empty() && !references.contains(url))
        .collect();

    // Longest first: at a given position the alternation takes the first
    // branch that matches.
    let mut tokens: Vec<&str> = references.iter().chain(urls.iter()).copied().collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let pattern = tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");

    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("Rewrite pattern rejected ({e}); falling back to sequential replace");
            return sequential_replace(text, uploads);
        }
    };

    let mut replaced = 0usize;
    let out = re.replace_all(text, |caps: &Captures| {
        let matched = &caps[0];
        match uploads.get(matched) {
            Some(url) if references.contains(matched) => {
                replaced += 1;
                url.to_string()
            }
            _ => matched.to_string(),
        }
    });
    debug!("Rewrote {} occurrence(s) of {} reference(s)", replaced, references.len());
    out.into_owned()
}

/// Replace-all per reference, longest reference first.
fn sequential_replace(text: &str, uploads: &UploadResult) -> String {
    let mut pairs: Vec<(&str, &str)> = uploads.iter().filter(|(r, _)| !r.is_empty()).collect();
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    pairs
        .into_iter()
        .fold(text.to_string(), |acc, (reference, url)| acc.replace(reference, url))
}
