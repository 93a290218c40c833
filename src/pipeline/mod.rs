//! Pipeline stages for uploading a note's images.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ resolve ──▶ upload ──▶ rewrite
//! (regex)     (vault)     (HTTP)     (text)
//! ```
//!
//! 1. [`extract`]: find `![alt](target)` / `![[target|alias]]` references;
//!    pure, no I/O
//! 2. [`resolve`]: map each reference to a vault file and read its bytes
//! 3. [`upload`] : multipart POST per image, strictly sequential; the only
//!    stage with network I/O
//! 4. [`rewrite`]: substitute remote URLs for every uploaded reference

pub mod extract;
pub mod resolve;
pub mod rewrite;
pub mod upload;
