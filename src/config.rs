//! Configuration types for a sync run.
//!
//! Two layers:
//!
//! * [`Settings`]: the persisted key–value store (`remote_base_url`,
//!   `api_token`), kept in a TOML file and edited with `md2cms config`.
//! * [`UploadConfig`]: everything a single run needs, built via
//!   [`UploadConfigBuilder`] from settings plus command-line overrides and
//!   passed explicitly into [`crate::sync::sync_document`].

use crate::error::Md2CmsError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Route appended to the base URL for uploads.
pub const UPLOAD_ROUTE: &str = "/api/upload";

/// Multipart field name the upload endpoint expects.
pub const UPLOAD_FIELD: &str = "files";

// ── Persisted settings ───────────────────────────────────────────────────

/// Persisted settings. Both values are empty by default; a run refuses to
/// upload anything until both are set.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// CMS instance URL, e.g. `https://cms.example.com`.
    pub remote_base_url: String,
    /// Bearer token sent with every upload.
    pub api_token: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("remote_base_url", &self.remote_base_url)
            .field("api_token", &redact(&self.api_token))
            .finish()
    }
}

impl Settings {
    /// Default location: `<config dir>/md2cms/settings.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("md2cms").join("settings.toml"))
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, Md2CmsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(Md2CmsError::SettingsReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        toml::from_str(&content).map_err(|e| Md2CmsError::SettingsParseFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Write settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), Md2CmsError> {
        let write_err = |detail: String| Md2CmsError::SettingsWriteFailed {
            path: path.to_path_buf(),
            detail,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }
}

pub(crate) fn redact(token: &str) -> &'static str {
    if token.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

// ── Run configuration ────────────────────────────────────────────────────

/// Configuration for one sync run.
///
/// Built via [`UploadConfig::builder()`] or using [`UploadConfig::default()`]
/// (which has an empty URL and token and therefore fails validation).
///
/// # Example
/// ```rust
/// use md2cms::{ExtractionPolicy, UploadConfig};
///
/// let config = UploadConfig::builder()
///     .base_url("https://cms.example.com")
///     .api_token("secret")
///     .extraction(ExtractionPolicy::ImageEmbedsOnly)
///     .build()
///     .unwrap();
/// assert_eq!(config.upload_endpoint(), "https://cms.example.com/api/upload");
/// ```
#[derive(Clone, Default)]
pub struct UploadConfig {
    /// CMS base URL. Trailing slashes are ignored.
    pub base_url: String,

    /// Bearer token for the `Authorization` header.
    pub api_token: String,

    /// Which image syntaxes are recognised. Default: [`ExtractionPolicy::LinksAndEmbeds`].
    pub extraction: ExtractionPolicy,

    /// How references are mapped to vault files. Default: [`ResolutionPolicy::DirectOrRelative`].
    pub resolution: ResolutionPolicy,

    /// Per-request timeout in seconds. Default: None (HTTP client default).
    ///
    /// A hung request stalls the whole run when unset.
    pub request_timeout_secs: Option<u64>,

    /// Prefix server-relative URLs (`/uploads/x.png`) with `base_url`. Default: false.
    pub absolute_urls: bool,

    /// Compute the rewritten note but leave the vault untouched. Default: false.
    pub dry_run: bool,

    /// Receives phase and per-image events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &redact(&self.api_token))
            .field("extraction", &self.extraction)
            .field("resolution", &self.resolution)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("absolute_urls", &self.absolute_urls)
            .field("dry_run", &self.dry_run)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SyncProgressCallback>"),
            )
            .finish()
    }
}

impl UploadConfig {
    /// Create a new builder for `UploadConfig`.
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder {
            config: Self::default(),
        }
    }

    /// Base URL without trailing slashes.
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// Full upload endpoint, `{base_url}/api/upload`.
    pub fn upload_endpoint(&self) -> String {
        format!("{}{}", self.base_url_trimmed(), UPLOAD_ROUTE)
    }

    /// Check the values a run cannot start without.
    ///
    /// Called by the orchestrator before any file or network I/O.
    pub fn validate(&self) -> Result<(), Md2CmsError> {
        if self.base_url.trim().is_empty() {
            return Err(Md2CmsError::MissingConfig {
                field: "remote base URL",
                hint: "set-url <URL>",
            });
        }
        if self.api_token.trim().is_empty() {
            return Err(Md2CmsError::MissingConfig {
                field: "API token",
                hint: "set-token <TOKEN>",
            });
        }
        Ok(())
    }
}

/// Builder for [`UploadConfig`].
#[derive(Debug)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    /// Take URL and token from persisted settings.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.config.base_url = settings.remote_base_url.clone();
        self.config.api_token = settings.api_token.clone();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = token.into();
        self
    }

    pub fn extraction(mut self, policy: ExtractionPolicy) -> Self {
        self.config.extraction = policy;
        self
    }

    pub fn resolution(mut self, policy: ResolutionPolicy) -> Self {
        self.config.resolution = policy;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn absolute_urls(mut self, v: bool) -> Self {
        self.config.absolute_urls = v;
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// An empty URL or token is accepted here; it is reported by
    /// [`UploadConfig::validate`] when a run starts.
    pub fn build(self) -> Result<UploadConfig, Md2CmsError> {
        let c = &self.config;
        let url = c.base_url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Md2CmsError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{url}'"
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(Md2CmsError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which image-reference syntaxes the extractor recognises.
///
/// The two policies are deliberately not merged; pick one per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionPolicy {
    /// `![alt](target)` links, then `![[target|alias]]` embeds. (default)
    #[default]
    LinksAndEmbeds,
    /// Only `![[target]]` embeds whose target has a raster-image extension.
    ImageEmbedsOnly,
}

/// How a reference is mapped to a file in the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    /// Vault-rooted path first, then relative to the note's folder. (default)
    #[default]
    DirectOrRelative,
    /// Match the bare file name anywhere in the vault; first in path order wins.
    FileName,
}
