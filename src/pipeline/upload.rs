//! Upload client: send resolved images to the CMS, one at a time.
//!
//! ## Wire contract
//!
//! ```text
//! POST {base_url}/api/upload
//! Authorization: Bearer {api_token}
//! Content-Type: multipart/form-data   (one part named "files")
//!
//! 200 OK
//! [{"url": "https://cdn.example/uploads/photo_1a2b.png", ...}]
//! ```
//!
//! Any transport error, non-2xx status, or body without a `url` in its first
//! element is a per-image failure. The batch carries on with the next image;
//! there are no retries.

use crate::config::{self, UploadConfig, UPLOAD_FIELD};
use crate::error::{ImageError, Md2CmsError};
use crate::output::UploadResult;
use crate::pipeline::resolve::ResolvedImage;
use crate::progress::ProgressCallback;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest error-body excerpt kept in [`ImageError::HttpStatus`].
const MAX_ERROR_BODY: usize = 200;

/// HTTP client bound to one CMS endpoint and token.
#[derive(Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    endpoint: String,
    base_url: String,
    token: String,
    absolute_urls: bool,
}

impl std::fmt::Debug for UploadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadClient")
            .field("endpoint", &self.endpoint)
            .field("token", &config::redact(&self.token))
            .field("absolute_urls", &self.absolute_urls)
            .finish()
    }
}

/// The result of uploading one resolved image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAttempt {
    pub reference: String,
    pub vault_path: String,
    pub result: Result<String, ImageError>,
}

/// Everything [`upload_all`] produced.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    /// Reference → URL for confirmed uploads only.
    pub uploads: UploadResult,
    /// One entry per image, in upload order.
    pub attempts: Vec<UploadAttempt>,
}

impl UploadClient {
    /// Build a client from the run configuration.
    pub fn new(config: &UploadConfig) -> Result<Self, Md2CmsError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| Md2CmsError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.upload_endpoint(),
            base_url: config.base_url_trimmed().to_string(),
            token: config.api_token.clone(),
            absolute_urls: config.absolute_urls,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload one image and return the URL the CMS assigned to it.
    ///
    /// The image is consumed; its bytes move into the request body.
    pub async fn upload(&self, image: ResolvedImage) -> Result<String, ImageError> {
        let reference = image.reference.target;
        let transport = |detail: String| ImageError::Transport {
            reference: reference.clone(),
            detail,
        };

        debug!(
            "POST {} ({} '{}', {} bytes)",
            self.endpoint,
            image.mime_type,
            image.file_name,
            image.bytes.len()
        );

        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime_type)
            .map_err(|e| transport(e.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(describe_reqwest_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport(describe_reqwest_error(&e)))?;

        if !status.is_success() {
            return Err(ImageError::HttpStatus {
                reference,
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let url = parse_upload_response(&body).map_err(|detail| ImageError::MalformedResponse {
            reference: reference.clone(),
            detail,
        })?;

        Ok(self.finish_url(url))
    }

    fn finish_url(&self, url: String) -> String {
        if self.absolute_urls && url.starts_with('/') && !url.starts_with("//") {
            format!("{}{}", self.base_url, url)
        } else {
            url
        }
    }
}

/// Upload every image strictly in order, waiting for each response before
/// sending the next request.
///
/// `settled` is the number of batch positions already reported as failed
/// before upload (unreadable files). Progress indices continue after them,
/// so the whole batch shares one `index / total` numbering.
pub async fn upload_all(
    client: &UploadClient,
    images: Vec<ResolvedImage>,
    settled: usize,
    progress: Option<&ProgressCallback>,
) -> UploadBatch {
    let total = settled + images.len();
    let mut batch = UploadBatch {
        uploads: UploadResult::new(),
        attempts: Vec::with_capacity(images.len()),
    };

    for (i, image) in images.into_iter().enumerate() {
        let index = settled + i + 1;
        let reference = image.reference.target.clone();
        let vault_path = image.vault_path.clone();

        if let Some(cb) = progress {
            cb.on_image_start(index, total, &reference);
        }
        info!("Uploading image {}/{}: {}", index, total, reference);

        let result = client.upload(image).await;
        match &result {
            Ok(url) => {
                info!("Uploaded '{}' → {}", reference, url);
                batch.uploads.insert(reference.clone(), url.clone());
                if let Some(cb) = progress {
                    cb.on_image_uploaded(index, total, &reference, url);
                }
            }
            Err(e) => {
                warn!("Failed to upload image: {}", e);
                if let Some(cb) = progress {
                    cb.on_image_error(index, total, &reference, &e.to_string());
                }
            }
        }

        batch.attempts.push(UploadAttempt {
            reference,
            vault_path,
            result,
        });
    }

    batch
}

/// Pull `[0].url` out of an upload response body.
pub fn parse_upload_response(body: &str) -> Result<String, String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("body is not JSON: {e}"))?;
    let files = value
        .as_array()
        .ok_or_else(|| "expected a JSON array".to_string())?;
    let first = files
        .first()
        .ok_or_else(|| "response array is empty".to_string())?;
    first
        .get("url")
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| "first element has no string 'url' field".to_string())
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

/// Cut `s` to at most `max` bytes on a char boundary, marking the cut.
fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\u{2026}", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_first_url() {
        let body = r#"[{"id":1,"url":"https://cdn.example/foo.png"},{"url":"https://cdn.example/other.png"}]"#;
        assert_eq!(parse_upload_response(body).unwrap(), "https://cdn.example/foo.png");
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(parse_upload_response("not json").is_err());
        assert!(parse_upload_response(r#"{"url":"x"}"#).is_err());
        assert!(parse_upload_response("[]").is_err());
        assert!(parse_upload_response(r#"[{"name":"foo.png"}]"#).is_err());
        assert!(parse_upload_response(r#"[{"url":42}]"#).is_err());
        assert!(parse_upload_response(r#"[{"url":""}]"#).is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        let long = "é".repeat(10);
        let cut = truncate(&long, 5);
        assert!(cut.ends_with('\u{2026}'));
        assert_eq!(cut.trim_end_matches('\u{2026}'), "éé");
    }

    fn client(absolute: bool) -> UploadClient {
        let config = UploadConfig::builder()
            .base_url("https://cms.example/")
            .api_token("t")
            .absolute_urls(absolute)
            .build()
            .unwrap();
        UploadClient::new(&config).unwrap()
    }

    #[test]
    fn debug_redacts_token() {
        let config = UploadConfig::builder()
            .base_url("https://cms.example")
            .api_token("super-secret")
            .build()
            .unwrap();
        let client = UploadClient::new(&config).unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
        assert!(dbg.contains("https://cms.example/api/upload"));
    }

    #[test]
    fn endpoint_is_derived_from_base_url() {
        assert_eq!(client(false).endpoint(), "https://cms.example/api/upload");
    }

    #[test]
    fn relative_urls_are_prefixed_only_when_asked() {
        assert_eq!(client(false).finish_url("/uploads/a.png".into()), "/uploads/a.png");
        assert_eq!(
            client(true).finish_url("/uploads/a.png".into()),
            "https://cms.example/uploads/a.png"
        );
        assert_eq!(
            client(true).finish_url("https://cdn/a.png".into()),
            "https://cdn/a.png"
        );
    }
}
