//! Image Upload Service
//!
//! Client for the external image store behind a narrow contract: one
//! JPEG/PNG of at most 1 MB in, a stored URL out. Local pre-checks and
//! provider-side rejections both surface as `UploadRejected`; everything the
//! client should not see (provider 5xx, transport failures) is `Unexpected`.

use anyhow::anyhow;
use axum::body::Bytes;
use axum::extract::Multipart;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::UploadConfig;
use crate::error::ApiError;

pub const MAX_IMAGE_BYTES: usize = 1024 * 1024;

const ALLOWED_IMAGE_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// An image file pulled out of a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Reject anything that is not a JPEG/PNG within the size limit.
pub fn check_image(content_type: &str, len: usize) -> Result<(), ApiError> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) || len == 0 || len > MAX_IMAGE_BYTES {
        return Err(ApiError::UploadRejected);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Client for the external image store, constructed once at startup.
#[derive(Debug, Clone)]
pub struct ImageStore {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ImageStore {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint,
            api_key: config.api_key,
        }
    }

    /// Store one image and return its public URL.
    pub async fn upload(&self, image: &ImageUpload) -> Result<String, ApiError> {
        check_image(&image.content_type, image.bytes.len())?;

        let part = reqwest::multipart::Part::bytes(image.bytes.to_vec())
            .file_name("image")
            .mime_str(&image.content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            tracing::warn!("image store rejected upload: {status}");
            return Err(ApiError::UploadRejected);
        }
        if !status.is_success() {
            return Err(ApiError::Unexpected(anyhow!(
                "image store returned {status}"
            )));
        }

        let body: UploadResponse = response.json().await?;
        Ok(body.url)
    }
}

/// Drain a multipart form into plain text fields plus an optional `image`
/// file part. An empty image part (no file chosen on update) counts as
/// absent.
pub async fn collect_form(
    mut multipart: Multipart,
) -> Result<(HashMap<String, String>, Option<ImageUpload>), ApiError> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("form data"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(|_| ApiError::UploadRejected)?;
            if !bytes.is_empty() {
                image = Some(ImageUpload {
                    content_type,
                    bytes,
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|_| ApiError::Validation("form data"))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_jpeg_and_png_within_limit() {
        assert!(check_image("image/jpeg", 512).is_ok());
        assert!(check_image("image/png", MAX_IMAGE_BYTES).is_ok());
    }

    #[test]
    fn rejects_wrong_type() {
        assert!(matches!(
            check_image("image/gif", 512),
            Err(ApiError::UploadRejected)
        ));
        assert!(matches!(
            check_image("application/pdf", 512),
            Err(ApiError::UploadRejected)
        ));
    }

    #[test]
    fn rejects_oversize_and_empty() {
        assert!(matches!(
            check_image("image/png", MAX_IMAGE_BYTES + 1),
            Err(ApiError::UploadRejected)
        ));
        assert!(matches!(
            check_image("image/png", 0),
            Err(ApiError::UploadRejected)
        ));
    }
}
