//! Google Drive object store.
//!
//! Each snapshot is a multipart upload into a shared folder followed by an
//! `anyone`/`reader` permission grant. The returned reference is Drive's
//! direct view URL, which the spreadsheet `IMAGE()` formula can render.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::{ImageReference, ObjectStore};
use crate::google::{bearer, request_error, TokenProvider};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
const VIEW_URL_PREFIX: &str = "https://drive.google.com/uc?export=view&id=";

#[derive(Clone, Debug)]
pub struct DriveConfig {
    /// Destination folder id.
    pub folder_id: String,
    /// API root; overridden in tests.
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            folder_id: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct DriveStore {
    config: DriveConfig,
    auth: Arc<dyn TokenProvider>,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

impl DriveStore {
    pub fn new(config: DriveConfig, auth: Arc<dyn TokenProvider>) -> Result<Self> {
        if config.folder_id.trim().is_empty() {
            return Err(anyhow!("drive folder id is empty"));
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            config,
            auth,
            agent,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn upload(&self, token: &str, file_name: &str, jpeg: &[u8]) -> Result<String> {
        let metadata = json!({
            "name": file_name,
            "parents": [self.config.folder_id],
            "mimeType": "image/jpeg",
        });
        let boundary = multipart_boundary();
        let body = multipart_related(&boundary, &metadata, jpeg);
        let response = self
            .agent
            .post(&self.api_url("/upload/drive/v3/files"))
            .query("uploadType", "multipart")
            .query("fields", "id")
            .query("supportsAllDrives", "true")
            .set("Authorization", &bearer(token))
            .set(
                "Content-Type",
                &format!("multipart/related; boundary={}", boundary),
            )
            .send_bytes(&body)
            .map_err(|e| request_error("drive upload", e))?;
        let created: CreatedFile = response.into_json().context("decode drive upload response")?;
        Ok(created.id)
    }

    fn share_publicly(&self, token: &str, file_id: &str) -> Result<()> {
        self.agent
            .post(&self.api_url(&format!("/drive/v3/files/{}/permissions", file_id)))
            .query("supportsAllDrives", "true")
            .set("Authorization", &bearer(token))
            .send_json(json!({ "role": "reader", "type": "anyone" }))
            .map_err(|e| request_error("drive permission grant", e))?;
        Ok(())
    }
}

impl ObjectStore for DriveStore {
    fn name(&self) -> &'static str {
        "google-drive"
    }

    fn put_public(&mut self, file_name: &str, jpeg: &[u8]) -> Result<ImageReference> {
        let token = self.auth.access_token()?;
        let file_id = self.upload(&token, file_name, jpeg)?;
        self.share_publicly(&token, &file_id)?;
        Ok(ImageReference::new(format!("{}{}", VIEW_URL_PREFIX, file_id)))
    }
}

fn multipart_boundary() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("quarry_watch_{:x}", nanos)
}

/// `multipart/related` body: JSON metadata part, then the JPEG part.
fn multipart_related(boundary: &str, metadata: &serde_json::Value, jpeg: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(jpeg.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(jpeg);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
