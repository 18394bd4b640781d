//! HTTP snapshot frame source.
//!
//! Fetches a single JPEG from the camera's snapshot endpoint per capture.
//! Any status other than 200, a connection error, a timeout, or an
//! undecodable body is reported as the camera being offline.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;

use chrono::Local;
use url::Url;

use super::FrameSource;
use crate::error::{PipelineError, StageResult};
use crate::frame::Frame;

const MAX_SNAPSHOT_BYTES: u64 = 5 * 1024 * 1024;

/// Configuration for an HTTP snapshot source.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Snapshot URL, e.g. `http://192.168.1.100/cgi-bin/api.cgi?cmd=Snap&channel=0`.
    pub url: String,
    /// Optional camera account, appended as `user`/`password` query parameters.
    pub user: Option<String>,
    pub password: Option<String>,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            url: "http://192.168.1.100/cgi-bin/api.cgi?cmd=Snap&channel=0".to_string(),
            user: None,
            password: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Camera snapshot source.
pub struct SnapshotSource {
    agent: ureq::Agent,
    request_url: Url,
    display_url: String,
    /// Camera password, scrubbed from error text.
    secret: Option<String>,
    frame_count: u64,
    failure_count: u64,
}

/// Statistics for a snapshot source.
#[derive(Clone, Debug)]
pub struct SnapshotStats {
    pub frames_captured: u64,
    pub failures: u64,
    pub source: String,
}

impl SnapshotSource {
    pub fn new(config: SnapshotConfig) -> Result<Self> {
        let mut request_url = Url::parse(&config.url).context("parse camera url")?;
        match request_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported camera scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        // Credentials stay out of the display form used in logs.
        let mut shown = request_url.clone();
        shown.set_query(None);
        let _ = shown.set_username("");
        let _ = shown.set_password(None);
        let display_url = shown.to_string();
        if let Some(user) = config.user.as_deref().filter(|u| !u.is_empty()) {
            request_url.query_pairs_mut().append_pair("user", user);
            if let Some(password) = config.password.as_deref() {
                request_url.query_pairs_mut().append_pair("password", password);
            }
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            agent,
            request_url,
            display_url,
            secret: config.password.filter(|p| !p.is_empty()),
            frame_count: 0,
            failure_count: 0,
        })
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            frames_captured: self.frame_count,
            failures: self.failure_count,
            source: self.display_url.clone(),
        }
    }

    /// Error text with the request URL and password replaced.
    ///
    /// ureq renders the full request URL, query included, into transport
    /// errors, so their text never leaves this module unscrubbed.
    fn redact(&self, text: &str) -> String {
        let mut text = text.replace(self.request_url.as_str(), &self.display_url);
        if let Some(secret) = &self.secret {
            let encoded: String = url::form_urlencoded::byte_serialize(secret.as_bytes()).collect();
            text = text
                .replace(secret.as_str(), "<redacted>")
                .replace(encoded.as_str(), "<redacted>");
        }
        text
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        let response = match self.agent.request_url("GET", &self.request_url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(anyhow!("camera offline: http status {}", code))
            }
            Err(ureq::Error::Transport(transport)) => {
                let mut detail = transport.kind().to_string();
                if let Some(message) = transport.message() {
                    detail.push_str(": ");
                    detail.push_str(message);
                }
                if let Some(source) = std::error::Error::source(&transport) {
                    detail.push_str(": ");
                    detail.push_str(&source.to_string());
                }
                return Err(anyhow!(
                    "camera offline: connect to {}: {}",
                    self.display_url,
                    self.redact(&detail)
                ));
            }
        };
        if response.status() != 200 {
            return Err(anyhow!("camera offline: http status {}", response.status()));
        }
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_SNAPSHOT_BYTES + 1)
            .read_to_end(&mut bytes)
            .context("read snapshot body")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty snapshot payload"));
        }
        if bytes.len() as u64 > MAX_SNAPSHOT_BYTES {
            return Err(anyhow!(
                "snapshot exceeds {} bytes",
                MAX_SNAPSHOT_BYTES
            ));
        }
        Ok(bytes)
    }
}

impl FrameSource for SnapshotSource {
    fn capture(&mut self) -> StageResult<Frame> {
        let result = self
            .fetch()
            .and_then(|bytes| Frame::decode(&bytes, Local::now()));
        match result {
            Ok(frame) => {
                self.frame_count += 1;
                log::debug!(
                    "captured frame #{} {}x{} from {}",
                    self.frame_count,
                    frame.width(),
                    frame.height(),
                    self.display_url
                );
                Ok(frame)
            }
            Err(e) => {
                self.failure_count += 1;
                Err(PipelineError::Capture(e))
            }
        }
    }
}
