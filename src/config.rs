use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::gemini;

const DEFAULT_CAMERA_URL: &str = "http://192.168.1.100/cgi-bin/api.cgi?cmd=Snap&channel=0";
const DEFAULT_CAMERA_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_SECS: u64 = 5;
const DEFAULT_JPEG_QUALITY: u8 = crate::frame::DEFAULT_JPEG_QUALITY;
const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
const DEFAULT_LEDGER_DB: &str = "quarry_ledger.db";
const DEFAULT_ARCHIVE_DIR: &str = "snapshots";

#[derive(Debug, Deserialize, Default)]
struct QuarryConfigFile {
    camera: Option<CameraConfigFile>,
    model: Option<ModelConfigFile>,
    archive: Option<ArchiveConfigFile>,
    ledger: Option<LedgerConfigFile>,
    google: Option<GoogleConfigFile>,
    poll: Option<PollConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    api_key: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ArchiveConfigFile {
    backend: Option<String>,
    folder_id: Option<String>,
    local_dir: Option<PathBuf>,
    public_base_url: Option<String>,
    jpeg_quality: Option<u8>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct LedgerConfigFile {
    backend: Option<String>,
    spreadsheet_id: Option<String>,
    db_path: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct GoogleConfigFile {
    credentials_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct PollConfigFile {
    interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveBackend {
    Drive,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackendKind {
    Sheets,
    Sqlite,
}

#[derive(Clone)]
pub struct QuarryConfig {
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub archive: ArchiveSettings,
    pub ledger: LedgerSettings,
    pub credentials_path: PathBuf,
    pub poll_interval: Duration,
}

#[derive(Clone)]
pub struct CameraSettings {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct ModelSettings {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub backend: ArchiveBackend,
    pub folder_id: Option<String>,
    pub local_dir: PathBuf,
    pub public_base_url: Option<String>,
    pub jpeg_quality: u8,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub backend: LedgerBackendKind,
    pub spreadsheet_id: Option<String>,
    pub db_path: String,
    pub timeout: Duration,
}

// Secrets are redacted from Debug output so the config can be logged.
impl std::fmt::Debug for CameraSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl std::fmt::Debug for QuarryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuarryConfig")
            .field("camera", &self.camera)
            .field("model", &self.model)
            .field("archive", &self.archive)
            .field("ledger", &self.ledger)
            .field("credentials_path", &self.credentials_path)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl QuarryConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("QUARRY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// True when either backend talks to Google and needs the service account.
    pub fn needs_google(&self) -> bool {
        self.archive.backend == ArchiveBackend::Drive
            || self.ledger.backend == LedgerBackendKind::Sheets
    }

    fn from_file(file: QuarryConfigFile) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            url: camera_file
                .url
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            user: camera_file.user,
            password: camera_file.password,
            timeout: Duration::from_secs(
                camera_file
                    .timeout_secs
                    .unwrap_or(DEFAULT_CAMERA_TIMEOUT_SECS),
            ),
        };

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            api_key: model_file.api_key.unwrap_or_default(),
            model: model_file
                .model
                .unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
            endpoint: model_file
                .endpoint
                .unwrap_or_else(|| gemini::DEFAULT_ENDPOINT.to_string()),
            timeout: Duration::from_secs(
                model_file.timeout_secs.unwrap_or(DEFAULT_MODEL_TIMEOUT_SECS),
            ),
        };

        let archive_file = file.archive.unwrap_or_default();
        let archive = ArchiveSettings {
            backend: match archive_file.backend.as_deref() {
                None => ArchiveBackend::Drive,
                Some(name) => parse_archive_backend(name)?,
            },
            folder_id: archive_file.folder_id,
            local_dir: archive_file
                .local_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_DIR)),
            public_base_url: archive_file.public_base_url,
            jpeg_quality: archive_file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            timeout: Duration::from_secs(
                archive_file
                    .timeout_secs
                    .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS),
            ),
        };

        let ledger_file = file.ledger.unwrap_or_default();
        let ledger = LedgerSettings {
            backend: match ledger_file.backend.as_deref() {
                None => LedgerBackendKind::Sheets,
                Some(name) => parse_ledger_backend(name)?,
            },
            spreadsheet_id: ledger_file.spreadsheet_id,
            db_path: ledger_file
                .db_path
                .unwrap_or_else(|| DEFAULT_LEDGER_DB.to_string()),
            timeout: Duration::from_secs(
                ledger_file
                    .timeout_secs
                    .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS),
            ),
        };

        let credentials_path = file
            .google
            .and_then(|google| google.credentials_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH));
        let poll_interval = Duration::from_secs(
            file.poll
                .and_then(|poll| poll.interval_secs)
                .unwrap_or(DEFAULT_POLL_SECS),
        );

        Ok(Self {
            camera,
            model,
            archive,
            ledger,
            credentials_path,
            poll_interval,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("QUARRY_CAMERA_URL") {
            self.camera.url = url;
        }
        if let Some(user) = non_empty_env("QUARRY_CAMERA_USER") {
            self.camera.user = Some(user);
        }
        if let Some(password) = non_empty_env("QUARRY_CAMERA_PASSWORD") {
            self.camera.password = Some(password);
        }
        if let Some(key) = non_empty_env("GEMINI_API_KEY") {
            self.model.api_key = key;
        }
        if let Some(model) = non_empty_env("QUARRY_MODEL") {
            self.model.model = model;
        }
        if let Some(folder) = non_empty_env("QUARRY_DRIVE_FOLDER_ID") {
            self.archive.folder_id = Some(folder);
        }
        if let Some(sheet) = non_empty_env("QUARRY_SPREADSHEET_ID") {
            self.ledger.spreadsheet_id = Some(sheet);
        }
        if let Some(path) = non_empty_env("QUARRY_LEDGER_DB") {
            self.ledger.db_path = path;
        }
        if let Some(path) = non_empty_env("QUARRY_CREDENTIALS") {
            self.credentials_path = PathBuf::from(path);
        }
        if let Some(secs) = non_empty_env("QUARRY_POLL_SECS") {
            let seconds: u64 = secs
                .parse()
                .map_err(|_| anyhow!("QUARRY_POLL_SECS must be an integer number of seconds"))?;
            self.poll_interval = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(anyhow!("poll interval must be greater than zero"));
        }
        for (name, timeout) in [
            ("camera", self.camera.timeout),
            ("model", self.model.timeout),
            ("archive", self.archive.timeout),
            ("ledger", self.ledger.timeout),
        ] {
            if timeout.is_zero() {
                return Err(anyhow!("{} timeout must be greater than zero", name));
            }
        }
        if self.model.api_key.trim().is_empty() {
            return Err(anyhow!(
                "model api key missing; set GEMINI_API_KEY or [model] api_key"
            ));
        }
        if !(1..=100).contains(&self.archive.jpeg_quality) {
            return Err(anyhow!("archive jpeg_quality must be within 1..=100"));
        }
        if self.archive.backend == ArchiveBackend::Drive
            && is_blank(self.archive.folder_id.as_deref())
        {
            return Err(anyhow!(
                "drive archive needs a folder id; set QUARRY_DRIVE_FOLDER_ID or [archive] folder_id"
            ));
        }
        if self.ledger.backend == LedgerBackendKind::Sheets
            && is_blank(self.ledger.spreadsheet_id.as_deref())
        {
            return Err(anyhow!(
                "sheets ledger needs a spreadsheet id; set QUARRY_SPREADSHEET_ID or [ledger] spreadsheet_id"
            ));
        }
        Ok(())
    }
}

fn parse_archive_backend(name: &str) -> Result<ArchiveBackend> {
    match name.trim().to_lowercase().as_str() {
        "drive" | "google-drive" => Ok(ArchiveBackend::Drive),
        "local" | "local-dir" => Ok(ArchiveBackend::Local),
        other => Err(anyhow!(
            "unknown archive backend '{}'; expected drive or local",
            other
        )),
    }
}

fn parse_ledger_backend(name: &str) -> Result<LedgerBackendKind> {
    match name.trim().to_lowercase().as_str() {
        "sheets" | "google-sheets" => Ok(LedgerBackendKind::Sheets),
        "sqlite" => Ok(LedgerBackendKind::Sqlite),
        other => Err(anyhow!(
            "unknown ledger backend '{}'; expected sheets or sqlite",
            other
        )),
    }
}

fn read_config_file(path: &Path) -> Result<QuarryConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}
