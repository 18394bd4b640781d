//! quarry_watchd - quarry gate watch daemon
//!
//! This daemon:
//! 1. Polls the gate camera for a snapshot on a fixed interval
//! 2. Asks the vision model to describe the vehicle in the frame
//! 3. Drops frames that show no vehicle
//! 4. Archives a thumbnail and writes a row to the monthly ledger
//!
//! Configuration comes from the file named by QUARRY_CONFIG (optional) and
//! environment overrides. Ctrl-C stops the loop after the current poll.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quarry_watch::{
    archive::{AnyStore, DriveConfig, DriveStore, LocalStore, SnapshotArchiver},
    classify::{GeminiClassifier, GeminiConfig},
    config::{ArchiveBackend, LedgerBackendKind, QuarryConfig},
    google::{ServiceAccountAuth, TokenProvider, SCOPE_DRIVE, SCOPE_SPREADSHEETS},
    ingest::{SnapshotConfig, SnapshotSource},
    ledger::{AnySink, LogSink, SheetsConfig, SheetsLedger, SqliteLedger},
    PollDriver,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = QuarryConfig::load()?;
    log::debug!("config: {:?}", cfg);

    let auth = if cfg.needs_google() {
        let auth = ServiceAccountAuth::from_file(
            &cfg.credentials_path,
            &[SCOPE_SPREADSHEETS, SCOPE_DRIVE],
            cfg.ledger.timeout,
        )
        .with_context(|| format!("load credentials {}", cfg.credentials_path.display()))?;
        log::info!("google service account: {}", auth.client_email());
        Some(Arc::new(auth) as Arc<dyn TokenProvider>)
    } else {
        None
    };

    let source = SnapshotSource::new(SnapshotConfig {
        url: cfg.camera.url.clone(),
        user: cfg.camera.user.clone(),
        password: cfg.camera.password.clone(),
        timeout: cfg.camera.timeout,
    })?;

    let classifier = GeminiClassifier::new(GeminiConfig {
        endpoint: cfg.model.endpoint.clone(),
        model: cfg.model.model.clone(),
        api_key: cfg.model.api_key.clone(),
        timeout: cfg.model.timeout,
        ..GeminiConfig::default()
    })?;

    let store = match cfg.archive.backend {
        ArchiveBackend::Drive => AnyStore::Drive(DriveStore::new(
            DriveConfig {
                folder_id: cfg.archive.folder_id.clone().unwrap_or_default(),
                timeout: cfg.archive.timeout,
                ..DriveConfig::default()
            },
            google_auth(&auth)?,
        )?),
        ArchiveBackend::Local => AnyStore::Local(LocalStore::new(
            &cfg.archive.local_dir,
            cfg.archive.public_base_url.clone(),
        )?),
    };
    let archiver = SnapshotArchiver::new(store).with_jpeg_quality(cfg.archive.jpeg_quality);

    let sink = match cfg.ledger.backend {
        LedgerBackendKind::Sheets => AnySink::Sheets(LogSink::new(SheetsLedger::new(
            SheetsConfig {
                spreadsheet_id: cfg.ledger.spreadsheet_id.clone().unwrap_or_default(),
                timeout: cfg.ledger.timeout,
                ..SheetsConfig::default()
            },
            google_auth(&auth)?,
        )?)),
        LedgerBackendKind::Sqlite => {
            log::info!("ledger database: {}", cfg.ledger.db_path);
            AnySink::Sqlite(LogSink::new(SqliteLedger::open(&cfg.ledger.db_path)?))
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .context("install ctrl-c handler")?;
    }

    let mut driver =
        PollDriver::new(source, classifier, archiver, sink).with_interval(cfg.poll_interval);
    log::info!(
        "System online. Watching {} every {}s",
        driver.source().stats().source,
        cfg.poll_interval.as_secs()
    );
    driver.run(&stop);
    Ok(())
}

fn google_auth(auth: &Option<Arc<dyn TokenProvider>>) -> Result<Arc<dyn TokenProvider>> {
    auth.clone()
        .ok_or_else(|| anyhow::anyhow!("google backend selected without credentials"))
}
