//! Monthly traffic ledger.
//!
//! One ledger per calendar month, named by its period key ("March 2025").
//! Resolution is a two-state machine re-run on every write:
//!
//! - `NoLedgerForPeriod`: no ledger carries the record's period key. The sink
//!   creates one with the fixed layout and moves to `LedgerExists`.
//! - `LedgerExists`: the ledger is reused.
//!
//! Nothing about the current period is cached between writes, so a month
//! boundary or a process restart needs no bookkeeping.

pub mod sheets;
pub mod sqlite;

use anyhow::Result;
use chrono::{DateTime, Local};
use std::fmt;

use crate::archive::ImageReference;
use crate::classify::ClassificationResult;
use crate::error::{PipelineError, StageResult};

pub use sheets::{SheetRef, SheetsConfig, SheetsLedger};
pub use sqlite::{SqliteLedger, SqliteLedgerId};

/// Ledger header row, in column order.
pub const LEDGER_COLUMNS: [&str; 10] = [
    "Date",
    "Time",
    "Direction",
    "Type",
    "Color",
    "Plate",
    "Tarp?",
    "Load",
    "Material",
    "Snapshot",
];

/// Presentation applied when a ledger is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerLayout {
    pub columns: &'static [&'static str],
    pub frozen_rows: u32,
    /// Zero-based index of the snapshot column.
    pub image_column: u32,
    pub image_column_width_px: u32,
    pub initial_rows: u32,
}

pub const MONTHLY_LAYOUT: LedgerLayout = LedgerLayout {
    columns: &LEDGER_COLUMNS,
    frozen_rows: 1,
    image_column: 9,
    image_column_width_px: 300,
    initial_rows: 5000,
};

/// Period key of the month containing `at`, e.g. "March 2025".
pub fn period_key(at: &DateTime<Local>) -> String {
    at.format("%B %Y").to_string()
}

/// Spreadsheet formula that renders the snapshot inline.
pub fn image_formula(image: &ImageReference) -> String {
    format!("=IMAGE(\"{}\")", image.as_str().replace('"', "\"\""))
}

/// One accepted vehicle event, as persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub recorded_at: DateTime<Local>,
    pub classification: ClassificationResult,
    pub image: ImageReference,
}

impl LogRecord {
    pub fn new(
        classification: ClassificationResult,
        image: ImageReference,
        recorded_at: DateTime<Local>,
    ) -> Self {
        Self {
            recorded_at,
            classification,
            image,
        }
    }

    pub fn period_key(&self) -> String {
        period_key(&self.recorded_at)
    }

    pub fn date(&self) -> String {
        self.recorded_at.format("%Y-%m-%d").to_string()
    }

    pub fn time(&self) -> String {
        self.recorded_at.format("%H:%M:%S").to_string()
    }

    /// Cells in `LEDGER_COLUMNS` order.
    pub fn row(&self) -> Vec<String> {
        let c = &self.classification;
        vec![
            self.date(),
            self.time(),
            c.direction.label().to_string(),
            c.vehicle_type.label().to_string(),
            c.color.clone(),
            c.plate.clone(),
            c.tarp_status.label().to_string(),
            c.load_status.label().to_string(),
            c.load_description.clone(),
            image_formula(&self.image),
        ]
    }
}

/// Storage behind the ledger state machine.
pub trait LedgerBackend {
    /// Handle to one existing ledger.
    type Ledger: Clone + fmt::Debug;

    /// Backend identifier, for logs.
    fn name(&self) -> &'static str;

    fn find_ledger(&mut self, period_key: &str) -> Result<Option<Self::Ledger>>;

    fn create_ledger(&mut self, period_key: &str, layout: &LedgerLayout) -> Result<Self::Ledger>;

    /// Insert one row after the last row of `ledger`.
    fn append_row(&mut self, ledger: &Self::Ledger, row: &[String]) -> Result<()>;
}

/// Ledger state observed for a period before a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerState {
    NoLedgerForPeriod,
    LedgerExists,
}

/// Log stage seam used by the poll driver.
pub trait RecordSink {
    fn append(&mut self, record: &LogRecord) -> StageResult<()>;
}

/// Ledger resolution state machine over a backend.
pub struct LogSink<B: LedgerBackend> {
    backend: B,
    layout: LedgerLayout,
}

impl<B: LedgerBackend> LogSink<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            layout: MONTHLY_LAYOUT,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Find the ledger for `period_key`, creating it when absent.
    ///
    /// Returns the ledger and the state observed before resolution.
    pub fn resolve(&mut self, period_key: &str) -> Result<(B::Ledger, LedgerState)> {
        if let Some(ledger) = self.backend.find_ledger(period_key)? {
            return Ok((ledger, LedgerState::LedgerExists));
        }
        log::info!(
            "new month: creating ledger '{}' in {}",
            period_key,
            self.backend.name()
        );
        let ledger = self.backend.create_ledger(period_key, &self.layout)?;
        Ok((ledger, LedgerState::NoLedgerForPeriod))
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let (ledger, _) = self.resolve(&record.period_key())?;
        self.backend.append_row(&ledger, &record.row())
    }
}

impl<B: LedgerBackend> RecordSink for LogSink<B> {
    fn append(&mut self, record: &LogRecord) -> StageResult<()> {
        self.write(record).map_err(PipelineError::LogWrite)
    }
}

/// Either configured ledger, chosen at startup.
pub enum AnySink {
    Sheets(LogSink<SheetsLedger>),
    Sqlite(LogSink<SqliteLedger>),
}

impl RecordSink for AnySink {
    fn append(&mut self, record: &LogRecord) -> StageResult<()> {
        match self {
            AnySink::Sheets(sink) => sink.append(record),
            AnySink::Sqlite(sink) => sink.append(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Direction, LoadStatus, TarpStatus, VehicleType};
    use anyhow::anyhow;
    use chrono::TimeZone;

    #[derive(Default)]
    struct MemoryLedgers {
        ledgers: Vec<(String, Vec<Vec<String>>)>,
        creates: usize,
        fail_appends: bool,
    }

    impl MemoryLedgers {
        fn rows(&self, key: &str) -> Option<&Vec<Vec<String>>> {
            self.ledgers.iter().find(|(k, _)| k == key).map(|(_, rows)| rows)
        }
    }

    impl LedgerBackend for MemoryLedgers {
        type Ledger = usize;

        fn name(&self) -> &'static str {
            "memory"
        }

        fn find_ledger(&mut self, period_key: &str) -> Result<Option<usize>> {
            Ok(self.ledgers.iter().position(|(k, _)| k == period_key))
        }

        fn create_ledger(&mut self, period_key: &str, layout: &LedgerLayout) -> Result<usize> {
            self.creates += 1;
            let header = layout.columns.iter().map(|c| c.to_string()).collect();
            self.ledgers.push((period_key.to_string(), vec![header]));
            Ok(self.ledgers.len() - 1)
        }

        fn append_row(&mut self, ledger: &usize, row: &[String]) -> Result<()> {
            if self.fail_appends {
                return Err(anyhow!("quota exceeded"));
            }
            self.ledgers[*ledger].1.push(row.to_vec());
            Ok(())
        }
    }

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    fn record(plate: &str, recorded_at: DateTime<Local>) -> LogRecord {
        LogRecord::new(
            ClassificationResult {
                vehicle_type: VehicleType::DumpTruck,
                color: "White".to_string(),
                direction: Direction::Entering,
                plate: plate.to_string(),
                tarp_status: TarpStatus::Yes,
                load_status: LoadStatus::Unknown,
                load_description: "Covered".to_string(),
            },
            ImageReference::new("https://drive.google.com/uc?export=view&id=abc"),
            recorded_at,
        )
    }

    #[test]
    fn period_key_is_month_and_year() {
        assert_eq!(period_key(&at(2025, 3, 14, 10)), "March 2025");
        assert_eq!(period_key(&at(2024, 12, 31, 23)), "December 2024");
    }

    #[test]
    fn row_follows_column_order() {
        let r = record("ABC123", at(2025, 3, 14, 10));
        assert_eq!(
            r.row(),
            vec![
                "2025-03-14",
                "10:00:00",
                "ENTERING",
                "Dump Truck",
                "White",
                "ABC123",
                "YES",
                "Unknown",
                "Covered",
                "=IMAGE(\"https://drive.google.com/uc?export=view&id=abc\")",
            ]
        );
        assert_eq!(r.row().len(), LEDGER_COLUMNS.len());
    }

    #[test]
    fn formula_escapes_quotes() {
        let formula = image_formula(&ImageReference::new("https://x/a\"b.jpg"));
        assert_eq!(formula, "=IMAGE(\"https://x/a\"\"b.jpg\")");
    }

    #[test]
    fn resolution_is_idempotent_within_a_month() -> Result<()> {
        let mut sink = LogSink::new(MemoryLedgers::default());
        let (first, state) = sink.resolve("March 2025")?;
        assert_eq!(state, LedgerState::NoLedgerForPeriod);
        let (second, state) = sink.resolve("March 2025")?;
        assert_eq!(state, LedgerState::LedgerExists);
        assert_eq!(first, second);
        assert_eq!(sink.backend().creates, 1);
        Ok(())
    }

    #[test]
    fn appends_land_in_the_record_month() -> Result<()> {
        let mut sink = LogSink::new(MemoryLedgers::default());
        sink.append(&record("A1", at(2025, 3, 1, 8)))?;
        sink.append(&record("A2", at(2025, 3, 31, 22)))?;
        sink.append(&record("B1", at(2025, 4, 1, 6)))?;

        let backend = sink.backend();
        assert_eq!(backend.creates, 2);
        let march = backend.rows("March 2025").unwrap();
        assert_eq!(march.len(), 3);
        assert_eq!(march[0], LEDGER_COLUMNS.to_vec());
        assert_eq!(march[1][5], "A1");
        assert_eq!(march[2][5], "A2");
        let april = backend.rows("April 2025").unwrap();
        assert_eq!(april.len(), 2);
        assert_eq!(april[1][5], "B1");
        Ok(())
    }

    #[test]
    fn restart_creates_exactly_one_ledger() -> Result<()> {
        // A fresh sink over existing storage stands in for a restarted process.
        let mut sink = LogSink::new(MemoryLedgers::default());
        sink.append(&record("A1", at(2025, 2, 10, 8)))?;
        let backend = std::mem::take(&mut sink.backend);

        let mut restarted = LogSink::new(backend);
        restarted.append(&record("A2", at(2025, 3, 2, 8)))?;
        restarted.append(&record("A3", at(2025, 3, 2, 9)))?;
        assert_eq!(restarted.backend().creates, 2);
        assert_eq!(restarted.backend().ledgers.len(), 2);
        assert_eq!(restarted.backend().rows("March 2025").unwrap().len(), 3);
        Ok(())
    }

    #[test]
    fn backend_failure_is_a_log_write_error() {
        let mut sink = LogSink::new(MemoryLedgers {
            fail_appends: true,
            ..MemoryLedgers::default()
        });
        let err = sink.append(&record("A1", at(2025, 3, 1, 8))).unwrap_err();
        assert!(matches!(err, PipelineError::LogWrite(_)));
    }
}
