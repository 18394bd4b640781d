//! Poll driver.
//!
//! One iteration: capture → classify → filter → archive → log. Iterations
//! start on a fixed cadence measured from the previous start, so a slow
//! iteration delays the next poll without shifting the schedule further.
//! A failure in any stage ends that iteration only.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Local;

use crate::archive::Archiver;
use crate::classify::{ClassificationResult, Classifier};
use crate::error::StageResult;
use crate::filter::is_reportable;
use crate::ingest::FrameSource;
use crate::ledger::{LogRecord, RecordSink};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Longest single sleep, so a stop request is noticed promptly.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(200);

/// What a completed iteration did.
#[derive(Debug)]
pub enum IterationOutcome {
    /// Classified as not-a-vehicle; nothing archived or logged.
    Discarded(ClassificationResult),
    /// Archived and appended to the ledger.
    Logged(LogRecord),
}

/// Running totals since start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollStats {
    pub polls: u64,
    pub logged: u64,
    pub discarded: u64,
    pub failed: u64,
}

pub struct PollDriver<S, C, A, L> {
    source: S,
    classifier: C,
    archiver: A,
    sink: L,
    interval: Duration,
    stats: PollStats,
    /// Progress dots printed since the last newline.
    dot_line_open: bool,
}

impl<S, C, A, L> PollDriver<S, C, A, L>
where
    S: FrameSource,
    C: Classifier,
    A: Archiver,
    L: RecordSink,
{
    pub fn new(source: S, classifier: C, archiver: A, sink: L) -> Self {
        Self {
            source,
            classifier,
            archiver,
            sink,
            interval: DEFAULT_POLL_INTERVAL,
            stats: PollStats::default(),
            dot_line_open: false,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn archiver(&self) -> &A {
        &self.archiver
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    /// Run one pipeline iteration. The frame is dropped on return whatever
    /// the outcome.
    pub fn run_once(&mut self) -> StageResult<IterationOutcome> {
        let frame = self.source.capture()?;
        let result = self.classifier.classify(&frame)?;
        if !is_reportable(&result) {
            return Ok(IterationOutcome::Discarded(result));
        }
        // Archive before logging: a row is only written once its image exists.
        let image = self.archiver.archive(&frame, &result)?;
        let record = LogRecord::new(result, image, Local::now());
        self.sink.append(&record)?;
        Ok(IterationOutcome::Logged(record))
    }

    /// Run one iteration, update counters and report the outcome.
    pub fn poll(&mut self) -> Option<IterationOutcome> {
        self.stats.polls += 1;
        let outcome = match self.run_once() {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.failed += 1;
                self.close_dot_line();
                log::warn!("poll #{} aborted at {}: {}", self.stats.polls, e.stage(), e);
                return None;
            }
        };
        match &outcome {
            IterationOutcome::Discarded(result) => {
                self.stats.discarded += 1;
                log::debug!("poll #{}: discarded {:?}", self.stats.polls, result.vehicle_type);
                print!(".");
                let _ = std::io::stdout().flush();
                self.dot_line_open = true;
            }
            IterationOutcome::Logged(record) => {
                self.stats.logged += 1;
                self.close_dot_line();
                let c = &record.classification;
                log::info!(
                    "DETECTED: {} | {} | {} | plate {} -> {}",
                    c.vehicle_type,
                    c.direction,
                    c.color,
                    c.plate,
                    record.period_key()
                );
            }
        }
        log::debug!("totals: {:?}", self.stats);
        Some(outcome)
    }

    /// End a run of progress dots so the next log line starts clean.
    fn close_dot_line(&mut self) {
        if self.dot_line_open {
            println!();
            self.dot_line_open = false;
        }
    }

    /// Poll until `stop` is set. The flag is checked between iterations; an
    /// iteration in flight always runs to completion.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!(
            "watching; classifier={} interval={}s",
            self.classifier.name(),
            self.interval.as_secs_f64()
        );
        while !stop.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.poll();
            sleep_until(started + self.interval, stop);
        }
        log::info!(
            "stopped after {} polls ({} logged, {} discarded, {} failed)",
            self.stats.polls,
            self.stats.logged,
            self.stats.discarded,
            self.stats.failed
        );
    }
}

fn sleep_until(deadline: Instant, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(STOP_CHECK_SLICE));
    }
}
