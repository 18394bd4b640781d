//! ledger_verify - offline integrity check for the SQLite traffic ledger
//!
//! Lists every monthly ledger in the database and recomputes each row's
//! hash chain. An edited, reordered or deleted row fails verification.

use anyhow::{anyhow, Result};
use clap::Parser;
use rusqlite::{Connection, OpenFlags};

use quarry_watch::ledger::sqlite::{list_ledgers, verify_ledger_with};

#[derive(Parser, Debug)]
#[command(
    name = "ledger_verify",
    about = "Verify quarry ledger integrity (per-month hash chains)"
)]
struct Args {
    /// Path to the ledger SQLite DB
    #[arg(long, default_value = "quarry_ledger.db", env = "QUARRY_LEDGER_DB")]
    db: String,

    /// Only verify this period, e.g. "March 2025"
    #[arg(long, value_name = "PERIOD")]
    period: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let conn = Connection::open_with_flags(&args.db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    println!("ledger_verify: checking {}", args.db);
    println!();

    let ledgers = list_ledgers(&conn)?;
    let selected: Vec<_> = match args.period.as_deref() {
        Some(period) => ledgers
            .into_iter()
            .filter(|ledger| ledger.period_key == period)
            .collect(),
        None => ledgers,
    };
    if selected.is_empty() {
        return match args.period {
            Some(period) => Err(anyhow!("no ledger for period '{}'", period)),
            None => {
                println!("no ledgers recorded yet");
                Ok(())
            }
        };
    }

    let mut total = 0u64;
    for ledger in &selected {
        println!("=== {} ===", ledger.period_key);
        if args.verbose {
            println!("  columns: {}", ledger.columns.join(", "));
        }
        let count = verify_ledger_with(&conn, &ledger.period_key, |id, entry_hash| {
            if args.verbose {
                println!("  row {}: hash={} OK", id, &hex::encode(entry_hash)[..16]);
            }
        })?;
        println!("verified {} rows", count);
        total += count;
    }

    println!();
    println!(
        "OK: {} ledgers, {} rows verified.",
        selected.len(),
        total
    );
    Ok(())
}
