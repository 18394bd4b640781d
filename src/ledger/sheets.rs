//! Google Sheets ledger backend.
//!
//! Each month is one worksheet inside a fixed spreadsheet. New worksheets go
//! in front so the current month opens first.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::{LedgerBackend, LedgerLayout};
use crate::google::{bearer, request_error, TokenProvider};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// API root; overridden in tests.
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// One worksheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetRef {
    pub sheet_id: i64,
    pub title: String,
}

impl SheetRef {
    /// A1 anchor for the worksheet, quoted for titles with spaces.
    fn a1_anchor(&self) -> String {
        format!("'{}'!A1", self.title.replace('\'', "''"))
    }
}

pub struct SheetsLedger {
    config: SheetsConfig,
    auth: Arc<dyn TokenProvider>,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(rename = "sheetId")]
    sheet_id: i64,
    title: String,
}

/// Worksheet id for a period, stable across restarts.
///
/// Chosen here rather than by the API so the new worksheet can be created and
/// formatted in one batchUpdate, which the API applies all or nothing.
fn sheet_id_for(period_key: &str) -> i64 {
    let digest = Sha256::digest(period_key.as_bytes());
    let id = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) & 0x7fff_ffff;
    i64::from(id)
}

impl SheetsLedger {
    pub fn new(config: SheetsConfig, auth: Arc<dyn TokenProvider>) -> Result<Self> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(anyhow!("spreadsheet id is empty"));
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            config,
            auth,
            agent,
        })
    }

    /// `{api_base}/v4/spreadsheets/{id}/{extra...}` with each segment escaped.
    fn spreadsheet_url(&self, extra: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_base).context("parse sheets api base")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets api base cannot carry a path"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.config.spreadsheet_id.as_str()])
            .extend(extra);
        Ok(url)
    }

    fn batch_update(&self, token: &str, requests: serde_json::Value) -> Result<()> {
        let mut url = self.spreadsheet_url(&[])?;
        // ":batchUpdate" is a suffix of the spreadsheet id segment.
        let path = format!("{}:batchUpdate", url.path());
        url.set_path(&path);
        self.agent
            .request_url("POST", &url)
            .set("Authorization", &bearer(token))
            .send_json(json!({ "requests": requests }))
            .map_err(|e| request_error("sheets batchUpdate", e))?;
        Ok(())
    }
}

impl LedgerBackend for SheetsLedger {
    type Ledger = SheetRef;

    fn name(&self) -> &'static str {
        "google-sheets"
    }

    fn find_ledger(&mut self, period_key: &str) -> Result<Option<SheetRef>> {
        let token = self.auth.access_token()?;
        let url = self.spreadsheet_url(&[])?;
        let meta: SpreadsheetMeta = self
            .agent
            .request_url("GET", &url)
            .query("fields", "sheets.properties(sheetId,title)")
            .set("Authorization", &bearer(&token))
            .call()
            .map_err(|e| request_error("sheets metadata", e))?
            .into_json()
            .context("decode spreadsheet metadata")?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|entry| entry.properties)
            .find(|props| props.title == period_key)
            .map(|props| SheetRef {
                sheet_id: props.sheet_id,
                title: props.title,
            }))
    }

    fn create_ledger(&mut self, period_key: &str, layout: &LedgerLayout) -> Result<SheetRef> {
        let token = self.auth.access_token()?;
        let sheet_id = sheet_id_for(period_key);
        let header: Vec<serde_json::Value> = layout
            .columns
            .iter()
            .map(|name| json!({ "userEnteredValue": { "stringValue": name } }))
            .collect();
        self.batch_update(
            &token,
            json!([
                {
                    "addSheet": {
                        "properties": {
                            "sheetId": sheet_id,
                            "title": period_key,
                            "index": 0,
                            "gridProperties": {
                                "rowCount": layout.initial_rows,
                                "columnCount": layout.columns.len(),
                                "frozenRowCount": layout.frozen_rows,
                            }
                        }
                    }
                },
                {
                    "appendCells": {
                        "sheetId": sheet_id,
                        "rows": [{ "values": header }],
                        "fields": "userEnteredValue",
                    }
                },
                {
                    "updateDimensionProperties": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "COLUMNS",
                            "startIndex": layout.image_column,
                            "endIndex": layout.image_column + 1,
                        },
                        "properties": { "pixelSize": layout.image_column_width_px },
                        "fields": "pixelSize",
                    }
                }
            ]),
        )
        .with_context(|| format!("create worksheet '{}'", period_key))?;

        Ok(SheetRef {
            sheet_id,
            title: period_key.to_string(),
        })
    }

    fn append_row(&mut self, ledger: &SheetRef, row: &[String]) -> Result<()> {
        let token = self.auth.access_token()?;
        let append = format!("{}:append", ledger.a1_anchor());
        let url = self.spreadsheet_url(&["values", append.as_str()])?;
        self.agent
            .request_url("POST", &url)
            .query("valueInputOption", "USER_ENTERED")
            .query("insertDataOption", "INSERT_ROWS")
            .set("Authorization", &bearer(&token))
            .send_json(json!({ "majorDimension": "ROWS", "values": [row] }))
            .map_err(|e| request_error("sheets append", e))?;
        Ok(())
    }
}
