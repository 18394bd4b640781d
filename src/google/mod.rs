//! Google REST plumbing shared by the Drive archive and the Sheets ledger.

pub mod auth;

pub use auth::{
    ServiceAccountAuth, ServiceAccountKey, StaticToken, TokenProvider, SCOPE_DRIVE,
    SCOPE_SPREADSHEETS,
};

use anyhow::anyhow;

/// Error bodies are truncated to this many characters in messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Turn a failed ureq call into an error that names the operation.
pub(crate) fn request_error(operation: &str, err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let detail: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            anyhow!("{} failed with http status {}: {}", operation, code, detail)
        }
        other => anyhow::Error::new(other).context(format!("{} unreachable", operation)),
    }
}

/// `Authorization` header value for a bearer token.
pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
