//! Model reply parsing.
//!
//! The model is told to answer with one JSON object and nothing else. In
//! practice it sometimes wraps the object in a markdown code fence, so the
//! known fence tokens are removed before parsing. Anything else around the
//! object is a parse failure.

use anyhow::{anyhow, Context, Result};

use super::result::ClassificationResult;

/// Wrapper tokens stripped from the reply, longest first.
const FENCE_TOKENS: &[&str] = &["```json", "```JSON", "```"];

/// Fixed instruction sent with every frame.
pub const CLASSIFICATION_PROMPT: &str = r#"Analyze this quarry vehicle. Return JSON only:
1. "vehicle_type": "Dump Truck", "Pickup", "Car", "Motorcycle", "Other".
2. "color": Dominant color (or "Unknown" if B&W).
3. "direction": "ENTERING" (facing camera) or "EXITING" (facing away).
4. "plate": License Text (Use "?" for obscured).
5. "tarp_status": "YES", "NO", "PARTIAL", "N/A".
6. "load_status": "Loaded", "Empty", "Unknown".
7. "load_desc": If visible, describe material (e.g. "Blue Rocks"). If Tarp is YES, say "Covered".
Use "Other" for empty roads, shadows, foliage or anything that is not a vehicle."#;

/// Remove markdown fence tokens and surrounding whitespace.
pub fn strip_fences(reply: &str) -> String {
    let mut text = reply.to_string();
    for token in FENCE_TOKENS {
        text = text.replace(token, "");
    }
    text.trim().to_string()
}

/// Parse the model's reply text into a classification.
pub fn parse_reply(reply: &str) -> Result<ClassificationResult> {
    let body = strip_fences(reply);
    if body.is_empty() {
        return Err(anyhow!("model reply is empty"));
    }
    let value: serde_json::Value =
        serde_json::from_str(&body).context("model reply is not valid JSON")?;
    if !value.is_object() {
        return Err(anyhow!("model reply is not a JSON object"));
    }
    let result: ClassificationResult =
        serde_json::from_value(value).context("model reply does not match the schema")?;
    Ok(result.normalized())
}
