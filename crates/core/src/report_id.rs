//! Human-readable report identifiers: `WV-{MODEL}-{YYYYMMDD}-{SEQ}`.
//!
//! The sequence number is the count of existing reports sharing the prefix
//! plus one; the repository supplies that count.

use chrono::NaiveDate;

/// Short codes for known models. Unknown models use their first three
/// characters upper-cased.
const MODEL_CODES: &[(&str, &str)] = &[
    ("claude-sonnet-4-6", "S46"),
    ("claude-opus-4-6", "O46"),
    ("claude-sonnet-4-5", "S45"),
    ("claude-haiku-4-5", "H45"),
];

pub fn model_code(model: &str) -> String {
    MODEL_CODES
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| model.chars().take(3).collect::<String>().to_uppercase())
}

/// Prefix shared by every report for `model` on `day`, e.g. `WV-S46-20260224-`.
pub fn report_id_prefix(model: &str, day: NaiveDate) -> String {
    format!("WV-{}-{}-", model_code(model), day.format("%Y%m%d"))
}

/// Full report id given how many reports already use the prefix.
pub fn build_report_id(model: &str, day: NaiveDate, existing: i64) -> String {
    format!("{}{:03}", report_id_prefix(model, day), existing.max(0) + 1)
}
