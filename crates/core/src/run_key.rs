//! Deterministic run keys for checkpoint matching.
//!
//! Format: `{subject}:{location parts...}:{focus}:{YYYY-MM-DD}`, e.g.
//! `kirkwood-community-college:cedar-rapids:iowa:healthcare:2026-02-24`.
//!
//! Keys have calendar-day granularity: requests for the same subject,
//! location and focus on one day share a key and its checkpoints. The next
//! day gets a fresh key.

use chrono::{NaiveDate, Utc};

/// Focus component used when none is given.
pub const DEFAULT_FOCUS: &str = "general";

/// Normalize one key component: lowercase, runs of anything other than
/// ASCII letters and digits collapsed to a single `-`, edge hyphens trimmed.
///
/// The trim means a plain `[^a-z0-9]+` to `-` substitution does not produce
/// the same keys: `"MN!"` normalizes to `"mn"` here, not `"mn-"`. Keys made
/// elsewhere with that substitution will not match checkpoints saved here.
pub fn normalize_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_hyphen = false;

    for ch in value.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    out
}

/// Build the run key for `subject` at `location_parts` with `focus` on `day`.
pub fn build_run_key(
    subject: &str,
    location_parts: &[&str],
    focus: Option<&str>,
    day: NaiveDate,
) -> String {
    let focus = focus
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_FOCUS);

    let mut parts = Vec::with_capacity(location_parts.len() + 3);
    parts.push(normalize_component(subject));
    parts.extend(location_parts.iter().map(|p| normalize_component(p)));
    parts.push(normalize_component(focus));
    parts.push(day.format("%Y-%m-%d").to_string());
    parts.join(":")
}

/// Build the run key for today (UTC).
pub fn build_run_key_today(subject: &str, location_parts: &[&str], focus: Option<&str>) -> String {
    build_run_key(subject, location_parts, focus, Utc::now().date_naive())
}
