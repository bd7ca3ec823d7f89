//! Occupation and location heuristics for shared pipeline context.

use std::sync::LazyLock;

use regex::Regex;

/// Location used when a project has no geographic area.
pub const DEFAULT_LOCATION: &str = "United States";

/// Credential words dropped from a program name to get an occupation.
static CREDENTIAL_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\b(certificate|diploma|degree|program|associate|bachelor|training|course)\b")
        .expect("valid regex")
});

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Target occupation: the explicit field when set, else the program name
/// with credential words removed.
pub fn derive_occupation(target_occupation: Option<&str>, program_name: Option<&str>) -> String {
    if let Some(explicit) = non_blank(target_occupation) {
        return explicit.to_string();
    }
    let name = program_name.unwrap_or_default();
    CREDENTIAL_WORD_RE.replace_all(name, "").trim().to_string()
}

pub fn derive_location(geographic_area: Option<&str>) -> String {
    non_blank(geographic_area)
        .unwrap_or(DEFAULT_LOCATION)
        .to_string()
}
