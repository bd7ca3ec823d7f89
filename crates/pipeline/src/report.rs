//! Final report assembly and size accounting.

use wavelength_core::phases::Phase;
use wavelength_core::scoring::ProgramScore;
use wavelength_db::models::project::ValidationProject;

/// Words per printed page used for the page estimate.
const WORDS_PER_PAGE: usize = 500;

/// One phase's markdown, in pipeline order.
pub struct ReportSection<'a> {
    pub phase: Phase,
    pub markdown: &'a str,
}

/// Assemble the report: header, scorecard, synthesis, then each dimension
/// phase in pipeline order.
pub fn compile_report(
    project: &ValidationProject,
    sections: &[ReportSection<'_>],
    score: &ProgramScore,
) -> String {
    let mut out = String::new();
    out.push_str("# Workforce Program Validation Report\n\n");
    out.push_str(&format!(
        "**Program:** {}  \n**Institution:** {}  \n",
        project.program_name.as_deref().unwrap_or("Unnamed program"),
        project.institution_name
    ));
    out.push_str(&format!(
        "**Composite Score:** {:.1}/10  \n**Recommendation:** {}\n\n",
        score.composite_score, score.recommendation
    ));

    if let Some(reason) = &score.override_reason {
        out.push_str(&format!("> Override applied: {reason}\n\n"));
    }
    if !score.conditions.is_empty() {
        out.push_str("## Conditions\n\n");
        for condition in &score.conditions {
            out.push_str(&format!("- {condition}\n"));
        }
        out.push('\n');
    }

    out.push_str("## Scorecard\n\n| Dimension | Score | Weight |\n|---|---|---|\n");
    for d in &score.dimensions {
        out.push_str(&format!("| {} | {:.1} | {:.0}% |\n", d.dimension, d.score, d.weight * 100.0));
    }

    let synthesis = sections.iter().find(|s| s.phase == Phase::Synthesis);
    let body = synthesis
        .into_iter()
        .chain(sections.iter().filter(|s| s.phase != Phase::Synthesis))
        .map(|s| s.markdown.trim())
        .filter(|m| !m.is_empty());

    for markdown in body {
        out.push_str("\n---\n\n");
        out.push_str(markdown);
        out.push('\n');
    }

    out
}

/// Estimated printed pages, at least one.
pub fn estimate_page_count(markdown: &str) -> i32 {
    let words = markdown.split_whitespace().count();
    words.div_ceil(WORDS_PER_PAGE).max(1) as i32
}

/// Size in kilobytes, rounded to two decimals.
pub fn size_kb(markdown: &str) -> f64 {
    let kb = markdown.len() as f64 / 1024.0;
    (kb * 100.0).round() / 100.0
}
