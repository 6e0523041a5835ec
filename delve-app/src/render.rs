use delve_common::ResearchReport;
use std::fmt::Write;

pub const SUMMARY_TITLE: &str = "Research Summary";

/// Human-readable report: one block per step, then the summary.
pub fn report_text(report: &ResearchReport) -> String {
    let mut out = String::new();
    for step in &report.steps {
        let _ = writeln!(out, "== {} ==", step.title);
        let _ = writeln!(out, "{}", step.content);
        if !step.sources.is_empty() {
            let _ = writeln!(out, "\nSources:");
            for (i, source) in step.sources.iter().enumerate() {
                let _ = writeln!(out, "  {}. {} <{}>", i + 1, source.title, source.url);
            }
        }
        out.push('\n');
    }
    let _ = writeln!(out, "== {SUMMARY_TITLE} ==");
    let _ = writeln!(out, "{}", report.summary);
    out
}

pub fn report_json(report: &ResearchReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
