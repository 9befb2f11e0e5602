//! Human-readable output for `diagnose --pretty` and `check`.
//!
//! Renders a diagnosis as a vertical card grouped into sections, in the
//! order an agronomist reads it: what it is, what it looks like, what it
//! costs, what to do.

use std::fmt::Write;

use leafdx_ai::{LabelSet, ModelConfig, PredictionResult};
use leafdx_core::{Citation, Coverage};

const LABEL_WIDTH: usize = 14;

// ── Public API ──

pub fn print_diagnosis_card(result: &PredictionResult) {
    print!("{}", render_diagnosis_card(result));
}

pub fn print_check_report(
    config: &ModelConfig,
    labels: &LabelSet,
    advisories: usize,
    coverage: &Coverage,
) {
    print!("{}", render_check_report(config, labels, advisories, coverage));
}

// ── Rendering ──

fn render_diagnosis_card(result: &PredictionResult) -> String {
    let mut out = String::new();
    let advisory = &result.advisory;

    let _ = writeln!(out, "=== {} ===", result.label);
    let _ = writeln!(
        out,
        "  {:<LABEL_WIDTH$} {:.2}%",
        "confidence", result.confidence_percent
    );
    let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "class index", result.index);
    if !result.curated {
        let _ = writeln!(out, "  (no curated advisory for this label; showing general guidance)");
    }
    out.push('\n');

    list_section(&mut out, "Symptoms", &advisory.symptoms);

    let _ = writeln!(out, "Impact");
    let _ = writeln!(out, "  {}", advisory.impact);
    out.push('\n');

    numbered_section(&mut out, "Management", &advisory.management);
    citation_section(&mut out, &advisory.citations);
    out
}

fn render_check_report(
    config: &ModelConfig,
    labels: &LabelSet,
    advisories: usize,
    coverage: &Coverage,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Model");
    let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "path", config.model_path.display());
    let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "labels", config.labels_path.display());
    let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "layout", config.layout);
    let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "classes", labels.len());
    out.push('\n');

    let source = config
        .advisories_path
        .as_ref()
        .map_or_else(|| "built-in".to_string(), |p| p.display().to_string());
    let _ = writeln!(out, "Advisories");
    let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "source", source);
    let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "records", advisories);
    out.push('\n');

    if coverage.is_complete() && coverage.unused.is_empty() {
        let _ = writeln!(out, "Coverage: every label has a curated advisory");
        return out;
    }
    if !coverage.missing.is_empty() {
        list_section(&mut out, "Labels without an advisory (fallback served)", &coverage.missing);
    }
    if !coverage.unused.is_empty() {
        list_section(&mut out, "Advisories with no matching label", &coverage.unused);
    }
    out
}

fn list_section(out: &mut String, header: &str, items: &[String]) {
    let _ = writeln!(out, "{header}");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
    out.push('\n');
}

fn numbered_section(out: &mut String, header: &str, items: &[String]) {
    let _ = writeln!(out, "{header}");
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "  {}. {item}", i + 1);
    }
    out.push('\n');
}

fn citation_section(out: &mut String, citations: &[Citation]) {
    let _ = writeln!(out, "Sources");
    for c in citations {
        let _ = writeln!(out, "  - {} ({})", c.title, c.source);
    }
}
