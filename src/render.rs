// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use ansi_term::Colour::{Blue, Cyan, Green, Red, Yellow};
use ansi_term::Style;
use hotpath_lint_config::Severity;
use hotpath_lint_impl::graph::MemberSymbol;
use hotpath_lint_impl::{AnalysisReport, Diagnostic};
use std::fmt::Write;

fn render_diagnostic(out: &mut String, diagnostic: &Diagnostic) {
    let label = match diagnostic.severity {
        Severity::Error => Red.bold().paint(format!("error[{}]", diagnostic.code)),
        Severity::Warn => Yellow.bold().paint(format!("warning[{}]", diagnostic.code)),
    };
    let _ = writeln!(
        out,
        "{}: {}",
        label,
        Style::new().bold().paint(&diagnostic.message)
    );
    let _ = writeln!(out, "  {} {}", Blue.bold().paint("-->"), diagnostic.location);
    let _ = writeln!(
        out,
        "   {} {}: {}",
        Blue.bold().paint("="),
        diagnostic.title,
        diagnostic.signature
    );
    out.push('\n');
}

/// Renders a finished run the way cargo renders compiler output
pub fn render_report(report: &AnalysisReport) -> String {
    let mut out = String::new();

    for diagnostic in &report.diagnostics {
        render_diagnostic(&mut out, diagnostic);
    }

    for error in &report.internal_errors {
        let _ = writeln!(out, "{}: {}", Red.bold().paint("internal error"), error);
    }

    let errors = report
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = report.diagnostics.len() - errors;

    let summary = format!(
        "{} restricted member(s), {} node(s) checked: {} error(s), {} warning(s)",
        report.restricted_bodies, report.nodes_visited, errors, warnings
    );
    if report.has_errors() {
        let _ = writeln!(out, "{}", Red.bold().paint(summary));
    } else {
        let _ = writeln!(out, "{}", Green.bold().paint(summary));
    }
    out
}

/// Lists restricted members, one per line, with their signature
pub fn render_restricted(members: &[&MemberSymbol]) -> String {
    let mut out = String::new();
    if members.is_empty() {
        let _ = writeln!(out, "{}", Yellow.paint("No restricted members found."));
        return out;
    }

    let _ = writeln!(
        out,
        "{}",
        Style::new()
            .bold()
            .paint(format!("Restricted members ({})", members.len()))
    );
    for member in members {
        let _ = writeln!(out, "  {} {}", Cyan.paint("•"), member.signature);
    }
    out
}
