// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use hotpath_lint_config::{AnalyzerConfig, Severity};
use serde::Serialize;
use tracing::trace;

use crate::allowlist::{AllowlistState, AllowlistStore};
use crate::graph::{Location, NodeId, SyntaxNode};

/// Static description of one diagnostic the engine can raise
#[derive(Debug, PartialEq, Eq)]
pub struct RuleDescriptor {
    pub code: &'static str,
    pub title: &'static str,
    /// Message with a single `{0}` slot for contextual detail
    pub message_format: &'static str,
    pub category: &'static str,
    pub default_severity: Severity,
}

impl RuleDescriptor {
    pub fn message(&self, detail: &str) -> String {
        self.message_format.replace("{0}", detail)
    }
}

pub static UNSAFE_METHOD_CALL: RuleDescriptor = RuleDescriptor {
    code: "HAA0701",
    title: "Unsafe method call",
    message_format: "All method calls from here should be marked as Restricted or allowlisted {0}",
    category: "Performance",
    default_severity: Severity::Error,
};

pub static UNSAFE_PROPERTY_ACCESS: RuleDescriptor = RuleDescriptor {
    code: "HAA0702",
    title: "Unsafe property access",
    message_format: "All property accesses from here should be marked as Restricted or allowlisted {0}",
    category: "Performance",
    default_severity: Severity::Error,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub title: String,
    pub category: String,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    pub node: NodeId,
    pub signature: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {}\n  --> {}",
            self.severity, self.code, self.message, self.location
        )
    }
}

/// Detail text for a violation. Only there to help whoever reads the
/// diagnostic work out why the allowlist didn't cover it.
pub fn violation_detail(node_text: &str, signature: &str, state: &AllowlistState) -> String {
    match state {
        AllowlistState::NotLocated => "(no allowlist found)".to_string(),
        AllowlistState::Invalid(path) => {
            format!("(allowlist path is invalid: '{}')", path.display())
        }
        AllowlistState::Empty(path) => {
            format!("(allowlist is empty at path: '{}')", path.display())
        }
        AllowlistState::Loaded(_) => format!("({node_text} / {signature})"),
    }
}

///
/// Collects diagnostics for one analysis session.
///
/// Emission is append-only: reporting the same node twice yields two
/// diagnostics. Deduplication is up to the host.
///
#[derive(Debug, Default)]
pub struct DiagnosticEmitter {
    sink: Mutex<Vec<Diagnostic>>,
    severities: HashMap<String, Severity>,
}

impl DiagnosticEmitter {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let severities = config
            .rules
            .iter()
            .map(|rule| (rule.code.clone(), rule.severity))
            .collect();
        Self {
            sink: Mutex::new(Vec::new()),
            severities,
        }
    }

    pub fn severity_of(&self, rule: &RuleDescriptor) -> Severity {
        self.severities
            .get(rule.code)
            .copied()
            .unwrap_or(rule.default_severity)
    }

    pub fn report(
        &self,
        node: &SyntaxNode,
        signature: &str,
        rule: &RuleDescriptor,
        allowlist: &AllowlistStore,
    ) {
        let detail = violation_detail(&node.text, signature, &allowlist.state());
        let diagnostic = Diagnostic {
            code: rule.code.to_string(),
            title: rule.title.to_string(),
            category: rule.category.to_string(),
            severity: self.severity_of(rule),
            message: rule.message(&detail),
            location: node.location.clone(),
            node: node.id,
            signature: signature.to_string(),
        };

        trace!(
            target: "hotpath::events",
            file = %node.location.file.display(),
            code = rule.code,
            "possibly allocating call"
        );

        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes everything reported so far, leaving the emitter empty
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.sink.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SyntaxKind;
    use hotpath_lint_config::RuleOverride;
    use std::path::PathBuf;

    fn node() -> SyntaxNode {
        SyntaxNode {
            id: NodeId(3),
            kind: SyntaxKind::Invocation,
            parent: None,
            children: vec![],
            symbol: None,
            text: "str.Trim()".into(),
            location: Location {
                file: PathBuf::from("src/Hot.cs"),
                line: 12,
                column: 9,
            },
        }
    }

    #[test]
    fn test_detail_reflects_allowlist_state() {
        let path = PathBuf::from("/repo/.hotpath/allowlist.txt");
        assert_eq!(
            violation_detail("x", "y", &AllowlistState::NotLocated),
            "(no allowlist found)"
        );
        assert_eq!(
            violation_detail("x", "y", &AllowlistState::Invalid(path.clone())),
            "(allowlist path is invalid: '/repo/.hotpath/allowlist.txt')"
        );
        assert_eq!(
            violation_detail("x", "y", &AllowlistState::Empty(path.clone())),
            "(allowlist is empty at path: '/repo/.hotpath/allowlist.txt')"
        );
        assert_eq!(
            violation_detail("str.Trim()", "string.Trim", &AllowlistState::Loaded(path)),
            "(str.Trim() / string.Trim)"
        );
    }

    #[test]
    fn test_report_is_append_only() {
        let emitter = DiagnosticEmitter::new(&AnalyzerConfig::default());
        let allowlist = AllowlistStore::new();
        let node = node();

        emitter.report(&node, "string.Trim", &UNSAFE_METHOD_CALL, &allowlist);
        emitter.report(&node, "string.Trim", &UNSAFE_METHOD_CALL, &allowlist);
        assert_eq!(emitter.len(), 2);

        let diagnostics = emitter.take();
        assert!(emitter.is_empty());
        assert_eq!(diagnostics[0], diagnostics[1]);
        assert_eq!(diagnostics[0].code, "HAA0701");
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(
            diagnostics[0].message,
            "All method calls from here should be marked as Restricted or allowlisted (no allowlist found)"
        );
    }

    #[test]
    fn test_severity_override() {
        let config = AnalyzerConfig {
            rules: vec![RuleOverride {
                code: "HAA0702".into(),
                severity: Severity::Warn,
            }],
            ..AnalyzerConfig::default()
        };
        let emitter = DiagnosticEmitter::new(&config);
        assert_eq!(emitter.severity_of(&UNSAFE_PROPERTY_ACCESS), Severity::Warn);
        assert_eq!(emitter.severity_of(&UNSAFE_METHOD_CALL), Severity::Error);
    }

    #[test]
    fn test_display() {
        let emitter = DiagnosticEmitter::new(&AnalyzerConfig::default());
        emitter.report(&node(), "string.Length", &UNSAFE_PROPERTY_ACCESS, &AllowlistStore::new());
        let rendered = emitter.take()[0].to_string();
        assert!(rendered.starts_with("error[HAA0702]: All property accesses"));
        assert!(rendered.ends_with("--> src/Hot.cs:12:9"));
    }
}
