// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

pub mod config_builder;

pub use config_builder::ConfigBuilder;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified name of the type whose instances open an allocation-free scope
pub const DEFAULT_SAFE_SCOPE_TYPE: &str = "HotPath.AllocationFreeScope";

/// File name looked up inside the project's configuration directory
pub const DEFAULT_ALLOWLIST_FILE_NAME: &str = "allowlist.txt";

/// How deep override/implementation chains may go before resolution gives up
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Severity {
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Replaces the default severity of a single diagnostic code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleOverride {
    pub code: String,
    pub severity: Severity,
}

/// Everything a user can tune about an analysis session. Stored as RON in
/// `hotpath.ron`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Marker type for allocation-free scopes, as `Namespace.Name`
    pub safe_scope_type: String,
    /// Signatures allowed in addition to whatever the allowlist file provides
    pub allowlist: Vec<String>,
    pub allowlist_file_name: String,
    pub max_resolution_depth: usize,
    /// Visit restricted members on the rayon pool
    pub parallel: bool,
    pub rules: Vec<RuleOverride>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            safe_scope_type: DEFAULT_SAFE_SCOPE_TYPE.to_string(),
            allowlist: Vec::new(),
            allowlist_file_name: DEFAULT_ALLOWLIST_FILE_NAME.to_string(),
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            parallel: true,
            rules: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Severity configured for `code`, if the user overrode it. The last
    /// override for a code wins.
    pub fn severity_for(&self, code: &str) -> Option<Severity> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.code == code)
            .map(|rule| rule.severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.safe_scope_type, DEFAULT_SAFE_SCOPE_TYPE);
        assert_eq!(config.allowlist_file_name, "allowlist.txt");
        assert_eq!(config.max_resolution_depth, 64);
        assert!(config.allowlist.is_empty());
        assert!(config.parallel);
    }

    #[test]
    fn test_severity_for_uses_last_override() {
        let config = AnalyzerConfig {
            rules: vec![
                RuleOverride {
                    code: "HAA0702".into(),
                    severity: Severity::Error,
                },
                RuleOverride {
                    code: "HAA0702".into(),
                    severity: Severity::Warn,
                },
            ],
            ..AnalyzerConfig::default()
        };
        assert_eq!(config.severity_for("HAA0702"), Some(Severity::Warn));
        assert_eq!(config.severity_for("HAA0701"), None);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: AnalyzerConfig = ron::from_str("(parallel: false)").unwrap();
        assert!(!config.parallel);
        assert_eq!(config.safe_scope_type, DEFAULT_SAFE_SCOPE_TYPE);
    }
}
