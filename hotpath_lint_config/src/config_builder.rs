// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use ron::de::from_reader;
use ron::ser::{PrettyConfig, to_writer_pretty};

use crate::{AnalyzerConfig, RuleOverride, Severity};

/// Fluent construction of an [`AnalyzerConfig`], plus reading and writing it
/// as RON.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: AnalyzerConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn safe_scope_type(mut self, type_name: impl Into<String>) -> Self {
        self.config.safe_scope_type = type_name.into();
        self
    }

    pub fn allow(mut self, signature: impl Into<String>) -> Self {
        self.config.allowlist.push(signature.into());
        self
    }

    pub fn allowlist_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.allowlist_file_name = name.into();
        self
    }

    pub fn max_resolution_depth(mut self, depth: usize) -> Self {
        self.config.max_resolution_depth = depth;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn with_severity(mut self, code: impl Into<String>, severity: Severity) -> Self {
        self.config.rules.push(RuleOverride {
            code: code.into(),
            severity,
        });
        self
    }

    pub fn build(self) -> AnalyzerConfig {
        self.config
    }

    // Method to write the configuration to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        to_writer_pretty(file, &self.config, PrettyConfig::default()).map_err(io::Error::other)?;
        Ok(())
    }

    /// Like [`ConfigBuilder::write_to_file`], but refuses to replace an
    /// existing file.
    pub fn write_new_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("Refusing to overwrite {}", path.display()))?;
        to_writer_pretty(file, &self.config, PrettyConfig::default())
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        Ok(())
    }

    // Method to read the configuration from a file
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let config: AnalyzerConfig = from_reader(file).map_err(io::Error::other)?;
        Ok(ConfigBuilder { config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_builder_collects_settings() {
        let config = ConfigBuilder::new()
            .safe_scope_type("Pools.ArenaScope")
            .allow("string.Length")
            .allow("System.Array.Length")
            .max_resolution_depth(8)
            .parallel(false)
            .with_severity("HAA0702", Severity::Warn)
            .build();

        assert_eq!(config.safe_scope_type, "Pools.ArenaScope");
        assert_eq!(config.allowlist, vec!["string.Length", "System.Array.Length"]);
        assert_eq!(config.max_resolution_depth, 8);
        assert!(!config.parallel);
        assert_eq!(config.severity_for("HAA0702"), Some(Severity::Warn));
    }

    #[test]
    fn test_write_then_read() {
        let builder = ConfigBuilder::new()
            .allow("System.Nullable<T>.Value")
            .with_severity("HAA0701", Severity::Warn);

        let temp_file = NamedTempFile::new().unwrap();
        builder.write_to_file(temp_file.path()).unwrap();

        let loaded = ConfigBuilder::read_from_file(temp_file.path()).unwrap().build();
        assert_eq!(loaded, builder.build());
    }

    #[test]
    fn test_read_rejects_garbage() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "this is not ron {").unwrap();
        assert!(ConfigBuilder::read_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_write_new_file_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hotpath.ron");

        ConfigBuilder::new().write_new_file(&path).unwrap();
        assert!(path.exists());

        let second = ConfigBuilder::new().allow("string.Length").write_new_file(&path);
        assert!(second.is_err());

        // The original content is untouched
        let loaded = ConfigBuilder::read_from_file(&path).unwrap().build();
        assert!(loaded.allowlist.is_empty());
    }
}
