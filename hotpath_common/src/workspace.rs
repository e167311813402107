// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use cargo_metadata::MetadataCommand;
use std::path::PathBuf;

/// Name of the analyzer configuration file at the workspace root
pub const CONFIG_FILE_NAME: &str = "hotpath.ron";

/// Find hotpath.ron in workspace root using cargo metadata
pub fn find_workspace_config() -> Option<PathBuf> {
    let metadata = MetadataCommand::new().no_deps().exec().ok()?;
    let config = metadata.workspace_root.join(CONFIG_FILE_NAME);
    if config.exists() {
        Some(config.into_std_path_buf())
    } else {
        None
    }
}
