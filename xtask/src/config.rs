//! Configuration loading from workspace metadata.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// `[workspace.metadata.ksync]` from the root Cargo.toml.
#[derive(Debug, Deserialize)]
struct KsyncMetadata {
    /// Bare-metal targets that `cargo xtask check` cross-compiles for.
    #[serde(rename = "check-targets", default)]
    check_targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceConfig {
    workspace: WorkspaceSection,
}

#[derive(Debug, Deserialize)]
struct WorkspaceSection {
    metadata: Option<MetadataSection>,
}

#[derive(Debug, Deserialize)]
struct MetadataSection {
    ksync: Option<KsyncMetadata>,
}

/// Build configuration for xtask commands.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root directory.
    pub workspace_root: PathBuf,
    /// Targets for cross-compilation checks.
    pub check_targets: Vec<String>,
}

impl Config {
    /// Load configuration from workspace.
    pub fn load() -> Result<Self> {
        let workspace_root = find_workspace_root()?;
        let cargo_toml = workspace_root.join("Cargo.toml");
        let content = std::fs::read_to_string(&cargo_toml)
            .with_context(|| format!("Failed to read {}", cargo_toml.display()))?;

        let config: WorkspaceConfig =
            toml::from_str(&content).context("Failed to parse Cargo.toml")?;

        let check_targets = config
            .workspace
            .metadata
            .and_then(|m| m.ksync)
            .map(|k| k.check_targets)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| vec!["thumbv7em-none-eabihf".to_string()]);

        Ok(Self {
            workspace_root,
            check_targets,
        })
    }
}

/// Find the workspace root by looking for Cargo.toml with [workspace].
fn find_workspace_root() -> Result<PathBuf> {
    let mut dir = std::env::current_dir().context("Failed to get current directory")?;

    loop {
        let cargo_toml = dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml)?;
            if content.contains("[workspace]") {
                return Ok(dir);
            }
        }

        if !dir.pop() {
            anyhow::bail!("Could not find workspace root (no Cargo.toml with [workspace] found)");
        }
    }
}
