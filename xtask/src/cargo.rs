//! Common cargo invocation for the ksync crate.

use crate::config::Config;
use anyhow::{Context, Result};
use xshell::{Shell, cmd};

/// The crate every command operates on.
pub const PACKAGE: &str = "ksync";

/// Arguments common to all cargo commands run by xtask.
pub struct CargoCommand {
    /// Cargo subcommand: "test", "check", "clippy", "doc".
    pub subcommand: String,
    /// Target triple. If `None`, the host target is used.
    pub target: Option<String>,
    /// Cargo feature to enable (one lock backend at most).
    pub feature: Option<String>,
    /// Extra `--cfg` flags passed through `RUSTFLAGS`.
    pub cfgs: Vec<String>,
    /// Single integration test target (`--test`). If `None`, all targets run.
    pub test: Option<String>,
    /// Whether to pass --release.
    pub release: bool,
    /// Extra arguments appended after `--`.
    pub extra_args: Vec<String>,
}

impl CargoCommand {
    /// A host command for `subcommand` with no features, cfgs or extra args.
    pub fn new(subcommand: &str) -> Self {
        Self {
            subcommand: subcommand.into(),
            target: None,
            feature: None,
            cfgs: vec![],
            test: None,
            release: false,
            extra_args: vec![],
        }
    }

    /// Execute the cargo command.
    pub fn run(&self, config: &Config) -> Result<()> {
        let sh = Shell::new()?;
        sh.change_dir(&config.workspace_root);

        let mut args: Vec<String> = vec![self.subcommand.clone(), "-p".into(), PACKAGE.into()];

        if let Some(ref target) = self.target {
            args.push("--target".into());
            args.push(target.clone());
        }

        if let Some(ref feature) = self.feature {
            args.push("--features".into());
            args.push(feature.clone());
        }

        if let Some(ref test) = self.test {
            args.push("--test".into());
            args.push(test.clone());
        }

        if self.release {
            args.push("--release".into());
        }

        if !self.extra_args.is_empty() {
            args.push("--".into());
            args.extend(self.extra_args.clone());
        }

        let mut command = cmd!(sh, "cargo {args...}");
        if !self.cfgs.is_empty() {
            let rustflags = self
                .cfgs
                .iter()
                .map(|c| format!("--cfg {c}"))
                .collect::<Vec<_>>()
                .join(" ");
            command = command.env("RUSTFLAGS", rustflags);
        }
        command
            .run()
            .with_context(|| format!("cargo {} failed ({})", self.subcommand, self.describe()))?;

        Ok(())
    }

    /// One-line summary of the configuration, for progress output.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.feature.as_deref().unwrap_or("bare-metal").to_string()];
        if let Some(ref target) = self.target {
            parts.push(target.clone());
        }
        parts.extend(self.cfgs.iter().map(|c| format!("--cfg {c}")));
        parts.join(", ")
    }
}
