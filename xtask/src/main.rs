//! Build automation for ksync.
//!
//! Usage:
//!   cargo xtask test             - Run the backend test matrix, loom and shuttle
//!   cargo xtask test --matrix    - Run only the backend test matrix
//!   cargo xtask test --loom      - Run only the loom model of the fifo
//!   cargo xtask test --shuttle   - Run only the shuttle schedules of the fifo
//!   cargo xtask check            - Cross-check every backend for bare-metal targets
//!   cargo xtask clippy           - Run clippy lints for every backend
//!   cargo xtask doc              - Generate documentation

mod cargo;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cargo::CargoCommand;
use crate::config::Config;
use crate::test::{BACKENDS, Suites};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for ksync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tests (backend matrix + model checkers)
    Test {
        /// Build in release mode (matrix only; model checkers always are)
        #[arg(short, long)]
        release: bool,

        /// Run only the backend test matrix
        #[arg(long)]
        matrix: bool,

        /// Run only the loom model
        #[arg(long)]
        loom: bool,

        /// Run only the shuttle schedules
        #[arg(long)]
        shuttle: bool,

        /// Extra arguments passed after -- (forwarded to test binaries)
        #[arg(last = true)]
        extra_args: Vec<String>,
    },

    /// Type-check every backend for bare-metal targets
    Check {
        /// Target triple (default: `check-targets` from workspace metadata)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Run clippy lints for every backend on the host
    Clippy,

    /// Generate documentation
    Doc {
        /// Open documentation in browser after building
        #[arg(long)]
        open: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Test {
            release,
            matrix,
            loom,
            shuttle,
            extra_args,
        } => {
            let all = !(matrix || loom || shuttle);
            let suites = Suites {
                matrix: all || matrix,
                loom: all || loom,
                shuttle: all || shuttle,
            };
            test::run_tests(&config, suites, release, &extra_args)?;
        }

        Commands::Check { target } => {
            let targets = target.map_or_else(|| config.check_targets.clone(), |t| vec![t]);
            for target in &targets {
                for feature in BACKENDS {
                    let check = CargoCommand {
                        target: Some(target.clone()),
                        feature: feature.map(String::from),
                        ..CargoCommand::new("check")
                    };
                    println!("  Checking {}...", check.describe());
                    check.run(&config)?;
                }
            }
        }

        Commands::Clippy => {
            for feature in BACKENDS {
                let clippy = CargoCommand {
                    feature: feature.map(String::from),
                    extra_args: vec!["-D".into(), "warnings".into()],
                    ..CargoCommand::new("clippy")
                };
                println!("  Linting {}...", clippy.describe());
                clippy.run(&config)?;
            }
        }

        Commands::Doc { open } => {
            // doc needs --no-deps and --open, so we build args manually
            let sh = xshell::Shell::new()?;
            sh.change_dir(&config.workspace_root);

            let mut args: Vec<String> = vec![
                "doc".into(),
                "-p".into(),
                cargo::PACKAGE.into(),
                "--no-deps".into(),
            ];
            if open {
                args.push("--open".into());
            }

            xshell::cmd!(sh, "cargo {args...}")
                .run()
                .map_err(|e| anyhow::anyhow!("cargo doc failed: {e}"))?;
        }
    }

    Ok(())
}
