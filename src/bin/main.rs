// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use ghaf_virusfilter::config::{load_config, verify_config, Config, ShareConfig};
use ghaf_virusfilter::policy::{Access, VirusFilter};
use ghaf_virusfilter::scanner::{ClamdEngine, ScanEngine};
use ghaf_virusfilter::util::init_logger;

#[derive(Parser)]
#[command(name = "virusfilter")]
#[command(about = "On-access virus filter for file-server shares")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Run files through the share's open or close check
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Share to use (required when the configuration has several)
        #[arg(short, long)]
        share: Option<String>,
        #[arg(short, long)]
        debug: bool,
        /// Apply the close check (file treated as modified) instead of the open check
        #[arg(long)]
        close: bool,
        /// Files, absolute or relative to the share path
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Check that the share's scanner daemon answers
    Ping {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        share: Option<String>,
    },
    /// Verify configuration file without scanning
    Verify {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn select_share<'a>(config: &'a Config, share: Option<&str>) -> Result<(&'a str, &'a ShareConfig)> {
    match share {
        Some(name) => config
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .with_context(|| format!("Share '{name}' not found in configuration")),
        None if config.len() == 1 => config
            .iter()
            .next()
            .map(|(k, v)| (k.as_str(), v))
            .context("Configuration has no shares"),
        None => anyhow::bail!("Configuration has {} shares, select one with --share", config.len()),
    }
}

fn engine_for(share: &ShareConfig) -> ClamdEngine {
    ClamdEngine::new(
        &share.scanner.socket_path,
        share.scanner.connect_timeout(),
        share.scanner.io_timeout(),
    )
}

/// Name of `file` relative to the share root.
fn share_relative(share: &ShareConfig, file: &Path) -> String {
    file.strip_prefix(&share.path)
        .unwrap_or(file)
        .to_string_lossy()
        .into_owned()
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            config,
            share,
            debug,
            close,
            files,
        } => {
            init_logger(debug)?;

            let config = load_config(&config).with_context(|| {
                format!("Failed to load configuration from {}", config.display())
            })?;
            let (name, share) = select_share(&config, share.as_deref())?;

            let mut engine = engine_for(share);
            if let Err(e) = engine.validate_availability() {
                log::warn!("{e}");
            }

            let mut filter = VirusFilter::new(name, share, Box::new(engine));
            let mut denied = false;
            for file in &files {
                let fname = share_relative(share, file);
                let access = if close {
                    filter.check_close(&fname, true, false)
                } else {
                    filter.check_open(&fname, false)
                };
                match access {
                    Access::Allow => println!("{}: allowed", file.display()),
                    Access::Deny(errno) => {
                        denied = true;
                        println!("{}: denied (errno {errno})", file.display());
                    }
                }
            }

            Ok(if denied {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Ping { config, share } => {
            let config = load_config(&config).with_context(|| {
                format!("Failed to load configuration from {}", config.display())
            })?;
            let (name, share) = select_share(&config, share.as_deref())?;

            engine_for(share).ping().with_context(|| {
                format!(
                    "Share '{name}': scanner at {} did not answer",
                    share.scanner.socket_path.display()
                )
            })?;
            println!("Share '{name}': scanner available");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { config } => {
            verify_config(&config).with_context(|| {
                format!("Failed to verify configuration file {}", config.display())
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
