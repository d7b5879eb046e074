// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-share configuration.
//!
//! The configuration file is a JSON object mapping share names to
//! [`ShareConfig`]. Every field has a default, so `{"docs": {"path": "/srv/docs"}}`
//! is a complete configuration. The loaded value is read-only and passed by
//! reference to the policy engine.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use rustix::io::Errno;
use serde::{Deserialize, Serialize};

use crate::action::InfectedAction;
use crate::scanner::CLAMAV_SOCKET_PATH;
use crate::util::timeout_from_millis;

fn default_errno_on_open() -> i32 {
    Errno::ACCESS.raw_os_error()
}

/// When and what to scan.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanningConfig {
    /// Scan files when they are opened (default: true).
    pub scan_on_open: bool,

    /// Scan files when they are closed after modification (default: false).
    pub scan_on_close: bool,

    /// Files larger than this are not scanned. 0 means no limit.
    pub max_file_size: u64,

    /// Files smaller than this are not scanned. 0 means no limit.
    pub min_file_size: u64,

    /// Wildcard patterns (`*`, `?`) matched case-insensitively against the
    /// file name only.
    pub exclude_files: Vec<String>,

    /// Deny access when the scan fails (default: false).
    pub block_access_on_error: bool,

    /// Scans per scanner session before it is recycled. 0 recycles after
    /// every scan.
    pub scan_request_limit: u32,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            scan_on_open: true,
            scan_on_close: false,
            max_file_size: 100_000_000,
            min_file_size: 10,
            exclude_files: Vec::new(),
            block_access_on_error: false,
            scan_request_limit: 0,
        }
    }
}

impl ScanningConfig {
    /// Check the final component of `fname` against the exclude patterns.
    #[must_use]
    pub fn is_excluded(&self, fname: &str) -> bool {
        let name = fname.rsplit('/').next().unwrap_or(fname);
        self.exclude_files
            .iter()
            .any(|pattern| wildcard_match(pattern.as_bytes(), name.as_bytes()))
    }

    /// Whether a file of `size` bytes is within the scanned size range.
    #[must_use]
    pub const fn size_in_range(&self, size: u64) -> bool {
        (self.max_file_size == 0 || size <= self.max_file_size)
            && (self.min_file_size == 0 || size >= self.min_file_size)
    }
}

/// Result cache bounds.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum number of cached verdicts. 0 or less disables the cache.
    pub entry_limit: i64,

    /// Seconds a verdict stays valid.
    pub time_limit: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_limit: 100,
            time_limit: 10,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit)
    }
}

/// Handling of infected files.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct InfectedConfig {
    /// Disposition: nothing (default), delete, or quarantine.
    pub action: InfectedAction,

    /// Shell command run after the disposition.
    pub command: Option<String>,

    /// Error returned to the client when an infected file is opened.
    pub errno_on_open: i32,

    /// Error returned to the client when an infected file is closed.
    /// 0 reports a successful close.
    pub errno_on_close: i32,

    pub quarantine_directory: PathBuf,

    pub quarantine_prefix: String,
}

impl Default for InfectedConfig {
    fn default() -> Self {
        Self {
            action: InfectedAction::default(),
            command: None,
            errno_on_open: default_errno_on_open(),
            errno_on_close: 0,
            quarantine_directory: PathBuf::from("/var/lib/virusfilter/quarantine"),
            quarantine_prefix: "virusfilter.".to_string(),
        }
    }
}

/// Handling of scan failures.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanErrorConfig {
    /// Shell command run when a scan fails.
    pub command: Option<String>,

    pub errno_on_open: i32,

    pub errno_on_close: i32,
}

impl Default for ScanErrorConfig {
    fn default() -> Self {
        Self {
            command: None,
            errno_on_open: default_errno_on_open(),
            errno_on_close: 0,
        }
    }
}

/// Scanner daemon connection.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ScannerConfig {
    pub socket_path: PathBuf,

    /// Connect timeout in milliseconds. 0 or less waits indefinitely.
    pub connect_timeout_ms: i64,

    /// Per-request I/O timeout in milliseconds. 0 or less waits indefinitely.
    pub io_timeout_ms: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(CLAMAV_SOCKET_PATH),
            connect_timeout_ms: 30_000,
            io_timeout_ms: 60_000,
        }
    }
}

impl ScannerConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        timeout_from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn io_timeout(&self) -> Option<Duration> {
        timeout_from_millis(self.io_timeout_ms)
    }
}

/// Credentials for notification commands. Unset fields keep the current id.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct CommandConfig {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

fn default_share_path() -> PathBuf {
    PathBuf::from("/")
}

/// Configuration for a single share.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShareConfig {
    /// Share root; relative file names are resolved against it.
    #[serde(default = "default_share_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub scanning: ScanningConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub infected: InfectedConfig,

    #[serde(default)]
    pub scan_error: ScanErrorConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub command: CommandConfig,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            path: default_share_path(),
            scanning: ScanningConfig::default(),
            cache: CacheConfig::default(),
            infected: InfectedConfig::default(),
            scan_error: ScanErrorConfig::default(),
            scanner: ScannerConfig::default(),
            command: CommandConfig::default(),
        }
    }
}

/// Map of share name to configuration.
pub type Config = HashMap<String, ShareConfig>;

/// Check if a path is an accessible directory.
fn check_dir(dir: &Path) -> Result<(), &'static str> {
    match dir.metadata() {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err("is not a directory"),
        Err(e) if e.kind() == ErrorKind::NotFound => Err("does not exist"),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Err("permission denied"),
        Err(_) => Err("is not accessible"),
    }
}

impl ShareConfig {
    /// Validate share configuration.
    /// Returns `Ok(())` if valid, or `Err(Vec<String>)` with error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = Vec::new();

        if !self.path.is_absolute() {
            errors.push(format!("Share path '{}' is not absolute", self.path.display()));
        }

        let scanning = &self.scanning;
        if scanning.min_file_size != 0
            && scanning.max_file_size != 0
            && scanning.min_file_size > scanning.max_file_size
        {
            errors.push(format!(
                "minFileSize {} exceeds maxFileSize {}",
                scanning.min_file_size, scanning.max_file_size
            ));
        }

        let infected = &self.infected;
        if infected.quarantine_prefix.is_empty() {
            errors.push("quarantinePrefix is empty".to_string());
        } else if infected.quarantine_prefix.contains('/') {
            errors.push(format!(
                "quarantinePrefix '{}' contains '/'",
                infected.quarantine_prefix
            ));
        }

        if infected.action == InfectedAction::Quarantine {
            if !infected.quarantine_directory.is_absolute() {
                errors.push(format!(
                    "quarantineDirectory '{}' is not absolute",
                    infected.quarantine_directory.display()
                ));
            } else if let Err(e) = check_dir(&infected.quarantine_directory) {
                errors.push(format!(
                    "quarantineDirectory '{}' {e} (required for action=quarantine)",
                    infected.quarantine_directory.display()
                ));
            }
        }

        for (name, errno) in [
            ("infected.errnoOnOpen", infected.errno_on_open),
            ("infected.errnoOnClose", infected.errno_on_close),
            ("scanError.errnoOnOpen", self.scan_error.errno_on_open),
            ("scanError.errnoOnClose", self.scan_error.errno_on_close),
        ] {
            if errno < 0 {
                errors.push(format!("{name} {errno} is negative"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Log configuration info for a share.
    pub fn log_config_info(&self, share_name: &str) {
        let scanning = &self.scanning;
        if !scanning.scan_on_open && !scanning.scan_on_close {
            info!("Share '{share_name}': scanning disabled on both open and close");
        }
        if scanning.block_access_on_error {
            info!("Share '{share_name}': access blocked on scan errors");
        }
        if self.cache.entry_limit <= 0 {
            info!("Share '{share_name}': result cache disabled");
        }
        info!(
            "Share '{share_name}': infected action {}",
            self.infected.action
        );
        if !scanning.exclude_files.is_empty() {
            debug!(
                "Share '{share_name}': excluding files: {:?}",
                scanning.exclude_files
            );
        }
        debug!(
            "Share '{share_name}': scanner {}",
            self.scanner.socket_path.display()
        );
    }
}

fn read_config(config_path: &Path) -> Result<Config> {
    let config_data = fs::read(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    serde_json::from_slice(&config_data).context("Failed to parse config JSON")
}

/// Load configuration and drop shares that fail validation.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let mut config = read_config(config_path)?;
    info!("Loaded configuration for {} shares", config.len());

    let original_count = config.len();
    config.retain(|share_name, share_config| match share_config.validate() {
        Ok(()) => {
            share_config.log_config_info(share_name);
            true
        }
        Err(errors) => {
            for err in &errors {
                error!("Share '{share_name}': {err}");
            }
            warn!("Share '{share_name}': removed due to configuration errors");
            false
        }
    });

    let final_count = config.len();
    if final_count < original_count {
        warn!(
            "Removed {} shares due to configuration issues",
            original_count - final_count
        );
    }

    if config.is_empty() {
        anyhow::bail!("No valid shares in {}", config_path.display());
    }

    Ok(config)
}

/// Verify configuration file without scanning anything.
pub fn verify_config(config_path: &Path) -> Result<()> {
    let config = read_config(config_path)?;

    let (total_valid, total_invalid) =
        config.iter().fold((0, 0), |(valid, invalid), (name, cfg)| {
            match cfg.validate() {
                Ok(()) => {
                    eprintln!("Share '{name}': valid");
                    (valid + 1, invalid)
                }
                Err(errors) => {
                    for err in &errors {
                        eprintln!("Share '{name}': {err}");
                    }
                    (valid, invalid + 1)
                }
            }
        });

    eprintln!("{total_valid} valid, {total_invalid} invalid");

    if total_invalid > 0 {
        anyhow::bail!("Configuration has {total_invalid} invalid shares");
    }

    Ok(())
}

/// Match `name` against a pattern where `*` matches any run of bytes and
/// `?` matches exactly one. ASCII letters compare case-insensitively.
fn wildcard_match(pattern: &[u8], name: &[u8]) -> bool {
    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == b'?' || c.eq_ignore_ascii_case(&name[n]) => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
