// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use anyhow::Result;

// =============================================================================
// Logger
// =============================================================================

/// Initialize the systemd journal logger.
///
/// # Errors
/// Returns an error if the journal logger fails to initialize.
pub fn init_logger(debug: bool) -> Result<()> {
    let log_level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    systemd_journal_logger::JournalLog::new()?.install()?;
    log::set_max_level(log_level);
    Ok(())
}

// =============================================================================
// Timeouts
// =============================================================================

/// Convert a configured millisecond timeout into a poll timeout.
///
/// Non-positive values mean "wait indefinitely" and map to `None`.
#[must_use]
pub fn timeout_from_millis(ms: i64) -> Option<Duration> {
    u64::try_from(ms)
        .ok()
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
}
