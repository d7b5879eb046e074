// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Dispositions for infected files.
//!
//! Quarantine and delete are the only filesystem mutations this crate
//! performs. Both run with elevated privilege held for the duration of the
//! single mutation, and any failure degrades to [`ActionOutcome::DidNothing`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Random characters appended to the quarantine prefix.
const QUARANTINE_RAND_LEN: usize = 6;

// =============================================================================
// InfectedAction
// =============================================================================

/// Action to take when an infected file is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InfectedAction {
    /// Leave the file in place.
    #[default]
    Nothing,
    /// Unlink the infected file.
    #[serde(alias = "remove", alias = "unlink")]
    Delete,
    /// Move the infected file into the quarantine directory.
    Quarantine,
}

impl std::fmt::Display for InfectedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nothing => write!(f, "nothing"),
            Self::Delete => write!(f, "delete"),
            Self::Quarantine => write!(f, "quarantine"),
        }
    }
}

impl std::str::FromStr for InfectedAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nothing" => Ok(Self::Nothing),
            "delete" | "remove" | "unlink" => Ok(Self::Delete),
            "quarantine" => Ok(Self::Quarantine),
            _ => Err(format!(
                "Invalid action: {s}. Use: nothing, delete, quarantine"
            )),
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Disposition actually carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Quarantined(PathBuf),
    Deleted,
    DidNothing,
}

impl ActionOutcome {
    /// Name exported to notification commands.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Quarantined(_) => "quarantine",
            Self::Deleted => "delete",
            Self::DidNothing => "nothing",
        }
    }

    /// True when the original file no longer exists at its path.
    #[must_use]
    pub const fn mutated(&self) -> bool {
        !matches!(self, Self::DidNothing)
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("cannot create quarantine file in {dir}: {source}")]
    CreateFailed { dir: PathBuf, source: io::Error },
    #[error("cannot rename {from} to {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("cannot unlink {path}: {source}")]
    UnlinkFailed { path: PathBuf, source: io::Error },
}

// =============================================================================
// Privilege
// =============================================================================

/// Privilege collaborator supplied by the host.
///
/// `become_root` is called right before a filesystem mutation and
/// `unbecome_root` right after it, on success and failure alike.
pub trait Privilege {
    fn become_root(&self);
    fn unbecome_root(&self);
}

/// Host that already runs with the privilege it needs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unprivileged;

impl Privilege for Unprivileged {
    fn become_root(&self) {}
    fn unbecome_root(&self) {}
}

/// Holds elevated privilege until dropped.
struct RootGuard<'a> {
    privilege: &'a dyn Privilege,
}

impl<'a> RootGuard<'a> {
    fn acquire(privilege: &'a dyn Privilege) -> Self {
        privilege.become_root();
        Self { privilege }
    }
}

impl Drop for RootGuard<'_> {
    fn drop(&mut self) {
        self.privilege.unbecome_root();
    }
}

// =============================================================================
// Dispositions
// =============================================================================

/// Move `path` to a new unique file `<dir>/<prefix>XXXXXX`.
///
/// The destination is created exclusively first so that the rename never
/// replaces an existing file. The placeholder is removed if the rename fails.
pub fn quarantine(path: &Path, dir: &Path, prefix: &str) -> Result<PathBuf, ActionError> {
    let placeholder = tempfile::Builder::new()
        .prefix(prefix)
        .rand_bytes(QUARANTINE_RAND_LEN)
        .tempfile_in(dir)
        .map_err(|source| ActionError::CreateFailed {
            dir: dir.to_path_buf(),
            source,
        })?
        .into_temp_path();

    fs::rename(path, &placeholder).map_err(|source| ActionError::RenameFailed {
        from: path.to_path_buf(),
        to: placeholder.to_path_buf(),
        source,
    })?;

    // The rename succeeded, so the path now names the quarantined file
    placeholder
        .keep()
        .map_err(|e| ActionError::CreateFailed {
            dir: dir.to_path_buf(),
            source: e.error,
        })
}

/// Unlink `path`.
pub fn delete(path: &Path) -> Result<(), ActionError> {
    fs::remove_file(path).map_err(|source| ActionError::UnlinkFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Carry out `action` on an infected file.
///
/// Errors are logged and reported as [`ActionOutcome::DidNothing`].
pub fn apply(
    action: InfectedAction,
    path: &Path,
    quarantine_dir: &Path,
    quarantine_prefix: &str,
    privilege: &dyn Privilege,
) -> ActionOutcome {
    match action {
        InfectedAction::Nothing => ActionOutcome::DidNothing,
        InfectedAction::Quarantine => {
            let result = {
                let _root = RootGuard::acquire(privilege);
                quarantine(path, quarantine_dir, quarantine_prefix)
            };
            match result {
                Ok(dest) => {
                    info!(
                        "Infected file quarantined: {}: {}",
                        path.display(),
                        dest.display()
                    );
                    ActionOutcome::Quarantined(dest)
                }
                Err(e) => {
                    error!("Quarantine failed: {e}");
                    ActionOutcome::DidNothing
                }
            }
        }
        InfectedAction::Delete => {
            let result = {
                let _root = RootGuard::acquire(privilege);
                delete(path)
            };
            match result {
                Ok(()) => {
                    info!("Infected file deleted: {}", path.display());
                    ActionOutcome::Deleted
                }
                Err(e) => {
                    error!("Delete failed: {e}");
                    ActionOutcome::DidNothing
                }
            }
        }
    }
}
