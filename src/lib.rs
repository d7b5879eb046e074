// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! On-access virus filtering for file-server shares.
//!
//! A file server calls into this library when a client opens or closes a
//! file. The library asks an external scanning daemon whether the file is
//! safe, applies the configured disposition to infected files and decides
//! whether the file operation may proceed.
//!
//! # Modules
//!
//! - [`transport`] - Line-oriented session to the scanning daemon
//! - [`cache`] - Short-lived scan result cache
//! - [`env`] - Environment list for notification commands
//! - [`scanner`] - Scan verdicts and pluggable scan engines
//! - [`action`] - Quarantine/delete dispositions for infected files
//! - [`command`] - Notification command execution
//! - [`config`] - Per-share configuration
//! - [`policy`] - Scan decision engine and open/close access checks

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc)]

pub mod action;
pub mod cache;
pub mod command;
pub mod config;
pub mod env;
pub mod policy;
pub mod scanner;
pub mod transport;
pub mod util;
