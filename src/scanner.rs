// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Virus scanning engines.
//!
//! This module provides a pluggable interface for virus scanning engines.
//! An engine turns a file path into a [`ScanVerdict`]:
//! - `Clean`: File passed virus scan
//! - `Infected`: Virus/malware detected, with the engine's report
//! - `ScanError`: Scan failed (scanner unavailable, timeout, unreadable file)
//! - `UnknownCode`: The engine answered with something it does not define
//!
//! The policy engine decides how each verdict affects file access.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::transport::TransportSession;

/// Default clamd control socket.
pub const CLAMAV_SOCKET_PATH: &str = "/run/clamav/clamd.ctl";

/// Result of a virus scan operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    /// File is clean
    Clean,
    /// File is infected; carries the engine report (signature name)
    Infected(String),
    /// Scan failed
    ScanError(Option<String>),
    /// Engine returned a status this crate does not know
    UnknownCode {
        code: String,
        report: Option<String>,
    },
}

impl ScanVerdict {
    /// Report text attached to the verdict, if any.
    #[must_use]
    pub fn report(&self) -> Option<&str> {
        match self {
            Self::Clean => None,
            Self::Infected(report) => Some(report),
            Self::ScanError(report) | Self::UnknownCode { report, .. } => report.as_deref(),
        }
    }
}

impl fmt::Display for ScanVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Infected(report) => write!(f, "infected ({report})"),
            Self::ScanError(Some(report)) => write!(f, "scan error ({report})"),
            Self::ScanError(None) => write!(f, "scan error"),
            Self::UnknownCode { code, .. } => write!(f, "unknown result code {code}"),
        }
    }
}

/// Virus scanning engine interface.
///
/// Engines own whatever connection or library state they need. The policy
/// engine calls [`ScanEngine::recycle`] to end a batch of scans; engines
/// without per-session state keep the default no-op.
pub trait ScanEngine {
    /// Short engine name, used in the module name given to notification commands.
    fn name(&self) -> &str;

    /// Validate that the scanner is available and functional.
    fn validate_availability(&mut self) -> Result<()> {
        Ok(())
    }

    /// Scan a file by absolute path.
    fn scan(&mut self, path: &Path) -> ScanVerdict;

    /// Release per-session resources after a batch of scans.
    fn recycle(&mut self) {}
}

// =============================================================================
// ClamAV
// =============================================================================

/// `ClamAV` engine talking to clamd over its control socket.
///
/// Scans run inside a clamd `IDSESSION` so several requests can share one
/// connection. The session is opened lazily and closed by `recycle`.
pub struct ClamdEngine {
    socket_path: PathBuf,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
    session: TransportSession,
}

impl ClamdEngine {
    #[must_use]
    pub fn new(
        socket_path: impl Into<PathBuf>,
        connect_timeout: Option<Duration>,
        io_timeout: Option<Duration>,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            connect_timeout,
            io_timeout,
            session: Self::new_session(connect_timeout, io_timeout),
        }
    }

    fn new_session(connect_timeout: Option<Duration>, io_timeout: Option<Duration>) -> TransportSession {
        let mut session = TransportSession::new(connect_timeout, io_timeout);
        session.set_eol(b'\0');
        session
    }

    fn ensure_session(&mut self) -> Result<(), crate::transport::TransportError> {
        if self.session.is_connected() {
            return Ok(());
        }
        self.session.connect(&self.socket_path)?;
        if let Err(e) = self.session.write_line(b"zIDSESSION") {
            self.session.disconnect();
            return Err(e);
        }
        debug!("clamd session opened: {}", self.socket_path.display());
        Ok(())
    }

    /// Check clamd liveness on a fresh connection.
    pub fn ping(&self) -> Result<()> {
        let mut session = Self::new_session(self.connect_timeout, self.io_timeout);
        session.connect(&self.socket_path)?;
        let response = session.request(b"zPING")?;
        let response = String::from_utf8_lossy(&response);

        if response.trim() == "PONG" {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Unexpected ClamAV ping response: {response}"))
        }
    }

    /// Parse a clamd scan reply into a `ScanVerdict`.
    ///
    /// Replies inside an `IDSESSION` carry a `<id>: ` prefix, which is
    /// stripped before matching.
    #[must_use]
    pub fn parse_response(response: &str, name_for_logging: &str) -> ScanVerdict {
        let response = strip_session_id(response.trim_matches('\0').trim());

        if response.is_empty() {
            error!("ClamAV closed connection while scanning {name_for_logging}");
            return ScanVerdict::ScanError(Some("scanner closed connection".to_string()));
        }

        // Status is the text after the last ": " separator
        let status = response.rsplit_once(": ").map_or(response, |(_, s)| s);

        if status == "OK" {
            debug!("Clean: {name_for_logging}");
            return ScanVerdict::Clean;
        }

        if let Some(signature) = status.strip_suffix(" FOUND") {
            warn!("Virus in {name_for_logging}: {signature}");
            return ScanVerdict::Infected(signature.to_string());
        }

        if let Some(message) = status.strip_suffix(" ERROR") {
            error!("ClamAV error for {name_for_logging}: {message}");
            return ScanVerdict::ScanError(Some(message.to_string()));
        }

        error!("Unexpected ClamAV response: {response}");
        let code = response
            .rsplit(' ')
            .next()
            .unwrap_or(response)
            .to_string();
        ScanVerdict::UnknownCode {
            code,
            report: Some(response.to_string()),
        }
    }
}

/// Strip a leading `<digits>: ` session id.
fn strip_session_id(response: &str) -> &str {
    match response.split_once(": ") {
        Some((id, rest)) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => rest,
        _ => response,
    }
}

impl ScanEngine for ClamdEngine {
    fn name(&self) -> &str {
        "clamav"
    }

    fn validate_availability(&mut self) -> Result<()> {
        self.ping().map_err(|e| {
            anyhow::anyhow!(
                "Failed to connect to ClamAV at {}: {e}",
                self.socket_path.display()
            )
        })?;
        info!("ClamAV daemon available: {}", self.socket_path.display());
        Ok(())
    }

    fn scan(&mut self, path: &Path) -> ScanVerdict {
        debug!("ClamAV scanning path: {}", path.display());

        if let Err(e) = self.ensure_session() {
            error!("ClamAV connection error: {e}");
            return ScanVerdict::ScanError(Some(e.to_string()));
        }

        let mut request = b"zSCAN ".to_vec();
        request.extend_from_slice(path.as_os_str().as_encoded_bytes());

        match self.session.request(&request) {
            Ok(response) => {
                if response.is_empty() {
                    self.session.disconnect();
                }
                let response = String::from_utf8_lossy(&response);
                Self::parse_response(&response, &path.display().to_string())
            }
            Err(e) => {
                error!("ClamAV request failed for {}: {e}", path.display());
                self.session.disconnect();
                ScanVerdict::ScanError(Some(e.to_string()))
            }
        }
    }

    fn recycle(&mut self) {
        if !self.session.is_connected() {
            return;
        }
        if let Err(e) = self.session.write_line(b"zEND") {
            debug!("clamd END failed: {e}");
        }
        self.session.disconnect();
    }
}
