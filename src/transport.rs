// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Line-based session to a scanning daemon over a Unix stream socket.
//!
//! One request line is written, one response line is read. Lines end with a
//! configurable terminator byte (newline by default, NUL for clamd's
//! `z`-prefixed commands).
//!
//! The read side uses a fixed-size buffer. Bytes received after the
//! terminator are kept as leftover and served by the next read before the
//! socket is touched again, so a daemon that sends several lines in one
//! write costs a single `read` call.

use std::io::{self, Read, Write};
use std::ops::Range;
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use rustix::event::{PollFd, PollFlags, Timespec};
use rustix::io::Errno;
use rustix::net::sockopt::{self, Timeout};
use rustix::net::{AddressFamily, SocketAddrUnix, SocketFlags, SocketType};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Capacity of the read and write line buffers.
pub const IO_BUFFER_SIZE: usize = 8192;

/// Default line terminator.
pub const DEFAULT_EOL: u8 = b'\n';

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {}: {source}", path.display())]
    ConnectFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("timed out waiting for scanner")]
    Timeout,
    #[error("scanner socket I/O failed: {0}")]
    IoFailed(#[from] io::Error),
    #[error("line exceeds {0} byte buffer")]
    LineTooLong(usize),
}

// =============================================================================
// Session
// =============================================================================

/// A persistent connection to the scanning daemon.
///
/// Strictly synchronous: at most one request is in flight.
pub struct TransportSession {
    socket: Option<UnixStream>,
    eol: u8,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
    write_buf: Vec<u8>,
    read_buf: Box<[u8]>,
    /// Unread bytes left in `read_buf` by the previous read.
    leftover: Range<usize>,
}

impl TransportSession {
    /// Create a disconnected session. `None` timeouts wait indefinitely.
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>, io_timeout: Option<Duration>) -> Self {
        Self {
            socket: None,
            eol: DEFAULT_EOL,
            connect_timeout,
            io_timeout,
            write_buf: Vec::with_capacity(IO_BUFFER_SIZE),
            read_buf: vec![0; IO_BUFFER_SIZE].into_boxed_slice(),
            leftover: 0..0,
        }
    }

    /// Set the line terminator, returning the previous one.
    pub fn set_eol(&mut self, eol: u8) -> u8 {
        std::mem::replace(&mut self.eol, eol)
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Connect to a Unix socket at `path`, dropping any previous connection.
    pub fn connect(&mut self, path: &Path) -> Result<(), TransportError> {
        self.disconnect();
        let stream = connect_unix(path, self.connect_timeout)?;
        debug!("Connected to scanner: {}", path.display());
        self.socket = Some(stream);
        Ok(())
    }

    /// Use an already connected stream (socketpair to a child process, tests).
    pub fn attach(&mut self, stream: UnixStream) {
        self.disconnect();
        self.socket = Some(stream);
    }

    /// Close the socket and forget all buffered data. Idempotent.
    pub fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            debug!("Disconnected from scanner");
        }
        self.write_buf.clear();
        self.leftover = 0..0;
    }

    /// Write one line and read one line back.
    ///
    /// The returned line excludes the terminator. An empty line means the
    /// daemon closed the connection (or sent an empty line).
    pub fn request(&mut self, line: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.write_line(line)?;
        self.read_line()
    }

    /// Write one line, appending the terminator unless it is already there.
    ///
    /// An empty line writes nothing.
    pub fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        if line.is_empty() {
            return Ok(());
        }

        self.write_buf.clear();
        self.write_buf.extend_from_slice(line);
        if line.last() != Some(&self.eol) {
            self.write_buf.push(self.eol);
        }
        if self.write_buf.len() > IO_BUFFER_SIZE {
            self.write_buf.clear();
            return Err(TransportError::LineTooLong(IO_BUFFER_SIZE));
        }

        let mut stream = self.socket.as_ref().ok_or_else(not_connected)?;
        let mut pending: &[u8] = &self.write_buf;

        while !pending.is_empty() {
            wait_ready(stream, PollFlags::OUT, self.io_timeout)?;
            match stream.write(pending) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => pending = &pending[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Read one line.
    ///
    /// Leftover bytes from the previous read are searched first; the socket
    /// is read only when they hold no complete line.
    pub fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let eol = self.eol;
        let mut filled = 0;

        if !self.leftover.is_empty() {
            let rest = self.leftover.clone();
            if let Some(pos) = find_eol(&self.read_buf[rest.clone()], eol) {
                let end = rest.start + pos;
                let line = self.read_buf[rest.start..end].to_vec();
                self.leftover = (end + 1)..rest.end;
                debug!("Read line from leftover buffer ({} bytes)", line.len());
                return Ok(line);
            }

            // Partial line: move it to the front and keep reading after it
            self.read_buf.copy_within(rest.clone(), 0);
            filled = rest.len();
        }
        self.leftover = 0..0;

        let mut stream = self.socket.as_ref().ok_or_else(not_connected)?;

        while filled < self.read_buf.len() {
            wait_ready(stream, PollFlags::IN, self.io_timeout)?;
            let n = match stream.read(&mut self.read_buf[filled..]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                debug!("Scanner closed connection");
                return Ok(Vec::new());
            }

            let start = filled;
            filled += n;

            if let Some(pos) = find_eol(&self.read_buf[start..filled], eol) {
                let end = start + pos;
                self.leftover = (end + 1)..filled;
                if !self.leftover.is_empty() {
                    debug!("Leftover data in read buffer ({} bytes)", self.leftover.len());
                }
                return Ok(self.read_buf[..end].to_vec());
            }
        }

        Err(TransportError::LineTooLong(self.read_buf.len()))
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================================
// Socket Helpers
// =============================================================================

fn find_eol(buf: &[u8], eol: u8) -> Option<usize> {
    buf.iter().position(|&b| b == eol)
}

fn not_connected() -> TransportError {
    io::Error::from(io::ErrorKind::NotConnected).into()
}

fn to_timespec(timeout: Duration) -> Timespec {
    Timespec {
        tv_sec: i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX),
        tv_nsec: timeout.subsec_nanos().into(),
    }
}

/// Poll `fd` for `flags`, restarting on EINTR.
fn wait_ready(fd: impl AsFd, flags: PollFlags, timeout: Option<Duration>) -> Result<(), TransportError> {
    let timeout = timeout.map(to_timespec);

    loop {
        let mut fds = [PollFd::new(&fd, flags)];
        match rustix::event::poll(&mut fds, timeout.as_ref()) {
            Ok(0) => return Err(TransportError::Timeout),
            Ok(_) => return Ok(()),
            Err(Errno::INTR) => {}
            Err(e) => return Err(io::Error::from(e).into()),
        }
    }
}

/// Connect a stream socket to `path`.
///
/// The send timeout bounds how long `connect` waits on a full listen
/// backlog; it is cleared again because I/O is bounded by `poll`.
fn connect_unix(path: &Path, timeout: Option<Duration>) -> Result<UnixStream, TransportError> {
    let failed = |e: Errno| TransportError::ConnectFailed {
        path: path.to_path_buf(),
        source: e.into(),
    };

    let addr = SocketAddrUnix::new(path).map_err(failed)?;
    let fd = rustix::net::socket_with(
        AddressFamily::UNIX,
        SocketType::STREAM,
        SocketFlags::CLOEXEC,
        None,
    )
    .map_err(failed)?;

    sockopt::set_socket_timeout(&fd, Timeout::Send, timeout).map_err(failed)?;
    match rustix::net::connect(&fd, &addr) {
        Ok(()) => {}
        Err(Errno::AGAIN | Errno::TIMEDOUT) => return Err(TransportError::Timeout),
        Err(e) => return Err(failed(e)),
    }
    sockopt::set_socket_timeout(&fd, Timeout::Send, None).map_err(failed)?;

    Ok(UnixStream::from(fd))
}
