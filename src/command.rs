// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Notification command execution.
//!
//! Commands run through `/bin/sh -c` with an environment made only of the
//! [`EnvList`] built by the policy engine plus connection details. The
//! caller blocks until the child exits.

use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Stdio};

use log::debug;

use crate::env::EnvList;

const SHELL: &str = "/bin/sh";

/// Spawns notification commands.
pub trait CommandRunner {
    /// Run `command` with `env` and return its exit code.
    fn run(&self, command: &str, env: &EnvList) -> io::Result<i32>;
}

/// Details of the client connection that triggered the scan.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    pub service_name: String,
    pub service_path: String,
    pub server_ip: Option<String>,
    pub client_ip: Option<String>,
    pub client_name: Option<String>,
    pub user_name: Option<String>,
}

impl ConnectionContext {
    /// Add the `VIRUSFILTER_COMMAND_*` variables to `env`.
    pub fn apply(&self, env: &mut EnvList) {
        if let Some(ip) = &self.server_ip {
            env.set("VIRUSFILTER_COMMAND_SERVER_IP", strip_v4_mapped(ip));
        }
        env.set("VIRUSFILTER_COMMAND_SERVER_NAME", &hostname());
        env.set(
            "VIRUSFILTER_COMMAND_SERVER_PID",
            &std::process::id().to_string(),
        );
        env.set("VIRUSFILTER_COMMAND_SERVICE_NAME", &self.service_name);
        env.set("VIRUSFILTER_COMMAND_SERVICE_PATH", &self.service_path);
        if let Some(ip) = &self.client_ip {
            env.set("VIRUSFILTER_COMMAND_CLIENT_IP", strip_v4_mapped(ip));
        }
        if let Some(name) = &self.client_name {
            env.set("VIRUSFILTER_COMMAND_CLIENT_NAME", name);
        }
        if let Some(name) = &self.user_name {
            env.set("VIRUSFILTER_COMMAND_USER_NAME", name);
        }
    }
}

fn strip_v4_mapped(addr: &str) -> &str {
    addr.strip_prefix("::ffff:").unwrap_or(addr)
}

fn hostname() -> String {
    rustix::system::uname()
        .nodename()
        .to_string_lossy()
        .into_owned()
}

/// Runs commands with the system shell.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    context: Option<ConnectionContext>,
    uid: Option<u32>,
    gid: Option<u32>,
}

impl ShellRunner {
    #[must_use]
    pub const fn new(context: Option<ConnectionContext>, uid: Option<u32>, gid: Option<u32>) -> Self {
        Self { context, uid, gid }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, env: &EnvList) -> io::Result<i32> {
        let mut env = env.clone();
        if let Some(context) = &self.context {
            context.apply(&mut env);
        }

        let mut child = Command::new(SHELL);
        child
            .arg("-c")
            .arg(command)
            .env_clear()
            .envs(env.vars())
            .stdin(Stdio::null());
        if let Some(gid) = self.gid {
            child.gid(gid);
        }
        if let Some(uid) = self.uid {
            child.uid(uid);
        }

        debug!("Running command: {command}");
        let status = child.status()?;
        Ok(status
            .code()
            .unwrap_or_else(|| 128 + status.signal().unwrap_or(0)))
    }
}
