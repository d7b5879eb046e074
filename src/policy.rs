// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Scan decision engine.
//!
//! [`VirusFilter`] is created once per client connection and share. For each
//! file it consults the result cache, scans on a miss, applies the infected
//! disposition, runs notification commands and decides whether the open or
//! close may proceed.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use rustix::io::Errno;

use crate::action::{self, ActionOutcome, Privilege, Unprivileged};
use crate::cache::ResultCache;
use crate::command::{CommandRunner, ShellRunner};
use crate::config::ShareConfig;
use crate::env::EnvList;
use crate::scanner::{ScanEngine, ScanVerdict};

/// Version exported to notification commands.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decision at the file-operation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// Fail the operation with this errno.
    Deny(i32),
}

/// Per-connection scan decision engine for one share.
pub struct VirusFilter<'a> {
    name: String,
    config: &'a ShareConfig,
    cache: Option<ResultCache>,
    engine: Box<dyn ScanEngine + 'a>,
    runner: Box<dyn CommandRunner + 'a>,
    privilege: Box<dyn Privilege + 'a>,
    scan_request_count: u32,
}

impl<'a> VirusFilter<'a> {
    /// Create a filter for share `name`.
    ///
    /// Notification commands run through [`ShellRunner`] with the configured
    /// credentials; filesystem actions run without privilege changes.
    pub fn new(name: &str, config: &'a ShareConfig, engine: Box<dyn ScanEngine + 'a>) -> Self {
        let cache = ResultCache::from_limits(config.cache.entry_limit, config.cache.time_limit());
        if cache.is_none() {
            debug!("Share '{name}': cache disabled");
        }

        Self {
            name: name.to_string(),
            config,
            cache,
            engine,
            runner: Box::new(ShellRunner::new(
                None,
                config.command.uid,
                config.command.gid,
            )),
            privilege: Box::new(Unprivileged),
            scan_request_count: 0,
        }
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Box<dyn CommandRunner + 'a>) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_privilege(mut self, privilege: Box<dyn Privilege + 'a>) -> Self {
        self.privilege = privilege;
        self
    }

    /// Name exported as `VIRUSFILTER_MODULE_NAME`.
    fn module_name(&self) -> String {
        format!("virusfilter-{}", self.engine.name())
    }

    fn file_path(&self, fname: &str) -> PathBuf {
        self.config.path.join(fname)
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Produce a verdict for `fname`, relative to the share root.
    ///
    /// Side effects (disposition, notification, caching) happen here; the
    /// caller only maps the verdict to an access decision.
    pub fn scan(&mut self, fname: &str) -> ScanVerdict {
        let filepath = self.file_path(fname);

        let cached = match self.cache.as_mut() {
            Some(cache) => cache.get(fname).map(|entry| entry.verdict.clone()),
            None => None,
        };
        let is_cache = cached.is_some();
        let verdict = match cached {
            Some(verdict) => {
                debug!("Cache entry found: {fname}: {verdict}");
                verdict
            }
            None => self.scan_with_engine(&filepath),
        };

        let mut add_to_cache = true;
        match &verdict {
            ScanVerdict::Clean => {
                debug!("Scan result: Clean: {}", filepath.display());
            }
            ScanVerdict::Infected(report) => {
                error!(
                    "Scan result: Infected: {}: {report}",
                    filepath.display()
                );
                let outcome = self.treat_infected(&filepath, report, is_cache);
                if outcome.mutated() {
                    add_to_cache = false;
                }
            }
            ScanVerdict::ScanError(_) | ScanVerdict::UnknownCode { .. } => {
                let report = verdict.report();
                if let ScanVerdict::UnknownCode { code, .. } = &verdict {
                    error!(
                        "Scan result: Unknown result code {code}: {}: {}",
                        filepath.display(),
                        report.unwrap_or("")
                    );
                } else {
                    error!(
                        "Scan result: Error: {}: {}",
                        filepath.display(),
                        report.unwrap_or("")
                    );
                }
                self.treat_scan_error(&filepath, report, is_cache);
            }
        }

        if !is_cache && add_to_cache {
            if let Some(cache) = self.cache.as_mut() {
                if let Err(e) = cache.add(fname, verdict.clone()) {
                    error!("Cannot create cache entry for {fname}: {e}");
                }
            }
        }

        verdict
    }

    fn scan_with_engine(&mut self, filepath: &Path) -> ScanVerdict {
        let verdict = self.engine.scan(filepath);

        let limit = self.config.scanning.scan_request_limit;
        self.scan_request_count += 1;
        if limit == 0 || self.scan_request_count >= limit {
            debug!(
                "Share '{}': recycling scanner after {} requests",
                self.name, self.scan_request_count
            );
            self.engine.recycle();
            self.scan_request_count = 0;
        }

        verdict
    }

    fn treat_infected(&self, filepath: &Path, report: &str, is_cache: bool) -> ActionOutcome {
        let infected = &self.config.infected;
        let outcome = action::apply(
            infected.action,
            filepath,
            &infected.quarantine_directory,
            &infected.quarantine_prefix,
            &*self.privilege,
        );
        info!(
            "Infected file action: {}: {}",
            filepath.display(),
            outcome.name()
        );

        let Some(command) = infected.command.as_deref() else {
            return outcome;
        };

        let mut env = EnvList::new();
        env.set("VIRUSFILTER_VERSION", VERSION);
        env.set("VIRUSFILTER_MODULE_NAME", &self.module_name());
        env.set(
            "VIRUSFILTER_INFECTED_FILE_PATH",
            &filepath.to_string_lossy(),
        );
        env.set("VIRUSFILTER_INFECTED_FILE_REPORT", report);
        env.set("VIRUSFILTER_INFECTED_FILE_ACTION", outcome.name());
        if let ActionOutcome::Quarantined(dest) = &outcome {
            env.set("VIRUSFILTER_QUARANTINED_FILE_PATH", &dest.to_string_lossy());
        }
        if is_cache {
            env.set("VIRUSFILTER_RESULT_IS_CACHE", "yes");
        }

        debug!("Infected file command: {}: {command}", filepath.display());
        self.run_command("Infected file", command, &env);

        outcome
    }

    fn treat_scan_error(&self, filepath: &Path, report: Option<&str>, is_cache: bool) {
        let Some(command) = self.config.scan_error.command.as_deref() else {
            return;
        };

        let mut env = EnvList::new();
        env.set(
            "VIRUSFILTER_SCAN_ERROR_FILE_PATH",
            &filepath.to_string_lossy(),
        );
        if let Some(report) = report {
            env.set("VIRUSFILTER_SCAN_ERROR_REPORT", report);
        }
        if is_cache {
            env.set("VIRUSFILTER_RESULT_IS_CACHE", "1");
        }

        debug!("Scan error command: {}: {command}", filepath.display());
        self.run_command("Scan error", command, &env);
    }

    fn run_command(&self, kind: &str, command: &str, env: &EnvList) {
        match self.runner.run(command, env) {
            Ok(0) => {}
            Ok(code) => error!("{kind} command failed: {code}"),
            Err(e) => error!("{kind} command failed: {e}"),
        }
    }

    // =========================================================================
    // File-operation boundary
    // =========================================================================

    /// Decide whether `fname` may be opened.
    ///
    /// `truncate` is true when the open discards the current content.
    pub fn check_open(&mut self, fname: &str, truncate: bool) -> Access {
        let config = self.config;
        let scanning = &config.scanning;
        let filepath = self.file_path(fname);

        if !scanning.scan_on_open {
            debug!(
                "Not scanned: scan on open is disabled: {}",
                filepath.display()
            );
            return Access::Allow;
        }

        if truncate {
            debug!("Not scanned: open truncates: {}", filepath.display());
            return Access::Allow;
        }

        let Ok(meta) = fs::metadata(&filepath) else {
            return Access::Allow;
        };
        if !meta.is_file() {
            debug!(
                "Not scanned: directory or special file: {}",
                filepath.display()
            );
            return Access::Allow;
        }
        if !scanning.size_in_range(meta.len()) {
            debug!(
                "Not scanned: file size {} out of range: {}",
                meta.len(),
                filepath.display()
            );
            return Access::Allow;
        }
        if scanning.is_excluded(fname) {
            debug!("Not scanned: exclude files: {}", filepath.display());
            return Access::Allow;
        }

        let errno = match self.scan(fname) {
            ScanVerdict::Clean => return Access::Allow,
            ScanVerdict::Infected(_) => config.infected.errno_on_open,
            ScanVerdict::ScanError(_) if !scanning.block_access_on_error => return Access::Allow,
            ScanVerdict::ScanError(_) | ScanVerdict::UnknownCode { .. } => {
                debug!("Block access: {}", filepath.display());
                config.scan_error.errno_on_open
            }
        };

        if errno == 0 {
            Access::Deny(Errno::ACCESS.raw_os_error())
        } else {
            Access::Deny(errno)
        }
    }

    /// Decide how the close of `fname` is reported.
    ///
    /// The file is already closed; a denial only changes the result the
    /// client sees. An errno of 0 reports success.
    pub fn check_close(&mut self, fname: &str, modified: bool, is_directory: bool) -> Access {
        let config = self.config;
        let scanning = &config.scanning;
        let filepath = self.file_path(fname);

        if is_directory {
            debug!("Not scanned: directory: {}", filepath.display());
            return Access::Allow;
        }
        if !scanning.scan_on_close {
            debug!(
                "Not scanned: scan on close is disabled: {}",
                filepath.display()
            );
            return Access::Allow;
        }
        if !modified {
            debug!("Not scanned: file not modified: {}", filepath.display());
            return Access::Allow;
        }

        let errno = match self.scan(fname) {
            ScanVerdict::Clean => return Access::Allow,
            ScanVerdict::Infected(_) => config.infected.errno_on_close,
            ScanVerdict::ScanError(_) if !scanning.block_access_on_error => return Access::Allow,
            ScanVerdict::ScanError(_) | ScanVerdict::UnknownCode { .. } => {
                debug!("Block access: {}", filepath.display());
                config.scan_error.errno_on_close
            }
        };

        if errno == 0 {
            Access::Allow
        } else {
            Access::Deny(errno)
        }
    }
}

impl Drop for VirusFilter<'_> {
    fn drop(&mut self) {
        debug!("Share '{}': closing scanner session", self.name);
        self.engine.recycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::InfectedAction;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    const EACCES: i32 = 13;

    #[derive(Default)]
    struct EngineLog {
        scanned: Vec<PathBuf>,
        recycles: usize,
    }

    /// Returns scripted verdicts, repeating the last one.
    struct FakeEngine {
        verdicts: VecDeque<ScanVerdict>,
        log: Rc<RefCell<EngineLog>>,
    }

    impl FakeEngine {
        fn new(verdicts: &[ScanVerdict]) -> (Box<Self>, Rc<RefCell<EngineLog>>) {
            let log = Rc::new(RefCell::new(EngineLog::default()));
            let engine = Self {
                verdicts: verdicts.iter().cloned().collect(),
                log: Rc::clone(&log),
            };
            (Box::new(engine), log)
        }
    }

    impl ScanEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        fn scan(&mut self, path: &Path) -> ScanVerdict {
            self.log.borrow_mut().scanned.push(path.to_path_buf());
            if self.verdicts.len() > 1 {
                self.verdicts.pop_front().unwrap_or(ScanVerdict::Clean)
            } else {
                self.verdicts.front().cloned().unwrap_or(ScanVerdict::Clean)
            }
        }

        fn recycle(&mut self) {
            self.log.borrow_mut().recycles += 1;
        }
    }

    type CommandLog = Rc<RefCell<Vec<(String, EnvList)>>>;

    struct RecordingRunner(CommandLog);

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &str, env: &EnvList) -> io::Result<i32> {
            self.0.borrow_mut().push((command.to_string(), env.clone()));
            Ok(0)
        }
    }

    struct Share {
        dir: tempfile::TempDir,
        config: ShareConfig,
    }

    impl Share {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = ShareConfig::default();
            config.path = dir.path().to_path_buf();
            config.infected.command = Some("notify-infected".to_string());
            config.scan_error.command = Some("notify-error".to_string());
            Self { dir, config }
        }

        fn write(&self, name: &str, size: usize) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, vec![b'x'; size]).unwrap();
            path
        }
    }

    fn filter<'a>(
        share: &'a Share,
        verdicts: &[ScanVerdict],
    ) -> (VirusFilter<'a>, Rc<RefCell<EngineLog>>, CommandLog) {
        let (engine, engine_log) = FakeEngine::new(verdicts);
        let commands = CommandLog::default();
        let filter = VirusFilter::new("test", &share.config, engine)
            .with_runner(Box::new(RecordingRunner(Rc::clone(&commands))));
        (filter, engine_log, commands)
    }

    fn infected() -> ScanVerdict {
        ScanVerdict::Infected("Eicar-Test-Signature".to_string())
    }

    #[test]
    fn clean_file_allowed_and_cached() {
        let share = Share::new();
        let path = share.write("report.doc", 500);
        let (mut filter, engine, commands) = filter(&share, &[ScanVerdict::Clean]);

        assert_eq!(filter.check_open("report.doc", false), Access::Allow);
        assert_eq!(filter.check_open("report.doc", false), Access::Allow);

        assert_eq!(engine.borrow().scanned, vec![path]);
        assert!(commands.borrow().is_empty());
        assert_eq!(filter.cache.as_ref().map(ResultCache::len), Some(1));
    }

    #[test]
    fn cache_disabled_scans_every_time() {
        let mut share = Share::new();
        share.config.cache.entry_limit = 0;
        share.write("a.txt", 100);
        let (mut filter, engine, _) = filter(&share, &[ScanVerdict::Clean]);

        filter.check_open("a.txt", false);
        filter.check_open("a.txt", false);

        assert!(filter.cache.is_none());
        assert_eq!(engine.borrow().scanned.len(), 2);
    }

    #[test]
    fn infected_delete_denies_and_skips_cache() {
        let mut share = Share::new();
        share.config.infected.action = InfectedAction::Delete;
        let path = share.write("eicar.com", 100);
        let (mut filter, engine, commands) = filter(&share, &[infected()]);

        assert_eq!(filter.check_open("eicar.com", false), Access::Deny(EACCES));
        assert!(!path.exists());
        assert_eq!(filter.cache.as_ref().map(ResultCache::len), Some(0));

        let commands = commands.borrow();
        assert_eq!(commands.len(), 1);
        let (command, env) = &commands[0];
        assert_eq!(command, "notify-infected");
        assert_eq!(env.get("VIRUSFILTER_VERSION"), Some(VERSION));
        assert_eq!(env.get("VIRUSFILTER_MODULE_NAME"), Some("virusfilter-fake"));
        assert_eq!(
            env.get("VIRUSFILTER_INFECTED_FILE_PATH"),
            Some(path.to_str().unwrap())
        );
        assert_eq!(
            env.get("VIRUSFILTER_INFECTED_FILE_REPORT"),
            Some("Eicar-Test-Signature")
        );
        assert_eq!(env.get("VIRUSFILTER_INFECTED_FILE_ACTION"), Some("delete"));
        assert_eq!(env.get("VIRUSFILTER_QUARANTINED_FILE_PATH"), None);
        assert_eq!(env.get("VIRUSFILTER_RESULT_IS_CACHE"), None);
        assert_eq!(engine.borrow().scanned.len(), 1);
    }

    #[test]
    fn infected_nothing_is_cached() {
        let share = Share::new();
        share.write("eicar.com", 100);
        let (mut filter, engine, commands) = filter(&share, &[infected()]);

        assert_eq!(filter.check_open("eicar.com", false), Access::Deny(EACCES));
        assert_eq!(filter.check_open("eicar.com", false), Access::Deny(EACCES));

        assert_eq!(engine.borrow().scanned.len(), 1);
        let commands = commands.borrow();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0].1.get("VIRUSFILTER_INFECTED_FILE_ACTION"),
            Some("nothing")
        );
        assert_eq!(commands[0].1.get("VIRUSFILTER_RESULT_IS_CACHE"), None);
        assert_eq!(commands[1].1.get("VIRUSFILTER_RESULT_IS_CACHE"), Some("yes"));
    }

    #[test]
    fn infected_quarantine_exports_destination() {
        let qdir = tempfile::tempdir().unwrap();
        let mut share = Share::new();
        share.config.infected.action = InfectedAction::Quarantine;
        share.config.infected.quarantine_directory = qdir.path().to_path_buf();
        let path = share.write("eicar.com", 100);
        let (mut filter, _, commands) = filter(&share, &[infected()]);

        assert_eq!(filter.check_open("eicar.com", false), Access::Deny(EACCES));

        assert!(!path.exists());
        let commands = commands.borrow();
        let env = &commands[0].1;
        assert_eq!(env.get("VIRUSFILTER_INFECTED_FILE_ACTION"), Some("quarantine"));
        let dest = PathBuf::from(env.get("VIRUSFILTER_QUARANTINED_FILE_PATH").unwrap());
        assert_eq!(dest.parent(), Some(qdir.path()));
        assert!(dest.exists());
    }

    #[test]
    fn failed_quarantine_degrades_to_nothing() {
        let mut share = Share::new();
        share.config.infected.action = InfectedAction::Quarantine;
        share.config.infected.quarantine_directory = share.dir.path().join("missing");
        let path = share.write("eicar.com", 100);
        let (mut filter, _, commands) = filter(&share, &[infected()]);

        assert_eq!(filter.check_open("eicar.com", false), Access::Deny(EACCES));

        assert!(path.exists());
        assert_eq!(
            commands.borrow()[0].1.get("VIRUSFILTER_INFECTED_FILE_ACTION"),
            Some("nothing")
        );
        assert_eq!(filter.cache.as_ref().map(ResultCache::len), Some(1));
    }

    #[test]
    fn scan_error_allowed_by_default() {
        let share = Share::new();
        let path = share.write("a.txt", 100);
        let (mut filter, _, commands) =
            filter(&share, &[ScanVerdict::ScanError(Some("timed out".to_string()))]);

        assert_eq!(filter.check_open("a.txt", false), Access::Allow);

        let commands = commands.borrow();
        assert_eq!(commands.len(), 1);
        let (command, env) = &commands[0];
        assert_eq!(command, "notify-error");
        assert_eq!(
            env.get("VIRUSFILTER_SCAN_ERROR_FILE_PATH"),
            Some(path.to_str().unwrap())
        );
        assert_eq!(env.get("VIRUSFILTER_SCAN_ERROR_REPORT"), Some("timed out"));
    }

    #[test]
    fn scan_error_cached_result_is_flagged() {
        let share = Share::new();
        share.write("a.txt", 100);
        let (mut filter, engine, commands) = filter(&share, &[ScanVerdict::ScanError(None)]);

        filter.check_open("a.txt", false);
        filter.check_open("a.txt", false);

        assert_eq!(engine.borrow().scanned.len(), 1);
        let commands = commands.borrow();
        assert_eq!(commands[0].1.get("VIRUSFILTER_SCAN_ERROR_REPORT"), None);
        assert_eq!(commands[1].1.get("VIRUSFILTER_RESULT_IS_CACHE"), Some("1"));
    }

    #[test]
    fn scan_error_blocks_when_configured() {
        let mut share = Share::new();
        share.config.scanning.block_access_on_error = true;
        share.config.scan_error.errno_on_open = 5;
        share.write("a.txt", 100);
        let (mut filter, _, _) = filter(&share, &[ScanVerdict::ScanError(None)]);

        assert_eq!(filter.check_open("a.txt", false), Access::Deny(5));
    }

    #[test]
    fn unknown_code_always_blocks() {
        let share = Share::new();
        share.write("a.txt", 100);
        let unknown = ScanVerdict::UnknownCode {
            code: "STRANGE".to_string(),
            report: Some("/srv/a.txt: STRANGE".to_string()),
        };
        let (mut filter, _, commands) = filter(&share, &[unknown]);

        assert!(!share.config.scanning.block_access_on_error);
        assert_eq!(filter.check_open("a.txt", false), Access::Deny(EACCES));
        assert_eq!(
            commands.borrow()[0].1.get("VIRUSFILTER_SCAN_ERROR_REPORT"),
            Some("/srv/a.txt: STRANGE")
        );
    }

    #[test]
    fn zero_open_errno_falls_back_to_eacces() {
        let mut share = Share::new();
        share.config.infected.errno_on_open = 0;
        share.write("eicar.com", 100);
        let (mut filter, _, _) = filter(&share, &[infected()]);

        assert_eq!(filter.check_open("eicar.com", false), Access::Deny(EACCES));
    }

    #[test]
    fn open_skips_without_scanning() {
        let mut share = Share::new();
        share.config.scanning.exclude_files = vec!["*.iso".to_string()];
        share.config.scanning.max_file_size = 1000;
        share.write("tiny", 5);
        share.write("huge", 2000);
        share.write("image.iso", 100);
        share.write("trunc.txt", 100);
        fs::create_dir(share.dir.path().join("subdir")).unwrap();
        let (mut filter, engine, _) = filter(&share, &[infected()]);

        for name in ["tiny", "huge", "image.iso", "subdir", "missing"] {
            assert_eq!(filter.check_open(name, false), Access::Allow, "{name}");
        }
        assert_eq!(filter.check_open("trunc.txt", true), Access::Allow);

        assert!(engine.borrow().scanned.is_empty());
    }

    #[test]
    fn open_scanning_disabled() {
        let mut share = Share::new();
        share.config.scanning.scan_on_open = false;
        share.write("eicar.com", 100);
        let (mut filter, engine, _) = filter(&share, &[infected()]);

        assert_eq!(filter.check_open("eicar.com", false), Access::Allow);
        assert!(engine.borrow().scanned.is_empty());
    }

    #[test]
    fn close_checks() {
        let mut share = Share::new();
        share.config.scanning.scan_on_close = true;
        share.write("eicar.com", 100);
        let (mut filter, engine, _) = filter(&share, &[infected()]);

        assert_eq!(filter.check_close("eicar.com", false, false), Access::Allow);
        assert_eq!(filter.check_close("eicar.com", true, true), Access::Allow);
        assert!(engine.borrow().scanned.is_empty());

        // Default close errno of 0 reports success
        assert_eq!(filter.check_close("eicar.com", true, false), Access::Allow);
        assert_eq!(engine.borrow().scanned.len(), 1);
    }

    #[test]
    fn close_reports_configured_errno() {
        let mut share = Share::new();
        share.config.scanning.scan_on_close = true;
        share.config.infected.errno_on_close = 5;
        share.config.scan_error.errno_on_close = 11;
        share.write("eicar.com", 100);
        share.write("broken", 100);
        let unknown = ScanVerdict::UnknownCode {
            code: "X".to_string(),
            report: None,
        };
        let (mut filter, _, _) = filter(&share, &[infected(), unknown]);

        assert_eq!(filter.check_close("eicar.com", true, false), Access::Deny(5));
        assert_eq!(filter.check_close("broken", true, false), Access::Deny(11));
    }

    #[test]
    fn close_scanning_disabled() {
        let share = Share::new();
        share.write("eicar.com", 100);
        let (mut filter, engine, _) = filter(&share, &[infected()]);

        assert_eq!(filter.check_close("eicar.com", true, false), Access::Allow);
        assert!(engine.borrow().scanned.is_empty());
    }

    #[test]
    fn recycle_after_every_scan_by_default() {
        let mut share = Share::new();
        share.config.cache.entry_limit = 0;
        share.write("a.txt", 100);
        let (mut filter, engine, _) = filter(&share, &[ScanVerdict::Clean]);

        for _ in 0..3 {
            filter.scan("a.txt");
        }
        assert_eq!(engine.borrow().recycles, 3);
    }

    #[test]
    fn recycle_after_request_limit() {
        let mut share = Share::new();
        share.config.cache.entry_limit = 0;
        share.config.scanning.scan_request_limit = 3;
        share.write("a.txt", 100);
        let (mut filter, engine, _) = filter(&share, &[ScanVerdict::Clean]);

        for _ in 0..7 {
            filter.scan("a.txt");
        }
        assert_eq!(engine.borrow().recycles, 2);

        drop(filter);
        assert_eq!(engine.borrow().recycles, 3);
    }

    #[test]
    fn cache_hit_skips_engine_and_recycle() {
        let share = Share::new();
        share.write("a.txt", 100);
        let (mut filter, engine, _) = filter(&share, &[ScanVerdict::Clean]);

        assert_matches!(filter.scan("a.txt"), ScanVerdict::Clean);
        assert_matches!(filter.scan("a.txt"), ScanVerdict::Clean);

        assert_eq!(engine.borrow().scanned.len(), 1);
        assert_eq!(engine.borrow().recycles, 1);
    }
}
