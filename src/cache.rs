// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Short-lived scan result cache.
//!
//! Keeps the most recent verdicts keyed by the share-relative file name so
//! that a file opened repeatedly under load is not rescanned each time.
//!
//! Bounded both by entry count and by entry age. Eviction is first-in
//! first-out by insertion time: a lookup hit does not refresh an entry.

use std::collections::TryReserveError;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use crate::scanner::ScanVerdict;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot allocate cache entry: {0}")]
    AllocationFailed(#[from] TryReserveError),
}

/// Time source for entry ages.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// One cached verdict.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub filename: String,
    pub verdict: ScanVerdict,
    created_at: Instant,
}

/// Scan result cache, newest entry at the front.
pub struct ResultCache<C: Clock = SystemClock> {
    entries: VecDeque<CacheEntry>,
    count_limit: usize,
    age_limit: Duration,
    clock: C,
}

impl ResultCache<SystemClock> {
    /// Build a cache from configured limits.
    ///
    /// A non-positive entry limit disables caching and returns `None`.
    #[must_use]
    pub fn from_limits(entry_limit: i64, age_limit: Duration) -> Option<Self> {
        let count_limit = usize::try_from(entry_limit).ok().filter(|&n| n > 0)?;
        Some(Self::with_clock(count_limit, age_limit, SystemClock))
    }
}

impl<C: Clock> ResultCache<C> {
    #[must_use]
    pub fn with_clock(count_limit: usize, age_limit: Duration, clock: C) -> Self {
        Self {
            entries: VecDeque::new(),
            count_limit,
            age_limit,
            clock,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `filename` by exact byte equality after purging expired entries.
    pub fn get(&mut self, filename: &str) -> Option<&CacheEntry> {
        self.purge();
        debug!("Searching cache entry: {filename}");
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// Insert a fresh entry at the front, then purge.
    pub fn add(&mut self, filename: &str, verdict: ScanVerdict) -> Result<(), CacheError> {
        self.entries.try_reserve(1)?;
        let mut name = String::new();
        name.try_reserve_exact(filename.len())?;
        name.push_str(filename);

        debug!("Adding cache entry: {filename} ({verdict})");
        self.entries.push_front(CacheEntry {
            filename: name,
            verdict,
            created_at: self.clock.now(),
        });
        self.purge();
        Ok(())
    }

    /// Drop entries from the oldest end while either bound is exceeded.
    fn purge(&mut self) {
        let now = self.clock.now();
        while let Some(oldest) = self.entries.back() {
            let age = now.saturating_duration_since(oldest.created_at);
            if self.entries.len() <= self.count_limit && age < self.age_limit {
                break;
            }
            debug!("Purging cache entry: {}", oldest.filename);
            self.entries.pop_back();
        }
    }
}
