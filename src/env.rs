// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment for notification commands.
//!
//! An ordered list of `KEY=VALUE` entries, unique by key. New keys are
//! appended in call order; setting an existing key rewrites that entry in
//! place. Storage grows in fixed chunks and always keeps one spare slot,
//! the position an `execve`-style terminator would occupy.

/// Number of slots added each time the list runs out of room.
pub const ENV_SIZE_CHUNK: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct EnvList {
    entries: Vec<String>,
}

impl EnvList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(ENV_SIZE_CHUNK),
        }
    }

    /// Set `key` to `value`, replacing an existing entry for the same key.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| entry_key(e) == key) {
            // Reuses the entry's allocation when it is large enough
            entry.clear();
            entry.push_str(key);
            entry.push('=');
            entry.push_str(value);
            return;
        }

        if self.entries.len() + 1 >= self.entries.capacity() {
            self.entries.reserve_exact(ENV_SIZE_CHUNK);
        }
        self.entries.push(format!("{key}={value}"));
    }

    /// Value currently set for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| entry_key(e) == key)
            .map(|e| &e[key.len() + 1..])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries as `KEY=VALUE` strings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Entries split into `(key, value)` pairs, for `Command::envs`.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.split_once('='))
    }
}

fn entry_key(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(k, _)| k)
}
