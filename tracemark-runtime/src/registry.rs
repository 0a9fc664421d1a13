//! Process-wide set of observed probe keys.
//!
//! Every instrumented function starts with `__tracemark(file, name);`, which
//! resolves to [`record`] and inserts `"<file>::<name>"` into the global
//! [`Registry`]. The set only answers "has this key fired at least once";
//! there are no counts and no timestamps.
//!
//! Hot path: probes fire on every call of an instrumented function, so
//! `record` encodes the key into a thread-local buffer and checks membership
//! under a shared read lock. The write lock is only taken the first time a
//! key is seen.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Separator between the file identifier and the function name.
pub const SEPARATOR: &str = "::";

/// Encode a (file, function) pair as a registry key.
pub fn encode_key(file: &str, function: &str) -> String {
    let mut key = String::with_capacity(file.len() + SEPARATOR.len() + function.len());
    write_key(&mut key, file, function);
    key
}

/// Split an encoded key at the first separator.
///
/// Keys without a separator decode to an empty function name.
pub fn decode_key(key: &str) -> (String, String) {
    match key.split_once(SEPARATOR) {
        Some((file, function)) => (file.to_string(), function.to_string()),
        None => (key.to_string(), String::new()),
    }
}

fn write_key(buf: &mut String, file: &str, function: &str) {
    buf.clear();
    buf.push_str(file);
    buf.push_str(SEPARATOR);
    buf.push_str(function);
}

thread_local! {
    static KEY_BUF: RefCell<String> = RefCell::new(String::new());
}

/// A set of observed identity keys.
///
/// Instrumented programs use the single instance behind [`global`]; tests and
/// hosts that want isolation can own a `Registry` directly.
#[derive(Debug, Default)]
pub struct Registry {
    keys: RwLock<HashSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `function` in `file` ran. No-op if already recorded.
    pub fn record(&self, file: &str, function: &str) {
        let recorded = KEY_BUF.try_with(|buf| {
            // A probe can fire while the buffer is borrowed (e.g. from a
            // panic hook that itself runs instrumented code); fall back to a
            // fresh allocation in that case.
            match buf.try_borrow_mut() {
                Ok(mut buf) => {
                    write_key(&mut buf, file, function);
                    self.insert_str(&buf);
                }
                Err(_) => self.insert_str(&encode_key(file, function)),
            }
        });
        // Thread-local already destroyed (probe firing during thread teardown).
        if recorded.is_err() {
            self.insert_str(&encode_key(file, function));
        }
    }

    fn insert_str(&self, key: &str) {
        if self.read().contains(key) {
            return;
        }
        self.write().insert(key.to_string());
    }

    /// Whether `function` in `file` has been recorded.
    pub fn contains(&self, file: &str, function: &str) -> bool {
        self.read().contains(&encode_key(file, function))
    }

    /// Number of distinct keys recorded.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// All recorded (file, function) pairs. Order is unspecified.
    pub fn list(&self) -> Vec<(String, String)> {
        self.read().iter().map(|key| decode_key(key)).collect()
    }

    /// All recorded keys in their encoded form, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().iter().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Forget every recorded key.
    pub fn clear(&self) {
        self.write().clear();
    }

    // Lock poisoning can only come from a panic inside one of the methods
    // above, none of which leave the set half-updated.
    fn read(&self) -> RwLockReadGuard<'_, HashSet<String>> {
        self.keys.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<String>> {
        self.keys.write().unwrap_or_else(|e| e.into_inner())
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry every probe records into.
///
/// Created on first use and never torn down.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::new)
}

/// Probe entry point. Instrumented files import this as `__tracemark`.
pub fn record(file: &str, function: &str) {
    global().record(file, function);
}

/// Whether the global registry has seen `function` in `file`.
pub fn contains(file: &str, function: &str) -> bool {
    global().contains(file, function)
}

/// Number of distinct keys in the global registry.
pub fn count() -> usize {
    global().count()
}

/// All (file, function) pairs in the global registry.
pub fn list() -> Vec<(String, String)> {
    global().list()
}

/// Empty the global registry. Meant for test isolation.
pub fn clear() {
    global().clear();
}
