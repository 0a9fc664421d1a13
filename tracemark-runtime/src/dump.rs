//! Persisting the registry to disk.
//!
//! The dump format is one encoded key per line, sorted, written with a
//! truncating overwrite. It is the same format `tracemark strip` reads as its
//! known-identity input, so a dump can be piped straight into the removal
//! pass.
//!
//! Failures here never touch the in-memory registry: the periodic dumper and
//! the panic hook print a warning and keep going.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::registry::{global, Registry};

/// Environment variable naming the dump file for [`PeriodicDump::from_env`].
pub const DUMP_ENV: &str = "TRACEMARK_DUMP";

/// Environment variable overriding the dump interval, in whole seconds.
pub const INTERVAL_ENV: &str = "TRACEMARK_DUMP_INTERVAL_SECS";

/// Interval used when `TRACEMARK_DUMP_INTERVAL_SECS` is unset or invalid.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Write every key in `registry` to `path`, replacing its contents.
///
/// Returns the number of keys written.
pub fn dump_to(registry: &Registry, path: &Path) -> std::io::Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let keys = registry.keys();
    let mut f = std::io::BufWriter::new(std::fs::File::create(path)?);
    for key in &keys {
        writeln!(f, "{key}")?;
    }
    f.flush()?;
    Ok(keys.len())
}

/// Dump the global registry to `path`.
pub fn dump(path: &Path) -> std::io::Result<usize> {
    dump_to(global(), path)
}

fn dump_or_warn(path: &Path) {
    if let Err(e) = dump(path) {
        eprintln!(
            "warning: tracemark failed to dump registry to {}: {e}",
            path.display()
        );
    }
}

/// Background thread that dumps the global registry on a fixed interval.
///
/// Dropping the handle (or calling [`PeriodicDump::stop`]) wakes the thread,
/// which writes one final dump before exiting.
#[must_use = "dropping the handle stops the dumper immediately; bind it with `let _dump = ...`"]
pub struct PeriodicDump {
    path: PathBuf,
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicDump {
    /// Start dumping the global registry to `path` every `interval`.
    pub fn start(path: impl Into<PathBuf>, interval: Duration) -> Self {
        let path = path.into();
        let stop = Arc::new((Mutex::new(false), Condvar::new()));

        let thread_path = path.clone();
        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("tracemark-dump".into())
            .spawn(move || run_dumper(&thread_path, interval, &thread_stop));

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                eprintln!("warning: tracemark could not start its dump thread: {e}");
                None
            }
        };

        Self { path, stop, handle }
    }

    /// Start a dumper configured by `TRACEMARK_DUMP` and
    /// `TRACEMARK_DUMP_INTERVAL_SECS`. Returns `None` when no dump path is set.
    pub fn from_env() -> Option<Self> {
        let path = std::env::var_os(DUMP_ENV).filter(|p| !p.is_empty())?;
        Some(Self::start(PathBuf::from(path), interval_from_env()))
    }

    /// The file this dumper writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop the background thread after one final dump.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        {
            let (lock, cvar) = &*self.stop;
            *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
            cvar.notify_all();
        }
        if handle.join().is_err() {
            // The thread only panics if a dump panicked; flush from here instead.
            dump_or_warn(&self.path);
        }
    }
}

impl Drop for PeriodicDump {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_dumper(path: &Path, interval: Duration, stop: &(Mutex<bool>, Condvar)) {
    let (lock, cvar) = stop;
    let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
    loop {
        let (guard, _timeout) = cvar
            .wait_timeout_while(stopped, interval, |stopped| !*stopped)
            .unwrap_or_else(|e| e.into_inner());
        stopped = guard;
        dump_or_warn(path);
        if *stopped {
            return;
        }
    }
}

fn interval_from_env() -> Duration {
    std::env::var(INTERVAL_ENV)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_INTERVAL)
}

/// Dump the global registry to `path` whenever the process panics.
///
/// The previously installed hook still runs afterwards.
pub fn install_panic_dump(path: impl Into<PathBuf>) {
    let path = path.into();
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        dump_or_warn(&path);
        previous(info);
    }));
}
