//! Runtime half of tracemark: the registry that instrumented code records
//! into, and helpers for getting its contents onto disk.
//!
//! Instrumented files carry
//!
//! ```ignore
//! use tracemark_runtime::record as __tracemark;
//! ```
//!
//! and start every function with `__tracemark("<file>", "<name>");`.

mod dump;
mod registry;

pub use dump::{
    dump, dump_to, install_panic_dump, PeriodicDump, DEFAULT_INTERVAL, DUMP_ENV, INTERVAL_ENV,
};
pub use registry::{
    clear, contains, count, decode_key, encode_key, global, list, record, Registry, SEPARATOR,
};
