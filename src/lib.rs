pub mod error;
pub mod identity;
pub mod known;
pub mod manifest;
pub mod probe;
pub mod report;
pub mod rewrite;
pub mod sources;
pub mod strip;

mod splice;
mod visit;
