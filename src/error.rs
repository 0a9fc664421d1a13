use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid runtime crate name {name:?}: {source}")]
    InvalidRuntimeCrate {
        name: String,
        #[source]
        source: syn::Error,
    },

    #[error("no Cargo.toml found in {} or any parent directory", .0.display())]
    NoProjectFound(PathBuf),

    #[error("no .rs files found under {}", .0.display())]
    NoSources(PathBuf),

    #[error("{0}")]
    Manifest(String),

    #[error("{count} file(s) failed")]
    FilesFailed { count: usize },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
