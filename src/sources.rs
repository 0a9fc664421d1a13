use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::Error;

/// All `.rs` files under `src_dir`, sorted. Honors `.gitignore` and skips
/// `target/` wherever it appears.
pub fn discover(src_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let walker = WalkBuilder::new(src_dir)
        .hidden(false)
        .follow_links(true)
        .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != "target")
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_some_and(|ft| ft.is_file())
            && path.extension().is_some_and(|ext| ext == "rs")
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(Error::NoSources(src_dir.to_path_buf()));
    }
    tracing::debug!(dir = %src_dir.display(), files = files.len(), "discovered sources");
    Ok(files)
}

/// Identifier baked into the probes of `path`: its canonical path.
pub fn file_identifier(path: &Path) -> Result<String, Error> {
    let canonical = path.canonicalize().map_err(|source| Error::ReadSource {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(canonical.to_string_lossy().into_owned())
}

/// Read `path` as UTF-8 source text.
pub fn read_source(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::ReadSource {
        path: path.to_path_buf(),
        source,
    })
}
