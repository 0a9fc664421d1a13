use std::path::{Path, PathBuf};

use toml_edit::DocumentMut;

use crate::error::Error;

/// Package name of the runtime crate in `[dependencies]`.
pub const RUNTIME_PACKAGE: &str = "tracemark-runtime";

/// How to reference tracemark-runtime in the project's Cargo.toml.
pub(crate) enum RuntimeSource<'a> {
    /// Published crate version (e.g. "0.1.0").
    Version(&'a str),
    /// Local path to a checkout of the runtime crate.
    Path(&'a Path),
}

/// What happened to the project's Cargo.toml.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injected {
    Added,
    /// The project already depends on the runtime; the entry was left alone.
    AlreadyPresent,
}

/// Add `tracemark-runtime` as a dependency in the project's Cargo.toml.
/// Uses `toml_edit` for structured manipulation (never string replacement).
pub fn inject_runtime_dependency(project: &Path, runtime_version: &str) -> Result<Injected, Error> {
    inject_runtime(project, RuntimeSource::Version(runtime_version))
}

/// Add `tracemark-runtime` as a path dependency in the project's Cargo.toml.
pub fn inject_runtime_path_dependency(
    project: &Path,
    runtime_path: &Path,
) -> Result<Injected, Error> {
    inject_runtime(project, RuntimeSource::Path(runtime_path))
}

fn inject_runtime(project: &Path, source: RuntimeSource<'_>) -> Result<Injected, Error> {
    let cargo_toml_path = project.join("Cargo.toml");
    let content = std::fs::read_to_string(&cargo_toml_path)?;

    let mut doc: DocumentMut = content
        .parse::<DocumentMut>()
        .map_err(|e| Error::Manifest(format!("{}: {e}", cargo_toml_path.display())))?;

    // Ensure [dependencies] table exists.
    if !doc.contains_table("dependencies") {
        doc["dependencies"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let Some(deps) = doc["dependencies"].as_table_like_mut() else {
        return Err(Error::Manifest(format!(
            "{}: [dependencies] is not a table",
            cargo_toml_path.display()
        )));
    };
    if deps.contains_key(RUNTIME_PACKAGE) {
        return Ok(Injected::AlreadyPresent);
    }

    let entry = match source {
        RuntimeSource::Version(v) => toml_edit::value(v),
        RuntimeSource::Path(p) => {
            let mut table = toml_edit::InlineTable::new();
            table.insert("path", p.to_string_lossy().as_ref().into());
            toml_edit::Item::Value(toml_edit::Value::InlineTable(table))
        }
    };
    deps.insert(RUNTIME_PACKAGE, entry);

    std::fs::write(&cargo_toml_path, doc.to_string())?;
    tracing::debug!(manifest = %cargo_toml_path.display(), "added runtime dependency");

    Ok(Injected::Added)
}

/// Find the project root by walking up from `start_dir` looking for Cargo.toml.
///
/// Returns the canonicalized directory containing the nearest Cargo.toml.
/// Starts checking `start_dir` itself, then walks up through parents.
pub fn find_project_root(start_dir: &Path) -> Result<PathBuf, Error> {
    let start = start_dir
        .canonicalize()
        .map_err(|_| Error::NoProjectFound(start_dir.to_path_buf()))?;
    let mut dir = start.as_path();
    loop {
        if dir.join("Cargo.toml").exists() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Err(Error::NoProjectFound(start_dir.to_path_buf())),
        }
    }
}
