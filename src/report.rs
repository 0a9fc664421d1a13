use std::path::{Path, PathBuf};

use syn::spanned::Spanned;
use syn::visit::Visit;

use crate::error::Error;
use crate::probe::{is_probe_stmt, probe_args};
use crate::rewrite::parse;
use crate::sources::read_source;

/// A probe still present in the tree: a function that was never observed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Suspect {
    /// File the probe was found in.
    pub path: PathBuf,
    /// File identifier baked into the probe.
    pub file: String,
    pub name: String,
    /// 1-based line of the probe.
    pub line: usize,
}

/// A file the scan could not read or parse.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Remaining probes across a tree.
#[derive(Debug, Default, serde::Serialize)]
pub struct Report {
    pub files_scanned: usize,
    pub suspects: Vec<Suspect>,
    pub failures: Vec<ScanFailure>,
}

/// Probes present in `source`, in source order.
///
/// Probes whose arguments are not two string literals are skipped; they were
/// not written by the instrumenter.
pub fn scan_source(path: &Path, source: &str) -> Result<Vec<Suspect>, Error> {
    let file = parse(&path.to_string_lossy(), source)?;
    let mut finder = ProbeFinder {
        path,
        found: Vec::new(),
    };
    finder.visit_file(&file);
    Ok(finder.found)
}

/// Scan every file in `files`. Unreadable or unparsable files are recorded
/// as failures and the scan continues.
pub fn scan_tree(files: &[PathBuf]) -> Report {
    let mut report = Report::default();
    for path in files {
        let result = read_source(path).and_then(|source| scan_source(path, &source));
        match result {
            Ok(found) => {
                report.files_scanned += 1;
                report.suspects.extend(found);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "scan failed");
                report.failures.push(ScanFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

struct ProbeFinder<'a> {
    path: &'a Path,
    found: Vec<Suspect>,
}

impl<'ast> Visit<'ast> for ProbeFinder<'_> {
    fn visit_stmt(&mut self, stmt: &'ast syn::Stmt) {
        if is_probe_stmt(stmt)
            && let Some((file, name)) = probe_args(stmt)
        {
            self.found.push(Suspect {
                path: self.path.to_path_buf(),
                file,
                name,
                line: stmt.span().start().line,
            });
        }
        syn::visit::visit_stmt(self, stmt);
    }
}

/// Format a report as a text table, one row per suspect, paths shown
/// relative to `root` where possible.
pub fn format_table(report: &Report, root: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<48} {:>6}  {}\n", "File", "Line", "Function"));
    out.push_str(&format!("{}\n", "-".repeat(72)));

    for suspect in &report.suspects {
        let shown = suspect.path.strip_prefix(root).unwrap_or(&suspect.path);
        out.push_str(&format!(
            "{:<48} {:>6}  {}\n",
            shown.display(),
            suspect.line,
            suspect.name
        ));
    }

    out.push_str(&format!(
        "\n{} suspect(s) in {} file(s)\n",
        report.suspects.len(),
        report.files_scanned
    ));
    out
}
