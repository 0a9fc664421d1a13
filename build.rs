use std::path::Path;

/// `[package].version` of the manifest at `path`, if it can be read.
fn package_version(path: &Path) -> Option<String> {
    let doc: toml_edit::DocumentMut = std::fs::read_to_string(path).ok()?.parse().ok()?;
    doc.get("package")?
        .get("version")?
        .as_str()
        .map(str::to_owned)
}

fn main() {
    let runtime_manifest = Path::new("tracemark-runtime/Cargo.toml");
    println!("cargo::rerun-if-changed={}", runtime_manifest.display());

    // Outside the workspace the sibling crate is absent; both are released
    // under one version number.
    let version = package_version(runtime_manifest)
        .unwrap_or_else(|| std::env::var("CARGO_PKG_VERSION").unwrap_or_default());
    println!("cargo::rustc-env=TRACEMARK_RUNTIME_VERSION={version}");
}
