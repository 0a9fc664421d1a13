//! Shape of the injected probe and its import.
//!
//! A probe is the statement `__tracemark("<file>", "<name>");` and the import
//! is `use <runtime>::record as __tracemark;`. Detection is structural: a
//! probe is an expression statement calling the bare path `__tracemark`,
//! whatever its arguments look like.

use quote::format_ident;
use syn::visit::Visit;

/// Local name every instrumented file binds the probe entry point to.
pub const PROBE_IDENT: &str = "__tracemark";

/// Crate the probe entry point is imported from by default.
pub const DEFAULT_RUNTIME_CRATE: &str = "tracemark_runtime";

/// Entry point inside the runtime crate.
pub const ENTRY_POINT: &str = "record";

/// Probe statement for `name` in `file`.
pub fn probe_stmt(file: &str, name: &str) -> syn::Stmt {
    let probe = format_ident!("{}", PROBE_IDENT);
    syn::parse_quote! {
        #probe(#file, #name);
    }
}

/// Source text of the probe statement, formatted the way it is spliced into
/// retained-layout output.
pub fn probe_text(file: &str, name: &str) -> String {
    format!(
        "{PROBE_IDENT}({}, {});",
        proc_macro2::Literal::string(file),
        proc_macro2::Literal::string(name)
    )
}

/// Source text of the import for `runtime_crate`.
pub fn import_text(runtime_crate: &str) -> String {
    format!("use {runtime_crate}::{ENTRY_POINT} as {PROBE_IDENT};")
}

/// Import item for `runtime_crate`. Fails if the crate name is not a path.
pub fn import_item(runtime_crate: &str) -> Result<syn::Item, syn::Error> {
    syn::parse_str(&import_text(runtime_crate))
}

/// Whether `stmt` is a call to the probe entry point.
pub fn is_probe_stmt(stmt: &syn::Stmt) -> bool {
    match stmt {
        syn::Stmt::Expr(syn::Expr::Call(call), Some(_)) => is_probe_callee(&call.func),
        _ => false,
    }
}

fn is_probe_callee(func: &syn::Expr) -> bool {
    match func {
        syn::Expr::Path(p) => p.qself.is_none() && p.path.is_ident(PROBE_IDENT),
        _ => false,
    }
}

/// The (file, name) string arguments of a probe statement.
///
/// Returns `None` for statements that are not probes or whose arguments are
/// not two string literals.
pub fn probe_args(stmt: &syn::Stmt) -> Option<(String, String)> {
    let syn::Stmt::Expr(syn::Expr::Call(call), Some(_)) = stmt else {
        return None;
    };
    if !is_probe_callee(&call.func) || call.args.len() != 2 {
        return None;
    }
    let mut args = call.args.iter().map(|arg| match arg {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(s),
            ..
        }) => Some(s.value()),
        _ => None,
    });
    let file = args.next()??;
    let name = args.next()??;
    Some((file, name))
}

/// Whether `item` is a `use` whose only binding is the probe identifier.
///
/// Grouped imports (`use a::{b, record as __tracemark}`) are not ours and are
/// never reported, so the stripper leaves them alone.
pub fn is_probe_import(item: &syn::Item) -> bool {
    match item {
        syn::Item::Use(u) => binds_probe(&u.tree),
        _ => false,
    }
}

fn binds_probe(tree: &syn::UseTree) -> bool {
    match tree {
        syn::UseTree::Path(p) => binds_probe(&p.tree),
        syn::UseTree::Name(n) => n.ident == PROBE_IDENT,
        syn::UseTree::Rename(r) => r.rename == PROBE_IDENT,
        syn::UseTree::Glob(_) | syn::UseTree::Group(_) => false,
    }
}

/// Whether any item in a scope already binds the probe identifier.
pub fn has_probe_import(items: &[syn::Item]) -> bool {
    items.iter().any(is_probe_import)
}

/// Number of probe calls inside a module scope's items. Inline child modules
/// are scopes of their own and are not counted.
pub fn probes_in_scope(items: &[syn::Item]) -> usize {
    struct Count(usize);

    impl<'ast> Visit<'ast> for Count {
        fn visit_stmt(&mut self, stmt: &'ast syn::Stmt) {
            if is_probe_stmt(stmt) {
                self.0 += 1;
            }
            syn::visit::visit_stmt(self, stmt);
        }

        fn visit_item_mod(&mut self, _: &'ast syn::ItemMod) {}
    }

    let mut count = Count(0);
    for item in items {
        count.visit_item(item);
    }
    count.0
}
