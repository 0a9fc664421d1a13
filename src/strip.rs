use std::collections::HashSet;

use syn::spanned::Spanned;

use crate::error::Error;
use crate::identity::encode_key;
use crate::probe::{is_probe_import, is_probe_stmt, probes_in_scope};
use crate::rewrite::{Layout, parse};
use crate::splice::Splice;
use crate::visit::{FnBody, FnHandler, FnVisitor};

#[derive(Debug, Clone, Copy, Default)]
pub struct StripOptions {
    pub layout: Layout,
}

/// Result of stripping a source file.
#[derive(Debug)]
pub struct Stripped {
    pub source: String,
    /// Identity keys whose probes were removed, in traversal order.
    pub removed: Vec<String>,
    /// Identity keys of first-position probes left in place, in traversal
    /// order.
    pub remaining: Vec<String>,
}

/// Remove the probe from every function-like node whose identity key is in
/// `known`.
///
/// Only a probe in first position of a block body is considered, and one
/// probe is removed per body. Closures that were expression-bodied before
/// instrumentation keep their block. A module scope's probe import is removed
/// once no probe call is left anywhere in it.
pub fn strip_source(
    file: &str,
    source: &str,
    known: &HashSet<String>,
    options: &StripOptions,
) -> Result<Stripped, Error> {
    let mut tree = parse(file, source)?;
    let stripper = Stripper {
        file,
        known,
        splice: Splice::new(source),
        removed: Vec::new(),
        remaining: Vec::new(),
    };
    let stripper = FnVisitor::new(stripper).run(&mut tree);
    tracing::debug!(
        file,
        removed = stripper.removed.len(),
        remaining = stripper.remaining.len(),
        "stripped"
    );

    let source = match options.layout {
        Layout::Retain => stripper.splice.apply(),
        Layout::Pretty => prettyplease::unparse(&tree),
    };
    Ok(Stripped {
        source,
        removed: stripper.removed,
        remaining: stripper.remaining,
    })
}

struct Stripper<'a> {
    file: &'a str,
    known: &'a HashSet<String>,
    splice: Splice<'a>,
    removed: Vec<String>,
    remaining: Vec<String>,
}

impl Stripper<'_> {
    fn delete_node(&mut self, node: &impl Spanned, end: proc_macro2::Span) {
        let start = self.splice.offset(node.span().start());
        let end = self.splice.offset(end.end());
        self.splice.delete(start, end);
    }
}

impl FnHandler for Stripper<'_> {
    fn function(&mut self, name: &str, body: FnBody<'_>) -> bool {
        let block = match body {
            FnBody::Block(block, _) => block,
            FnBody::Closure(closure) => match &mut *closure.body {
                syn::Expr::Block(b) => &mut b.block,
                _ => return false,
            },
        };
        let Some(first) = block.stmts.first() else {
            return false;
        };
        if !is_probe_stmt(first) {
            return false;
        }

        let key = encode_key(self.file, name);
        if !self.known.contains(&key) {
            self.remaining.push(key);
            return true;
        }
        if let syn::Stmt::Expr(call, Some(semi)) = first {
            self.delete_node(call, semi.span());
        }
        block.stmts.remove(0);
        self.removed.push(key.clone());

        // A body instrumented twice keeps its second probe.
        if block.stmts.first().is_some_and(is_probe_stmt) {
            self.remaining.push(key);
            return true;
        }
        false
    }

    fn scope(&mut self, items: &mut Vec<syn::Item>, probes: usize) {
        if probes > 0 || probes_in_scope(items) > 0 {
            return;
        }
        for item in items.iter() {
            if let syn::Item::Use(u) = item
                && is_probe_import(item)
            {
                self.delete_node(u, u.semi_token.span());
            }
        }
        items.retain(|item| !is_probe_import(item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::{InstrumentOptions, instrument_source};

    fn known(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn instrument(source: &str) -> String {
        instrument_source("f.rs", source, &InstrumentOptions::default())
            .unwrap()
            .source
    }

    fn strip(source: &str, keys: &[&str]) -> Stripped {
        strip_source("f.rs", source, &known(keys), &StripOptions::default()).unwrap()
    }

    const PROGRAM: &str = r#"//! Walks things.

use std::fmt;

/// A walker.
struct Walker;

impl Walker {
    // Takes one step.
    fn walk(&self) -> u32 {
        let step = || {
            1
        };
        step()
    }
}

fn main() {
    let w = Walker; // inline comment
    println!("{}", w.walk());
}
"#;

    #[test]
    fn round_trip_restores_the_exact_source() {
        let instrumented = instrument(PROGRAM);
        assert_ne!(instrumented, PROGRAM);
        let out = strip(&instrumented, &["f.rs::walk", "f.rs::step", "f.rs::main"]);
        assert_eq!(out.source, PROGRAM);
        assert_eq!(out.removed, vec!["f.rs::walk", "f.rs::step", "f.rs::main"]);
        assert!(out.remaining.is_empty());
    }

    #[test]
    fn round_trip_in_pretty_layout() {
        let src = "fn a() { work(); }\nfn b(x: u8) -> u8 { x + 1 }\n";
        let pretty = InstrumentOptions {
            layout: Layout::Pretty,
            ..InstrumentOptions::default()
        };
        let instrumented = instrument_source("f.rs", src, &pretty).unwrap().source;
        let options = StripOptions {
            layout: Layout::Pretty,
        };
        let out = strip_source("f.rs", &instrumented, &known(&["f.rs::a", "f.rs::b"]), &options)
            .unwrap();
        let expected = prettyplease::unparse(&syn::parse_file(src).unwrap());
        assert_eq!(out.source, expected);
    }

    #[test]
    fn unrelated_known_set_changes_nothing() {
        let instrumented = instrument("fn a() {}\nfn b() {}\n");
        let out = strip(&instrumented, &["other.rs::a", "f.rs::c"]);
        assert_eq!(out.source, instrumented);
        assert!(out.removed.is_empty());
        assert_eq!(out.remaining, vec!["f.rs::a", "f.rs::b"]);
    }

    #[test]
    fn only_known_functions_lose_their_probe() {
        let instrumented = instrument("fn a() {}\nfn b() {}\n");
        let out = strip(&instrumented, &["f.rs::a"]);
        assert_eq!(
            out.source,
            "use tracemark_runtime::record as __tracemark;\nfn a() {}\n\
             fn b() { __tracemark(\"f.rs\", \"b\");}\n"
        );
        assert_eq!(out.remaining, vec!["f.rs::b"]);
    }

    #[test]
    fn import_goes_with_the_last_probe() {
        let instrumented = instrument("fn a() {}\n");
        let out = strip(&instrumented, &["f.rs::a"]);
        assert_eq!(out.source, "fn a() {}\n");
    }

    #[test]
    fn expression_closure_keeps_its_block() {
        let src = "fn host() {\n    let add = |a, b| a + b;\n}\n";
        let instrumented = instrument(src);
        let out = strip(&instrumented, &["f.rs::host", "f.rs::add"]);
        assert_eq!(out.source, "fn host() {\n    let add = |a, b| { a + b };\n}\n");
    }

    #[test]
    fn anonymous_closures_are_matched_by_position() {
        let src = "fn f() {\n    run(|| {});\n    run(|| {});\n}\n";
        let instrumented = instrument(src);
        let out = strip(&instrumented, &["f.rs::@@anon.2"]);
        assert_eq!(out.removed, vec!["f.rs::@@anon.2"]);
        assert_eq!(out.remaining, vec!["f.rs::f", "f.rs::@@anon.1"]);
        assert!(out.source.contains("run(|| { __tracemark(\"f.rs\", \"@@anon.1\");});"));
        assert!(out.source.contains("run(|| {});"));
    }

    #[test]
    fn stripping_twice_is_stable() {
        let instrumented = instrument("fn a() {}\nfn b() {}\n");
        let once = strip(&instrumented, &["f.rs::a"]);
        let twice = strip(&once.source, &["f.rs::a"]);
        assert_eq!(twice.source, once.source);
        assert!(twice.removed.is_empty());
    }

    #[test]
    fn probe_not_in_first_position_is_left_alone() {
        let src = "use tracemark_runtime::record as __tracemark;\n\
                   fn a() { work(); __tracemark(\"f.rs\", \"a\"); }\n";
        let out = strip(src, &["f.rs::a"]);
        assert!(out.removed.is_empty());
        assert!(out.remaining.is_empty());
        // The call still needs its import.
        assert_eq!(out.source, src);
    }

    #[test]
    fn doubly_instrumented_body_keeps_its_second_call_and_the_import() {
        let twice = instrument(&instrument("fn a() {}\n"));
        let out = strip(&twice, &["f.rs::a"]);
        assert_eq!(out.removed, vec!["f.rs::a"]);
        assert_eq!(out.remaining, vec!["f.rs::a"]);
        assert_eq!(
            out.source,
            "use tracemark_runtime::record as __tracemark;\nfn a() { __tracemark(\"f.rs\", \"a\");}\n"
        );
        syn::parse_file(&out.source).unwrap();

        let again = strip(&out.source, &["f.rs::a"]);
        assert_eq!(again.source, "fn a() {}\n");
    }

    #[test]
    fn inner_attributes_survive_the_round_trip() {
        let src = "fn a() {\n    #![allow(unused)]\n    let x = 1;\n}\n";
        let instrumented = instrument(src);
        syn::parse_file(&instrumented).unwrap();
        let out = strip(&instrumented, &["f.rs::a"]);
        assert_eq!(out.source, src);
    }

    #[test]
    fn inline_module_imports_are_cleaned_per_scope() {
        let src = "fn a() {}\n\nmod inner {\n    fn b() {}\n}\n";
        let instrumented = instrument(src);
        let out = strip(&instrumented, &["f.rs::b"]);
        assert_eq!(
            out.source,
            "use tracemark_runtime::record as __tracemark;\nfn a() { __tracemark(\"f.rs\", \"a\");}\n\n\
             mod inner {\n    fn b() {}\n}\n"
        );
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = strip_source("g.rs", "fn {", &HashSet::new(), &StripOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
        assert!(err.to_string().contains("g.rs"));
    }
}
