use std::path::PathBuf;

use syn::spanned::Spanned;

use crate::error::Error;
use crate::identity::encode_key;
use crate::probe::{
    DEFAULT_RUNTIME_CRATE, has_probe_import, import_item, import_text, probe_stmt, probe_text,
};
use crate::splice::Splice;
use crate::visit::{FnBody, FnHandler, FnVisitor};

/// How regenerated source is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Layout {
    /// Splice edits into the original text. Comments, formatting, and the
    /// line numbers of untouched code are preserved.
    #[default]
    Retain,
    /// Print the whole file from the syntax tree with prettyplease.
    Pretty,
}

#[derive(Debug, Clone)]
pub struct InstrumentOptions {
    pub layout: Layout,
    /// Crate path the probe entry point is imported from.
    pub runtime_crate: String,
    /// Files whose identifier ends with one of these are passed through.
    pub declaration_suffixes: Vec<String>,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
            declaration_suffixes: vec![".d.rs".to_string()],
        }
    }
}

/// Result of instrumenting a source file.
#[derive(Debug)]
pub struct Instrumented {
    pub source: String,
    /// Identity keys of the inserted probes, in traversal order.
    pub inserted: Vec<String>,
}

/// Whether `file` names a declaration-only file.
pub fn is_declaration_file(file: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|s| file.ends_with(s.as_str()))
}

pub(crate) fn parse(file: &str, source: &str) -> Result<syn::File, Error> {
    syn::parse_file(source).map_err(|source| Error::ParseError {
        path: PathBuf::from(file),
        source,
    })
}

/// Insert a probe at the start of every function-like node in `source` and
/// import the probe entry point into each module scope that received one.
///
/// `file` is the identifier baked into every probe. Running this twice on
/// the same text inserts a second probe per function; the import is never
/// duplicated.
pub fn instrument_source(
    file: &str,
    source: &str,
    options: &InstrumentOptions,
) -> Result<Instrumented, Error> {
    if is_declaration_file(file, &options.declaration_suffixes) {
        tracing::debug!(file, "declaration file, passing through");
        return Ok(Instrumented {
            source: source.to_string(),
            inserted: Vec::new(),
        });
    }

    let import = import_item(&options.runtime_crate).map_err(|source| {
        Error::InvalidRuntimeCrate {
            name: options.runtime_crate.clone(),
            source,
        }
    })?;
    let mut tree = parse(file, source)?;
    let instrumenter = Instrumenter {
        file,
        import,
        import_text: import_text(&options.runtime_crate),
        splice: Splice::new(source),
        inserted: Vec::new(),
    };
    let instrumenter = FnVisitor::new(instrumenter).run(&mut tree);
    tracing::debug!(file, probes = instrumenter.inserted.len(), "instrumented");

    let source = match options.layout {
        Layout::Retain => instrumenter.splice.apply(),
        Layout::Pretty => prettyplease::unparse(&tree),
    };
    Ok(Instrumented {
        source,
        inserted: instrumenter.inserted,
    })
}

struct Instrumenter<'a> {
    file: &'a str,
    import: syn::Item,
    import_text: String,
    splice: Splice<'a>,
    inserted: Vec<String>,
}

impl Instrumenter<'_> {
    /// Make `probe` the first statement of `block`. Inner attributes must
    /// stay ahead of every statement, so the text goes after the last one.
    fn prefix_block(
        &mut self,
        block: &mut syn::Block,
        attrs: &[syn::Attribute],
        probe: syn::Stmt,
        text: &str,
    ) {
        let anchor = attrs
            .iter()
            .rev()
            .find(|attr| matches!(attr.style, syn::AttrStyle::Inner(_)))
            .map_or(block.brace_token.span.open(), |attr| attr.span());
        let at = self.splice.offset(anchor.end());
        self.splice.insert(at, format!(" {text}"));
        block.stmts.insert(0, probe);
    }

    /// Turn an expression body into `{ probe; expr }`.
    fn wrap_expr(&mut self, body: &mut syn::Expr, probe: syn::Stmt, text: &str) {
        let span = body.span();
        let start = self.splice.offset(span.start());
        let end = self.splice.offset(span.end());

        let mut expr = std::mem::replace(body, syn::Expr::Verbatim(Default::default()));
        if leads_with_block(&expr) {
            self.splice.insert(start, format!("{{ {text} ("));
            self.splice.insert_closing(end, ") }");
            expr = syn::Expr::Paren(syn::ExprParen {
                attrs: Vec::new(),
                paren_token: Default::default(),
                expr: Box::new(expr),
            });
        } else {
            self.splice.insert(start, format!("{{ {text} "));
            self.splice.insert_closing(end, " }");
        }
        *body = syn::Expr::Block(syn::ExprBlock {
            attrs: Vec::new(),
            label: None,
            block: syn::Block {
                brace_token: Default::default(),
                stmts: vec![probe, syn::Stmt::Expr(expr, None)],
            },
        });
    }
}

impl FnHandler for Instrumenter<'_> {
    fn function(&mut self, name: &str, body: FnBody<'_>) -> bool {
        let probe = probe_stmt(self.file, name);
        let text = probe_text(self.file, name);
        match body {
            FnBody::Block(block, attrs) => self.prefix_block(block, attrs, probe, &text),
            FnBody::Closure(closure) => match &mut *closure.body {
                syn::Expr::Block(b) if b.attrs.is_empty() && b.label.is_none() => {
                    self.prefix_block(&mut b.block, &[], probe, &text)
                }
                expr => self.wrap_expr(expr, probe, &text),
            },
        }
        self.inserted.push(encode_key(self.file, name));
        true
    }

    fn scope(&mut self, items: &mut Vec<syn::Item>, probes: usize) {
        if probes == 0 || has_probe_import(items) {
            return;
        }
        if let Some(first) = items.first() {
            let at = self.splice.offset(first.span().start());
            self.splice.insert_item(at, &self.import_text);
        }
        items.insert(0, self.import.clone());
    }
}

/// Block-like expressions end a statement when they start one, so
/// `match x {}.len()` in a block's tail position would not parse as a single
/// expression.
fn is_block_like(expr: &syn::Expr) -> bool {
    matches!(
        expr,
        syn::Expr::Block(_)
            | syn::Expr::Const(_)
            | syn::Expr::ForLoop(_)
            | syn::Expr::If(_)
            | syn::Expr::Loop(_)
            | syn::Expr::Match(_)
            | syn::Expr::TryBlock(_)
            | syn::Expr::Unsafe(_)
            | syn::Expr::While(_)
    )
}

fn starts_with_block(expr: &syn::Expr) -> bool {
    if is_block_like(expr) {
        return true;
    }
    match expr {
        syn::Expr::Assign(e) => starts_with_block(&e.left),
        syn::Expr::Await(e) => starts_with_block(&e.base),
        syn::Expr::Binary(e) => starts_with_block(&e.left),
        syn::Expr::Call(e) => starts_with_block(&e.func),
        syn::Expr::Cast(e) => starts_with_block(&e.expr),
        syn::Expr::Field(e) => starts_with_block(&e.base),
        syn::Expr::Index(e) => starts_with_block(&e.expr),
        syn::Expr::MethodCall(e) => starts_with_block(&e.receiver),
        syn::Expr::Range(e) => e.start.as_deref().is_some_and(starts_with_block),
        syn::Expr::Try(e) => starts_with_block(&e.expr),
        _ => false,
    }
}

/// Whether `expr` needs parentheses to stay one expression at the start of a
/// statement.
fn leads_with_block(expr: &syn::Expr) -> bool {
    !is_block_like(expr) && starts_with_block(expr)
}
