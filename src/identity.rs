//! Naming of function-like nodes.
//!
//! Both the instrumenter and the stripper key probes by the same
//! `"<file>::<name>"` string, so the name of a node must be derivable from
//! the node and its immediate parent alone. Resolution order, first match
//! wins:
//!
//! 1. The node declares a name (`fn` items, impl methods, trait default
//!    methods).
//! 2. A closure bound by `let`, `const` or `static` to a plain identifier.
//! 3. A closure that is the value of a named field in a struct literal.
//! 4. A closure assigned to a bare identifier (`handler = |x| ..`).
//! 5. Anything else gets `@@anon.N` from a per-pass counter.

/// Prefix of synthesized labels for nodes without a derivable name.
pub const ANON_PREFIX: &str = "@@anon.";

/// Separator between file identifier and function name in an identity key.
pub const KEY_SEPARATOR: &str = "::";

/// Encode a (file, function) pair as an identity key.
pub fn encode_key(file: &str, name: &str) -> String {
    format!("{file}{KEY_SEPARATOR}{name}")
}

/// Split an identity key at the first separator.
pub fn decode_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}

/// The function-like node being named.
#[derive(Debug, Clone, Copy)]
pub enum FnNode<'a> {
    /// `fn` item, impl method, or trait method with a declared identifier.
    Declared(&'a syn::Ident),
    /// Closure expression.
    Closure,
}

/// The syntactic position a closure occupies, reduced to the identifier the
/// parent offers (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// `let f = ..`, `const F: T = ..`, `static F: T = ..`
    Binding(String),
    /// `S { field: .. }`
    Field(String),
    /// `f = ..`
    Assign(String),
    /// Call argument, return value, nested expression, destructuring
    /// binding, computed member...
    Other,
}

impl Parent {
    /// Parent for a `let` whose pattern is `pat`.
    pub fn binding(pat: &syn::Pat) -> Self {
        binding_name(pat).map_or(Self::Other, Self::Binding)
    }

    /// Parent for a struct literal field named by `member`.
    pub fn field(member: &syn::Member) -> Self {
        member_name(member).map_or(Self::Other, Self::Field)
    }

    /// Parent for an assignment whose left-hand side is `left`.
    pub fn assign(left: &syn::Expr) -> Self {
        assignee_name(left).map_or(Self::Other, Self::Assign)
    }
}

/// Identifier bound by a simple binding pattern: `f`, `mut f`, `f: T`.
///
/// Tuple, struct, slice, and `f @ pat` patterns bind more than a name and
/// yield `None`.
pub fn binding_name(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(p) if p.subpat.is_none() => Some(p.ident.to_string()),
        syn::Pat::Type(p) => binding_name(&p.pat),
        _ => None,
    }
}

/// Field name of a named struct-literal member. Tuple indices yield `None`.
pub fn member_name(member: &syn::Member) -> Option<String> {
    match member {
        syn::Member::Named(ident) => Some(ident.to_string()),
        syn::Member::Unnamed(_) => None,
    }
}

/// Identifier on the left of an assignment, when it is a single bare path
/// segment. `self.f`, `a[0]`, and `m::f` yield `None`.
pub fn assignee_name(left: &syn::Expr) -> Option<String> {
    match left {
        syn::Expr::Path(p) if p.qself.is_none() => p.path.get_ident().map(|i| i.to_string()),
        _ => None,
    }
}

/// Per-pass name resolver. Owns the anonymous counter, so one instance must
/// be used for exactly one traversal of one file.
#[derive(Debug, Default)]
pub struct Resolver {
    anon: usize,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for `node` sitting under `parent`.
    pub fn resolve(&mut self, node: &FnNode<'_>, parent: &Parent) -> String {
        match (node, parent) {
            (FnNode::Declared(ident), _) => unraw(ident),
            (FnNode::Closure, Parent::Binding(name))
            | (FnNode::Closure, Parent::Field(name))
            | (FnNode::Closure, Parent::Assign(name)) => name.clone(),
            (FnNode::Closure, Parent::Other) => self.next_anon(),
        }
    }

    fn next_anon(&mut self) -> String {
        self.anon += 1;
        format!("{ANON_PREFIX}{}", self.anon)
    }

    /// How many anonymous labels this pass has handed out.
    pub fn anon_count(&self) -> usize {
        self.anon
    }
}

/// `r#type` is named `type`.
fn unraw(ident: &syn::Ident) -> String {
    let s = ident.to_string();
    match s.strip_prefix("r#") {
        Some(bare) => bare.to_string(),
        None => s,
    }
}
