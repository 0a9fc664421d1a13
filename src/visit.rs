//! Shared traversal for the instrument and strip passes.
//!
//! Both passes must agree on the name of every function-like node. Rather
//! than keeping two visitors in sync, there is one: [`FnVisitor`] walks the
//! file, tracks each closure's immediate parent, resolves names through a
//! single [`Resolver`], and hands every function body to an [`FnHandler`].
//! The handler decides what to do with the body; the order and the names are
//! fixed here.
//!
//! Scopes: `use` declarations are module-scoped, so probe counts are kept per
//! module scope (the file root and each inline `mod { .. }`). When a scope has
//! been fully visited its item list is handed to the handler together with
//! the number of probes that remain directly inside it.

use syn::visit_mut::VisitMut;

use crate::identity::{FnNode, Parent, Resolver};

/// Body of a function-like node.
pub(crate) enum FnBody<'a> {
    /// `fn` item, impl method, or trait default method, with the item's
    /// attributes. The body's inner attributes are stored among them.
    Block(&'a mut syn::Block, &'a [syn::Attribute]),
    /// Closure, whose body may or may not be a block.
    Closure(&'a mut syn::ExprClosure),
}

pub(crate) trait FnHandler {
    /// Called once per function-like node, in traversal order, before the
    /// node's children are visited. Returns whether the body carries a probe
    /// once the handler is done with it.
    fn function(&mut self, name: &str, body: FnBody<'_>) -> bool;

    /// Called after every node inside a module scope has been visited.
    fn scope(&mut self, items: &mut Vec<syn::Item>, probes: usize);
}

pub(crate) struct FnVisitor<H> {
    handler: H,
    resolver: Resolver,
    /// Parent offered to the next expression visited, consumed by it.
    parent: Option<Parent>,
    /// Probe counts of the enclosing module scopes, innermost last.
    scopes: Vec<usize>,
}

impl<H: FnHandler> FnVisitor<H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            resolver: Resolver::new(),
            parent: None,
            scopes: Vec::new(),
        }
    }

    /// Walk `file` and return the handler.
    pub(crate) fn run(mut self, file: &mut syn::File) -> H {
        self.scopes.push(0);
        self.visit_file_mut(file);
        let probes = self.scopes.pop().unwrap_or(0);
        self.handler.scope(&mut file.items, probes);
        self.handler
    }

    fn function(&mut self, name: &str, body: FnBody<'_>) {
        if self.handler.function(name, body)
            && let Some(count) = self.scopes.last_mut()
        {
            *count += 1;
        }
    }

    fn declared(&mut self, ident: &syn::Ident) -> String {
        self.resolver.resolve(&FnNode::Declared(ident), &Parent::Other)
    }

    fn closure(&mut self, closure: &mut syn::ExprClosure, parent: Parent) {
        let name = self.resolver.resolve(&FnNode::Closure, &parent);
        self.function(&name, FnBody::Closure(closure));
        syn::visit_mut::visit_expr_closure_mut(self, closure);
    }

    /// Visit `expr` with `parent` as its immediate context.
    fn child_expr(&mut self, expr: &mut syn::Expr, parent: Parent) {
        self.parent = Some(parent);
        self.visit_expr_mut(expr);
    }
}

/// Identifier of a `const`/`static` item as a binding parent. `const _` binds
/// nothing.
fn item_binding(ident: &syn::Ident) -> Parent {
    if ident == "_" {
        Parent::Other
    } else {
        Parent::Binding(ident.to_string())
    }
}

impl<H: FnHandler> VisitMut for FnVisitor<H> {
    fn visit_expr_mut(&mut self, expr: &mut syn::Expr) {
        let parent = self.parent.take().unwrap_or(Parent::Other);
        match expr {
            syn::Expr::Closure(closure) => self.closure(closure, parent),
            other => syn::visit_mut::visit_expr_mut(self, other),
        }
    }

    fn visit_item_fn_mut(&mut self, node: &mut syn::ItemFn) {
        // A const fn cannot call the probe.
        if node.sig.constness.is_none() {
            let name = self.declared(&node.sig.ident);
            self.function(&name, FnBody::Block(&mut *node.block, &node.attrs));
        }
        syn::visit_mut::visit_item_fn_mut(self, node);
    }

    fn visit_impl_item_fn_mut(&mut self, node: &mut syn::ImplItemFn) {
        if node.sig.constness.is_none() {
            let name = self.declared(&node.sig.ident);
            self.function(&name, FnBody::Block(&mut node.block, &node.attrs));
        }
        syn::visit_mut::visit_impl_item_fn_mut(self, node);
    }

    fn visit_trait_item_fn_mut(&mut self, node: &mut syn::TraitItemFn) {
        if node.sig.constness.is_none()
            && let Some(block) = &mut node.default
        {
            let name = self.declared(&node.sig.ident);
            self.function(&name, FnBody::Block(block, &node.attrs));
        }
        syn::visit_mut::visit_trait_item_fn_mut(self, node);
    }

    fn visit_item_mod_mut(&mut self, node: &mut syn::ItemMod) {
        let Some((_, items)) = &mut node.content else {
            return;
        };
        self.scopes.push(0);
        for item in items.iter_mut() {
            self.visit_item_mut(item);
        }
        let probes = self.scopes.pop().unwrap_or(0);
        self.handler.scope(items, probes);
    }

    fn visit_local_mut(&mut self, node: &mut syn::Local) {
        self.visit_pat_mut(&mut node.pat);
        if let Some(init) = &mut node.init {
            let parent = Parent::binding(&node.pat);
            self.child_expr(&mut init.expr, parent);
            if let Some((_, diverge)) = &mut init.diverge {
                self.visit_expr_mut(diverge);
            }
        }
    }

    fn visit_item_const_mut(&mut self, node: &mut syn::ItemConst) {
        self.visit_generics_mut(&mut node.generics);
        self.visit_type_mut(&mut node.ty);
        let parent = item_binding(&node.ident);
        self.child_expr(&mut node.expr, parent);
    }

    fn visit_impl_item_const_mut(&mut self, node: &mut syn::ImplItemConst) {
        self.visit_generics_mut(&mut node.generics);
        self.visit_type_mut(&mut node.ty);
        let parent = item_binding(&node.ident);
        self.child_expr(&mut node.expr, parent);
    }

    fn visit_item_static_mut(&mut self, node: &mut syn::ItemStatic) {
        self.visit_type_mut(&mut node.ty);
        let parent = item_binding(&node.ident);
        self.child_expr(&mut node.expr, parent);
    }

    fn visit_field_value_mut(&mut self, node: &mut syn::FieldValue) {
        let parent = Parent::field(&node.member);
        self.child_expr(&mut node.expr, parent);
    }

    fn visit_expr_assign_mut(&mut self, node: &mut syn::ExprAssign) {
        self.visit_expr_mut(&mut node.left);
        let parent = Parent::assign(&node.left);
        self.child_expr(&mut node.right, parent);
    }
}
