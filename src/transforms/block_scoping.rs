//! Block-scoped declaration lowering
//!
//! Rewrites `let` and `const` declarations as `var` declarations, renaming
//! bindings and their references where hoisting would otherwise collide.
//!
//! ## Basic transform
//! ```javascript
//! function f() { var x = 1; { let x = 2; use(x); } use(x); }
//! ```
//! Becomes:
//! ```javascript
//! function f() { var x = 1; { var x$0 = 2; use(x$0); } use(x); }
//! ```
//!
//! `const` lists are split into single declarations, each stamped with a
//! constancy annotation:
//! ```javascript
//! const i = 0, j = 1;
//! ```
//! Becomes:
//! ```javascript
//! /** @const */ var i = 0; /** @const */ var j = 1;
//! ```
//!
//! Variables captured by closures inside their loop get the per-iteration
//! treatment in [`loop_closures`](super::loop_closures) before the final
//! retokening here.
//!
//! Destructuring declarations, classes and `for-of` loops must be lowered
//! before this pass runs.

use crate::ast::base::NodeIndex;
use crate::ast::factory;
use crate::ast::node::{NodeArena, NodeKind, is_function_declaration, is_reference_name};
use crate::common::{ChangeReporter, Options, UniqueIdSupplier, features};
use crate::scopes::{ScopeId, ScopeTree};
use crate::transforms::loop_closures::LoopClosureTransformer;
use crate::transforms::rename::{RenameTable, rename_references};
use crate::traversal;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

/// The set of `let`/`const` declaration lists awaiting retokening.
/// Insertion-ordered so the final rewrite is deterministic.
#[derive(Debug, Default)]
pub(crate) struct LetConstSet {
    order: Vec<NodeIndex>,
    members: FxHashSet<NodeIndex>,
}

impl LetConstSet {
    pub fn insert(&mut self, n: NodeIndex) {
        if self.members.insert(n) {
            self.order.push(n);
        }
    }

    pub fn remove(&mut self, n: NodeIndex) {
        self.members.remove(&n);
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|n| self.members.contains(n))
    }
}

/// Lowers block-scoped declarations to function-scoped `var` declarations.
///
/// One instance runs one `process` call; all tables are created empty and
/// discarded with the instance. The id supplier and reporter belong to the
/// driver and are shared across passes.
pub struct BlockScopeRewriter<'a, R: ChangeReporter> {
    options: Options,
    ids: &'a mut UniqueIdSupplier,
    reporter: &'a mut R,
    rename_table: RenameTable,
    let_consts: LetConstSet,
    undeclared_names: FxHashSet<String>,
    extern_names: FxHashSet<String>,
}

impl<'a, R: ChangeReporter> BlockScopeRewriter<'a, R> {
    pub fn new(options: Options, ids: &'a mut UniqueIdSupplier, reporter: &'a mut R) -> Self {
        BlockScopeRewriter {
            options,
            ids,
            reporter,
            rename_table: RenameTable::default(),
            let_consts: LetConstSet::default(),
            undeclared_names: FxHashSet::default(),
            extern_names: FxHashSet::default(),
        }
    }

    /// Runs the full pipeline over the AST rooted at `root`. `externs_root`
    /// supplies names that renaming must avoid; it is never mutated.
    pub fn process(&mut self, arena: &mut NodeArena, externs_root: NodeIndex, root: NodeIndex) {
        debug!("lowering block-scoped declarations");
        if self.options.may_have_undeclared_vars {
            self.collect_undeclared_names(arena, root);
        }
        self.extern_names = collect_extern_variable_names(arena, externs_root);

        let mut scopes = ScopeTree::build(arena, root);
        traversal::post_order(
            arena,
            &mut scopes,
            root,
            &mut |arena, scopes, n, parent, scope| {
                self.visit_declaration(arena, scopes, n, parent, scope);
            },
        );

        // Binding names changed above; references catch up from the table,
        // against scopes rebuilt over the renamed tree.
        let mut scopes = ScopeTree::build(arena, root);
        rename_references(arena, &mut scopes, root, &self.rename_table);

        let mut scopes = ScopeTree::build(arena, root);
        let mut transformer = LoopClosureTransformer::default();
        transformer.collect(arena, &mut scopes, root, &mut self.let_consts, self.ids);
        transformer.transform(arena, &scopes, &mut self.let_consts, self.reporter);

        self.rewrite_decls_to_vars(arena);
        self.reporter
            .mark_transpiled(features::LET_DECLARATIONS | features::CONST_DECLARATIONS);
    }

    /// Records undeclared names so renaming never reuses one of them.
    /// In `{ let inner; } use(inner);` the declared `inner` must be renamed
    /// away from the free reference.
    fn collect_undeclared_names(&mut self, arena: &mut NodeArena, root: NodeIndex) {
        let mut scopes = ScopeTree::build(arena, root);
        let undeclared = &mut self.undeclared_names;
        traversal::post_order(arena, &mut scopes, root, &mut |arena, scopes, n, _, scope| {
            if is_reference_name(arena, n) && scopes.lookup(scope, arena.string(n)).is_none() {
                undeclared.insert(arena.string(n).to_string());
            }
        });
        debug!(count = self.undeclared_names.len(), "collected undeclared names");
    }

    fn visit_declaration(
        &mut self,
        arena: &mut NodeArena,
        scopes: &mut ScopeTree,
        n: NodeIndex,
        parent: NodeIndex,
        scope: ScopeId,
    ) {
        match arena.kind(n) {
            NodeKind::Let | NodeKind::Const => {
                assert!(
                    parent.is_none() || arena.kind(parent) != NodeKind::ForOf,
                    "for-of loops must be lowered before block scoping"
                );
                self.let_consts.insert(n);
                let names = arena.children(n).to_vec();
                for name in names {
                    assert!(
                        arena.kind(name) == NodeKind::Name,
                        "destructuring declarations must be lowered before block scoping"
                    );
                    self.visit_block_scoped_name(arena, scopes, n, name, scope);
                }
            }
            NodeKind::Function if is_function_declaration(arena, n) => {
                // The declared name is bound in the scope containing the
                // function, one above the function's own scope.
                let name = arena.children(n)[0];
                let lookup_scope = scopes.scope(scope).parent;
                self.visit_block_scoped_name(arena, scopes, n, name, lookup_scope);
            }
            NodeKind::Catch => {
                let param = arena.children(n)[0];
                self.visit_block_scoped_name(arena, scopes, n, param, scope);
            }
            NodeKind::Class => {
                panic!("unexpected declaration node: classes must be lowered before block scoping")
            }
            _ => {}
        }
    }

    /// Renames a block-scoped binding that would shadow a hoist-scope name,
    /// and re-declares it in its hoist scope.
    ///
    /// Also normalizes `let x;` to `let x = undefined;` inside loops, since
    /// a captured `x` becomes a loop-object property that must be reset on
    /// every iteration.
    fn visit_block_scoped_name(
        &mut self,
        arena: &mut NodeArena,
        scopes: &mut ScopeTree,
        decl: NodeIndex,
        name_node: NodeIndex,
        lookup_scope: ScopeId,
    ) {
        let parent = arena.parent(decl);
        if arena.kind(decl).is_block_scoped_declaration()
            && !arena.has_children(name_node)
            && (parent.is_none() || arena.kind(parent) != NodeKind::ForIn)
            && in_loop(arena, decl)
        {
            let undefined = factory::create_undefined_value(arena);
            arena.srcref_tree(undefined, name_node);
            arena.add_child_to_front(name_node, undefined);
            self.reporter.report_change(undefined);
        }

        let old_name = arena.string(name_node).to_string();
        let Some(var) = scopes.lookup(lookup_scope, &old_name) else {
            panic!("declared name `{old_name}` is not bound in any scope");
        };
        let var_scope = scopes.var(var).scope;
        let hoist_scope = scopes.closest_hoist_scope(var_scope);
        if var_scope == hoist_scope {
            return;
        }

        let mut new_name = old_name.clone();
        if scopes.lookup(hoist_scope, &old_name).is_some()
            || self.undeclared_names.contains(&old_name)
            || self.extern_names.contains(&old_name)
        {
            loop {
                new_name = format!("{}${}", old_name, self.ids.next_id());
                if scopes.lookup(hoist_scope, &new_name).is_none() {
                    break;
                }
            }
            trace!(old = old_name.as_str(), new = new_name.as_str(), "renaming binding");
            arena.set_name(name_node, &new_name);
            self.reporter.report_change(name_node);
            let scope_root = scopes.scope(var_scope).root;
            self.rename_table
                .insert((scope_root, old_name), new_name.clone());
        }
        let kind = scopes.var(var).kind;
        scopes.undeclare(var);
        scopes.declare(hoist_scope, &new_name, name_node, kind);
    }

    /// Final retokening: split remaining `const` lists, then flip every
    /// recorded list to `var`.
    fn rewrite_decls_to_vars(&mut self, arena: &mut NodeArena) {
        let remaining: Vec<NodeIndex> = self.let_consts.iter().collect();
        for n in remaining {
            if arena.kind(n) == NodeKind::Const {
                handle_declaration_list(arena, n, self.reporter);
            }
            arena.set_kind(n, NodeKind::Var);
            self.reporter.report_change(n);
        }
    }
}

/// Whether `n` sits inside a loop. A function boundary between `n` and the
/// loop disqualifies.
pub(crate) fn in_loop(arena: &NodeArena, n: NodeIndex) -> bool {
    let mut cur = n;
    while cur.is_some() {
        let kind = arena.kind(cur);
        if kind == NodeKind::Function {
            return false;
        }
        if kind.is_loop_structure() {
            return true;
        }
        cur = arena.parent(cur);
    }
    false
}

/// Names declared by the externs tree: declaration lists and function
/// declarations at any depth.
pub(crate) fn collect_extern_variable_names(
    arena: &NodeArena,
    externs_root: NodeIndex,
) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    collect_extern_names_in(arena, externs_root, &mut names);
    names
}

fn collect_extern_names_in(arena: &NodeArena, idx: NodeIndex, names: &mut FxHashSet<String>) {
    match arena.kind(idx) {
        kind if kind.is_name_declaration() => {
            for &name in arena.children(idx) {
                if arena.kind(name) == NodeKind::Name {
                    names.insert(arena.string(name).to_string());
                }
            }
        }
        NodeKind::Function => {
            let name = arena.children(idx)[0];
            if !arena.string(name).is_empty() {
                names.insert(arena.string(name).to_string());
            }
        }
        _ => {
            for &child in arena.children(idx) {
                collect_extern_names_in(arena, child, names);
            }
        }
    }
}

/// Normalizes a declaration list to a single binding per declaration:
/// `const i = 0, j = 0;` becomes `/** @const */ var i = 0;
/// /** @const */ var j = 0;`. Trailing bindings split off right-to-left;
/// the head keeps the original list's statement slot.
pub(crate) fn handle_declaration_list<R: ChangeReporter>(
    arena: &mut NodeArena,
    list: NodeIndex,
    reporter: &mut R,
) {
    while arena.child_count(list) > 1 {
        let name = arena.last_child(list).expect("non-empty declaration list");
        arena.detach(name);
        let new_declaration = arena.alloc(NodeKind::Var);
        arena.add_child_to_back(new_declaration, name);
        arena.srcref(new_declaration, list);
        maybe_add_const_jsdoc(arena, list, name, new_declaration);
        arena.insert_after(new_declaration, list);
        reporter.report_change(arena.parent(list));
    }
    let first = arena.first_child(list).expect("non-empty declaration list");
    maybe_add_const_jsdoc(arena, list, first, list);
    arena.set_kind(list, NodeKind::Var);
}

/// Moves inline JSDoc from a declaration (or its binding name) onto
/// `dest_declaration`, always leaving a record there.
pub(crate) fn extract_inline_jsdoc(
    arena: &mut NodeArena,
    src_declaration: NodeIndex,
    src_name: NodeIndex,
    dest_declaration: NodeIndex,
) {
    let mut existing = arena.node(src_declaration).jsdoc.clone();
    if existing.is_none() {
        existing = arena.node_mut(src_name).jsdoc.take();
    }
    arena.node_mut(dest_declaration).jsdoc = Some(existing.unwrap_or_default());
}

/// Stamps constancy onto `dest_declaration` when the source list is a
/// `const` declaration, carrying any inline JSDoc along.
pub(crate) fn maybe_add_const_jsdoc(
    arena: &mut NodeArena,
    src_declaration: NodeIndex,
    src_name: NodeIndex,
    dest_declaration: NodeIndex,
) {
    if arena.kind(src_declaration) == NodeKind::Const {
        extract_inline_jsdoc(arena, src_declaration, src_name, dest_declaration);
        arena
            .node_mut(dest_declaration)
            .jsdoc
            .get_or_insert_with(Default::default)
            .record_constancy();
    }
}

/// Inserts `new_node` as a statement immediately before `loop_node`,
/// hoisting past any labels on the loop.
pub(crate) fn add_node_before_loop<R: ChangeReporter>(
    arena: &mut NodeArena,
    new_node: NodeIndex,
    loop_node: NodeIndex,
    reporter: &mut R,
) {
    let mut insert_spot = loop_node;
    while arena.kind(arena.parent(insert_spot)) == NodeKind::Label {
        insert_spot = arena.parent(insert_spot);
    }
    arena.insert_before(new_node, insert_spot);
    reporter.report_change(new_node);
}
