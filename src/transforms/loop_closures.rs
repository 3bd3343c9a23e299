//! Loop closure capture transform
//!
//! A `let`/`const` variable captured by a function created inside its loop
//! needs a fresh binding per iteration; a plain rename to `var` would make
//! every closure observe the last iteration's value. The transform
//! re-seats each captured variable as a property of a per-loop object that
//! is re-created on every iteration, and wraps each capturing function in
//! an IIFE whose parameter freezes the current iteration's object.
//!
//! ```javascript
//! var a = []; for (let i = 0; i < 3; i++) { a.push(function() { return i; }); }
//! ```
//! Becomes (fresh-id suffixes vary):
//! ```javascript
//! var a = [];
//! var $jscomp$loop$0 = {};
//! $jscomp$loop$0.$jscomp$loop$prop$i$1 = 0;
//! for (; $jscomp$loop$0.$jscomp$loop$prop$i$1 < 3;
//!     $jscomp$loop$0 = {$jscomp$loop$prop$i$1: $jscomp$loop$0.$jscomp$loop$prop$i$1},
//!     $jscomp$loop$0.$jscomp$loop$prop$i$1++) {
//!   a.push((function($jscomp$loop$0) {
//!     return function() { return $jscomp$loop$0.$jscomp$loop$prop$i$1; };
//!   })($jscomp$loop$0));
//! }
//! ```
//!
//! Reference discovery runs over the whole tree before any rewrite, so
//! every reference of every captured variable is known up front.

use crate::ast::base::NodeIndex;
use crate::ast::factory;
use crate::ast::node::{
    ColorId, NodeArena, NodeKind, colors, is_function_declaration, is_reference_name,
};
use crate::common::{ChangeReporter, UniqueIdSupplier};
use crate::scopes::{ScopeId, ScopeTree, VarId};
use crate::transforms::block_scoping::{
    LetConstSet, add_node_before_loop, extract_inline_jsdoc, handle_declaration_list,
    maybe_add_const_jsdoc,
};
use crate::traversal;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

const LOOP_OBJECT_NAME: &str = "$jscomp$loop";
const LOOP_OBJECT_PROPERTY_NAME: &str = "$jscomp$loop$prop$";

/// The synthesized per-loop record. Its name doubles as the label applied
/// to the block holding the original loop body when `continue` statements
/// have to be rewritten; labels and variables live in different
/// namespaces, so the shared name cannot collide.
#[derive(Debug)]
struct LoopObject {
    name: String,
    loop_node: NodeIndex,
    /// Captured vars in discovery order; insertion is idempotent.
    vars: Vec<VarId>,
    var_set: FxHashSet<VarId>,
}

/// Transforms `let`/`const` declarations captured by loop closures.
#[derive(Debug, Default)]
pub(crate) struct LoopClosureTransformer {
    loop_objects: Vec<LoopObject>,
    loop_object_by_node: FxHashMap<NodeIndex, usize>,
    /// Wrap targets (functions, or object literals holding a capturing
    /// accessor) in discovery order, with the loop objects each captures.
    wrap_targets: Vec<NodeIndex>,
    wrap_map: FxHashMap<NodeIndex, Vec<usize>>,
    /// `(wrap target, var name)` pairs already enqueued.
    handled: FxHashSet<(NodeIndex, String)>,
    /// Every discovered reference of each captured-candidate var.
    reference_map: FxHashMap<VarId, Vec<NodeIndex>>,
    /// Var to its unique loop-object property name,
    /// e.g. `i` -> `$jscomp$loop$prop$i$0`.
    property_names: FxHashMap<VarId, String>,
}

impl LoopClosureTransformer {
    /// Reference discovery. Post-order, whole tree, before any rewrite.
    pub fn collect(
        &mut self,
        arena: &mut NodeArena,
        scopes: &mut ScopeTree,
        root: NodeIndex,
        let_consts: &mut LetConstSet,
        ids: &mut UniqueIdSupplier,
    ) {
        traversal::post_order(arena, scopes, root, &mut |arena, scopes, n, _, scope| {
            self.visit_reference(arena, scopes, n, scope, let_consts, ids);
        });
    }

    fn visit_reference(
        &mut self,
        arena: &mut NodeArena,
        scopes: &mut ScopeTree,
        n: NodeIndex,
        referenced_in: ScopeId,
        let_consts: &mut LetConstSet,
        ids: &mut UniqueIdSupplier,
    ) {
        if !is_reference_name(arena, n) {
            return;
        }
        let name = arena.string(n).to_string();
        let Some(var) = scopes.lookup(referenced_in, &name) else {
            return;
        };
        if !scopes.var(var).kind.is_block_scoped() {
            return;
        }

        let parent = arena.parent(n);
        if parent.is_some() && arena.kind(parent).is_block_scoped_declaration() {
            let_consts.insert(parent);
        }

        // Walk scopes up from the declaration. A function body or the
        // global scope before any loop means the binding is not loop bound.
        let declared_in = scopes.var(var).scope;
        let mut loop_node = NodeIndex::NONE;
        let mut s = declared_in;
        loop {
            let scope_root = scopes.scope(s).root;
            if arena.kind(scope_root).is_loop_structure() {
                loop_node = scope_root;
                break;
            }
            let root_parent = arena.parent(scope_root);
            if root_parent.is_some() && arena.kind(root_parent).is_loop_structure() {
                loop_node = root_parent;
                break;
            }
            if scopes.is_function_block_scope(s) || scopes.is_global(s) {
                return;
            }
            s = scopes.scope(s).parent;
        }

        self.reference_map.entry(var).or_default().push(n);

        // Walk scopes from the reference toward the declaration. Any
        // function scope in between means a closure captures the binding.
        let mut outermost_function = None;
        let mut s = referenced_in;
        while s != declared_in && scopes.scope(s).root != loop_node {
            if scopes.is_function_scope(s) {
                outermost_function = Some(s);
            }
            s = scopes.scope(s).parent;
        }
        let Some(function_scope) = outermost_function else {
            return;
        };
        let enclosing_function = scopes.scope(function_scope).root;

        // A getter or setter in an object literal captures through the
        // literal, so the whole literal is wrapped; otherwise the function
        // itself is.
        let fn_parent = arena.parent(enclosing_function);
        let wrap_target = if fn_parent.is_some()
            && matches!(
                arena.kind(fn_parent),
                NodeKind::GetterDef | NodeKind::SetterDef
            ) {
            let object_lit = arena.parent(fn_parent);
            assert!(
                arena.kind(object_lit) == NodeKind::ObjectLit,
                "accessor definition outside an object literal"
            );
            object_lit
        } else {
            enclosing_function
        };
        if !self.handled.insert((wrap_target, name.clone())) {
            return;
        }

        let object_index = match self.loop_object_by_node.get(&loop_node) {
            Some(&index) => index,
            None => {
                let index = self.loop_objects.len();
                self.loop_objects.push(LoopObject {
                    name: format!("{}${}", LOOP_OBJECT_NAME, ids.next_id()),
                    loop_node,
                    vars: Vec::new(),
                    var_set: FxHashSet::default(),
                });
                self.loop_object_by_node.insert(loop_node, index);
                index
            }
        };
        trace!(
            var = name.as_str(),
            object = self.loop_objects[object_index].name.as_str(),
            "captured loop variable"
        );
        let object = &mut self.loop_objects[object_index];
        if object.var_set.insert(var) {
            object.vars.push(var);
        }
        self.property_names
            .entry(var)
            .or_insert_with(|| format!("{}{}${}", LOOP_OBJECT_PROPERTY_NAME, name, ids.next_id()));
        let captured = self.wrap_map.entry(wrap_target).or_insert_with(|| {
            self.wrap_targets.push(wrap_target);
            Vec::new()
        });
        if !captured.contains(&object_index) {
            captured.push(object_index);
        }
    }

    /// The per-loop rewrite. Loops process in discovery order, references
    /// within a loop in discovery order.
    pub fn transform<R: ChangeReporter>(
        &mut self,
        arena: &mut NodeArena,
        scopes: &ScopeTree,
        let_consts: &mut LetConstSet,
        reporter: &mut R,
    ) {
        if self.loop_objects.is_empty() {
            return;
        }
        debug!(loops = self.loop_objects.len(), "rewriting loop closures");

        for index in 0..self.loop_objects.len() {
            let loop_node = self.loop_objects[index].loop_node;
            let object_name = self.loop_objects[index].name.clone();
            let vars = self.loop_objects[index].vars.clone();
            assert!(
                arena.kind(loop_node) != NodeKind::ForOf,
                "for-of loops must be lowered before block scoping"
            );

            // The next-iteration object copies each property forward from
            // the previous iteration's object; that copy is what gives
            // every iteration its own binding. Properties start out absent
            // so that rewritten declarations re-initialize them each pass.
            let object_lit_next_iteration = factory::create_object_lit(arena);
            for &var in &vars {
                let property_name = self.property_names[&var].clone();
                let name_node = scopes.var(var).name_node;
                let value =
                    create_loop_var_reference(arena, &object_name, name_node, &property_name);
                let key = factory::create_string_key(arena, &property_name, value);
                arena.add_child_to_back(object_lit_next_iteration, key);
            }
            let object_name_node = create_loop_object_name_node(arena, &object_name);
            let update_loop_object =
                factory::create_assign(arena, object_name_node, object_lit_next_iteration);

            // var $jscomp$loop$N = {}; ahead of the loop
            let empty_lit = factory::create_object_lit(arena);
            let decl_name = create_loop_object_name_node(arena, &object_name);
            let object_var = factory::create_var(arena, decl_name, Some(empty_lit));
            arena.srcref_tree(object_var, loop_node);
            add_node_before_loop(arena, object_var, loop_node, reporter);

            if arena.kind(loop_node) == NodeKind::For {
                // The initializer is pulled out and placed prior to the loop.
                let initializer = arena.children(loop_node)[0];
                let empty = factory::create_empty(arena);
                arena.replace_with(initializer, empty);
                if arena.kind(initializer) != NodeKind::Empty {
                    let stmt = if !arena.kind(initializer).is_name_declaration() {
                        let stmt = factory::create_expr_result(arena, initializer);
                        arena.srcref(stmt, initializer);
                        stmt
                    } else {
                        initializer
                    };
                    add_node_before_loop(arena, stmt, loop_node, reporter);
                }

                let increment = arena.children(loop_node)[2];
                if arena.kind(increment) == NodeKind::Empty {
                    arena.replace_with(increment, update_loop_object);
                    arena.srcref_tree_if_missing(update_loop_object, loop_node);
                } else {
                    let placeholder = factory::create_empty(arena);
                    arena.replace_with(increment, placeholder);
                    let comma = factory::create_comma(arena, update_loop_object, increment);
                    arena.srcref_tree_if_missing(comma, loop_node);
                    arena.replace_with(placeholder, comma);
                }
            } else {
                // The update has to run on every iteration, so it goes at
                // the end of the body. Any continue statement that would
                // jump past it gets rerouted through a labeled block:
                //
                //   originalLabel: while (cond) {
                //     $jscomp$loop$0: {
                //       // body, with matching continues now
                //       // `break $jscomp$loop$0;`
                //     }
                //     $jscomp$loop$0 = {p: $jscomp$loop$0.p, ...};
                //   }
                let inner_block_label = object_name.clone();
                let loop_body = loop_code_block(arena, loop_node);
                if maybe_update_continue_statements(arena, loop_node, &inner_block_label) {
                    let inner_block = factory::create_block(arena, vec![]);
                    arena.srcref(inner_block, loop_body);
                    let original_statements = arena.take_children(loop_body);
                    arena.add_children_to_front(inner_block, original_statements);
                    let label_name = factory::create_label_name(arena, &inner_block_label);
                    arena.srcref(label_name, loop_body);
                    let label = factory::create_label(arena, label_name, inner_block);
                    arena.srcref(label, loop_body);
                    arena.add_child_to_front(loop_body, label);
                }
                let update_stmt = factory::create_expr_result(arena, update_loop_object);
                arena.srcref_tree_if_missing(update_stmt, loop_node);
                arena.add_child_to_back(loop_body, update_stmt);
            }
            reporter.report_change(loop_node);

            // Captured declarations become assignments to the object's
            // properties; every other reference becomes a property access.
            for &var in &vars {
                let property_name = self.property_names[&var].clone();
                let var_name_node = scopes.var(var).name_node;
                let references = self.reference_map.get(&var).cloned().unwrap_or_default();
                for reference in references {
                    self.rewrite_reference(
                        arena,
                        loop_node,
                        &object_name,
                        &property_name,
                        var_name_node,
                        reference,
                        let_consts,
                        reporter,
                    );
                }
            }
        }

        self.wrap_capturing_closures(arena, reporter);
    }

    #[allow(clippy::too_many_arguments)]
    fn rewrite_reference<R: ChangeReporter>(
        &self,
        arena: &mut NodeArena,
        loop_node: NodeIndex,
        object_name: &str,
        property_name: &str,
        var_name_node: NodeIndex,
        reference: NodeIndex,
        let_consts: &mut LetConstSet,
        reporter: &mut R,
    ) {
        let mut reference = reference;
        let reference_parent = arena.parent(reference);
        if arena.kind(loop_node) == NodeKind::ForIn
            && arena.children(loop_node)[0] == reference_parent
        {
            // `for (const p in obj)` keeps its binding as the iteration
            // temporary; the body starts by copying it into the object:
            // `$jscomp$loop$0.$jscomp$loop$prop$p$1 = p;`
            assert!(
                reference == var_name_node,
                "for-in head reference is not the declaring name node"
            );
            assert!(
                arena.kind(reference_parent).is_name_declaration(),
                "for-in head is not a name declaration"
            );
            let loop_var_reference = arena.clone_node(reference);
            let target = create_loop_var_reference(arena, object_name, reference, property_name);
            let assign = factory::create_assign(arena, target, loop_var_reference);
            let stmt = factory::create_expr_result(arena, assign);
            arena.srcref_tree_if_missing(stmt, reference);
            let body = arena.last_child(loop_node).expect("loop has a body");
            arena.add_child_to_front(body, stmt);
            return;
        }

        if reference_parent.is_some() && arena.kind(reference_parent).is_name_declaration() {
            let mut declaration = reference_parent;
            let grandparent = arena.parent(declaration);
            handle_declaration_list(arena, declaration, reporter);
            declaration = arena.parent(reference); // may have changed above

            // Change the declaration to an assignment, or drop it when
            // there is no initial value: the next-iteration literal leaves
            // the property undefined on entry.
            if arena.has_children(reference) {
                let new_reference = arena.clone_node(reference);
                let init = arena.remove_first_child(reference);
                let assign = factory::create_assign(arena, new_reference, init);
                extract_inline_jsdoc(arena, declaration, reference, declaration);
                maybe_add_const_jsdoc(arena, declaration, reference, declaration);
                let declaration_jsdoc = arena.node(declaration).jsdoc.clone();
                arena.node_mut(assign).jsdoc = declaration_jsdoc;
                let replacement = factory::create_expr_result(arena, assign);
                arena.srcref_tree_if_missing(replacement, declaration);
                arena.replace_with(declaration, replacement);
                reference = new_reference;
            } else {
                arena.detach(declaration);
            }
            let_consts.remove(declaration);
            if grandparent.is_some() {
                reporter.report_change(grandparent);
            }
        }

        let reference_parent = arena.parent(reference);
        if reference_parent.is_some()
            && arena.kind(reference_parent) == NodeKind::Call
            && arena.children(reference_parent)[0] == reference
        {
            // The callee now has a receiver.
            arena.node_mut(reference_parent).free_call = false;
        }
        let replacement = create_loop_var_reference(arena, object_name, reference, property_name);
        arena.replace_with(reference, replacement);
        reporter.report_change(replacement);
    }

    /// Wraps each capturing function (or accessor-holding object literal)
    /// in an IIFE whose parameters shadow the loop object names:
    /// `(function($jscomp$loop$0) { return <target>; })($jscomp$loop$0)`.
    fn wrap_capturing_closures<R: ChangeReporter>(
        &self,
        arena: &mut NodeArena,
        reporter: &mut R,
    ) {
        for &target in &self.wrap_targets {
            let objects = &self.wrap_map[&target];
            let return_node = factory::create_return(arena, None);
            let body = factory::create_block(arena, vec![return_node]);
            let mut params = Vec::with_capacity(objects.len());
            let mut args = Vec::with_capacity(objects.len());
            for &object_index in objects {
                let name = self.loop_objects[object_index].name.clone();
                params.push(create_loop_object_name_node(arena, &name));
                args.push(create_loop_object_name_node(arena, &name));
            }
            let param_list = factory::create_param_list(arena, params);
            let iife =
                factory::create_function(arena, "", param_list, body, Some(colors::TOP_OBJECT));
            reporter.report_change(iife);
            let call_color = arena.node(target).color;
            let call = factory::create_call(arena, iife, args, call_color);
            arena.node_mut(call).free_call = true;

            // A function declaration is a statement; keep its name bound
            // with `var f = (function(...) {...})(...)`.
            let replacement = if is_function_declaration(arena, target) {
                let declared_name = arena.string(arena.children(target)[0]).to_string();
                let name_node = factory::create_name(arena, &declared_name, None);
                let var_stmt = factory::create_var(arena, name_node, Some(call));
                arena.srcref_tree_if_missing(var_stmt, target);
                var_stmt
            } else {
                arena.srcref_tree_if_missing(call, target);
                call
            };
            arena.replace_with(target, replacement);
            arena.add_child_to_front(return_node, target);
            reporter.report_change(replacement);
        }
    }
}

/// `$jscomp$loop$N.$jscomp$loop$prop$name$M`, colored like the reference
/// it replaces.
fn create_loop_var_reference(
    arena: &mut NodeArena,
    object_name: &str,
    reference: NodeIndex,
    property_name: &str,
) -> NodeIndex {
    let color: Option<ColorId> = arena.node(reference).color;
    let receiver = create_loop_object_name_node(arena, object_name);
    let replacement = factory::create_get_prop(arena, receiver, property_name, color);
    arena.srcref_tree(replacement, reference);
    replacement
}

fn create_loop_object_name_node(arena: &mut NodeArena, object_name: &str) -> NodeIndex {
    factory::create_name(arena, object_name, Some(colors::TOP_OBJECT))
}

/// The block holding a loop's body statements.
fn loop_code_block(arena: &NodeArena, loop_node: NodeIndex) -> NodeIndex {
    let body = match arena.kind(loop_node) {
        NodeKind::While => arena.children(loop_node)[1],
        NodeKind::DoWhile => arena.children(loop_node)[0],
        NodeKind::For => arena.children(loop_node)[3],
        NodeKind::ForIn | NodeKind::ForOf => arena.children(loop_node)[2],
        kind => panic!("not a loop structure: {kind:?}"),
    };
    assert!(
        arena.kind(body) == NodeKind::Block,
        "loop body has no code block"
    );
    body
}

/// Rewrites `continue` statements that refer to `loop_node` into
/// `break <label>;`, where the label goes on a block wrapping the original
/// loop body. Returns true when at least one continue was rewritten, in
/// which case the caller must add that labeled block.
fn maybe_update_continue_statements(
    arena: &mut NodeArena,
    loop_node: NodeIndex,
    break_label: &str,
) -> bool {
    let loop_parent = arena.parent(loop_node);
    let original_loop_label =
        if loop_parent.is_some() && arena.kind(loop_parent) == NodeKind::Label {
            Some(arena.string(arena.children(loop_parent)[0]).to_string())
        } else {
            None
        };
    let mut updater = ContinueStatementUpdater {
        break_label: break_label.to_string(),
        original_loop_label,
        loop_depth: 0,
        replaced_a_continue: false,
    };
    let body = loop_code_block(arena, loop_node);
    updater.traverse(arena, body);
    updater.replaced_a_continue
}

struct ContinueStatementUpdater {
    /// Label for the break statements that replace continue statements.
    break_label: String,
    original_loop_label: Option<String>,
    /// How many loops deep below the one being rewritten.
    loop_depth: u32,
    replaced_a_continue: bool,
}

impl ContinueStatementUpdater {
    fn traverse(&mut self, arena: &mut NodeArena, idx: NodeIndex) {
        let kind = arena.kind(idx);
        assert!(
            kind != NodeKind::Class,
            "classes must be lowered before block scoping"
        );
        if kind == NodeKind::Function {
            return;
        }
        if kind.is_loop_structure() {
            // An unlabeled loop cannot be named by any continue statement
            // in an inner loop, so there is nothing to find below here.
            if self.original_loop_label.is_none() {
                return;
            }
            self.loop_depth += 1;
            let children = arena.children(idx).to_vec();
            for child in children {
                self.traverse(arena, child);
            }
            self.loop_depth -= 1;
            return;
        }
        if kind == NodeKind::Continue {
            let rewrite = if !arena.has_children(idx) {
                self.loop_depth == 0
            } else {
                self.original_loop_label.as_deref()
                    == Some(arena.string(arena.children(idx)[0]))
            };
            // anything else belongs to some other loop
            if rewrite {
                self.replace_with_break(arena, idx);
            }
            return;
        }
        let children = arena.children(idx).to_vec();
        for child in children {
            self.traverse(arena, child);
        }
    }

    fn replace_with_break(&mut self, arena: &mut NodeArena, continue_node: NodeIndex) {
        let label_name = factory::create_label_name(arena, &self.break_label);
        arena.srcref(label_name, continue_node);
        let break_node = factory::create_break(arena, Some(label_name));
        arena.srcref(break_node, continue_node);
        arena.replace_with(continue_node, break_node);
        self.replaced_a_continue = true;
    }
}
