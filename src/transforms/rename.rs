//! Reference rewriting from a rename table.
//!
//! The collision-resolution phase renames binding names in place and
//! records `(scope root, original name) -> new name` entries. This pass
//! applies those entries to every reference: a reference is renamed by the
//! innermost enclosing scope that has a table entry for its name, unless
//! some nearer scope still binds the name (which shadows the rename).

use crate::ast::base::NodeIndex;
use crate::ast::node::{NodeArena, is_reference_name};
use crate::scopes::ScopeTree;
use crate::traversal;
use rustc_hash::FxHashMap;
use tracing::trace;

/// `(scope root, original name) -> replacement name`. No entry means "do
/// not rename".
pub type RenameTable = FxHashMap<(NodeIndex, String), String>;

/// Applies `table` to every reference under `root`. `scopes` must have
/// been built after the binding renames were performed.
pub fn rename_references(
    arena: &mut NodeArena,
    scopes: &mut ScopeTree,
    root: NodeIndex,
    table: &RenameTable,
) {
    if table.is_empty() {
        return;
    }
    traversal::post_order(arena, scopes, root, &mut |arena, scopes, n, _, scope| {
        if !is_reference_name(arena, n) {
            return;
        }
        let name = arena.string(n).to_string();
        let mut s = scope;
        loop {
            let scope_root = scopes.scope(s).root;
            if let Some(new_name) = table.get(&(scope_root, name.clone())) {
                trace!(old = name.as_str(), new = new_name.as_str(), "renaming reference");
                arena.set_name(n, new_name);
                return;
            }
            // A scope that still binds the name shadows any outer rename.
            if scopes.own_binding(s, &name).is_some() {
                return;
            }
            let parent = scopes.scope(s).parent;
            if parent.is_none() {
                return;
            }
            s = parent;
        }
    });
}
