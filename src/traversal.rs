//! Post-order AST traversal with scope tracking.
//!
//! The callback receives each node after all of its children, together
//! with its parent and the scope it belongs to. A node that roots a scope
//! is visited in its own scope, matching how the scope tree is consumed by
//! the pipeline phases. Child lists are snapshotted before descent, so
//! callbacks may freely mutate the subtree that was just visited.

use crate::ast::base::NodeIndex;
use crate::ast::node::NodeArena;
use crate::scopes::{ScopeId, ScopeTree};

/// Visits every node under (and including) `root` in post order.
pub fn post_order<F>(arena: &mut NodeArena, scopes: &mut ScopeTree, root: NodeIndex, f: &mut F)
where
    F: FnMut(&mut NodeArena, &mut ScopeTree, NodeIndex, NodeIndex, ScopeId),
{
    let global = scopes
        .scope_of_root(root)
        .expect("traversal root must root a scope");
    walk(arena, scopes, root, NodeIndex::NONE, global, f);
}

fn walk<F>(
    arena: &mut NodeArena,
    scopes: &mut ScopeTree,
    idx: NodeIndex,
    parent: NodeIndex,
    inherited: ScopeId,
    f: &mut F,
) where
    F: FnMut(&mut NodeArena, &mut ScopeTree, NodeIndex, NodeIndex, ScopeId),
{
    let scope = scopes.scope_of_root(idx).unwrap_or(inherited);
    let children = arena.children(idx).to_vec();
    for child in children {
        walk(arena, scopes, child, idx, scope, f);
    }
    f(arena, scopes, idx, parent, scope);
}
