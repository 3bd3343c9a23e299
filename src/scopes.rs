//! Syntactic scope analysis for the lowering IR.
//!
//! The scope tree is rebuilt from the AST between pipeline phases that
//! change binding structure, so each phase sees scopes consistent with the
//! tree it traverses. Scopes and bindings are arena records addressed by
//! `ScopeId`/`VarId`; the tree never holds references into the node arena,
//! only `NodeIndex` handles.

use crate::ast::base::NodeIndex;
use crate::ast::node::{NodeArena, NodeKind};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Unique identifier for a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const NONE: ScopeId = ScopeId(u32::MAX);

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Unique identifier for a binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct VarId(pub u32);

/// What kind of container a scope represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    /// The script root.
    Global,
    /// A function's own scope: parameters and the function-expression name.
    Function,
    /// A function body block, where `var` declarations are hoisted.
    FunctionBlock,
    /// Any other block-like scope: blocks, loop heads, catch clauses.
    Block,
}

/// How a binding was declared. Determines whether it is block scoped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DeclKind {
    Var,
    Let,
    Const,
    Param,
    Catch,
}

impl DeclKind {
    pub fn is_block_scoped(self) -> bool {
        matches!(self, DeclKind::Let | DeclKind::Const)
    }
}

/// One binding record.
#[derive(Clone, Debug, Serialize)]
pub struct Var {
    pub name: String,
    /// The `Name` node that declares the binding.
    pub name_node: NodeIndex,
    pub kind: DeclKind,
    /// The scope the binding currently lives in.
    pub scope: ScopeId,
}

/// One scope: a link to its parent, the AST node that roots it, and the
/// bindings declared directly in it.
#[derive(Clone, Debug, Serialize)]
pub struct Scope {
    pub parent: ScopeId,
    pub root: NodeIndex,
    pub kind: ScopeKind,
    bindings: FxHashMap<String, VarId>,
}

impl Scope {
    fn new(parent: ScopeId, root: NodeIndex, kind: ScopeKind) -> Scope {
        Scope {
            parent,
            root,
            kind,
            bindings: FxHashMap::default(),
        }
    }
}

/// The scope tree for one AST, plus the binding arena.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    vars: Vec<Var>,
    by_root: FxHashMap<NodeIndex, ScopeId>,
}

impl ScopeTree {
    /// Builds the scope tree for the AST rooted at `root`.
    ///
    /// Scope roots are: the root node, function nodes (parameters and
    /// function-expression names), function body blocks, plain blocks,
    /// `for`/`for-in`/`for-of` heads, and catch clauses. `var`
    /// declarations hoist into the nearest function block or global
    /// scope; everything else binds in its syntactic scope.
    pub fn build(arena: &NodeArena, root: NodeIndex) -> ScopeTree {
        let mut tree = ScopeTree::default();
        let global = tree.new_scope(ScopeId::NONE, root, ScopeKind::Global);
        let children: Vec<NodeIndex> = arena.children(root).to_vec();
        for child in children {
            tree.build_in(arena, child, global);
        }
        tree
    }

    fn build_in(&mut self, arena: &NodeArena, idx: NodeIndex, scope: ScopeId) {
        match arena.kind(idx) {
            NodeKind::Function => {
                let fn_scope = self.new_scope(scope, idx, ScopeKind::Function);
                let children = arena.children(idx).to_vec();
                let name = children[0];
                if !arena.string(name).is_empty() {
                    if is_function_statement(arena, idx) {
                        // Function declarations bind in the enclosing scope.
                        self.declare(scope, arena.string(name), name, DeclKind::Var);
                    } else {
                        // Function-expression names are visible only inside.
                        self.declare(fn_scope, arena.string(name), name, DeclKind::Var);
                    }
                }
                for &param in arena.children(children[1]) {
                    self.declare(fn_scope, arena.string(param), param, DeclKind::Param);
                }
                let body = children[2];
                let body_scope = self.new_scope(fn_scope, body, ScopeKind::FunctionBlock);
                let stmts = arena.children(body).to_vec();
                for stmt in stmts {
                    self.build_in(arena, stmt, body_scope);
                }
            }
            NodeKind::For | NodeKind::ForIn | NodeKind::ForOf => {
                // The loop head is its own scope; the body block below it
                // gets a child scope of its own.
                let head_scope = self.new_scope(scope, idx, ScopeKind::Block);
                let children = arena.children(idx).to_vec();
                for child in children {
                    self.build_in(arena, child, head_scope);
                }
            }
            NodeKind::Catch => {
                let catch_scope = self.new_scope(scope, idx, ScopeKind::Block);
                let children = arena.children(idx).to_vec();
                let param = children[0];
                self.declare(catch_scope, arena.string(param), param, DeclKind::Catch);
                for &child in &children[1..] {
                    self.build_in(arena, child, catch_scope);
                }
            }
            NodeKind::Block => {
                let block_scope = self.new_scope(scope, idx, ScopeKind::Block);
                let children = arena.children(idx).to_vec();
                for child in children {
                    self.build_in(arena, child, block_scope);
                }
            }
            kind if kind.is_name_declaration() => {
                let target = if kind == NodeKind::Var {
                    self.closest_hoist_scope(scope)
                } else {
                    scope
                };
                let decl_kind = match kind {
                    NodeKind::Var => DeclKind::Var,
                    NodeKind::Let => DeclKind::Let,
                    _ => DeclKind::Const,
                };
                let names = arena.children(idx).to_vec();
                for name in names {
                    if arena.kind(name) == NodeKind::Name {
                        self.declare(target, arena.string(name), name, decl_kind);
                    }
                    // Initializers may contain nested functions and blocks.
                    let inits = arena.children(name).to_vec();
                    for init in inits {
                        self.build_in(arena, init, scope);
                    }
                }
            }
            _ => {
                let children = arena.children(idx).to_vec();
                for child in children {
                    self.build_in(arena, child, scope);
                }
            }
        }
    }

    fn new_scope(&mut self, parent: ScopeId, root: NodeIndex, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(parent, root, kind));
        self.by_root.insert(root, id);
        id
    }

    #[inline]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    #[inline]
    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0 as usize]
    }

    /// The scope rooted at `node`, if `node` is a scope root.
    pub fn scope_of_root(&self, node: NodeIndex) -> Option<ScopeId> {
        self.by_root.get(&node).copied()
    }

    pub fn is_global(&self, id: ScopeId) -> bool {
        self.scope(id).kind == ScopeKind::Global
    }

    pub fn is_function_scope(&self, id: ScopeId) -> bool {
        self.scope(id).kind == ScopeKind::Function
    }

    pub fn is_function_block_scope(&self, id: ScopeId) -> bool {
        self.scope(id).kind == ScopeKind::FunctionBlock
    }

    /// The nearest scope at or above `from` where `var` declarations land:
    /// a function body block or the global scope.
    pub fn closest_hoist_scope(&self, from: ScopeId) -> ScopeId {
        let mut id = from;
        loop {
            match self.scope(id).kind {
                ScopeKind::FunctionBlock | ScopeKind::Global => return id,
                _ => id = self.scope(id).parent,
            }
        }
    }

    /// Resolves `name` by walking the scope chain from `from` outward.
    pub fn lookup(&self, from: ScopeId, name: &str) -> Option<VarId> {
        let mut id = from;
        loop {
            if let Some(&var) = self.scope(id).bindings.get(name) {
                return Some(var);
            }
            let parent = self.scope(id).parent;
            if parent.is_none() {
                return None;
            }
            id = parent;
        }
    }

    /// The binding for `name` declared directly in `scope`, ignoring the
    /// chain.
    pub fn own_binding(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        self.scope(scope).bindings.get(name).copied()
    }

    /// Declares `name` in `scope`, replacing any same-name binding there.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        name_node: NodeIndex,
        kind: DeclKind,
    ) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Var {
            name: name.to_string(),
            name_node,
            kind,
            scope,
        });
        self.scopes[scope.0 as usize]
            .bindings
            .insert(name.to_string(), id);
        id
    }

    /// Removes a binding from the scope it lives in. The var record stays
    /// addressable; only the name slot is freed.
    pub fn undeclare(&mut self, var: VarId) {
        let (scope, name) = {
            let v = self.var(var);
            (v.scope, v.name.clone())
        };
        let bindings = &mut self.scopes[scope.0 as usize].bindings;
        if bindings.get(&name) == Some(&var) {
            bindings.remove(&name);
        }
    }
}

fn is_function_statement(arena: &NodeArena, idx: NodeIndex) -> bool {
    let parent = arena.parent(idx);
    parent.is_some()
        && matches!(
            arena.kind(parent),
            NodeKind::Block | NodeKind::Root | NodeKind::Label
        )
}
