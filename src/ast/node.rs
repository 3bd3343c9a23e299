//! Node model and arena for the lowering IR.
//!
//! Nodes are homogeneous: a kind tag, an ordered child list, an optional
//! string payload (identifier text, label text, property names, literal
//! text, binary operators), and optional annotations. Structure lives in
//! `children`/`parent` links; the arena owns every node and hands out
//! `NodeIndex` handles that stay valid for the lifetime of the arena.
//! Detaching a node only unlinks it, so handles held in side tables never
//! dangle while a transform rearranges the tree.

use super::base::{NodeIndex, TextRange};
use serde::{Deserialize, Serialize};

/// Kind tag for IR nodes.
///
/// The operative kinds for this pass are names, declaration lists,
/// functions, loops, labels and the statement/expression glue; the
/// remaining kinds exist so realistic programs can be represented and are
/// treated as opaque subtrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Script root.
    Root,
    /// Identifier reference or binding; payload is the identifier text.
    Name,
    /// Numeric literal; payload is the literal text.
    Number,
    /// String literal; payload is the literal text.
    StringLit,
    /// Array literal.
    ArrayLit,
    /// `var` declaration list; children are `Name` bindings.
    Var,
    /// `let` declaration list; children are `Name` bindings.
    Let,
    /// `const` declaration list; children are `Name` bindings.
    Const,
    /// Function; children are `[Name, ParamList, Block]`.
    Function,
    ParamList,
    ObjectLit,
    /// Object-literal entry; payload is the property name, child the value.
    StringKey,
    /// Accessor definition inside an object literal; payload is the
    /// property name, child the accessor `Function`.
    GetterDef,
    SetterDef,
    /// Call; children are `[callee, args..]`.
    Call,
    While,
    DoWhile,
    /// C-style loop; children are `[init, cond, update, body]`.
    For,
    /// `for (x in obj)`; children are `[target, object, body]`.
    ForIn,
    /// `for (x of iter)`; must be lowered before this pass runs.
    ForOf,
    /// Labeled statement; children are `[LabelName, statement]`.
    Label,
    /// Label text as it appears on `Label`, `Break` and `Continue`.
    LabelName,
    Block,
    /// `continue`, with an optional `LabelName` child.
    Continue,
    /// `break`, with an optional `LabelName` child.
    Break,
    /// Expression statement; one expression child.
    ExprResult,
    /// Assignment; children are `[target, value]`.
    Assign,
    /// Property access; payload is the property name, child the receiver.
    GetProp,
    /// Comma expression; children are `[first, second]`.
    Comma,
    Empty,
    /// Type cast wrapper around one expression child.
    Cast,
    /// `return`, with an optional expression child.
    Return,
    /// Binary expression; payload is the operator, children `[left, right]`.
    Bin,
    /// Postfix increment; one operand child.
    Inc,
    /// `if`; children are `[cond, then]` or `[cond, then, else]`.
    If,
    /// `try`; children are `[Block, Catch?]`.
    Try,
    /// `catch`; children are `[Name, Block]`.
    Catch,
    /// Class; must be lowered before this pass runs.
    Class,
}

impl NodeKind {
    /// True for the loop statement forms.
    #[inline]
    pub fn is_loop_structure(self) -> bool {
        matches!(
            self,
            NodeKind::While | NodeKind::DoWhile | NodeKind::For | NodeKind::ForIn | NodeKind::ForOf
        )
    }

    /// True for `var`/`let`/`const` declaration lists.
    #[inline]
    pub fn is_name_declaration(self) -> bool {
        matches!(self, NodeKind::Var | NodeKind::Let | NodeKind::Const)
    }

    /// True for the block-scoped declaration lists.
    #[inline]
    pub fn is_block_scoped_declaration(self) -> bool {
        matches!(self, NodeKind::Let | NodeKind::Const)
    }
}

/// Opaque reference into the type/color attribution system. The pass never
/// inspects colors; it only copies them onto replacement nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorId(pub u32);

/// Well-known colors the pass attaches to nodes it synthesizes.
pub mod colors {
    use super::ColorId;

    /// The top object type, used for loop objects and wrapper functions.
    pub const TOP_OBJECT: ColorId = ColorId(1);
}

/// Opaque JSDoc record. The pass copies these between declarations and
/// stamps constancy when splitting `const` lists; it never parses comments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsDocInfo {
    /// Set when the declaration carried `@const` or originated from a
    /// `const` list.
    pub constancy: bool,
    /// Raw comment text carried along from the input, if any.
    pub comment: Option<String>,
}

impl JsDocInfo {
    pub fn record_constancy(&mut self) {
        self.constancy = true;
    }
}

/// One IR node. See the module docs for the layout conventions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    /// Identifier/label/property/literal/operator text, per kind.
    pub name: Option<String>,
    pub children: Vec<NodeIndex>,
    pub parent: NodeIndex,
    pub jsdoc: Option<JsDocInfo>,
    pub color: Option<ColorId>,
    /// On `Call` nodes: whether the callee is invoked without a receiver.
    pub free_call: bool,
    pub range: TextRange,
}

impl Node {
    fn new(kind: NodeKind) -> Node {
        Node {
            kind,
            name: None,
            children: Vec::new(),
            parent: NodeIndex::NONE,
            jsdoc: None,
            color: None,
            free_call: false,
            range: TextRange::default(),
        }
    }
}

/// Append-only arena of nodes.
///
/// Indices are never reused; `detach` unlinks a node from its parent but
/// keeps its slot, so side tables keyed by `NodeIndex` survive arbitrary
/// tree surgery.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> NodeArena {
        NodeArena::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocates a fresh, detached node of the given kind.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        idx
    }

    #[inline]
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.0 as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut Node {
        &mut self.nodes[idx.0 as usize]
    }

    #[inline]
    pub fn kind(&self, idx: NodeIndex) -> NodeKind {
        self.node(idx).kind
    }

    pub fn set_kind(&mut self, idx: NodeIndex, kind: NodeKind) {
        self.node_mut(idx).kind = kind;
    }

    /// The string payload, or `""` when none is set.
    #[inline]
    pub fn string(&self, idx: NodeIndex) -> &str {
        self.node(idx).name.as_deref().unwrap_or("")
    }

    pub fn set_name(&mut self, idx: NodeIndex, name: &str) {
        self.node_mut(idx).name = Some(name.to_string());
    }

    #[inline]
    pub fn parent(&self, idx: NodeIndex) -> NodeIndex {
        self.node(idx).parent
    }

    #[inline]
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.node(idx).children
    }

    pub fn has_children(&self, idx: NodeIndex) -> bool {
        !self.node(idx).children.is_empty()
    }

    pub fn child_count(&self, idx: NodeIndex) -> usize {
        self.node(idx).children.len()
    }

    pub fn first_child(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.node(idx).children.first().copied()
    }

    pub fn last_child(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.node(idx).children.last().copied()
    }

    fn child_position(&self, parent: NodeIndex, child: NodeIndex) -> usize {
        self.node(parent)
            .children
            .iter()
            .position(|&c| c == child)
            .expect("node is not a child of its recorded parent")
    }

    /// Appends `child` (which must be detached) to `parent`.
    pub fn add_child_to_back(&mut self, parent: NodeIndex, child: NodeIndex) {
        debug_assert!(self.node(child).parent.is_none(), "child already attached");
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = parent;
    }

    /// Prepends `child` (which must be detached) to `parent`.
    pub fn add_child_to_front(&mut self, parent: NodeIndex, child: NodeIndex) {
        debug_assert!(self.node(child).parent.is_none(), "child already attached");
        self.node_mut(parent).children.insert(0, child);
        self.node_mut(child).parent = parent;
    }

    /// Prepends a run of detached nodes, preserving their order.
    pub fn add_children_to_front(&mut self, parent: NodeIndex, children: Vec<NodeIndex>) {
        for child in children.into_iter().rev() {
            self.add_child_to_front(parent, child);
        }
    }

    /// Inserts the detached node `new` immediately before `anchor` in the
    /// anchor's parent.
    pub fn insert_before(&mut self, new: NodeIndex, anchor: NodeIndex) {
        let parent = self.parent(anchor);
        debug_assert!(parent.is_some(), "anchor has no parent");
        let pos = self.child_position(parent, anchor);
        self.node_mut(parent).children.insert(pos, new);
        self.node_mut(new).parent = parent;
    }

    /// Inserts the detached node `new` immediately after `anchor` in the
    /// anchor's parent.
    pub fn insert_after(&mut self, new: NodeIndex, anchor: NodeIndex) {
        let parent = self.parent(anchor);
        debug_assert!(parent.is_some(), "anchor has no parent");
        let pos = self.child_position(parent, anchor);
        self.node_mut(parent).children.insert(pos + 1, new);
        self.node_mut(new).parent = parent;
    }

    /// Replaces `old` with the detached node `new`, leaving `old` detached.
    pub fn replace_with(&mut self, old: NodeIndex, new: NodeIndex) {
        let parent = self.parent(old);
        debug_assert!(parent.is_some(), "cannot replace a detached node");
        let pos = self.child_position(parent, old);
        self.node_mut(parent).children[pos] = new;
        self.node_mut(new).parent = parent;
        self.node_mut(old).parent = NodeIndex::NONE;
    }

    /// Unlinks `idx` from its parent. No-op when already detached.
    pub fn detach(&mut self, idx: NodeIndex) {
        let parent = self.parent(idx);
        if parent.is_none() {
            return;
        }
        let pos = self.child_position(parent, idx);
        self.node_mut(parent).children.remove(pos);
        self.node_mut(idx).parent = NodeIndex::NONE;
    }

    /// Detaches and returns the first child of `parent`.
    pub fn remove_first_child(&mut self, parent: NodeIndex) -> NodeIndex {
        let child = self.first_child(parent).expect("node has no children");
        self.detach(child);
        child
    }

    /// Detaches and returns all children of `parent`, preserving order.
    pub fn take_children(&mut self, parent: NodeIndex) -> Vec<NodeIndex> {
        let children = std::mem::take(&mut self.node_mut(parent).children);
        for &child in &children {
            self.node_mut(child).parent = NodeIndex::NONE;
        }
        children
    }

    /// Shallow clone: copies the header (kind, payload, annotations,
    /// range) but neither children nor parent link.
    pub fn clone_node(&mut self, idx: NodeIndex) -> NodeIndex {
        let src = self.node(idx);
        let clone = Node {
            kind: src.kind,
            name: src.name.clone(),
            children: Vec::new(),
            parent: NodeIndex::NONE,
            jsdoc: src.jsdoc.clone(),
            color: src.color,
            free_call: src.free_call,
            range: src.range,
        };
        let new_idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(clone);
        new_idx
    }

    /// Copies the source range of `from` onto `idx`.
    pub fn srcref(&mut self, idx: NodeIndex, from: NodeIndex) {
        self.node_mut(idx).range = self.node(from).range;
    }

    /// Copies the source range of `from` onto `idx` and its whole subtree.
    pub fn srcref_tree(&mut self, idx: NodeIndex, from: NodeIndex) {
        let range = self.node(from).range;
        self.set_range_tree(idx, range, false);
    }

    /// Like [`NodeArena::srcref_tree`], but only fills in nodes that have
    /// no source range yet.
    pub fn srcref_tree_if_missing(&mut self, idx: NodeIndex, from: NodeIndex) {
        let range = self.node(from).range;
        self.set_range_tree(idx, range, true);
    }

    fn set_range_tree(&mut self, idx: NodeIndex, range: TextRange, only_missing: bool) {
        if !only_missing || self.node(idx).range.is_missing() {
            self.node_mut(idx).range = range;
        }
        let children = self.node(idx).children.clone();
        for child in children {
            self.set_range_tree(child, range, only_missing);
        }
    }
}

/// True when `idx` is a function declaration: a named function in
/// statement position.
pub fn is_function_declaration(arena: &NodeArena, idx: NodeIndex) -> bool {
    if arena.kind(idx) != NodeKind::Function {
        return false;
    }
    let named = arena
        .first_child(idx)
        .is_some_and(|name| !arena.string(name).is_empty());
    let parent = arena.parent(idx);
    named
        && parent.is_some()
        && matches!(
            arena.kind(parent),
            NodeKind::Block | NodeKind::Root | NodeKind::Label
        )
}

/// True when `idx` reads or writes a variable: any `Name` node with
/// non-empty text. Binding names inside declaration lists count; label
/// text and property names are separate kinds and never match.
pub fn is_reference_name(arena: &NodeArena, idx: NodeIndex) -> bool {
    arena.kind(idx) == NodeKind::Name && !arena.string(idx).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_detach_roundtrip() {
        let mut arena = NodeArena::new();
        let block = arena.alloc(NodeKind::Block);
        let a = arena.alloc(NodeKind::Empty);
        let b = arena.alloc(NodeKind::Empty);
        arena.add_child_to_back(block, a);
        arena.add_child_to_back(block, b);
        assert_eq!(arena.children(block), &[a, b]);
        assert_eq!(arena.parent(a), block);

        arena.detach(a);
        assert_eq!(arena.children(block), &[b]);
        assert!(arena.parent(a).is_none());

        arena.add_child_to_front(block, a);
        assert_eq!(arena.children(block), &[a, b]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut arena = NodeArena::new();
        let block = arena.alloc(NodeKind::Block);
        let a = arena.alloc(NodeKind::Empty);
        let b = arena.alloc(NodeKind::Empty);
        let c = arena.alloc(NodeKind::Empty);
        arena.add_child_to_back(block, a);
        arena.add_child_to_back(block, b);
        arena.replace_with(b, c);
        assert_eq!(arena.children(block), &[a, c]);
        assert!(arena.parent(b).is_none());
    }

    #[test]
    fn insert_before_and_after() {
        let mut arena = NodeArena::new();
        let block = arena.alloc(NodeKind::Block);
        let a = arena.alloc(NodeKind::Empty);
        let b = arena.alloc(NodeKind::Empty);
        let c = arena.alloc(NodeKind::Empty);
        arena.add_child_to_back(block, a);
        arena.insert_after(b, a);
        arena.insert_before(c, b);
        assert_eq!(arena.children(block), &[a, c, b]);
    }

    #[test]
    fn clone_node_is_shallow() {
        let mut arena = NodeArena::new();
        let name = arena.alloc(NodeKind::Name);
        arena.set_name(name, "x");
        arena.node_mut(name).color = Some(ColorId(7));
        let init = arena.alloc(NodeKind::Number);
        arena.add_child_to_back(name, init);

        let clone = arena.clone_node(name);
        assert_eq!(arena.string(clone), "x");
        assert_eq!(arena.node(clone).color, Some(ColorId(7)));
        assert!(arena.children(clone).is_empty());
        assert!(arena.parent(clone).is_none());
    }

    #[test]
    fn take_children_preserves_order() {
        let mut arena = NodeArena::new();
        let block = arena.alloc(NodeKind::Block);
        let a = arena.alloc(NodeKind::Empty);
        let b = arena.alloc(NodeKind::Empty);
        arena.add_child_to_back(block, a);
        arena.add_child_to_back(block, b);

        let inner = arena.alloc(NodeKind::Block);
        let taken = arena.take_children(block);
        assert_eq!(taken, vec![a, b]);
        arena.add_children_to_front(inner, taken);
        assert_eq!(arena.children(inner), &[a, b]);
        assert!(arena.children(block).is_empty());
    }
}
