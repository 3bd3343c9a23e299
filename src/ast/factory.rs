//! Typed node constructors.
//!
//! Every node the transform synthesizes goes through these helpers so that
//! child layout conventions live in one place. Constructors that produce
//! value-typed nodes take an optional color and attach it, mirroring how
//! the type attribution system tags synthesized nodes.

use super::base::NodeIndex;
use super::node::{ColorId, NodeArena, NodeKind};

pub fn create_name(arena: &mut NodeArena, name: &str, color: Option<ColorId>) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Name);
    arena.set_name(idx, name);
    arena.node_mut(idx).color = color;
    idx
}

/// The `undefined` value reference.
pub fn create_undefined_value(arena: &mut NodeArena) -> NodeIndex {
    create_name(arena, "undefined", None)
}

pub fn create_number(arena: &mut NodeArena, text: &str) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Number);
    arena.set_name(idx, text);
    idx
}

pub fn create_string_lit(arena: &mut NodeArena, text: &str) -> NodeIndex {
    let idx = arena.alloc(NodeKind::StringLit);
    arena.set_name(idx, text);
    idx
}

pub fn create_array_lit(arena: &mut NodeArena) -> NodeIndex {
    arena.alloc(NodeKind::ArrayLit)
}

pub fn create_object_lit(arena: &mut NodeArena) -> NodeIndex {
    arena.alloc(NodeKind::ObjectLit)
}

/// An object-literal entry `key: value`.
pub fn create_string_key(
    arena: &mut NodeArena,
    key: &str,
    value: NodeIndex,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::StringKey);
    arena.set_name(idx, key);
    arena.add_child_to_back(idx, value);
    idx
}

/// An assignment expression; the result carries the value's color.
pub fn create_assign(arena: &mut NodeArena, target: NodeIndex, value: NodeIndex) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Assign);
    let color = arena.node(value).color;
    arena.node_mut(idx).color = color;
    arena.add_child_to_back(idx, target);
    arena.add_child_to_back(idx, value);
    idx
}

/// A property access `receiver.prop`.
pub fn create_get_prop(
    arena: &mut NodeArena,
    receiver: NodeIndex,
    prop: &str,
    color: Option<ColorId>,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::GetProp);
    arena.set_name(idx, prop);
    arena.node_mut(idx).color = color;
    arena.add_child_to_back(idx, receiver);
    idx
}

pub fn create_comma(arena: &mut NodeArena, first: NodeIndex, second: NodeIndex) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Comma);
    let color = arena.node(second).color;
    arena.node_mut(idx).color = color;
    arena.add_child_to_back(idx, first);
    arena.add_child_to_back(idx, second);
    idx
}

pub fn create_call(
    arena: &mut NodeArena,
    callee: NodeIndex,
    args: Vec<NodeIndex>,
    color: Option<ColorId>,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Call);
    arena.node_mut(idx).color = color;
    arena.add_child_to_back(idx, callee);
    for arg in args {
        arena.add_child_to_back(idx, arg);
    }
    idx
}

pub fn create_param_list(arena: &mut NodeArena, params: Vec<NodeIndex>) -> NodeIndex {
    let idx = arena.alloc(NodeKind::ParamList);
    for param in params {
        arena.add_child_to_back(idx, param);
    }
    idx
}

/// A function node `function <name>(<params>) <body>`; pass `""` for an
/// anonymous function expression.
pub fn create_function(
    arena: &mut NodeArena,
    name: &str,
    param_list: NodeIndex,
    body: NodeIndex,
    color: Option<ColorId>,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Function);
    arena.node_mut(idx).color = color;
    let name_node = create_name(arena, name, None);
    arena.add_child_to_back(idx, name_node);
    arena.add_child_to_back(idx, param_list);
    arena.add_child_to_back(idx, body);
    idx
}

/// A single-binding `var` list. `name_node` must be a detached `Name`;
/// when a value is given it becomes the binding's initializer.
pub fn create_var(
    arena: &mut NodeArena,
    name_node: NodeIndex,
    value: Option<NodeIndex>,
) -> NodeIndex {
    if let Some(value) = value {
        arena.add_child_to_back(name_node, value);
    }
    let idx = arena.alloc(NodeKind::Var);
    arena.add_child_to_back(idx, name_node);
    idx
}

/// A declaration list of the given kind over pre-built `Name` bindings.
pub fn create_decl_list(
    arena: &mut NodeArena,
    kind: NodeKind,
    names: Vec<NodeIndex>,
) -> NodeIndex {
    debug_assert!(kind.is_name_declaration());
    let idx = arena.alloc(kind);
    for name in names {
        arena.add_child_to_back(idx, name);
    }
    idx
}

/// A `Name` binding with an optional initializer, for declaration lists.
pub fn create_binding(
    arena: &mut NodeArena,
    name: &str,
    value: Option<NodeIndex>,
) -> NodeIndex {
    let idx = create_name(arena, name, None);
    if let Some(value) = value {
        arena.add_child_to_back(idx, value);
    }
    idx
}

pub fn create_block(arena: &mut NodeArena, statements: Vec<NodeIndex>) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Block);
    for stmt in statements {
        arena.add_child_to_back(idx, stmt);
    }
    idx
}

pub fn create_label_name(arena: &mut NodeArena, name: &str) -> NodeIndex {
    let idx = arena.alloc(NodeKind::LabelName);
    arena.set_name(idx, name);
    idx
}

pub fn create_label(
    arena: &mut NodeArena,
    label_name: NodeIndex,
    statement: NodeIndex,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Label);
    arena.add_child_to_back(idx, label_name);
    arena.add_child_to_back(idx, statement);
    idx
}

pub fn create_break(arena: &mut NodeArena, label_name: Option<NodeIndex>) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Break);
    if let Some(label) = label_name {
        arena.add_child_to_back(idx, label);
    }
    idx
}

pub fn create_continue(arena: &mut NodeArena, label_name: Option<NodeIndex>) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Continue);
    if let Some(label) = label_name {
        arena.add_child_to_back(idx, label);
    }
    idx
}

pub fn create_expr_result(arena: &mut NodeArena, expr: NodeIndex) -> NodeIndex {
    let idx = arena.alloc(NodeKind::ExprResult);
    arena.add_child_to_back(idx, expr);
    idx
}

pub fn create_empty(arena: &mut NodeArena) -> NodeIndex {
    arena.alloc(NodeKind::Empty)
}

pub fn create_return(arena: &mut NodeArena, expr: Option<NodeIndex>) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Return);
    if let Some(expr) = expr {
        arena.add_child_to_back(idx, expr);
    }
    idx
}

pub fn create_bin(
    arena: &mut NodeArena,
    op: &str,
    left: NodeIndex,
    right: NodeIndex,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Bin);
    arena.set_name(idx, op);
    arena.add_child_to_back(idx, left);
    arena.add_child_to_back(idx, right);
    idx
}

/// Postfix increment.
pub fn create_inc(arena: &mut NodeArena, operand: NodeIndex) -> NodeIndex {
    let idx = arena.alloc(NodeKind::Inc);
    arena.add_child_to_back(idx, operand);
    idx
}

pub fn create_if(
    arena: &mut NodeArena,
    cond: NodeIndex,
    then: NodeIndex,
    otherwise: Option<NodeIndex>,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::If);
    arena.add_child_to_back(idx, cond);
    arena.add_child_to_back(idx, then);
    if let Some(otherwise) = otherwise {
        arena.add_child_to_back(idx, otherwise);
    }
    idx
}

pub fn create_while(arena: &mut NodeArena, cond: NodeIndex, body: NodeIndex) -> NodeIndex {
    let idx = arena.alloc(NodeKind::While);
    arena.add_child_to_back(idx, cond);
    arena.add_child_to_back(idx, body);
    idx
}

pub fn create_do_while(arena: &mut NodeArena, body: NodeIndex, cond: NodeIndex) -> NodeIndex {
    let idx = arena.alloc(NodeKind::DoWhile);
    arena.add_child_to_back(idx, body);
    arena.add_child_to_back(idx, cond);
    idx
}

pub fn create_for(
    arena: &mut NodeArena,
    init: NodeIndex,
    cond: NodeIndex,
    update: NodeIndex,
    body: NodeIndex,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::For);
    arena.add_child_to_back(idx, init);
    arena.add_child_to_back(idx, cond);
    arena.add_child_to_back(idx, update);
    arena.add_child_to_back(idx, body);
    idx
}

pub fn create_for_in(
    arena: &mut NodeArena,
    target: NodeIndex,
    object: NodeIndex,
    body: NodeIndex,
) -> NodeIndex {
    let idx = arena.alloc(NodeKind::ForIn);
    arena.add_child_to_back(idx, target);
    arena.add_child_to_back(idx, object);
    arena.add_child_to_back(idx, body);
    idx
}

/// An accessor entry `get name() ...` / `set name(v) ...` for an object
/// literal.
pub fn create_accessor(
    arena: &mut NodeArena,
    kind: NodeKind,
    name: &str,
    function: NodeIndex,
) -> NodeIndex {
    debug_assert!(matches!(kind, NodeKind::GetterDef | NodeKind::SetterDef));
    let idx = arena.alloc(kind);
    arena.set_name(idx, name);
    arena.add_child_to_back(idx, function);
    idx
}
