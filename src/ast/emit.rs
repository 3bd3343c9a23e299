//! Compact source rendering of the IR.
//!
//! Prints a tree as minified-style JavaScript, one statement after
//! another with no insignificant whitespace. Tests compare these strings;
//! the renderer is also handy when debugging a transform. Constancy
//! annotations print as `/** @const */` so they stay observable.

use super::base::NodeIndex;
use super::node::{NodeArena, NodeKind};

/// Renders the tree rooted at `root`.
pub fn to_source(arena: &NodeArena, root: NodeIndex) -> String {
    let mut emitter = Emitter {
        arena,
        out: String::new(),
    };
    match arena.kind(root) {
        NodeKind::Root => {
            for &child in arena.children(root) {
                emitter.stmt(child);
            }
        }
        _ => emitter.stmt(root),
    }
    emitter.out
}

struct Emitter<'a> {
    arena: &'a NodeArena,
    out: String,
}

impl<'a> Emitter<'a> {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn jsdoc(&mut self, idx: NodeIndex) {
        if let Some(doc) = &self.arena.node(idx).jsdoc
            && doc.constancy
        {
            self.push("/** @const */ ");
        }
    }

    fn stmt(&mut self, idx: NodeIndex) {
        match self.arena.kind(idx) {
            NodeKind::Block => {
                self.push("{");
                for &child in self.arena.children(idx) {
                    self.stmt(child);
                }
                self.push("}");
            }
            NodeKind::Var | NodeKind::Let | NodeKind::Const => {
                self.decl_list(idx);
                self.push(";");
            }
            NodeKind::Function => self.function(idx),
            NodeKind::ExprResult => {
                let expr = self.arena.children(idx)[0];
                self.jsdoc(expr);
                self.expr(expr);
                self.push(";");
            }
            NodeKind::If => {
                let children = self.arena.children(idx);
                let (cond, then) = (children[0], children[1]);
                let otherwise = children.get(2).copied();
                self.push("if(");
                self.expr(cond);
                self.push(")");
                self.stmt(then);
                if let Some(otherwise) = otherwise {
                    self.push("else ");
                    self.stmt(otherwise);
                }
            }
            NodeKind::While => {
                let children = self.arena.children(idx);
                let (cond, body) = (children[0], children[1]);
                self.push("while(");
                self.expr(cond);
                self.push(")");
                self.stmt(body);
            }
            NodeKind::DoWhile => {
                let children = self.arena.children(idx);
                let (body, cond) = (children[0], children[1]);
                self.push("do");
                self.stmt(body);
                self.push("while(");
                self.expr(cond);
                self.push(");");
            }
            NodeKind::For => {
                let children = self.arena.children(idx);
                let (init, cond, update, body) =
                    (children[0], children[1], children[2], children[3]);
                self.push("for(");
                match self.arena.kind(init) {
                    NodeKind::Empty => {}
                    kind if kind.is_name_declaration() => self.decl_list(init),
                    _ => self.expr(init),
                }
                self.push(";");
                if self.arena.kind(cond) != NodeKind::Empty {
                    self.expr(cond);
                }
                self.push(";");
                if self.arena.kind(update) != NodeKind::Empty {
                    self.expr(update);
                }
                self.push(")");
                self.stmt(body);
            }
            NodeKind::ForIn | NodeKind::ForOf => {
                let children = self.arena.children(idx);
                let (target, object, body) = (children[0], children[1], children[2]);
                self.push("for(");
                if self.arena.kind(target).is_name_declaration() {
                    self.decl_list(target);
                } else {
                    self.expr(target);
                }
                self.push(if self.arena.kind(idx) == NodeKind::ForIn {
                    " in "
                } else {
                    " of "
                });
                self.expr(object);
                self.push(")");
                self.stmt(body);
            }
            NodeKind::Label => {
                let children = self.arena.children(idx);
                let (name, stmt) = (children[0], children[1]);
                self.push(self.arena.string(name));
                self.push(":");
                self.stmt(stmt);
            }
            NodeKind::Break => {
                self.push("break");
                if let Some(&label) = self.arena.children(idx).first() {
                    self.push(" ");
                    self.push(self.arena.string(label));
                }
                self.push(";");
            }
            NodeKind::Continue => {
                self.push("continue");
                if let Some(&label) = self.arena.children(idx).first() {
                    self.push(" ");
                    self.push(self.arena.string(label));
                }
                self.push(";");
            }
            NodeKind::Return => {
                self.push("return");
                if let Some(&expr) = self.arena.children(idx).first() {
                    self.push(" ");
                    self.expr(expr);
                }
                self.push(";");
            }
            NodeKind::Try => {
                let children = self.arena.children(idx);
                self.push("try");
                self.stmt(children[0]);
                if let Some(&catch) = children.get(1) {
                    let catch_children = self.arena.children(catch);
                    self.push("catch(");
                    self.push(self.arena.string(catch_children[0]));
                    self.push(")");
                    self.stmt(catch_children[1]);
                }
            }
            NodeKind::Empty => self.push(";"),
            _ => {
                self.expr(idx);
                self.push(";");
            }
        }
    }

    fn decl_list(&mut self, idx: NodeIndex) {
        self.jsdoc(idx);
        let keyword = match self.arena.kind(idx) {
            NodeKind::Var => "var ",
            NodeKind::Let => "let ",
            NodeKind::Const => "const ",
            kind => panic!("not a declaration list: {kind:?}"),
        };
        self.push(keyword);
        let names = self.arena.children(idx).to_vec();
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.push(",");
            }
            self.push(self.arena.string(*name));
            if let Some(&init) = self.arena.children(*name).first() {
                self.push("=");
                self.expr(init);
            }
        }
    }

    fn function(&mut self, idx: NodeIndex) {
        let children = self.arena.children(idx);
        let (name, params, body) = (children[0], children[1], children[2]);
        self.push("function");
        let name_text = self.arena.string(name);
        if !name_text.is_empty() {
            self.push(" ");
            self.push(name_text);
        }
        self.push("(");
        let params = self.arena.children(params).to_vec();
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.push(",");
            }
            self.push(self.arena.string(*param));
        }
        self.push(")");
        self.stmt(body);
    }

    fn expr(&mut self, idx: NodeIndex) {
        match self.arena.kind(idx) {
            NodeKind::Name | NodeKind::Number => {
                let text = self.arena.string(idx);
                self.push(text);
            }
            NodeKind::StringLit => {
                self.push("\"");
                self.push(self.arena.string(idx));
                self.push("\"");
            }
            NodeKind::ArrayLit => {
                self.push("[");
                let children = self.arena.children(idx).to_vec();
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.expr(*child);
                }
                self.push("]");
            }
            NodeKind::ObjectLit => {
                self.push("{");
                let children = self.arena.children(idx).to_vec();
                for (i, entry) in children.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.object_entry(*entry);
                }
                self.push("}");
            }
            NodeKind::GetProp => {
                let receiver = self.arena.children(idx)[0];
                self.expr(receiver);
                self.push(".");
                self.push(self.arena.string(idx));
            }
            NodeKind::Call => {
                let children = self.arena.children(idx).to_vec();
                let callee = children[0];
                if self.arena.kind(callee) == NodeKind::Function {
                    self.push("(");
                    self.expr(callee);
                    self.push(")");
                } else {
                    self.expr(callee);
                }
                self.push("(");
                for (i, arg) in children[1..].iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.expr(*arg);
                }
                self.push(")");
            }
            NodeKind::Assign => {
                let children = self.arena.children(idx);
                let (target, value) = (children[0], children[1]);
                self.expr(target);
                self.push("=");
                self.expr(value);
            }
            NodeKind::Comma => {
                let children = self.arena.children(idx);
                let (first, second) = (children[0], children[1]);
                self.expr(first);
                self.push(",");
                self.expr(second);
            }
            NodeKind::Bin => {
                let children = self.arena.children(idx);
                let (left, right) = (children[0], children[1]);
                self.expr(left);
                self.push(self.arena.string(idx));
                self.expr(right);
            }
            NodeKind::Inc => {
                self.expr(self.arena.children(idx)[0]);
                self.push("++");
            }
            NodeKind::Function => self.function(idx),
            NodeKind::Cast => self.expr(self.arena.children(idx)[0]),
            NodeKind::Empty => {}
            kind => panic!("not an expression: {kind:?}"),
        }
    }

    fn object_entry(&mut self, idx: NodeIndex) {
        match self.arena.kind(idx) {
            NodeKind::StringKey => {
                self.push(self.arena.string(idx));
                self.push(":");
                self.expr(self.arena.children(idx)[0]);
            }
            NodeKind::GetterDef | NodeKind::SetterDef => {
                self.push(if self.arena.kind(idx) == NodeKind::GetterDef {
                    "get "
                } else {
                    "set "
                });
                self.push(self.arena.string(idx));
                let function = self.arena.children(idx)[0];
                let fn_children = self.arena.children(function).to_vec();
                self.push("(");
                let params = self.arena.children(fn_children[1]).to_vec();
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.push(self.arena.string(*param));
                }
                self.push(")");
                self.stmt(fn_children[2]);
            }
            kind => panic!("not an object literal entry: {kind:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::factory;

    #[test]
    fn renders_declarations_and_calls() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::Root);
        let one = factory::create_number(&mut arena, "1");
        let x = factory::create_binding(&mut arena, "x", Some(one));
        let decl = factory::create_decl_list(&mut arena, NodeKind::Let, vec![x]);
        arena.add_child_to_back(root, decl);
        let callee = factory::create_name(&mut arena, "use", None);
        let arg = factory::create_name(&mut arena, "x", None);
        let call = factory::create_call(&mut arena, callee, vec![arg], None);
        let stmt = factory::create_expr_result(&mut arena, call);
        arena.add_child_to_back(root, stmt);

        assert_eq!(to_source(&arena, root), "let x=1;use(x);");
    }

    #[test]
    fn renders_const_annotation() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::Root);
        let one = factory::create_number(&mut arena, "1");
        let x = factory::create_binding(&mut arena, "x", Some(one));
        let decl = factory::create_decl_list(&mut arena, NodeKind::Var, vec![x]);
        arena
            .node_mut(decl)
            .jsdoc
            .get_or_insert_with(Default::default)
            .record_constancy();
        arena.add_child_to_back(root, decl);

        assert_eq!(to_source(&arena, root), "/** @const */ var x=1;");
    }

    #[test]
    fn renders_loops_and_labels() {
        // outer:while(c()){continue outer;}
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::Root);
        let c = factory::create_name(&mut arena, "c", None);
        let cond = factory::create_call(&mut arena, c, vec![], None);
        let label_ref = factory::create_label_name(&mut arena, "outer");
        let cont = factory::create_continue(&mut arena, Some(label_ref));
        let body = factory::create_block(&mut arena, vec![cont]);
        let while_node = factory::create_while(&mut arena, cond, body);
        let label_name = factory::create_label_name(&mut arena, "outer");
        let label = factory::create_label(&mut arena, label_name, while_node);
        arena.add_child_to_back(root, label);

        assert_eq!(to_source(&arena, root), "outer:while(c()){continue outer;}");
    }

    #[test]
    fn renders_iife() {
        // (function(a){return a;})(b);
        let mut arena = NodeArena::new();
        let root = arena.alloc(NodeKind::Root);
        let a_ref = factory::create_name(&mut arena, "a", None);
        let ret = factory::create_return(&mut arena, Some(a_ref));
        let body = factory::create_block(&mut arena, vec![ret]);
        let a = factory::create_name(&mut arena, "a", None);
        let params = factory::create_param_list(&mut arena, vec![a]);
        let f = factory::create_function(&mut arena, "", params, body, None);
        let b = factory::create_name(&mut arena, "b", None);
        let call = factory::create_call(&mut arena, f, vec![b], None);
        let stmt = factory::create_expr_result(&mut arena, call);
        arena.add_child_to_back(root, stmt);

        assert_eq!(to_source(&arena, root), "(function(a){return a;})(b);");
    }
}
