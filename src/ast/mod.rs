//! AST node model, arena storage, construction, and emission.

pub mod base;
pub mod emit;
pub mod factory;
pub mod node;

pub use base::{NodeIndex, TextRange};
pub use node::{ColorId, JsDocInfo, Node, NodeArena, NodeKind, colors};
