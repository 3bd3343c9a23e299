//! Lowering of ES6 block-scoped declarations to ES5 function-scoped form.
//!
//! This crate rewrites `let` and `const` declarations as `var` declarations
//! over a mutable compiler IR, renaming bindings where hoisting would
//! collide and preserving per-iteration binding semantics for variables
//! captured by closures created inside loops.
//!
//! # Architecture
//!
//! The pipeline runs in strict phases over one AST:
//!
//! 1. **Collision resolution** - block-scoped bindings that would collide
//!    once hoisted are renamed and re-declared in their hoist scope; the
//!    renames are recorded in a rename table.
//! 2. **Reference renaming** - references are rewritten from the table.
//! 3. **Loop closure transformation** - block-scoped variables captured by
//!    functions inside their loop are re-seated as properties of a
//!    per-iteration loop object, and the capturing functions are wrapped
//!    in IIFEs that freeze the current iteration's object.
//! 4. **Token flip** - remaining `let`/`const` declaration lists are split
//!    (for `const`) and retokened as `var`.
//!
//! Destructuring, classes, `for-of` and arrow functions must be lowered
//! before this pass runs; encountering them is a pipeline error.

pub mod ast;
pub mod common;
pub mod scopes;
pub mod transforms;
pub mod traversal;

// Re-export key types at crate root for convenience
pub use ast::base::{NodeIndex, TextRange};
pub use ast::node::{ColorId, JsDocInfo, Node, NodeArena, NodeKind};
pub use common::{ChangeReporter, NoopChangeReporter, Options, UniqueIdSupplier, features};
pub use scopes::{DeclKind, ScopeId, ScopeKind, ScopeTree, VarId};
pub use transforms::block_scoping::BlockScopeRewriter;
