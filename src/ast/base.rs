//! Shared AST base types.

use serde::{Deserialize, Serialize};

/// A text range with start and end positions.
/// All positions are character indices (not byte indices).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub pos: u32,
    pub end: u32,
}

impl TextRange {
    pub fn new(pos: u32, end: u32) -> TextRange {
        TextRange { pos, end }
    }

    /// True when the range has never been set from a source location.
    #[inline]
    pub fn is_missing(&self) -> bool {
        self.pos == 0 && self.end == 0
    }
}

/// Index into the node arena. Used instead of references so the AST forms a
/// serialization-friendly graph with stable handles across mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub const NONE: NodeIndex = NodeIndex(u32::MAX);

    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }
}
