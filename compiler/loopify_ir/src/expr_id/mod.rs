//! Expression IDs for the flat pipeline arena.
//!
//! The host hands the lowering engine an arena of already-resolved
//! expressions. Every node is addressed by an `ExprId(u32)` index instead of
//! a boxed child, so captured argument handles are `Copy` and cheap to store
//! inside operations.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Index into an [`ExprArena`](crate::ExprArena).
///
/// # Design
/// - Memory: 4 bytes
/// - Equality: O(1) integer compare
#[derive(Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    /// Create a new `ExprId`.
    #[inline]
    pub const fn new(index: u32) -> Self {
        ExprId(index)
    }

    /// Get the index into the arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Hash for ExprId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}
