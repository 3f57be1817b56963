//! Loopify IR - captured pipeline expressions
//!
//! This crate holds the data the lowering engine consumes:
//! - Java types (`JavaType`) with the stream, optional and collection queries
//! - Expression nodes (`Expr`, `ExprKind`) addressed by `ExprId(u32)`
//! - The arena that owns them
//! - A precedence-aware printer with substitution and negation
//! - Default variable name suggestions
//!
//! # Design Philosophy
//!
//! - **Flatten Everything**: no `Box<Expr>`, children are `ExprId` indices
//! - **Resolved Up Front**: every node carries its type; the engine never infers
//! - **Text Out**: the printer is the only place expressions become source

/// Compile-time assertion that a type has a specific size.
///
/// Used to prevent accidental size regressions in frequently-copied types.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod arena;
pub mod ast;
mod expr_id;
pub mod names;
mod printer;
mod ty;

pub use arena::ExprArena;
pub use ast::{
    BinaryOp, Expr, ExprKind, LambdaBody, Literal, MethodRefKind, Param, Precedence, Receiver,
    Stmt, UnaryOp,
};
pub use expr_id::ExprId;
pub use printer::{is_safely_recomputable, is_side_effect_free, render, Operand, Printer, Substitution};
pub use ty::{JavaType, PrimitiveType, WildcardBound};

static_assert_size!(ExprId, 4);
