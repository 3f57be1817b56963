//! Pipeline stages.
//!
//! A pipeline is a flat list of [`OperationRecord`]s: one source, any
//! number of intermediates and one terminal. Each record names the slot it
//! reads and the slot it writes. Lowering runs in two backward passes:
//!
//! 1. `preprocess`, last stage first, lets stages offer names to the slots
//!    they consume (a lambda parameter `name` makes the slot `name`)
//! 2. `wrap`, last stage first, nests the code built so far inside each
//!    stage's own code, ending at the source loop header
//!
//! Adjacent stages may first be fused with [`Operation::combine_with_next`].

mod collector;
mod intermediate;
mod source;
mod terminal;

pub use collector::{
    BoundCollector, CollectorOp, ContainerCollector, GroupBy, MergeMode, TemplateCollector, ToCollection, ToMap,
};
pub use intermediate::{FlatMap, IntermediateOp};
pub use source::SourceOp;
pub use terminal::{MatchKind, MinMax, SortOrigin, TerminalOp, ToArray};

use loopify_ir::ExprArena;

use crate::context::ReplacementContext;
use crate::error::{LowerError, LowerResult};
use crate::host::Host;
use crate::slot::{BoundSlots, SlotId, SlotTable};

/// One stage of a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Source(SourceOp),
    Intermediate(IntermediateOp),
    Terminal(TerminalOp),
}

/// A stage with the slots it reads and writes.
///
/// Sources read [`SlotId::STUB`]; terminals write it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationRecord {
    pub op: Operation,
    pub in_var: SlotId,
    pub out_var: SlotId,
}

/// Outcome of trying to fuse two adjacent stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Combined {
    Fused(Operation),
    Separate(Operation, Operation),
}

impl Operation {
    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Source(_) => "source",
            Operation::Intermediate(_) => "intermediate",
            Operation::Terminal(_) => "terminal",
        }
    }

    /// Whether the stage writes a slot different from the one it reads.
    pub fn changes_variable(&self) -> bool {
        match self {
            Operation::Source(_) | Operation::Terminal(_) => true,
            Operation::Intermediate(op) => op.changes_variable(),
        }
    }

    pub fn preprocess(&self, arena: &ExprArena, host: &dyn Host, slots: &mut SlotTable, input: SlotId, out: SlotId) {
        match self {
            Operation::Source(op) => op.preprocess(arena, host, slots, out),
            Operation::Intermediate(op) => op.preprocess(arena, host, slots, input, out),
            Operation::Terminal(op) => {
                if let Some(slot) = slots.get_mut(input) {
                    op.preprocess(arena, slot);
                }
            }
        }
    }

    /// Nest `code` inside this stage.
    ///
    /// For a terminal `code` is empty and the result is the innermost
    /// per-element code.
    pub fn wrap(
        self,
        input: SlotId,
        out: SlotId,
        code: String,
        ctx: &mut ReplacementContext<'_>,
        slots: &BoundSlots,
    ) -> LowerResult<String> {
        match self {
            Operation::Source(op) => op.wrap(slots.get(out)?, &code, ctx),
            Operation::Intermediate(op) => op.wrap(input, out, code, ctx, slots),
            Operation::Terminal(op) => {
                if !code.is_empty() {
                    return Err(LowerError::internal("terminal stage is not the last one"));
                }
                op.generate(slots.get(input)?, ctx)
            }
        }
    }

    /// Fuse with the following stage where one stage subsumes both.
    ///
    /// `generate(s).limit(n)` becomes a counted loop and `sorted()` before a
    /// list or array terminal sorts the collected result in place.
    pub fn combine_with_next(self, next: Operation) -> Combined {
        match (self, next) {
            (
                Operation::Source(SourceOp::Generate { supplier, limit: None }),
                Operation::Intermediate(IntermediateOp::Limit { count }),
            ) => Combined::Fused(Operation::Source(SourceOp::Generate {
                supplier,
                limit: Some(count),
            })),
            (Operation::Intermediate(IntermediateOp::Sorted { comparator }), Operation::Terminal(terminal)) => {
                match terminal.into_sort_origin() {
                    Ok(origin) => Combined::Fused(Operation::Terminal(TerminalOp::Sorted { origin, comparator })),
                    Err(terminal) => Combined::Separate(
                        Operation::Intermediate(IntermediateOp::Sorted { comparator }),
                        Operation::Terminal(terminal),
                    ),
                }
            }
            (op, next) => Combined::Separate(op, next),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
