//! Intermediate stages: code wrapped around the rest of the loop body.

use loopify_ir::{ExprArena, ExprId, JavaType};

use crate::context::ReplacementContext;
use crate::error::LowerResult;
use crate::function::Callable;
use crate::host::Host;
use crate::slot::{BoundSlots, SlotId, SlotTable};

use super::OperationRecord;

/// A stage between the source and the terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntermediateOp {
    Filter { predicate: Callable },
    TakeWhile { predicate: Callable },
    DropWhile { predicate: Callable },
    Peek { action: Callable },
    Map { mapper: Callable },
    /// `boxed()`, `asLongStream()`, `asDoubleStream()`.
    Widening,
    /// A nested pipeline run for every element.
    FlatMap(FlatMap),
    Distinct,
    Skip { count: ExprId },
    Limit { count: ExprId },
    Sorted { comparator: Option<ExprId> },
}

/// `flatMap` argument lowered to its own operation records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatMap {
    /// Lambda parameter standing for the outer element.
    pub param: Option<String>,
    /// Source through terminal-less last stage of the inner pipeline.
    pub records: Vec<OperationRecord>,
    /// Condition of a `cond ? Stream.empty() : pipeline` body and whether
    /// the pipeline runs when it is false.
    pub guard: Option<(ExprId, bool)>,
}

impl IntermediateOp {
    /// Whether the output element lives in a new variable.
    pub fn changes_variable(&self) -> bool {
        matches!(
            self,
            IntermediateOp::Map { .. } | IntermediateOp::Widening | IntermediateOp::FlatMap(_)
        )
    }

    pub fn preprocess(&self, arena: &ExprArena, host: &dyn Host, slots: &mut SlotTable, input: SlotId, out: SlotId) {
        match self {
            IntermediateOp::Filter { predicate: callable }
            | IntermediateOp::TakeWhile { predicate: callable }
            | IntermediateOp::DropWhile { predicate: callable }
            | IntermediateOp::Peek { action: callable } => {
                if let Some(slot) = slots.get_mut(input) {
                    callable.preprocess_variable(arena, slot, 0);
                }
            }
            IntermediateOp::Map { mapper } => {
                if let Some(slot) = slots.get_mut(input) {
                    mapper.preprocess_variable(arena, slot, 0);
                }
                if let Some(slot) = slots.get_mut(out) {
                    mapper.suggest_output_names(arena, host, slot);
                }
            }
            IntermediateOp::FlatMap(flat_map) => {
                for record in flat_map.records.iter().rev() {
                    record.op.preprocess(arena, host, slots, record.in_var, record.out_var);
                }
                if let (Some(param), Some(slot)) = (&flat_map.param, slots.get_mut(input)) {
                    slot.add_best_candidate(param.clone());
                }
            }
            IntermediateOp::Widening
            | IntermediateOp::Distinct
            | IntermediateOp::Skip { .. }
            | IntermediateOp::Limit { .. }
            | IntermediateOp::Sorted { .. } => {}
        }
    }

    pub fn wrap(
        self,
        input: SlotId,
        out: SlotId,
        code: String,
        ctx: &mut ReplacementContext<'_>,
        slots: &BoundSlots,
    ) -> LowerResult<String> {
        let item = slots.get(input)?;
        match self {
            IntermediateOp::Filter { predicate } => {
                let predicate = predicate.transform(ctx, &[item.operand()])?;
                Ok(format!("if ({}) {{\n{code}}}\n", predicate.text()))
            }
            IntermediateOp::TakeWhile { predicate } => {
                let predicate = predicate.transform(ctx, &[item.operand()])?;
                let exit = ctx.break_statement();
                Ok(format!("if ({}) {{\n{exit}}}\n{code}", predicate.negated().text))
            }
            IntermediateOp::DropWhile { predicate } => {
                let dropping = ctx.declare(&["dropping"], &JavaType::BOOLEAN, "true");
                let predicate = predicate.transform(ctx, &[item.operand()])?;
                Ok(format!(
                    "if ({dropping}) {{\nif ({}) {{\ncontinue;\n}}\n{dropping} = false;\n}}\n{code}",
                    predicate.text()
                ))
            }
            IntermediateOp::Peek { action } => {
                let action = action.transform(ctx, &[item.operand()])?;
                Ok(format!("{}{code}", action.statement()))
            }
            IntermediateOp::Map { mapper } => {
                let mapped = mapper.transform(ctx, &[item.operand()])?;
                Ok(format!("{}{code}", slots.get(out)?.declare_with(mapped.text())))
            }
            IntermediateOp::Widening => Ok(format!("{}{code}", slots.get(out)?.declare_with(item.name()))),
            IntermediateOp::FlatMap(flat_map) => flat_map.wrap(item.operand(), code, ctx, slots),
            IntermediateOp::Distinct => {
                let set_ty = JavaType::generic("java.util.Set", vec![item.ty().boxed()]);
                let seen = ctx.declare(&["uniqueValues"], &set_ty, "new java.util.HashSet<>()");
                Ok(format!("if ({seen}.add({item})) {{\n{code}}}\n"))
            }
            IntermediateOp::Skip { count } => {
                if ctx.arena().integer_value(count) == Some(1) {
                    let first = ctx.declare(&["first"], &JavaType::BOOLEAN, "true");
                    return Ok(format!("if ({first}) {{\n{first} = false;\ncontinue;\n}}\n{code}"));
                }
                let init = ctx.render(count).text;
                let to_skip = ctx.declare(&["toSkip"], &JavaType::LONG, &init);
                Ok(format!("if ({to_skip} > 0) {{\n{to_skip}--;\ncontinue;\n}}\n{code}"))
            }
            IntermediateOp::Limit { count } => {
                let init = ctx.render(count).text;
                let limit = ctx.declare(&["limit"], &JavaType::LONG, &init);
                let exit = ctx.break_statement();
                Ok(format!("if ({limit}-- == 0) {{\n{exit}}}\n{code}"))
            }
            IntermediateOp::Sorted { comparator } => {
                let list_ty = JavaType::list_of(&item.ty().boxed());
                let list = ctx.declare(&["toSort"], &list_ty, "new java.util.ArrayList<>()");
                let comparator = match comparator {
                    Some(comparator) => ctx.render(comparator).text,
                    None => "null".to_owned(),
                };
                let out = slots.get(out)?;
                ctx.add_after_step(format!(
                    "{list}.sort({comparator});\n{}for ({} : {list}) {{\n{code}}}\n",
                    ctx.label_prefix(),
                    out.declaration()
                ));
                Ok(format!("{list}.add({item});\n"))
            }
        }
    }
}

impl FlatMap {
    fn has_nested_loop(&self) -> bool {
        self.records
            .iter()
            .any(|record| matches!(record.op, super::Operation::Intermediate(IntermediateOp::FlatMap(_))))
    }

    fn wrap(
        self,
        input: loopify_ir::Operand,
        code: String,
        ctx: &mut ReplacementContext<'_>,
        slots: &BoundSlots,
    ) -> LowerResult<String> {
        let has_nested_loop = self.has_nested_loop();
        let mut inner = ctx.nested(self.param.as_deref(), input, has_nested_loop);
        let mut body = code;
        for record in self.records.into_iter().rev() {
            body = record.op.wrap(record.in_var, record.out_var, body, &mut inner, slots)?;
        }
        let body = format!("{}{body}{}", inner.drain_before(), inner.drain_after());
        match self.guard {
            None => Ok(body),
            Some((condition, runs_when_false)) => {
                let condition = if runs_when_false {
                    inner.negate(condition)
                } else {
                    inner.render(condition)
                };
                Ok(format!("if ({}) {{\n{body}}}\n", condition.text))
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
