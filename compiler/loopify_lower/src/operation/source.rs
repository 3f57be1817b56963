//! Source stages: the loop header that produces the elements.

use loopify_ir::{
    is_safely_recomputable, is_side_effect_free, names, ExprArena, ExprId, JavaType, Precedence, PrimitiveType,
};

use crate::context::ReplacementContext;
use crate::error::LowerResult;
use crate::function::Callable;
use crate::host::Host;
use crate::slot::{BoundSlot, SlotId, SlotTable, UnboundSlot};

/// Where the elements come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceOp {
    /// `collection.stream()`, `Arrays.stream(array)`, `Stream.of(array)`.
    ForEach { iterable: ExprId },
    /// `Arrays.stream(array, from, to)`.
    ArraySlice { array: ExprId, from: ExprId, to: ExprId },
    /// `Stream.of(a, b, c)`, `IntStream.of(..)`, `Stream.empty()`.
    Explicit { elements: Vec<ExprId>, element: JavaType },
    /// `Stream.generate(supplier)`, optionally bounded by a fused `limit`.
    Generate { supplier: Callable, limit: Option<ExprId> },
    /// `Stream.iterate(seed, [has_next,] next)`.
    Iterate {
        seed: ExprId,
        has_next: Option<Callable>,
        next: Callable,
    },
    /// `IntStream.range(from, to)` and `rangeClosed`.
    Range {
        from: ExprId,
        to: ExprId,
        inclusive: bool,
        element: JavaType,
    },
    /// Any other stream expression, drained through its iterator.
    OpaqueIterator { stream: ExprId, element: JavaType },
}

impl SourceOp {
    /// Feed the element slot with names from the source expression.
    pub fn preprocess(&self, arena: &ExprArena, host: &dyn Host, slots: &mut SlotTable, out: SlotId) {
        let Some(out) = slots.get_mut(out) else {
            return;
        };
        match self {
            SourceOp::ForEach { iterable: container }
            | SourceOp::ArraySlice { array: container, .. } => {
                suggest_element_names(arena, host, *container, out);
            }
            SourceOp::OpaqueIterator { stream, .. } => suggest_element_names(arena, host, *stream, out),
            SourceOp::Iterate { has_next, next, .. } => {
                next.preprocess_variable(arena, out, 0);
                if let Some(has_next) = has_next {
                    has_next.preprocess_variable(arena, out, 0);
                }
            }
            SourceOp::Range { .. } => {
                for name in ["i", "j", "idx"] {
                    out.add_other_candidate(name);
                }
            }
            SourceOp::Generate { supplier, .. } => supplier.suggest_output_names(arena, host, out),
            SourceOp::Explicit { .. } => {}
        }
    }

    /// The loop over `out`, with `code` as its body.
    ///
    /// Hoisted declarations are left in the context; the caller drains them
    /// around the loop.
    pub fn wrap(self, out: &BoundSlot, code: &str, ctx: &mut ReplacementContext<'_>) -> LowerResult<String> {
        let loop_text = match self {
            SourceOp::ForEach { iterable } => {
                let iterable = ctx.render(iterable).text;
                format!("for ({} : {iterable}) {{\n{code}}}\n", out.declaration())
            }
            SourceOp::ArraySlice { array, from, to } => {
                let array_text = if is_side_effect_free(ctx.arena(), array) {
                    ctx.render(array).wrapped(Precedence::Postfix)
                } else {
                    let ty = ctx.arena().ty(array).clone();
                    let init = ctx.render(array).text;
                    ctx.declare(&["array", "arr"], &ty, &init)
                };
                let bound = hoist_bound(ctx, to, &JavaType::INT);
                let from = ctx.render(from).text;
                let index = ctx.register_var_name(&["i", "j", "idx"]);
                format!(
                    "for (int {index} = {from}; {index} < {bound}; {index}++) {{\n{}{code}}}\n",
                    out.declare_with(&format!("{array_text}[{index}]"))
                )
            }
            SourceOp::Explicit { elements, element } => {
                let args = elements
                    .iter()
                    .map(|e| ctx.render(*e).text)
                    .collect::<Vec<_>>()
                    .join(", ");
                let iterable = if element.is_primitive() || element.is_reifiable() {
                    format!("new {element}[]{{{args}}}")
                } else {
                    format!("java.util.Arrays.<{}>asList({args})", element.boxed())
                };
                format!("for ({} : {iterable}) {{\n{code}}}\n", out.declaration())
            }
            SourceOp::Generate { supplier, limit } => {
                let value = supplier.transform(ctx, &[])?;
                let element = out.declare_with(value.text());
                match limit {
                    None => format!("while (true) {{\n{element}{code}}}\n"),
                    Some(limit) => {
                        let bound = hoist_bound(ctx, limit, &JavaType::LONG);
                        let index = ctx.register_var_name(&["i", "j", "idx"]);
                        format!("for (long {index} = 0; {index} < {bound}; {index}++) {{\n{element}{code}}}\n")
                    }
                }
            }
            SourceOp::Iterate { seed, has_next, next } => {
                let seed = ctx.render(seed).text;
                let condition = match has_next {
                    Some(has_next) => has_next.transform(ctx, &[out.operand()])?.text().to_owned(),
                    None => String::new(),
                };
                let step = next.transform(ctx, &[out.operand()])?;
                format!(
                    "for ({} = {seed}; {condition}; {out} = {}) {{\n{code}}}\n",
                    out.declaration(),
                    step.text()
                )
            }
            SourceOp::Range {
                from,
                to,
                inclusive,
                element,
            } => {
                let bound = hoist_bound(ctx, to, &element);
                let from = ctx.render(from).text;
                let op = if inclusive { "<=" } else { "<" };
                format!(
                    "for ({} = {from}; {out} {op} {bound}; {out}++) {{\n{code}}}\n",
                    out.declaration()
                )
            }
            SourceOp::OpaqueIterator { stream, element } => {
                let (iterator_ty, next) = match element.as_primitive() {
                    Some(PrimitiveType::Int) => ("java.util.PrimitiveIterator.OfInt".to_owned(), "nextInt"),
                    Some(PrimitiveType::Long) => ("java.util.PrimitiveIterator.OfLong".to_owned(), "nextLong"),
                    Some(PrimitiveType::Double) => ("java.util.PrimitiveIterator.OfDouble".to_owned(), "nextDouble"),
                    _ => (format!("java.util.Iterator<{}>", element.boxed()), "next"),
                };
                let stream = ctx.render(stream).wrapped(Precedence::Postfix);
                let it = ctx.register_var_name(&["it", "iterator"]);
                format!(
                    "for ({iterator_ty} {it} = {stream}.iterator(); {it}.hasNext(); ) {{\n{}{code}}}\n",
                    out.declare_with(&format!("{it}.{next}()"))
                )
            }
        };
        Ok(format!("{}{loop_text}", ctx.label_prefix()))
    }
}

/// Loop bounds are re-evaluated every iteration; anything costly or
/// effectful is computed once up front.
fn hoist_bound(ctx: &mut ReplacementContext<'_>, bound: ExprId, ty: &JavaType) -> String {
    let text = ctx.render(bound);
    if is_safely_recomputable(ctx.arena(), bound) {
        return text.wrapped(Precedence::Shift);
    }
    ctx.declare(&["bound", "limit"], ty, &text.text)
}

/// Singular forms of the container's names (`names` yields `name`).
fn suggest_element_names(arena: &ExprArena, host: &dyn Host, container: ExprId, out: &mut UnboundSlot) {
    for name in host.suggest_names_for_expr(arena, container) {
        if let Some(singular) = names::unpluralize(&name) {
            out.add_other_candidate(singular);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
