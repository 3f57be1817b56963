//! Terminal stages: the innermost loop code and the pipeline result.

use loopify_ir::{ExprArena, ExprId, JavaType, Operand, Precedence, PrimitiveType};

use crate::conditional::ConditionalExpression;
use crate::context::{ReplacementContext, ResultKind};
use crate::error::{LowerError, LowerResult};
use crate::function::Callable;
use crate::slot::{BoundSlot, UnboundSlot};

use super::collector::{
    correct_type_args, map_in_place, map_into_slot, CollectorOp, ContainerCollector, PreprocessSlot,
    TemplateCollector, ToCollection,
};

/// Which of `anyMatch`/`allMatch`/`noneMatch`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchKind {
    Any,
    All,
    None,
}

/// `toArray([generator])` over objects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToArray {
    pub element: JavaType,
    pub generator: Option<Callable>,
}

impl ToArray {
    /// Declare the backing list and set `list.toArray(..)` as the result.
    fn init_accumulator(self, ctx: &mut ReplacementContext<'_>) -> LowerResult<String> {
        let list_ty = JavaType::list_of(&self.element);
        let list = ctx.declare_result("list", &list_ty, None, "new java.util.ArrayList<>()", ResultKind::Unknown)?;
        let argument = match self.generator {
            Some(generator) => generator.transform(ctx, &[Operand::primary("0")])?.text().to_owned(),
            None => String::new(),
        };
        ctx.set_finisher(format!("{list}.toArray({argument})"))?;
        Ok(list)
    }
}

/// `min`/`max` and `minBy`/`maxBy`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinMax {
    ty: JavaType,
    comparator: Option<Callable>,
    max: bool,
}

impl MinMax {
    /// Natural order is only supported for `int`, `long` and `double`.
    pub fn new(ty: JavaType, comparator: Option<Callable>, max: bool) -> Option<Self> {
        let natural = matches!(
            ty.as_primitive(),
            Some(PrimitiveType::Int | PrimitiveType::Long | PrimitiveType::Double)
        );
        (comparator.is_some() || natural).then_some(MinMax { ty, comparator, max })
    }

    /// The value no element can beat, with its spelling.
    fn extreme(&self) -> Option<(i64, &'static str)> {
        match (self.ty.as_primitive()?, self.max) {
            (PrimitiveType::Int, true) => Some((i64::from(i32::MIN), "Integer.MIN_VALUE")),
            (PrimitiveType::Int, false) => Some((i64::from(i32::MAX), "Integer.MAX_VALUE")),
            (PrimitiveType::Long, true) => Some((i64::MIN, "Long.MIN_VALUE")),
            (PrimitiveType::Long, false) => Some((i64::MAX, "Long.MAX_VALUE")),
            _ => None,
        }
    }

    fn generate(self, item: &BoundSlot, ctx: &mut ReplacementContext<'_>) -> LowerResult<String> {
        if let Some((value, text)) = self.extreme() {
            if ctx.try_unwrap_or_else(value) {
                let best = ctx.declare_result("best", &self.ty, None, text, ResultKind::NonFinal)?;
                let better = self.better(item, &best, ctx)?;
                return Ok(format!("if ({better}) {{\n{best} = {item};\n}}\n"));
            }
        }
        let seen = ctx.declare(&["seen"], &JavaType::BOOLEAN, "false");
        let best = ctx.declare_result("best", &self.ty, None, self.ty.default_value(), ResultKind::Unknown)?;
        ctx.set_conditional_finisher(ConditionalExpression::Optional {
            ty: self.ty.clone(),
            condition: seen.clone(),
            present: best.clone(),
        })?;
        let better = self.better(item, &best, ctx)?;
        Ok(format!(
            "if (!{seen} || {better}) {{\n{seen} = true;\n{best} = {item};\n}}\n"
        ))
    }

    /// Condition under which `item` replaces `best`.
    fn better(self, item: &BoundSlot, best: &str, ctx: &mut ReplacementContext<'_>) -> LowerResult<String> {
        let sign = if self.max { ">" } else { "<" };
        if let Some(comparator) = self.comparator {
            let compared = comparator.transform(ctx, &[item.operand(), Operand::primary(best)])?;
            return Ok(format!("{} {sign} 0", compared.operand().wrapped(Precedence::Shift)));
        }
        match self.ty.as_primitive() {
            Some(PrimitiveType::Int | PrimitiveType::Long) => Ok(format!("{item} {sign} {best}")),
            Some(PrimitiveType::Double) => Ok(format!("Double.compare({item}, {best}) {sign} 0")),
            _ => Err(LowerError::internal(format!("no natural order for {}", self.ty))),
        }
    }
}

/// Accumulating terminals that `sorted()` can be folded into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortOrigin {
    List(ToCollection),
    Array(ToArray),
}

/// The last stage of a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalOp {
    /// `reduce(identity, f)`
    Reduce {
        identity: ExprId,
        reducer: Callable,
        ty: JavaType,
    },
    /// `reduce(f)`, with `ty` the optional's element type.
    ReduceToOptional { reducer: Callable, ty: JavaType },
    /// `collect(supplier, accumulator, combiner)`
    ExplicitCollect { supplier: Callable, accumulator: Callable },
    /// `average()` (optional result) or `averagingX` (plain `double`).
    Average { double_sum: bool, optional: bool },
    ToPrimitiveArray { component: JavaType },
    ToArray(ToArray),
    /// `findFirst`/`findAny`, with `ty` the optional's element type.
    Find { ty: JavaType },
    Match { predicate: Callable, kind: MatchKind },
    MinMax(MinMax),
    ForEach { action: Callable },
    Collector(CollectorOp),
    /// A template whose finisher is not the accumulator (`joining`).
    Template(TemplateCollector),
    /// A container collector whose result is passed through `wrapper`.
    Wrapped {
        delegate: ContainerCollector,
        wrapper: Callable,
    },
    PartitionBy {
        predicate: Callable,
        result_ty: JavaType,
        downstream: CollectorOp,
    },
    Mapping {
        mapper: Callable,
        downstream: Box<TerminalOp>,
    },
    InlineMapping {
        mapper: Callable,
        downstream: Box<TerminalOp>,
    },
    /// `sorted([cmp])` fused into a list or array collecting terminal.
    Sorted {
        origin: SortOrigin,
        comparator: Option<ExprId>,
    },
}

impl TerminalOp {
    pub fn template(template: TemplateCollector) -> Self {
        if template.is_collector() {
            TerminalOp::Collector(CollectorOp::Template(template))
        } else {
            TerminalOp::Template(template)
        }
    }

    pub fn container(container: ContainerCollector) -> Self {
        TerminalOp::Collector(CollectorOp::Container(container))
    }

    /// `mapping(f, downstream)`; stays a collector when `downstream` is one.
    pub fn mapping(mapper: Callable, downstream: TerminalOp) -> Self {
        match downstream {
            TerminalOp::Collector(collector) => TerminalOp::Collector(CollectorOp::Mapping {
                mapper,
                downstream: Box::new(collector),
            }),
            other => TerminalOp::Mapping {
                mapper,
                downstream: Box::new(other),
            },
        }
    }

    /// Like [`mapping`](Self::mapping), using the mapped expression in place.
    pub fn inline_mapping(mapper: Callable, downstream: TerminalOp) -> Self {
        match downstream {
            TerminalOp::Collector(collector) => TerminalOp::Collector(CollectorOp::InlineMapping {
                mapper,
                downstream: Box::new(collector),
            }),
            other => TerminalOp::InlineMapping {
                mapper,
                downstream: Box::new(other),
            },
        }
    }

    /// The collector view, for use as a downstream.
    pub fn into_collector(self) -> Option<CollectorOp> {
        match self {
            TerminalOp::Collector(collector) => Some(collector),
            _ => None,
        }
    }

    /// The container view, for wrapping.
    pub fn into_container(self) -> Option<ContainerCollector> {
        match self {
            TerminalOp::Collector(CollectorOp::Container(container)) => Some(container),
            _ => None,
        }
    }

    /// The accumulating form `sorted()` can fold into, or `self` back.
    pub fn into_sort_origin(self) -> Result<SortOrigin, TerminalOp> {
        match self {
            TerminalOp::Collector(CollectorOp::Container(ContainerCollector::ToCollection(c))) if c.is_list() => {
                Ok(SortOrigin::List(c))
            }
            TerminalOp::ToArray(to_array) => Ok(SortOrigin::Array(to_array)),
            other => Err(other),
        }
    }

    pub fn preprocess(&self, arena: &ExprArena, slot: &mut UnboundSlot) {
        match self {
            TerminalOp::ExplicitCollect { accumulator, .. } => accumulator.preprocess_variable(arena, slot, 1),
            TerminalOp::Match { predicate: callable, .. }
            | TerminalOp::ForEach { action: callable }
            | TerminalOp::Mapping { mapper: callable, .. }
            | TerminalOp::InlineMapping { mapper: callable, .. } => callable.preprocess_variable(arena, slot, 0),
            TerminalOp::Collector(collector) => collector.preprocess(arena, slot),
            TerminalOp::Wrapped { delegate, .. } => delegate.preprocess(arena, slot),
            TerminalOp::PartitionBy {
                predicate, downstream, ..
            } => {
                predicate.preprocess_variable(arena, slot, 0);
                downstream.preprocess(arena, slot);
            }
            TerminalOp::Reduce { .. }
            | TerminalOp::ReduceToOptional { .. }
            | TerminalOp::Average { .. }
            | TerminalOp::ToPrimitiveArray { .. }
            | TerminalOp::ToArray(_)
            | TerminalOp::Find { .. }
            | TerminalOp::MinMax(_)
            | TerminalOp::Template(_)
            | TerminalOp::Sorted { .. } => {}
        }
    }

    /// Declare the result and return the per-element code.
    pub fn generate(self, item: &BoundSlot, ctx: &mut ReplacementContext<'_>) -> LowerResult<String> {
        match self {
            TerminalOp::Reduce {
                identity,
                reducer,
                ty,
            } => {
                let identity = ctx.render(identity).text;
                let acc = ctx.declare_result("acc", &ty, None, &identity, ResultKind::NonFinal)?;
                let reduced = reducer.transform(ctx, &[Operand::primary(acc.clone()), item.operand()])?;
                Ok(format!("{acc} = {};\n", reduced.text()))
            }
            TerminalOp::ReduceToOptional { reducer, ty } => {
                let seen = ctx.declare(&["seen"], &JavaType::BOOLEAN, "false");
                let acc = ctx.declare_result("acc", &ty, None, ty.default_value(), ResultKind::Unknown)?;
                let reduced = reducer.transform(ctx, &[Operand::primary(acc.clone()), item.operand()])?;
                ctx.set_conditional_finisher(ConditionalExpression::Optional {
                    ty,
                    condition: seen.clone(),
                    present: acc.clone(),
                })?;
                let first = format!("if (!{seen}) {{\n{seen} = true;\n{acc} = {item};\n}}");
                if reduced.text() == acc {
                    Ok(format!("{first}\n"))
                } else {
                    Ok(format!("{first} else {{\n{acc} = {};\n}}\n", reduced.text()))
                }
            }
            TerminalOp::ExplicitCollect {
                supplier,
                accumulator,
            } => {
                let arena = ctx.arena();
                let desired = supplier.suggest_final_name(arena, ctx.host(), accumulator.param_name(arena, 0), "acc");
                let ty = supplier
                    .result_type(arena)
                    .ok_or_else(|| LowerError::not_applicable("collect supplier without a result type"))?;
                let init = supplier.transform(ctx, &[])?.text().to_owned();
                let acc = ctx.declare_result(&desired, &ty, None, &init, ResultKind::Final)?;
                let statement = accumulator.transform(ctx, &[Operand::primary(acc), item.operand()])?;
                Ok(statement.statement().to_owned())
            }
            TerminalOp::Average { double_sum, optional } => {
                let sum_ty = if double_sum {
                    JavaType::DOUBLE
                } else {
                    JavaType::LONG
                };
                let sum = ctx.declare_result("sum", &sum_ty, None, "0", ResultKind::Unknown)?;
                let count = ctx.declare(&["count"], &JavaType::LONG, "0");
                let condition = format!("{count} > 0");
                let average = if double_sum {
                    format!("{sum} / {count}")
                } else {
                    format!("(double) {sum} / {count}")
                };
                let result = if optional {
                    ConditionalExpression::Optional {
                        ty: JavaType::DOUBLE,
                        condition,
                        present: average,
                    }
                } else {
                    ConditionalExpression::Plain {
                        ty: JavaType::DOUBLE,
                        condition,
                        true_text: average,
                        false_text: "0.0".to_owned(),
                    }
                };
                ctx.set_conditional_finisher(result)?;
                Ok(format!("{sum} += {item};\n{count}++;\n"))
            }
            TerminalOp::ToPrimitiveArray { component } => {
                let arr = ctx.declare_result(
                    "arr",
                    &JavaType::array(component.clone()),
                    None,
                    &format!("new {component}[10]"),
                    ResultKind::NonFinal,
                )?;
                let count = ctx.declare(&["count"], &JavaType::INT, "0");
                ctx.add_after_step(format!("{arr} = java.util.Arrays.copyOfRange({arr}, 0, {count});\n"));
                Ok(format!(
                    "if ({arr}.length == {count}) {{\n{arr} = java.util.Arrays.copyOf({arr}, {count} * 2);\n}}\n{arr}[{count}++] = {item};\n"
                ))
            }
            TerminalOp::ToArray(to_array) => {
                let list = to_array.init_accumulator(ctx)?;
                Ok(format!("{list}.add({item});\n"))
            }
            TerminalOp::Find { ty } => ctx.assign_and_break(ConditionalExpression::Optional {
                ty,
                condition: "found".to_owned(),
                present: item.name().to_owned(),
            }),
            TerminalOp::Match { predicate, kind } => {
                let predicate = predicate.transform(ctx, &[item.operand()])?;
                let (condition, default) = match kind {
                    MatchKind::Any => (predicate.text().to_owned(), false),
                    MatchKind::All => (predicate.negated().text.clone(), true),
                    MatchKind::None => (predicate.text().to_owned(), true),
                };
                let exit = ctx.assign_and_break(ConditionalExpression::Boolean {
                    condition: "b".to_owned(),
                    invert: default,
                })?;
                Ok(format!("if ({condition}) {{\n{exit}}}\n"))
            }
            TerminalOp::MinMax(min_max) => min_max.generate(item, ctx),
            TerminalOp::ForEach { action } => Ok(action.transform(ctx, &[item.operand()])?.statement().to_owned()),
            TerminalOp::Collector(collector) => collector.generate(item, ctx),
            TerminalOp::Template(template) => template.generate(item, ctx),
            TerminalOp::Wrapped { delegate, wrapper } => {
                let (acc, bound) = delegate.init_accumulator(item, ctx, false)?;
                let wrapped = wrapper.transform(ctx, &[Operand::primary(acc.clone())])?;
                ctx.set_finisher(wrapped.text())?;
                Ok(bound.updater(&acc))
            }
            TerminalOp::PartitionBy {
                predicate,
                result_ty,
                downstream,
            } => {
                let map = ctx.declare_result(
                    "map",
                    &correct_type_args(&result_ty, 2, Some(&downstream)),
                    Some("java.util.Map"),
                    "new java.util.HashMap<>()",
                    ResultKind::Final,
                )?;
                let key = predicate.transform(ctx, &[item.operand()])?.text().to_owned();
                let bound = downstream.bind(ctx, item)?;
                ctx.add_before_step(format!("{map}.put(false, {});\n", bound.supplier()));
                ctx.add_before_step(format!("{map}.put(true, {});\n", bound.supplier()));
                match bound.merger(&map, &key) {
                    Some(merger) => Ok(merger),
                    None => Ok(bound.updater(&format!("{map}.get({key})"))),
                }
            }
            TerminalOp::Mapping { mapper, downstream } => {
                let (slot, declaration) = map_into_slot(mapper, downstream.as_ref(), item, ctx)?;
                Ok(format!("{declaration}{}", downstream.generate(&slot, ctx)?))
            }
            TerminalOp::InlineMapping { mapper, downstream } => {
                let slot = map_in_place(mapper, item, ctx)?;
                downstream.generate(&slot, ctx)
            }
            TerminalOp::Sorted { origin, comparator } => {
                let (acc, update) = match origin {
                    SortOrigin::List(collection) => {
                        let (acc, bound) =
                            ContainerCollector::ToCollection(collection).init_accumulator(item, ctx, true)?;
                        let update = bound.updater(&acc);
                        (acc, update)
                    }
                    SortOrigin::Array(to_array) => {
                        let list = to_array.init_accumulator(ctx)?;
                        let update = format!("{list}.add({item});\n");
                        (list, update)
                    }
                };
                let comparator = match comparator {
                    Some(comparator) => ctx.render(comparator).text,
                    None => "null".to_owned(),
                };
                ctx.add_after_step(format!("{acc}.sort({comparator});\n"));
                Ok(update)
            }
        }
    }
}

impl PreprocessSlot for TerminalOp {
    fn preprocess_slot(&self, arena: &ExprArena, slot: &mut UnboundSlot) {
        self.preprocess(arena, slot);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
