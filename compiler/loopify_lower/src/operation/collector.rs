//! Collector-shaped terminals.
//!
//! A collector is an accumulator with a supplier expression and a
//! per-element update. Besides running as the terminal itself, a collector
//! can serve as the downstream of `groupingBy`/`partitioningBy`, where its
//! accumulator is a map value instead of a local variable.
//!
//! # Binding
//!
//! `bind` transforms every callable of the collector against the element
//! slot and yields a [`BoundCollector`] that only renders text. Supplier,
//! updater and merger are then pure functions of the accumulator expression.

use loopify_ir::{ExprArena, ExprId, ExprKind, JavaType, Operand, Precedence};

use crate::context::{ReplacementContext, ResultKind};
use crate::error::{LowerError, LowerResult};
use crate::function::Callable;
use crate::slot::{BoundSlot, UnboundSlot};

/// An accumulator described by text templates.
///
/// `update` may contain `{acc}` and `{item}`; `finisher` may contain
/// `{acc}` and is the accumulator itself when absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateCollector {
    acc_name: &'static str,
    acc_ty: JavaType,
    init: String,
    update: &'static str,
    finisher: Option<&'static str>,
}

const COUNT_UPDATE: &str = "{acc}++;\n";

const MAP: &str = "java.util.Map";

impl TemplateCollector {
    pub fn counting() -> Self {
        TemplateCollector {
            acc_name: "count",
            acc_ty: JavaType::LONG,
            init: "0L".to_owned(),
            update: COUNT_UPDATE,
            finisher: None,
        }
    }

    pub fn summing(ty: JavaType) -> Self {
        TemplateCollector {
            acc_name: "sum",
            init: ty.default_value().to_owned(),
            acc_ty: ty,
            update: "{acc} += {item};\n",
            finisher: None,
        }
    }

    /// `IntSummaryStatistics` and friends.
    pub fn summarizing(ty: JavaType) -> Self {
        TemplateCollector {
            acc_name: "stat",
            init: format!("new {ty}()"),
            acc_ty: ty,
            update: "{acc}.accept({item});\n",
            finisher: None,
        }
    }

    /// `joining()` with rendered arguments (none, a delimiter, or delimiter,
    /// prefix and suffix).
    pub fn joining(args: &[String]) -> Self {
        if args.is_empty() {
            TemplateCollector {
                acc_name: "sb",
                acc_ty: JavaType::class("StringBuilder"),
                init: "new StringBuilder()".to_owned(),
                update: "{acc}.append({item});\n",
                finisher: Some("{acc}.toString()"),
            }
        } else {
            TemplateCollector {
                acc_name: "joiner",
                acc_ty: JavaType::class("java.util.StringJoiner"),
                init: format!("new java.util.StringJoiner({})", args.join(", ")),
                update: "{acc}.add({item});\n",
                finisher: Some("{acc}.toString()"),
            }
        }
    }

    /// Whether the accumulator is the result, which makes this usable as a
    /// downstream collector.
    pub fn is_collector(&self) -> bool {
        self.finisher.is_none()
    }

    /// Declare the accumulator and return the per-element update.
    pub fn generate(self, item: &BoundSlot, ctx: &mut ReplacementContext<'_>) -> LowerResult<String> {
        let kind = match self.finisher {
            None if self.acc_ty.is_primitive() => ResultKind::NonFinal,
            None => ResultKind::Final,
            Some(_) => ResultKind::Unknown,
        };
        let acc = ctx.declare_result(self.acc_name, &self.acc_ty, None, &self.init, kind)?;
        if let Some(finisher) = self.finisher {
            ctx.set_finisher(finisher.replace("{acc}", &acc))?;
        }
        Ok(render_update(self.update, &acc, &item.operand()))
    }

    fn bind(self, item: &BoundSlot) -> BoundCollector {
        BoundCollector::Template {
            init: self.init,
            update: self.update,
            acc_ty: self.acc_ty,
            item: item.operand(),
            item_ty: item.ty().clone(),
        }
    }
}

fn render_update(update: &str, acc: &str, item: &Operand) -> String {
    update.replace("{acc}", acc).replace("{item}", &item.text)
}

/// `toList()`, `toSet()`, `toCollection(supplier)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToCollection {
    result_ty: JavaType,
    supplier: Callable,
    desired: Option<&'static str>,
}

impl ToCollection {
    pub fn to_list(result_ty: JavaType) -> Self {
        ToCollection {
            supplier: Callable::object_supplier("java.util.ArrayList", result_ty.clone()),
            result_ty,
            desired: Some("list"),
        }
    }

    pub fn to_set(result_ty: JavaType) -> Self {
        ToCollection {
            supplier: Callable::object_supplier("java.util.HashSet", result_ty.clone()),
            result_ty,
            desired: Some("set"),
        }
    }

    pub fn with_supplier(result_ty: JavaType, supplier: Callable) -> Self {
        ToCollection {
            result_ty,
            supplier,
            desired: None,
        }
    }

    /// Whether the collected container is a list (and can be sorted in place).
    pub fn is_list(&self) -> bool {
        matches!(
            self.result_ty.raw_name(),
            Some("java.util.List" | "java.util.ArrayList" | "java.util.LinkedList")
        )
    }
}

/// `toMap(key, value[, merger[, supplier]])`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToMap {
    pub result_ty: JavaType,
    pub key: Callable,
    pub value: Callable,
    pub merger: Option<ExprId>,
    pub supplier: Callable,
}

/// `groupingBy(key[, supplier][, downstream])`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupBy {
    pub result_ty: JavaType,
    pub key: Callable,
    pub supplier: Callable,
    pub downstream: CollectorOp,
}

/// Collectors whose accumulator is a container built by a supplier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerCollector {
    ToCollection(ToCollection),
    ToMap(ToMap),
    GroupBy(Box<GroupBy>),
}

impl ContainerCollector {
    pub fn preprocess(&self, arena: &ExprArena, slot: &mut UnboundSlot) {
        match self {
            ContainerCollector::ToCollection(_) => {}
            ContainerCollector::ToMap(to_map) => {
                to_map.key.preprocess_variable(arena, slot, 0);
                to_map.value.preprocess_variable(arena, slot, 0);
            }
            ContainerCollector::GroupBy(group_by) => {
                group_by.key.preprocess_variable(arena, slot, 0);
                group_by.downstream.preprocess(arena, slot);
            }
        }
    }

    /// Declare the container and bind the update against `item`.
    ///
    /// With `can_be_final` unset the container is only an intermediate
    /// value (the caller wraps it) and never takes over the site's variable.
    pub fn init_accumulator(
        self,
        item: &BoundSlot,
        ctx: &mut ReplacementContext<'_>,
        can_be_final: bool,
    ) -> LowerResult<(String, BoundCollector)> {
        let (desired, result_ty, most_abstract) = match &self {
            ContainerCollector::ToCollection(c) => (
                c.supplier
                    .suggest_final_name(ctx.arena(), ctx.host(), c.desired, "collection"),
                self.correct_return_type(&c.result_ty),
                "java.util.Collection",
            ),
            ContainerCollector::ToMap(m) => ("map".to_owned(), self.correct_return_type(&m.result_ty), MAP),
            ContainerCollector::GroupBy(g) => ("map".to_owned(), self.correct_return_type(&g.result_ty), MAP),
        };
        let bound = self.bind(ctx, item)?;
        let kind = if can_be_final {
            ResultKind::Final
        } else {
            ResultKind::Unknown
        };
        let acc = ctx.declare_result(&desired, &result_ty, Some(most_abstract), bound.supplier(), kind)?;
        Ok((acc, bound))
    }

    /// Declarable form of a container type this collector produces.
    pub fn correct_return_type(&self, ty: &JavaType) -> JavaType {
        match self {
            ContainerCollector::ToCollection(_) => correct_type_args(ty, 1, None),
            ContainerCollector::ToMap(_) => correct_type_args(ty, 2, None),
            ContainerCollector::GroupBy(g) => correct_type_args(ty, 2, Some(&g.downstream)),
        }
    }

    fn bind(self, ctx: &mut ReplacementContext<'_>, item: &BoundSlot) -> LowerResult<BoundCollector> {
        match self {
            ContainerCollector::ToCollection(c) => Ok(BoundCollector::ToCollection {
                supplier: c.supplier.transform(ctx, &[])?.text().to_owned(),
                item: item.name().to_owned(),
            }),
            ContainerCollector::ToMap(m) => {
                let supplier = m.supplier.transform(ctx, &[])?.text().to_owned();
                let key = m.key.transform(ctx, &[item.operand()])?.text().to_owned();
                let value = m.value.transform(ctx, &[item.operand()])?.text().to_owned();
                let merge = match m.merger {
                    None => MergeMode::Unique,
                    Some(merger) => merge_mode(ctx, merger),
                };
                Ok(BoundCollector::ToMap {
                    supplier,
                    key,
                    value,
                    merge,
                })
            }
            ContainerCollector::GroupBy(g) => {
                let GroupBy {
                    key,
                    supplier,
                    downstream,
                    ..
                } = *g;
                let supplier = supplier.transform(ctx, &[])?.text().to_owned();
                let key = key.transform(ctx, &[item.operand()])?.text().to_owned();
                let downstream = downstream.bind(ctx, item)?;
                let key_var = ctx.register_var_name(&["k", "key"]);
                Ok(BoundCollector::GroupBy {
                    supplier,
                    key,
                    key_var,
                    downstream: Box::new(downstream),
                })
            }
        }
    }
}

/// `ty` with outer wildcards of its `arity` type arguments replaced by their
/// bounds, so it can declare an accumulator. The value argument of a map is
/// further corrected by the downstream collector that fills it.
pub(super) fn correct_type_args(ty: &JavaType, arity: usize, value: Option<&CollectorOp>) -> JavaType {
    let JavaType::Class { name, args } = ty else {
        return ty.clone();
    };
    if args.len() != arity {
        return ty.clone();
    }
    let args = args
        .iter()
        .enumerate()
        .map(|(index, arg)| {
            let arg = arg.eliminate_outer_wildcard();
            match value {
                Some(downstream) if index == 1 => downstream.correct_return_type(&arg),
                _ => arg,
            }
        })
        .collect();
    JavaType::generic(name.clone(), args)
}

/// How `toMap` resolves duplicate keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeMode {
    /// No merger: duplicates are an error.
    Unique,
    /// `(a, b) -> a`
    KeepFirst,
    /// `(a, b) -> b`
    KeepLast,
    /// Any other merge function, rendered.
    With(String),
}

fn merge_mode(ctx: &ReplacementContext<'_>, merger: ExprId) -> MergeMode {
    let arena = ctx.arena();
    if let ExprKind::Lambda { params, body } = arena.kind(merger) {
        if let ([first, second], Some(result)) = (params.as_slice(), body.single_expression()) {
            if let ExprKind::Name(name) = arena.kind(result) {
                if *name == first.name {
                    return MergeMode::KeepFirst;
                }
                if *name == second.name {
                    return MergeMode::KeepLast;
                }
            }
        }
    }
    MergeMode::With(ctx.render(merger).text)
}

/// A collector usable as a terminal or as a downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectorOp {
    Container(ContainerCollector),
    Template(TemplateCollector),
    /// `mapping(f, downstream)`: the mapped value gets its own variable.
    Mapping {
        mapper: Callable,
        downstream: Box<CollectorOp>,
    },
    /// `summingInt(f)` and friends: the mapped expression is used in place.
    InlineMapping {
        mapper: Callable,
        downstream: Box<CollectorOp>,
    },
}

impl CollectorOp {
    pub fn preprocess(&self, arena: &ExprArena, slot: &mut UnboundSlot) {
        match self {
            CollectorOp::Container(container) => container.preprocess(arena, slot),
            CollectorOp::Template(_) => {}
            CollectorOp::Mapping { mapper, .. } | CollectorOp::InlineMapping { mapper, .. } => {
                mapper.preprocess_variable(arena, slot, 0);
            }
        }
    }

    /// Declarable form of the type this collector produces, as found in a
    /// map value or the pipeline result.
    pub fn correct_return_type(&self, ty: &JavaType) -> JavaType {
        match self {
            CollectorOp::Container(container) => container.correct_return_type(ty),
            CollectorOp::Template(_) => ty.clone(),
            CollectorOp::Mapping { downstream, .. } | CollectorOp::InlineMapping { downstream, .. } => {
                downstream.correct_return_type(ty)
            }
        }
    }

    /// Run as the pipeline's terminal.
    pub fn generate(self, item: &BoundSlot, ctx: &mut ReplacementContext<'_>) -> LowerResult<String> {
        match self {
            CollectorOp::Container(container) => {
                let (acc, bound) = container.init_accumulator(item, ctx, true)?;
                Ok(bound.updater(&acc))
            }
            CollectorOp::Template(template) => template.generate(item, ctx),
            CollectorOp::Mapping { mapper, downstream } => {
                let (slot, declaration) = map_into_slot(mapper, downstream.as_ref(), item, ctx)?;
                Ok(format!("{declaration}{}", downstream.generate(&slot, ctx)?))
            }
            CollectorOp::InlineMapping { mapper, downstream } => {
                let slot = map_in_place(mapper, item, ctx)?;
                downstream.generate(&slot, ctx)
            }
        }
    }

    /// Bind as a downstream collector.
    pub fn bind(self, ctx: &mut ReplacementContext<'_>, item: &BoundSlot) -> LowerResult<BoundCollector> {
        match self {
            CollectorOp::Container(container) => container.bind(ctx, item),
            CollectorOp::Template(template) => Ok(template.bind(item)),
            CollectorOp::Mapping { mapper, downstream } => {
                let (slot, declaration) = map_into_slot(mapper, downstream.as_ref(), item, ctx)?;
                Ok(BoundCollector::Mapping {
                    declaration,
                    downstream: Box::new(downstream.bind(ctx, &slot)?),
                })
            }
            CollectorOp::InlineMapping { mapper, downstream } => {
                let slot = map_in_place(mapper, item, ctx)?;
                downstream.bind(ctx, &slot)
            }
        }
    }
}

/// Transform `mapper` on `item` and declare its result in a fresh slot.
pub(super) fn map_into_slot<P: PreprocessSlot>(
    mapper: Callable,
    downstream: &P,
    item: &BoundSlot,
    ctx: &mut ReplacementContext<'_>,
) -> LowerResult<(BoundSlot, String)> {
    let ty = mapper_result(&mapper, ctx.arena())?;
    let mut slot = UnboundSlot::new(ty);
    downstream.preprocess_slot(ctx.arena(), &mut slot);
    mapper.suggest_output_names(ctx.arena(), ctx.host(), &mut slot);
    let mapped = mapper.transform(ctx, &[item.operand()])?;
    let slot = slot.register(ctx);
    let declaration = slot.declare_with(mapped.text());
    Ok((slot, declaration))
}

/// Transform `mapper` on `item` and stand its result in for the element.
pub(super) fn map_in_place(mapper: Callable, item: &BoundSlot, ctx: &mut ReplacementContext<'_>) -> LowerResult<BoundSlot> {
    let ty = mapper_result(&mapper, ctx.arena())?;
    let mapped = mapper.transform(ctx, &[item.operand()])?;
    Ok(BoundSlot::synthetic(ty, mapped.operand().clone()))
}

fn mapper_result(mapper: &Callable, arena: &ExprArena) -> LowerResult<JavaType> {
    mapper
        .result_type(arena)
        .filter(|ty| !ty.is_void())
        .ok_or_else(|| LowerError::not_applicable("mapping function without a result type"))
}

/// Anything that can name the slot it consumes.
pub(super) trait PreprocessSlot {
    fn preprocess_slot(&self, arena: &ExprArena, slot: &mut UnboundSlot);
}

impl PreprocessSlot for CollectorOp {
    fn preprocess_slot(&self, arena: &ExprArena, slot: &mut UnboundSlot) {
        self.preprocess(arena, slot);
    }
}

/// A collector with all callables bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoundCollector {
    Template {
        init: String,
        update: &'static str,
        acc_ty: JavaType,
        item: Operand,
        item_ty: JavaType,
    },
    ToCollection {
        supplier: String,
        item: String,
    },
    ToMap {
        supplier: String,
        key: String,
        value: String,
        merge: MergeMode,
    },
    GroupBy {
        supplier: String,
        key: String,
        key_var: String,
        downstream: Box<BoundCollector>,
    },
    Mapping {
        /// `T mapped = f(item);`
        declaration: String,
        downstream: Box<BoundCollector>,
    },
}

impl BoundCollector {
    /// Expression creating an empty accumulator.
    pub fn supplier(&self) -> &str {
        match self {
            BoundCollector::Template { init, .. } => init,
            BoundCollector::ToCollection { supplier, .. }
            | BoundCollector::ToMap { supplier, .. }
            | BoundCollector::GroupBy { supplier, .. } => supplier,
            BoundCollector::Mapping { downstream, .. } => downstream.supplier(),
        }
    }

    /// Statements adding the element to the accumulator `acc`.
    pub fn updater(&self, acc: &str) -> String {
        match self {
            BoundCollector::Template { update, item, .. } => render_update(update, acc, item),
            BoundCollector::ToCollection { item, .. } => format!("{acc}.add({item});\n"),
            BoundCollector::ToMap { key, value, merge, .. } => match merge {
                MergeMode::Unique => format!(
                    "if ({acc}.put({key}, {value}) != null) {{\nthrow new IllegalStateException(\"Duplicate key\");\n}}\n"
                ),
                MergeMode::KeepFirst => format!("{acc}.putIfAbsent({key}, {value});\n"),
                MergeMode::KeepLast => format!("{acc}.put({key}, {value});\n"),
                MergeMode::With(merger) => format!("{acc}.merge({key}, {value}, {merger});\n"),
            },
            BoundCollector::GroupBy {
                key,
                key_var,
                downstream,
                ..
            } => {
                if let Some(merger) = downstream.merger(acc, key) {
                    return merger;
                }
                let value = format!("{acc}.computeIfAbsent({key}, {key_var} -> {})", downstream.supplier());
                downstream.updater(&value)
            }
            BoundCollector::Mapping {
                declaration,
                downstream,
            } => format!("{declaration}{}", downstream.updater(acc)),
        }
    }

    /// A single `map.merge(key, ..)` doing the whole update, for primitive
    /// accumulators that cannot be updated through a map lookup.
    pub fn merger(&self, map: &str, key: &str) -> Option<String> {
        match self {
            BoundCollector::Template {
                update,
                acc_ty,
                item,
                item_ty,
                ..
            } => {
                if !acc_ty.is_primitive() {
                    return None;
                }
                let value = if *update == COUNT_UPDATE {
                    "1L".to_owned()
                } else if item_ty == acc_ty {
                    item.text.clone()
                } else {
                    format!("({acc_ty}) {}", item.wrapped(Precedence::Unary))
                };
                Some(format!("{map}.merge({key}, {value}, {}::sum);\n", acc_ty.boxed()))
            }
            BoundCollector::Mapping {
                declaration,
                downstream,
            } => downstream
                .merger(map, key)
                .map(|merger| format!("{declaration}{merger}")),
            BoundCollector::ToCollection { .. } | BoundCollector::ToMap { .. } | BoundCollector::GroupBy { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
