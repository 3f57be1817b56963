//! Pipeline extraction: from a terminal call to operation records.
//!
//! The extractor walks the receiver chain backward from the terminal call,
//! resolving every call to a stage. Slots are allocated on the way: a stage
//! that changes the element variable gets a fresh input slot, any other
//! stage shares its output slot as input.
//!
//! # Fusion
//!
//! Each new (earlier) stage is offered to the stage appended just before it
//! through [`Operation::combine_with_next`]. The record list is reversed at
//! the end so it reads source first.
//!
//! # Nested pipelines
//!
//! `flatMap` arguments are lowered recursively into the same slot table; the
//! nested chain ends in the `flatMap`'s output slot and has no terminal.

use rustc_hash::FxHashSet;

use loopify_ir::{render, ExprArena, ExprId, ExprKind, JavaType, MethodRefKind, Precedence, PrimitiveType, Receiver};

use crate::error::{LowerError, LowerResult};
use crate::function::Callable;
use crate::operation::{
    CollectorOp, Combined, ContainerCollector, FlatMap, GroupBy, IntermediateOp, MatchKind, MinMax, Operation,
    OperationRecord, SourceOp, TemplateCollector, TerminalOp, ToArray, ToCollection, ToMap,
};
use crate::options::LowerOptions;
use crate::slot::{SlotId, SlotTable};

/// An extracted pipeline, source first.
#[derive(Clone, Debug)]
pub struct Pipeline {
    records: Vec<OperationRecord>,
    slots: SlotTable,
    root: ExprId,
    consumed_lambdas: FxHashSet<ExprId>,
    text: String,
}

impl Pipeline {
    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// The terminal call the pipeline was extracted from.
    pub fn root(&self) -> ExprId {
        self.root
    }

    /// Lambdas whose parameters are substituted away when lowered.
    pub fn consumed_lambdas(&self) -> &FxHashSet<ExprId> {
        &self.consumed_lambdas
    }

    /// The pipeline as source text, for diagnostics.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn into_parts(self) -> (Vec<OperationRecord>, SlotTable) {
        (self.records, self.slots)
    }
}

/// Extract the pipeline ending in the terminal call `terminal`.
///
/// Method references passed to `flatMap` are rewritten into lambdas, so the
/// arena gains a few synthetic nodes.
#[tracing::instrument(level = "debug", skip_all, fields(terminal = ?terminal))]
pub fn extract(arena: &mut ExprArena, terminal: ExprId, options: &LowerOptions) -> LowerResult<Pipeline> {
    let mut extractor = Extractor {
        options,
        slots: SlotTable::new(),
        consumed_lambdas: FxHashSet::default(),
    };
    let result = extractor.chain(arena, terminal, ChainEnd::Terminal);
    let records = match result {
        Ok(records) => records,
        Err(err) => {
            tracing::trace!(%err, "pipeline rejected");
            return Err(err);
        }
    };
    tracing::debug!(stages = records.len(), slots = extractor.slots.len(), "pipeline extracted");
    Ok(Pipeline {
        records,
        slots: extractor.slots,
        root: terminal,
        consumed_lambdas: extractor.consumed_lambdas,
        text: render(arena, terminal),
    })
}

/// How the chain being extracted ends.
#[derive(Copy, Clone, Debug)]
enum ChainEnd {
    /// The last call is a terminal stage.
    Terminal,
    /// A nested chain whose last stage writes the given slot.
    Into(SlotId),
}

struct Extractor<'o> {
    options: &'o LowerOptions,
    slots: SlotTable,
    consumed_lambdas: FxHashSet<ExprId>,
}

/// Parts of a call expression.
struct Stage<'e> {
    receiver: Option<ExprId>,
    class: Option<&'e str>,
    method: &'e str,
    args: &'e [ExprId],
}

impl Extractor<'_> {
    fn chain(&mut self, arena: &mut ExprArena, last: ExprId, end: ChainEnd) -> LowerResult<Vec<OperationRecord>> {
        let mut reversed: Vec<OperationRecord> = Vec::new();
        let mut current = last;
        let mut out_var = match end {
            ChainEnd::Terminal => SlotId::STUB,
            ChainEnd::Into(slot) => slot,
        };
        let mut first = true;
        loop {
            let expects_terminal = first && matches!(end, ChainEnd::Terminal);
            if !expects_terminal {
                if let Some(source) = self.source(arena, current)? {
                    tracing::debug!(stage = "source", "extracted stage");
                    self.append(&mut reversed, Operation::Source(source), SlotId::STUB, out_var);
                    break;
                }
            }
            let call = stage_of(arena, current)
                .and_then(|stage| Some((stage.receiver?, stage.method.to_owned(), stage.args.to_vec())));
            let Some((receiver, method, args)) = call else {
                if expects_terminal {
                    return Err(LowerError::not_applicable("expression is not a terminal stage call"));
                }
                let source = self.opaque(arena, current)?;
                self.append(&mut reversed, Operation::Source(source), SlotId::STUB, out_var);
                break;
            };
            let element = element_type(arena, receiver)?;
            let op = if expects_terminal {
                Operation::Terminal(self.terminal(arena, current, &method, &args, &element)?)
            } else {
                match self.intermediate(arena, &method, &args, &element, out_var)? {
                    Some(op) => Operation::Intermediate(op),
                    None if self.options.allow_opaque_sources => {
                        let source = self.opaque(arena, current)?;
                        self.append(&mut reversed, Operation::Source(source), SlotId::STUB, out_var);
                        break;
                    }
                    None => return Err(LowerError::not_applicable(format!("unsupported stage `{method}`"))),
                }
            };
            tracing::debug!(stage = %method, kind = op.name(), "extracted stage");
            let in_var = if op.changes_variable() {
                self.slots.alloc(element)
            } else {
                out_var
            };
            self.append(&mut reversed, op, in_var, out_var);
            out_var = in_var;
            current = receiver;
            first = false;
        }
        reversed.reverse();
        Ok(reversed)
    }

    /// Push `op`, fusing it with the stage that follows it when possible.
    fn append(&self, reversed: &mut Vec<OperationRecord>, op: Operation, in_var: SlotId, out_var: SlotId) {
        let Some(next) = reversed.pop() else {
            reversed.push(OperationRecord { op, in_var, out_var });
            return;
        };
        match op.combine_with_next(next.op) {
            Combined::Fused(fused) => {
                tracing::debug!(kind = fused.name(), "fused adjacent stages");
                reversed.push(OperationRecord {
                    op: fused,
                    in_var,
                    out_var: next.out_var,
                });
            }
            Combined::Separate(op, next_op) => {
                reversed.push(OperationRecord {
                    op: next_op,
                    in_var: next.in_var,
                    out_var: next.out_var,
                });
                reversed.push(OperationRecord { op, in_var, out_var });
            }
        }
    }

    fn callable(&mut self, arena: &ExprArena, expr: ExprId, arity: usize) -> LowerResult<Callable> {
        let callable = Callable::create(arena, expr, arity)
            .ok_or_else(|| LowerError::not_applicable(format!("argument is not a function of arity {arity}")))?;
        if let Some(lambda) = callable.inlined_lambda() {
            self.consumed_lambdas.insert(lambda);
        }
        Ok(callable)
    }

    // Sources

    fn source(&mut self, arena: &ExprArena, expr: ExprId) -> LowerResult<Option<SourceOp>> {
        let Some(stage) = stage_of(arena, expr) else {
            return Ok(None);
        };
        let element = || {
            arena
                .ty(expr)
                .stream_element()
                .ok_or_else(|| LowerError::not_applicable("source without a stream type"))
        };
        let source = match (stage.class, stage.method, stage.args) {
            (None, "stream", []) => match stage.receiver {
                Some(collection) if arena.ty(collection).is_collection_like() => SourceOp::ForEach { iterable: collection },
                _ => return Ok(None),
            },
            (Some("Arrays"), "stream", [array]) => SourceOp::ForEach { iterable: *array },
            (Some("Arrays"), "stream", [array, from, to]) => SourceOp::ArraySlice {
                array: *array,
                from: *from,
                to: *to,
            },
            (Some(class), "of", [single]) if is_stream_class(class) && is_element_array(arena, *single, expr) => {
                SourceOp::ForEach { iterable: *single }
            }
            (Some(class), "of", elements) if is_stream_class(class) => SourceOp::Explicit {
                elements: elements.to_vec(),
                element: element()?,
            },
            (Some(class), "empty", []) if is_stream_class(class) => SourceOp::Explicit {
                elements: Vec::new(),
                element: element()?,
            },
            (Some(class), "generate", [supplier]) if is_stream_class(class) => SourceOp::Generate {
                supplier: self.callable(arena, *supplier, 0)?,
                limit: None,
            },
            (Some(class), "iterate", [seed, next]) if is_stream_class(class) => SourceOp::Iterate {
                seed: *seed,
                has_next: None,
                next: self.callable(arena, *next, 1)?,
            },
            (Some(class), "iterate", [seed, has_next, next]) if is_stream_class(class) => SourceOp::Iterate {
                seed: *seed,
                has_next: Some(self.callable(arena, *has_next, 1)?),
                next: self.callable(arena, *next, 1)?,
            },
            (Some(class @ ("IntStream" | "LongStream")), method @ ("range" | "rangeClosed"), [from, to]) => {
                SourceOp::Range {
                    from: *from,
                    to: *to,
                    inclusive: method == "rangeClosed",
                    element: if class == "IntStream" {
                        JavaType::INT
                    } else {
                        JavaType::LONG
                    },
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(source))
    }

    fn opaque(&self, arena: &ExprArena, expr: ExprId) -> LowerResult<SourceOp> {
        if !self.options.allow_opaque_sources {
            return Err(LowerError::not_applicable("pipeline does not start at a known source"));
        }
        let element = arena
            .ty(expr)
            .stream_element()
            .ok_or_else(|| LowerError::not_applicable("chain does not start at a stream"))?;
        tracing::debug!(stage = "iterator", "extracted opaque source");
        Ok(SourceOp::OpaqueIterator { stream: expr, element })
    }

    // Intermediates

    /// `None` for a name that is not an intermediate stage.
    fn intermediate(
        &mut self,
        arena: &mut ExprArena,
        method: &str,
        args: &[ExprId],
        element: &JavaType,
        out_var: SlotId,
    ) -> LowerResult<Option<IntermediateOp>> {
        let op = match (method, args) {
            ("filter", [predicate]) => IntermediateOp::Filter {
                predicate: self.callable(arena, *predicate, 1)?,
            },
            ("nonNull", []) => IntermediateOp::Filter {
                predicate: Callable::template_with("{0} != null", JavaType::BOOLEAN, Precedence::Equality),
            },
            ("map" | "mapToObj" | "mapToInt" | "mapToLong" | "mapToDouble", [mapper]) => IntermediateOp::Map {
                mapper: self.callable(arena, *mapper, 1)?,
            },
            ("flatMap" | "flatMapToInt" | "flatMapToLong" | "flatMapToDouble" | "flatMapToObj", [mapper]) => {
                IntermediateOp::FlatMap(self.flat_map(arena, *mapper, element, out_var)?)
            }
            ("sorted", []) => IntermediateOp::Sorted { comparator: None },
            ("sorted", [comparator]) => IntermediateOp::Sorted {
                comparator: Some(*comparator),
            },
            ("distinct", []) => IntermediateOp::Distinct,
            ("skip", [count]) => IntermediateOp::Skip { count: *count },
            ("limit", [count]) => IntermediateOp::Limit { count: *count },
            ("peek", [action]) => IntermediateOp::Peek {
                action: self.callable(arena, *action, 1)?,
            },
            ("boxed" | "asLongStream" | "asDoubleStream", []) => IntermediateOp::Widening,
            ("takeWhile", [predicate]) => IntermediateOp::TakeWhile {
                predicate: self.callable(arena, *predicate, 1)?,
            },
            ("dropWhile", [predicate]) => IntermediateOp::DropWhile {
                predicate: self.callable(arena, *predicate, 1)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    /// Light transform of a `flatMap` argument into a nested pipeline.
    fn flat_map(&mut self, arena: &mut ExprArena, mapper: ExprId, element: &JavaType, out_var: SlotId) -> LowerResult<FlatMap> {
        let (param, body) = match arena.kind(mapper) {
            ExprKind::Lambda { params, body } => match (params.as_slice(), body.single_expression()) {
                ([param], Some(body)) => (param.name.clone(), body),
                _ => return Err(LowerError::not_applicable("flatMap lambda is not a single expression")),
            },
            ExprKind::MethodRef { kind, method, result } => {
                let (kind, method, result) = (kind.clone(), method.clone(), result.clone());
                let param = "e".to_owned();
                let arg = arena.name(param.clone(), element.clone());
                let body = match (&kind, method.as_str()) {
                    (MethodRefKind::Unbound(_), "stream") if element.is_collection_like() => {
                        arena.method(arg, "stream", Vec::new(), result)
                    }
                    (MethodRefKind::Static(class), "stream") if simple(class) == "Arrays" => {
                        arena.static_call("java.util.Arrays", "stream", vec![arg], result)
                    }
                    _ => return Err(LowerError::not_applicable("unsupported flatMap method reference")),
                };
                (param, body)
            }
            _ => return Err(LowerError::not_applicable("flatMap argument is not a lambda")),
        };
        self.consumed_lambdas.insert(mapper);
        let (guard, body) = match arena.kind(body) {
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } if is_empty_stream(arena, *then_expr) => (Some((*cond, true)), *else_expr),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } if is_empty_stream(arena, *else_expr) => (Some((*cond, false)), *then_expr),
            _ => (None, body),
        };
        let records = self.chain(arena, body, ChainEnd::Into(out_var))?;
        Ok(FlatMap {
            param: Some(param),
            records,
            guard,
        })
    }

    // Terminals

    fn terminal(
        &mut self,
        arena: &mut ExprArena,
        call: ExprId,
        method: &str,
        args: &[ExprId],
        element: &JavaType,
    ) -> LowerResult<TerminalOp> {
        let result = arena.ty(call).clone();
        let op = match (method, args) {
            ("count", []) => TerminalOp::template(TemplateCollector::counting()),
            ("sum", []) => TerminalOp::template(TemplateCollector::summing(element.clone())),
            ("average", []) => TerminalOp::Average {
                double_sum: *element == JavaType::DOUBLE,
                optional: true,
            },
            ("summaryStatistics", []) => TerminalOp::template(TemplateCollector::summarizing(result)),
            ("reduce", [reducer]) => TerminalOp::ReduceToOptional {
                reducer: self.callable(arena, *reducer, 2)?,
                ty: element.clone(),
            },
            ("reduce", [identity, reducer] | [identity, reducer, _]) => TerminalOp::Reduce {
                identity: *identity,
                reducer: self.callable(arena, *reducer, 2)?,
                ty: result,
            },
            ("collect", [collector]) => self.collector(arena, *collector, element, result)?,
            ("collect", [supplier, accumulator, _]) => TerminalOp::ExplicitCollect {
                supplier: self.callable(arena, *supplier, 0)?,
                accumulator: self.callable(arena, *accumulator, 2)?,
            },
            ("findFirst" | "findAny", []) => TerminalOp::Find { ty: element.clone() },
            ("anyMatch", [predicate]) => self.matching(arena, *predicate, MatchKind::Any)?,
            ("allMatch", [predicate]) => self.matching(arena, *predicate, MatchKind::All)?,
            ("noneMatch", [predicate]) => self.matching(arena, *predicate, MatchKind::None)?,
            ("toArray", []) if element.is_primitive() => TerminalOp::ToPrimitiveArray {
                component: element.clone(),
            },
            ("toArray", []) => TerminalOp::ToArray(ToArray {
                element: element.clone(),
                generator: None,
            }),
            ("toArray", [generator]) => TerminalOp::ToArray(ToArray {
                element: element.clone(),
                generator: Some(self.callable(arena, *generator, 1)?),
            }),
            ("min" | "max", []) => min_max(element, None, method == "max")?,
            ("min" | "max", [comparator]) => {
                let comparator = self.callable(arena, *comparator, 2)?;
                min_max(element, Some(comparator), method == "max")?
            }
            ("toList" | "toImmutableList", []) => unmodifiable(
                ToCollection::to_list(JavaType::list_of(element)),
                "java.util.Collections.unmodifiableList({0})",
                result,
            ),
            ("toSet" | "toImmutableSet", []) => unmodifiable(
                ToCollection::to_set(JavaType::set_of(element)),
                "java.util.Collections.unmodifiableSet({0})",
                result,
            ),
            ("forEach" | "forEachOrdered", [action]) => {
                let action = Callable::create_terminal_consumer(arena, *action)
                    .ok_or_else(|| LowerError::not_applicable("forEach argument is not a consumer"))?;
                if let Some(lambda) = action.inlined_lambda() {
                    self.consumed_lambdas.insert(lambda);
                }
                TerminalOp::ForEach { action }
            }
            _ => return Err(LowerError::not_applicable(format!("unsupported terminal `{method}`"))),
        };
        Ok(op)
    }

    fn matching(&mut self, arena: &ExprArena, predicate: ExprId, kind: MatchKind) -> LowerResult<TerminalOp> {
        Ok(TerminalOp::Match {
            predicate: self.callable(arena, predicate, 1)?,
            kind,
        })
    }

    /// Terminal for a `Collectors.x(..)` argument of `collect`.
    ///
    /// `result` is the type the collector produces.
    fn collector(
        &mut self,
        arena: &mut ExprArena,
        expr: ExprId,
        element: &JavaType,
        result: JavaType,
    ) -> LowerResult<TerminalOp> {
        let Some(stage) = stage_of(arena, expr) else {
            return Err(LowerError::not_applicable("collector is not a factory call"));
        };
        if stage.class != Some("Collectors") {
            return Err(LowerError::not_applicable("collector is not from Collectors"));
        }
        let method = stage.method.to_owned();
        let args = stage.args.to_vec();
        let op = match (method.as_str(), args.as_slice()) {
            ("toList", []) => TerminalOp::container(ContainerCollector::ToCollection(ToCollection::to_list(result))),
            ("toSet", []) => TerminalOp::container(ContainerCollector::ToCollection(ToCollection::to_set(result))),
            ("toUnmodifiableList", []) => unmodifiable(
                ToCollection::to_list(JavaType::list_of(element)),
                "java.util.Collections.unmodifiableList({0})",
                result,
            ),
            ("toUnmodifiableSet", []) => unmodifiable(
                ToCollection::to_set(JavaType::set_of(element)),
                "java.util.Collections.unmodifiableSet({0})",
                result,
            ),
            ("toCollection", [supplier]) => {
                let supplier = self.callable(arena, *supplier, 0)?;
                TerminalOp::container(ContainerCollector::ToCollection(ToCollection::with_supplier(
                    result, supplier,
                )))
            }
            ("toMap", [key, value, rest @ ..]) if rest.len() <= 2 => {
                let supplier = match rest.get(1) {
                    Some(supplier) => self.callable(arena, *supplier, 0)?,
                    None => Callable::object_supplier("java.util.HashMap", result.clone()),
                };
                TerminalOp::container(ContainerCollector::ToMap(ToMap {
                    key: self.callable(arena, *key, 1)?,
                    value: self.callable(arena, *value, 1)?,
                    merger: rest.first().copied(),
                    supplier,
                    result_ty: result,
                }))
            }
            ("toUnmodifiableMap", [key, value, rest @ ..]) if rest.len() <= 1 => {
                let delegate = ContainerCollector::ToMap(ToMap {
                    key: self.callable(arena, *key, 1)?,
                    value: self.callable(arena, *value, 1)?,
                    merger: rest.first().copied(),
                    supplier: Callable::object_supplier("java.util.HashMap", result.clone()),
                    result_ty: result.clone(),
                });
                TerminalOp::Wrapped {
                    delegate,
                    wrapper: Callable::template("java.util.Collections.unmodifiableMap({0})", result),
                }
            }
            ("collectingAndThen", [downstream, finisher]) => {
                let downstream_result = collector_result(arena, *downstream)?;
                let delegate = self
                    .collector(arena, *downstream, element, downstream_result)?
                    .into_container()
                    .ok_or_else(|| LowerError::not_applicable("collectingAndThen over a non-container collector"))?;
                TerminalOp::Wrapped {
                    delegate,
                    wrapper: self.callable(arena, *finisher, 1)?,
                }
            }
            ("groupingBy", [key, rest @ ..]) if rest.len() <= 2 => {
                let key = self.callable(arena, *key, 1)?;
                let (supplier, downstream) = match rest {
                    [] => (None, None),
                    [downstream] => (None, Some(*downstream)),
                    [supplier, downstream, ..] => (Some(*supplier), Some(*downstream)),
                };
                let supplier = match supplier {
                    Some(supplier) => self.callable(arena, supplier, 0)?,
                    None => Callable::object_supplier("java.util.HashMap", result.clone()),
                };
                let downstream = self.downstream(arena, downstream, element)?;
                TerminalOp::container(ContainerCollector::GroupBy(Box::new(GroupBy {
                    result_ty: result,
                    key,
                    supplier,
                    downstream,
                })))
            }
            ("partitioningBy", [predicate, rest @ ..]) if rest.len() <= 1 => {
                let predicate = self.callable(arena, *predicate, 1)?;
                let downstream = self.downstream(arena, rest.first().copied(), element)?;
                TerminalOp::PartitionBy {
                    predicate,
                    result_ty: result,
                    downstream,
                }
            }
            ("mapping", [mapper, downstream]) => {
                let mapper = self.callable(arena, *mapper, 1)?;
                let mapped = mapper
                    .result_type(arena)
                    .ok_or_else(|| LowerError::not_applicable("mapping function without a result type"))?;
                let downstream_result = collector_result(arena, *downstream)?;
                let downstream = self.collector(arena, *downstream, &mapped, downstream_result)?;
                TerminalOp::mapping(mapper, downstream)
            }
            ("reducing", [reducer]) => TerminalOp::ReduceToOptional {
                reducer: self.callable(arena, *reducer, 2)?,
                ty: element.clone(),
            },
            ("reducing", [identity, reducer]) => TerminalOp::Reduce {
                identity: *identity,
                reducer: self.callable(arena, *reducer, 2)?,
                ty: result,
            },
            ("reducing", [identity, mapper, reducer]) => {
                let mapper = self.callable(arena, *mapper, 1)?;
                let reduce = TerminalOp::Reduce {
                    identity: *identity,
                    reducer: self.callable(arena, *reducer, 2)?,
                    ty: result,
                };
                TerminalOp::mapping(mapper, reduce)
            }
            ("counting", []) => TerminalOp::template(TemplateCollector::counting()),
            ("joining", []) => TerminalOp::template(TemplateCollector::joining(&[])),
            ("joining", [_] | [_, _, _]) => {
                let rendered: Vec<String> = args.iter().map(|arg| render(arena, *arg)).collect();
                TerminalOp::template(TemplateCollector::joining(&rendered))
            }
            ("summingInt" | "summingLong" | "summingDouble", [mapper]) => {
                let ty = numeric_suffix(&method, "summing")?;
                TerminalOp::inline_mapping(
                    self.callable(arena, *mapper, 1)?,
                    TerminalOp::template(TemplateCollector::summing(ty)),
                )
            }
            ("summarizingInt" | "summarizingLong" | "summarizingDouble", [mapper]) => {
                let statistics = match numeric_suffix(&method, "summarizing")?.as_primitive() {
                    Some(PrimitiveType::Int) => "java.util.IntSummaryStatistics",
                    Some(PrimitiveType::Long) => "java.util.LongSummaryStatistics",
                    _ => "java.util.DoubleSummaryStatistics",
                };
                TerminalOp::inline_mapping(
                    self.callable(arena, *mapper, 1)?,
                    TerminalOp::template(TemplateCollector::summarizing(JavaType::class(statistics))),
                )
            }
            ("averagingInt" | "averagingLong" | "averagingDouble", [mapper]) => {
                let ty = numeric_suffix(&method, "averaging")?;
                TerminalOp::inline_mapping(
                    self.callable(arena, *mapper, 1)?,
                    TerminalOp::Average {
                        double_sum: ty == JavaType::DOUBLE,
                        optional: false,
                    },
                )
            }
            ("minBy" | "maxBy", [comparator]) => {
                let comparator = self.callable(arena, *comparator, 2)?;
                min_max(element, Some(comparator), method == "maxBy")?
            }
            _ => return Err(LowerError::not_applicable(format!("unsupported collector `{method}`"))),
        };
        tracing::debug!(collector = %method, "extracted collector");
        Ok(op)
    }

    /// Downstream collector of `groupingBy`/`partitioningBy`; `toList()`
    /// when absent.
    fn downstream(
        &mut self,
        arena: &mut ExprArena,
        downstream: Option<ExprId>,
        element: &JavaType,
    ) -> LowerResult<CollectorOp> {
        let Some(downstream) = downstream else {
            return Ok(CollectorOp::Container(ContainerCollector::ToCollection(
                ToCollection::to_list(JavaType::list_of(element)),
            )));
        };
        let result = collector_result(arena, downstream)?;
        self.collector(arena, downstream, element, result)?
            .into_collector()
            .ok_or_else(|| LowerError::not_applicable("downstream is not a collector"))
    }
}

fn stage_of(arena: &ExprArena, expr: ExprId) -> Option<Stage<'_>> {
    let (receiver, method, args) = arena.as_call(expr)?;
    let (receiver, class) = match receiver {
        Receiver::None => (None, None),
        Receiver::Expr(id) => (Some(*id), None),
        Receiver::Type(_) => (None, receiver.type_name()),
    };
    Some(Stage {
        receiver,
        class,
        method,
        args,
    })
}

fn element_type(arena: &ExprArena, stream: ExprId) -> LowerResult<JavaType> {
    arena
        .ty(stream)
        .stream_element()
        .ok_or_else(|| LowerError::not_applicable("stage receiver is not a stream"))
}

/// Produced type `R` of a `Collector<T, A, R>`-typed expression.
fn collector_result(arena: &ExprArena, collector: ExprId) -> LowerResult<JavaType> {
    arena
        .ty(collector)
        .type_arg(2)
        .map(JavaType::eliminate_outer_wildcard)
        .ok_or_else(|| LowerError::not_applicable("collector type without a result argument"))
}

fn min_max(element: &JavaType, comparator: Option<Callable>, max: bool) -> LowerResult<TerminalOp> {
    MinMax::new(element.clone(), comparator, max)
        .map(TerminalOp::MinMax)
        .ok_or_else(|| LowerError::not_applicable(format!("no natural order for {element}")))
}

fn unmodifiable(collection: ToCollection, wrapper: &str, result: JavaType) -> TerminalOp {
    TerminalOp::Wrapped {
        delegate: ContainerCollector::ToCollection(collection),
        wrapper: Callable::template(wrapper, result),
    }
}

/// `int` for `summingInt` and so on.
fn numeric_suffix(method: &str, prefix: &str) -> LowerResult<JavaType> {
    match method.strip_prefix(prefix) {
        Some("Int") => Ok(JavaType::INT),
        Some("Long") => Ok(JavaType::LONG),
        Some("Double") => Ok(JavaType::DOUBLE),
        _ => Err(LowerError::internal(format!("`{method}` has no numeric suffix"))),
    }
}

/// Whether `array` holds exactly the elements of the stream `stream`.
fn is_element_array(arena: &ExprArena, array: ExprId, stream: ExprId) -> bool {
    let element = arena.ty(stream).stream_element();
    arena
        .ty(array)
        .array_component()
        .is_some_and(|component| Some(component) == element.as_ref())
}

fn is_stream_class(class: &str) -> bool {
    matches!(class, "Stream" | "IntStream" | "LongStream" | "DoubleStream")
}

/// `Stream.empty()` and its primitive variants.
fn is_empty_stream(arena: &ExprArena, expr: ExprId) -> bool {
    matches!(
        stage_of(arena, expr),
        Some(Stage {
            class: Some(class),
            method: "empty",
            args: [],
            ..
        }) if is_stream_class(class)
    )
}

fn simple(class: &str) -> &str {
    class.rsplit('.').next().unwrap_or(class)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
