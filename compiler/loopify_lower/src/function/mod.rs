//! Callables: the behavior arguments of pipeline stages.
//!
//! A stage argument such as `x -> x * 2`, `String::length` or a predicate
//! variable is wrapped in a [`Callable`]. Binding it to concrete argument
//! texts happens exactly once: `transform` consumes the callable and yields a
//! [`BoundCallable`] holding the resulting expression and statement text.
//!
//! # Forms
//!
//! - **Lambda**: the body is printed with parameters substituted.
//! - **`MethodRef`**: rewritten into the equivalent call or constructor.
//! - **Inlined**: a fixed template such as `new java.util.ArrayList<>()`.
//! - **Complex**: anything else; the functional object is hoisted into a
//!   variable when needed and its single abstract method is called.

use loopify_ir::{
    is_side_effect_free, names, ExprArena, ExprId, ExprKind, JavaType, LambdaBody, MethodRefKind,
    Operand, Precedence, Printer, Receiver, Stmt,
};

use crate::context::ReplacementContext;
use crate::error::{LowerError, LowerResult};
use crate::host::Host;
use crate::slot::UnboundSlot;

/// An unbound stage behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callable {
    Lambda {
        expr: ExprId,
        /// Inline `return;` as `continue;` (the body is the rest of the loop).
        returns_as_continue: bool,
    },
    MethodRef {
        expr: ExprId,
    },
    Inlined {
        /// Text with `{0}`, `{1}` placeholders.
        template: String,
        arity: usize,
        result_type: JavaType,
        /// Precedence of the expanded template.
        prec: Precedence,
    },
    Complex {
        expr: ExprId,
        sam: &'static str,
        result_type: Option<JavaType>,
    },
}

/// A callable bound to argument texts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundCallable {
    operand: Operand,
    negated: Operand,
    statement: String,
}

impl BoundCallable {
    /// Result expression text.
    pub fn text(&self) -> &str {
        &self.operand.text
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Logical complement of the result, for predicates.
    pub fn negated(&self) -> &Operand {
        &self.negated
    }

    /// The call as a statement, newline-terminated.
    pub fn statement(&self) -> &str {
        &self.statement
    }
}

impl Callable {
    /// Wrap `expr` as a callable taking `arity` arguments.
    ///
    /// `None` when the expression cannot be a functional value of that arity.
    pub fn create(arena: &ExprArena, expr: ExprId, arity: usize) -> Option<Callable> {
        Self::create_impl(arena, expr, arity, false)
    }

    /// Like [`create`](Self::create) for a consumer whose body ends the loop
    /// iteration, so early `return;` may become `continue;`.
    pub fn create_terminal_consumer(arena: &ExprArena, expr: ExprId) -> Option<Callable> {
        Self::create_impl(arena, expr, 1, true)
    }

    fn create_impl(arena: &ExprArena, expr: ExprId, arity: usize, loop_tail: bool) -> Option<Callable> {
        match arena.kind(expr) {
            ExprKind::Lambda { params, body } => {
                if params.len() != arity {
                    return None;
                }
                let inline = match body {
                    LambdaBody::Expr(_) => true,
                    LambdaBody::Block(stmts) => {
                        body.single_expression().is_some()
                            || (body.is_void_block() && (loop_tail || !contains_return(stmts)))
                    }
                };
                if inline {
                    Some(Callable::Lambda {
                        expr,
                        returns_as_continue: loop_tail,
                    })
                } else {
                    Some(Self::complex(arena, expr))
                }
            }
            ExprKind::MethodRef { .. } => Some(Callable::MethodRef { expr }),
            ExprKind::Call {
                receiver: Receiver::Type(class),
                method,
                args,
            } if method == "identity"
                && args.is_empty()
                && arity == 1
                && matches!(simple(class), "Function" | "UnaryOperator") =>
            {
                Some(Callable::identity(arena.ty(expr).type_arg(0).cloned()))
            }
            _ => {
                let ty = arena.ty(expr);
                if ty.is_primitive() || ty.is_void() || matches!(ty, JavaType::Null) {
                    return None;
                }
                Some(Self::complex(arena, expr))
            }
        }
    }

    fn complex(arena: &ExprArena, expr: ExprId) -> Callable {
        let ty = arena.ty(expr);
        Callable::Complex {
            expr,
            sam: sam_name(ty),
            result_type: functional_result(ty),
        }
    }

    /// `x -> x`.
    pub fn identity(ty: Option<JavaType>) -> Callable {
        Callable::Inlined {
            template: "{0}".to_owned(),
            arity: 1,
            result_type: ty.unwrap_or_else(JavaType::object),
            prec: Precedence::Primary,
        }
    }

    /// `() -> new Default<>()` for a collection or map type.
    pub fn object_supplier(class: &str, result_type: JavaType) -> Callable {
        Callable::Inlined {
            template: format!("new {class}<>()"),
            arity: 0,
            result_type,
            prec: Precedence::Primary,
        }
    }

    /// A one-argument call template such as
    /// `java.util.Collections.unmodifiableList({0})`.
    pub fn template(template: impl Into<String>, result_type: JavaType) -> Callable {
        Self::template_with(template, result_type, Precedence::Primary)
    }

    /// A one-argument template whose expansion binds as loosely as `prec`.
    pub fn template_with(template: impl Into<String>, result_type: JavaType, prec: Precedence) -> Callable {
        Callable::Inlined {
            template: template.into(),
            arity: 1,
            result_type,
            prec,
        }
    }

    /// The lambda node, when this callable prints a lambda body inline.
    pub fn inlined_lambda(&self) -> Option<ExprId> {
        match self {
            Callable::Lambda { expr, .. } => Some(*expr),
            _ => None,
        }
    }

    /// Name of the `index`th lambda parameter.
    pub fn param_name<'a>(&self, arena: &'a ExprArena, index: usize) -> Option<&'a str> {
        let Callable::Lambda { expr, .. } = self else {
            return None;
        };
        match arena.kind(*expr) {
            ExprKind::Lambda { params, .. } => params.get(index).map(|p| p.name.as_str()),
            _ => None,
        }
    }

    /// Type of the value the callable produces.
    pub fn result_type(&self, arena: &ExprArena) -> Option<JavaType> {
        match self {
            Callable::Lambda { expr, .. } => match arena.kind(*expr) {
                ExprKind::Lambda { body, .. } => match body.single_expression() {
                    Some(result) => Some(arena.ty(result).clone()),
                    None => Some(JavaType::Void),
                },
                _ => None,
            },
            Callable::MethodRef { expr } => match arena.kind(*expr) {
                ExprKind::MethodRef { result, .. } => Some(result.clone()),
                _ => None,
            },
            Callable::Inlined { result_type, .. } => Some(result_type.clone()),
            Callable::Complex { result_type, .. } => result_type.clone(),
        }
    }

    /// Offer the `index`th parameter name to the slot bound to it.
    pub fn preprocess_variable(&self, arena: &ExprArena, slot: &mut UnboundSlot, index: usize) {
        if let Some(name) = self.param_name(arena, index) {
            slot.add_best_candidate(name);
        }
    }

    /// Offer names describing the result to the slot that will hold it.
    pub fn suggest_output_names(&self, arena: &ExprArena, host: &dyn Host, slot: &mut UnboundSlot) {
        match self {
            Callable::Lambda { expr, .. } => {
                let ExprKind::Lambda { params, body } = arena.kind(*expr) else {
                    return;
                };
                let Some(result) = body.single_expression() else {
                    return;
                };
                // `x -> x` says nothing new
                if matches!(arena.kind(result), ExprKind::Name(n) if params.iter().any(|p| &p.name == n)) {
                    return;
                }
                for name in host.suggest_names_for_expr(arena, result) {
                    slot.add_other_candidate(name);
                }
            }
            Callable::MethodRef { expr } => match arena.kind(*expr) {
                ExprKind::MethodRef {
                    kind: MethodRefKind::Constructor(ty) | MethodRefKind::ArrayConstructor(ty),
                    ..
                } => {
                    for name in host.suggest_names_for_type(ty) {
                        slot.add_other_candidate(name);
                    }
                }
                ExprKind::MethodRef { method, .. } => {
                    if let Some(name) = names::accessor_name(method) {
                        slot.add_other_candidate(name);
                    }
                }
                _ => {}
            },
            Callable::Inlined { .. } | Callable::Complex { .. } => {}
        }
    }

    /// Name for a variable holding the callable's result: `desired` when
    /// given, else the first suggestion for the result type, else `fallback`.
    pub fn suggest_final_name(
        &self,
        arena: &ExprArena,
        host: &dyn Host,
        desired: Option<&str>,
        fallback: &str,
    ) -> String {
        if let Some(desired) = desired {
            return desired.to_owned();
        }
        self.result_type(arena)
            .and_then(|ty| host.suggest_names_for_type(&ty).into_iter().next())
            .unwrap_or_else(|| fallback.to_owned())
    }

    /// Bind the parameters to `args`.
    pub fn transform(self, ctx: &mut ReplacementContext<'_>, args: &[Operand]) -> LowerResult<BoundCallable> {
        match self {
            Callable::Lambda {
                expr,
                returns_as_continue,
            } => transform_lambda(ctx, expr, returns_as_continue, args),
            Callable::MethodRef { expr } => transform_method_ref(ctx, expr, args),
            Callable::Inlined {
                template, arity, prec, ..
            } => {
                if args.len() != arity {
                    return Err(arity_mismatch(arity, args.len()));
                }
                let operand = if template == "{0}" {
                    args[0].clone()
                } else {
                    // placeholders sit in argument or operand positions that
                    // bind tighter than any binary operator
                    let mut text = template;
                    for (i, arg) in args.iter().enumerate() {
                        text = text.replace(&format!("{{{i}}}"), &arg.wrapped(Precedence::Postfix));
                    }
                    Operand::new(text, prec)
                };
                Ok(bound_expression(operand))
            }
            Callable::Complex { expr, sam, .. } => {
                let function = if matches!(ctx.arena().kind(expr), ExprKind::Name(_)) {
                    ctx.render(expr).wrapped(Precedence::Postfix)
                } else {
                    let ty = ctx.arena().ty(expr).clone();
                    let mut candidates = ctx.host().suggest_names_for_type(&ty);
                    candidates.push("fn".to_owned());
                    let init = ctx.render(expr).text;
                    ctx.declare(&candidates, &ty, &init)
                };
                let call = format!("{function}.{sam}({})", join(args));
                Ok(bound_expression(Operand::primary(call)))
            }
        }
    }
}

fn transform_lambda(
    ctx: &mut ReplacementContext<'_>,
    expr: ExprId,
    returns_as_continue: bool,
    args: &[Operand],
) -> LowerResult<BoundCallable> {
    let arena = ctx.arena();
    let ExprKind::Lambda { params, body } = arena.kind(expr) else {
        return Err(LowerError::internal("lambda callable over a non-lambda node"));
    };
    if params.len() != args.len() {
        return Err(arity_mismatch(params.len(), args.len()));
    }
    let mut subst = ctx.renames().clone();
    for (param, arg) in params.iter().zip(args) {
        subst.insert(param.name.clone(), arg.clone());
    }
    // inlined locals share the loop body with generated code and other lambdas
    for local in body.declared_locals() {
        let fresh = ctx.register_var_name(&[local]);
        if fresh != local {
            tracing::trace!(local, fresh = fresh.as_str(), "renamed inlined local");
        }
        subst.insert(local.to_owned(), Operand::primary(fresh));
    }
    let printer = Printer::new(arena);
    match (body.single_expression(), body) {
        (Some(result), _) => {
            let operand = printer.render(result, &subst);
            let negated = printer.negate(result, &subst);
            let statement = format!("{};\n", operand.text);
            Ok(BoundCallable {
                operand,
                negated,
                statement,
            })
        }
        (None, LambdaBody::Block(stmts)) => Ok(BoundCallable {
            operand: Operand::primary(""),
            negated: Operand::primary(""),
            statement: printer.render_block(stmts, &subst, returns_as_continue),
        }),
        (None, LambdaBody::Expr(_)) => Err(LowerError::internal("expression lambda without a result")),
    }
}

fn transform_method_ref(
    ctx: &mut ReplacementContext<'_>,
    expr: ExprId,
    args: &[Operand],
) -> LowerResult<BoundCallable> {
    let arena = ctx.arena();
    let ExprKind::MethodRef { kind, method, result } = arena.kind(expr) else {
        return Err(LowerError::internal("method-reference callable over another node"));
    };
    let text = match kind {
        MethodRefKind::Static(class) => format!("{class}.{method}({})", join(args)),
        MethodRefKind::Unbound(_) => {
            let Some((receiver, rest)) = args.split_first() else {
                return Err(arity_mismatch(1, 0));
            };
            format!("{}.{method}({})", receiver.wrapped(Precedence::Postfix), join(rest))
        }
        MethodRefKind::Bound(qualifier) => {
            let qualifier_text = if is_side_effect_free(arena, *qualifier) {
                ctx.render(*qualifier).wrapped(Precedence::Postfix)
            } else {
                // evaluated once, where the pipeline was built
                let ty = arena.ty(*qualifier).clone();
                let mut candidates = ctx.host().suggest_names_for_expr(arena, *qualifier);
                candidates.extend(ctx.host().suggest_names_for_type(&ty));
                let init = ctx.render(*qualifier).text;
                ctx.declare(&candidates, &ty, &init)
            };
            format!("{qualifier_text}.{method}({})", join(args))
        }
        MethodRefKind::Constructor(class) => {
            if class.type_args().is_empty() && !result.type_args().is_empty() {
                format!("new {class}<>({})", join(args))
            } else {
                format!("new {class}({})", join(args))
            }
        }
        MethodRefKind::ArrayConstructor(component) => match args {
            [length] => format!("new {component}[{}]", length.text),
            _ => return Err(arity_mismatch(1, args.len())),
        },
    };
    Ok(bound_expression(Operand::primary(text)))
}

fn bound_expression(operand: Operand) -> BoundCallable {
    BoundCallable {
        negated: operand.negated(),
        statement: format!("{};\n", operand.text),
        operand,
    }
}

fn join(args: &[Operand]) -> String {
    args.iter()
        .map(|arg| arg.text.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn arity_mismatch(expected: usize, actual: usize) -> LowerError {
    LowerError::internal(format!("callable expects {expected} arguments, got {actual}"))
}

fn simple(class: &str) -> &str {
    class.rsplit('.').next().unwrap_or(class)
}

fn contains_return(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Return(_) => true,
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => contains_return(then_branch) || contains_return(else_branch),
        Stmt::Expr(_) | Stmt::Local { .. } => false,
    })
}

/// Primitive result encoded in a `java.util.function` interface name.
fn primitive_result(simple: &str) -> Option<&'static str> {
    for prim in ["Int", "Long", "Double"] {
        if simple.contains(&format!("To{prim}")) {
            return Some(prim);
        }
    }
    if simple.ends_with("Operator") {
        for prim in ["Int", "Long", "Double"] {
            if simple.starts_with(prim) {
                return Some(prim);
            }
        }
    }
    None
}

/// Single abstract method of a functional interface type.
fn sam_name(ty: &JavaType) -> &'static str {
    let simple = ty.simple_name().unwrap_or_default();
    if simple.ends_with("Predicate") {
        return "test";
    }
    if simple.ends_with("Consumer") {
        return "accept";
    }
    match simple {
        "Comparator" => return "compare",
        "Supplier" => return "get",
        "IntSupplier" => return "getAsInt",
        "LongSupplier" => return "getAsLong",
        "DoubleSupplier" => return "getAsDouble",
        "BooleanSupplier" => return "getAsBoolean",
        _ => {}
    }
    match primitive_result(simple) {
        Some("Int") => "applyAsInt",
        Some("Long") => "applyAsLong",
        Some("Double") => "applyAsDouble",
        _ => "apply",
    }
}

/// Result type of a functional interface type, when it can be read off.
fn functional_result(ty: &JavaType) -> Option<JavaType> {
    let simple = ty.simple_name()?;
    if simple.ends_with("Predicate") || simple == "BooleanSupplier" {
        return Some(JavaType::BOOLEAN);
    }
    if simple.ends_with("Consumer") {
        return Some(JavaType::Void);
    }
    if simple == "Comparator" {
        return Some(JavaType::INT);
    }
    let primitive = match primitive_result(simple) {
        Some(prim) => Some(prim),
        None => match simple {
            "IntSupplier" => Some("Int"),
            "LongSupplier" => Some("Long"),
            "DoubleSupplier" => Some("Double"),
            _ => None,
        },
    };
    match primitive {
        Some("Int") => Some(JavaType::INT),
        Some("Long") => Some(JavaType::LONG),
        Some("Double") => Some(JavaType::DOUBLE),
        _ => {
            // Function<T, R>, Supplier<T>, UnaryOperator<T>: the last argument
            ty.type_args().last().map(JavaType::eliminate_wildcards)
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
