//! Precedence-aware expression printer.
//!
//! Renders captured expressions back to Java source text. Two services are
//! layered on top of plain rendering:
//!
//! - **Substitution**: free references to a name are replaced by an
//!   [`Operand`] (text plus precedence). Lambda parameters shadow outer
//!   entries, so only free occurrences are rewritten.
//! - **Negation**: the logical complement of a boolean expression, computed
//!   structurally (`a < b` becomes `a >= b` for integral operands, `!x`
//!   becomes `x`, De Morgan for `&&` and `||`) before falling back to `!(..)`.
//!
//! # Design
//!
//! Parenthesization is decided from the child's precedence at the point it
//! is embedded, so substituted text never changes the meaning of the
//! surrounding expression.

use rustc_hash::FxHashMap;

use crate::ast::{BinaryOp, ExprKind, LambdaBody, Literal, MethodRefKind, Precedence, Receiver, Stmt, UnaryOp};
use crate::{ExprArena, ExprId};

/// Rendered expression text with the precedence of its outermost operator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Operand {
    pub text: String,
    pub prec: Precedence,
}

impl Operand {
    pub fn new(text: impl Into<String>, prec: Precedence) -> Self {
        Operand {
            text: text.into(),
            prec,
        }
    }

    /// A name, literal or call: never needs parentheses.
    pub fn primary(text: impl Into<String>) -> Self {
        Self::new(text, Precedence::Primary)
    }

    /// Text suitable for a position that requires at least `min` precedence.
    pub fn wrapped(&self, min: Precedence) -> String {
        if self.prec < min {
            format!("({})", self.text)
        } else {
            self.text.clone()
        }
    }

    /// Textual negation for operands whose structure is unknown.
    #[must_use]
    pub fn negated(&self) -> Operand {
        match self.text.as_str() {
            "true" => Operand::primary("false"),
            "false" => Operand::primary("true"),
            _ => Operand::new(format!("!{}", self.wrapped(Precedence::Unary)), Precedence::Unary),
        }
    }
}

/// Free-name replacements applied while printing.
pub type Substitution = FxHashMap<String, Operand>;

/// Renders expressions of one arena.
#[derive(Copy, Clone)]
pub struct Printer<'a> {
    arena: &'a ExprArena,
}

impl<'a> Printer<'a> {
    pub fn new(arena: &'a ExprArena) -> Self {
        Printer { arena }
    }

    /// Render `id`, replacing free names found in `subst`.
    pub fn render(&self, id: ExprId, subst: &Substitution) -> Operand {
        let expr = self.arena.get(id);
        let prec = expr.precedence();
        let text = match &expr.kind {
            ExprKind::Name(name) => {
                if let Some(replacement) = subst.get(name) {
                    return replacement.clone();
                }
                name.clone()
            }
            ExprKind::Literal(literal) => return render_literal(literal),
            ExprKind::Field { receiver, name } => {
                format!("{}{name}", self.qualifier(receiver, subst))
            }
            ExprKind::Call {
                receiver,
                method,
                args,
            } => format!(
                "{}{method}({})",
                self.qualifier(receiver, subst),
                self.arguments(args, subst)
            ),
            ExprKind::New { class, args } => format!("new {class}({})", self.arguments(args, subst)),
            ExprKind::NewArray { component, init } => {
                format!("new {component}[]{{{}}}", self.arguments(init, subst))
            }
            ExprKind::Lambda { params, body } => {
                let inner = shadowed(subst, params.iter().map(|p| p.name.as_str()));
                let head = match params.as_slice() {
                    [single] => single.name.clone(),
                    _ => format!(
                        "({})",
                        params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                };
                match body {
                    LambdaBody::Expr(body) => {
                        format!("{head} -> {}", self.child(*body, &inner, Precedence::Lambda))
                    }
                    LambdaBody::Block(stmts) => {
                        format!("{head} -> {{\n{}}}", self.render_block(stmts, &inner, false))
                    }
                }
            }
            ExprKind::MethodRef { kind, method, .. } => match kind {
                MethodRefKind::Static(class) | MethodRefKind::Unbound(class) => {
                    format!("{class}::{method}")
                }
                MethodRefKind::Bound(qualifier) => {
                    format!("{}::{method}", self.child(*qualifier, subst, Precedence::Postfix))
                }
                MethodRefKind::Constructor(class) => format!("{class}::new"),
                MethodRefKind::ArrayConstructor(component) => format!("{component}[]::new"),
            },
            ExprKind::Unary { op, operand } => {
                if op.is_postfix() {
                    format!("{}{}", self.child(*operand, subst, Precedence::Postfix), op.symbol())
                } else {
                    let inner = self.child(*operand, subst, Precedence::Unary);
                    // `- -x` must not collapse into `--x`
                    let clash = matches!(op, UnaryOp::Neg | UnaryOp::Plus | UnaryOp::PreInc | UnaryOp::PreDec)
                        && (inner.starts_with('-') || inner.starts_with('+'));
                    if clash {
                        format!("{}({inner})", op.symbol())
                    } else {
                        format!("{}{inner}", op.symbol())
                    }
                }
            }
            ExprKind::Binary { op, left, right } => format!(
                "{} {} {}",
                self.child(*left, subst, op.precedence()),
                op.symbol(),
                self.child(*right, subst, op.precedence().tighter())
            ),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => format!(
                "{} ? {} : {}",
                self.child(*cond, subst, Precedence::Or),
                self.child(*then_expr, subst, Precedence::Conditional),
                self.child(*else_expr, subst, Precedence::Conditional)
            ),
            ExprKind::Cast { ty, operand } => {
                format!("({ty}) {}", self.child(*operand, subst, Precedence::Unary))
            }
            ExprKind::Index { array, index } => format!(
                "{}[{}]",
                self.child(*array, subst, Precedence::Postfix),
                self.render(*index, subst).text
            ),
            ExprKind::Assign { op, target, value } => format!(
                "{} {}= {}",
                self.child(*target, subst, Precedence::Postfix),
                op.map_or("", BinaryOp::symbol),
                self.child(*value, subst, Precedence::Assignment)
            ),
        };
        Operand::new(text, prec)
    }

    /// Logical complement of a boolean expression.
    pub fn negate(&self, id: ExprId, subst: &Substitution) -> Operand {
        match &self.arena.kind(id) {
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.render(*operand, subst),
            ExprKind::Literal(Literal::Bool(value)) => Operand::primary((!value).to_string()),
            ExprKind::Binary { op, left, right } => {
                let exact = match op {
                    BinaryOp::Eq | BinaryOp::Ne => true,
                    // NaN makes `!(a < b)` differ from `a >= b` for floating operands
                    BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                        self.arena.ty(*left).is_integral() && self.arena.ty(*right).is_integral()
                    }
                    _ => false,
                };
                if let (true, Some(complement)) = (exact, op.complement()) {
                    let prec = complement.precedence();
                    return Operand::new(
                        format!(
                            "{} {} {}",
                            self.child(*left, subst, prec),
                            complement.symbol(),
                            self.child(*right, subst, prec.tighter())
                        ),
                        prec,
                    );
                }
                let dual = match op {
                    BinaryOp::And => Some(BinaryOp::Or),
                    BinaryOp::Or => Some(BinaryOp::And),
                    _ => None,
                };
                match dual {
                    Some(dual) => {
                        let prec = dual.precedence();
                        Operand::new(
                            format!(
                                "{} {} {}",
                                self.negate(*left, subst).wrapped(prec),
                                dual.symbol(),
                                self.negate(*right, subst).wrapped(prec.tighter())
                            ),
                            prec,
                        )
                    }
                    None => self.render(id, subst).negated(),
                }
            }
            _ => self.render(id, subst).negated(),
        }
    }

    /// Render block statements, one per line.
    ///
    /// With `returns_as_continue`, top-level `return;` becomes `continue;`
    /// (the block is being inlined as a loop body).
    /// Locals found in `subst` are declared under the substituted name.
    pub fn render_block(&self, stmts: &[Stmt], subst: &Substitution, returns_as_continue: bool) -> String {
        let mut out = String::new();
        for stmt in stmts {
            match stmt {
                Stmt::Expr(id) => {
                    out.push_str(&self.render(*id, subst).text);
                    out.push_str(";\n");
                }
                Stmt::Local { ty, name, init } => {
                    // a renamed local is declared under its new name
                    let name = subst.get(name).map_or(name.as_str(), |renamed| renamed.text.as_str());
                    match init {
                        Some(init) => {
                            out.push_str(&format!("{ty} {name} = {};\n", self.render(*init, subst).text));
                        }
                        None => out.push_str(&format!("{ty} {name};\n")),
                    }
                }
                Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                } => {
                    out.push_str(&format!(
                        "if ({}) {{\n{}}}",
                        self.render(*cond, subst).text,
                        self.render_block(then_branch, subst, returns_as_continue)
                    ));
                    if !else_branch.is_empty() {
                        out.push_str(&format!(
                            " else {{\n{}}}",
                            self.render_block(else_branch, subst, returns_as_continue)
                        ));
                    }
                    out.push('\n');
                }
                Stmt::Return(None) if returns_as_continue => out.push_str("continue;\n"),
                Stmt::Return(None) => out.push_str("return;\n"),
                Stmt::Return(Some(value)) => {
                    out.push_str(&format!("return {};\n", self.render(*value, subst).text));
                }
            }
        }
        out
    }

    fn child(&self, id: ExprId, subst: &Substitution, min: Precedence) -> String {
        self.render(id, subst).wrapped(min)
    }

    fn qualifier(&self, receiver: &Receiver, subst: &Substitution) -> String {
        match receiver {
            Receiver::None => String::new(),
            Receiver::Expr(id) => format!("{}.", self.child(*id, subst, Precedence::Postfix)),
            Receiver::Type(name) => format!("{name}."),
        }
    }

    fn arguments(&self, args: &[ExprId], subst: &Substitution) -> String {
        args.iter()
            .map(|arg| self.render(*arg, subst).text)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Render without substitution.
pub fn render(arena: &ExprArena, id: ExprId) -> String {
    Printer::new(arena).render(id, &Substitution::default()).text
}

fn render_literal(literal: &Literal) -> Operand {
    match literal {
        Literal::Int(v) if *v < 0 => Operand::new(v.to_string(), Precedence::Unary),
        Literal::Long(v) if *v < 0 => Operand::new(format!("{v}L"), Precedence::Unary),
        Literal::Int(v) => Operand::primary(v.to_string()),
        Literal::Long(v) => Operand::primary(format!("{v}L")),
        Literal::Float(text) => Operand::primary(text.clone()),
        Literal::Bool(v) => Operand::primary(v.to_string()),
        Literal::Char(text) => Operand::primary(format!("'{text}'")),
        Literal::Str(value) => Operand::primary(format!("\"{}\"", escape(value))),
        Literal::Null => Operand::primary("null"),
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Copy of `subst` without the names bound by an inner lambda.
fn shadowed<'n>(subst: &Substitution, names: impl Iterator<Item = &'n str>) -> Substitution {
    let mut inner = subst.clone();
    for name in names {
        inner.remove(name);
    }
    inner
}

/// Whether evaluating `id` cannot change program state.
pub fn is_side_effect_free(arena: &ExprArena, id: ExprId) -> bool {
    match arena.kind(id) {
        ExprKind::Name(_) | ExprKind::Literal(_) | ExprKind::Lambda { .. } => true,
        ExprKind::MethodRef { kind, .. } => match kind {
            MethodRefKind::Bound(qualifier) => is_side_effect_free(arena, *qualifier),
            _ => true,
        },
        ExprKind::Field { receiver, .. } => receiver
            .expr()
            .map_or(true, |receiver| is_side_effect_free(arena, receiver)),
        ExprKind::Unary { op, operand } => !op.mutates() && is_side_effect_free(arena, *operand),
        ExprKind::Binary { left, right, .. } => {
            is_side_effect_free(arena, *left) && is_side_effect_free(arena, *right)
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => [cond, then_expr, else_expr]
            .into_iter()
            .all(|e| is_side_effect_free(arena, *e)),
        ExprKind::Cast { operand, .. } => is_side_effect_free(arena, *operand),
        ExprKind::Index { array, index } => {
            is_side_effect_free(arena, *array) && is_side_effect_free(arena, *index)
        }
        ExprKind::Call { .. } | ExprKind::New { .. } | ExprKind::NewArray { .. } | ExprKind::Assign { .. } => false,
    }
}

/// Whether `id` may be evaluated repeatedly (e.g. as a loop bound) with the
/// same result and no cost worth hoisting.
pub fn is_safely_recomputable(arena: &ExprArena, id: ExprId) -> bool {
    match arena.kind(id) {
        ExprKind::Name(_) | ExprKind::Literal(_) => true,
        ExprKind::Field { receiver, .. } => receiver
            .expr()
            .map_or(true, |receiver| is_safely_recomputable(arena, receiver)),
        ExprKind::Unary { op, operand } => !op.mutates() && is_safely_recomputable(arena, *operand),
        ExprKind::Binary { left, right, .. } => {
            is_safely_recomputable(arena, *left) && is_safely_recomputable(arena, *right)
        }
        ExprKind::Cast { operand, .. } => is_safely_recomputable(arena, *operand),
        _ => false,
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
