//! Expression nodes of a captured pipeline.
//!
//! The host translates its own syntax tree into these nodes. Only the shapes
//! that stage arguments actually take are modelled: names, literals, calls,
//! lambdas, method references and the usual operators.
//!
//! # Design
//!
//! Children are `ExprId`s into the owning [`ExprArena`](crate::ExprArena).
//! Every node carries its resolved [`JavaType`]; for lambdas and method
//! references that is the functional interface type.

use crate::{ExprId, JavaType};

/// Binding strength of Java operators, loosest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precedence {
    Lambda,
    Assignment,
    Conditional,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    Unary,
    Postfix,
    Primary,
}

impl Precedence {
    /// The next tighter level, used for right operands of left-associative operators.
    #[must_use]
    pub const fn tighter(self) -> Precedence {
        match self {
            Precedence::Lambda => Precedence::Assignment,
            Precedence::Assignment => Precedence::Conditional,
            Precedence::Conditional => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::BitOr,
            Precedence::BitOr => Precedence::BitXor,
            Precedence::BitXor => Precedence::BitAnd,
            Precedence::BitAnd => Precedence::Equality,
            Precedence::Equality => Precedence::Relational,
            Precedence::Relational => Precedence::Shift,
            Precedence::Shift => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Postfix,
            Precedence::Postfix | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// Binary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    UShr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub const fn precedence(self) -> Precedence {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => Precedence::Multiplicative,
            BinaryOp::Add | BinaryOp::Sub => Precedence::Additive,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => Precedence::Shift,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Precedence::Relational,
            BinaryOp::Eq | BinaryOp::Ne => Precedence::Equality,
            BinaryOp::BitAnd => Precedence::BitAnd,
            BinaryOp::BitXor => Precedence::BitXor,
            BinaryOp::BitOr => Precedence::BitOr,
            BinaryOp::And => Precedence::And,
            BinaryOp::Or => Precedence::Or,
        }
    }

    /// Logical complement of a comparison (`<` becomes `>=`).
    pub const fn complement(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::Lt => BinaryOp::Ge,
            BinaryOp::Le => BinaryOp::Gt,
            BinaryOp::Gt => BinaryOp::Le,
            BinaryOp::Ge => BinaryOp::Lt,
            BinaryOp::Eq => BinaryOp::Ne,
            BinaryOp::Ne => BinaryOp::Eq,
            _ => return None,
        })
    }
}

/// Unary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
        }
    }

    pub const fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }

    /// Increment and decrement write to their operand.
    pub const fn mutates(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

/// Literal values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    Int(i64),
    Long(i64),
    /// Floating literal kept as source text (`1.5`, `2e3d`).
    Float(String),
    Bool(bool),
    /// Character literal kept as source text without quotes (`a`, `\n`).
    Char(String),
    /// String literal content without quotes.
    Str(String),
    Null,
}

/// What a method call or field access is qualified by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Receiver {
    /// Unqualified call or field.
    None,
    /// Instance receiver expression.
    Expr(ExprId),
    /// Static qualifier, spelled as in source (`IntStream`, `java.util.Arrays`).
    Type(String),
}

impl Receiver {
    pub fn expr(&self) -> Option<ExprId> {
        match self {
            Receiver::Expr(id) => Some(*id),
            _ => None,
        }
    }

    /// Simple name of a static qualifier.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Receiver::Type(name) => Some(name.rsplit('.').next().unwrap_or(name)),
            _ => None,
        }
    }
}

/// Kind of a method reference, as resolved by the host.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodRefKind {
    /// `Integer::sum`: all arguments go to a static method.
    Static(String),
    /// `String::length`: the first argument is the receiver.
    Unbound(String),
    /// `System.out::println`: the qualifier is evaluated once.
    Bound(ExprId),
    /// `ArrayList::new`.
    Constructor(JavaType),
    /// `String[]::new`, holding the component type.
    ArrayConstructor(JavaType),
}

/// A lambda parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub name: String,
    pub ty: JavaType,
}

/// Statements inside a block lambda body.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stmt {
    Expr(ExprId),
    Local {
        ty: JavaType,
        name: String,
        init: Option<ExprId>,
    },
    If {
        cond: ExprId,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    Return(Option<ExprId>),
}

/// Lambda body: a single expression or a statement block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LambdaBody {
    Expr(ExprId),
    Block(Vec<Stmt>),
}

impl LambdaBody {
    /// The returned expression when the body is an expression or `{ return e; }`.
    pub fn single_expression(&self) -> Option<ExprId> {
        match self {
            LambdaBody::Expr(id) => Some(*id),
            LambdaBody::Block(stmts) => match stmts.as_slice() {
                [Stmt::Return(Some(id))] => Some(*id),
                _ => None,
            },
        }
    }

    /// A block that never returns a value.
    pub fn is_void_block(&self) -> bool {
        fn void_returns(stmts: &[Stmt]) -> bool {
            stmts.iter().all(|stmt| match stmt {
                Stmt::Return(value) => value.is_none(),
                Stmt::If {
                    then_branch,
                    else_branch,
                    ..
                } => void_returns(then_branch) && void_returns(else_branch),
                Stmt::Expr(_) | Stmt::Local { .. } => true,
            })
        }
        match self {
            LambdaBody::Expr(_) => false,
            LambdaBody::Block(stmts) => void_returns(stmts),
        }
    }

    /// Names of the locals a block body declares, in source order,
    /// including those inside `if` branches.
    pub fn declared_locals(&self) -> Vec<&str> {
        fn collect<'s>(stmts: &'s [Stmt], out: &mut Vec<&'s str>) {
            for stmt in stmts {
                match stmt {
                    Stmt::Local { name, .. } => out.push(name),
                    Stmt::If {
                        then_branch,
                        else_branch,
                        ..
                    } => {
                        collect(then_branch, out);
                        collect(else_branch, out);
                    }
                    Stmt::Expr(_) | Stmt::Return(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        if let LambdaBody::Block(stmts) = self {
            collect(stmts, &mut out);
        }
        out
    }
}

/// Expression node kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    Name(String),
    Literal(Literal),
    Field {
        receiver: Receiver,
        name: String,
    },
    Call {
        receiver: Receiver,
        method: String,
        args: Vec<ExprId>,
    },
    New {
        class: JavaType,
        args: Vec<ExprId>,
    },
    NewArray {
        component: JavaType,
        init: Vec<ExprId>,
    },
    Lambda {
        params: Vec<Param>,
        body: LambdaBody,
    },
    MethodRef {
        kind: MethodRefKind,
        method: String,
        /// Return type of the referenced method.
        result: JavaType,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Ternary {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
    Cast {
        ty: JavaType,
        operand: ExprId,
    },
    Index {
        array: ExprId,
        index: ExprId,
    },
    Assign {
        /// Compound operator, `None` for plain `=`.
        op: Option<BinaryOp>,
        target: ExprId,
        value: ExprId,
    },
}

/// A typed expression node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: JavaType,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: JavaType) -> Self {
        Expr { kind, ty }
    }

    /// Precedence of this node when printed.
    pub fn precedence(&self) -> Precedence {
        match &self.kind {
            ExprKind::Name(_)
            | ExprKind::Literal(_)
            | ExprKind::Field { .. }
            | ExprKind::Call { .. }
            | ExprKind::New { .. }
            | ExprKind::NewArray { .. }
            | ExprKind::MethodRef { .. }
            | ExprKind::Index { .. } => Precedence::Primary,
            ExprKind::Lambda { .. } => Precedence::Lambda,
            ExprKind::Unary { op, .. } if op.is_postfix() => Precedence::Postfix,
            ExprKind::Unary { .. } | ExprKind::Cast { .. } => Precedence::Unary,
            ExprKind::Binary { op, .. } => op.precedence(),
            ExprKind::Ternary { .. } => Precedence::Conditional,
            ExprKind::Assign { .. } => Precedence::Assignment,
        }
    }
}
