//! Arena that owns captured pipeline expressions.
//!
//! Hosts fill the arena while translating their syntax tree; tests use the
//! builder helpers below. The lowering engine only appends nodes (for the
//! synthetic calls it creates out of method references) and never removes
//! any, so `ExprId`s stay valid for the arena's lifetime.

use crate::ast::{
    BinaryOp, Expr, ExprKind, LambdaBody, Literal, MethodRefKind, Param, Receiver, Stmt, UnaryOp,
};
use crate::{ExprId, JavaType};

/// Flat storage for expressions.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprArena {
    exprs: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and return its ID.
    pub fn alloc(&mut self, kind: ExprKind, ty: JavaType) -> ExprId {
        let index = u32::try_from(self.exprs.len()).unwrap_or(u32::MAX - 1);
        self.exprs.push(Expr::new(kind, ty));
        ExprId::new(index)
    }

    /// Look up a node.
    ///
    /// Panics on an ID from another arena, which is a host bug.
    #[inline]
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.get(id).kind
    }

    #[inline]
    pub fn ty(&self, id: ExprId) -> &JavaType {
        &self.get(id).ty
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Call parts when `id` is a method call.
    pub fn as_call(&self, id: ExprId) -> Option<(&Receiver, &str, &[ExprId])> {
        match self.kind(id) {
            ExprKind::Call {
                receiver,
                method,
                args,
            } => Some((receiver, method, args)),
            _ => None,
        }
    }

    /// Integer value of an `int`/`long` literal, looking through unary minus.
    pub fn integer_value(&self, id: ExprId) -> Option<i64> {
        match self.kind(id) {
            ExprKind::Literal(Literal::Int(v) | Literal::Long(v)) => Some(*v),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => self.integer_value(*operand).map(i64::wrapping_neg),
            _ => None,
        }
    }

    /// Visit `root` and every node reachable from it, lambda bodies included.
    pub fn walk(&self, root: ExprId, visit: &mut impl FnMut(ExprId, &Expr)) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let expr = self.get(id);
            visit(id, expr);
            match &expr.kind {
                ExprKind::Name(_) | ExprKind::Literal(_) => {}
                ExprKind::Field { receiver, .. } => stack.extend(receiver.expr()),
                ExprKind::Call { receiver, args, .. } => {
                    stack.extend(receiver.expr());
                    stack.extend(args.iter().copied());
                }
                ExprKind::New { args, .. } => stack.extend(args.iter().copied()),
                ExprKind::NewArray { init, .. } => stack.extend(init.iter().copied()),
                ExprKind::Lambda { body, .. } => match body {
                    LambdaBody::Expr(body) => stack.push(*body),
                    LambdaBody::Block(stmts) => push_statements(stmts, &mut stack),
                },
                ExprKind::MethodRef { kind, .. } => {
                    if let MethodRefKind::Bound(qualifier) = kind {
                        stack.push(*qualifier);
                    }
                }
                ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                    stack.push(*operand);
                }
                ExprKind::Binary { left, right, .. } => stack.extend([*left, *right]),
                ExprKind::Ternary {
                    cond,
                    then_expr,
                    else_expr,
                } => stack.extend([*cond, *then_expr, *else_expr]),
                ExprKind::Index { array, index } => stack.extend([*array, *index]),
                ExprKind::Assign { target, value, .. } => stack.extend([*target, *value]),
            }
        }
    }

    // Builders

    pub fn name(&mut self, name: impl Into<String>, ty: JavaType) -> ExprId {
        self.alloc(ExprKind::Name(name.into()), ty)
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.alloc(ExprKind::Literal(Literal::Int(value)), JavaType::INT)
    }

    pub fn long(&mut self, value: i64) -> ExprId {
        self.alloc(ExprKind::Literal(Literal::Long(value)), JavaType::LONG)
    }

    pub fn bool(&mut self, value: bool) -> ExprId {
        self.alloc(ExprKind::Literal(Literal::Bool(value)), JavaType::BOOLEAN)
    }

    pub fn string(&mut self, value: impl Into<String>) -> ExprId {
        self.alloc(ExprKind::Literal(Literal::Str(value.into())), JavaType::string())
    }

    pub fn null(&mut self) -> ExprId {
        self.alloc(ExprKind::Literal(Literal::Null), JavaType::Null)
    }

    /// Instance method call `receiver.method(args)`.
    pub fn method(
        &mut self,
        receiver: ExprId,
        method: impl Into<String>,
        args: Vec<ExprId>,
        ty: JavaType,
    ) -> ExprId {
        self.alloc(
            ExprKind::Call {
                receiver: Receiver::Expr(receiver),
                method: method.into(),
                args,
            },
            ty,
        )
    }

    /// Static method call `Class.method(args)`.
    pub fn static_call(
        &mut self,
        class: impl Into<String>,
        method: impl Into<String>,
        args: Vec<ExprId>,
        ty: JavaType,
    ) -> ExprId {
        self.alloc(
            ExprKind::Call {
                receiver: Receiver::Type(class.into()),
                method: method.into(),
                args,
            },
            ty,
        )
    }

    pub fn field(&mut self, receiver: Receiver, name: impl Into<String>, ty: JavaType) -> ExprId {
        self.alloc(
            ExprKind::Field {
                receiver,
                name: name.into(),
            },
            ty,
        )
    }

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId, ty: JavaType) -> ExprId {
        self.alloc(ExprKind::Binary { op, left, right }, ty)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        let ty = self.ty(operand).clone();
        self.alloc(ExprKind::Unary { op, operand }, ty)
    }

    pub fn ternary(&mut self, cond: ExprId, then_expr: ExprId, else_expr: ExprId) -> ExprId {
        let ty = self.ty(then_expr).clone();
        self.alloc(
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            },
            ty,
        )
    }

    /// Lambda with the given parameters; `ty` is the functional interface type.
    pub fn lambda(&mut self, params: Vec<(&str, JavaType)>, body: LambdaBody, ty: JavaType) -> ExprId {
        let params = params
            .into_iter()
            .map(|(name, ty)| Param {
                name: name.to_owned(),
                ty,
            })
            .collect();
        self.alloc(ExprKind::Lambda { params, body }, ty)
    }

    pub fn method_ref(
        &mut self,
        kind: MethodRefKind,
        method: impl Into<String>,
        result: JavaType,
        ty: JavaType,
    ) -> ExprId {
        self.alloc(
            ExprKind::MethodRef {
                kind,
                method: method.into(),
                result,
            },
            ty,
        )
    }
}

fn push_statements(stmts: &[Stmt], stack: &mut Vec<ExprId>) {
    for stmt in stmts {
        match stmt {
            Stmt::Expr(id) | Stmt::Return(Some(id)) => stack.push(*id),
            Stmt::Local { init, .. } => stack.extend(*init),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                stack.push(*cond);
                push_statements(then_branch, stack);
                push_statements(else_branch, stack);
            }
            Stmt::Return(None) => {}
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
