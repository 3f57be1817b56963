//! Shared builders for pipeline tests.
//!
//! Hosts resolve call chains into an [`ExprArena`]; these helpers build the
//! same shapes a Java front end would hand over.

use loopify_ir::{ExprArena, ExprId, JavaType, LambdaBody, WildcardBound};
use loopify_lower::{CallSite, Lowered, LowerOptions, LowerResult, NameScope};

pub fn integer() -> JavaType {
    JavaType::class("Integer")
}

/// `java.util.function.<name><args>`
pub fn fn_type(name: &str, args: &[JavaType]) -> JavaType {
    JavaType::generic(format!("java.util.function.{name}"), args.to_vec())
}

/// `receiver.method(args)` yielding a stream of `element`.
pub fn stage(arena: &mut ExprArena, receiver: ExprId, method: &str, args: Vec<ExprId>, element: &JavaType) -> ExprId {
    arena.method(receiver, method, args, JavaType::stream_of(element))
}

/// `Collectors.method(args)` producing `result`.
pub fn collector(
    arena: &mut ExprArena,
    method: &str,
    args: Vec<ExprId>,
    element: &JavaType,
    result: JavaType,
) -> ExprId {
    let ty = JavaType::generic(
        "java.util.stream.Collector",
        vec![element.boxed(), JavaType::Wildcard(WildcardBound::Unbounded), result],
    );
    arena.static_call("Collectors", method, args, ty)
}

/// `param -> body(param)`
pub fn lambda(
    arena: &mut ExprArena,
    param: &str,
    ty: JavaType,
    iface: JavaType,
    body: impl FnOnce(&mut ExprArena, ExprId) -> ExprId,
) -> ExprId {
    let name = arena.name(param, ty.clone());
    let body = body(arena, name);
    arena.lambda(vec![(param, ty)], LambdaBody::Expr(body), iface)
}

/// Lower `terminal` with `visible` names in scope.
pub fn lower_with(arena: &mut ExprArena, terminal: ExprId, visible: &[&str], site: &CallSite) -> LowerResult<Lowered> {
    loopify_lower::init_tracing();
    let host = NameScope::with_names(visible.iter().copied());
    loopify_lower::lower(arena, terminal, &host, site, &LowerOptions::default())
}
