//! Test helpers for stage unit testing.
//!
//! Provides `Harness`, which owns everything a `ReplacementContext` borrows,
//! so single stages can be generated without extracting a whole pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use loopify_ir::{ExprArena, ExprId, JavaType, LambdaBody, WildcardBound};

use crate::context::{Env, NameRegistry, Replacement, ReplacementContext};
use crate::error::LowerResult;
use crate::host::{CallSite, NameScope};
use crate::options::LowerOptions;
use crate::slot::{BoundSlot, BoundSlots, SlotTable, UnboundSlot};

/// Host, call site and options for one test rewrite.
pub struct Harness {
    host: NameScope,
    site: CallSite,
    options: LowerOptions,
    has_nested_loop: bool,
}

/// Everything one generation produced.
#[derive(Debug)]
pub struct Generated {
    pub before: String,
    pub code: String,
    pub after: String,
    pub replacement: Replacement,
}

impl Harness {
    /// A statement site with nothing else in scope.
    pub fn new() -> Self {
        Harness {
            host: NameScope::new(),
            site: CallSite::statement(),
            options: LowerOptions::default(),
            has_nested_loop: false,
        }
    }

    pub fn at(site: CallSite) -> Self {
        Harness {
            site,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_names(mut self, names: &[&str]) -> Self {
        for name in names {
            self.host.add_name(*name);
        }
        self
    }

    #[must_use]
    pub fn nested_loop(mut self) -> Self {
        self.has_nested_loop = true;
        self
    }

    pub fn run<R>(&self, arena: &ExprArena, f: impl FnOnce(ReplacementContext<'_>) -> R) -> R {
        let mut names = NameRegistry::new();
        let env = Env {
            arena,
            host: &self.host,
            site: &self.site,
            options: &self.options,
        };
        f(ReplacementContext::new(env, &mut names, self.has_nested_loop))
    }

    /// Run `stage` and finish the context.
    pub fn generate(
        &self,
        arena: &ExprArena,
        stage: impl FnOnce(&mut ReplacementContext<'_>) -> LowerResult<String>,
    ) -> Generated {
        self.run(arena, |mut ctx| {
            let code = stage(&mut ctx).unwrap();
            let before = ctx.drain_before();
            let after = ctx.drain_after();
            Generated {
                before,
                code,
                after,
                replacement: ctx.finish().unwrap(),
            }
        })
    }
}

/// A slot registered under `name` (or `name1`, ... when taken).
pub fn slot(ctx: &mut ReplacementContext<'_>, name: &str, ty: JavaType) -> BoundSlot {
    let mut slot = UnboundSlot::new(ty);
    slot.add_best_candidate(name);
    slot.register(ctx)
}

/// Slots `SlotId(0)`, `SlotId(1)`, ... named and typed as given.
pub fn slots(ctx: &mut ReplacementContext<'_>, specs: &[(&str, JavaType)]) -> BoundSlots {
    let mut table = SlotTable::new();
    for (name, ty) in specs {
        let id = table.alloc(ty.clone());
        if let Some(slot) = table.get_mut(id) {
            slot.add_best_candidate(*name);
        }
    }
    table.register_all(&[], ctx)
}

/// `java.util.function.<name><args>`
pub fn fn_type(name: &str, args: &[JavaType]) -> JavaType {
    JavaType::generic(format!("java.util.function.{name}"), args.to_vec())
}

/// `receiver.method(args)` yielding a stream of `element`.
pub fn stage(arena: &mut ExprArena, receiver: ExprId, method: &str, args: Vec<ExprId>, element: &JavaType) -> ExprId {
    arena.method(receiver, method, args, JavaType::stream_of(element))
}

/// `Collectors.method(args)` turning `element`s into a `result`.
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

/// `param -> body`, where `body` receives the parameter's name node.
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
