//! Generation driver: from an extracted pipeline to statement text.
//!
//! # Passes
//!
//! 1. Reserve the names generated code must not shadow: parameters and
//!    block locals of lambdas that survive as lambdas.
//! 2. Preprocess, last stage first, so consumers can name their inputs.
//! 3. Register slots in pipeline order.
//! 4. Wrap, last stage first, building the loop nest inside out.
//! 5. Finish the context to learn what happens at the call site.
//!
//! Host edits happen only in [`apply`], after generation fully succeeded.

use rustc_hash::FxHashSet;

use loopify_ir::{ExprArena, ExprId, ExprKind};

use crate::context::{Disposition, Env, NameRegistry, ReplacementContext};
use crate::error::{LowerError, LowerResult};
use crate::extract::{extract, Pipeline};
use crate::host::{CallSite, Host, ReplaceTarget, Synthesizer};
use crate::operation::{IntermediateOp, Operation, OperationRecord};
use crate::options::LowerOptions;
use crate::slot::SlotId;

/// Generated replacement for one pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lowered {
    /// Declarations and steps that run before the loop.
    pub before: String,
    pub loop_nest: String,
    /// Steps that run after the loop.
    pub after: String,
    /// Expression replacing the target, when the statement stays.
    pub finisher: Option<String>,
    pub disposition: Disposition,
}

impl Lowered {
    /// All statements inserted ahead of the call site.
    pub fn block(&self) -> String {
        format!("{}{}{}", self.before, self.loop_nest, self.after)
    }

    /// The expression replaced by the finisher, if any.
    pub fn target(&self) -> Option<ReplaceTarget> {
        match self.disposition {
            Disposition::Replace(target) => Some(target),
            Disposition::DeleteStatement => None,
        }
    }
}

/// Nodes created by [`apply`].
#[derive(Debug)]
pub struct Applied<N> {
    pub inserted: N,
    /// The replacement expression; `None` when the statement was deleted.
    pub replaced: Option<N>,
}

/// Generate the loop for `pipeline` at `site`.
#[tracing::instrument(level = "debug", skip_all, fields(stages = pipeline.records().len()))]
pub fn generate(
    pipeline: Pipeline,
    arena: &ExprArena,
    host: &dyn Host,
    site: &CallSite,
    options: &LowerOptions,
) -> LowerResult<Lowered> {
    let text = pipeline.text().to_owned();
    generate_impl(pipeline, arena, host, site, options).map_err(|err| {
        let err = err.with_pipeline(&text);
        if err.is_not_applicable() {
            tracing::trace!(%err, "pipeline not lowered");
        } else {
            tracing::error!(%err, "pipeline lowering failed");
        }
        err
    })
}

fn generate_impl(
    pipeline: Pipeline,
    arena: &ExprArena,
    host: &dyn Host,
    site: &CallSite,
    options: &LowerOptions,
) -> LowerResult<Lowered> {
    let mut names = NameRegistry::new();
    reserve_surviving_names(arena, pipeline.root(), pipeline.consumed_lambdas(), &mut names);

    let (records, mut slots) = pipeline.into_parts();
    for record in records.iter().rev() {
        record
            .op
            .preprocess(arena, host, &mut slots, record.in_var, record.out_var);
    }
    let mut order = Vec::with_capacity(slots.len());
    registration_order(&records, &mut order);

    let has_nested_loop = records
        .iter()
        .any(|record| matches!(record.op, Operation::Intermediate(IntermediateOp::FlatMap(_))));
    let env = Env {
        arena,
        host,
        site,
        options,
    };
    let mut ctx = ReplacementContext::new(env, &mut names, has_nested_loop);
    let bound = slots.register_all(&order, &mut ctx);

    let mut code = String::new();
    for record in records.into_iter().rev() {
        let name = record.op.name();
        code = record
            .op
            .wrap(record.in_var, record.out_var, code, &mut ctx, &bound)?;
        tracing::trace!(stage = name, len = code.len(), "wrapped stage");
    }
    let before = ctx.drain_before();
    let after = ctx.drain_after();
    let replacement = ctx.finish()?;
    tracing::debug!(disposition = ?replacement.disposition, "generated loop");
    Ok(Lowered {
        before,
        loop_nest: code,
        after,
        finisher: replacement.finisher,
        disposition: replacement.disposition,
    })
}

/// Extract and generate in one step.
pub fn lower(
    arena: &mut ExprArena,
    terminal: ExprId,
    host: &dyn Host,
    site: &CallSite,
    options: &LowerOptions,
) -> LowerResult<Lowered> {
    let pipeline = extract(arena, terminal, options)?;
    generate(pipeline, arena, host, site, options)
}

/// Perform the host edits for `lowered`.
pub fn apply<S: Synthesizer>(synth: &mut S, lowered: &Lowered) -> LowerResult<Applied<S::Node>> {
    let inserted = synth.insert_before(&lowered.block()).map_err(host_error)?;
    let replaced = match lowered.disposition {
        Disposition::DeleteStatement => {
            synth.delete_statement().map_err(host_error)?;
            None
        }
        Disposition::Replace(target) => {
            let finisher = lowered
                .finisher
                .as_deref()
                .ok_or_else(|| LowerError::internal("replacement without a finisher"))?;
            Some(synth.replace_expression(target, finisher).map_err(host_error)?)
        }
    };
    Ok(Applied { inserted, replaced })
}

fn host_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> LowerError {
    tracing::debug!(%err, "synthesizer failed");
    LowerError::HostSynthesis(Box::new(err))
}

/// Slots in pipeline order, nested pipelines in place.
fn registration_order(records: &[OperationRecord], order: &mut Vec<SlotId>) {
    for record in records {
        push_slot(order, record.in_var);
        if let Operation::Intermediate(IntermediateOp::FlatMap(flat_map)) = &record.op {
            registration_order(&flat_map.records, order);
        }
        push_slot(order, record.out_var);
    }
}

fn push_slot(order: &mut Vec<SlotId>, slot: SlotId) {
    if !slot.is_stub() && !order.contains(&slot) {
        order.push(slot);
    }
}

/// Reserve parameters and block locals of every lambda not in `consumed`,
/// since those stay in the generated code. Locals of consumed lambdas are
/// renamed when the lambda is inlined.
fn reserve_surviving_names(arena: &ExprArena, root: ExprId, consumed: &FxHashSet<ExprId>, names: &mut NameRegistry) {
    arena.walk(root, &mut |id, expr| {
        let ExprKind::Lambda { params, body } = &expr.kind else {
            return;
        };
        if consumed.contains(&id) {
            return;
        }
        for param in params {
            names.reserve(param.name.clone());
        }
        for local in body.declared_locals() {
            names.reserve(local);
        }
    });
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
