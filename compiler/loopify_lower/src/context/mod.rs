//! The replacement context: per-rewrite state shared by all stages.
//!
//! One context exists per generated loop. Stages ask it for fresh names,
//! hoisted declarations, loop labels and the result expression. Nested
//! pipelines (`flatMap`) get a child context that reborrows the parent's
//! name registries and keeps its own steps and label.
//!
//! # Design
//!
//! - Names: one [`NameRegistry`] per rewrite, so every variable and label in
//!   the generated block is unique
//! - Steps: before-steps run ahead of the loop in the order stages added
//!   them; after-steps are prepended, since an outer stage adds its own after
//!   the inner ones but must run first
//! - Lifecycle: `finish` consumes the context and decides what happens to
//!   the statement at the call site

use rustc_hash::FxHashSet;

use loopify_ir::{
    is_side_effect_free, names, ExprArena, ExprId, ExprKind, JavaType, Operand, Printer,
    Substitution,
};

use crate::conditional::{ConditionalExpression, Unwrap};
use crate::error::{LowerError, LowerResult};
use crate::function::Callable;
use crate::host::{CallSite, Host, ReplaceTarget, ResultUse, SitePosition};
use crate::options::LowerOptions;

/// Read-only inputs of one rewrite.
#[derive(Copy, Clone)]
pub struct Env<'a> {
    pub arena: &'a ExprArena,
    pub host: &'a dyn Host,
    pub site: &'a CallSite,
    pub options: &'a LowerOptions,
}

/// Names and labels already claimed by generated code.
#[derive(Clone, Debug, Default)]
pub struct NameRegistry {
    used: FxHashSet<String>,
    labels: FxHashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }
}

/// How a result variable may relate to the call site's declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResultKind {
    /// Assigned once; may become the site's (possibly `final`) variable.
    Final,
    /// Reassigned in the loop; may replace a non-final site variable.
    NonFinal,
    /// Intermediate state; never replaces the site's variable.
    Unknown,
}

/// What to do with the statement at the call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    DeleteStatement,
    Replace(ReplaceTarget),
}

/// Outcome of a finished context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub disposition: Disposition,
    /// Expression replacing the target; `None` when the statement goes away.
    pub finisher: Option<String>,
}

/// Mutable state of one rewrite.
pub struct ReplacementContext<'a> {
    env: Env<'a>,
    names: &'a mut NameRegistry,
    nested: bool,
    has_nested_loop: bool,
    before: Vec<String>,
    after: Vec<String>,
    finisher: Option<String>,
    label: Option<String>,
    renames: Substitution,
    target: ReplaceTarget,
    reused_declaration: bool,
}

impl<'a> ReplacementContext<'a> {
    /// Root context of a rewrite.
    pub fn new(env: Env<'a>, names: &'a mut NameRegistry, has_nested_loop: bool) -> Self {
        ReplacementContext {
            env,
            names,
            nested: false,
            has_nested_loop,
            before: Vec::new(),
            after: Vec::new(),
            finisher: None,
            label: None,
            renames: Substitution::default(),
            target: ReplaceTarget::Pipeline,
            reused_declaration: false,
        }
    }

    /// Child context for a nested pipeline whose lambda parameter `param`
    /// stands for `input`.
    pub fn nested(&mut self, param: Option<&str>, input: Operand, has_nested_loop: bool) -> ReplacementContext<'_> {
        let mut renames = self.renames.clone();
        if let Some(param) = param {
            renames.insert(param.to_owned(), input);
        }
        ReplacementContext {
            env: self.env,
            names: &mut *self.names,
            nested: true,
            has_nested_loop,
            before: Vec::new(),
            after: Vec::new(),
            finisher: None,
            label: None,
            renames,
            target: ReplaceTarget::Pipeline,
            reused_declaration: false,
        }
    }

    // Accessors

    pub fn arena(&self) -> &'a ExprArena {
        self.env.arena
    }

    pub fn host(&self) -> &'a dyn Host {
        self.env.host
    }

    pub fn site(&self) -> &'a CallSite {
        self.env.site
    }

    pub fn renames(&self) -> &Substitution {
        &self.renames
    }

    pub fn has_nested_loop(&self) -> bool {
        self.has_nested_loop
    }

    /// Print `id` with the active renames.
    pub fn render(&self, id: ExprId) -> Operand {
        Printer::new(self.env.arena).render(id, &self.renames)
    }

    /// Print the logical complement of `id` with the active renames.
    pub fn negate(&self, id: ExprId) -> Operand {
        Printer::new(self.env.arena).negate(id, &self.renames)
    }

    // Names

    /// Claim the first free candidate, then `candidate1`, `candidate2`, ...
    ///
    /// A name is free when this rewrite has not used it, it is not a Java
    /// keyword, and it resolves to nothing at the call site.
    pub fn register_var_name<S: AsRef<str>>(&mut self, candidates: &[S]) -> String {
        let candidates: Vec<&str> = candidates
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| names::is_identifier(c))
            .collect();
        let candidates = if candidates.is_empty() {
            vec!["val"]
        } else {
            candidates
        };
        for idx in 0_u32.. {
            for candidate in &candidates {
                let name = if idx == 0 {
                    (*candidate).to_owned()
                } else {
                    format!("{candidate}{idx}")
                };
                if !self.is_taken(&name) {
                    self.names.reserve(name.clone());
                    return name;
                }
            }
        }
        // 2^32 suffixes per candidate are never all taken
        format!("{}_", candidates[0])
    }

    fn is_taken(&self, name: &str) -> bool {
        self.names.is_used(name) || names::is_reserved(name) || self.env.host.is_name_taken(name)
    }

    /// Keep `name` away from generated variables.
    pub fn reserve(&mut self, name: &str) {
        self.names.reserve(name);
    }

    // Declarations

    /// Hoist `T name = init;` ahead of the loop and return the name.
    pub fn declare<S: AsRef<str>>(&mut self, candidates: &[S], ty: &JavaType, init: &str) -> String {
        let name = self.register_var_name(candidates);
        self.before.push(format!("{ty} {name} = {init};\n"));
        name
    }

    /// Declare the variable holding the pipeline result.
    ///
    /// When the pipeline initializes a local of a compatible type and `kind`
    /// allows it, that local is declared here instead and the original
    /// statement is deleted. `most_abstract` is the most general declared
    /// type the accumulator still works with (`java.util.Collection` for a
    /// list that is only added to).
    pub fn declare_result(
        &mut self,
        desired: &str,
        ty: &JavaType,
        most_abstract: Option<&str>,
        init: &str,
        kind: ResultKind,
    ) -> LowerResult<String> {
        if let Some(name) = self.try_reuse_site(ty, most_abstract, init, kind) {
            return Ok(name);
        }
        let name = self.declare(&[desired], ty, init);
        if kind != ResultKind::Unknown {
            self.set_finisher(name.clone())?;
        }
        Ok(name)
    }

    fn try_reuse_site(
        &mut self,
        ty: &JavaType,
        most_abstract: Option<&str>,
        init: &str,
        kind: ResultKind,
    ) -> Option<String> {
        if self.nested || kind == ResultKind::Unknown || self.reused_declaration {
            return None;
        }
        let site = self.env.site;
        let SitePosition::Initializer {
            name,
            ty: site_ty,
            is_final,
        } = &site.position
        else {
            return None;
        };
        let use_folded = site.result_use == ResultUse::Direct || self.target == ReplaceTarget::ResultUse;
        if !use_folded || (*is_final && kind != ResultKind::Final) {
            return None;
        }
        if !is_compatible(site_ty, ty, most_abstract) {
            return None;
        }
        tracing::debug!(%name, "result reuses the call-site declaration");
        let modifier = if *is_final { "final " } else { "" };
        self.before.push(format!("{modifier}{site_ty} {name} = {init};\n"));
        self.names.reserve(name.clone());
        self.reused_declaration = true;
        Some(name.clone())
    }

    // Steps

    pub fn add_before_step(&mut self, step: impl Into<String>) {
        self.before.push(step.into());
    }

    /// After-steps run in reverse order of registration.
    pub fn add_after_step(&mut self, step: impl Into<String>) {
        self.after.insert(0, step.into());
    }

    pub fn drain_before(&mut self) -> String {
        self.before.drain(..).collect()
    }

    pub fn drain_after(&mut self) -> String {
        self.after.drain(..).collect()
    }

    // Result

    pub fn set_finisher(&mut self, finisher: impl Into<String>) -> LowerResult<()> {
        if let Some(existing) = &self.finisher {
            return Err(LowerError::internal(format!("finisher already set to `{existing}`")));
        }
        self.finisher = Some(finisher.into());
        Ok(())
    }

    /// Use `cond` as the result, folding the site's immediate use into it
    /// when possible.
    pub fn set_conditional_finisher(&mut self, cond: ConditionalExpression) -> LowerResult<()> {
        let cond = match self.try_unwrap(&cond, true)? {
            Some(unwrapped) => unwrapped,
            None => cond,
        };
        self.set_finisher(cond.as_expression())
    }

    /// Fold the call site's use of the result into `cond`.
    ///
    /// `lazy` means the fallback of `.orElse(..)`/`.orElseGet(..)` is only
    /// evaluated when no element was found.
    fn try_unwrap(&mut self, cond: &ConditionalExpression, lazy: bool) -> LowerResult<Option<ConditionalExpression>> {
        if self.nested || self.target == ReplaceTarget::ResultUse {
            return Ok(None);
        }
        let site = self.env.site;
        let how = match &site.result_use {
            ResultUse::Direct => return Ok(None),
            ResultUse::IsPresent => Unwrap::IsPresent,
            ResultUse::IsEmpty => Unwrap::IsEmpty,
            ResultUse::Negated => Unwrap::Negated,
            ResultUse::OrElse(fallback) => {
                if !lazy && !is_side_effect_free(self.env.arena, *fallback) {
                    return Ok(None);
                }
                Unwrap::OrElse(self.render(*fallback).text)
            }
            ResultUse::OrElseGet(supplier) => {
                if !lazy || !matches!(cond, ConditionalExpression::Optional { .. }) {
                    return Ok(None);
                }
                let Some(callable) = Callable::create(self.env.arena, *supplier, 0) else {
                    return Ok(None);
                };
                Unwrap::OrElse(callable.transform(self, &[])?.text().to_owned())
            }
        };
        let unwrapped = cond.unwrap(&how);
        if unwrapped.is_some() {
            self.target = ReplaceTarget::ResultUse;
        }
        Ok(unwrapped)
    }

    /// Whether the site is `.orElse(extreme)` with the given value; folds the
    /// use when it is.
    pub fn try_unwrap_or_else(&mut self, extreme: i64) -> bool {
        if self.nested || self.target == ReplaceTarget::ResultUse {
            return false;
        }
        let site = self.env.site;
        let ResultUse::OrElse(fallback) = &site.result_use else {
            return false;
        };
        let arena = self.env.arena;
        let value = arena.integer_value(*fallback).or_else(|| match arena.kind(*fallback) {
            ExprKind::Field { receiver, name } => limit_constant(receiver.type_name()?, name),
            _ => None,
        });
        if value == Some(extreme) {
            self.target = ReplaceTarget::ResultUse;
            true
        } else {
            false
        }
    }

    /// Store `cond`'s value and leave the loop.
    ///
    /// In a `return` statement the value is returned directly and the false
    /// branch becomes the statement's expression after the loop.
    pub fn assign_and_break(&mut self, cond: ConditionalExpression) -> LowerResult<String> {
        let cond = match self.try_unwrap(&cond, false)? {
            Some(unwrapped) => unwrapped,
            None => cond,
        };
        if !self.nested && self.env.site.position == SitePosition::Return {
            self.set_finisher(cond.false_branch())?;
            return Ok(format!("return {};\n", cond.true_branch()));
        }
        let name = self.declare_result(
            cond.condition(),
            &cond.ty(),
            None,
            &cond.false_branch(),
            ResultKind::NonFinal,
        )?;
        Ok(format!("{name} = {};\n{}", cond.true_branch(), self.break_statement()))
    }

    // Loop control

    /// `break;`, or `break label;` when a nested loop sits in between.
    pub fn break_statement(&mut self) -> String {
        if self.has_nested_loop {
            format!("break {};\n", self.loop_label())
        } else {
            "break;\n".to_owned()
        }
    }

    /// Label of this context's loop, allocated on first use.
    pub fn loop_label(&mut self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let base = self.env.options.label_base_for(self.nested).to_owned();
        let mut label = base.clone();
        let mut idx = 1_u32;
        while self.names.labels.contains(&label) || self.env.host.is_label_taken(&label) {
            label = format!("{base}{idx}");
            idx += 1;
        }
        tracing::trace!(%label, nested = self.nested, "allocated loop label");
        self.names.labels.insert(label.clone());
        self.label = Some(label.clone());
        label
    }

    /// `label:` line for the loop header, empty when no label was needed.
    pub fn label_prefix(&self) -> String {
        match &self.label {
            Some(label) => format!("{label}:\n"),
            None => String::new(),
        }
    }

    /// Decide the fate of the call-site statement.
    pub fn finish(self) -> LowerResult<Replacement> {
        if self.reused_declaration || self.env.site.position == SitePosition::Statement {
            return Ok(Replacement {
                disposition: Disposition::DeleteStatement,
                finisher: None,
            });
        }
        match self.finisher {
            Some(finisher) => Ok(Replacement {
                disposition: Disposition::Replace(self.target),
                finisher: Some(finisher),
            }),
            None => Err(LowerError::internal("pipeline result used but no finisher was produced")),
        }
    }
}

/// `Integer.MIN_VALUE` and friends.
fn limit_constant(class: &str, field: &str) -> Option<i64> {
    match (class, field) {
        ("Integer", "MIN_VALUE") => Some(i64::from(i32::MIN)),
        ("Integer", "MAX_VALUE") => Some(i64::from(i32::MAX)),
        ("Long", "MIN_VALUE") => Some(i64::MIN),
        ("Long", "MAX_VALUE") => Some(i64::MAX),
        _ => None,
    }
}

/// Library supertypes relevant to accumulator declarations.
fn supertypes(raw: &str) -> &'static [&'static str] {
    match raw {
        "java.util.ArrayList" | "java.util.LinkedList" => &["java.util.List", "java.util.Collection"],
        "java.util.List" | "java.util.Set" => &["java.util.Collection"],
        "java.util.HashSet" | "java.util.LinkedHashSet" => &["java.util.Set", "java.util.Collection"],
        "java.util.TreeSet" => &[
            "java.util.NavigableSet",
            "java.util.SortedSet",
            "java.util.Set",
            "java.util.Collection",
        ],
        "java.util.HashMap" | "java.util.LinkedHashMap" => &["java.util.Map"],
        "java.util.TreeMap" => &["java.util.NavigableMap", "java.util.SortedMap", "java.util.Map"],
        _ => &[],
    }
}

/// Whether a site variable of type `site` can hold the accumulator of type
/// `ty`, given that the accumulator is only used through `most_abstract`.
fn is_compatible(site: &JavaType, ty: &JavaType, most_abstract: Option<&str>) -> bool {
    if site == ty {
        return true;
    }
    let (Some(site_raw), Some(raw), Some(limit)) = (site.raw_name(), ty.raw_name(), most_abstract) else {
        return false;
    };
    if site.type_args() != ty.type_args() {
        return false;
    }
    let widens_ty = site_raw == raw || supertypes(raw).contains(&site_raw);
    let within_limit = site_raw == limit || supertypes(site_raw).contains(&limit);
    widens_ty && within_limit
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
