//! Host-facing seams.
//!
//! The engine never touches the host's syntax tree. It asks a [`Host`] about
//! names visible at the call site, reads a [`CallSite`] describing where the
//! pipeline sits, and hands generated text to a [`Synthesizer`].

use rustc_hash::FxHashSet;

use loopify_ir::{names, ExprArena, ExprId, JavaType};

/// Name oracle and naming heuristics of the surrounding program.
pub trait Host {
    /// Whether `name` resolves to something visible at the call site.
    fn is_name_taken(&self, name: &str) -> bool;

    /// Whether `label` is already used by an enclosing labelled statement.
    fn is_label_taken(&self, _label: &str) -> bool {
        false
    }

    /// Ranked name candidates for the value of `expr`.
    fn suggest_names_for_expr(&self, arena: &ExprArena, expr: ExprId) -> Vec<String> {
        names::suggest_for_expr(arena, expr)
    }

    /// Ranked name candidates for a variable of type `ty`.
    fn suggest_names_for_type(&self, ty: &JavaType) -> Vec<String> {
        names::suggest_for_type(ty)
    }
}

/// A `Host` backed by explicit sets of visible names and labels.
#[derive(Clone, Debug, Default)]
pub struct NameScope {
    names: FxHashSet<String>,
    labels: FxHashSet<String>,
}

impl NameScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameScope {
            names: names.into_iter().map(Into::into).collect(),
            labels: FxHashSet::default(),
        }
    }

    pub fn add_name(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn add_label(&mut self, label: impl Into<String>) {
        self.labels.insert(label.into());
    }
}

impl Host for NameScope {
    fn is_name_taken(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn is_label_taken(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

// Call site

/// Statement that contains the pipeline (together with its result use).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SitePosition {
    /// `pipeline;`
    Statement,
    /// `[final] T name = pipeline;`
    Initializer {
        name: String,
        ty: JavaType,
        is_final: bool,
    },
    /// `return pipeline;`
    Return,
    /// Any other expression position.
    Expression,
}

/// What the code around the call site does with the pipeline's result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultUse {
    /// The result is used as is.
    Direct,
    /// `pipeline.isPresent()`
    IsPresent,
    /// `pipeline.isEmpty()`
    IsEmpty,
    /// `pipeline.orElse(value)`
    OrElse(ExprId),
    /// `pipeline.orElseGet(supplier)`
    OrElseGet(ExprId),
    /// `!pipeline`
    Negated,
}

/// Description of where the pipeline sits in the host program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    pub position: SitePosition,
    pub result_use: ResultUse,
}

impl CallSite {
    pub fn statement() -> Self {
        Self::at(SitePosition::Statement)
    }

    pub fn initializer(name: impl Into<String>, ty: JavaType, is_final: bool) -> Self {
        Self::at(SitePosition::Initializer {
            name: name.into(),
            ty,
            is_final,
        })
    }

    pub fn returned() -> Self {
        Self::at(SitePosition::Return)
    }

    pub fn expression() -> Self {
        Self::at(SitePosition::Expression)
    }

    fn at(position: SitePosition) -> Self {
        CallSite {
            position,
            result_use: ResultUse::Direct,
        }
    }

    #[must_use]
    pub fn with_use(mut self, result_use: ResultUse) -> Self {
        self.result_use = result_use;
        self
    }
}

// Synthesis

/// Which expression the finisher replaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReplaceTarget {
    /// The pipeline call itself.
    Pipeline,
    /// The expression that uses the pipeline's result (`.isPresent()` and
    /// friends), after the use was folded into the generated code.
    ResultUse,
}

/// Host service that turns generated text into program edits.
///
/// Each method returns the node it created so the host can continue working
/// with it (comment reattachment, reformatting).
pub trait Synthesizer {
    type Node;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert statements before the statement containing the call site.
    fn insert_before(&mut self, text: &str) -> Result<Self::Node, Self::Error>;

    /// Replace `target` with the expression `text`.
    fn replace_expression(&mut self, target: ReplaceTarget, text: &str) -> Result<Self::Node, Self::Error>;

    /// Remove the statement containing the call site.
    fn delete_statement(&mut self) -> Result<(), Self::Error>;
}
