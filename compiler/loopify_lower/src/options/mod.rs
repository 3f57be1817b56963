//! Lowering options.

/// Knobs for one lowering run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    /// Lower chains whose source is an arbitrary stream expression by
    /// iterating it explicitly. Off by default: the result is rarely nicer
    /// than the original pipeline.
    pub allow_opaque_sources: bool,
    /// Label base for the outermost loop.
    pub label_base: String,
    /// Label base for loops generated by nested (`flatMap`) pipelines.
    pub nested_label_base: String,
}

impl Default for LowerOptions {
    fn default() -> Self {
        LowerOptions {
            allow_opaque_sources: false,
            label_base: "outer".to_owned(),
            nested_label_base: "inner".to_owned(),
        }
    }
}

impl LowerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_opaque_sources(mut self, allow: bool) -> Self {
        self.allow_opaque_sources = allow;
        self
    }

    #[must_use]
    pub fn with_label_base(mut self, base: impl Into<String>) -> Self {
        self.label_base = base.into();
        self
    }

    #[must_use]
    pub fn with_nested_label_base(mut self, base: impl Into<String>) -> Self {
        self.nested_label_base = base.into();
        self
    }

    /// Label base for a context at the given nesting.
    pub(crate) fn label_base_for(&self, nested: bool) -> &str {
        if nested {
            &self.nested_label_base
        } else {
            &self.label_base
        }
    }
}

#[cfg(test)]
mod tests;
