//! Deferred conditional results.
//!
//! Terminals such as `findFirst` or `max` produce a value that depends on
//! whether the loop saw an element. The result is kept as a
//! [`ConditionalExpression`] until the context decides how to materialize
//! it. When the call site immediately consumes the result (`.isPresent()`,
//! `.orElse(x)`, `!`), the conditional is unwrapped into a simpler form and
//! the consuming expression is replaced as a whole.

use loopify_ir::JavaType;

/// A value chosen by a runtime condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionalExpression {
    /// `condition ? true_text : false_text`
    Plain {
        ty: JavaType,
        condition: String,
        true_text: String,
        false_text: String,
    },
    /// `condition`, or its negation when `invert` is set.
    Boolean { condition: String, invert: bool },
    /// `condition ? Optional.of(present) : Optional.empty()`, where `ty` is
    /// the element type.
    Optional {
        ty: JavaType,
        condition: String,
        present: String,
    },
}

/// Immediate use of a conditional result at the call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unwrap {
    IsPresent,
    IsEmpty,
    /// `.orElse(..)` with the rendered fallback.
    OrElse(String),
    Negated,
}

impl ConditionalExpression {
    /// Type of the materialized value.
    pub fn ty(&self) -> JavaType {
        match self {
            ConditionalExpression::Plain { ty, .. } => ty.clone(),
            ConditionalExpression::Boolean { .. } => JavaType::BOOLEAN,
            ConditionalExpression::Optional { ty, .. } => JavaType::optional_of(ty),
        }
    }

    pub fn condition(&self) -> &str {
        match self {
            ConditionalExpression::Plain { condition, .. }
            | ConditionalExpression::Boolean { condition, .. }
            | ConditionalExpression::Optional { condition, .. } => condition,
        }
    }

    pub fn true_branch(&self) -> String {
        match self {
            ConditionalExpression::Plain { true_text, .. } => true_text.clone(),
            ConditionalExpression::Boolean { invert, .. } => (!invert).to_string(),
            ConditionalExpression::Optional { present, .. } => {
                format!("{}.of({present})", self.optional_class())
            }
        }
    }

    pub fn false_branch(&self) -> String {
        match self {
            ConditionalExpression::Plain { false_text, .. } => false_text.clone(),
            ConditionalExpression::Boolean { invert, .. } => invert.to_string(),
            ConditionalExpression::Optional { .. } => format!("{}.empty()", self.optional_class()),
        }
    }

    /// The whole value as one expression.
    pub fn as_expression(&self) -> String {
        match self {
            ConditionalExpression::Boolean { condition, invert } => {
                if *invert {
                    negate_text(condition)
                } else {
                    condition.clone()
                }
            }
            _ => format!(
                "{} ? {} : {}",
                self.condition(),
                self.true_branch(),
                self.false_branch()
            ),
        }
    }

    /// Fold an immediate use into this conditional, if the shapes fit.
    pub fn unwrap(&self, how: &Unwrap) -> Option<ConditionalExpression> {
        match (self, how) {
            (ConditionalExpression::Optional { condition, .. }, Unwrap::IsPresent) => {
                Some(ConditionalExpression::Boolean {
                    condition: condition.clone(),
                    invert: false,
                })
            }
            (ConditionalExpression::Optional { condition, .. }, Unwrap::IsEmpty) => {
                Some(ConditionalExpression::Boolean {
                    condition: condition.clone(),
                    invert: true,
                })
            }
            (
                ConditionalExpression::Optional {
                    ty,
                    condition,
                    present,
                },
                Unwrap::OrElse(fallback),
            ) => Some(ConditionalExpression::Plain {
                ty: ty.clone(),
                condition: condition.clone(),
                true_text: present.clone(),
                false_text: fallback.clone(),
            }),
            (ConditionalExpression::Boolean { condition, invert }, Unwrap::Negated) => {
                Some(ConditionalExpression::Boolean {
                    condition: condition.clone(),
                    invert: !invert,
                })
            }
            _ => None,
        }
    }

    fn optional_class(&self) -> String {
        match self.ty().raw_name() {
            Some(name) => name.to_owned(),
            None => "java.util.Optional".to_owned(),
        }
    }
}

/// `!cond`, parenthesized unless `cond` is a plain name.
fn negate_text(condition: &str) -> String {
    let simple = condition
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if simple {
        format!("!{condition}")
    } else {
        format!("!({condition})")
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
