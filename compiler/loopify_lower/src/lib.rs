//! Loopify Lower - stream pipelines to imperative loops
//!
//! Takes a resolved call chain such as
//! `list.stream().filter(x -> x > 0).map(x -> x * 2).collect(toList())` and
//! produces the equivalent statements: a loop, its guards and the
//! accumulator variables, plus the expression (if any) that replaces the
//! call site.
//!
//! # Architecture
//!
//! 1. **Extract** ([`extract`]): the chain becomes a list of operation
//!    records (source, intermediates, terminal) sharing variable slots
//! 2. **Generate** ([`generate`]): slots are named, then each stage wraps
//!    the code of the stages after it, innermost first
//! 3. **Apply** ([`apply`]): the result is handed to the host's
//!    [`Synthesizer`]
//!
//! # Modules
//!
//! - [`function`]: stage arguments (lambdas, method references, templates)
//! - [`slot`]: the variables carrying elements between stages
//! - [`operation`]: sources, intermediates, terminals and collectors
//! - [`context`]: naming, hoisted declarations, labels and the result
//! - [`conditional`]: results that depend on whether an element was seen
//! - [`emit`]: re-indentation of generated text

pub mod conditional;
pub mod context;
pub mod emit;
pub mod error;
pub mod extract;
pub mod function;
pub mod generate;
pub mod host;
pub mod operation;
pub mod options;
pub mod slot;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use conditional::ConditionalExpression;
pub use context::{Disposition, ReplacementContext};
pub use emit::{format_block, Emitter, StringEmitter};
pub use error::{LowerError, LowerResult};
pub use extract::{extract, Pipeline};
pub use function::{BoundCallable, Callable};
pub use generate::{apply, generate, lower, Applied, Lowered};
pub use host::{CallSite, Host, NameScope, ReplaceTarget, ResultUse, SitePosition, Synthesizer};
pub use operation::{Operation, OperationRecord};
pub use options::LowerOptions;
pub use slot::{BoundSlot, SlotId, UnboundSlot};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset; safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
