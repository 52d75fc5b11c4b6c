//! Intake Form - schema-driven form engine
//!
//! Runs one intake form session on top of an [`IntakeSchema`](intake_schema::IntakeSchema):
//! - Tracks the flat field-value dictionary and the last error map
//! - Validates fields (required, length, range) with one error slot per field
//! - Resolves option refs through a memoizing, coalescing cache
//! - Builds the nested payload from data paths and hands it to a sink
//! - Produces a closed-control rendering model
//!
//! # Example
//!
//! ```rust,ignore
//! use intake_form::prelude::*;
//!
//! # async fn example(schema: IntakeSchema, sink: impl SubmissionSink) -> anyhow::Result<()> {
//! let engine = FormEngine::initialize(schema, FieldValues::new(), StaticOptionsResolver::new(), sink)?;
//! engine.set_field_value("first_name", "Alice")?;
//!
//! match engine.submit().await? {
//!     SubmitOutcome::Submitted(payload) => println!("saved {payload}"),
//!     SubmitOutcome::Invalid(errors) => println!("{} fields need attention", errors.len()),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod options;
pub mod render;
pub mod sink;
pub mod status;
pub mod validation;

// Re-exports for convenience
pub use config::FormConfig;
pub use engine::{FormEngine, SubmitOutcome};
pub use error::{ConfigError, EngineError, FormError, OptionsError, SubmitError, TransitionError};
pub use options::{OptionList, OptionsCache, OptionsResolver, StaticOptionsResolver, UnknownOptionsRef};
pub use render::{Control, RenderedField, RenderedForm, RenderedStep, StepIndexEntry};
pub use sink::SubmissionSink;
pub use status::{allowed_transitions, validate_transition, FormStatus};
pub use validation::{FieldErrors, FieldValidator, REQUIRED_MESSAGE};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a form session
    pub use crate::{
        FieldErrors, FormConfig, FormEngine, FormStatus, OptionsResolver, RenderedForm,
        StaticOptionsResolver, SubmissionSink, SubmitError, SubmitOutcome,
    };
    pub use intake_schema::{FieldValues, IntakeSchema, SelectOption};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
