//! Error types for the form engine
//!
//! Validation failures are not errors: they come back as
//! [`SubmitOutcome::Invalid`](crate::SubmitOutcome::Invalid). The types here
//! cover caller mistakes, configuration problems, and failures of the
//! injected collaborators, which are carried unchanged.

use crate::status::FormStatus;
use intake_schema::SchemaError;
use std::sync::Arc;

/// Errors constructing a [`FormEngine`](crate::FormEngine)
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Schema failed load-time validation
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration value out of range
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Caller errors against a running form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// Field id is not part of the schema
    #[error("unknown field id: '{0}'")]
    UnknownField(String),

    /// Field declares no options source
    #[error("field '{0}' has no options")]
    NoOptions(String),
}

/// Illegal status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal form status transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    /// Status before the attempted change
    pub from: FormStatus,
    /// Requested status
    pub to: FormStatus,
}

/// Errors from [`FormEngine::submit`](crate::FormEngine::submit)
#[derive(Debug, thiserror::Error)]
pub enum SubmitError<E>
where
    E: std::error::Error + 'static,
{
    /// Another submission is validating or in flight
    #[error("a submission is already in progress")]
    InProgress,

    /// Engine status table rejected a change
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Persistence callback failed; carried unchanged
    #[error("submission sink failed: {0}")]
    Sink(#[source] E),
}

impl<E> SubmitError<E>
where
    E: std::error::Error + 'static,
{
    /// Sink error, if the callback itself failed
    #[inline]
    #[must_use]
    pub fn sink_error(&self) -> Option<&E> {
        match self {
            Self::Sink(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors from resolving a field's options
#[derive(Debug, thiserror::Error)]
pub enum OptionsError<E>
where
    E: std::error::Error + 'static,
{
    /// Field lookup failed
    #[error(transparent)]
    Form(#[from] FormError),

    /// Resolver failed; shared by every caller that awaited the same ref
    #[error("options resolution failed: {0}")]
    Resolution(#[source] Arc<E>),
}

/// Configuration load errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Not valid TOML or wrong shape
    #[error("invalid form config TOML: {0}")]
    InvalidToml(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid form config value: {0}")]
    InvalidValue(String),
}
