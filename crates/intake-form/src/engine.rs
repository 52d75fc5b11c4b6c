//! Form engine
//!
//! Owns one form session: the flat value dictionary, the last error map, the
//! options cache, and the submit lifecycle.
//!
//! # Submit cycle
//! 1. Claim the form (`Idle` → `Validating`), or fail with
//!    [`SubmitError::InProgress`]
//! 2. Validate a snapshot of the values; on errors return to `Idle` with
//!    [`SubmitOutcome::Invalid`] and never touch the sink
//! 3. Build the nested payload in schema order and hand it to the sink
//! 4. Return to `Idle` whatever the sink did, including when the submit
//!    future is dropped mid-flight
//!
//! Locks are never held across an await point.

use crate::config::FormConfig;
use crate::error::{EngineError, FormError, OptionsError, SubmitError};
use crate::options::{OptionList, OptionsCache, OptionsResolver};
use crate::render::{render_form, select_refs, RenderedForm};
use crate::sink::SubmissionSink;
use crate::status::{validate_transition, FormStatus};
use crate::validation::{FieldErrors, FieldValidator};
use futures::future::try_join_all;
use indexmap::IndexMap;
use intake_schema::{write_path, DataPath, Field, FieldValues, IntakeSchema, OptionsRef, SelectOption};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tokio::sync::watch;

/// Result of a submit attempt that did not fail outright
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Validation failed; the sink was not called
    Invalid(FieldErrors),
    /// Sink accepted this nested payload
    Submitted(Value),
}

impl SubmitOutcome {
    /// True when the sink accepted the payload
    #[inline]
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }

    /// Validation errors, if the attempt was blocked
    #[inline]
    #[must_use]
    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Invalid(errors) => Some(errors),
            Self::Submitted(_) => None,
        }
    }

    /// Submitted payload, if any
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Submitted(payload) => Some(payload),
            Self::Invalid(_) => None,
        }
    }
}

/// Schema-driven form session
pub struct FormEngine<R, S> {
    schema: IntakeSchema,
    /// Parsed path per field id, in schema order
    paths: IndexMap<String, DataPath>,
    config: FormConfig,
    validator: FieldValidator,
    values: RwLock<FieldValues>,
    errors: RwLock<FieldErrors>,
    status: watch::Sender<FormStatus>,
    options: OptionsCache<R>,
    sink: S,
}

impl<R, S> FormEngine<R, S>
where
    R: OptionsResolver,
    S: SubmissionSink,
{
    /// Start a session with default configuration
    ///
    /// # Errors
    /// Returns [`EngineError::Schema`] if the schema fails load-time validation.
    pub fn initialize(
        schema: IntakeSchema,
        initial_values: FieldValues,
        resolver: R,
        sink: S,
    ) -> Result<Self, EngineError> {
        Self::with_config(schema, initial_values, resolver, sink, FormConfig::default())
    }

    /// Start a session
    ///
    /// Initial values for ids that are not in the schema are dropped; fields
    /// with no initial value start unset.
    ///
    /// # Errors
    /// Returns error if the schema fails load-time validation or the
    /// configuration is out of range.
    pub fn with_config(
        schema: IntakeSchema,
        initial_values: FieldValues,
        resolver: R,
        sink: S,
        config: FormConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let paths = schema.data_paths()?;

        let mut values = FieldValues::with_capacity(initial_values.len());
        for (id, value) in initial_values {
            if paths.contains_key(&id) {
                values.insert(id, value);
            } else {
                tracing::debug!("Ignoring initial value for unknown field: {}", id);
            }
        }

        tracing::info!(
            "Initialized form {} ({} fields, {} prefilled)",
            schema.template_id,
            paths.len(),
            values.len()
        );

        let (status, _) = watch::channel(FormStatus::Idle);

        Ok(Self {
            validator: FieldValidator::with_required_message(config.required_message.clone()),
            options: OptionsCache::new(resolver, config.options_cache_capacity),
            schema,
            paths,
            config,
            values: RwLock::new(values),
            errors: RwLock::new(FieldErrors::new()),
            status,
            sink,
        })
    }

    /// Get schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &IntakeSchema {
        &self.schema
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    /// Get submission sink
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get options cache
    #[inline]
    #[must_use]
    pub fn options(&self) -> &OptionsCache<R> {
        &self.options
    }

    /// Set a field's value, replacing any prior value
    ///
    /// No validation runs and the error map is left as is.
    ///
    /// # Errors
    /// Returns [`FormError::UnknownField`] if `field_id` is not in the schema;
    /// the dictionary is unchanged.
    pub fn set_field_value(
        &self,
        field_id: &str,
        value: impl Into<Value>,
    ) -> Result<(), FormError> {
        self.ensure_field(field_id)?;
        self.values.write().insert(field_id.to_string(), value.into());
        Ok(())
    }

    /// Return a field to "never answered"
    ///
    /// # Errors
    /// Returns [`FormError::UnknownField`] if `field_id` is not in the schema.
    pub fn clear_field_value(&self, field_id: &str) -> Result<(), FormError> {
        self.ensure_field(field_id)?;
        self.values.write().shift_remove(field_id);
        Ok(())
    }

    /// Current value of a field; `None` when unset
    #[must_use]
    pub fn value(&self, field_id: &str) -> Option<Value> {
        self.values.read().get(field_id).cloned()
    }

    /// Snapshot of the value dictionary
    #[must_use]
    pub fn values(&self) -> FieldValues {
        self.values.read().clone()
    }

    /// Snapshot of the last error map
    #[must_use]
    pub fn errors(&self) -> FieldErrors {
        self.errors.read().clone()
    }

    /// Current lifecycle status
    #[inline]
    #[must_use]
    pub fn status(&self) -> FormStatus {
        *self.status.borrow()
    }

    /// Watch status changes
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<FormStatus> {
        self.status.subscribe()
    }

    /// Run the validation evaluator and store its result for rendering
    pub fn validate(&self) -> FieldErrors {
        let snapshot = self.values();
        let errors = self.validator.validate(self.schema.fields(), &snapshot);
        self.errors.write().clone_from(&errors);
        errors
    }

    /// Build the nested payload from the current values
    #[must_use]
    pub fn nested_payload(&self) -> Value {
        let snapshot = self.values();
        self.build_payload(&snapshot)
    }

    /// Resolve an options ref through the session cache
    ///
    /// # Errors
    /// Returns the resolver's error, shared by every concurrent waiter.
    pub async fn resolve_options(&self, reference: &str) -> Result<OptionList, Arc<R::Error>> {
        self.options.resolve(reference).await
    }

    /// Options for a field, inline or resolved
    ///
    /// # Errors
    /// Returns error if the field is unknown, declares no options, or its ref
    /// fails to resolve.
    pub async fn field_options(
        &self,
        field_id: &str,
    ) -> Result<OptionList, OptionsError<R::Error>> {
        let field = self.field(field_id)?;
        match &field.options_ref {
            Some(OptionsRef::Inline(items)) => Ok(Arc::new(
                items.iter().map(|item| SelectOption::inline(item)).collect(),
            )),
            Some(OptionsRef::Reference(reference)) => self
                .options
                .resolve(reference)
                .await
                .map_err(OptionsError::Resolution),
            None => Err(FormError::NoOptions(field_id.to_string()).into()),
        }
    }

    /// Render the form
    ///
    /// Every ref used by a select control resolves concurrently first.
    ///
    /// # Errors
    /// Returns the first resolver error.
    pub async fn render(&self) -> Result<RenderedForm, Arc<R::Error>> {
        let refs = select_refs(&self.schema);
        let lists = try_join_all(refs.iter().map(|reference| self.options.resolve(reference))).await?;
        let resolved: HashMap<String, OptionList> = refs
            .into_iter()
            .map(str::to_string)
            .zip(lists)
            .collect();

        Ok(render_form(
            &self.schema,
            &self.values(),
            &self.errors(),
            &resolved,
            &self.config,
            self.status().is_busy(),
        ))
    }

    /// Validate and, if clean, hand the nested payload to the sink
    ///
    /// # Errors
    /// - [`SubmitError::InProgress`] if another submission holds the form
    /// - [`SubmitError::Sink`] carrying the sink's own error unchanged
    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError<S::Error>> {
        let claimed = self.status.send_if_modified(|status| {
            if status.is_busy() {
                false
            } else {
                *status = FormStatus::Validating;
                true
            }
        });
        if !claimed {
            tracing::warn!("Submit rejected: form {} is busy", self.schema.template_id);
            return Err(SubmitError::InProgress);
        }
        let _guard = IdleGuard {
            status: &self.status,
        };

        let snapshot = self.values();
        let errors = self.validator.validate(self.schema.fields(), &snapshot);
        self.errors.write().clone_from(&errors);

        if !errors.is_empty() {
            tracing::info!("Submit blocked: {} field errors", errors.len());
            self.transition(FormStatus::Idle)?;
            return Ok(SubmitOutcome::Invalid(errors));
        }

        self.transition(FormStatus::Submitting)?;
        let payload = self.build_payload(&snapshot);
        tracing::info!("Submitting form {}", self.schema.template_id);

        match self.sink.submit(payload.clone()).await {
            Ok(()) => {
                tracing::info!("Submission settled: form {}", self.schema.template_id);
                Ok(SubmitOutcome::Submitted(payload))
            }
            Err(e) => {
                tracing::warn!("Submission failed: {}", e);
                Err(SubmitError::Sink(e))
            }
        }
    }

    fn field(&self, field_id: &str) -> Result<&Field, FormError> {
        self.schema
            .field(field_id)
            .ok_or_else(|| FormError::UnknownField(field_id.to_string()))
    }

    fn ensure_field(&self, field_id: &str) -> Result<(), FormError> {
        if self.paths.contains_key(field_id) {
            Ok(())
        } else {
            Err(FormError::UnknownField(field_id.to_string()))
        }
    }

    fn transition(&self, to: FormStatus) -> Result<(), SubmitError<S::Error>> {
        let from = self.status();
        validate_transition(from, to)?;
        tracing::debug!("Form status: {:?} -> {:?}", from, to);
        self.status.send_replace(to);
        Ok(())
    }

    /// Fields in schema order; unset values are skipped
    fn build_payload(&self, values: &FieldValues) -> Value {
        let mut payload = Value::Object(Map::new());
        for (id, path) in &self.paths {
            if let Some(value) = values.get(id) {
                write_path(&mut payload, path, value.clone());
            }
        }
        payload
    }
}

impl<R, S> Debug for FormEngine<R, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormEngine")
            .field("template_id", &self.schema.template_id)
            .field("fields", &self.paths.len())
            .field("status", &*self.status.borrow())
            .field("values", &*self.values.read())
            .field("errors", &*self.errors.read())
            .finish_non_exhaustive()
    }
}

/// Returns the form to `Idle` on every exit from `submit`
struct IdleGuard<'a> {
    status: &'a watch::Sender<FormStatus>,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.status.send_if_modified(|status| {
            if status.is_busy() {
                *status = FormStatus::Idle;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StaticOptionsResolver;
    use async_trait::async_trait;
    use intake_schema::{FieldType, Step, UiControl, Validations};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct MemorySink {
        payloads: Mutex<Vec<Value>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("never fails")]
    struct Never;

    #[async_trait]
    impl SubmissionSink for MemorySink {
        type Error = Never;

        async fn submit(&self, payload: Value) -> Result<(), Self::Error> {
            self.payloads.lock().push(payload);
            Ok(())
        }
    }

    fn schema() -> IntakeSchema {
        IntakeSchema {
            program_code: "EE_FSW".into(),
            plan_code: None,
            template_id: "tpl1".into(),
            label: "Personal".into(),
            steps: vec![Step {
                id: "personal".into(),
                label: "Personal".into(),
                fields: vec![
                    Field::new("first_name", "First name", "profile.personal.first_name", FieldType::String)
                        .required(),
                    Field::new("age", "Age", "profile.personal.age", FieldType::Number)
                        .with_control(UiControl::Number)
                        .with_validations(Validations {
                            min: Some(1.0),
                            ..Validations::default()
                        }),
                    Field::new("citizenship", "Citizenship", "citizenship", FieldType::Enum)
                        .with_control(UiControl::Select)
                        .with_options(OptionsRef::Inline(vec!["CANADA".into()])),
                ],
            }],
        }
    }

    fn engine(initial: FieldValues) -> FormEngine<StaticOptionsResolver, MemorySink> {
        FormEngine::initialize(schema(), initial, StaticOptionsResolver::new(), MemorySink::default())
            .unwrap()
    }

    #[test]
    fn initialize_drops_unknown_keys() {
        let initial: FieldValues = [
            ("age".to_string(), json!(30)),
            ("not_a_field".to_string(), json!("x")),
        ]
        .into_iter()
        .collect();

        let engine = engine(initial);
        assert_eq!(engine.value("age"), Some(json!(30)));
        assert_eq!(engine.value("not_a_field"), None);
        assert_eq!(engine.value("first_name"), None);
        assert_eq!(engine.status(), FormStatus::Idle);
    }

    #[test]
    fn initialize_rejects_zero_cache_capacity() {
        let result = FormEngine::with_config(
            schema(),
            FieldValues::new(),
            StaticOptionsResolver::new(),
            MemorySink::default(),
            FormConfig::default().with_options_cache_capacity(0),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn set_field_value_overwrites_and_rejects_unknown_ids() {
        let engine = engine(FieldValues::new());
        engine.set_field_value("age", 20).unwrap();
        engine.set_field_value("age", 21).unwrap();
        assert_eq!(engine.value("age"), Some(json!(21)));

        assert_eq!(
            engine.set_field_value("ghost", "x"),
            Err(FormError::UnknownField("ghost".to_string()))
        );
        assert_eq!(engine.values().len(), 1);
    }

    #[test]
    fn set_field_value_does_not_validate() {
        let engine = engine(FieldValues::new());
        engine.set_field_value("age", 0).unwrap();
        assert!(engine.errors().is_empty());

        let errors = engine.validate();
        assert_eq!(errors["age"], "Minimum value is 1");
        assert_eq!(engine.errors(), errors);
    }

    #[test]
    fn clear_field_value_unsets() {
        let engine = engine(FieldValues::new());
        engine.set_field_value("age", 30).unwrap();
        engine.clear_field_value("age").unwrap();
        assert_eq!(engine.value("age"), None);
        assert_eq!(engine.nested_payload(), json!({}));
    }

    #[test]
    fn nested_payload_strips_profile_prefix() {
        let engine = engine(FieldValues::new());
        engine.set_field_value("first_name", "Alice").unwrap();
        engine.set_field_value("citizenship", "CANADA").unwrap();
        assert_eq!(
            engine.nested_payload(),
            json!({"personal": {"first_name": "Alice"}, "citizenship": "CANADA"})
        );
    }

    #[tokio::test]
    async fn submit_invalid_returns_errors_without_calling_sink() {
        let engine = engine(FieldValues::new());

        let outcome = engine.submit().await.unwrap();

        assert_eq!(
            outcome.errors().map(|e| e["first_name"].as_str()),
            Some("This field is required.")
        );
        assert!(engine.sink().payloads.lock().is_empty());
        assert_eq!(engine.status(), FormStatus::Idle);
    }

    #[tokio::test]
    async fn submit_valid_hands_payload_to_sink() {
        let engine = engine(FieldValues::new());
        engine.set_field_value("first_name", "Alice").unwrap();
        engine.set_field_value("age", 30).unwrap();

        let outcome = engine.submit().await.unwrap();

        let expected = json!({"personal": {"first_name": "Alice", "age": 30}});
        assert_eq!(outcome.payload(), Some(&expected));
        assert_eq!(*engine.sink().payloads.lock(), vec![expected]);
        assert_eq!(engine.status(), FormStatus::Idle);
        assert!(engine.errors().is_empty());
    }

    #[tokio::test]
    async fn status_changes_are_published() {
        let engine = engine(FieldValues::new());
        let mut rx = engine.subscribe_status();
        engine.set_field_value("first_name", "Alice").unwrap();

        engine.submit().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), FormStatus::Idle);
    }

    #[tokio::test]
    async fn field_options_inline_and_missing() {
        let engine = engine(FieldValues::new());

        let options = engine.field_options("citizenship").await.unwrap();
        assert_eq!(*options, vec![SelectOption::inline("CANADA")]);

        let err = engine.field_options("age").await.unwrap_err();
        assert!(matches!(err, OptionsError::Form(FormError::NoOptions(_))));

        let err = engine.field_options("ghost").await.unwrap_err();
        assert!(matches!(err, OptionsError::Form(FormError::UnknownField(_))));
    }

    #[tokio::test]
    async fn render_reflects_values_and_errors() {
        let engine = engine(FieldValues::new());
        engine.set_field_value("age", 30).unwrap();
        engine.validate();

        let form = engine.render().await.unwrap();

        assert_eq!(form.step_index.len(), 1);
        assert_eq!(
            form.field("first_name").and_then(|f| f.error.as_deref()),
            Some("This field is required.")
        );
        assert_eq!(form.submit_label, "Save intake");
        assert!(!form.submitting);
    }

    #[test]
    fn debug_shows_status() {
        let engine = engine(FieldValues::new());
        let debug = format!("{engine:?}");
        assert!(debug.contains("FormEngine"));
        assert!(debug.contains("Idle"));
    }
}
