//! Testing utilities for the intake workspace
//!
//! Shared schema fixtures and scripted collaborators (options resolvers and
//! submission sinks) for engine tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use intake_form::{FormEngine, OptionsResolver, SubmissionSink};
use intake_schema::{FieldValues, IntakeSchema, SelectOption};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// Required `first_name` and optional `age` (`min: 1`) under `profile.personal`
pub fn personal_schema() -> IntakeSchema {
    IntakeSchema::from_value(json!({
        "program_code": "EE_FSW",
        "plan_code": null,
        "template_id": "personal",
        "label": "Personal details",
        "steps": [{
            "id": "personal",
            "label": "Personal",
            "fields": [
                {
                    "id": "first_name",
                    "label": "First name",
                    "data_path": "profile.personal.first_name",
                    "type": "string",
                    "ui_control": "text",
                    "required": true
                },
                {
                    "id": "age",
                    "label": "Age",
                    "data_path": "profile.personal.age",
                    "type": "number",
                    "ui_control": "number",
                    "validations": { "min": 1 }
                }
            ]
        }]
    }))
    .unwrap()
}

/// Two steps covering every control kind
pub fn two_step_schema() -> IntakeSchema {
    IntakeSchema::from_value(json!({
        "program_code": "EE_FSW",
        "plan_code": null,
        "template_id": "tpl1",
        "label": "Test Template",
        "steps": [
            {
                "id": "step1",
                "label": "Step One",
                "fields": [
                    { "id": "person.first_name", "label": "First Name", "data_path": "profile.personal.first_name", "type": "string", "ui_control": "text", "required": true },
                    { "id": "person.age", "label": "Age", "data_path": "profile.personal.age", "type": "number", "ui_control": "number", "validations": { "min": 1 } },
                    { "id": "person.birth_date", "label": "Birth Date", "data_path": "profile.personal.dob", "type": "date", "ui_control": "date" }
                ]
            },
            {
                "id": "step2",
                "label": "Step Two",
                "fields": [
                    { "id": "person.citizenship", "label": "Citizenship", "data_path": "profile.personal.citizenship", "type": "enum", "ui_control": "select", "options_ref": ["CANADA", "INDIA"], "required": true },
                    { "id": "person.is_married", "label": "Married", "data_path": "profile.personal.married", "type": "boolean", "ui_control": "checkbox" }
                ]
            }
        ]
    }))
    .unwrap()
}

/// One select field at `profile.citizenship`
pub fn citizenship_schema() -> IntakeSchema {
    IntakeSchema::from_value(json!({
        "program_code": "EE_FSW",
        "template_id": "citizenship",
        "label": "Citizenship",
        "steps": [{
            "id": "status",
            "label": "Status",
            "fields": [{
                "id": "citizenship",
                "label": "Citizenship",
                "data_path": "profile.citizenship",
                "type": "enum",
                "ui_control": "select",
                "options_ref": ["CANADA", "INDIA"]
            }]
        }]
    }))
    .unwrap()
}

/// Applicant and spouse selects sharing the `marital_status` ref
pub fn shared_ref_schema() -> IntakeSchema {
    IntakeSchema::from_value(json!({
        "program_code": "EE_FSW",
        "template_id": "family",
        "label": "Family",
        "steps": [{
            "id": "family",
            "label": "Family",
            "fields": [
                {
                    "id": "applicant.marital_status",
                    "label": "Your marital status",
                    "data_path": "profile.personal.marital_status",
                    "type": "enum",
                    "ui_control": "select",
                    "options_ref": "marital_status"
                },
                {
                    "id": "spouse.marital_status",
                    "label": "Spouse marital status",
                    "data_path": "profile.spouse.marital_status",
                    "type": "enum",
                    "ui_control": "select",
                    "options_ref": "marital_status"
                }
            ]
        }]
    }))
    .unwrap()
}

/// Options behind the `marital_status` ref
pub fn marital_status_options() -> Vec<SelectOption> {
    vec![SelectOption::new("single", "Single")]
}

/// Flat values from `(id, value)` pairs
pub fn values(pairs: &[(&str, Value)]) -> FieldValues {
    pairs
        .iter()
        .map(|(id, value)| ((*id).to_string(), value.clone()))
        .collect()
}

/// Engine over `schema` with a counting resolver and a recording sink
pub fn setup_engine(
    schema: IntakeSchema,
    initial: FieldValues,
) -> FormEngine<CountingResolver, RecordingSink> {
    FormEngine::initialize(
        schema,
        initial,
        CountingResolver::new().with("marital_status", marital_status_options()),
        RecordingSink::new(),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Options resolvers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("options ref not found: {0}")]
pub struct RefNotFound(pub String);

/// Resolver that counts calls and can be slowed down
#[derive(Debug, Default)]
pub struct CountingResolver {
    table: HashMap<String, Vec<SelectOption>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(20),
            ..Self::default()
        }
    }

    pub fn with(mut self, reference: &str, options: Vec<SelectOption>) -> Self {
        self.table.insert(reference.to_string(), options);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Resolutions started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OptionsResolver for CountingResolver {
    type Error = RefNotFound;

    async fn resolve(&self, reference: &str) -> Result<Vec<SelectOption>, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.table
            .get(reference)
            .cloned()
            .ok_or_else(|| RefNotFound(reference.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Submission sinks
// ---------------------------------------------------------------------------

/// Sink that records every payload; clones share the record
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    payloads: Arc<Mutex<Vec<Value>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.payloads.lock().len()
    }
}

#[async_trait]
impl SubmissionSink for RecordingSink {
    type Error = Infallible;

    async fn submit(&self, payload: Value) -> Result<(), Self::Error> {
        self.payloads.lock().push(payload);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("persistence failed: {0}")]
pub struct PersistenceFailed(pub String);

/// Sink that always fails with the given reason
#[derive(Debug, Clone)]
pub struct FailingSink {
    reason: String,
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionSink for FailingSink {
    type Error = PersistenceFailed;

    async fn submit(&self, _payload: Value) -> Result<(), Self::Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PersistenceFailed(self.reason.clone()))
    }
}

/// Sink that parks each submission until released
///
/// `entered()` resolves once a submission reaches the sink; `release()` lets
/// it complete. A submission that is never released stays pending.
#[derive(Debug, Clone, Default)]
pub struct GatedSink {
    entered: Arc<Notify>,
    gate: Arc<Notify>,
    recorded: RecordingSink,
}

impl GatedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a submission is parked in the sink
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked submission complete
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.recorded.payloads()
    }
}

#[async_trait]
impl SubmissionSink for GatedSink {
    type Error = Infallible;

    async fn submit(&self, payload: Value) -> Result<(), Self::Error> {
        self.entered.notify_one();
        self.gate.notified().await;
        self.recorded.submit(payload).await
    }
}
