//! Per-field validation
//!
//! Applies each field's rule set to the current value dictionary and produces
//! a fresh error map. Rule order per field:
//!
//! 1. `required`: a blank value (unset, `null`, `""`) fails and skips the rest
//! 2. `min_length` / `max_length`: only for text values
//! 3. `min` / `max`: only when the value reads as a number
//!
//! A field has a single error slot, so a later failing rule replaces an
//! earlier message. Every field is evaluated; one failure never hides another
//! field's error.

use indexmap::IndexMap;
use intake_schema::{Field, FieldValues, Validations};
use serde_json::Value;

/// Flat mapping from field id to its validation message
///
/// A missing key means the field has no error.
pub type FieldErrors = IndexMap<String, String>;

/// Default message for a blank required field
pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// Field rule evaluator
#[derive(Debug, Clone)]
pub struct FieldValidator {
    required_message: String,
}

impl FieldValidator {
    /// Create validator with the default required message
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_required_message(REQUIRED_MESSAGE)
    }

    /// Create validator with a custom required message
    #[inline]
    #[must_use]
    pub fn with_required_message(message: impl Into<String>) -> Self {
        Self {
            required_message: message.into(),
        }
    }

    /// Validate every field against `values`
    ///
    /// # Returns
    /// A new error map in field order; empty when everything passes.
    pub fn validate<'a>(
        &self,
        fields: impl IntoIterator<Item = &'a Field>,
        values: &FieldValues,
    ) -> FieldErrors {
        fields
            .into_iter()
            .filter_map(|field| {
                self.validate_field(field, values.get(&field.id))
                    .map(|message| (field.id.clone(), message))
            })
            .collect()
    }

    /// Validate one field's current value (`None` = never answered)
    #[must_use]
    pub fn validate_field(&self, field: &Field, value: Option<&Value>) -> Option<String> {
        if field.required && is_blank(value) {
            return Some(self.required_message.clone());
        }

        let rules = &field.validations;
        let mut error = None;

        if let Some(text) = value.and_then(Value::as_str) {
            if let Some(message) = check_length(rules, text) {
                error = Some(message);
            }
        }

        if let Some(number) = value.and_then(as_number) {
            if let Some(message) = check_range(rules, number) {
                error = Some(message);
            }
        }

        error
    }
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Unset, `null`, or empty string
#[inline]
#[must_use]
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Numeric reading of a value, if a comparison against a bound is meaningful
///
/// Numbers are used as-is; text is parsed after trimming (inputs arrive as
/// text). Blank text, booleans, and containers do not compare.
#[must_use]
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

fn check_length(rules: &Validations, text: &str) -> Option<String> {
    let len = text.chars().count();
    let mut error = None;

    if let Some(min) = rules.min_length.filter(|n| *n > 0) {
        if len < min {
            error = Some(format!("Minimum length is {min}"));
        }
    }
    if let Some(max) = rules.max_length.filter(|n| *n > 0) {
        if len > max {
            error = Some(format!("Maximum length is {max}"));
        }
    }

    error
}

fn check_range(rules: &Validations, number: f64) -> Option<String> {
    let mut error = None;

    if let Some(min) = rules.min {
        if number < min {
            error = Some(format!("Minimum value is {min}"));
        }
    }
    if let Some(max) = rules.max {
        if number > max {
            error = Some(format!("Maximum value is {max}"));
        }
    }

    error
}
