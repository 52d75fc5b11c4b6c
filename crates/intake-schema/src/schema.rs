//! Intake schema model
//!
//! An [`IntakeSchema`] is an ordered list of [`Step`]s, each an ordered list of
//! [`Field`]s. Schemas are produced by an external configuration service and
//! are immutable for the lifetime of one form session.

use crate::path::{DataPath, PathError};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Declarative description of one intake form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSchema {
    /// Immigration program this schema collects data for
    pub program_code: String,
    /// Optional plan within the program
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_code: Option<String>,
    /// Template the schema was resolved from
    pub template_id: String,
    /// Display label
    pub label: String,
    /// Ordered steps; order is rendering order
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<Step>,
}

impl IntakeSchema {
    /// Parse and validate a schema from JSON
    ///
    /// # Errors
    /// Returns error if JSON is invalid or the schema fails [`Self::validate`]
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Parse and validate a schema from YAML
    ///
    /// # Errors
    /// Returns error if YAML is invalid or the schema fails [`Self::validate`]
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_yaml::from_str(yaml)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Parse and validate a schema from an already-decoded JSON value
    ///
    /// # Errors
    /// Returns error if the value does not match the schema shape or fails validation
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_value(value)?;
        schema.validate()?;
        Ok(schema)
    }

    /// All fields in schema order (step order, then field order)
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.steps.iter().flat_map(|step| step.fields.iter())
    }

    /// Look up a field by id
    #[must_use]
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields().find(|field| field.id == id)
    }

    /// Number of fields across all steps
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.steps.iter().map(|step| step.fields.len()).sum()
    }

    /// Check configuration invariants that would otherwise corrupt submissions
    ///
    /// # Errors
    /// See [`Self::data_paths`]
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.data_paths().map(|_| ())
    }

    /// Parse every field's data path, keyed by field id in schema order
    ///
    /// Two fields may target sibling slots, but never the same slot and never
    /// one slot nested under another.
    ///
    /// # Errors
    /// - [`SchemaError::EmptyFieldId`] for a blank id
    /// - [`SchemaError::DuplicateFieldId`] when an id repeats across steps
    /// - [`SchemaError::InvalidDataPath`] when a path does not parse
    /// - [`SchemaError::DuplicateDataPath`] / [`SchemaError::OverlappingDataPaths`]
    ///   when two fields would write into the same slot
    ///
    /// # Performance
    /// O(n²) in the number of fields; schemas hold tens of fields.
    pub fn data_paths(&self) -> Result<IndexMap<String, DataPath>, SchemaError> {
        let mut seen_ids = HashSet::new();
        let mut paths: IndexMap<String, DataPath> = IndexMap::with_capacity(self.field_count());

        for step in &self.steps {
            for field in &step.fields {
                if field.id.trim().is_empty() {
                    return Err(SchemaError::EmptyFieldId {
                        step_id: step.id.clone(),
                    });
                }
                if !seen_ids.insert(field.id.as_str()) {
                    return Err(SchemaError::DuplicateFieldId(field.id.clone()));
                }

                let path = DataPath::parse(&field.data_path).map_err(|source| {
                    SchemaError::InvalidDataPath {
                        field_id: field.id.clone(),
                        source,
                    }
                })?;

                for (other_id, other) in &paths {
                    if *other == path {
                        return Err(SchemaError::DuplicateDataPath {
                            first: other_id.clone(),
                            second: field.id.clone(),
                            path: path.to_string(),
                        });
                    }
                    if other.overlaps(&path) {
                        let (outer, inner) = if other.is_prefix_of(&path) {
                            (other_id.clone(), field.id.clone())
                        } else {
                            (field.id.clone(), other_id.clone())
                        };
                        return Err(SchemaError::OverlappingDataPaths { outer, inner });
                    }
                }

                paths.insert(field.id.clone(), path);
            }
        }

        Ok(paths)
    }
}

/// One page of an intake form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier
    pub id: String,
    /// Display label
    pub label: String,
    /// Ordered fields; order is rendering order
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<Field>,
}

/// Atomic schema unit: one input addressed by id and data path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Unique across the whole schema; key of the flat value dictionary
    pub id: String,
    /// Display label
    pub label: String,
    /// Where the value lands in the nested payload, e.g. `profile.personal.first_name`
    pub data_path: String,
    /// Logical value type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Rendering hint
    #[serde(default)]
    pub ui_control: UiControl,
    /// Selectable values, inline or by reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_ref: Option<OptionsRef>,
    /// Named constraints
    #[serde(default, deserialize_with = "null_as_default")]
    pub validations: Validations,
    /// Whether an answer is mandatory
    #[serde(default, deserialize_with = "null_as_default")]
    pub required: bool,
    /// Help text shown under the control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// Display grouping hint, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Free-form tags, passed through untouched
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Visibility rules, opaque to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_conditions: Option<Value>,
}

impl Field {
    /// Create a minimal text field
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        data_path: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data_path: data_path.into(),
            field_type,
            ui_control: UiControl::Text,
            options_ref: None,
            validations: Validations::default(),
            required: false,
            help_text: None,
            group: None,
            tags: Vec::new(),
            visibility_conditions: None,
        }
    }

    /// With rendering control
    #[must_use]
    pub fn with_control(mut self, ui_control: UiControl) -> Self {
        self.ui_control = ui_control;
        self
    }

    /// With options source
    #[must_use]
    pub fn with_options(mut self, options_ref: OptionsRef) -> Self {
        self.options_ref = Some(options_ref);
        self
    }

    /// With validation constraints
    #[must_use]
    pub fn with_validations(mut self, validations: Validations) -> Self {
        self.validations = validations;
        self
    }

    /// Mark as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// With help text
    #[must_use]
    pub fn with_help(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = Some(help_text.into());
        self
    }
}

/// Logical value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Date,
    Enum,
    Boolean,
}

/// Rendering hint for a field
///
/// Absent, `null`, and unrecognized tags all fall back to [`UiControl::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum UiControl {
    #[default]
    Text,
    Number,
    Date,
    Select,
    Checkbox,
}

impl UiControl {
    /// Map a tag to a control, defaulting to text
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "number" => Self::Number,
            "date" => Self::Date,
            "select" => Self::Select,
            "checkbox" => Self::Checkbox,
            _ => Self::Text,
        }
    }

    /// Canonical tag
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
        }
    }
}

impl From<Option<String>> for UiControl {
    fn from(tag: Option<String>) -> Self {
        tag.as_deref().map_or(Self::Text, Self::from_tag)
    }
}

/// Source of selectable values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsRef {
    /// Ordered values listed in the schema itself
    Inline(Vec<String>),
    /// Indirection resolved asynchronously by the caller's resolver
    Reference(String),
}

impl OptionsRef {
    /// Reference string, if this is not an inline list
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Inline(_) => None,
            Self::Reference(reference) => Some(reference),
        }
    }
}

/// One selectable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Value stored when selected
    pub value: Value,
    /// Display label
    pub label: String,
}

impl SelectOption {
    /// Create option with explicit value and label
    #[must_use]
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Option from an inline schema entry; value and label are the same text
    #[must_use]
    pub fn inline(text: &str) -> Self {
        Self::new(text, text)
    }
}

/// Named constraints evaluated against a field's value
///
/// A zero `min_length`/`max_length` is treated as no constraint.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Validations {
    /// Minimum text length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum text length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Minimum numeric value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum numeric value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Validations {
    /// True when no constraint is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Schema load and configuration errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Document is not valid JSON or does not match the schema shape
    #[error("invalid schema JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Document is not valid YAML or does not match the schema shape
    #[error("invalid schema YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Field id is blank
    #[error("field with empty id in step '{step_id}'")]
    EmptyFieldId { step_id: String },

    /// Field id repeats
    #[error("duplicate field id: '{0}'")]
    DuplicateFieldId(String),

    /// Field data path does not parse
    #[error("field '{field_id}' has an invalid data path: {source}")]
    InvalidDataPath {
        field_id: String,
        #[source]
        source: PathError,
    },

    /// Two fields write the same slot
    #[error("fields '{first}' and '{second}' both write to '{path}'")]
    DuplicateDataPath {
        first: String,
        second: String,
        path: String,
    },

    /// One field writes inside another field's slot
    #[error("field '{inner}' writes inside the slot of field '{outer}'")]
    OverlappingDataPaths { outer: String, inner: String },
}
