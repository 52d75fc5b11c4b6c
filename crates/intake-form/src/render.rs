//! Rendering contract
//!
//! Turns a schema plus the engine's current state into a plain, serializable
//! view model. Controls are a closed set; unknown `ui_control` tags have
//! already fallen back to text at schema load.

use crate::config::FormConfig;
use crate::options::OptionList;
use crate::validation::FieldErrors;
use intake_schema::{Field, FieldValues, IntakeSchema, OptionsRef, SelectOption, UiControl};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Whole form, ready to draw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedForm {
    pub label: String,
    /// Numbered step list, in step order
    pub step_index: Vec<StepIndexEntry>,
    pub steps: Vec<RenderedStep>,
    pub submit_label: String,
    /// Submit control is disabled while true
    pub submitting: bool,
}

impl RenderedForm {
    /// Look up a rendered field by id
    #[must_use]
    pub fn field(&self, id: &str) -> Option<&RenderedField> {
        self.steps
            .iter()
            .flat_map(|step| step.fields.iter())
            .find(|field| field.id == id)
    }
}

/// One entry of the step index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepIndexEntry {
    /// 1-based position
    pub number: usize,
    pub id: String,
    pub label: String,
}

/// Rendered step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedStep {
    pub id: String,
    pub label: String,
    pub fields: Vec<RenderedField>,
}

/// Rendered field with its control and inline error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedField {
    pub id: String,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub control: Control,
}

/// Editable control
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Control {
    Text {
        value: String,
    },
    Number {
        value: String,
    },
    Date {
        value: String,
    },
    Select {
        value: String,
        /// Empty first entry
        placeholder: String,
        options: Vec<SelectOption>,
    },
    Checkbox {
        checked: bool,
    },
}

impl Control {
    /// Build the control for `field` given its current value
    #[must_use]
    pub fn for_field(
        field: &Field,
        value: Option<&Value>,
        options: Vec<SelectOption>,
        placeholder: &str,
    ) -> Self {
        match field.ui_control {
            UiControl::Text => Self::Text {
                value: display_value(value),
            },
            UiControl::Number => Self::Number {
                value: display_value(value),
            },
            UiControl::Date => Self::Date {
                value: display_value(value),
            },
            UiControl::Select => Self::Select {
                value: display_value(value),
                placeholder: placeholder.to_string(),
                options,
            },
            UiControl::Checkbox => Self::Checkbox {
                checked: is_truthy(value),
            },
        }
    }
}

/// Numbered step list
#[must_use]
pub fn step_index(schema: &IntakeSchema) -> Vec<StepIndexEntry> {
    schema
        .steps
        .iter()
        .enumerate()
        .map(|(idx, step)| StepIndexEntry {
            number: idx + 1,
            id: step.id.clone(),
            label: step.label.clone(),
        })
        .collect()
}

/// Text shown in a control; unset and `null` show as empty
#[must_use]
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Checkbox state: `false`, `0`, `""`, `null` and unset are unchecked
#[must_use]
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// Refs whose options a render needs, in first-seen order
#[must_use]
pub fn select_refs(schema: &IntakeSchema) -> Vec<&str> {
    let mut refs: Vec<&str> = Vec::new();
    for field in schema.fields() {
        if field.ui_control != UiControl::Select {
            continue;
        }
        if let Some(reference) = field.options_ref.as_ref().and_then(OptionsRef::reference) {
            if !refs.contains(&reference) {
                refs.push(reference);
            }
        }
    }
    refs
}

/// Assemble the view model
///
/// `resolved` maps option refs to settled lists; a select whose ref is absent
/// renders with no options.
#[must_use]
pub fn render_form(
    schema: &IntakeSchema,
    values: &FieldValues,
    errors: &FieldErrors,
    resolved: &HashMap<String, OptionList>,
    config: &FormConfig,
    submitting: bool,
) -> RenderedForm {
    let steps = schema
        .steps
        .iter()
        .map(|step| RenderedStep {
            id: step.id.clone(),
            label: step.label.clone(),
            fields: step
                .fields
                .iter()
                .map(|field| RenderedField {
                    id: field.id.clone(),
                    label: field.label.clone(),
                    required: field.required,
                    help_text: field.help_text.clone(),
                    error: errors.get(&field.id).cloned(),
                    control: Control::for_field(
                        field,
                        values.get(&field.id),
                        field_options(field, resolved),
                        &config.select_placeholder,
                    ),
                })
                .collect(),
        })
        .collect();

    RenderedForm {
        label: schema.label.clone(),
        step_index: step_index(schema),
        steps,
        submit_label: if submitting {
            config.submitting_label.clone()
        } else {
            config.submit_label.clone()
        },
        submitting,
    }
}

fn field_options(field: &Field, resolved: &HashMap<String, OptionList>) -> Vec<SelectOption> {
    match &field.options_ref {
        Some(OptionsRef::Inline(items)) => items.iter().map(|s| SelectOption::inline(s)).collect(),
        Some(OptionsRef::Reference(reference)) => resolved
            .get(reference)
            .map(|list| list.as_ref().clone())
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_schema::{FieldType, Step};
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> IntakeSchema {
        IntakeSchema {
            program_code: "EE_FSW".into(),
            plan_code: None,
            template_id: "tpl1".into(),
            label: "Test Template".into(),
            steps: vec![
                Step {
                    id: "step1".into(),
                    label: "Step One".into(),
                    fields: vec![
                        Field::new("first", "First Name", "profile.personal.first_name", FieldType::String)
                            .required()
                            .with_help("As on passport"),
                        Field::new("age", "Age", "profile.personal.age", FieldType::Number)
                            .with_control(UiControl::Number),
                    ],
                },
                Step {
                    id: "step2".into(),
                    label: "Step Two".into(),
                    fields: vec![
                        Field::new("citizenship", "Citizenship", "profile.personal.citizenship", FieldType::Enum)
                            .with_control(UiControl::Select)
                            .with_options(OptionsRef::Inline(vec!["CANADA".into(), "INDIA".into()])),
                        Field::new("marital", "Marital", "profile.personal.marital", FieldType::Enum)
                            .with_control(UiControl::Select)
                            .with_options(OptionsRef::Reference("marital_status".into())),
                        Field::new("married", "Married", "profile.personal.married", FieldType::Boolean)
                            .with_control(UiControl::Checkbox),
                    ],
                },
            ],
        }
    }

    #[test]
    fn step_index_is_numbered_in_order() {
        let index = step_index(&schema());
        assert_eq!(index.len(), 2);
        assert_eq!(index[0].number, 1);
        assert_eq!(index[0].label, "Step One");
        assert_eq!(index[1].number, 2);
        assert_eq!(index[1].id, "step2");
    }

    #[test]
    fn display_value_renders_unset_and_null_as_empty() {
        assert_eq!(display_value(None), "");
        assert_eq!(display_value(Some(&Value::Null)), "");
        assert_eq!(display_value(Some(&json!("x"))), "x");
        assert_eq!(display_value(Some(&json!(30))), "30");
        assert_eq!(display_value(Some(&json!(false))), "false");
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(is_truthy(Some(&json!(true))));
        assert!(is_truthy(Some(&json!("yes"))));
        assert!(is_truthy(Some(&json!(2))));
    }

    #[test]
    fn select_refs_deduplicates() {
        let mut schema = schema();
        schema.steps[0].fields.push(
            Field::new("marital2", "Spouse marital", "spouse.marital", FieldType::Enum)
                .with_control(UiControl::Select)
                .with_options(OptionsRef::Reference("marital_status".into())),
        );
        assert_eq!(select_refs(&schema), vec!["marital_status"]);
    }

    #[test]
    fn render_builds_controls_errors_and_options() {
        let schema = schema();
        let values: FieldValues = [
            ("age".to_string(), json!(30)),
            ("married".to_string(), json!(true)),
        ]
        .into_iter()
        .collect();
        let errors: FieldErrors = [("first".to_string(), "This field is required.".to_string())]
            .into_iter()
            .collect();
        let resolved: HashMap<String, OptionList> = [(
            "marital_status".to_string(),
            Arc::new(vec![SelectOption::new("single", "Single")]),
        )]
        .into_iter()
        .collect();

        let form = render_form(&schema, &values, &errors, &resolved, &FormConfig::default(), false);

        assert_eq!(form.submit_label, "Save intake");
        let first = form.field("first").unwrap();
        assert!(first.required);
        assert_eq!(first.error.as_deref(), Some("This field is required."));
        assert_eq!(first.help_text.as_deref(), Some("As on passport"));
        assert_eq!(first.control, Control::Text { value: String::new() });

        assert_eq!(
            form.field("age").unwrap().control,
            Control::Number { value: "30".into() }
        );
        assert_eq!(
            form.field("married").unwrap().control,
            Control::Checkbox { checked: true }
        );

        match &form.field("citizenship").unwrap().control {
            Control::Select { options, placeholder, .. } => {
                assert_eq!(placeholder, "Select...");
                assert_eq!(
                    options,
                    &vec![SelectOption::inline("CANADA"), SelectOption::inline("INDIA")]
                );
            }
            other => panic!("expected select, got {other:?}"),
        }
        match &form.field("marital").unwrap().control {
            Control::Select { options, .. } => {
                assert_eq!(options, &vec![SelectOption::new("single", "Single")]);
            }
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn render_while_submitting_switches_label() {
        let form = render_form(
            &schema(),
            &FieldValues::new(),
            &FieldErrors::new(),
            &HashMap::new(),
            &FormConfig::default(),
            true,
        );
        assert!(form.submitting);
        assert_eq!(form.submit_label, "Saving...");
    }

    #[test]
    fn control_serializes_with_kind_tag() {
        let json = serde_json::to_value(Control::Checkbox { checked: true }).unwrap();
        assert_eq!(json, json!({"kind": "checkbox", "checked": true}));
    }
}
