//! Seed a flat value dictionary from a saved profile

use crate::path::get_nested;
use crate::schema::IntakeSchema;
use indexmap::IndexMap;
use serde_json::Value;

/// Flat mapping from field id to its current value
///
/// An absent key means the field was never answered. An explicit
/// `Value::Null` is an answer and is kept.
pub type FieldValues = IndexMap<String, Value>;

/// Read every field's data path out of a nested profile
///
/// Missing or unreachable paths are skipped; the form starts those fields
/// unset. Reads are tolerant: historical profiles may be incomplete.
#[must_use]
pub fn prefill_values(schema: &IntakeSchema, profile: &Value) -> FieldValues {
    schema
        .fields()
        .filter_map(|field| {
            get_nested(profile, &field.data_path).map(|value| (field.id.clone(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType, Step};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> IntakeSchema {
        IntakeSchema {
            program_code: "EE_FSW".into(),
            plan_code: None,
            template_id: "tpl1".into(),
            label: "Test".into(),
            steps: vec![Step {
                id: "s1".into(),
                label: "S1".into(),
                fields: vec![
                    Field::new("citizenship", "Citizenship", "profile.citizenship", FieldType::Enum),
                    Field::new("first", "First", "profile.personal.first_name", FieldType::String),
                    Field::new("age", "Age", "personal.age", FieldType::Number),
                ],
            }],
        }
    }

    #[test]
    fn reads_each_field_from_profile_root() {
        let profile = json!({"personal": {}, "citizenship": "CANADA"});
        let values = prefill_values(&schema(), &profile);

        assert_eq!(values.len(), 1);
        assert_eq!(values["citizenship"], json!("CANADA"));
    }

    #[test]
    fn keeps_explicit_null_and_skips_unreachable() {
        let profile = json!({"personal": {"first_name": null, "age": 41}, "citizenship": {"x": 1}});
        let values = prefill_values(&schema(), &profile);

        assert_eq!(values.get("first"), Some(&Value::Null));
        assert_eq!(values.get("age"), Some(&json!(41)));
        assert_eq!(values.get("citizenship"), Some(&json!({"x": 1})));
    }

    #[test]
    fn non_object_profile_yields_nothing() {
        assert!(prefill_values(&schema(), &json!("nope")).is_empty());
        assert!(prefill_values(&schema(), &Value::Null).is_empty());
    }
}
