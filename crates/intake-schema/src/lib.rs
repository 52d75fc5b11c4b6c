//! Intake Schema
//!
//! Declarative intake form model and the dotted data-path convention used to
//! map flat form values into a nested profile payload.
//!
//! # Core Concepts
//!
//! - [`IntakeSchema`]: ordered steps of ordered fields, validated at load time
//! - [`DataPath`]: parsed dotted location, with the `profile` prefix rule applied
//! - [`write_path`] / [`read_path`]: flat ↔ nested value mapping
//! - [`prefill_values`]: seed a form from a previously saved profile
//!
//! # Example
//!
//! ```rust
//! use intake_schema::{get_nested, set_nested};
//! use serde_json::json;
//!
//! let mut payload = json!({});
//! set_nested(&mut payload, "profile.personal.first_name", json!("Alice")).unwrap();
//! assert_eq!(payload, json!({"personal": {"first_name": "Alice"}}));
//! assert_eq!(get_nested(&payload, "profile.personal.first_name"), Some(&json!("Alice")));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod path;
mod prefill;
mod schema;

// Re-exports
pub use path::{get_nested, read_path, set_nested, write_path, DataPath, PathError, PROFILE_PREFIX};
pub use prefill::{prefill_values, FieldValues};
pub use schema::{
    Field, FieldType, IntakeSchema, OptionsRef, SchemaError, SelectOption, Step, UiControl,
    Validations,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
