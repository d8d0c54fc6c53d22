//! Field declarations read from JSON.
//!
//! ```json
//! {
//!   "untyped": true,
//!   "number": { "type": "integer", "numericality": true },
//!   "birthday": { "type": "date", "allow_nil": true, "default": "2000-01-01" }
//! }
//! ```
//!
//! Keys other than `type`, `default`, `allow_nil`, `allow_blank` and
//! `skip_type_validation` are forwarded to the validation engine.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{FieldSpec, ModelSchema};
use crate::coerce::coerce;
use crate::core::{FieldType, ModelError, Result, Value};
use crate::validation::ValidationOptions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldDeclaration {
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    /// `Some(Null)` is an explicit null default, `None` means no default.
    #[serde(default, deserialize_with = "present")]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub allow_nil: bool,
    #[serde(default)]
    pub allow_blank: bool,
    #[serde(default)]
    pub skip_type_validation: bool,
    #[serde(flatten)]
    pub options: BTreeMap<String, JsonValue>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

impl FieldDeclaration {
    pub fn into_spec(self, name: &str) -> Result<FieldSpec> {
        let field_type = self
            .field_type
            .as_deref()
            .map(str::parse::<FieldType>)
            .transpose()?;

        let default = self
            .default
            .as_ref()
            .map(|raw| coerce(Value::from_json(raw), field_type));

        Ok(FieldSpec {
            name: name.to_string(),
            field_type,
            default,
            validation: ValidationOptions {
                allow_nil: self.allow_nil,
                allow_blank: self.allow_blank,
                rules: self.options,
            },
            skip_type_validation: self.skip_type_validation,
        })
    }
}

/// Top-level declaration object, kept in document order.
struct Declarations(Vec<(String, JsonValue)>);

impl<'de> Deserialize<'de> for Declarations {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DeclarationsVisitor;

        impl<'de> Visitor<'de> for DeclarationsVisitor {
            type Value = Declarations;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of field declarations")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Declarations, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(entry) = access.next_entry::<String, JsonValue>()? {
                    entries.push(entry);
                }
                Ok(Declarations(entries))
            }
        }

        deserializer.deserialize_map(DeclarationsVisitor)
    }
}

/// Parses a declaration document into specs, in document order.
pub fn parse_declarations(document: &str) -> Result<Vec<FieldSpec>> {
    let Declarations(entries) = serde_json::from_str(document)?;

    entries
        .into_iter()
        .map(|(name, body)| {
            let declaration = match body {
                JsonValue::Bool(true) | JsonValue::Null => FieldDeclaration::default(),
                JsonValue::Object(_) => serde_json::from_value(body)?,
                other => {
                    return Err(ModelError::Configuration(format!(
                        "Field '{}' must be declared with true or an options object, got {}",
                        name, other
                    )));
                }
            };
            declaration.into_spec(&name)
        })
        .collect()
}

impl ModelSchema {
    /// Like [`ModelSchema::has_metadata_column`], reading fields from a JSON
    /// declaration document.
    pub fn declare_metadata_column(
        &self,
        column: Option<&str>,
        document: &str,
    ) -> Result<Arc<ModelSchema>> {
        self.has_metadata_column(column, parse_declarations(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_parse_declarations_keeps_order_and_options() {
        let specs = parse_declarations(
            r#"{
                "untyped": true,
                "number": { "type": "Fixnum", "numericality": true },
                "birthday": { "type": "date", "allow_nil": true, "default": "2000-01-01" },
                "nothing": { "default": null }
            }"#,
        )
        .unwrap();

        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["untyped", "number", "birthday", "nothing"]);

        assert_eq!(specs[0], FieldSpec::new("untyped"));
        assert_eq!(specs[1].field_type, Some(FieldType::Integer));
        assert_eq!(specs[1].validation.rules.get("numericality"), Some(&json!(true)));
        assert!(specs[2].validation.allow_nil);
        assert_eq!(
            specs[2].default,
            Some(Value::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()))
        );
        assert_eq!(specs[3].default, Some(Value::Null));
    }

    #[test]
    fn test_unsupported_type_is_a_configuration_error() {
        let err = parse_declarations(r#"{ "bad_type": { "type": "Regexp" } }"#).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(ref msg) if msg.contains("Regexp")));
    }

    #[test]
    fn test_declaration_must_be_object_or_true() {
        let err = parse_declarations(r#"{ "count": 3 }"#).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
    }
}
