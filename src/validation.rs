//! Validation hooks installed for virtual fields.
//!
//! Rules run against any [`AttributeSet`] and accumulate messages into
//! [`ValidationErrors`]; they never fail the caller directly. Each rule is one
//! link of a chain built at schema registration time.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::attributes::AttributeSet;
use crate::coerce::{coerce, parse_float, parse_integer};
use crate::core::{FieldType, ModelError, Result, Value};

pub const INCORRECT_TYPE: &str = "has incorrect type";
pub const BLANK: &str = "can't be blank";
pub const NOT_A_NUMBER: &str = "is not a number";
pub const NOT_AN_INTEGER: &str = "must be an integer";
pub const NOT_INCLUDED: &str = "is not included in the list";

/// Messages collected per attribute.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: &str, message: impl Into<String>) {
        self.errors
            .entry(attribute.to_string())
            .or_default()
            .push(message.into());
    }

    /// Messages for one attribute; empty when it is valid.
    pub fn on(&self, attribute: &str) -> &[String] {
        self.errors.get(attribute).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    /// `"<attribute> <message>"` for every message, ordered by attribute.
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(attribute, messages)| {
                messages.iter().map(move |m| format!("{} {}", attribute, m))
            })
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

/// Per-field options passed through to the validation engine.
///
/// `allow_nil` and `allow_blank` are also read by the type rule; everything
/// in `rules` is opaque to the attribute layer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationOptions {
    pub allow_nil: bool,
    pub allow_blank: bool,
    pub rules: BTreeMap<String, JsonValue>,
}

impl ValidationOptions {
    /// Skips a rule for values the options allow to be empty.
    fn skips(&self, value: &Value) -> bool {
        (self.allow_nil && value.is_null()) || (self.allow_blank && value.is_blank())
    }
}

pub trait ValidationRule: Send + Sync + fmt::Debug {
    fn attribute(&self) -> &str;
    fn validate(&self, record: &dyn AttributeSet, errors: &mut ValidationErrors);
}

/// Turns caller-supplied options into rules. Implementations may reject
/// options they do not understand.
pub trait ValidationEngine {
    fn rules_for(
        &self,
        attribute: &str,
        options: &ValidationOptions,
    ) -> Result<Vec<Arc<dyn ValidationRule>>>;
}

/// Fails unless the coerced value is of the declared type, or is nil/blank
/// and the options allow that.
#[derive(Debug, Clone)]
pub struct TypeCoercionRule {
    attribute: String,
    field_type: FieldType,
    allow_nil: bool,
    allow_blank: bool,
}

impl TypeCoercionRule {
    pub fn new(attribute: impl Into<String>, field_type: FieldType, options: &ValidationOptions) -> Self {
        Self {
            attribute: attribute.into(),
            field_type,
            allow_nil: options.allow_nil,
            allow_blank: options.allow_blank,
        }
    }
}

impl ValidationRule for TypeCoercionRule {
    fn attribute(&self) -> &str {
        &self.attribute
    }

    fn validate(&self, record: &dyn AttributeSet, errors: &mut ValidationErrors) {
        let value = record.read_attribute(&self.attribute).unwrap_or(Value::Null);
        let coerced = coerce(value.clone(), Some(self.field_type));

        if self.field_type.is_instance(&coerced)
            || (self.allow_nil && value.is_null())
            || (self.allow_blank && value.is_blank())
        {
            return;
        }
        errors.add(&self.attribute, INCORRECT_TYPE);
    }
}

#[derive(Debug, Clone)]
struct PresenceRule {
    attribute: String,
}

impl ValidationRule for PresenceRule {
    fn attribute(&self) -> &str {
        &self.attribute
    }

    fn validate(&self, record: &dyn AttributeSet, errors: &mut ValidationErrors) {
        let value = record.read_attribute(&self.attribute).unwrap_or(Value::Null);
        if value.is_blank() {
            errors.add(&self.attribute, BLANK);
        }
    }
}

/// Checks the value before type cast, so `"50"` passes and `"fifty"` does not.
#[derive(Debug, Clone)]
struct NumericalityRule {
    attribute: String,
    only_integer: bool,
    options: ValidationOptions,
}

impl ValidationRule for NumericalityRule {
    fn attribute(&self) -> &str {
        &self.attribute
    }

    fn validate(&self, record: &dyn AttributeSet, errors: &mut ValidationErrors) {
        let raw = record
            .read_attribute_before_type_cast(&self.attribute)
            .unwrap_or(Value::Null);
        if self.options.skips(&raw) {
            return;
        }

        let (numeric, integral) = match &raw {
            Value::Integer(_) => (true, true),
            Value::Float(f) => (true, f.fract() == 0.0),
            Value::Text(text) => (parse_float(text).is_some(), parse_integer(text).is_some()),
            _ => (false, false),
        };

        if !numeric {
            errors.add(&self.attribute, NOT_A_NUMBER);
        } else if self.only_integer && !integral {
            errors.add(&self.attribute, NOT_AN_INTEGER);
        }
    }
}

#[derive(Debug, Clone)]
struct LengthRule {
    attribute: String,
    minimum: Option<usize>,
    maximum: Option<usize>,
    options: ValidationOptions,
}

impl ValidationRule for LengthRule {
    fn attribute(&self) -> &str {
        &self.attribute
    }

    fn validate(&self, record: &dyn AttributeSet, errors: &mut ValidationErrors) {
        let value = record.read_attribute(&self.attribute).unwrap_or(Value::Null);
        if self.options.skips(&value) {
            return;
        }

        let length = match &value {
            Value::Text(text) => text.chars().count(),
            Value::Sequence(items) => items.len(),
            Value::Mapping(map) => map.len(),
            Value::Null => 0,
            other => other.to_string().chars().count(),
        };

        if let Some(minimum) = self.minimum.filter(|min| length < *min) {
            errors.add(
                &self.attribute,
                format!("is too short (minimum is {} characters)", minimum),
            );
        }
        if let Some(maximum) = self.maximum.filter(|max| length > *max) {
            errors.add(
                &self.attribute,
                format!("is too long (maximum is {} characters)", maximum),
            );
        }
    }
}

#[derive(Debug, Clone)]
struct InclusionRule {
    attribute: String,
    allowed: Vec<JsonValue>,
    options: ValidationOptions,
}

impl ValidationRule for InclusionRule {
    fn attribute(&self) -> &str {
        &self.attribute
    }

    fn validate(&self, record: &dyn AttributeSet, errors: &mut ValidationErrors) {
        let value = record.read_attribute(&self.attribute).unwrap_or(Value::Null);
        if self.options.skips(&value) {
            return;
        }
        if !self.allowed.contains(&value.to_json()) {
            errors.add(&self.attribute, NOT_INCLUDED);
        }
    }
}

/// Understands `presence`, `numericality`, `length` and `inclusion`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardValidations;

impl ValidationEngine for StandardValidations {
    fn rules_for(
        &self,
        attribute: &str,
        options: &ValidationOptions,
    ) -> Result<Vec<Arc<dyn ValidationRule>>> {
        let mut rules: Vec<Arc<dyn ValidationRule>> = Vec::new();

        for (name, setting) in &options.rules {
            if matches!(setting, JsonValue::Null | JsonValue::Bool(false)) {
                continue;
            }

            match name.as_str() {
                "presence" => rules.push(Arc::new(PresenceRule {
                    attribute: attribute.to_string(),
                })),
                "numericality" => {
                    let only_integer = match setting {
                        JsonValue::Bool(true) => false,
                        JsonValue::Object(map) => map
                            .get("only_integer")
                            .and_then(JsonValue::as_bool)
                            .unwrap_or(false),
                        _ => return Err(bad_option(attribute, name, "true or an object")),
                    };
                    rules.push(Arc::new(NumericalityRule {
                        attribute: attribute.to_string(),
                        only_integer,
                        options: options.clone(),
                    }));
                }
                "length" => {
                    let map = setting
                        .as_object()
                        .ok_or_else(|| bad_option(attribute, name, "an object"))?;
                    let bound = |key: &str| map.get(key).and_then(JsonValue::as_u64).map(|n| n as usize);
                    let exact = bound("is");
                    rules.push(Arc::new(LengthRule {
                        attribute: attribute.to_string(),
                        minimum: exact.or_else(|| bound("minimum")),
                        maximum: exact.or_else(|| bound("maximum")),
                        options: options.clone(),
                    }));
                }
                "inclusion" => {
                    let allowed = setting
                        .get("in")
                        .and_then(JsonValue::as_array)
                        .ok_or_else(|| bad_option(attribute, name, "an object with an 'in' list"))?;
                    rules.push(Arc::new(InclusionRule {
                        attribute: attribute.to_string(),
                        allowed: allowed.clone(),
                        options: options.clone(),
                    }));
                }
                other => {
                    return Err(ModelError::Configuration(format!(
                        "Unknown validator '{}' for field '{}'",
                        other, attribute
                    )));
                }
            }
        }

        Ok(rules)
    }
}

fn bad_option(attribute: &str, option: &str, expected: &str) -> ModelError {
    ModelError::Configuration(format!(
        "Option '{}' for field '{}' expects {}",
        option, attribute, expected
    ))
}
