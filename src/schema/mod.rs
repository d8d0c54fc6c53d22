//! Per-model registry of virtual fields.
//!
//! A [`ModelSchema`] is built once and never mutated. Registering more fields,
//! on the same model or on a subclass, produces a new schema whose field map
//! is a copy of the old one plus the new entries, so a parent schema shared by
//! other models is never affected.

mod declaration;

pub use declaration::FieldDeclaration;

use log::debug;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::core::{FieldType, ModelError, Result, Value};
use crate::validation::{
    StandardValidations, TypeCoercionRule, ValidationEngine, ValidationOptions, ValidationRule,
};

/// Column used when a registration does not name one.
pub const DEFAULT_METADATA_COLUMN: &str = "metadata";

/// Columns maintained automatically by the host; they cannot be virtual.
pub const RESERVED_TIMESTAMP_FIELDS: [&str; 4] =
    ["created_at", "created_on", "updated_at", "updated_on"];

/// Declaration of one virtual field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: Option<FieldType>,
    pub default: Option<Value>,
    pub validation: ValidationOptions,
    pub skip_type_validation: bool,
}

impl FieldSpec {
    /// An untyped field with no default and no validations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            default: None,
            validation: ValidationOptions::default(),
            skip_type_validation: false,
        }
    }

    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn allow_nil(mut self) -> Self {
        self.validation.allow_nil = true;
        self
    }

    pub fn allow_blank(mut self) -> Self {
        self.validation.allow_blank = true;
        self
    }

    /// Adds an option forwarded to the validation engine, e.g.
    /// `validates("numericality", json!(true))`.
    pub fn validates(mut self, option: impl Into<String>, setting: JsonValue) -> Self {
        self.validation.rules.insert(option.into(), setting);
        self
    }

    pub fn skip_type_validation(mut self) -> Self {
        self.skip_type_validation = true;
        self
    }

    /// Value returned while the field is absent from the blob.
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }
}

/// Resolved virtual fields of a model plus the column they live in.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    column: String,
    fields: Vec<Arc<FieldSpec>>,
    index: HashMap<String, usize>,
}

impl FieldSchema {
    fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|idx| self.fields[*idx].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Field names in registration order, inherited fields first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|spec| spec.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of this schema with `specs` appended. Specs are shared, not cloned.
    fn extended(&self, specs: &[FieldSpec]) -> Self {
        let mut next = self.clone();
        for spec in specs {
            next.index.insert(spec.name.clone(), next.fields.len());
            next.fields.push(Arc::new(spec.clone()));
        }
        next
    }
}

/// Type descriptor of a model: its name, parent and virtual fields.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    parent: Option<Arc<ModelSchema>>,
    metadata: Option<Arc<FieldSchema>>,
    rules: Vec<Arc<dyn ValidationRule>>,
}

impl ModelSchema {
    /// A model with no virtual fields yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            metadata: None,
            rules: Vec::new(),
        }
    }

    /// A model inheriting `parent`'s virtual fields and validations by reference.
    pub fn subclass(parent: &Arc<ModelSchema>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(Arc::clone(parent)),
            metadata: parent.metadata.clone(),
            rules: parent.rules.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<ModelSchema>> {
        self.parent.as_ref()
    }

    pub fn metadata(&self) -> Option<&FieldSchema> {
        self.metadata.as_deref()
    }

    pub fn metadata_column(&self) -> Option<&str> {
        self.metadata.as_deref().map(FieldSchema::column)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.metadata.as_deref().and_then(|m| m.field(name))
    }

    pub fn is_virtual(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn rules(&self) -> &[Arc<dyn ValidationRule>] {
        &self.rules
    }

    /// Registers virtual fields stored in `column` (default `metadata`),
    /// forwarding validation options to [`StandardValidations`].
    pub fn has_metadata_column(
        &self,
        column: Option<&str>,
        fields: Vec<FieldSpec>,
    ) -> Result<Arc<ModelSchema>> {
        self.has_metadata_column_with(&StandardValidations, column, fields)
    }

    /// Registers virtual fields, building option rules with `engine`.
    ///
    /// Fails when a field uses a reserved timestamp name, when a name is given
    /// twice, when an already registered field would change, or when `column`
    /// differs from the column fixed by an earlier registration. Re-declaring
    /// exactly the registered specs returns an equal schema.
    pub fn has_metadata_column_with(
        &self,
        engine: &dyn ValidationEngine,
        column: Option<&str>,
        fields: Vec<FieldSpec>,
    ) -> Result<Arc<ModelSchema>> {
        let reserved: Vec<&str> = fields
            .iter()
            .map(|spec| spec.name.as_str())
            .filter(|name| RESERVED_TIMESTAMP_FIELDS.contains(name))
            .collect();
        if !reserved.is_empty() {
            return Err(ModelError::Configuration(format!(
                "Can't define timestamp columns as metadata: {}",
                reserved.join(", ")
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = fields.iter().find(|spec| !seen.insert(spec.name.as_str())) {
            return Err(ModelError::Configuration(format!(
                "Metadata field '{}' is declared twice",
                dup.name
            )));
        }

        let current = match &self.metadata {
            Some(existing) => {
                if let Some(column) = column.filter(|c| *c != existing.column()) {
                    return Err(ModelError::Configuration(format!(
                        "Cannot redefine existing metadata column {} as {}",
                        existing.column(),
                        column
                    )));
                }
                Arc::clone(existing)
            }
            None => {
                let column = column.unwrap_or(DEFAULT_METADATA_COLUMN);
                if column.trim().is_empty() || RESERVED_TIMESTAMP_FIELDS.contains(&column) {
                    return Err(ModelError::Configuration(format!(
                        "'{}' cannot be used as a metadata column",
                        column
                    )));
                }
                Arc::new(FieldSchema::new(column))
            }
        };

        let redeclared: Vec<&str> = fields
            .iter()
            .filter(|spec| current.contains(&spec.name))
            .map(|spec| spec.name.as_str())
            .collect();
        if !redeclared.is_empty() {
            let identical = redeclared.len() == fields.len()
                && fields.iter().all(|spec| current.field(&spec.name) == Some(spec));
            if !identical {
                return Err(ModelError::Configuration(format!(
                    "Cannot redefine existing metadata fields: {}",
                    redeclared.join(", ")
                )));
            }
        }

        let new_fields: Vec<FieldSpec> = fields
            .into_iter()
            .filter(|spec| !current.contains(&spec.name))
            .collect();

        let mut rules = self.rules.clone();
        for spec in &new_fields {
            if let Some(field_type) = spec.field_type.filter(|_| !spec.skip_type_validation) {
                rules.push(Arc::new(TypeCoercionRule::new(
                    spec.name.clone(),
                    field_type,
                    &spec.validation,
                )));
            }
            if !spec.validation.rules.is_empty() {
                rules.extend(engine.rules_for(&spec.name, &spec.validation)?);
            }
        }

        let metadata = if new_fields.is_empty() {
            current
        } else {
            Arc::new(current.extended(&new_fields))
        };

        debug!(
            "registered metadata fields: model='{}' column='{}' added={:?} total={}",
            self.name,
            metadata.column(),
            new_fields.iter().map(|spec| spec.name.as_str()).collect::<Vec<_>>(),
            metadata.len()
        );

        Ok(Arc::new(ModelSchema {
            name: self.name.clone(),
            parent: self.parent.clone(),
            metadata: Some(metadata),
            rules,
        }))
    }
}
