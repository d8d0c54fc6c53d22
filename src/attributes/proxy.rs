use log::trace;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::blob::{BlobCache, JsonMap, PendingChanges};
use crate::coerce::{coerce, parse_float};
use crate::core::{FieldType, ModelError, Result, Value};
use crate::schema::{FieldSpec, ModelSchema};
use crate::serialization::{self, SerializeOptions, render_json, render_xml, root_tag};
use crate::validation::ValidationErrors;

use super::{AttributeSet, HostRecord, multiparameter};

/// A host record extended with the virtual fields of its model.
///
/// Virtual names are answered from the backing column; every other name goes
/// to the host unchanged. The parsed blob and the pending change map belong to
/// this instance only.
pub struct MetadataRecord<H> {
    schema: Arc<ModelSchema>,
    host: H,
    blob: BlobCache,
    pending: PendingChanges,
    errors: ValidationErrors,
}

fn virtual_field<'s>(schema: &'s ModelSchema, name: &str) -> Option<(&'s FieldSpec, &'s str)> {
    let metadata = schema.metadata()?;
    metadata.field(name).map(|spec| (spec, metadata.column()))
}

impl<H: AttributeSet> MetadataRecord<H> {
    pub fn new(schema: Arc<ModelSchema>, host: H) -> Self {
        Self {
            schema,
            host,
            blob: BlobCache::new(),
            pending: PendingChanges::new(),
            errors: ValidationErrors::new(),
        }
    }

    /// Wraps `host` and bulk-assigns `pairs`, composite keys included.
    pub fn with_attributes(
        schema: Arc<ModelSchema>,
        host: H,
        pairs: Vec<(String, Value)>,
    ) -> Result<Self> {
        let mut record = Self::new(schema, host);
        record.assign_attributes(pairs)?;
        Ok(record)
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Messages from the last [`MetadataRecord::is_valid`] or failed save.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.read_attribute(name)
    }

    pub fn get_before_type_cast(&self, name: &str) -> Result<Value> {
        self.read_attribute_before_type_cast(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.write_attribute(name, value.into())
    }

    pub fn query(&self, name: &str) -> Result<bool> {
        self.query_attribute(name)
    }

    pub fn responds_to(&self, name: &str) -> bool {
        self.has_attribute(name)
    }

    /// Runs every validation rule of the model without touching [`Self::errors`].
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for rule in self.schema.rules() {
            rule.validate(self, &mut errors);
        }
        errors
    }

    pub fn is_valid(&mut self) -> bool {
        self.errors = self.validate();
        self.errors.is_empty()
    }

    /// Caller options rewritten so virtual fields render as computed members
    /// and the backing column is hidden. Useful for nested representations.
    pub fn serializable_options(&self, options: &SerializeOptions) -> SerializeOptions {
        match self.schema.metadata() {
            Some(metadata) => serialization::prepare(metadata, options),
            None => options.clone(),
        }
    }

    pub fn as_json(&self, options: &SerializeOptions) -> Result<JsonMap> {
        render_json(self, &self.serializable_options(options))
    }

    pub fn to_xml(&self, options: &SerializeOptions) -> Result<String> {
        let root = root_tag(self.schema.name());
        render_xml(self, &root, &self.serializable_options(options))
    }

    fn raw_virtual(&self, name: &str, column: &str) -> Option<Value> {
        self.blob
            .view(|| self.host.read_attribute(column))
            .get(name)
            .map(Value::from_json)
    }

    fn read_virtual(&self, spec: &FieldSpec, column: &str) -> Value {
        match self.raw_virtual(&spec.name, column) {
            Some(raw) => coerce(raw, spec.field_type),
            None => spec.default_value(),
        }
    }

    fn query_virtual(&self, spec: &FieldSpec, column: &str) -> bool {
        let value = self.read_virtual(spec, column);
        if matches!(value, Value::Null | Value::Boolean(false)) {
            return false;
        }
        if spec.field_type.is_some_and(|t| t.is_numeric()) {
            let number = match &value {
                Value::Text(text) => parse_float(text),
                other => other.as_f64(),
            };
            return number.is_some_and(|n| n.trunc() != 0.0);
        }
        !value.is_blank()
    }

    fn write_virtual(&mut self, name: &str, column: &str, value: Value) -> Result<()> {
        // Surfaces MissingAttribute when the backing column was not loaded.
        let source = self.host.read_attribute(column)?;
        let mut blob = self.blob.view(move || Ok(source)).clone();

        let new_raw = value.to_json();
        let old_raw = blob.get(name).cloned();
        if old_raw.as_ref() == Some(&new_raw) {
            return Ok(());
        }

        blob.insert(name.to_string(), new_raw.clone());
        let serialized = serde_json::to_string(&blob)?;

        self.host.attribute_will_change(column);
        self.host.write_attribute(column, Value::Text(serialized))?;
        self.blob.invalidate();
        self.pending.record(name, old_raw, &new_raw);

        trace!(
            "wrote metadata field: model='{}' field='{}' value='{}'",
            self.schema.name(),
            name,
            new_raw
        );
        Ok(())
    }
}

impl<H: AttributeSet> AttributeSet for MetadataRecord<H> {
    /// Native attribute names only; virtual fields are listed by the schema.
    fn attribute_names(&self) -> Vec<String> {
        self.host.attribute_names()
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.schema.is_virtual(name) || self.host.has_attribute(name)
    }

    fn read_attribute(&self, name: &str) -> Result<Value> {
        match virtual_field(&self.schema, name) {
            Some((spec, column)) => Ok(self.read_virtual(spec, column)),
            None => self.host.read_attribute(name),
        }
    }

    fn read_attribute_before_type_cast(&self, name: &str) -> Result<Value> {
        match virtual_field(&self.schema, name) {
            Some((spec, column)) => Ok(self
                .raw_virtual(name, column)
                .unwrap_or_else(|| spec.default_value())),
            None => self.host.read_attribute_before_type_cast(name),
        }
    }

    fn write_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        if let Some((_, column)) = virtual_field(&schema, name) {
            return self.write_virtual(name, column, value);
        }

        self.host.write_attribute(name, value)?;
        if schema.metadata_column() == Some(name) {
            self.blob.invalidate();
        }
        Ok(())
    }

    fn query_attribute(&self, name: &str) -> Result<bool> {
        match virtual_field(&self.schema, name) {
            Some((spec, column)) => Ok(self.query_virtual(spec, column)),
            None => self.host.query_attribute(name),
        }
    }

    fn attribute_will_change(&mut self, name: &str) {
        match self.schema.metadata_column().filter(|_| self.schema.is_virtual(name)) {
            Some(column) => {
                let column = column.to_string();
                self.host.attribute_will_change(&column);
            }
            None => self.host.attribute_will_change(name),
        }
    }

    fn attribute_changed(&self, name: &str) -> bool {
        self.pending.contains(name) || self.host.attribute_changed(name)
    }

    fn changed_attributes(&self) -> BTreeMap<String, Value> {
        let mut changed = self.host.changed_attributes();
        changed.extend(self.pending.snapshot());
        changed
    }

    fn column_type(&self, name: &str) -> Option<FieldType> {
        if self.schema.is_virtual(name) {
            return None;
        }
        self.host.column_type(name)
    }

    /// Plain pairs are written first, then composed virtual fields. Composite
    /// keys naming host attributes are left to the host.
    fn assign_attributes(&mut self, pairs: Vec<(String, Value)>) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let (composed, rest) = multiparameter::compose(&schema, pairs)?;
        let (host_composites, plain): (Vec<_>, Vec<_>) =
            rest.into_iter().partition(|(name, _)| name.contains('('));

        for (name, value) in plain {
            self.write_attribute(&name, value)?;
        }
        for (name, value) in composed {
            self.write_attribute(&name, value)?;
        }
        if !host_composites.is_empty() {
            self.host.assign_attributes(host_composites)?;
            self.blob.invalidate();
        }
        Ok(())
    }
}

impl<H: HostRecord> HostRecord for MetadataRecord<H> {
    /// Validates, then persists through the host. An invalid record is not
    /// persisted and keeps its pending changes.
    fn save(&mut self) -> Result<()> {
        self.errors = self.validate();
        if !self.errors.is_empty() {
            return Err(ModelError::RecordInvalid(self.errors.to_string()));
        }

        self.host.save()?;
        self.pending.clear();
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.host.reload()?;
        self.blob.invalidate();
        self.pending.clear();
        self.errors.clear();
        Ok(())
    }
}

fn inspect_value(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::Text(text) => format!("{:?}", text),
        Value::Date(_) | Value::Timestamp(_) => format!("\"{}\"", value),
        Value::Sequence(items) => format!(
            "[{}]",
            items.iter().map(inspect_value).collect::<Vec<_>>().join(", ")
        ),
        Value::Mapping(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(k, v)| format!("{:?}: {}", k, inspect_value(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => other.to_string(),
    }
}

/// `#<Model id: 1, login: "me", untyped: "foo">`, with the backing column
/// replaced by the stored entries.
impl<H: AttributeSet> fmt::Debug for MetadataRecord<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = self.schema.metadata_column();
        let mut parts: Vec<String> = Vec::new();

        for name in self.host.attribute_names() {
            if Some(name.as_str()) == column {
                continue;
            }
            let value = self.host.read_attribute(&name).unwrap_or(Value::Null);
            parts.push(format!("{}: {}", name, inspect_value(&value)));
        }
        if let Some(column) = column {
            for (name, raw) in self.blob.view(|| self.host.read_attribute(column)) {
                parts.push(format!("{}: {}", name, inspect_value(&Value::from_json(raw))));
            }
        }

        write!(f, "#<{} {}>", self.schema.name(), parts.join(", "))
    }
}
