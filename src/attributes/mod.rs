//! Host attribute protocol and the virtual-field proxy layered over it.
//!
//! [`AttributeSet`] is what a record exposes for its native columns.
//! [`MetadataRecord`] implements the same trait on top of a host, answering
//! for virtual fields first and delegating every other name.

pub mod multiparameter;
mod proxy;

pub use multiparameter::{CompositeKey, PartHint};
pub use proxy::MetadataRecord;

use std::collections::BTreeMap;

use crate::core::{FieldType, ModelError, Result, Value};

/// Native per-attribute operations of a record.
pub trait AttributeSet {
    /// Loaded attribute names in column order.
    fn attribute_names(&self) -> Vec<String>;

    fn has_attribute(&self, name: &str) -> bool;

    fn read_attribute(&self, name: &str) -> Result<Value>;

    fn read_attribute_before_type_cast(&self, name: &str) -> Result<Value> {
        self.read_attribute(name)
    }

    fn write_attribute(&mut self, name: &str, value: Value) -> Result<()>;

    /// Presence check: non-zero for numeric columns, not blank otherwise.
    fn query_attribute(&self, name: &str) -> Result<bool> {
        let value = self.read_attribute(name)?;
        Ok(match (self.column_type(name), &value) {
            (_, Value::Null) => false,
            (Some(t), v) if t.is_numeric() => v.as_f64().is_some_and(|f| f != 0.0),
            (_, v) => !v.is_blank(),
        })
    }

    /// Records the current value of `name` as its prior value, if none is recorded yet.
    fn attribute_will_change(&mut self, name: &str);

    fn attribute_changed(&self, name: &str) -> bool {
        self.changed_attributes().contains_key(name)
    }

    /// Changed attribute names mapped to their values at last save/load.
    fn changed_attributes(&self) -> BTreeMap<String, Value>;

    /// Changed attribute names mapped to `(old, new)`.
    fn changes(&self) -> BTreeMap<String, (Value, Value)> {
        self.changed_attributes()
            .into_iter()
            .map(|(name, old)| {
                let new = self.read_attribute(&name).unwrap_or(Value::Null);
                (name, (old, new))
            })
            .collect()
    }

    fn changed(&self) -> Vec<String> {
        self.changed_attributes().into_keys().collect()
    }

    /// Native column type, used by renderers for typed nulls.
    fn column_type(&self, _name: &str) -> Option<FieldType> {
        None
    }

    /// Bulk assignment. Composite keys such as `born(1i)` are not understood
    /// by a plain host.
    fn assign_attributes(&mut self, pairs: Vec<(String, Value)>) -> Result<()> {
        for (name, value) in pairs {
            if name.contains('(') {
                return Err(ModelError::UnknownAttribute(name));
            }
            self.write_attribute(&name, value)?;
        }
        Ok(())
    }
}

/// A record backed by a persistence engine.
pub trait HostRecord: AttributeSet {
    /// Persists pending changes and resets native change tracking.
    fn save(&mut self) -> Result<()>;

    /// Replaces attribute values with the persisted row.
    fn reload(&mut self) -> Result<()>;
}
