use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::attributes::{AttributeSet, HostRecord};
use crate::core::{Column, FieldType, ModelError, Result, Schema, Value};

use super::PRIMARY_KEY;

type Row = BTreeMap<String, Value>;

#[derive(Debug)]
struct MemoryTable {
    name: String,
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

impl MemoryTable {
    fn row(&self, id: i64) -> Result<&Row> {
        self.rows
            .get(&id)
            .ok_or_else(|| ModelError::RecordNotFound(format!("{} with id={}", self.name, id)))
    }
}

/// A shared handle to one in-memory table. Clones refer to the same rows.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryTable>>,
    schema: Arc<Schema>,
}

impl MemoryStore {
    /// Creates an empty table. An integer `id` column is prepended unless
    /// `columns` already has one.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let mut all = Vec::with_capacity(columns.len() + 1);
        if !columns.iter().any(|col| col.name == PRIMARY_KEY) {
            all.push(Column::new(PRIMARY_KEY, FieldType::Integer));
        }
        all.extend(columns);

        let schema = Arc::new(Schema::new(all));
        let table = MemoryTable {
            name: name.into(),
            rows: BTreeMap::new(),
            next_id: 1,
        };

        Self {
            inner: Arc::new(Mutex::new(table)),
            schema,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// An unsaved record with every column loaded as null.
    pub fn new_record(&self) -> MemoryRecord {
        let values = self
            .schema
            .columns()
            .iter()
            .map(|col| (col.name.clone(), Value::Null))
            .collect();
        MemoryRecord::new(self.clone(), None, values)
    }

    pub fn find(&self, id: i64) -> Result<MemoryRecord> {
        let table = self.inner.lock()?;
        let row = table.row(id)?.clone();
        Ok(MemoryRecord::new(self.clone(), Some(id), row))
    }

    /// Loads only `columns` (plus the primary key), like a partial select.
    pub fn find_with_columns(&self, id: i64, columns: &[&str]) -> Result<MemoryRecord> {
        if let Some(unknown) = columns.iter().find(|c| self.schema.get_column(c).is_none()) {
            return Err(ModelError::UnknownAttribute(unknown.to_string()));
        }

        let table = self.inner.lock()?;
        let row = table
            .row(id)?
            .iter()
            .filter(|(name, _)| name.as_str() == PRIMARY_KEY || columns.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(MemoryRecord::new(self.clone(), Some(id), row))
    }

    /// Writes one column of a stored row directly, bypassing any loaded
    /// record.
    pub fn update_column(&self, id: i64, column: &str, value: Value) -> Result<()> {
        let col = self
            .schema
            .get_column(column)
            .ok_or_else(|| ModelError::UnknownAttribute(column.to_string()))?;
        col.validate(&value)?;

        let mut table = self.inner.lock()?;
        let name = table.name.clone();
        let row = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| ModelError::RecordNotFound(format!("{} with id={}", name, id)))?;
        row.insert(column.to_string(), value);
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.lock()?.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// One row of a [`MemoryStore`], loaded fully or partially.
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    store: MemoryStore,
    id: Option<i64>,
    values: Row,
    /// Values at last load or save of the columns changed since.
    original: Row,
}

impl MemoryRecord {
    fn new(store: MemoryStore, id: Option<i64>, values: Row) -> Self {
        Self {
            store,
            id,
            values,
            original: Row::new(),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.store
            .schema
            .get_column(name)
            .ok_or_else(|| ModelError::UnknownAttribute(name.to_string()))
    }
}

impl AttributeSet for MemoryRecord {
    fn attribute_names(&self) -> Vec<String> {
        self.store
            .schema
            .columns()
            .iter()
            .filter(|col| self.values.contains_key(&col.name))
            .map(|col| col.name.clone())
            .collect()
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.store.schema.get_column(name).is_some()
    }

    fn read_attribute(&self, name: &str) -> Result<Value> {
        self.column(name)?;
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::MissingAttribute(name.to_string()))
    }

    fn write_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        self.column(name)?.validate(&value)?;
        if !self.values.contains_key(name) {
            return Err(ModelError::MissingAttribute(name.to_string()));
        }

        self.attribute_will_change(name);
        if self.original.get(name) == Some(&value) {
            self.original.remove(name);
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn attribute_will_change(&mut self, name: &str) {
        if self.original.contains_key(name) {
            return;
        }
        if let Some(current) = self.values.get(name) {
            self.original.insert(name.to_string(), current.clone());
        }
    }

    fn changed_attributes(&self) -> BTreeMap<String, Value> {
        self.original.clone()
    }

    fn column_type(&self, name: &str) -> Option<FieldType> {
        self.store.schema.get_column(name).map(|col| col.data_type)
    }
}

impl HostRecord for MemoryRecord {
    fn save(&mut self) -> Result<()> {
        let mut table = self.store.inner.lock()?;

        match self.id {
            None => {
                let id = table.next_id;
                table.next_id += 1;
                self.values.insert(PRIMARY_KEY.to_string(), Value::Integer(id));
                table.rows.insert(id, self.values.clone());
                self.id = Some(id);
                debug!("inserted row: table='{}' id={}", table.name, id);
            }
            Some(id) => {
                let name = table.name.clone();
                let row = table
                    .rows
                    .get_mut(&id)
                    .ok_or_else(|| ModelError::RecordNotFound(format!("{} with id={}", name, id)))?;
                for column in self.original.keys() {
                    if let Some(value) = self.values.get(column) {
                        row.insert(column.clone(), value.clone());
                    }
                }
                debug!(
                    "updated row: table='{}' id={} columns={:?}",
                    name,
                    id,
                    self.original.keys().collect::<Vec<_>>()
                );
            }
        }

        self.original.clear();
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| ModelError::RecordNotFound("unsaved record".to_string()))?;
        let table = self.store.inner.lock()?;
        self.values = table.row(id)?.clone();
        self.original.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> MemoryStore {
        MemoryStore::new(
            "users",
            vec![
                Column::new("metadata", FieldType::Text),
                Column::new("login", FieldType::Text),
            ],
        )
    }

    #[test]
    fn test_dirty_tracking_drops_reverts() {
        let store = users();
        let mut record = store.new_record();
        record.write_attribute("login", "me".into()).unwrap();
        assert_eq!(
            record.changes().get("login"),
            Some(&(Value::Null, Value::Text("me".into())))
        );

        record.write_attribute("login", Value::Null).unwrap();
        assert!(record.changed().is_empty());
    }

    #[test]
    fn test_save_and_partial_load() {
        let store = users();
        let mut record = store.new_record();
        record.write_attribute("login", "me".into()).unwrap();
        record.save().unwrap();
        assert_eq!(record.id(), Some(1));
        assert!(record.changed_attributes().is_empty());

        let partial = store.find_with_columns(1, &["login"]).unwrap();
        assert_eq!(partial.attribute_names(), vec!["id", "login"]);
        assert!(matches!(
            partial.read_attribute("metadata"),
            Err(ModelError::MissingAttribute(_))
        ));
        assert!(matches!(
            partial.read_attribute("nope"),
            Err(ModelError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_column_types_are_enforced() {
        let store = users();
        let mut record = store.new_record();
        let err = record.write_attribute("login", Value::Integer(3)).unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch(_)));
    }
}
