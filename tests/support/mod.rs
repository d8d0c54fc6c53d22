#![allow(dead_code)]

use chrono::NaiveDate;
use metadata_column::{
    Column, FieldSpec, FieldType, HostRecord, MemoryRecord, MemoryStore, MetadataRecord,
    ModelSchema, Result, Value,
};
use serde_json::json;
use std::sync::Arc;

pub type Tester = MetadataRecord<MemoryRecord>;

/// Default of the `*_with_default` date fields.
pub fn default_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2012, 6, 1).unwrap()
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2013, 3, 14).unwrap()
}

pub fn tester_schema() -> Arc<ModelSchema> {
    ModelSchema::new("Fixtures::HasMetadataTester")
        .has_metadata_column(
            Some("metadata"),
            vec![
                FieldSpec::new("untyped"),
                FieldSpec::new("can_be_nil").typed(FieldType::Date).allow_nil(),
                FieldSpec::new("can_be_nil_with_default")
                    .typed(FieldType::Date)
                    .allow_nil()
                    .default(default_date()),
                FieldSpec::new("can_be_blank").typed(FieldType::Date).allow_blank(),
                FieldSpec::new("can_be_blank_with_default")
                    .typed(FieldType::Date)
                    .allow_blank()
                    .default(default_date()),
                FieldSpec::new("cannot_be_nil_with_default")
                    .typed(FieldType::Boolean)
                    .default(false),
                FieldSpec::new("number")
                    .typed(FieldType::Integer)
                    .validates("numericality", json!(true)),
                FieldSpec::new("boolean").typed(FieldType::Boolean),
                FieldSpec::new("date").typed(FieldType::Date),
                FieldSpec::new("has_default").default("default"),
                FieldSpec::new("no_valid")
                    .typed(FieldType::Integer)
                    .skip_type_validation(),
            ],
        )
        .expect("tester schema")
}

pub fn subclass_schema(parent: &Arc<ModelSchema>) -> Arc<ModelSchema> {
    ModelSchema::subclass(parent, "Fixtures::HasMetadataSubclass")
        .has_metadata_column(Some("metadata"), vec![FieldSpec::new("inherited")])
        .expect("subclass schema")
}

/// `users (id INTEGER PRIMARY KEY, metadata TEXT, login VARCHAR)`
pub fn users_table() -> MemoryStore {
    MemoryStore::new(
        "users",
        vec![
            Column::new("metadata", FieldType::Text),
            Column::new("login", FieldType::Text),
        ],
    )
}

pub fn pairs(entries: &[(&str, Value)]) -> Vec<(String, Value)> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub fn new_tester(store: &MemoryStore) -> Tester {
    MetadataRecord::new(tester_schema(), store.new_record())
}

/// An unsaved tester holding the values its validations require.
pub fn valid_tester(store: &MemoryStore) -> Result<Tester> {
    let mut tester = new_tester(store);
    tester.set("boolean", false)?;
    tester.set("date", today())?;
    tester.set("number", Value::Integer(5))?;
    Ok(tester)
}

/// A saved tester with `untyped: "foo", number: 123, boolean: true`.
pub fn created_tester(store: &MemoryStore) -> Result<Tester> {
    let mut tester = MetadataRecord::with_attributes(
        tester_schema(),
        store.new_record(),
        pairs(&[
            ("untyped", "foo".into()),
            ("number", Value::Integer(123)),
            ("boolean", true.into()),
            ("date", today().into()),
        ]),
    )?;
    tester.save()?;
    Ok(tester)
}

pub fn stored_metadata(tester: &Tester) -> serde_json::Value {
    use metadata_column::AttributeSet;

    match tester.read_attribute("metadata") {
        Ok(Value::Text(text)) => serde_json::from_str(&text).expect("metadata is JSON"),
        other => panic!("metadata column is not text: {:?}", other),
    }
}
