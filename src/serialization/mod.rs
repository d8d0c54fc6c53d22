//! Inclusion of virtual fields in generic object serialization.
//!
//! Renderers know nothing about the blob. Before rendering, the options are
//! rewritten so that the backing column is excluded and every selected virtual
//! field is rendered as a computed `methods` entry next to native attributes.

mod json;
mod xml;

pub use json::render_json;
pub use xml::{render_xml, root_tag};

use crate::schema::FieldSchema;

/// `only` / `except` / `methods` options of a serialization call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerializeOptions {
    pub only: Option<Vec<String>>,
    pub except: Vec<String>,
    pub methods: Vec<String>,
}

impl SerializeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn except<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether a native attribute passes `only` and `except`.
    pub fn includes_attribute(&self, name: &str) -> bool {
        let selected = self
            .only
            .as_ref()
            .is_none_or(|only| only.iter().any(|n| n == name));
        selected && !self.except.iter().any(|n| n == name)
    }
}

/// Virtual field names to render: all registered names, intersected with
/// `only` when given, minus `except`. Registration order is kept.
pub fn included_fields(metadata: &FieldSchema, only: Option<&[String]>, except: &[String]) -> Vec<String> {
    metadata
        .names()
        .filter(|name| only.is_none_or(|only| only.iter().any(|n| n == name)))
        .filter(|name| !except.iter().any(|n| n == name))
        .map(str::to_string)
        .collect()
}

/// Rewrites caller options for a record with virtual fields: the backing
/// column joins `except`, selected virtual fields are appended to `methods`.
/// Caller-supplied entries are kept as given.
pub fn prepare(metadata: &FieldSchema, options: &SerializeOptions) -> SerializeOptions {
    let mut prepared = options.clone();

    let virtual_fields = included_fields(metadata, options.only.as_deref(), &options.except);

    if !prepared.except.iter().any(|n| n == metadata.column()) {
        prepared.except.push(metadata.column().to_string());
    }
    for name in virtual_fields {
        if !prepared.methods.contains(&name) {
            prepared.methods.push(name);
        }
    }

    prepared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldType;
    use crate::schema::{FieldSpec, ModelSchema};

    fn metadata() -> std::sync::Arc<ModelSchema> {
        ModelSchema::new("Tester")
            .has_metadata_column(
                None,
                vec![
                    FieldSpec::new("untyped"),
                    FieldSpec::new("number").typed(FieldType::Integer),
                    FieldSpec::new("boolean").typed(FieldType::Boolean),
                ],
            )
            .unwrap()
    }

    #[test]
    fn test_included_fields() {
        let schema = metadata();
        let fields = schema.metadata().unwrap();

        assert_eq!(included_fields(fields, None, &[]), vec!["untyped", "number", "boolean"]);
        assert_eq!(
            included_fields(fields, Some(&["number".to_string(), "id".to_string()][..]), &[]),
            vec!["number"]
        );
        assert_eq!(
            included_fields(fields, None, &["number".to_string()]),
            vec!["untyped", "boolean"]
        );
    }

    #[test]
    fn test_prepare_keeps_caller_options() {
        let schema = metadata();
        let options = SerializeOptions::new()
            .except(["untyped"])
            .methods(["login"]);
        let prepared = prepare(schema.metadata().unwrap(), &options);

        assert_eq!(prepared.only, None);
        assert_eq!(prepared.except, vec!["untyped", "metadata"]);
        assert_eq!(prepared.methods, vec!["login", "number", "boolean"]);
    }

    #[test]
    fn test_includes_attribute() {
        let options = SerializeOptions::new().only(["id", "login"]).except(["login"]);
        assert!(options.includes_attribute("id"));
        assert!(!options.includes_attribute("login"));
        assert!(!options.includes_attribute("metadata"));
    }
}
