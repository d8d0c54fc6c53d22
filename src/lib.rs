// ============================================================================
// metadata_column
// ============================================================================

//! Typed virtual fields stored together in one JSON column of a host record.
//!
//! A model registers its virtual fields once in a [`ModelSchema`]. Each record
//! is wrapped in a [`MetadataRecord`], which reads and writes those fields
//! through the backing column and delegates every other attribute to the host.
//!
//! # Examples
//!
//! ```
//! use metadata_column::{
//!     Column, FieldSpec, FieldType, HostRecord, MemoryStore, MetadataRecord, ModelSchema, Value,
//! };
//!
//! # fn main() -> metadata_column::Result<()> {
//! let schema = ModelSchema::new("User").has_metadata_column(
//!     None,
//!     vec![
//!         FieldSpec::new("nickname"),
//!         FieldSpec::new("age").typed(FieldType::Integer),
//!     ],
//! )?;
//!
//! let users = MemoryStore::new(
//!     "users",
//!     vec![
//!         Column::new("metadata", FieldType::Text),
//!         Column::new("login", FieldType::Text),
//!     ],
//! );
//!
//! let mut user = MetadataRecord::new(schema, users.new_record());
//! user.set("login", "me")?;
//! user.set("age", "42")?;
//! assert_eq!(user.get("age")?, Value::Integer(42));
//!
//! user.save()?;
//! assert_eq!(users.len()?, 1);
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod blob;
pub mod coerce;
pub mod core;
pub mod host;
pub mod schema;
pub mod serialization;
pub mod validation;

// Re-export main types for convenience
pub use attributes::{AttributeSet, HostRecord, MetadataRecord};
pub use crate::core::{Column, FieldType, ModelError, Result, Schema, Value};
pub use host::{MemoryRecord, MemoryStore};
pub use schema::{FieldDeclaration, FieldSchema, FieldSpec, ModelSchema};
pub use serialization::SerializeOptions;
pub use validation::{ValidationEngine, ValidationErrors, ValidationRule};
