pub mod error;
pub mod types;
pub mod value;

pub use error::{ModelError, Result};
pub use types::{Column, Schema};
pub use value::{FieldType, Value};
