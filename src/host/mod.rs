//! Reference persistence host.
//!
//! A table kept in process memory behind a mutex, with records that track
//! their own dirty state the way a database-backed model would. It exists so
//! the virtual field layer can be exercised end to end without a database.

mod memory;

pub use memory::{MemoryRecord, MemoryStore};

/// Primary key column added to every [`MemoryStore`] table.
pub const PRIMARY_KEY: &str = "id";
