pub mod error;
pub mod obs;
pub mod options;
pub mod schema;
pub mod upsert;
pub mod util;

pub use crate::error::{Error, Result};
pub use crate::options::{BaseOptions, UpdateOptions};
pub use crate::schema::{Schema, SchemaPath};
pub use crate::upsert::{apply_insert_defaults, InsertDefaults, SET_ON_INSERT};
