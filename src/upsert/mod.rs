pub mod modified_paths;
pub mod set_on_insert;

pub use modified_paths::ModifiedPaths;
pub use set_on_insert::{apply_insert_defaults, InsertDefaults, SET_ON_INSERT};
