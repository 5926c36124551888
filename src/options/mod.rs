pub mod options;

pub use options::{BaseOptions, UpdateOptions, UpdateOptionsBuilder};
