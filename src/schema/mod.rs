mod columns;
mod types;

pub use columns::ColumnSchema;
pub use types::{is_type_compatible, KqlType};
