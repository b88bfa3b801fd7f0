pub mod sql_common;
pub mod sql_condition;
pub mod sql_parse_condition;
pub mod sql_parse_fields;
pub mod sql_parse_iif;
pub mod sql_parse_limit;
pub mod sql_statement;
pub mod sql_value;

// Re-export the parser surface so callers can use `crate::sql::SqlStatement`
// and friends without spelling out submodule paths.
pub use sql_common::*;
pub use sql_condition::*;
pub use sql_parse_condition::*;
pub use sql_parse_fields::*;
pub use sql_parse_iif::*;
pub use sql_parse_limit::*;
pub use sql_statement::*;
pub use sql_value::*;
