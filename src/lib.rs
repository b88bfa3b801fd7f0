pub mod row;
pub mod sql;
