pub mod field;
pub mod row;
