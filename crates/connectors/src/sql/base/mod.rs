pub mod adapter;
pub mod requests;
pub mod row;
