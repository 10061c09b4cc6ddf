pub mod plan;
pub mod query;
