pub mod error;
pub mod event_bus;
pub mod metrics;
pub mod table;

pub use error::CacheError;
pub use table::{CacheState, StreamingTableCache};
