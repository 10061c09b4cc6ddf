pub mod blocks;
pub mod cache;
pub mod state;

pub use cache::StreamingTableCache;
pub use state::CacheState;
