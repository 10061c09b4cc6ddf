pub mod scripted;
pub mod utils;

mod bounded;
mod lifecycle;
