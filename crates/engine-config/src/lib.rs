pub mod env;
pub mod error;
pub mod session;
pub mod settings;
