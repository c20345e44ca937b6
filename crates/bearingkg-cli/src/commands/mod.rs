//! Command implementations.

pub mod chunk;
pub mod config;
pub mod process;

pub use self::chunk::execute_chunk;
pub use self::config::execute_config;
pub use self::process::execute_process;
