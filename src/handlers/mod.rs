pub mod commands;
pub mod config;
pub mod debug;

pub use commands::*;
pub use config::*;
pub use debug::*;
