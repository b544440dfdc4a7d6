pub mod archive;
pub mod catalog;
pub mod descriptor;
pub mod engine;
pub mod filter;

pub const VERSION: Option<&str> = option_env!("CATVAULT_VERSION");
