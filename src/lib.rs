pub mod bookmark;
pub mod cli;
pub mod config;
pub mod contract;
pub mod load_config;
pub mod providers;
pub mod status;
pub mod synchronise;
pub mod transport;

pub use cli::{run, Cli, Commands};
