//! Configuration module for kresnik.
//!
//! Configuration is loaded from a simple `section.key = value` file and
//! falls back to sensible defaults for every field.

mod parser;
mod types;

pub use parser::load_config;
pub use types::{Config, Limits, Secrets, ServerCfg};

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &str) -> std::io::Result<Config> {
        load_config(path)
    }
}
