//! # ferry
//!
//! Connector runtime core. Re-exports the component crates and carries the
//! ambient pieces shared by the `ferry` binary:
//!
//! - `config` — JSON configuration (logging, local root, FTP, plugins)
//! - `logging` — tracing subscriber setup
//! - `cli` — command line parsing and execution

pub mod cli;
pub mod config;
pub mod logging;

pub use ferry_classloader as classloader;
pub use ferry_file as file;
pub use ferry_ftp as ftp;

pub use config::{ConfigError, FerryConfig};
