pub mod cache;
pub mod config;
pub mod index;
pub mod io;
pub mod matcher;
pub mod paths;
pub mod plan;
pub mod resolver;

pub mod reporter;

pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for index and download requests
pub const USER_AGENT: &str = concat!("pywhl/", env!("CARGO_PKG_VERSION"));
