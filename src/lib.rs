pub mod abap;
pub mod error;
pub mod http;
pub mod local_files;
pub mod logging;
pub mod tms;

// Re-export common types for convenience
pub use error::{Error, Result};
pub use logging::{ConsoleLog, Level, Log};
