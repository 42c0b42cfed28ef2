//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent
//! formatting and appropriate exit codes.

use std::fmt;
use std::process;
use treescout::loader::ScanError;
use treescout::store::StoreError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// The scan root does not exist or is not a directory
    InvalidRoot { path: String, error: std::io::Error },
    /// Failed to open the on-disk cache store
    CacheOpen { path: String, error: StoreError },
    /// Initial scan of the root directory failed
    RootScan(ScanError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::CacheOpen { .. } = self {
            eprintln!();
            eprintln!("Run with --no-cache to scan without the disk cache.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::InvalidRoot { path, error } => {
                write!(f, "Cannot scan '{}': {}", path, error)
            }
            CliError::CacheOpen { path, error } => {
                write!(f, "Failed to open cache at '{}': {}", path, error)
            }
            CliError::RootScan(e) => write!(f, "Failed to read scan root: {}", e),
        }
    }
}
