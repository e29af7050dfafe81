//! Error handling utilities

use crate::error::CookError;
use tracing::error;

/// Report a fatal error and exit with status 1
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);
    eprintln!("Error: {error}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    if let Some(CookError::Bug(_)) = error.downcast_ref::<CookError>() {
        eprintln!("This is a defect in a cook task, not a problem with the content.");
    }
    std::process::exit(1)
}
