use crate::error::{BcExtractorError, Result};
use crate::runner::{cancel_pair, CancelHandle, CancelToken};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const INTERRUPT_REASON: &str = "interrupted by user";

/// Turns Ctrl+C into a job cancellation. A second Ctrl+C exits immediately.
pub struct GracefulShutdown {
    handle: CancelHandle,
    shutdown_message_shown: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let (handle, _token) = cancel_pair();
        let shutdown_message_shown = Arc::new(AtomicBool::new(false));

        let handle_clone = handle.clone();
        let message_shown_clone = shutdown_message_shown.clone();

        ctrlc::set_handler(move || {
            handle_clone.cancel(INTERRUPT_REASON);

            if !message_shown_clone.swap(true, Ordering::SeqCst) {
                eprintln!("\nStopping the extraction tool... (press Ctrl+C again to force exit)");
            } else {
                eprintln!("\nForce stopping...");
                std::process::exit(130);
            }
        })
        .map_err(|e| BcExtractorError::Config {
            message: format!("Failed to set signal handler: {}", e),
        })?;

        Ok(Self {
            handle,
            shutdown_message_shown,
        })
    }

    /// No signal handler is registered.
    pub fn new_for_test() -> Self {
        let (handle, _token) = cancel_pair();
        Self {
            handle,
            shutdown_message_shown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.handle.token()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_cancelled()
    }

    pub fn request_shutdown(&self) {
        self.handle.cancel(INTERRUPT_REASON);
    }

    pub fn message_shown(&self) -> bool {
        self.shutdown_message_shown.load(Ordering::SeqCst)
    }
}
