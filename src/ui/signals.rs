use crate::error::{ExtractorError, Result};
use crate::extractor::CancelToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Turns the first Ctrl+C into a cooperative stop of the current run.
///
/// The folder being extracted is allowed to finish. A second Ctrl+C exits
/// the process immediately.
pub struct GracefulShutdown {
    token: CancelToken,
    shutdown_message_shown: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let token = CancelToken::new();
        let shutdown_message_shown = Arc::new(AtomicBool::new(false));

        let handler_token = token.clone();
        let message_shown = shutdown_message_shown.clone();

        ctrlc::set_handler(move || {
            handler_token.cancel();

            if !message_shown.swap(true, Ordering::SeqCst) {
                eprintln!(
                    "\n🛑 Stopping after the current folder... (press Ctrl+C again to force exit)"
                );
            } else {
                eprintln!("\n💀 Force stopping...");
                std::process::exit(130);
            }
        })
        .map_err(|e| ExtractorError::Config {
            message: format!("Failed to set signal handler: {}", e),
        })?;

        Ok(Self {
            token,
            shutdown_message_shown,
        })
    }

    /// No signal handler is registered.
    pub fn new_for_test() -> Self {
        Self {
            token: CancelToken::new(),
            shutdown_message_shown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn check_shutdown(&self) -> Result<()> {
        self.token.check()
    }

    pub fn request_shutdown(&self) {
        self.token.cancel();
    }

    /// Token handed to the orchestrator; cancelling it is what Ctrl+C does.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn message_shown(&self) -> bool {
        self.shutdown_message_shown.load(Ordering::SeqCst)
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::new_for_test())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_state_management() {
        let shutdown = GracefulShutdown::new_for_test();

        assert!(shutdown.is_running());
        assert!(shutdown.check_shutdown().is_ok());

        shutdown.request_shutdown();
        assert!(!shutdown.is_running());
        assert!(matches!(
            shutdown.check_shutdown(),
            Err(ExtractorError::Cancelled)
        ));
        assert!(!shutdown.message_shown());
    }

    #[test]
    fn test_token_is_shared() {
        let shutdown = GracefulShutdown::new_for_test();
        let token = shutdown.token();

        shutdown.request_shutdown();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_cancel_stops_shutdown() {
        let shutdown = GracefulShutdown::new_for_test();
        shutdown.token().cancel();
        assert!(!shutdown.is_running());
    }
}
