//! Interrupt handling.
//!
//! A single process-wide atomic flag is flipped by the Ctrl-C handler and
//! polled by long-running loops (the compile workers check it between
//! jobs). Installed once at program entry.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{cancelled, Result};

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Install the process-wide SIGINT handler.
pub fn install_signal_handlers() {
    let result = ctrlc::set_handler(|| {
        CANCELLED.store(true, Ordering::SeqCst);
    });
    if let Err(e) = result {
        tracing::warn!("failed to install interrupt handler: {}", e);
    }
}

/// Whether an interrupt has been received.
pub fn is_cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Fail with `user_cancelled` if an interrupt has been received.
pub fn check_cancelled() -> Result<()> {
    if is_cancelled() {
        Err(cancelled())
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
    CANCELLED.store(false, Ordering::SeqCst);
}
