use crate::{Result, UsbError};
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable flag that stops the IRQ service loop and any blocking read in progress.
///
/// The engine checks the token once per loop iteration and once per busy-wait step, so a
/// cancellation takes effect within one vendor request round trip.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Requests cancellation. Every clone of the token observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Gets whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns [`Cancelled`](crate::UsbError::Cancelled) once cancellation was requested.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(UsbError::Cancelled)
        } else {
            Ok(())
        }
    }
}
