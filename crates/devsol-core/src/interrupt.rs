//! Cooperative cancellation for slow remote transfers.
//!
//! Remote reads block the control thread. A user interrupt (Ctrl-C in the CLI)
//! raises the flag from a signal handler; stream loops call
//! [`InterruptFlag::check`] before every transfer and bail out with
//! [`LoaderError::Interrupted`]. The flag stays raised so outer layers can see
//! that the user asked to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{LoaderError, Result};

/// Shared interrupt flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag
{
    /// A fresh, lowered flag.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Request that in-flight transfers stop.
    pub fn raise(&self)
    {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Lower the flag once the interrupt has been handled.
    pub fn clear(&self)
    {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool
    {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Interrupted)` if the flag is raised.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Interrupted`] when an interrupt is pending.
    pub fn check(&self) -> Result<()>
    {
        if self.is_raised() {
            return Err(LoaderError::Interrupted);
        }
        Ok(())
    }
}
