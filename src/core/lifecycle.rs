use crate::errors::{BdUiError, Result};
use std::sync::atomic::{AtomicU8, Ordering};

const ACTIVE: u8 = 0;
const DESTROYED: u8 = 1;

/// Shared lifecycle state every concrete driver embeds.
///
/// `destroyed` is terminal and irreversible. Each contract method starts
/// with [`Lifecycle::ensure_active`]; [`Lifecycle::shut_down`] reports
/// whether the caller performed the transition, which makes a second
/// `destroy` a detectable no-op instead of a duplicate resource release.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ACTIVE),
        }
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(BdUiError::DriverDestroyed)
        } else {
            Ok(())
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.load(Ordering::Acquire) == DESTROYED
    }

    /// Transition to destroyed. Returns `true` only for the call that
    /// actually performed the transition.
    pub fn shut_down(&self) -> bool {
        self.state.swap(DESTROYED, Ordering::AcqRel) == ACTIVE
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_active() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.ensure_active().is_ok());
        assert!(!lifecycle.is_destroyed());
    }

    #[test]
    fn shut_down_is_terminal_and_reported_once() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.shut_down());
        assert!(!lifecycle.shut_down());
        assert!(matches!(
            lifecycle.ensure_active(),
            Err(BdUiError::DriverDestroyed)
        ));
    }
}
