use std::sync::atomic::{AtomicBool, Ordering};

use dao_shared::error::GovernanceError;

/// Advisory single-flight flag for user actions. It only serializes actions
/// issued through this client; the wallet itself can still be driven directly.
#[derive(Debug, Default)]
pub struct PendingAction {
    busy: AtomicBool,
}

impl PendingAction {
    pub fn try_acquire(&self) -> Result<PendingGuard<'_>, GovernanceError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GovernanceError::ActionPending)?;
        Ok(PendingGuard { flag: &self.busy })
    }

    pub fn is_pending(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Clears the flag when dropped, on every exit path of the action.
#[derive(Debug)]
pub struct PendingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
