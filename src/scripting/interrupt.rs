use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// One-shot cancellation flag shared between a waiting caller and the thread
/// evaluating its script.
///
/// Bound functions check it before doing anything and [`sleep`](Self::sleep)
/// wakes up as soon as it is raised.
#[derive(Debug, Default)]
pub struct InterruptSignal {
    raised: Mutex<bool>,
    wakeup: Condvar,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(|e| e.into_inner());
        *raised = true;
        self.wakeup.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks for `duration` unless the signal is raised first.
    /// Returns `false` when interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        let raised = self.raised.lock().unwrap_or_else(|e| e.into_inner());
        let (raised, _) = self
            .wakeup
            .wait_timeout_while(raised, duration, |raised| !*raised)
            .unwrap_or_else(|e| e.into_inner());
        !*raised
    }
}
