//! Completion Signal: one-shot, broadcast, pending → fired
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

/// A single binary event. The only transition is pending → fired and it
/// happens at most once, no matter how many callers race to cause it.
///
/// Each signal owns its own lock (the one inside the watch channel), so
/// unrelated signals never contend.
pub struct CompletionSignal {
    id: u64,
    state: watch::Sender<bool>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            id: NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed),
            state,
        }
    }

    /// Process-unique id, for logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Fires the signal. Returns `true` only for the call that performed the
    /// transition; every other call, concurrent or later, returns `false`.
    pub fn fire(&self) -> bool {
        // Check and transition run under the channel's write lock, and
        // waiters are only notified when the closure reports a change.
        self.state.send_if_modified(|fired| {
            if *fired {
                return false;
            }
            *fired = true;
            true
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the signal has fired; immediately if it already has.
    pub async fn fired(&self) {
        let mut rx = self.state.subscribe();
        // `wait_for` only errors once the sender is gone, and `self` owns it.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("id", &self.id)
            .field("fired", &self.is_fired())
            .finish()
    }
}
