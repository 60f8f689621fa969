//! Waitable scopes: derive a scope from a context, wait on it, complete it.
//!
//! A waitable scope is a context node whose value is a shared
//! [`CompletionSignal`]. The context tree itself stays immutable; all
//! mutation happens inside the signal, which is found by walking up the
//! chain. Deriving from a context that already sits inside a waitable scope
//! reuses that scope's signal instead of layering a new one, so every
//! completer below a scope releases the same waiters.
use crate::context::Context;
use crate::error::WaitError;
use crate::signal::CompletionSignal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

// Private key type: only this module can attach or read the association.
struct WaitScope(Arc<CompletionSignal>);

/// Nearest scope association from `ctx` toward the root.
fn nearest_signal(ctx: &Context) -> Option<&Arc<CompletionSignal>> {
    ctx.value::<WaitScope>().map(|scope| &scope.0)
}

impl Context {
    /// Derives a waitable scope and returns it with its [`Waiter`].
    ///
    /// If `self` already belongs to a waitable scope, `self` is returned as
    /// is and the waiter is bound to the inherited signal. Never fires
    /// anything.
    pub fn with_wait(&self) -> (Context, Waiter) {
        if let Some(signal) = nearest_signal(self) {
            trace!(
                trace_id = self.trace_id(),
                signal = signal.id(),
                "reusing inherited wait scope"
            );
            let waiter = Waiter {
                signal: Arc::clone(signal),
            };
            return (self.clone(), waiter);
        }

        let signal = Arc::new(CompletionSignal::new());
        debug!(
            trace_id = self.trace_id(),
            signal = signal.id(),
            "derived wait scope"
        );
        let ctx = self.with_value(WaitScope(Arc::clone(&signal)));
        (ctx, Waiter { signal })
    }

    /// Marks the nearest enclosing waitable scope as complete.
    ///
    /// A no-op when there is no such scope or when it already completed;
    /// safe to call from any number of tasks at once.
    pub fn complete(&self) {
        let Some(signal) = nearest_signal(self) else {
            trace!(
                trace_id = self.trace_id(),
                "complete on context without wait scope"
            );
            return;
        };

        if signal.fire() {
            debug!(
                trace_id = self.trace_id(),
                signal = signal.id(),
                "wait scope completed"
            );
        } else {
            trace!(
                trace_id = self.trace_id(),
                signal = signal.id(),
                "wait scope already completed"
            );
        }
    }

    pub fn is_waitable(&self) -> bool {
        nearest_signal(self).is_some()
    }
}

/// Blocks until the scope it was derived with completes.
///
/// Broadcast: any number of clones may wait, concurrently or one after
/// another, and all of them return once the scope completes.
#[derive(Clone, Debug)]
pub struct Waiter {
    signal: Arc<CompletionSignal>,
}

impl Waiter {
    /// Suspends until the scope completes. Returns immediately if it
    /// already has.
    pub async fn wait(&self) {
        self.signal.fired().await;
    }

    pub fn is_complete(&self) -> bool {
        self.signal.is_fired()
    }

    /// Waits for completion or for `ctx` to be cancelled, whichever comes
    /// first. Completion wins when both are already observable.
    pub async fn wait_or_cancelled(&self, ctx: &Context) -> Result<(), WaitError> {
        tokio::select! {
            biased;
            _ = self.signal.fired() => Ok(()),
            _ = ctx.cancelled() => Err(WaitError::Cancelled),
        }
    }

    pub async fn wait_timeout(&self, timeout: Duration) -> Result<(), WaitError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| WaitError::Elapsed(timeout))
    }
}
