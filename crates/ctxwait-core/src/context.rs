//! Context: immutable, parent-chained carrier for request-scoped state.
//!
//! Every derivation allocates one new node pointing at its parent; nodes are
//! never mutated after construction. Lookups walk from a node toward the root
//! and return the nearest match, so a child shadows its ancestors.
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;

#[derive(Clone)]
pub struct Context {
    node: Arc<Node>,
}

struct Node {
    parent: Option<Context>,
    entry: Entry,
}

enum Entry {
    Root { trace_id: String },
    Value {
        key: TypeId,
        value: Box<dyn Any + Send + Sync>,
    },
    Cancel(Arc<CancelScope>),
}

impl Context {
    /// Empty root context with a fresh trace id.
    pub fn background() -> Self {
        Self::from_entry(
            None,
            Entry::Root {
                trace_id: uuid::Uuid::new_v4().to_string(),
            },
        )
    }

    /// Trace id of the root this context descends from.
    pub fn trace_id(&self) -> &str {
        self.ancestors()
            .find_map(|node| match &node.entry {
                Entry::Root { trace_id } => Some(trace_id.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    /// Child context carrying `value`, keyed by its type.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Context {
        Self::from_entry(
            Some(self.clone()),
            Entry::Value {
                key: TypeId::of::<T>(),
                value: Box::new(value),
            },
        )
    }

    /// Nearest value of type `T` between this node and the root.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let key = TypeId::of::<T>();
        self.ancestors().find_map(|node| match &node.entry {
            Entry::Value { key: k, value } if *k == key => (**value).downcast_ref::<T>(),
            _ => None,
        })
    }

    /// Cancellable child context and the handle that cancels it.
    ///
    /// Cancelling the handle also cancels every cancellable context derived
    /// below it. A child created under an already-cancelled context starts
    /// out cancelled.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let scope = CancelScope::new();
        if let Some(parent) = self.cancel_scope() {
            parent.attach(&scope);
        }
        let ctx = Self::from_entry(Some(self.clone()), Entry::Cancel(Arc::clone(&scope)));
        (ctx, CancelHandle { scope })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_scope().is_some_and(|scope| scope.is_cancelled())
    }

    /// Resolves once this context is cancelled. Never resolves for a context
    /// without a cancellable ancestor.
    pub async fn cancelled(&self) {
        match self.cancel_scope() {
            Some(scope) => {
                let mut rx = scope.state.subscribe();
                // The sender lives in `scope`, which outlives this borrow.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn from_entry(parent: Option<Context>, entry: Entry) -> Self {
        Self {
            node: Arc::new(Node { parent, entry }),
        }
    }

    fn cancel_scope(&self) -> Option<&Arc<CancelScope>> {
        self.ancestors().find_map(|node| match &node.entry {
            Entry::Cancel(scope) => Some(scope),
            _ => None,
        })
    }

    fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("trace_id", &self.trace_id())
            .field("depth", &self.ancestors().count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

struct Ancestors<'a> {
    next: Option<&'a Context>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let ctx = self.next?;
        let node: &'a Node = &ctx.node;
        self.next = node.parent.as_ref();
        Some(node)
    }
}

/// Cancels the context returned alongside it by [`Context::with_cancel`].
#[derive(Clone)]
pub struct CancelHandle {
    scope: Arc<CancelScope>,
}

impl CancelHandle {
    /// Idempotent.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

struct CancelScope {
    state: watch::Sender<bool>,
    children: Mutex<Vec<Weak<CancelScope>>>,
}

impl CancelScope {
    fn new() -> Arc<Self> {
        let (state, _) = watch::channel(false);
        Arc::new(Self {
            state,
            children: Mutex::new(Vec::new()),
        })
    }

    fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    fn cancel(&self) {
        let first = self.state.send_if_modified(|cancelled| {
            if *cancelled {
                return false;
            }
            *cancelled = true;
            true
        });
        if !first {
            return;
        }
        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    // The state check happens under the children lock, so a concurrent
    // `cancel` either sees the new child or the child sees the cancellation.
    fn attach(&self, child: &Arc<CancelScope>) {
        let mut children = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            drop(children);
            child.cancel();
            return;
        }
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(child));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct Tenant(&'static str);

    #[test]
    fn test_value_lookup_walks_to_root() {
        let root = Context::background().with_value(Tenant("acme"));
        let (leaf, _cancel) = root.with_value(7u32).with_cancel();

        assert_eq!(leaf.value::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(leaf.value::<u32>(), Some(&7));
        assert_eq!(leaf.value::<String>(), None);
    }

    #[test]
    fn test_nearest_value_shadows_ancestors() {
        let parent = Context::background().with_value(Tenant("outer"));
        let child = parent.with_value(Tenant("inner"));

        assert_eq!(child.value::<Tenant>(), Some(&Tenant("inner")));
        assert_eq!(parent.value::<Tenant>(), Some(&Tenant("outer")));
    }

    #[test]
    fn test_trace_id_is_shared_by_descendants() {
        let root = Context::background();
        let child = root.with_value(1u8).with_value(2u16);

        assert!(!root.trace_id().is_empty());
        assert_eq!(root.trace_id(), child.trace_id());
        assert_ne!(root.trace_id(), Context::background().trace_id());
    }

    #[test]
    fn test_cancel_propagates_down_not_up() {
        let (parent, cancel_parent) = Context::background().with_cancel();
        let (child, cancel_child) = parent.with_value(1u8).with_cancel();

        cancel_child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let (sibling, _keep) = parent.with_cancel();
        cancel_parent.cancel();
        cancel_parent.cancel();
        assert!(parent.is_cancelled());
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_context_starts_cancelled() {
        let (parent, cancel) = Context::background().with_cancel();
        cancel.cancel();

        let (child, handle) = parent.with_cancel();
        assert!(child.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_background_is_never_cancelled() {
        assert!(!Context::background().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let (ctx, cancel) = Context::background().with_cancel();
        let waiter = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.cancelled().await }
        });

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("cancelled() did not resolve")
            .unwrap();
    }
}
