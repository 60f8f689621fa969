//! ctxwait core: request-scoped contexts with a waitable completion signal
//!
//! [`Context::with_wait`] turns a context into a waitable scope and hands
//! back a [`Waiter`]; any task holding a context inside that scope can call
//! [`Context::complete`] to release every waiter, exactly once.
//!
//! ```no_run
//! # async fn run() {
//! use ctxwait_core::Context;
//!
//! let (ctx, waiter) = Context::background().with_wait();
//! tokio::spawn(async move {
//!     // ... work ...
//!     ctx.complete();
//! });
//! waiter.wait().await;
//! # }
//! ```

pub mod context;
pub mod error;
pub mod scope;
pub mod signal;

pub use context::{CancelHandle, Context};
pub use error::WaitError;
pub use scope::Waiter;
pub use signal::CompletionSignal;

/// ctxwait version
pub const CTXWAIT_VERSION: &str = "1.0.0";
