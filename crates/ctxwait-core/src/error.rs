//! Unified Error Model
use std::time::Duration;
use thiserror::Error;

/// Raised only by the composed waits on [`crate::Waiter`]; deriving,
/// completing and plain waiting never fail.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    #[error("CANCELLED/context cancelled before scope completed")]
    Cancelled,

    #[error("TIMEOUT/scope not completed within {0:?}")]
    Elapsed(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_category_prefix() {
        assert_eq!(
            WaitError::Cancelled.to_string(),
            "CANCELLED/context cancelled before scope completed"
        );
        assert!(WaitError::Elapsed(Duration::from_millis(5))
            .to_string()
            .starts_with("TIMEOUT/"));
    }
}
