use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Operator stop request, shared with a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let handler_copy = token.clone();
        assert!(!token.is_cancelled());
        handler_copy.cancel();
        assert!(token.is_cancelled());
    }
}
