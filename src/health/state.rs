//! Gateway readiness state.
//!
//! # States
//! - Starting: config loaded but the listener is not serving yet
//! - Ready: startup complete, traffic accepted
//!
//! One-way transition; the flag never goes back to starting.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct ReadinessState {
    ready: AtomicBool,
}

impl ReadinessState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::AcqRel) {
            tracing::info!("Gateway ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_ready() {
        let state = ReadinessState::new();
        assert!(!state.is_ready());
        state.mark_ready();
        state.mark_ready();
        assert!(state.is_ready());
    }
}
