//! Shared safe-mode flag.
//!
//! The economic-calendar monitor flips this flag when a high-impact event
//! is near. It is an explicit shared handle passed into rule evaluation,
//! not process-global state; whether a raised flag suppresses signals is
//! the engine's decision (see `SignalEngine::suppress_in_safe_mode`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct RiskContext {
    safe_mode: Arc<AtomicBool>,
}

impl RiskContext {
    pub fn new() -> Self {
        RiskContext::default()
    }

    pub fn set_safe_mode(&self, on: bool) {
        self.safe_mode.store(on, Ordering::Relaxed);
    }

    pub fn is_safe_mode(&self) -> bool {
        self.safe_mode.load(Ordering::Relaxed)
    }
}
