//! In-memory publisher for tests/dev.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::event::DomainEvent;
use crate::publisher::EventPublisher;

/// Records published events instead of sending them anywhere.
///
/// - No IO
/// - Can be switched into a failing mode to exercise the "publish failed"
///   paths of callers
#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    published: Mutex<Vec<(String, DomainEvent)>>,
    failing: AtomicBool,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every publish returns `false` and records nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of `(routing_key, event)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, DomainEvent)> {
        match self.published.lock() {
            Ok(published) => published.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, routing_key: &str, event: DomainEvent) -> bool {
        if self.failing.load(Ordering::SeqCst) {
            return false;
        }

        let Ok(mut published) = self.published.lock() else {
            return false;
        };
        published.push((routing_key.to_string(), event));
        true
    }
}
