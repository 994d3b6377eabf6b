//! Output publication boundary.
//!
//! The fusion cycle publishes track updates, dark-ship alerts and status
//! records through an [`EventSink`]. Production implementations wrap a
//! stream transport; tests and the sim harness use [`MemorySink`].

use crate::error::EnvError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Abstraction for publishing fusion output events.
///
/// Publication is fire-and-forget relative to the cycle: the orchestrator
/// buffers events and a forwarder task calls `publish`, so a slow sink
/// never stalls ingestion.
#[async_trait]
pub trait EventSink<E: Send + 'static>: Send + Sync + 'static {
    /// Publishes one event downstream.
    async fn publish(&self, event: E) -> Result<(), EnvError>;
}

/// In-memory sink that records every published event.
///
/// Used by the sim harness and tests to assert on the output stream.
pub struct MemorySink<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E> MemorySink<E> {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates an Arc-wrapped sink for sharing with the orchestrator.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl<E: Clone> MemorySink<E> {
    /// Returns a copy of everything published so far.
    pub fn events(&self) -> Vec<E> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events published so far.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// True when nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all recorded events.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl<E> Default for MemorySink<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Send + Sync + 'static> EventSink<E> for MemorySink<E> {
    async fn publish(&self, event: E) -> Result<(), EnvError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.publish("a").await.unwrap();
        sink.publish("b").await.unwrap();
        assert_eq!(sink.events(), vec!["a", "b"]);
        sink.clear();
        assert!(sink.is_empty());
    }
}
