//! Bounded detection hand-off queues.
//!
//! One queue per sensor stream. Producers (transport consumers) block on
//! `send` when the queue is full: backpressure, never drop, since a lost
//! detection corrupts fusion while a delayed one merely ages. The cycle
//! side drains non-blocking so the critical section never waits on a
//! producer.

use crate::error::EnvError;
use tokio::sync::mpsc;

/// Sending half of a detection queue, held by a transport consumer task.
#[derive(Debug)]
pub struct QueueSender<T> {
    name: String,
    tx: mpsc::Sender<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send> QueueSender<T> {
    /// Enqueues one item, waiting if the queue is full (backpressure).
    pub async fn send(&self, item: T) -> Result<(), EnvError> {
        self.tx
            .send(item)
            .await
            .map_err(|_| EnvError::feed_closed(self.name.clone()))
    }

    /// Enqueues one item without waiting.
    ///
    /// Used by synchronous producers (the sim harness). Fails with
    /// `PublishOverflow` when the queue is full rather than blocking.
    pub fn try_send(&self, item: T) -> Result<(), EnvError> {
        use mpsc::error::TrySendError;
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => EnvError::overflow(self.name.clone()),
            TrySendError::Closed(_) => EnvError::feed_closed(self.name.clone()),
        })
    }
}

/// Receiving half of a detection queue, owned by the fusion cycle.
#[derive(Debug)]
pub struct DetectionQueue<T> {
    name: String,
    rx: mpsc::Receiver<T>,
}

impl<T: Send> DetectionQueue<T> {
    /// Creates a bounded queue and returns both halves.
    pub fn bounded(name: impl Into<String>, capacity: usize) -> (QueueSender<T>, Self) {
        let name = name.into();
        let (tx, rx) = mpsc::channel(capacity);
        (
            QueueSender {
                name: name.clone(),
                tx,
            },
            Self { name, rx },
        )
    }

    /// Queue name (the sensor stream it carries).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drains up to `max` pending items without blocking.
    ///
    /// Returns the drained items in arrival order. The cap keeps one noisy
    /// sensor from starving a cycle.
    pub fn drain(&mut self, max: usize) -> Vec<T> {
        let mut items = Vec::new();
        while items.len() < max {
            match self.rx.try_recv() {
                Ok(item) => items.push(item),
                Err(_) => break,
            }
        }
        items
    }

    /// True when all senders have been dropped and the queue is empty.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_in_order() {
        let (tx, mut queue) = DetectionQueue::bounded("radar", 8);
        for i in 0..5 {
            tx.send(i).await.unwrap();
        }
        assert_eq!(queue.drain(10), vec![0, 1, 2, 3, 4]);
        assert!(queue.drain(10).is_empty());
    }

    #[tokio::test]
    async fn test_drain_respects_cap() {
        let (tx, mut queue) = DetectionQueue::bounded("ais", 8);
        for i in 0..6 {
            tx.send(i).await.unwrap();
        }
        assert_eq!(queue.drain(4).len(), 4);
        assert_eq!(queue.drain(4).len(), 2);
    }

    #[tokio::test]
    async fn test_try_send_overflow() {
        let (tx, _queue) = DetectionQueue::<u32>::bounded("sat", 2);
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        assert!(matches!(
            tx.try_send(3),
            Err(EnvError::PublishOverflow(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_after_sender_drop() {
        let (tx, mut queue) = DetectionQueue::bounded("drone", 2);
        tx.send(7u32).await.unwrap();
        drop(tx);
        assert!(!queue.is_closed());
        assert_eq!(queue.drain(10), vec![7]);
        assert!(queue.is_closed());
    }
}
