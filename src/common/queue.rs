//! Message queues between the engine's background tasks.
//!
//! `Queue` carries wake requests to the scheduler, `BroadcastQueue` fans
//! enrollment events out to the channel and the monitor.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{LeadflowError, Result};

/// Bounded MPMC queue backed by flume.
///
/// Each message is consumed by exactly one receiver.
#[derive(Clone)]
pub struct Queue<T> {
    receiver: Arc<flume::Receiver<T>>,
    sender: Arc<flume::Sender<T>>,
}

#[allow(unused)]
impl<T> Queue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (tx, rx) = flume::bounded(cap);

        Arc::new(Self {
            receiver: Arc::new(rx),
            sender: Arc::new(tx),
        })
    }

    /// Send without blocking. Fails when the queue is full.
    pub fn try_send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.try_send(msg).map_err(|e| LeadflowError::Queue(e.to_string()))
    }

    /// Pop a pending message, if any.
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub async fn next_async(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }

    pub async fn send_async(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.send_async(msg).await.map_err(|e| LeadflowError::Queue(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Broadcast queue, every subscriber sees every message.
#[derive(Clone)]
pub struct BroadcastQueue<T> {
    sender: Arc<broadcast::Sender<T>>,
}

impl<T: Clone> BroadcastQueue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(cap);

        Arc::new(Self {
            sender: Arc::new(tx),
        })
    }

    /// Publish a message. Having no subscriber is not an error.
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        if self.sender.receiver_count() == 0 {
            return Ok(());
        }
        self.sender.send(msg).map_err(|e| LeadflowError::Queue(e.to_string()))?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_try_send_full() {
        let queue = Queue::<u32>::new(1);
        assert!(queue.try_send(1).is_ok());
        assert!(matches!(queue.try_send(2), Err(LeadflowError::Queue(_))));
        assert_eq!(queue.try_next(), Some(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let queue = BroadcastQueue::<u32>::new(4);
        assert!(queue.send(1).is_ok());

        let mut rx = queue.subscribe();
        queue.send(2).unwrap();
        assert_eq!(rx.try_recv().unwrap(), 2);
    }
}
