//! Outbound queue
//!
//! Buffers already-encoded frames created while the channel is not open. The
//! connection loop drains it with [`OutboundQueue::take_batch`], which covers
//! only the items present when the flush began; anything enqueued during the
//! flush waits for the next one. That keeps the FIFO guarantee without
//! reentrant draining.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

/// FIFO buffer between request submission and the physical channel
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame and nudge the connection task. While the channel is
    /// open the frame goes out immediately; otherwise it stays queued until
    /// the next flush.
    pub fn enqueue(&self, frame: String) {
        self.items
            .lock()
            .expect("outbound queue lock poisoned")
            .push_back(frame);
        self.notify.notify_one();
    }

    /// Snapshot-and-clear the queue. Items enqueued after this call stay
    /// queued for the next batch.
    pub fn take_batch(&self) -> VecDeque<String> {
        std::mem::take(&mut *self.items.lock().expect("outbound queue lock poisoned"))
    }

    /// Put an unsent batch remainder back at the head, ahead of anything
    /// enqueued since the batch was taken, so a flush that died mid-send
    /// loses nothing and keeps submission order.
    pub fn requeue_front(&self, batch: VecDeque<String>) {
        let mut items = self.items.lock().expect("outbound queue lock poisoned");
        for frame in batch.into_iter().rev() {
            items.push_front(frame);
        }
    }

    /// Wait until at least one enqueue happened since the last wait.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("outbound queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = OutboundQueue::new();
        queue.enqueue("a".into());
        queue.enqueue("b".into());
        queue.enqueue("c".into());

        let batch: Vec<String> = queue.take_batch().into();
        assert_eq!(batch, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_batch_excludes_later_enqueues() {
        let queue = OutboundQueue::new();
        queue.enqueue("a".into());

        let batch = queue.take_batch();
        // Enqueued "during the flush": must wait for the next batch
        queue.enqueue("b".into());

        assert_eq!(batch, VecDeque::from(vec!["a".to_string()]));
        assert_eq!(queue.len(), 1);
        let next: Vec<String> = queue.take_batch().into();
        assert_eq!(next, vec!["b"]);
    }

    #[test]
    fn test_requeue_front_preserves_order() {
        let queue = OutboundQueue::new();
        queue.enqueue("a".into());
        queue.enqueue("b".into());

        let batch = queue.take_batch();
        // A newer frame arrives while the flush is failing
        queue.enqueue("c".into());
        queue.requeue_front(batch);

        let drained: Vec<String> = queue.take_batch().into();
        assert_eq!(drained, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(OutboundQueue::new());

        // Permit stored by an enqueue before the wait resolves the wait
        queue.enqueue("a".into());
        queue.wait().await;

        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move { queue.wait().await })
        };
        tokio::task::yield_now().await;
        queue.enqueue("b".into());
        waiter.await.unwrap();
    }
}
