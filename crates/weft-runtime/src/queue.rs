//! Sentinel-terminated unbounded FIFO queues.
//!
//! The pipeline runs on a pair of these: one carries internal events from
//! the producer task, the other carries canonical events to the consumer.
//! Closing enqueues a sentinel behind everything already pushed, so a
//! reader always drains the full backlog before it sees the end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

enum QueueItem<T> {
    Item(T),
    Done,
}

/// Sending half. Clones share one closed flag.
pub struct EventQueueSender<T> {
    tx: mpsc::UnboundedSender<QueueItem<T>>,
    closed: Arc<AtomicBool>,
}

impl<T> Clone for EventQueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<T> EventQueueSender<T> {
    /// Enqueues one item. Items pushed after close are discarded.
    pub fn push(&self, item: T) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(QueueItem::Item(item));
    }

    /// Enqueues the terminating sentinel. Only the first call counts.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(QueueItem::Done);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Receiving half. Once the end is observed, `pop` stays `None`.
pub struct EventQueueReceiver<T> {
    rx: mpsc::UnboundedReceiver<QueueItem<T>>,
    done: bool,
}

impl<T> EventQueueReceiver<T> {
    /// Next item in FIFO order, or `None` once the sentinel has been
    /// observed or every sender is gone.
    pub async fn pop(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(QueueItem::Item(item)) => Some(item),
            Some(QueueItem::Done) | None => {
                self.done = true;
                None
            }
        }
    }

    /// Non-blocking variant; `None` means empty or finished.
    pub fn try_pop(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        match self.rx.try_recv() {
            Ok(QueueItem::Item(item)) => Some(item),
            Ok(QueueItem::Done) | Err(mpsc::error::TryRecvError::Disconnected) => {
                self.done = true;
                None
            }
            Err(mpsc::error::TryRecvError::Empty) => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// Builds a connected sender/receiver pair.
pub fn event_queue<T>() -> (EventQueueSender<T>, EventQueueReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventQueueSender {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        },
        EventQueueReceiver { rx, done: false },
    )
}
