// THEORY:
// The engine moves data between threads through three deliberately different
// queueing disciplines, plus one stop flag. They are separate types so that a
// "latest wins" channel can never be used where completeness matters.
//
// 1.  **Slot** (`slot_channel`): a single-slot overwrite buffer. The producer never
//     blocks; publishing replaces whatever the consumer has not taken yet. Used for
//     the camera preview tile.
// 2.  **Bounded** (`bounded_channel`): a small FIFO that refuses to grow. The
//     producer offers a value and, when the queue is full, the value is dropped on
//     the producer side. The consumer takes everything and keeps only the newest.
//     Used for the background video.
// 3.  **Fifo** (`fifo_channel`): an unbounded, lossless, ordered queue. Every value
//     is delivered exactly once, in production order. Used for attention events.
// 4.  **StopSignal**: a single-writer, many-reader flag backed by a `watch` channel.
//     Raising it twice is a no-op.
//
// All consumer-side reads are `try`-style: an empty channel is a normal, silent
// condition and never blocks the dispatcher.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};

// --- Slot -------------------------------------------------------------------

/// Creates a single-slot "latest wins" channel.
pub fn slot_channel<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let slot = Arc::new(Mutex::new(None));
    (
        SlotSender { slot: Arc::clone(&slot) },
        SlotReceiver { slot },
    )
}

pub struct SlotSender<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> SlotSender<T> {
    /// Stores `value`, replacing any value the consumer has not taken.
    /// Returns `true` when an older value was overwritten.
    pub fn publish(&self, value: T) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.replace(value).is_some()
    }
}

pub struct SlotReceiver<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> SlotReceiver<T> {
    /// Takes the stored value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

// --- Bounded ----------------------------------------------------------------

/// Outcome of offering a value to a bounded channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Sent,
    /// The queue was full; the value was discarded.
    Dropped,
    /// The consumer is gone.
    Closed,
}

/// Creates a bounded channel that drops on the producer side when full.
pub fn bounded_channel<T>(capacity: usize) -> (BoundedSender<T>, BoundedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BoundedSender { tx }, BoundedReceiver { rx })
}

pub struct BoundedSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> BoundedSender<T> {
    pub fn offer(&self, value: T) -> Offer {
        match self.tx.try_send(value) {
            Ok(()) => Offer::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => Offer::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

pub struct BoundedReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> BoundedReceiver<T> {
    /// Drains every queued value and returns only the newest.
    pub fn take_latest(&mut self) -> Option<T> {
        let mut latest = None;
        while let Ok(value) = self.rx.try_recv() {
            latest = Some(value);
        }
        latest
    }
}

// --- Fifo -------------------------------------------------------------------

/// Creates a lossless, ordered channel.
pub fn fifo_channel<T>() -> (FifoSender<T>, FifoReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FifoSender { tx }, FifoReceiver { rx })
}

pub struct FifoSender<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> FifoSender<T> {
    /// Enqueues `value`. Returns `false` when the consumer is gone.
    pub fn send(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

pub struct FifoReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> FifoReceiver<T> {
    /// Returns the oldest pending value without blocking.
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

// --- Stop -------------------------------------------------------------------

/// Cooperative stop flag owned by whoever spawned a background task.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raises the flag. Safe to call any number of times.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// A read-only view handed to the background task.
    pub fn token(&self) -> StopToken {
        StopToken { rx: self.tx.subscribe() }
    }
}

/// The reader side of a `StopSignal`, checked once per loop iteration.
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_keeps_only_latest() {
        let (tx, rx) = slot_channel();
        assert!(!tx.publish(1));
        assert!(tx.publish(2));
        assert_eq!(rx.take(), Some(2));
        assert_eq!(rx.take(), None);
    }

    #[test]
    fn bounded_drops_when_full() {
        let (tx, mut rx) = bounded_channel(2);
        assert_eq!(tx.offer(1), Offer::Sent);
        assert_eq!(tx.offer(2), Offer::Sent);
        assert_eq!(tx.offer(3), Offer::Dropped);
        assert_eq!(rx.take_latest(), Some(2));
        assert_eq!(rx.take_latest(), None);
        assert_eq!(tx.offer(4), Offer::Sent);
        assert_eq!(rx.take_latest(), Some(4));
    }

    #[test]
    fn bounded_reports_closed_consumer() {
        let (tx, rx) = bounded_channel::<u8>(2);
        drop(rx);
        assert_eq!(tx.offer(1), Offer::Closed);
    }

    #[test]
    fn fifo_preserves_order() {
        let (tx, mut rx) = fifo_channel();
        for i in 0..100 {
            assert!(tx.send(i));
        }
        let received: Vec<i32> = std::iter::from_fn(|| rx.try_next()).collect();
        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn fifo_send_fails_without_consumer() {
        let (tx, rx) = fifo_channel::<u8>();
        drop(rx);
        assert!(!tx.send(1));
    }

    #[test]
    fn stop_is_idempotent_and_visible_to_tokens() {
        let signal = StopSignal::new();
        let token = signal.token();
        assert!(!token.is_stopped());
        signal.stop();
        signal.stop();
        assert!(token.is_stopped());
        assert!(signal.is_stopped());
        assert!(signal.token().is_stopped());
    }

    #[test]
    fn stop_crosses_threads() {
        let signal = StopSignal::new();
        let token = signal.token();
        let worker = std::thread::spawn(move || {
            while !token.is_stopped() {
                std::thread::yield_now();
            }
        });
        signal.stop();
        worker.join().unwrap();
    }
}
