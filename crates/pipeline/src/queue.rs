//! Bounded inter-stage message queue.
//!
//! Every hop in the pipeline (reader → decoder → filterer → sink) is one
//! of these: a fixed-capacity blocking FIFO with two sticky terminal
//! latches, one per side.
//!
//! - [`finish`](MsgQueue::finish) is the producer-side latch: "no more
//!   messages are coming". Consumers drain whatever is already queued and
//!   only then observe the latched error from `recv` — so an EOF travels
//!   *behind* the last real message.
//! - [`cancel`](MsgQueue::cancel) is the consumer-side latch: "the
//!   receiver is gone". Producers observe it from `send` immediately,
//!   even while space remains — so a dying downstream stops its upstream
//!   without waiting for the queue to fill.
//!
//! Both latches are sticky: the first install wins and later installs
//! are ignored. The queue owns undelivered messages; [`flush`] drops
//! them (running their destructors) and dropping the queue releases the
//! rest.
//!
//! [`flush`]: MsgQueue::flush

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use pm_common::{EngineError, EngineResult};

struct Inner<T> {
    items: VecDeque<T>,
    /// Producer latch, observed by `recv` once drained.
    finished: Option<EngineError>,
    /// Consumer latch, observed by `send` immediately.
    cancelled: Option<EngineError>,
}

/// Typed, bounded, flush-capable blocking FIFO.
pub struct MsgQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> MsgQueue<T> {
    /// Create a queue holding at most `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                finished: None,
                cancelled: None,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Block until there is room, then enqueue `msg`.
    ///
    /// Fails immediately with the cancel latch if the consumer is gone;
    /// `msg` is dropped in that case.
    pub fn send(&self, msg: T) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(err) = inner.cancelled.clone() {
                return Err(err);
            }
            if inner.items.len() < self.capacity {
                inner.items.push_back(msg);
                self.not_empty.notify_one();
                return Ok(());
            }
            self.not_full.wait(&mut inner);
        }
    }

    /// Block until a message is available and dequeue it.
    ///
    /// Once the queue is drained, returns the finish latch if one is
    /// installed.
    pub fn recv(&self) -> EngineResult<T> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(msg) = inner.items.pop_front() {
                self.not_full.notify_one();
                return Ok(msg);
            }
            if let Some(err) = inner.finished.clone() {
                return Err(err);
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Drop every queued message without delivering it.
    pub fn flush(&self) {
        let drained: Vec<T> = {
            let mut inner = self.inner.lock();
            let drained = inner.items.drain(..).collect();
            self.not_full.notify_all();
            drained
        };
        // Message destructors (frame releases) run outside the lock.
        drop(drained);
    }

    /// Install the producer latch: no more messages are coming, draining
    /// is fine. Sticky; wakes blocked receivers.
    pub fn finish(&self, err: EngineError) {
        let mut inner = self.inner.lock();
        if inner.finished.is_none() {
            inner.finished = Some(err);
        }
        self.not_empty.notify_all();
    }

    /// Install the consumer latch: the receiver is gone, stop producing.
    /// Sticky; wakes blocked senders.
    pub fn cancel(&self, err: EngineError) {
        let mut inner = self.inner.lock();
        if inner.cancelled.is_none() {
            inner.cancelled = Some(err);
        }
        self.not_full.notify_all();
    }

    /// Number of undelivered messages.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn zero_capacity_panics() {
        let _: MsgQueue<u32> = MsgQueue::new(0);
    }

    #[test]
    fn fifo_order() {
        let q = MsgQueue::new(4);
        for i in 0..4 {
            q.send(i).unwrap();
        }
        for i in 0..4 {
            assert_eq!(q.recv().unwrap(), i);
        }
    }

    #[test]
    fn len_never_exceeds_capacity() {
        let q = Arc::new(MsgQueue::new(3));
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    q.send(i).unwrap();
                }
                q.finish(EngineError::Eof);
            })
        };
        let mut seen = Vec::new();
        loop {
            assert!(q.len() <= 3);
            match q.recv() {
                Ok(v) => seen.push(v),
                Err(err) => {
                    assert!(err.is_eof());
                    break;
                }
            }
        }
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
        producer.join().unwrap();
    }

    #[test]
    fn send_blocks_until_room() {
        let q = Arc::new(MsgQueue::new(1));
        q.send(1u32).unwrap();
        let unblocked = Arc::new(AtomicU32::new(0));
        let sender = {
            let q = q.clone();
            let unblocked = unblocked.clone();
            thread::spawn(move || {
                q.send(2).unwrap();
                unblocked.store(1, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(30));
        assert_eq!(unblocked.load(Ordering::SeqCst), 0, "send should block");
        assert_eq!(q.recv().unwrap(), 1);
        sender.join().unwrap();
        assert_eq!(unblocked.load(Ordering::SeqCst), 1);
        assert_eq!(q.recv().unwrap(), 2);
    }

    #[test]
    fn finish_observed_only_after_drain() {
        let q: MsgQueue<u32> = MsgQueue::new(4);
        q.send(1).unwrap();
        q.send(2).unwrap();
        q.finish(EngineError::Eof);
        assert_eq!(q.recv().unwrap(), 1);
        assert_eq!(q.recv().unwrap(), 2);
        assert_eq!(q.recv(), Err(EngineError::Eof));
        // Sticky: still EOF on the next call.
        assert_eq!(q.recv(), Err(EngineError::Eof));
    }

    #[test]
    fn finish_wakes_blocked_receiver() {
        let q: Arc<MsgQueue<u32>> = Arc::new(MsgQueue::new(1));
        let receiver = {
            let q = q.clone();
            thread::spawn(move || q.recv())
        };
        thread::sleep(Duration::from_millis(20));
        q.finish(EngineError::Eof);
        assert_eq!(receiver.join().unwrap(), Err(EngineError::Eof));
    }

    #[test]
    fn cancel_fails_send_immediately_even_with_room() {
        let q: MsgQueue<u32> = MsgQueue::new(4);
        q.cancel(EngineError::Eof);
        assert_eq!(q.send(1), Err(EngineError::Eof));
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn cancel_wakes_blocked_sender() {
        let q: Arc<MsgQueue<u32>> = Arc::new(MsgQueue::new(1));
        q.send(1).unwrap();
        let sender = {
            let q = q.clone();
            thread::spawn(move || q.send(2))
        };
        thread::sleep(Duration::from_millis(20));
        q.cancel(EngineError::External("gone".into()));
        assert_eq!(
            sender.join().unwrap(),
            Err(EngineError::External("gone".into()))
        );
        // The queued message is still there for a draining consumer.
        assert_eq!(q.recv().unwrap(), 1);
    }

    #[test]
    fn first_latch_wins() {
        let q: MsgQueue<u32> = MsgQueue::new(1);
        q.finish(EngineError::InvalidData);
        q.finish(EngineError::Eof);
        assert_eq!(q.recv(), Err(EngineError::InvalidData));
    }

    #[test]
    fn flush_drops_pending_messages() {
        struct Counted(Arc<AtomicU32>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicU32::new(0));
        let q = MsgQueue::new(4);
        for _ in 0..3 {
            q.send(Counted(drops.clone())).unwrap();
        }
        assert_eq!(q.len(), 3);
        q.flush();
        assert_eq!(q.len(), 0);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn drop_releases_undelivered_messages() {
        struct Counted(Arc<AtomicU32>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicU32::new(0));
        {
            let q = MsgQueue::new(4);
            q.send(Counted(drops.clone())).unwrap();
            q.send(Counted(drops.clone())).unwrap();
        }
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }
}
