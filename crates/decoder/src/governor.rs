//! Buffer-count governor: back-pressure for hardware-decoded buffers.
//!
//! A hardware decoder can outrun the client. Every decoded buffer that
//! leaves the decoder — sitting in the reorder stage, queued toward the
//! sink, or held by the client — is one reference here; the client
//! releasing a frame is the only credit. When the count reaches the
//! ceiling, the decode callback blocks on its `adjust_ref(+1)` and the
//! whole decode side stalls cleanly instead of exhausting the decoder's
//! internal pool with far worse diagnostics.
//!
//! The ceiling itself breathes: the reorder stage grows it by one for
//! every frame it stages and shrinks it back on emit, so reorder slack
//! never eats into the client's budget.
//!
//! The governor starts with one reference of its own — the owning decode
//! context — released at teardown via [`release_owner`]. Memory lifetime
//! is the `Arc`'s business; a straggler callback firing after teardown
//! finds a valid (if finished) governor and is absorbed.
//!
//! [`release_owner`]: BufferGovernor::release_owner

use parking_lot::{Condvar, Mutex};
use tracing::trace;

struct GovState {
    /// Buffers alive outside the decoder, plus one for the context.
    refcount: i32,
    /// Current ceiling.
    refmax: i32,
}

/// Condvar-gated reference budget for in-flight hardware buffers.
pub struct BufferGovernor {
    state: Mutex<GovState>,
    cond: Condvar,
}

impl BufferGovernor {
    /// `max_in_flight` is the number of buffers allowed out of the
    /// decoder at once (beyond the context's own reference).
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            state: Mutex::new(GovState {
                refcount: 1,
                refmax: max_in_flight as i32 + 1,
            }),
            cond: Condvar::new(),
        }
    }

    /// Grow or shrink the ceiling (reorder staging slack).
    pub fn adjust_max(&self, delta: i32) {
        let mut st = self.state.lock();
        st.refmax += delta;
        trace!(refcount = st.refcount - 1, refmax = st.refmax - 1, "governor max adjusted");
        self.cond.notify_all();
    }

    /// Adjust the reference count. A positive adjustment that lands at
    /// the ceiling blocks until a release makes room; a negative one is
    /// a release and never blocks.
    pub fn adjust_ref(&self, delta: i32) {
        let mut st = self.state.lock();
        st.refcount += delta;
        trace!(refcount = st.refcount - 1, refmax = st.refmax - 1, "governor ref adjusted");
        if delta > 0 {
            while st.refcount >= st.refmax {
                self.cond.wait(&mut st);
            }
        }
        debug_assert!(st.refcount >= 0, "governor refcount went negative");
        self.cond.notify_all();
    }

    /// Release the owning context's reference at session teardown.
    pub fn release_owner(&self) {
        self.adjust_ref(-1);
    }

    /// Current `(refcount, refmax)` snapshot, for diagnostics and tests.
    pub fn counts(&self) -> (i32, i32) {
        let st = self.state.lock();
        (st.refcount, st.refmax)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_with_owner_reference() {
        let g = BufferGovernor::new(3);
        assert_eq!(g.counts(), (1, 4));
    }

    #[test]
    fn invariant_holds_after_each_operation() {
        let g = BufferGovernor::new(3);
        // Two acquires fit under refmax 4 without blocking.
        for _ in 0..2 {
            g.adjust_ref(1);
            let (count, max) = g.counts();
            assert!(count < max, "{count} >= {max}");
        }
        // Staging slack admits one more.
        g.adjust_max(1);
        g.adjust_ref(1);
        let (count, max) = g.counts();
        assert!(count < max);
        g.adjust_max(-1);
        for _ in 0..3 {
            g.adjust_ref(-1);
            let (count, max) = g.counts();
            assert!((0..=max).contains(&count));
        }
    }

    #[test]
    fn submitter_blocks_at_ceiling_until_release() {
        // max_in_flight = 2 → refmax 3: the owner plus one buffer fit,
        // the next acquire is counted but waits.
        let g = Arc::new(BufferGovernor::new(2));
        g.adjust_ref(1);
        let acquired = Arc::new(AtomicBool::new(false));
        let blocked = {
            let g = g.clone();
            let acquired = acquired.clone();
            thread::spawn(move || {
                g.adjust_ref(1);
                acquired.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(30));
        assert!(
            !acquired.load(Ordering::SeqCst),
            "acquire at the ceiling must block"
        );
        g.adjust_ref(-1);
        blocked.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn raising_the_ceiling_unblocks_a_waiter() {
        let g = Arc::new(BufferGovernor::new(1));
        let waiter = {
            let g = g.clone();
            thread::spawn(move || g.adjust_ref(1))
        };
        thread::sleep(Duration::from_millis(20));
        // Reorder staging grows the budget; the waiter proceeds.
        g.adjust_max(1);
        waiter.join().unwrap();
        assert_eq!(g.counts(), (2, 3));
    }

    #[test]
    fn owner_release_reaches_zero() {
        let g = BufferGovernor::new(3);
        g.release_owner();
        assert_eq!(g.counts().0, 0);
    }
}
