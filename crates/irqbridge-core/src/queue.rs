//! Bounded FIFO between interrupt context and the drain hook.
//!
//! The ring indices live behind a `parking_lot::Mutex` that is held only for
//! the index arithmetic and the copy of a single entry. That is the
//! host-side equivalent of masking the interrupt source for a few
//! instructions: the consumer releases the lock before invoking anything.
//!
//! The producer side never blocks. [`EventQueue::push`] spins on `try_lock`
//! for at most [`PUSH_SPINS`] attempts; if the ring is still locked the
//! entry is dropped and counted exactly like a push into a full queue.
//! The consumer side ([`EventQueue::pop`]) may block, since it only ever
//! waits for another short critical section.
//!
//! Overflow bookkeeping is lock-free so pollers can read it cheaply.

use crate::QueueEntry;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Default compile-time queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// `try_lock` attempts made by [`EventQueue::push`] before giving up.
pub const PUSH_SPINS: u32 = 128;

struct Ring<const N: usize> {
    buf: [Option<QueueEntry>; N],
    head: usize,
    count: usize,
}

impl<const N: usize> Ring<N> {
    fn tail(&self) -> usize {
        (self.head + self.count) % N
    }
}

/// Fixed-capacity FIFO of [`QueueEntry`].
///
/// `push` is called from interrupt context, `pop` from the cooperative
/// context only. Capacity `N` is fixed at compile time.
///
/// # Invariants
///
/// - `0 <= len() <= N`
/// - a push into a full queue is rejected and leaves the buffer untouched
/// - entries come out in exactly the order they went in
pub struct EventQueue<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    ring: Mutex<Ring<N>>,
    overflowed: AtomicBool,
    dropped: AtomicU64,
}

impl<const N: usize> EventQueue<N> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        const { assert!(N > 0, "EventQueue capacity must be non-zero") };
        Self {
            ring: Mutex::new(Ring {
                buf: [None; N],
                head: 0,
                count: 0,
            }),
            overflowed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends `entry` at the tail.
    ///
    /// Returns `false` if the queue is full, or if the ring stayed locked for
    /// [`PUSH_SPINS`] attempts. In both cases the sticky overflow flag is set
    /// and the dropped counter is incremented. The call never blocks.
    pub fn push(&self, entry: QueueEntry) -> bool {
        let Some(mut ring) = self.try_lock_ring() else {
            self.record_drop();
            return false;
        };
        if ring.count == N {
            drop(ring);
            self.record_drop();
            return false;
        }
        let tail = ring.tail();
        ring.buf[tail] = Some(entry);
        ring.count += 1;
        true
    }

    fn try_lock_ring(&self) -> Option<MutexGuard<'_, Ring<N>>> {
        for _ in 0..PUSH_SPINS {
            if let Some(ring) = self.ring.try_lock() {
                return Some(ring);
            }
            std::hint::spin_loop();
        }
        None
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.overflowed.store(true, Ordering::Release);
    }

    /// Removes and returns the head entry, or `None` if empty.
    pub fn pop(&self) -> Option<QueueEntry> {
        let mut ring = self.ring.lock();
        if ring.count == 0 {
            return None;
        }
        let head = ring.head;
        let entry = ring.buf[head].take();
        ring.head = (head + 1) % N;
        ring.count -= 1;
        entry
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.lock().count == 0
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().count
    }

    /// Compile-time capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Reads and clears the sticky overflow flag.
    ///
    /// Returns `true` exactly once per overflow episode.
    pub fn take_overflow_flag(&self) -> bool {
        self.overflowed.swap(false, Ordering::AcqRel)
    }

    /// Reads and clears the number of events dropped since the last call.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::AcqRel)
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> std::fmt::Debug for EventQueue<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("capacity", &N)
            .field("len", &self.len())
            .field("overflowed", &self.overflowed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventType, ResourceId};
    use std::sync::Arc;

    fn entry(event: EventType, raw: u32) -> QueueEntry {
        QueueEntry::new(event, ResourceId(raw))
    }

    // ── FIFO ─────────────────────────────────────────────────

    #[test]
    fn pop_empty_returns_none() {
        let q: EventQueue<4> = EventQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn fifo_order_preserved() {
        let q: EventQueue<8> = EventQueue::new();
        let pushed: Vec<_> = (0..8)
            .map(|i| {
                let event = if i % 2 == 0 {
                    EventType::TimerMatch
                } else {
                    EventType::GpioPosEdge
                };
                entry(event, i)
            })
            .collect();
        for e in &pushed {
            assert!(q.push(*e));
        }
        let popped: Vec<_> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(popped, pushed);
    }

    #[test]
    fn wraps_around_the_ring() {
        let q: EventQueue<3> = EventQueue::new();
        for round in 0..5u32 {
            assert!(q.push(entry(EventType::UartRx, round * 2)));
            assert!(q.push(entry(EventType::UartRx, round * 2 + 1)));
            assert_eq!(q.pop(), Some(entry(EventType::UartRx, round * 2)));
            assert_eq!(q.pop(), Some(entry(EventType::UartRx, round * 2 + 1)));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn duplicate_entries_are_not_coalesced() {
        let q: EventQueue<4> = EventQueue::new();
        let e = entry(EventType::TimerMatch, 0);
        assert!(q.push(e));
        assert!(q.push(e));
        assert_eq!(q.len(), 2);
    }

    // ── Overflow ─────────────────────────────────────────────

    #[test]
    fn push_beyond_capacity_is_rejected() {
        let q: EventQueue<4> = EventQueue::new();
        for i in 0..4 {
            assert!(q.push(entry(EventType::TimerMatch, i)));
        }
        assert!(!q.push(entry(EventType::TimerMatch, 99)));
        assert_eq!(q.len(), 4);
        for i in 0..4 {
            assert_eq!(q.pop(), Some(entry(EventType::TimerMatch, i)));
        }
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn overflow_flag_reported_once() {
        let q: EventQueue<1> = EventQueue::new();
        assert!(!q.take_overflow_flag());
        assert!(q.push(entry(EventType::SpiDone, 0)));
        assert!(!q.push(entry(EventType::SpiDone, 1)));
        assert!(q.take_overflow_flag());
        assert!(!q.take_overflow_flag());

        q.pop();
        assert!(q.push(entry(EventType::SpiDone, 2)));
        assert!(!q.take_overflow_flag());
        assert!(!q.push(entry(EventType::SpiDone, 3)));
        assert!(q.take_overflow_flag());
    }

    #[test]
    fn dropped_counter_counts_every_rejection() {
        let q: EventQueue<2> = EventQueue::new();
        for i in 0..5 {
            q.push(entry(EventType::GpioNegEdge, i));
        }
        assert_eq!(q.take_dropped(), 3);
        assert_eq!(q.take_dropped(), 0);
    }

    // ── Concurrency ──────────────────────────────────────────

    #[test]
    fn push_while_locked_drops_instead_of_blocking() {
        let q: EventQueue<4> = EventQueue::new();
        {
            let _held = q.ring.lock();
            assert!(!q.push(entry(EventType::UartRx, 1)));
        }
        assert_eq!(q.take_dropped(), 1);
        assert!(q.take_overflow_flag());
        assert!(q.is_empty());

        assert!(q.push(entry(EventType::UartRx, 2)));
        assert_eq!(q.pop().map(|e| e.resource.raw()), Some(2));
    }

    #[test]
    fn push_from_other_thread_returns_while_locked() {
        let q: Arc<EventQueue<4>> = Arc::new(EventQueue::new());
        let held = q.ring.lock();
        let pushed = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || q.push(entry(EventType::TimerMatch, 0)))
                .join()
                .unwrap()
        };
        drop(held);
        assert!(!pushed);
        assert_eq!(q.take_dropped(), 1);
    }

    #[test]
    fn producer_thread_and_consumer_keep_order() {
        const TOTAL: u32 = 2_000;
        let q: Arc<EventQueue<16>> = Arc::new(EventQueue::new());
        let producer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                let mut next = 0;
                while next < TOTAL {
                    if q.push(entry(EventType::TimerMatch, next)) {
                        next += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        };

        let mut expected = 0;
        while expected < TOTAL {
            if let Some(e) = q.pop() {
                assert_eq!(e.resource.raw(), expected);
                expected += 1;
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert!(q.is_empty());
    }
}
