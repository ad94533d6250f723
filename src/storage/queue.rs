//! Circular event queue stored in non-volatile memory with minimized writes.
//!
//! Holds completed motion events across power cycles until the modem link
//! confirms their delivery. The queue is a fixed-capacity FIFO addressed by a
//! two-byte header; the header is the sole authority on which slots are
//! valid, and entry bytes outside the valid window are never read.
//!
//! # Image Layout
//! ```text
//! byte 0        : count (0..=10)
//! byte 1        : head  (index of oldest entry, 0..10)
//! bytes 2..16   : reserved
//! bytes 16..96  : 10 entries x 8 bytes (duration_ms LE32, timestamp LE32)
//! ```
//!
//! # Wear Budget
//!
//! The header changes on every operation while entry bytes change only when
//! a slot is filled, so the two are kept apart and every byte goes through a
//! change-detecting write. One event costs at most 8 byte-writes to enqueue
//! (plus the count byte) and at most 2 to dequeue (head and count); enqueue
//! never touches the head byte at all. Vacated slots are not cleared; they
//! fall out of the valid window and get overwritten on a future wraparound.

use crate::storage::nv::NvStore;
use tracing::debug;

/// Fixed number of entry slots.
pub const MAX_ENTRIES: u8 = 10;

/// Size in bytes of the full storage image.
pub const IMAGE_LEN: usize = DATA_START + MAX_ENTRIES as usize * ENTRY_LEN;

const ADDR_COUNT: usize = 0;
const ADDR_HEAD: usize = 1;
const DATA_START: usize = 16;
const ENTRY_LEN: usize = 8;

/// A completed motion interval. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Length of the interval in milliseconds
    pub duration_ms: u32,
    /// Monotonic clock value (ms) when the interval ended
    pub timestamp: u32,
}

/// Fixed-capacity durable FIFO of motion events.
///
/// Single producer (the motion detector appends at the tail), single
/// consumer (the modem link removes at the head). The in-RAM `count`/`head`
/// mirror the persisted header at all times.
pub struct EventQueue<S: NvStore> {
    store: S,
    count: u8,
    head: u8,
}

impl<S: NvStore> EventQueue<S> {
    /// Load the queue from the persisted header.
    ///
    /// An out-of-range header (count above capacity, or head outside the
    /// slot range) means uninitialized or corrupted storage; it is healed
    /// silently to an empty queue rather than trusted.
    pub fn open(mut store: S) -> Self {
        let mut count = store.read(ADDR_COUNT);
        let mut head = store.read(ADDR_HEAD);
        if count > MAX_ENTRIES || head >= MAX_ENTRIES {
            debug!(count, head, "invalid stored header, resetting to empty");
            count = 0;
            head = 0;
            // Persist the healed header so a stale head byte cannot come
            // back on the next boot. A clean header costs no writes here.
            store.update(ADDR_COUNT, 0);
            store.update(ADDR_HEAD, 0);
            store.sync();
        }
        Self { store, count, head }
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.count >= MAX_ENTRIES
    }

    /// Whether no entry is queued.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of queued entries.
    pub fn len(&self) -> u8 {
        self.count
    }

    /// Append an event at the tail.
    ///
    /// Returns false without mutating anything when the queue is full. On
    /// success only the entry bytes and the count byte are persisted; the
    /// head byte never changes on enqueue.
    pub fn enqueue(&mut self, event: Event) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = (self.head + self.count) % MAX_ENTRIES;
        self.write_entry(tail, event);
        self.count += 1;
        self.store.update(ADDR_COUNT, self.count);
        self.store.sync();
        true
    }

    /// Read the oldest entry without removing it. Pure; safe to call every
    /// tick.
    pub fn peek_oldest(&self) -> Option<Event> {
        if self.is_empty() {
            return None;
        }
        Some(self.read_entry(self.head))
    }

    /// Remove the oldest entry after its delivery was confirmed.
    ///
    /// Returns false when the queue is empty. The vacated slot's bytes are
    /// left in place; the header alone makes them unreachable.
    pub fn dequeue(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.head = (self.head + 1) % MAX_ENTRIES;
        self.count -= 1;
        self.store.update(ADDR_HEAD, self.head);
        self.store.update(ADDR_COUNT, self.count);
        self.store.sync();
        true
    }

    /// Copy of the valid window, oldest first. Diagnostic use.
    pub fn snapshot(&self) -> Vec<Event> {
        (0..self.count)
            .map(|i| self.read_entry((self.head + i) % MAX_ENTRIES))
            .collect()
    }

    /// Borrow the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn write_entry(&mut self, index: u8, event: Event) {
        let base = DATA_START + index as usize * ENTRY_LEN;
        for (i, byte) in event
            .duration_ms
            .to_le_bytes()
            .into_iter()
            .chain(event.timestamp.to_le_bytes())
            .enumerate()
        {
            self.store.update(base + i, byte);
        }
    }

    fn read_entry(&self, index: u8) -> Event {
        let base = DATA_START + index as usize * ENTRY_LEN;
        let mut raw = [0u8; ENTRY_LEN];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = self.store.read(base + i);
        }
        Event {
            duration_ms: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            timestamp: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::nv::MemNv;

    fn fresh_queue() -> EventQueue<MemNv> {
        EventQueue::open(MemNv::new(IMAGE_LEN))
    }

    fn event(duration_ms: u32, timestamp: u32) -> Event {
        Event {
            duration_ms,
            timestamp,
        }
    }

    #[test]
    fn starts_empty_on_blank_image() {
        let q = fresh_queue();
        assert!(q.is_empty());
        assert!(!q.is_full());
        assert_eq!(q.len(), 0);
        assert_eq!(q.peek_oldest(), None);
    }

    #[test]
    fn fifo_ordering() {
        let mut q = fresh_queue();
        assert!(q.enqueue(event(500, 1000)));
        assert!(q.enqueue(event(1200, 2500)));
        assert_eq!(q.len(), 2);

        assert_eq!(q.peek_oldest(), Some(event(500, 1000)));
        assert!(q.dequeue());
        assert_eq!(q.peek_oldest(), Some(event(1200, 2500)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn peek_is_idempotent() {
        let mut q = fresh_queue();
        q.enqueue(event(7, 8));
        let first = q.peek_oldest();
        assert_eq!(q.peek_oldest(), first);
        assert_eq!(q.peek_oldest(), first);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let mut q = fresh_queue();
        let e = event(0xDEAD_BEEF, 0x0102_0304);
        assert!(q.enqueue(e));
        assert_eq!(q.peek_oldest(), Some(e));
    }

    #[test]
    fn enqueue_on_full_is_a_noop() {
        let mut q = fresh_queue();
        for i in 0..u32::from(MAX_ENTRIES) {
            assert!(q.enqueue(event(i, i)));
        }
        assert!(q.is_full());
        let before = q.store().write_count();
        assert!(!q.enqueue(event(99, 99)));
        assert_eq!(q.len(), MAX_ENTRIES);
        assert_eq!(q.store().write_count(), before);
        assert_eq!(q.peek_oldest(), Some(event(0, 0)));
    }

    #[test]
    fn dequeue_on_empty_is_a_noop() {
        let mut q = fresh_queue();
        let before = q.store().write_count();
        assert!(!q.dequeue());
        assert_eq!(q.store().write_count(), before);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn count_and_head_stay_in_range() {
        let mut q = fresh_queue();
        for round in 0..5u32 {
            for i in 0..7u32 {
                q.enqueue(event(round * 10 + i, i));
                assert!(q.len() <= MAX_ENTRIES);
            }
            for _ in 0..7 {
                q.dequeue();
            }
            assert!(q.store().read(1) < MAX_ENTRIES);
        }
        assert!(q.is_empty());
    }

    #[test]
    fn wraps_into_the_vacated_slot() {
        let mut q = fresh_queue();
        for i in 0..u32::from(MAX_ENTRIES) {
            assert!(q.enqueue(event(i, i)));
        }
        assert!(q.dequeue());
        assert!(q.enqueue(event(0xAB, 0xCD)));

        // The new entry lands in slot (original head + capacity) % capacity,
        // i.e. the slot just vacated.
        let base = 16;
        let raw = q.store().as_bytes();
        assert_eq!(
            u32::from_le_bytes([raw[base], raw[base + 1], raw[base + 2], raw[base + 3]]),
            0xAB
        );
        assert_eq!(q.len(), MAX_ENTRIES);
        assert_eq!(q.peek_oldest(), Some(event(1, 1)));
    }

    #[test]
    fn corrupt_count_heals_to_empty() {
        let mut image = vec![0u8; IMAGE_LEN];
        image[0] = MAX_ENTRIES + 1;
        image[1] = 3;
        let q = EventQueue::open(MemNv::with_contents(image));
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.peek_oldest(), None);
    }

    #[test]
    fn corrupt_head_heals_to_empty() {
        let mut image = vec![0u8; IMAGE_LEN];
        image[0] = 2;
        image[1] = MAX_ENTRIES;
        let q = EventQueue::open(MemNv::with_contents(image));
        assert!(q.is_empty());
    }

    #[test]
    fn enqueue_writes_entry_and_count_only() {
        let mut q = fresh_queue();
        // All payload bytes non-zero so each one costs a physical write.
        assert!(q.enqueue(event(0x0102_0304, 0x0506_0708)));
        // 8 entry bytes + 1 count byte; head untouched.
        assert_eq!(q.store().write_count(), 9);
        assert_eq!(q.store().read(1), 0);
    }

    #[test]
    fn dequeue_writes_header_only() {
        let mut q = fresh_queue();
        q.enqueue(event(0x0102_0304, 0x0506_0708));
        let before = q.store().write_count();
        assert!(q.dequeue());
        // head and count bytes, nothing else.
        assert_eq!(q.store().write_count(), before + 2);
    }

    #[test]
    fn rewriting_an_identical_entry_costs_nothing_in_data() {
        let mut q = fresh_queue();
        let e = event(0x0102_0304, 0x0506_0708);
        q.enqueue(e);
        q.dequeue();
        // Same bytes land in slot 1 next; slot 0 bytes are stale but equal
        // writes would be skipped if it wrapped onto them.
        for i in 0..u32::from(MAX_ENTRIES) - 1 {
            q.enqueue(event(i, i));
            q.dequeue();
        }
        // Back at slot 0 now.
        let before = q.store().write_count();
        q.enqueue(e);
        // Entry bytes identical to the stale slot contents: only count moves.
        assert_eq!(q.store().write_count(), before + 1);
    }

    #[test]
    fn snapshot_lists_oldest_first() {
        let mut q = fresh_queue();
        q.enqueue(event(1, 10));
        q.enqueue(event(2, 20));
        q.enqueue(event(3, 30));
        q.dequeue();
        let all = q.snapshot();
        assert_eq!(all, vec![event(2, 20), event(3, 30)]);
    }
}
