//! Seqlock mailbox for `Copy` snapshots.
//!
//! Used for every buffer shared between the servo thread and the application
//! thread. Reads never block the writer and never observe a torn value; the
//! latest write wins.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering, fence};

/// Attempts `try_read` makes before giving up.
const TRY_READ_ATTEMPTS: u32 = 4;

/// Lock-free single-value mailbox.
///
/// A writer moves the sequence counter from even to odd, stores the payload and
/// publishes the next even value. Readers retry while the counter is odd or
/// changed under them. Writers claim the odd state with a CAS, so two writers
/// never interleave; in this crate every mailbox has one writer thread and the
/// CAS never contends.
pub struct SnapshotMailbox<T: Copy> {
    seq: AtomicU32,
    data: UnsafeCell<T>,
}

// SAFETY: payload access is serialized by the sequence counter: writers are
// exclusive, readers discard any copy taken while a write was in flight.
unsafe impl<T: Copy + Send> Sync for SnapshotMailbox<T> {}

impl<T: Copy> SnapshotMailbox<T> {
    pub const fn new(value: T) -> Self {
        Self {
            seq: AtomicU32::new(0),
            data: UnsafeCell::new(value),
        }
    }

    pub fn write(&self, value: T) {
        let mut seq = self.seq.load(Ordering::Relaxed);
        loop {
            if seq & 1 != 0 {
                std::hint::spin_loop();
                seq = self.seq.load(Ordering::Relaxed);
                continue;
            }
            match self
                .seq
                .compare_exchange_weak(seq, seq.wrapping_add(1), Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => seq = current,
            }
        }
        fence(Ordering::Release);
        // SAFETY: the odd sequence value makes this the only writer, and readers
        // throw away whatever they copy while it is odd.
        unsafe { std::ptr::write_volatile(self.data.get(), value) };
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read for the servo thread: gives up after a fixed number of attempts
    /// instead of waiting on a writer that may not be scheduled again.
    pub fn try_read(&self) -> Option<T> {
        for _ in 0..TRY_READ_ATTEMPTS {
            let start = self.seq.load(Ordering::Acquire);
            if start & 1 != 0 {
                std::hint::spin_loop();
                continue;
            }
            // SAFETY: as in `read`.
            let value = unsafe { std::ptr::read_volatile(self.data.get()) };
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == start {
                return Some(value);
            }
        }
        None
    }

    /// Blocking read; retries until no write is in flight. Not for the servo thread
    /// unless the calling thread is the only writer.
    pub fn read(&self) -> T {
        loop {
            let start = self.seq.load(Ordering::Acquire);
            if start & 1 != 0 {
                std::hint::spin_loop();
                continue;
            }
            // SAFETY: T is Copy; a copy that raced with a write is discarded below.
            let value = unsafe { std::ptr::read_volatile(self.data.get()) };
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == start {
                return value;
            }
        }
    }

    /// Leave the mailbox as a writer preempted mid-write would.
    #[cfg(test)]
    pub(crate) fn stall_writer(&self) {
        self.seq.fetch_or(1, Ordering::AcqRel);
    }

    #[cfg(test)]
    pub(crate) fn resume_writer(&self) {
        self.seq.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of completed writes (wrapping).
    pub fn version(&self) -> u32 {
        self.seq.load(Ordering::Acquire) >> 1
    }
}

impl<T: Copy + Default> Default for SnapshotMailbox<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for SnapshotMailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotMailbox")
            .field("version", &self.version())
            .field("value", &self.read())
            .finish()
    }
}
