//! Lock-free single-producer/single-consumer sample buffer.
//!
//! One instance sits between each asynchronous capture path and the mixer.
//! The counters grow monotonically and are only wrapped at indexing time,
//! which keeps full/empty disambiguation trivial at the cost of one unused
//! slot. Correctness requires exactly one writer thread and one reader
//! thread; the `split` constructor enforces that by handing out exactly one
//! producer and one consumer handle, neither of which is `Clone`.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct SpscRing {
    buf: Box<[UnsafeCell<f32>]>,
    mask: usize,
    /// Next read position. Only the consumer advances this.
    head: AtomicUsize,
    /// Next write position. Only the producer advances this.
    tail: AtomicUsize,
}

// The UnsafeCell slice is only touched through the SPSC discipline:
// the producer writes slots in [tail, tail + n) before publishing tail,
// the consumer reads slots in [head, head + n) before publishing head.
unsafe impl Send for SpscRing {}
unsafe impl Sync for SpscRing {}

impl SpscRing {
    /// Create a ring with at least `min_capacity` slots, rounded up to a
    /// power of two.
    pub fn new(min_capacity: usize) -> Self {
        let capacity = min_capacity.max(2).next_power_of_two();
        let buf: Vec<UnsafeCell<f32>> = (0..capacity).map(|_| UnsafeCell::new(0.0)).collect();
        Self {
            buf: buf.into_boxed_slice(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Create a ring and split it into its producer and consumer halves.
    pub fn split(min_capacity: usize) -> (RingProducer, RingConsumer) {
        let ring = Arc::new(Self::new(min_capacity));
        (
            RingProducer {
                ring: Arc::clone(&ring),
            },
            RingConsumer { ring },
        )
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Samples ready for the consumer.
    pub fn available_to_read(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    /// Free slots for the producer. One slot stays empty so a full ring is
    /// distinguishable from an empty one.
    pub fn available_to_write(&self) -> usize {
        (self.capacity() - 1) - self.available_to_read()
    }

    /// Copy as many samples as fit without blocking. Returns the accepted
    /// count (0 when full). Never allocates.
    pub fn write(&self, samples: &[f32]) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let free = (self.capacity() - 1) - tail.wrapping_sub(head);
        let count = samples.len().min(free);

        for (i, &sample) in samples[..count].iter().enumerate() {
            let slot = self.buf[tail.wrapping_add(i) & self.mask].get();
            unsafe { *slot = sample };
        }

        self.tail.store(tail.wrapping_add(count), Ordering::Release);
        count
    }

    /// Copy up to `out.len()` available samples into `out`, zero-filling any
    /// shortfall so downstream mixing never stalls on underrun. Returns the
    /// true count read.
    pub fn read(&self, out: &mut [f32]) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let available = tail.wrapping_sub(head);
        let count = out.len().min(available);

        for (i, slot) in out[..count].iter_mut().enumerate() {
            let src = self.buf[head.wrapping_add(i) & self.mask].get();
            *slot = unsafe { *src };
        }
        for slot in out[count..].iter_mut() {
            *slot = 0.0;
        }

        self.head.store(head.wrapping_add(count), Ordering::Release);
        count
    }

    /// Zero both counters. The caller must guarantee no concurrent writer or
    /// reader while this runs.
    pub fn reset(&self) {
        self.head.store(0, Ordering::Release);
        self.tail.store(0, Ordering::Release);
    }

    /// Discard everything currently buffered by advancing the read position
    /// to the write position. Safe to call from the consumer side while the
    /// producer is live.
    fn discard_buffered(&self) {
        let tail = self.tail.load(Ordering::Acquire);
        self.head.store(tail, Ordering::Release);
    }
}

/// Write half of a split ring. Lives on the capture callback side.
pub struct RingProducer {
    ring: Arc<SpscRing>,
}

impl RingProducer {
    pub fn write(&self, samples: &[f32]) -> usize {
        self.ring.write(samples)
    }

    pub fn available_to_write(&self) -> usize {
        self.ring.available_to_write()
    }
}

/// Read half of a split ring. Owned by the mixer.
pub struct RingConsumer {
    ring: Arc<SpscRing>,
}

impl RingConsumer {
    pub fn read(&self, out: &mut [f32]) -> usize {
        self.ring.read(out)
    }

    pub fn available_to_read(&self) -> usize {
        self.ring.available_to_read()
    }

    /// Drop any buffered pre-roll without touching the producer.
    pub fn clear(&self) {
        self.ring.discard_buffered();
    }
}
