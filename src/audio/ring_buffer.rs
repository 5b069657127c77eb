//! Lock-free ring buffer between the audio callback and the capture thread
//!
//! The cpal callback runs on a real-time thread and must not allocate or
//! block, so all storage is allocated up front. Single producer (the audio
//! callback), single consumer (the capture thread).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default capacity: ~2 seconds of stereo audio at 48kHz
const DEFAULT_CAPACITY: usize = 1 << 18;

/// A lock-free single-producer single-consumer ring buffer for f32 samples
///
/// Capacity is rounded up to a power of two so index wrapping is a mask
/// instead of a modulo. One slot is kept empty to distinguish full from
/// empty, so the usable capacity is `capacity() - 1`.
pub struct SampleRing {
    slots: Box<[UnsafeCell<f32>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Safety: head/tail atomics partition the slot range between the single
// producer and the single consumer; they never touch the same slot
// concurrently.
unsafe impl Send for SampleRing {}
unsafe impl Sync for SampleRing {}

impl Default for SampleRing {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SampleRing {
    /// Create a ring with room for at least `min_samples` samples
    pub fn with_capacity(min_samples: usize) -> Self {
        let capacity = min_samples.max(2).next_power_of_two();
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(0.0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Size a ring for roughly `seconds` of interleaved audio
    pub fn for_stream(sample_rate: u32, channels: usize, seconds: f32) -> Self {
        let samples = (sample_rate as f32 * channels.max(1) as f32 * seconds) as usize;
        Self::with_capacity(samples)
    }

    /// Total slot count (one slot is always left empty)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of samples ready to be consumed
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & self.mask
    }

    /// Whether the ring currently holds no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push samples from the producer side (the audio callback)
    ///
    /// Lock-free and allocation-free. Returns how many samples were
    /// accepted; the rest are dropped when the ring is full.
    pub fn push(&self, samples: &[f32]) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        let free = self.mask - (head.wrapping_sub(tail) & self.mask);
        let accepted = samples.len().min(free);
        if accepted == 0 {
            return 0;
        }

        for (offset, &sample) in samples.iter().take(accepted).enumerate() {
            let slot = &self.slots[(head.wrapping_add(offset)) & self.mask];
            // Safety: slots between tail and head+free belong to the producer
            unsafe { *slot.get() = sample };
        }

        self.head
            .store(head.wrapping_add(accepted), Ordering::Release);
        accepted
    }

    /// Pop up to `out.len()` samples from the consumer side
    pub fn pop(&self, out: &mut [f32]) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        let available = head.wrapping_sub(tail) & self.mask;
        let taken = out.len().min(available);
        if taken == 0 {
            return 0;
        }

        for (offset, slot) in out.iter_mut().take(taken).enumerate() {
            let cell = &self.slots[(tail.wrapping_add(offset)) & self.mask];
            // Safety: slots between tail and head belong to the consumer
            *slot = unsafe { *cell.get() };
        }

        self.tail
            .store(tail.wrapping_add(taken), Ordering::Release);
        taken
    }

    /// Append everything currently in the ring to `sink`
    ///
    /// Allocates on the consumer thread only.
    pub fn drain_into(&self, sink: &mut Vec<f32>) -> usize {
        let available = self.len();
        if available == 0 {
            return 0;
        }
        let start = sink.len();
        sink.resize(start + available, 0.0);
        let popped = self.pop(&mut sink[start..]);
        sink.truncate(start + popped);
        popped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let ring = SampleRing::with_capacity(1000);
        assert_eq!(ring.capacity(), 1024);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_push_pop_order() {
        let ring = SampleRing::with_capacity(8);
        assert_eq!(ring.push(&[1.0, 2.0, 3.0]), 3);
        assert_eq!(ring.len(), 3);

        let mut out = [0.0; 3];
        assert_eq!(ring.pop(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_full_ring_drops_excess() {
        let ring = SampleRing::with_capacity(8);
        // Usable capacity is capacity - 1
        let samples = [0.5; 16];
        let accepted = ring.push(&samples);
        assert_eq!(accepted, ring.capacity() - 1);
        assert_eq!(ring.push(&[1.0]), 0);
    }

    #[test]
    fn test_wraparound_preserves_samples() {
        let ring = SampleRing::with_capacity(8);
        let mut out = [0.0; 4];

        // Cycle enough data through to wrap the indices several times
        for round in 0..10 {
            let base = round as f32 * 4.0;
            assert_eq!(ring.push(&[base, base + 1.0, base + 2.0, base + 3.0]), 4);
            assert_eq!(ring.pop(&mut out), 4);
            assert_eq!(out, [base, base + 1.0, base + 2.0, base + 3.0]);
        }
    }

    #[test]
    fn test_drain_into_appends() {
        let ring = SampleRing::with_capacity(16);
        ring.push(&[1.0, 2.0]);

        let mut sink = vec![0.0];
        assert_eq!(ring.drain_into(&mut sink), 2);
        assert_eq!(sink, vec![0.0, 1.0, 2.0]);
        assert_eq!(ring.drain_into(&mut sink), 0);
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_for_stream_sizing() {
        let ring = SampleRing::for_stream(48_000, 2, 2.0);
        assert!(ring.capacity() >= 48_000 * 2 * 2);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        let ring = Arc::new(SampleRing::with_capacity(4096));
        let producer = ring.clone();
        let consumer = ring.clone();

        const TOTAL: usize = 200_000;

        let producer_handle = thread::spawn(move || {
            let mut sent = 0usize;
            while sent < TOTAL {
                let chunk: Vec<f32> = (0..128).map(|i| (sent + i) as f32).collect();
                let accepted = producer.push(&chunk);
                sent += accepted;
                if accepted < chunk.len() {
                    thread::yield_now();
                }
            }
        });

        let consumer_handle = thread::spawn(move || {
            let mut received = Vec::with_capacity(TOTAL);
            while received.len() < TOTAL {
                if consumer.drain_into(&mut received) == 0 {
                    thread::yield_now();
                }
            }
            received
        });

        producer_handle.join().unwrap();
        let received = consumer_handle.join().unwrap();

        // Values must come out in production order
        assert_eq!(received.len(), TOTAL);
        for (i, &value) in received.iter().enumerate() {
            assert_eq!(value, i as f32);
        }
    }
}
