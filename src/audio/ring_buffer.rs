/// Single-producer single-consumer sample queue between the playback thread
/// (producer) and the cpal callback (consumer).
///
/// Slots are `AtomicU32` holding f32 bits, so neither side ever takes a lock
/// and the callback never blocks: an empty queue just reads short.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

pub struct RingBuffer {
    slots: Box<[AtomicU32]>,
    /// Only advanced by the producer.
    write_pos: AtomicUsize,
    /// Only advanced by the consumer.
    read_pos: AtomicUsize,
    /// Set by the producer, honoured by the consumer on its next read.
    clear_requested: AtomicBool,
    /// Producer's write position when the clear was requested.
    clear_to: AtomicUsize,
    mask: usize,
}

impl RingBuffer {
    /// Capacity is rounded up to a power of two for mask indexing.
    pub fn with_min_capacity(min_samples: usize) -> Self {
        let capacity = min_samples.max(2).next_power_of_two();
        Self {
            slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            clear_requested: AtomicBool::new(false),
            clear_to: AtomicUsize::new(0),
            mask: capacity - 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Producer side. Returns how many samples fit.
    pub fn write(&self, data: &[f32]) -> usize {
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);

        // One slot stays empty to tell full from empty.
        let used = write.wrapping_sub(read);
        let available = self.capacity() - 1 - used;
        let to_write = data.len().min(available);

        for (i, sample) in data[..to_write].iter().enumerate() {
            self.slots[(write + i) & self.mask].store(sample.to_bits(), Ordering::Relaxed);
        }

        // Release makes the slot stores visible before the new write position.
        self.write_pos
            .store(write.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Consumer side. Never blocks; returns the number of samples read.
    pub fn read(&self, output: &mut [f32]) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let mut read = self.read_pos.load(Ordering::Relaxed);

        // Samples written after the request survive the clear.
        if self.clear_requested.swap(false, Ordering::AcqRel) {
            read = self.clear_to.load(Ordering::Acquire);
        }

        let available = write.wrapping_sub(read);
        let to_read = output.len().min(available);

        for (i, out) in output[..to_read].iter_mut().enumerate() {
            *out = f32::from_bits(self.slots[(read + i) & self.mask].load(Ordering::Relaxed));
        }

        self.read_pos
            .store(read.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Asks the consumer to drop everything queued so far. Producer side.
    pub fn request_clear(&self) {
        self.clear_to
            .store(self.write_pos.load(Ordering::Relaxed), Ordering::Release);
        self.clear_requested.store(true, Ordering::Release);
    }

    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    pub fn available_write(&self) -> usize {
        self.capacity() - 1 - self.available_read()
    }
}
