//! Lock-free ring buffer for PCM between threads
//!
//! Single producer, single consumer. Used to hand capture samples to the
//! playback callback and to queue processed samples inside the pipeline.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ring buffer before it is split into its two ends
pub struct AudioRingBuffer<T> {
    producer: HeapProducer<T>,
    consumer: HeapConsumer<T>,
    capacity: usize,
}

impl<T: Copy + Default> AudioRingBuffer<T> {
    /// Create a ring buffer holding `capacity` samples
    ///
    /// # Arguments
    /// * `capacity` - Buffer capacity in samples; the whole ring is allocated here
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<T>::new(capacity);
        let (producer, consumer) = rb.split();

        Self {
            producer,
            consumer,
            capacity,
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (AudioProducer<T>, AudioConsumer<T>) {
        (
            AudioProducer {
                producer: self.producer,
                capacity: self.capacity,
                dropped_count: Arc::new(AtomicU64::new(0)),
            },
            AudioConsumer {
                consumer: self.consumer,
                capacity: self.capacity,
            },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Writing end
pub struct AudioProducer<T> {
    producer: HeapProducer<T>,
    capacity: usize,
    dropped_count: Arc<AtomicU64>,
}

impl<T: Copy + Default> AudioProducer<T> {
    /// Write samples, dropping whatever does not fit
    ///
    /// # Arguments
    /// * `samples` - Samples to append behind any queued ones
    ///
    /// # Returns
    /// Number of samples actually written; the rest are added to the
    /// dropped count
    pub fn write(&mut self, samples: &[T]) -> usize {
        let written = self.producer.push_slice(samples);
        let dropped = samples.len() - written;
        if dropped > 0 {
            self.dropped_count.fetch_add(dropped as u64, Ordering::Relaxed);
        }
        written
    }

    /// Write a single sample
    #[inline]
    pub fn write_one(&mut self, sample: T) -> bool {
        if self.producer.push(sample).is_ok() {
            true
        } else {
            self.dropped_count.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn free_len(&self) -> usize {
        self.capacity - self.producer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Shared handle to the dropped-sample counter
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped_count)
    }
}

/// Reading end
pub struct AudioConsumer<T> {
    consumer: HeapConsumer<T>,
    capacity: usize,
}

impl<T: Copy + Default> AudioConsumer<T> {
    /// Read up to `buffer.len()` samples, returns the count read
    pub fn read(&mut self, buffer: &mut [T]) -> usize {
        self.consumer.pop_slice(buffer)
    }

    /// Fill the whole buffer, padding with `T::default()` on underrun
    ///
    /// # Arguments
    /// * `buffer` - Filled completely, real samples first
    ///
    /// # Returns
    /// Number of real samples read (less than `buffer.len()` on underrun)
    pub fn read_or_silence(&mut self, buffer: &mut [T]) -> usize {
        let count = self.consumer.pop_slice(buffer);
        buffer[count..].fill(T::default());
        count
    }

    /// Next sample, if any
    #[inline]
    pub fn read_one(&mut self) -> Option<T> {
        self.consumer.pop()
    }

    /// Drop up to `count` of the oldest samples
    pub fn discard(&mut self, count: usize) -> usize {
        self.consumer.skip(count)
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
