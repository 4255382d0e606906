use std::num::NonZero;

use ringbuffer::{AllocRingBuffer, RingBuffer};

/// Fixed-capacity FIFO slot store backing a channel. A full buffer refuses
/// new values instead of overwriting the oldest one.
#[derive(Debug)]
pub struct Buffer<T> {
    buf: AllocRingBuffer<T>,
}

impl<T> Buffer<T> {
    pub fn new(capacity: NonZero<usize>) -> Self {
        Self {
            buf: AllocRingBuffer::new(capacity.get()),
        }
    }

    pub fn add(&mut self, value: T) -> Result<(), T> {
        if self.buf.is_full() {
            Err(value)
        } else {
            self.buf.push(value);
            Ok(())
        }
    }

    pub fn remove(&mut self) -> Option<T> {
        self.buf.dequeue()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
