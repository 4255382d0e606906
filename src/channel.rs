use std::num::NonZero;
use std::sync::Mutex;

use thiserror::Error;

use crate::buffer::Buffer;
use crate::semaphore::Semaphore;
use crate::waitlist::WaitList;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("The channel is closed")]
    Closed,

    #[error("The channel is full")]
    Full,

    #[error("No data available in channel")]
    Empty,

    #[error("The channel must be closed before it can be destroyed")]
    Destroy,

    #[error("Channel state is inconsistent")]
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
    Destroyed,
}

/// A bounded multi-producer multi-consumer channel.
///
/// Values are handed off in FIFO order through a fixed-capacity buffer. Flow
/// control runs on two permit counters, one for free slots and one for
/// filled slots; `select` registrations live in the two wait lists behind
/// the gate.
#[derive(Debug)]
pub struct Channel<T> {
    capacity: NonZero<usize>,
    free_slots: Semaphore,
    filled_slots: Semaphore,
    pub(crate) gate: Mutex<Inner<T>>,
}

#[derive(Debug)]
pub(crate) struct Inner<T> {
    state: State,
    buffer: Option<Buffer<T>>,
    pub(crate) send_waiters: WaitList,
    pub(crate) recv_waiters: WaitList,
}

impl<T> Inner<T> {
    pub(crate) fn is_open(&self) -> bool {
        self.state == State::Open
    }

    fn buffer_mut(&mut self) -> &mut Buffer<T> {
        // The buffer is only dropped on destroy, which is unreachable while open.
        self.buffer.as_mut().unwrap()
    }
}

impl<T> Channel<T> {
    pub fn new(capacity: NonZero<usize>) -> Self {
        Self {
            capacity,
            free_slots: Semaphore::new(capacity.get()),
            filled_slots: Semaphore::new(0),
            gate: Mutex::new(Inner {
                state: State::Open,
                buffer: Some(Buffer::new(capacity)),
                send_waiters: WaitList::default(),
                recv_waiters: WaitList::default(),
            }),
        }
    }

    /// Sends a value, blocking while the channel is full.
    ///
    /// The value is dropped if the channel is or becomes closed.
    pub fn send(&self, value: T) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        self.free_slots.acquire();

        let mut inner = self.gate.lock().unwrap();

        if !inner.is_open() {
            // One release on each side, so every other blocked sender and
            // receiver can drain out behind us.
            self.free_slots.release(1);
            self.filled_slots.release(1);
            return Err(ChannelError::Closed);
        }

        match inner.buffer_mut().add(value) {
            Ok(()) => {
                self.filled_slots.release(1);
                inner.recv_waiters.wake_one();
                Ok(())
            }
            Err(_) => Err(ChannelError::Generic),
        }
    }

    /// Receives a value, blocking while the channel is empty.
    pub fn recv(&self) -> Result<T, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        self.filled_slots.acquire();

        let mut inner = self.gate.lock().unwrap();

        if !inner.is_open() {
            self.free_slots.release(1);
            self.filled_slots.release(1);
            return Err(ChannelError::Closed);
        }

        match inner.buffer_mut().remove() {
            Some(value) => {
                self.free_slots.release(1);
                inner.send_waiters.wake_one();
                Ok(value)
            }
            None => Err(ChannelError::Generic),
        }
    }

    /// Sends a value without blocking, failing with [`ChannelError::Full`]
    /// when no slot is free.
    pub fn try_send(&self, value: T) -> Result<(), ChannelError> {
        let mut inner = self.gate.lock().unwrap();
        let mut slot = Some(value);

        self.try_send_locked(&mut inner, &mut slot)
    }

    /// Receives a value without blocking, failing with [`ChannelError::Empty`]
    /// when nothing is buffered.
    pub fn try_recv(&self) -> Result<T, ChannelError> {
        let mut inner = self.gate.lock().unwrap();
        let mut slot = None;

        self.try_recv_locked(&mut inner, &mut slot)?;

        Ok(slot.unwrap())
    }

    /// Non-blocking send with the gate already held. Only the select engine
    /// may call this; the payload stays in the slot unless the send succeeds.
    pub(crate) fn try_send_locked(
        &self,
        inner: &mut Inner<T>,
        slot: &mut Option<T>,
    ) -> Result<(), ChannelError> {
        if !inner.is_open() {
            return Err(ChannelError::Closed);
        }

        if !self.free_slots.try_acquire() {
            return Err(ChannelError::Full);
        }

        let value = slot.take().expect("send entry without a payload");

        match inner.buffer_mut().add(value) {
            Ok(()) => {
                self.filled_slots.release(1);
                inner.recv_waiters.wake_one();
                Ok(())
            }
            Err(value) => {
                *slot = Some(value);
                Err(ChannelError::Generic)
            }
        }
    }

    /// Non-blocking receive with the gate already held. Only the select
    /// engine may call this; the received value is stored in the slot.
    pub(crate) fn try_recv_locked(
        &self,
        inner: &mut Inner<T>,
        slot: &mut Option<T>,
    ) -> Result<(), ChannelError> {
        if !inner.is_open() {
            return Err(ChannelError::Closed);
        }

        if !self.filled_slots.try_acquire() {
            return Err(ChannelError::Empty);
        }

        match inner.buffer_mut().remove() {
            Some(value) => {
                self.free_slots.release(1);
                inner.send_waiters.wake_one();
                *slot = Some(value);
                Ok(())
            }
            None => Err(ChannelError::Generic),
        }
    }

    /// Closes the channel. Every blocked and every future operation reports
    /// [`ChannelError::Closed`]; pending selects are woken via broadcast.
    pub fn close(&self) -> Result<(), ChannelError> {
        let mut inner = self.gate.lock().unwrap();

        if !inner.is_open() {
            return Err(ChannelError::Closed);
        }

        inner.state = State::Closed;

        // Flood both counters by the full capacity: every thread currently
        // blocked on either permit becomes unblockable and re-checks the state.
        self.free_slots.release(self.capacity.get());
        self.filled_slots.release(self.capacity.get());

        inner.send_waiters.wake_all();
        inner.recv_waiters.wake_all();

        Ok(())
    }

    /// Releases the channel's buffer. The channel must be closed first, and
    /// the caller is responsible for making sure no thread is still blocked
    /// inside an operation on it.
    pub fn destroy(&self) -> Result<(), ChannelError> {
        let mut inner = self.gate.lock().unwrap();

        match inner.state {
            State::Open | State::Destroyed => Err(ChannelError::Destroy),
            State::Closed => {
                inner.buffer = None;
                inner.state = State::Destroyed;
                Ok(())
            }
        }
    }

    pub fn capacity(&self) -> NonZero<usize> {
        self.capacity
    }

    /// Number of values currently buffered. Zero once destroyed.
    pub fn len(&self) -> usize {
        let inner = self.gate.lock().unwrap();
        inner.buffer.as_ref().map(Buffer::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity.get()
    }

    /// True once the channel is closed or destroyed.
    pub fn is_closed(&self) -> bool {
        let inner = self.gate.lock().unwrap();
        !inner.is_open()
    }

    #[cfg(test)]
    pub(crate) fn waiter_counts(&self) -> (usize, usize) {
        let inner = self.gate.lock().unwrap();
        (inner.send_waiters.len(), inner.recv_waiters.len())
    }
}
