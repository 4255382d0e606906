use std::ptr;
use std::sync::{Arc, MutexGuard};

use thiserror::Error;

use crate::channel::{Channel, ChannelError, Inner};
use crate::waitlist::Waiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// One operation a [`select`] call waits on: a channel, a direction, and the
/// payload slot the operation reads from (send) or writes into (receive).
#[derive(Debug)]
pub struct SelectEntry<'a, T> {
    channel: &'a Channel<T>,
    dir: Direction,
    payload: Option<T>,
}

impl<'a, T> SelectEntry<'a, T> {
    pub fn send(channel: &'a Channel<T>, value: T) -> Self {
        Self {
            channel,
            dir: Direction::Send,
            payload: Some(value),
        }
    }

    pub fn recv(channel: &'a Channel<T>) -> Self {
        Self {
            channel,
            dir: Direction::Receive,
            payload: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.dir
    }

    /// Moves the payload out of the entry: the received value for a resolved
    /// receive entry, or the unsent value of a send entry that never resolved.
    pub fn take_payload(&mut self) -> Option<T> {
        self.payload.take()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("select failed on entry {index}: {source}")]
pub struct SelectError {
    pub index: usize,
    #[source]
    pub source: ChannelError,
}

/// Waits on every entry at once and performs the first one that becomes
/// ready, returning its index. Entries are attempted in index order on each
/// scan pass, so the lowest-index ready entry wins a pass.
///
/// If any entry's channel is or becomes closed, the call fails with that
/// entry's index. Registrations left on the other channels are removed
/// before returning, locking one channel gate at a time.
///
/// # Panics
/// Panics if `entries` is empty.
pub fn select<T>(entries: &mut [SelectEntry<'_, T>]) -> Result<usize, SelectError> {
    assert!(!entries.is_empty(), "select() called with no entries");

    let waiter = Arc::new(Waiter::new());

    loop {
        for i in 0..entries.len() {
            let channel = entries[i].channel;
            let dir = entries[i].dir;
            let mut inner = channel.gate.lock().unwrap();

            if !inner.is_open() {
                cleanup(entries, i, inner, &waiter);
                return Err(SelectError {
                    index: i,
                    source: ChannelError::Closed,
                });
            }

            let outcome = match dir {
                Direction::Send => channel.try_send_locked(&mut inner, &mut entries[i].payload),
                Direction::Receive => channel.try_recv_locked(&mut inner, &mut entries[i].payload),
            };

            match outcome {
                Ok(()) => {
                    cleanup(entries, i, inner, &waiter);
                    return Ok(i);
                }
                Err(ChannelError::Full) | Err(ChannelError::Empty) => {
                    let list = match dir {
                        Direction::Send => &mut inner.send_waiters,
                        Direction::Receive => &mut inner.recv_waiters,
                    };
                    list.insert(&waiter);
                }
                Err(source) => {
                    cleanup(entries, i, inner, &waiter);
                    return Err(SelectError { index: i, source });
                }
            }
        }

        // Nothing was ready: sleep until some channel claims our fuse, then
        // re-arm it so the next pass's wake race starts from scratch.
        waiter.wait();
        waiter.rearm();

        // A close may have raced with the wakeup; catch it before re-scanning.
        for i in 0..entries.len() {
            let inner = entries[i].channel.gate.lock().unwrap();

            if !inner.is_open() {
                cleanup(entries, i, inner, &waiter);
                return Err(SelectError {
                    index: i,
                    source: ChannelError::Closed,
                });
            }
        }
    }
}

/// Removes every registration this call made. The resolved entry's gate is
/// already held and is used as-is; every other channel is locked and released
/// individually, so at most one gate is held at any instant.
fn cleanup<T>(
    entries: &[SelectEntry<'_, T>],
    resolved: usize,
    mut inner: MutexGuard<'_, Inner<T>>,
    waiter: &Arc<Waiter>,
) {
    let resolved_channel = entries[resolved].channel;

    for entry in entries.iter() {
        if ptr::eq(entry.channel, resolved_channel) {
            remove_registration(&mut inner, entry.dir, waiter);
        }
    }

    drop(inner);

    for entry in entries.iter() {
        if !ptr::eq(entry.channel, resolved_channel) {
            let mut inner = entry.channel.gate.lock().unwrap();
            remove_registration(&mut inner, entry.dir, waiter);
        }
    }
}

fn remove_registration<T>(inner: &mut Inner<T>, dir: Direction, waiter: &Arc<Waiter>) {
    let list = match dir {
        Direction::Send => &mut inner.send_waiters,
        Direction::Receive => &mut inner.recv_waiters,
    };

    if list.contains(waiter) {
        list.remove(waiter);
    }
}
