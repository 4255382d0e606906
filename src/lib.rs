//! Bounded multi-producer multi-consumer channels with blocking and
//! non-blocking operations, explicit close/destroy semantics, and a multi-way
//! `select` over heterogeneous send/receive operations.

mod buffer;
mod channel;
mod select;
mod semaphore;
mod waitlist;

pub use channel::{Channel, ChannelError};
pub use select::{select, Direction, SelectEntry, SelectError};
