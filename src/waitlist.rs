use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::semaphore::Semaphore;

/// Wakeup state shared by one pending `select` call across every channel the
/// call is registered on. The fuse arbitrates which channel gets to wake the
/// call: claiming it succeeds at most once per arming.
#[derive(Debug)]
pub struct Waiter {
    fuse: AtomicBool,
    latch: Semaphore,
}

impl Waiter {
    pub fn new() -> Self {
        Self {
            fuse: AtomicBool::new(false),
            latch: Semaphore::new(0),
        }
    }

    /// Atomically claims the fuse. Only the single caller that wins the claim
    /// may release the latch.
    pub fn claim(&self) -> bool {
        self.fuse
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Makes the fuse claimable again. Called by the select thread after it
    /// consumed a wakeup, and by the close broadcast.
    pub fn rearm(&self) {
        self.fuse.store(false, Ordering::Release);
    }

    pub fn notify(&self) {
        self.latch.release(1);
    }

    pub fn wait(&self) {
        self.latch.acquire();
    }

    #[cfg(test)]
    fn is_claimed(&self) -> bool {
        self.fuse.load(Ordering::Acquire)
    }
}

/// Per-channel, per-direction list of select registrations. Guarded by the
/// owning channel's gate; waiter identity is the `Arc` allocation.
#[derive(Debug, Default)]
pub struct WaitList {
    waiters: Vec<Arc<Waiter>>,
}

impl WaitList {
    /// Appends a registration unless the waiter is already present.
    pub fn insert(&mut self, waiter: &Arc<Waiter>) {
        if !self.contains(waiter) {
            self.waiters.push(waiter.clone());
        }
    }

    pub fn contains(&self, waiter: &Arc<Waiter>) -> bool {
        self.waiters.iter().any(|w| Arc::ptr_eq(w, waiter))
    }

    /// Removes a registration.
    ///
    /// # Panics
    /// Panics if the list is empty or the waiter is not registered. Both mean
    /// the select engine's bookkeeping is broken.
    pub fn remove(&mut self, waiter: &Arc<Waiter>) {
        assert!(
            !self.waiters.is_empty(),
            "waiter removal from an empty wait list"
        );

        let index = self
            .waiters
            .iter()
            .position(|w| Arc::ptr_eq(w, waiter))
            .expect("waiter is not registered in this wait list");

        self.waiters.remove(index);
    }

    /// Wakes at most one waiter: the first whose fuse claim succeeds. Waiters
    /// already claimed by another channel are skipped, not removed.
    pub fn wake_one(&self) {
        for waiter in self.waiters.iter() {
            if waiter.claim() {
                waiter.notify();
                return;
            }
        }
    }

    /// Wakes every waiter and re-arms its fuse, so each pending select can
    /// claim its own fuse and observe the channel state itself.
    pub fn wake_all(&self) {
        for waiter in self.waiters.iter() {
            waiter.rearm();
            waiter.notify();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{WaitList, Waiter};

    #[test]
    fn test_claim_is_one_shot() {
        let waiter = Waiter::new();

        assert!(waiter.claim());
        assert!(!waiter.claim());

        waiter.rearm();
        assert!(waiter.claim());
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut list = WaitList::default();
        let waiter = Arc::new(Waiter::new());

        list.insert(&waiter);
        list.insert(&waiter);

        assert_eq!(list.len(), 1);
        assert!(list.contains(&waiter));

        list.remove(&waiter);
        assert_eq!(list.len(), 0);
        assert!(!list.contains(&waiter));
    }

    #[test]
    #[should_panic]
    fn test_remove_from_empty_list() {
        let mut list = WaitList::default();
        let waiter = Arc::new(Waiter::new());

        list.remove(&waiter);
    }

    #[test]
    #[should_panic]
    fn test_remove_unregistered_waiter() {
        let mut list = WaitList::default();

        list.insert(&Arc::new(Waiter::new()));
        list.remove(&Arc::new(Waiter::new()));
    }

    #[test]
    fn test_wake_one_is_single_winner() {
        let mut list = WaitList::default();
        let first = Arc::new(Waiter::new());
        let second = Arc::new(Waiter::new());

        list.insert(&first);
        list.insert(&second);

        list.wake_one();
        assert!(first.is_claimed());
        assert!(!second.is_claimed());

        // The winner has a pending wakeup, the loser keeps sleeping.
        first.wait();

        list.wake_one();
        assert!(second.is_claimed());
        second.wait();
    }

    #[test]
    fn test_wake_one_skips_claimed_waiters() {
        let mut list = WaitList::default();
        let first = Arc::new(Waiter::new());
        let second = Arc::new(Waiter::new());

        list.insert(&first);
        list.insert(&second);

        assert!(first.claim());

        list.wake_one();
        assert!(second.is_claimed());
        second.wait();
    }

    #[test]
    fn test_wake_all_rearms() {
        let mut list = WaitList::default();
        let first = Arc::new(Waiter::new());
        let second = Arc::new(Waiter::new());

        list.insert(&first);
        list.insert(&second);

        assert!(first.claim());

        list.wake_all();

        // Both were notified and both fuses are claimable again.
        first.wait();
        second.wait();
        assert!(first.claim());
        assert!(second.claim());
    }
}
