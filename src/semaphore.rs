use std::sync::{Condvar, Mutex};

/// A counting permit pool. `acquire` blocks while no permit is available;
/// `release(n)` supports returning many permits at once.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            cv: Condvar::default(),
        }
    }

    pub fn acquire(&self) {
        let permits = self.permits.lock().unwrap();

        let mut permits = self.cv.wait_while(permits, |p| *p == 0).unwrap();

        *permits -= 1;
    }

    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock().unwrap();

        if *permits == 0 {
            false
        } else {
            *permits -= 1;
            true
        }
    }

    pub fn release(&self, n: usize) {
        let mut permits = self.permits.lock().unwrap();

        *permits += n;

        if n == 1 {
            self.cv.notify_one();
        } else {
            self.cv.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::Semaphore;

    #[test]
    fn test_try_acquire() {
        let sem = Semaphore::new(2);

        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());

        sem.release(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = sem.clone();

        let handle = thread::spawn(move || {
            sem2.acquire();
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        sem.release(1);
        handle.join().unwrap();

        assert!(!sem.try_acquire());
    }

    #[test]
    fn test_release_many_wakes_all() {
        let sem = Arc::new(Semaphore::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let sem = sem.clone();
                thread::spawn(move || sem.acquire())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        sem.release(3);

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!sem.try_acquire());
    }
}
