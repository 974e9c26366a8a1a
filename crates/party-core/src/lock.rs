//! A lock that can also be waited on without acquiring it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

/// Mutual exclusion plus a "released" signal.
///
/// Owners call [`LockEvent::acquire`]. Anyone else can call
/// [`LockEvent::wait`] to block until no owner holds the lock and no acquirer
/// is queued, without contending for it.
#[derive(Debug)]
pub struct LockEvent {
    lock: Arc<Mutex<()>>,
    waiters: Arc<AtomicUsize>,
    released: Arc<watch::Sender<bool>>,
}

impl Default for LockEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl LockEvent {
    #[must_use]
    pub fn new() -> Self {
        let (released, _) = watch::channel(true);
        Self {
            lock: Arc::new(Mutex::new(())),
            waiters: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(released),
        }
    }

    pub async fn acquire(&self) -> LockEventGuard {
        let queued = QueuedAcquire {
            waiters: self.waiters.clone(),
            lock: self.lock.clone(),
            released: self.released.clone(),
        };
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let guard = self.lock.clone().lock_owned().await;
        drop(queued);
        self.released.send_replace(false);
        LockEventGuard {
            guard: Some(guard),
            waiters: self.waiters.clone(),
            released: self.released.clone(),
        }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Resolve once the lock is released with nobody queued behind it.
    pub async fn wait(&self) {
        let mut rx = self.released.subscribe();
        // The sender lives as long as `self`, so this only fails if it is gone.
        let _ = rx.wait_for(|released| *released).await;
    }
}

/// Held by an owner of a [`LockEvent`].
#[derive(Debug)]
pub struct LockEventGuard {
    guard: Option<OwnedMutexGuard<()>>,
    waiters: Arc<AtomicUsize>,
    released: Arc<watch::Sender<bool>>,
}

impl Drop for LockEventGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        if self.waiters.load(Ordering::SeqCst) == 0 {
            self.released.send_replace(true);
        }
    }
}

/// Tracks one queued `acquire` so that dropping the future mid-wait still
/// unregisters it.
struct QueuedAcquire {
    waiters: Arc<AtomicUsize>,
    lock: Arc<Mutex<()>>,
    released: Arc<watch::Sender<bool>>,
}

impl Drop for QueuedAcquire {
    fn drop(&mut self) {
        let left = self.waiters.fetch_sub(1, Ordering::SeqCst) - 1;
        if left == 0 && self.lock.try_lock().is_ok() && !*self.released.borrow() {
            self.released.send_replace(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_when_free() {
        let lock = LockEvent::new();
        assert!(!lock.is_locked());
        tokio::time::timeout(Duration::from_millis(50), lock.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_blocks_until_release() {
        let lock = Arc::new(LockEvent::new());
        let guard = lock.acquire().await;
        assert!(lock.is_locked());

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn test_release_signal_held_while_acquirer_queued() {
        let lock = Arc::new(LockEvent::new());
        let first = lock.acquire().await;

        let second = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _guard = lock.acquire().await;
                tokio::time::sleep(Duration::from_millis(30)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.wait().await })
        };
        drop(first);
        tokio::time::sleep(Duration::from_millis(10)).await;
        // second owner took over without the signal firing in between
        assert!(!waiter.is_finished());

        second.await.unwrap();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_acquire_does_not_wedge_waiters() {
        let lock = Arc::new(LockEvent::new());
        let guard = lock.acquire().await;
        let pending = tokio::time::timeout(Duration::from_millis(10), lock.acquire()).await;
        assert!(pending.is_err());
        drop(guard);
        tokio::time::timeout(Duration::from_millis(100), lock.wait())
            .await
            .unwrap();
    }
}
