//! Per-key mutual exclusion and per-key ordered execution.
//!
//! [`KeyedLocks`] gives callers an exclusive section per key (counting channel,
//! mirror pair, community sweep). [`KeyedSerializer`] runs submitted jobs for
//! the same key strictly in submission order while different keys proceed
//! concurrently, bounded by a shared worker semaphore.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedMutexGuard, Semaphore, mpsc, oneshot};

/// Lazily created async mutex per key.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Waiters are served in FIFO order.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on can go.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        mutex.lock_owned().await
    }

    /// Number of keys currently held or awaited.
    #[must_use]
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|m| Arc::strong_count(m) > 1)
            .count()
    }
}

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;
type Queues<K> = Arc<Mutex<HashMap<K, mpsc::UnboundedSender<Job>>>>;

/// One sequential queue per key, drained by a worker task.
///
/// Must be used from within a tokio runtime. A worker exits and forgets its
/// key once the queue runs dry; the next submission starts a new one.
pub struct KeyedSerializer<K> {
    queues: Queues<K>,
    workers: Arc<Semaphore>,
}

impl<K: Eq + Hash + Clone + Send + 'static> KeyedSerializer<K> {
    /// `max_concurrency` bounds how many keys execute a job at the same time.
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            queues: Arc::default(),
            workers: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Enqueue `job` behind every job previously submitted for `key`.
    pub fn submit<F>(&self, key: K, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let mut job: Job = Box::pin(job);
        if let Some(sender) = queues.get(&key) {
            match sender.send(job) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive: it was created on the line above.
        let _ = sender.send(job);
        queues.insert(key.clone(), sender);
        tokio::spawn(drain(
            key,
            receiver,
            Arc::clone(&self.queues),
            Arc::clone(&self.workers),
        ));
    }

    /// Submit `job` and wait for its result.
    ///
    /// Returns `None` if the job was dropped before completing (runtime
    /// shutting down).
    pub async fn run<T, F>(&self, key: K, job: F) -> Option<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(key, async move {
            let _ = tx.send(job.await);
        });
        rx.await.ok()
    }

    /// Wait until every job submitted for `key` so far has finished.
    pub async fn flush(&self, key: K) {
        self.run(key, async {}).await;
    }

    /// Number of keys with queued or running jobs.
    #[must_use]
    pub fn keys(&self) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn drain<K: Eq + Hash>(
    key: K,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    queues: Queues<K>,
    workers: Arc<Semaphore>,
) {
    loop {
        let job = match receiver.try_recv() {
            Ok(job) => job,
            Err(_) => {
                // `submit` sends under the same lock, so an empty queue seen
                // here stays empty until the entry is gone.
                let mut queues = queues.lock().unwrap_or_else(PoisonError::into_inner);
                match receiver.try_recv() {
                    Ok(job) => job,
                    Err(_) => {
                        queues.remove(&key);
                        return;
                    }
                }
            }
        };
        let Ok(_permit) = workers.acquire().await else {
            return;
        };
        job.await;
    }
}
