//! Append-only sequence collection on top of a storage counter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use ragkit_core::{RagError, Record, Result, Storage};

/// Key prefix used when none is given.
pub const DEFAULT_PREFIX: &str = "collector_";

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);

/// Run `op` up to `attempts` times, doubling the delay after each failure.
/// The last error is returned.
pub async fn retry<F, Fut, R>(
    what: &str,
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut delay = base_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!("{} failed (attempt {}/{}): {}", what, attempt, attempts, e);
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Stores items under consecutive keys `{prefix}0`, `{prefix}1`, ...
pub struct Collector<T> {
    storage: Arc<dyn Storage<T>>,
    prefix: String,
    attempts: u32,
    base_delay: Duration,
}

impl<T: Record> Collector<T> {
    /// Create a collector, resetting the sequence when `drop_old` is set.
    pub async fn new(storage: Arc<dyn Storage<T>>, drop_old: bool) -> Result<Self> {
        let collector = Self {
            storage,
            prefix: DEFAULT_PREFIX.to_string(),
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        };

        if drop_old {
            collector
                .counter("unique_reset", || collector.storage.unique_reset())
                .await?;
        }
        Ok(collector)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Configure counter retries. `attempts` must be at least 1.
    pub fn with_retry(mut self, attempts: u32, base_delay: Duration) -> Result<Self> {
        if attempts == 0 {
            return Err(RagError::config("retry attempts must be at least 1"));
        }
        self.attempts = attempts;
        self.base_delay = base_delay;
        Ok(self)
    }

    fn key(&self, n: u64) -> String {
        format!("{}{}", self.prefix, n)
    }

    async fn counter<F, Fut, R>(&self, what: &str, op: F) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        retry(what, self.attempts, self.base_delay, op).await
    }

    /// Number of items collected so far.
    pub async fn len(&self) -> Result<u64> {
        self.counter("unique_get", || self.storage.unique_get()).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Append an item to the sequence.
    pub async fn collect(&self, item: T) -> Result<()> {
        let n = self.len().await?;
        self.storage.insert(&[self.key(n)], &[item]).await?;
        self.counter("unique_incr", || self.storage.unique_incr()).await
    }

    /// All collected items in collection order. Entries deleted from the
    /// storage behind the collector's back are skipped.
    pub async fn dump(&self) -> Result<Vec<T>> {
        let n = self.len().await?;

        let mut items = Vec::with_capacity(n as usize);
        for i in 0..n {
            let key = self.key(i);
            match self.storage.query(&key).await? {
                Some(item) => items.push(item),
                None => warn!("Collected item {} is missing", key),
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use ragkit_store::MemoryBackend;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Turn {
        role: String,
        content: String,
    }

    fn turn(role: &str, content: &str) -> Turn {
        Turn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    fn storage(backend: &MemoryBackend) -> Arc<dyn Storage<Turn>> {
        Arc::new(backend.storage::<Turn>("turns", None).unwrap())
    }

    #[tokio::test]
    async fn test_collect_and_dump() {
        let backend = MemoryBackend::new();
        let collector = Collector::new(storage(&backend), true).await.unwrap();
        assert!(collector.is_empty().await.unwrap());

        collector.collect(turn("human", "hi")).await.unwrap();
        collector.collect(turn("assistant", "hi there")).await.unwrap();

        assert_eq!(collector.len().await.unwrap(), 2);
        assert_eq!(
            collector.dump().await.unwrap(),
            vec![turn("human", "hi"), turn("assistant", "hi there")]
        );

        let raw = storage(&backend).query("collector_1").await.unwrap();
        assert_eq!(raw, Some(turn("assistant", "hi there")));
    }

    #[tokio::test]
    async fn test_reopen_keeps_or_drops_sequence() {
        let backend = MemoryBackend::new();
        let collector = Collector::new(storage(&backend), false).await.unwrap();
        collector.collect(turn("human", "one")).await.unwrap();

        let reopened = Collector::new(storage(&backend), false).await.unwrap();
        reopened.collect(turn("human", "two")).await.unwrap();
        assert_eq!(reopened.dump().await.unwrap().len(), 2);

        let dropped = Collector::new(storage(&backend), true).await.unwrap();
        assert!(dropped.dump().await.unwrap().is_empty());
        dropped.collect(turn("human", "three")).await.unwrap();
        assert_eq!(dropped.dump().await.unwrap(), vec![turn("human", "three")]);
    }

    #[tokio::test]
    async fn test_custom_prefix_and_missing_entries() {
        let backend = MemoryBackend::new();
        let raw = storage(&backend);
        let collector = Collector::new(Arc::clone(&raw), true)
            .await
            .unwrap()
            .with_prefix("msgs_");

        collector.collect(turn("human", "a")).await.unwrap();
        collector.collect(turn("human", "b")).await.unwrap();
        raw.delete("msgs_0").await.unwrap();

        assert_eq!(collector.dump().await.unwrap(), vec![turn("human", "b")]);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let calls = &AtomicU32::new(0);
        let value = retry("flaky", 3, Duration::from_millis(1), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RagError::database("busy"))
            } else {
                Ok(7u64)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_surfaces_last_error() {
        let calls = &AtomicU32::new(0);
        let err = retry("down", 2, Duration::from_millis(1), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(RagError::database(format!("attempt {}", n)))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(err.to_string().contains("attempt 1"));
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let backend = MemoryBackend::new();
        let collector = Collector::new(storage(&backend), false).await.unwrap();
        assert!(collector.with_retry(0, Duration::ZERO).is_err());
    }
}
