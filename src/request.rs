//! Messages and reply primitives between store handles and the store actor.
//!
//! Every call becomes one [`Request`] on the actor's ordered queue and
//! carries its own one-shot reply channel, so the actor never blocks when
//! handing a reply back. A successful `get` returns a [`StoreResult`] that
//! holds a reader lease until it is released or dropped.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use crate::error::Result;
use crate::traits::Post;

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// One store call, consumed exactly once by the actor.
pub(crate) enum Request<D: ?Sized> {
    Add {
        docs: Vec<Arc<D>>,
        reply: Reply<()>,
    },
    Remove {
        keys: Vec<String>,
        reply: Reply<()>,
    },
    /// An empty `keys` asks for every stored document.
    Get {
        keys: Vec<String>,
        reply: Reply<StoreResult<D>>,
    },
}

// ═══════════════════════════════════════════════════════════════════════
// Reader leases
// ═══════════════════════════════════════════════════════════════════════

/// Store-global count of outstanding reader leases.
///
/// Leases are released straight through the watch channel, never through
/// the actor, so a writer parked in [`Readers::drained`] is always woken.
#[derive(Debug)]
pub(crate) struct Readers {
    count: watch::Sender<usize>,
}

impl Readers {
    pub(crate) fn new() -> Arc<Self> {
        let (count, _) = watch::channel(0);
        Arc::new(Self { count })
    }

    pub(crate) fn acquire(self: &Arc<Self>) -> Lease {
        self.count.send_modify(|n| *n += 1);
        Lease {
            readers: Arc::clone(self),
        }
    }

    pub(crate) fn outstanding(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once no lease is outstanding.
    pub(crate) async fn drained(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the wait cannot fail.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// One outstanding read. Dropping it releases the read.
#[derive(Debug)]
pub(crate) struct Lease {
    readers: Arc<Readers>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.readers
            .count
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// StoreResult
// ═══════════════════════════════════════════════════════════════════════

/// Documents returned from [`Store::get`](crate::store::Store::get).
///
/// While a result is alive, writers replacing or removing an existing key
/// (any key, not only the ones in this result) wait. Release it as soon as
/// the documents have been read. Dropping the result releases it too, so
/// every exit path gives the lease back exactly once.
pub struct StoreResult<D: ?Sized> {
    content: Vec<Arc<D>>,
    _lease: Lease,
}

impl<D: ?Sized> StoreResult<D> {
    pub(crate) fn new(content: Vec<Arc<D>>, lease: Lease) -> Self {
        Self {
            content,
            _lease: lease,
        }
    }

    pub fn content(&self) -> &[Arc<D>] {
        &self.content
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<D>> {
        self.content.iter()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Gives the reader lease back.
    pub fn release(self) {}
}

impl<D: Post + ?Sized> StoreResult<D> {
    /// Orders posts newest first. Posts without a date go last.
    pub fn sort_by_date(&mut self) {
        self.content.sort_by(|a, b| b.date().cmp(&a.date()));
    }
}

impl<'a, D: ?Sized> IntoIterator for &'a StoreResult<D> {
    type Item = &'a Arc<D>;
    type IntoIter = std::slice::Iter<'a, Arc<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.content.iter()
    }
}

impl<D: ?Sized> std::fmt::Debug for StoreResult<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreResult")
            .field("len", &self.content.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Keyer;
    use chrono::NaiveDate;

    struct Dated(&'static str, Option<NaiveDate>);

    impl Keyer for Dated {
        fn key(&self) -> String {
            self.0.to_string()
        }
    }

    impl Post for Dated {
        fn title(&self) -> String {
            self.0.to_string()
        }
        fn date(&self) -> Option<NaiveDate> {
            self.1
        }
        fn content(&self) -> String {
            String::new()
        }
    }

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2012, 12, d)
    }

    #[test]
    fn test_lease_counts_once_per_result() {
        let readers = Readers::new();
        let a = readers.acquire();
        let b = readers.acquire();
        assert_eq!(readers.outstanding(), 2);
        drop(a);
        assert_eq!(readers.outstanding(), 1);
        drop(b);
        assert_eq!(readers.outstanding(), 0);
    }

    #[test]
    fn test_release_consumes_lease() {
        let readers = Readers::new();
        let result: StoreResult<Dated> = StoreResult::new(Vec::new(), readers.acquire());
        assert_eq!(readers.outstanding(), 1);
        result.release();
        assert_eq!(readers.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_drained_resolves_after_last_release() {
        let readers = Readers::new();
        let lease = readers.acquire();
        let waiter = {
            let readers = Arc::clone(&readers);
            tokio::spawn(async move { readers.drained().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(lease);
        waiter.await.unwrap();
    }

    #[test]
    fn test_sort_by_date_newest_first() {
        let readers = Readers::new();
        let posts: Vec<Arc<dyn Post>> = vec![
            Arc::new(Dated("old", day(1))),
            Arc::new(Dated("undated", None)),
            Arc::new(Dated("new", day(20))),
            Arc::new(Dated("mid", day(10))),
        ];
        let mut result = StoreResult::new(posts, readers.acquire());
        result.sort_by_date();
        let order: Vec<String> = result.iter().map(|p| p.key()).collect();
        assert_eq!(order, vec!["new", "mid", "old", "undated"]);
    }
}
