//! The post store: a key→document map owned by a single actor task.
//!
//! All calls are serialized through one ordered queue, so the map is only
//! ever touched by the actor. Readers get shared [`Arc`] handles plus a
//! lease; a writer that would replace or remove an existing key first waits
//! until every outstanding lease in the store has been released.
//!
//! | Method | Waits for readers |
//! |--------|-------------------|
//! | [`add`](Store::add) | only when the key already exists |
//! | [`remove`](Store::remove) | only when the key exists |
//! | [`get`](Store::get) | never |

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{Error, Result};
use crate::request::{Readers, Reply, Request, StoreResult};
use crate::traits::{Keyer, Post};

/// Requests queued beyond this make callers wait for the actor.
const REQUEST_QUEUE_DEPTH: usize = 64;

/// Store of blog posts, as filled by repositories.
pub type PostStore = Store<dyn Post>;

/// Cloneable handle to a running store actor.
///
/// The actor stops once every handle has been dropped.
pub struct Store<D: ?Sized> {
    tx: mpsc::Sender<Request<D>>,
    readers: Arc<Readers>,
}

impl<D: ?Sized> Clone for Store<D> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            readers: Arc::clone(&self.readers),
        }
    }
}

impl<D: ?Sized> std::fmt::Debug for Store<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("outstanding_readers", &self.readers.outstanding())
            .finish()
    }
}

impl<D> Store<D>
where
    D: Keyer + Send + Sync + ?Sized + 'static,
{
    /// Starts the actor on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let readers = Readers::new();
        let actor = StoreActor {
            rx,
            data: HashMap::new(),
            readers: Arc::clone(&readers),
        };
        tokio::spawn(actor.run());
        Self { tx, readers }
    }

    /// Inserts or replaces documents, in order.
    ///
    /// A new key is inserted immediately. Replacing an existing key waits
    /// until no reader lease is outstanding. The first document without a
    /// key aborts the call with [`Error::NotAKeyer`]; documents before it
    /// stay applied.
    pub async fn add(&self, docs: impl IntoIterator<Item = Arc<D>>) -> Result<()> {
        let docs: Vec<Arc<D>> = docs.into_iter().collect();
        self.call(|reply| Request::Add { docs, reply }).await
    }

    /// Removes documents by key. Absent keys are ignored.
    ///
    /// Removing an existing key waits until no reader lease is outstanding.
    pub async fn remove<K: Keyer>(&self, items: impl IntoIterator<Item = K>) -> Result<()> {
        let keys = collect_keys(items);
        self.call(|reply| Request::Remove { keys, reply }).await
    }

    /// Fetches documents by key, in request order, or every document when
    /// no key is given.
    ///
    /// Fails with [`Error::NotFound`] if any requested key is absent; no
    /// partial result and no lease is handed out then.
    pub async fn get<K: Keyer>(&self, keys: impl IntoIterator<Item = K>) -> Result<StoreResult<D>> {
        let keys = collect_keys(keys);
        self.call(|reply| Request::Get { keys, reply }).await
    }

    pub async fn get_all(&self) -> Result<StoreResult<D>> {
        self.get(std::iter::empty::<&str>()).await
    }

    /// Number of results handed out and not yet released.
    pub fn outstanding_readers(&self) -> usize {
        self.readers.outstanding()
    }

    async fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request<D>) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(request(reply))
            .await
            .map_err(|_| Error::StoreClosed)?;
        response.await.map_err(|_| Error::StoreClosed)?
    }
}

fn collect_keys<K: Keyer>(items: impl IntoIterator<Item = K>) -> Vec<String> {
    items.into_iter().map(|item| item.key()).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Actor
// ═══════════════════════════════════════════════════════════════════════

struct StoreActor<D: ?Sized> {
    rx: mpsc::Receiver<Request<D>>,
    data: HashMap<String, Arc<D>>,
    readers: Arc<Readers>,
}

impl<D> StoreActor<D>
where
    D: Keyer + Send + Sync + ?Sized + 'static,
{
    async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            self.handle(request).await;
        }
        debug!(documents = self.data.len(), "store actor stopped");
    }

    async fn handle(&mut self, request: Request<D>) {
        // A caller that gave up on its reply is not an error for the store.
        match request {
            Request::Add { docs, reply } => {
                let res = self.add(docs).await;
                let _ = reply.send(res);
            }
            Request::Remove { keys, reply } => {
                let res = self.remove(keys).await;
                let _ = reply.send(res);
            }
            Request::Get { keys, reply } => {
                let res = self
                    .get(keys)
                    .map(|content| StoreResult::new(content, self.readers.acquire()));
                // An undelivered result drops here and gives its lease back.
                let _ = reply.send(res);
            }
        }
    }

    async fn add(&mut self, docs: Vec<Arc<D>>) -> Result<()> {
        for (index, doc) in docs.into_iter().enumerate() {
            let key = doc.key();
            if key.is_empty() {
                return Err(Error::NotAKeyer { index });
            }
            if self.data.contains_key(&key) {
                self.readers.drained().await;
            }
            self.data.insert(key, doc);
        }
        Ok(())
    }

    async fn remove(&mut self, keys: Vec<String>) -> Result<()> {
        for (index, key) in keys.into_iter().enumerate() {
            if key.is_empty() {
                return Err(Error::NotAKeyer { index });
            }
            if self.data.contains_key(&key) {
                self.readers.drained().await;
                self.data.remove(&key);
            }
        }
        Ok(())
    }

    fn get(&self, keys: Vec<String>) -> Result<Vec<Arc<D>>> {
        if keys.is_empty() {
            return Ok(self.data.values().cloned().collect());
        }
        let mut content = Vec::with_capacity(keys.len());
        for (index, key) in keys.into_iter().enumerate() {
            if key.is_empty() {
                return Err(Error::NotAKeyer { index });
            }
            match self.data.get(&key) {
                Some(doc) => content.push(Arc::clone(doc)),
                None => return Err(Error::NotFound { key }),
            }
        }
        Ok(content)
    }
}
