//! Asynchronous write-behind wrapper around a [`KvStore`].
//!
//! `set` and `remove` record the new value in a pending overlay and queue
//! the write; a single background writer applies queued writes to the
//! inner store in submission order. Callers never wait on disk I/O and
//! reads always see the latest submitted value.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tracing::error;

use super::KvStore;
use crate::error::StorageError;

enum WriteOp {
    Set { seq: u64, key: String, value: String },
    Remove { seq: u64, key: String },
    Flush(oneshot::Sender<()>),
}

type Pending = Arc<Mutex<HashMap<String, (u64, Option<String>)>>>;

/// Fire-and-forget persistence in front of a durable store.
///
/// Must be created inside a tokio runtime.
pub struct WriteBehind {
    inner: Arc<dyn KvStore>,
    pending: Pending,
    next_seq: Mutex<u64>,
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteBehind {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let writer_store = inner.clone();
        let writer_pending = pending.clone();
        tokio::task::spawn_blocking(move || {
            while let Some(op) = rx.blocking_recv() {
                let (seq, key, result) = match op {
                    WriteOp::Set { seq, key, value } => {
                        let result = writer_store.set(&key, &value);
                        (seq, key, result)
                    }
                    WriteOp::Remove { seq, key } => {
                        let result = writer_store.remove(&key);
                        (seq, key, result)
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                        continue;
                    }
                };

                if let Err(e) = result {
                    error!(key = %key, "write-behind persist failed: {e}");
                }

                if let Ok(mut pending) = writer_pending.lock() {
                    if pending.get(&key).map(|(s, _)| *s) == Some(seq) {
                        pending.remove(&key);
                    }
                }
            }
        });

        Self {
            inner,
            pending,
            next_seq: Mutex::new(0),
            tx,
        }
    }

    /// Wait until every write queued before this call has been applied.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriteOp::Flush(done_tx))
            .map_err(|_| StorageError::QueueClosed)?;
        done_rx.await.map_err(|_| StorageError::QueueClosed)
    }

    /// Number of keys whose latest write has not reached the inner store.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn enqueue(&self, key: &str, value: Option<String>) -> Result<(), StorageError> {
        // Held until the op is queued so sequence, overlay and queue order agree.
        let mut next = self
            .next_seq
            .lock()
            .map_err(|_| StorageError::QueryFailed("sequence mutex poisoned".into()))?;
        *next += 1;
        let seq = *next;

        self.pending
            .lock()
            .map_err(|_| StorageError::QueryFailed("pending mutex poisoned".into()))?
            .insert(key.to_string(), (seq, value.clone()));

        let op = match value {
            Some(value) => WriteOp::Set {
                seq,
                key: key.to_string(),
                value,
            },
            None => WriteOp::Remove {
                seq,
                key: key.to_string(),
            },
        };
        self.tx.send(op).map_err(|_| StorageError::QueueClosed)
    }
}

impl KvStore for WriteBehind {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Ok(pending) = self.pending.lock() {
            if let Some((_, value)) = pending.get(key) {
                return Ok(value.clone());
            }
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.enqueue(key, Some(value.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.enqueue(key, None)
    }
}
