//! Request id allocation and reply matching.
//!
//! Every outgoing request is registered here before it is written, so a
//! reply can never arrive ahead of its table entry. Replies are matched
//! purely by id and may complete in any order.
//!
//! ```text
//! caller:  register() -> write envelope -> wait(handle, timeout)
//! reader:  resolve(id, envelope)                      (reply)
//! session: fail_all(ConnectionLost), reset()          (connection loss)
//! ```
//!
//! The table lock covers map mutation only; it is never held across an
//! await. Ids restart at 1 for each session, and every entry records the
//! session generation it was allocated in, so a handle from an earlier
//! session can never remove an entry of the current one.

use crate::error::ClientError;
use hassmux_core::Envelope;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

struct PendingRequest {
    generation: u64,
    slot: oneshot::Sender<Result<Envelope, ClientError>>,
    created_at: Instant,
}

struct Table {
    generation: u64,
    next_id: u64,
    pending: HashMap<u64, PendingRequest>,
}

impl Table {
    fn remove(&mut self, id: u64, generation: u64) -> Option<PendingRequest> {
        match self.pending.get(&id) {
            Some(entry) if entry.generation == generation => self.pending.remove(&id),
            _ => None,
        }
    }
}

/// Correlation table shared by callers and the reader task.
#[derive(Clone)]
pub struct Correlator {
    table: Arc<Mutex<Table>>,
}

impl Correlator {
    /// Creates an empty correlator; the first id handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                generation: 0,
                next_id: 1,
                pending: HashMap::new(),
            })),
        }
    }

    /// Allocates the next id and inserts a pending entry for it.
    pub fn register(&self) -> PendingHandle {
        let (slot, rx) = oneshot::channel();
        let created_at = Instant::now();

        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;
        let generation = table.generation;
        table.pending.insert(
            id,
            PendingRequest {
                generation,
                slot,
                created_at,
            },
        );
        drop(table);

        PendingHandle {
            id,
            generation,
            rx,
            table: Arc::clone(&self.table),
        }
    }

    /// Delivers a reply to the caller waiting on `id`.
    ///
    /// Returns false if no entry matches; the reply is logged and dropped.
    pub fn resolve(&self, id: u64, reply: Envelope) -> bool {
        let entry = self.table.lock().pending.remove(&id);
        match entry {
            Some(entry) => {
                let elapsed = entry.created_at.elapsed();
                if entry.slot.send(Ok(reply)).is_err() {
                    tracing::debug!(id, "caller stopped waiting before the reply arrived");
                } else {
                    tracing::debug!(id, ?elapsed, "reply delivered");
                }
                true
            }
            None => {
                tracing::warn!(id, kind = %reply.kind, "dropping unmatched reply");
                false
            }
        }
    }

    /// Waits for the reply to `handle` for at most `timeout`.
    ///
    /// Only the calling task waits. On timeout the entry is removed, so a
    /// reply arriving later is treated as unmatched.
    ///
    /// # Errors
    /// Returns `ClientError::Timeout` if nothing arrived in time, or the
    /// failure the entry was resolved with.
    pub async fn wait(
        &self,
        mut handle: PendingHandle,
        timeout: Duration,
    ) -> Result<Envelope, ClientError> {
        match tokio::time::timeout(timeout, &mut handle.rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ClientError::ConnectionLost),
            Err(_) => {
                let id = handle.id;
                if self.table.lock().remove(id, handle.generation).is_some() {
                    tracing::debug!(id, ?timeout, "request timed out");
                    return Err(ClientError::Timeout { id, timeout });
                }
                // A resolve took the entry between the timer firing and the
                // removal; its value is already in the slot.
                handle
                    .rx
                    .try_recv()
                    .unwrap_or(Err(ClientError::Timeout { id, timeout }))
            }
        }
    }

    /// Removes the entry of a request that was never written.
    pub fn cancel(&self, handle: PendingHandle) {
        if self
            .table
            .lock()
            .remove(handle.id, handle.generation)
            .is_some()
        {
            tracing::debug!(id = handle.id, "registration rolled back");
        }
    }

    /// Fails every pending entry with `reason` and clears the table.
    ///
    /// Returns the number of callers that were failed.
    pub fn fail_all(&self, reason: ClientError) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut table = self.table.lock();
            table.pending.drain().map(|(_, entry)| entry).collect()
        };

        let count = drained.len();
        for entry in drained {
            let _ = entry.slot.send(Err(reason.clone()));
        }
        count
    }

    /// Starts the id space of a new session.
    ///
    /// Ids restart at 1 and the generation advances. Entries still present
    /// belong to the previous connection and fail with `ConnectionLost`.
    pub fn reset(&self) -> u64 {
        let (generation, leftovers) = {
            let mut table = self.table.lock();
            table.generation += 1;
            table.next_id = 1;
            let leftovers: Vec<PendingRequest> =
                table.pending.drain().map(|(_, entry)| entry).collect();
            (table.generation, leftovers)
        };

        for entry in leftovers {
            let _ = entry.slot.send(Err(ClientError::ConnectionLost));
        }
        generation
    }

    /// Returns the number of requests in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().pending.len()
    }

    /// Returns true if no request is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `id` is in flight.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.table.lock().pending.contains_key(&id)
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller's handle on a registered request.
///
/// Dropping the handle removes its entry, so an abandoned wait never leaves
/// a dangling registration behind.
pub struct PendingHandle {
    id: u64,
    generation: u64,
    rx: oneshot::Receiver<Result<Envelope, ClientError>>,
    table: Arc<Mutex<Table>>,
}

impl PendingHandle {
    /// Returns the id to embed in the request envelope.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the session generation the id belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        self.table.lock().remove(self.id, self.generation);
    }
}

impl std::fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}
