//! Sequence number allocation and request/response matching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use guestlink_frame::Message;
use tokio::sync::oneshot;

use crate::error::{HostError, Result};

type Waiter = oneshot::Sender<Result<Message>>;

/// Matches responses from the guest to outstanding requests by sequence
/// number.
///
/// Sequence numbers start at 1, wrap after `u32::MAX` and never take the
/// value 0, which the guest uses for unsolicited messages.
#[derive(Debug)]
pub struct Correlator {
    next_seq: AtomicU32,
    pending: Mutex<HashMap<u32, Waiter>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub(crate) fn starting_at(seq: u32) -> Self {
        Self {
            next_seq: AtomicU32::new(seq),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next sequence number.
    pub fn next_seq(&self) -> u32 {
        loop {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            if seq != 0 {
                return seq;
            }
        }
    }

    /// Register a waiter for `seq`.
    ///
    /// The entry is removed when the returned [`PendingRequest`] is dropped,
    /// so a request that timed out or was abandoned leaves nothing behind.
    pub fn register(&self, seq: u32) -> PendingRequest<'_> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(seq, tx);
        PendingRequest {
            seq,
            rx,
            correlator: self,
        }
    }

    /// Deliver a response to its waiter.
    ///
    /// Returns `false` when nobody is waiting for `msg.seq`.
    pub fn complete(&self, msg: Message) -> bool {
        let Some(waiter) = self.lock().remove(&msg.seq) else {
            return false;
        };
        // The receiver may have given up in the meantime.
        let _ = waiter.send(Ok(msg));
        true
    }

    /// Reject every outstanding request. Returns how many were rejected.
    pub fn fail_all(&self, error: impl Fn() -> HostError) -> usize {
        let drained: Vec<Waiter> = self.lock().drain().map(|(_, waiter)| waiter).collect();
        let count = drained.len();
        for waiter in drained {
            let _ = waiter.send(Err(error()));
        }
        count
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn forget(&self, seq: u32) {
        self.lock().remove(&seq);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Waiter>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// An outstanding request registered with a [`Correlator`].
#[derive(Debug)]
pub struct PendingRequest<'a> {
    seq: u32,
    rx: oneshot::Receiver<Result<Message>>,
    correlator: &'a Correlator,
}

impl PendingRequest<'_> {
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Wait up to `timeout` for the response.
    pub async fn wait(mut self, timeout: Duration) -> Result<Message> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HostError::ConnectionClosed),
            Err(_) => Err(HostError::Timeout(timeout)),
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.correlator.forget(self.seq);
    }
}
