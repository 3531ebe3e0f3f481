use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Single-slot admission control between an encode session and its encoder.
///
/// The encoder is ready for more data exactly when the slot is free. Appending a frame claims
/// the slot via [`ReadySignal::try_claim`]; the encoder holds the [`ReadyPermit`] until it has
/// consumed the frame and drops it to signal capacity again. Waiting is event-driven.
#[derive(Clone, Debug)]
pub struct ReadySignal {
    slot: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
}

impl ReadySignal {
    /// A signal with one free slot.
    pub fn single_slot() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` when a frame can be appended right now.
    pub fn is_ready(&self) -> bool {
        !self.is_closed() && self.slot.available_permits() > 0
    }

    /// Wait until the slot is free.
    ///
    /// Returns `false` if the signal was closed, meaning no more data will ever be accepted.
    pub async fn ready(&self) -> bool {
        match self.slot.acquire().await {
            Ok(permit) => {
                drop(permit);
                true
            }
            Err(_) => false,
        }
    }

    /// Claim the slot without waiting.
    pub fn try_claim(&self) -> Option<ReadyPermit> {
        Arc::clone(&self.slot)
            .try_acquire_owned()
            .ok()
            .map(|permit| ReadyPermit { _permit: permit })
    }

    /// Refuse all further claims and wake every waiter.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.slot.close();
    }

    /// `true` once [`ReadySignal::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Proof that the slot is claimed. Dropping it frees the slot.
#[derive(Debug)]
pub struct ReadyPermit {
    _permit: OwnedSemaphorePermit,
}
