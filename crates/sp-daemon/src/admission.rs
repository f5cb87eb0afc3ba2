//! Admission control
//!
//! Bounds how many sessions the daemon forwards at once. Each forwarded
//! connection holds one [`AdmissionToken`] from before its far stream is
//! dialed until its session has fully finished; dropping the token frees
//! the slot on every exit path.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate with a fixed number of session slots
#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One held session slot
#[derive(Debug)]
pub struct AdmissionToken {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot
    ///
    /// Returns `None` once the controller has been closed.
    pub async fn acquire(&self) -> Option<AdmissionToken> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        Some(AdmissionToken { _permit: permit })
    }

    /// Stop handing out slots; pending and future `acquire` calls return `None`
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }
}
