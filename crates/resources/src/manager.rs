//! Admission control for the multi-transfer driver.
//!
//! `ResourceManager` wraps a single [`tokio::sync::Semaphore`] sized by
//! [`crate::ResourceLimits::concurrent_downloads`]. The multi-transfer driver
//! acquires one permit per payload before admitting it into the in-flight
//! set, giving it a bounded concurrency window without any other form of
//! global locking.

use crate::limits::{ResourceAvailability, ResourceLimits};
use crate::semaphore::{acquire_semaphore_permit, create_semaphore, try_acquire_semaphore_permit};
use sps2_errors::Error;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Coordinates concurrent transfer admission for a single download session.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    limits: ResourceLimits,
    downloads: Arc<Semaphore>,
}

impl ResourceManager {
    /// Build a manager from explicit limits.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        let downloads = create_semaphore(limits.concurrent_downloads);
        Self { limits, downloads }
    }

    /// Acquire one admission permit, waiting if the window is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has been dropped while a caller is
    /// still waiting on it.
    pub async fn acquire_download_permit(&self) -> Result<OwnedSemaphorePermit, Error> {
        acquire_semaphore_permit(self.downloads.clone(), "download").await
    }

    /// Attempt to acquire an admission permit without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has been dropped.
    pub fn try_acquire_download_permit(&self) -> Result<Option<OwnedSemaphorePermit>, Error> {
        try_acquire_semaphore_permit(&self.downloads)
    }

    /// Snapshot of currently free permits.
    #[must_use]
    pub fn availability(&self) -> ResourceAvailability {
        ResourceAvailability {
            download: self.downloads.available_permits(),
        }
    }

    /// The limits this manager was built from.
    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}
