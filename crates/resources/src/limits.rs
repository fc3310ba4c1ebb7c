//! Resource limit configuration and availability tracking.

use serde::{Deserialize, Serialize};

/// Resource limit configuration.
///
/// Holds the concurrency and memory ceilings the multi-transfer driver
/// enforces through [`crate::ResourceManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of concurrent transfers (the multi-transfer driver's
    /// admission window).
    pub concurrent_downloads: usize,
    /// Maximum memory usage in bytes for in-flight transfer buffers (None = unlimited).
    pub memory_usage: Option<u64>,
}

impl ResourceLimits {
    /// Create resource limits for testing (lower limits).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            concurrent_downloads: 2,
            memory_usage: Some(100 * 1024 * 1024), // 100MB
        }
    }

    /// Create resource limits based on system capabilities.
    #[must_use]
    pub fn from_system() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(4);

        Self {
            concurrent_downloads: cpu_count.min(8),
            memory_usage: None,
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            concurrent_downloads: 4,
            memory_usage: None,
        }
    }
}

/// Trait for converting pipeline configurations to resource limits.
pub trait IntoResourceLimits {
    /// Convert this configuration into `ResourceLimits`.
    fn into_resource_limits(self) -> ResourceLimits;
}

impl IntoResourceLimits for &sps2_config::GeneralConfig {
    fn into_resource_limits(self) -> ResourceLimits {
        ResourceLimits {
            concurrent_downloads: self.parallel_downloads,
            memory_usage: None,
        }
    }
}

/// Resource availability information.
#[derive(Debug, Clone)]
pub struct ResourceAvailability {
    /// Number of download permits currently available.
    pub download: usize,
}

impl ResourceAvailability {
    /// Check if any download permits are available.
    #[must_use]
    pub fn has_any_available(&self) -> bool {
        self.download > 0
    }

    /// Check if all download permits are available (nothing in flight).
    #[must_use]
    pub fn all_available(&self, limits: &ResourceLimits) -> bool {
        self.download >= limits.concurrent_downloads
    }
}
