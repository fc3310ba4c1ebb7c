//! Core configuration types shared by the download engine and its callers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Maximum number of transfers the multi-transfer driver runs concurrently.
    #[serde(default = "default_parallel_downloads")]
    pub parallel_downloads: usize,

    /// Disable the per-transfer low-speed/idle timeout (useful on slow mirrors).
    #[serde(default)]
    pub disable_dl_timeout: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            parallel_downloads: default_parallel_downloads(),
            disable_dl_timeout: false,
        }
    }
}

/// Minimum signature verification level requested by the caller.
///
/// The download engine only uses this to decide whether to also fetch the
/// companion `.sig` file; it never verifies the signature itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureLevel {
    /// Never fetch `.sig` files.
    Never,
    /// Fetch `.sig` files when present but tolerate their absence.
    Optional,
    /// Fetch `.sig` files and treat a missing one as a transfer error.
    Required,
}

impl Default for SignatureLevel {
    fn default() -> Self {
        Self::Optional
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-attempt connect/idle timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Number of additional attempts against the *same* mirror before failover.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay between same-mirror retries, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Overrides the `User-Agent` header; falls back to `HTTP_USER_AGENT` env var.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Upper bound on the size of an anonymous `.sig` companion fetch.
    #[serde(default = "default_max_sig_size")]
    pub max_sig_size: u64,

    /// Signature policy passed through to callers; see [`SignatureLevel`].
    #[serde(default)]
    pub siglevel: SignatureLevel,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            user_agent: None,
            max_sig_size: default_max_sig_size(),
            siglevel: SignatureLevel::default(),
        }
    }
}

/// Filesystem path configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Directory downloaded artifacts are published into.
    pub cache_dir: Option<PathBuf>,
    /// Directory used for `.part` and anonymous temp files; defaults to `cache_dir`.
    pub tmp_dir: Option<PathBuf>,
}

fn default_parallel_downloads() -> usize {
    4
}

fn default_timeout() -> u64 {
    300
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

fn default_max_sig_size() -> u64 {
    64 * 1024
}
