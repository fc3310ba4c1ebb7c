//! Centralized, non-configurable filesystem conventions for the download engine.
//!
//! These are deliberately not exposed via TOML configuration since changing
//! them would silently break resume across process restarts.

/// Default directory downloaded artifacts are published into.
pub const CACHE_DIR: &str = "/opt/pm/cache";

/// Suffix appended to the destination filename while a named transfer is in flight.
pub const PART_SUFFIX: &str = ".part";

/// Prefix used for anonymous temp files (e.g. `.sig` fetches) created with `mkstemp`-style
/// exclusive creation.
pub const ANON_TEMP_PREFIX: &str = "alpmtmp.";

/// Number of random suffix characters appended to `ANON_TEMP_PREFIX`, mirroring `XXXXXX`.
pub const ANON_TEMP_SUFFIX_LEN: usize = 6;
