//! The unit of work moved through the single- and multi-transfer drivers.
//!
//! A [`Payload`] is deliberately split into an immutable [`Request`] (built
//! once by the caller) and a mutable [`Attempt`] that the single-transfer
//! driver resets between mirrors. The original design mutated one shared
//! struct for both roles, which made it easy for state from a failed mirror
//! (a stale `respcode`, a half-updated `prevprogress`) to leak into the next
//! attempt; splitting the two means "start a new attempt" is just
//! `Attempt::default()` plus the server index, not a field-by-field reset.

use std::path::PathBuf;
use std::time::SystemTime;
use url::Url;

/// Caller-supplied, immutable description of a single file to retrieve.
#[derive(Debug, Clone)]
pub struct Request {
    /// Mirrors to try, in order. The multi-transfer driver never reorders
    /// this list; [`Attempt::server_idx`] walks it.
    pub servers: Vec<Url>,
    /// Directory the final file (and its `.sig`, if any) is published into.
    pub dest_dir: PathBuf,
    /// Filename to use when the server gives no usable hint, and the only
    /// name ever used to build the `.part` temp file.
    pub remote_name: String,
    /// Trust a server-supplied `Content-Disposition` filename over
    /// `remote_name` for the *published* destination name.
    pub trust_remote_name: bool,
    /// Abort the transfer once more than this many bytes have arrived.
    /// `None` means no cap beyond what the server reports.
    pub max_size: Option<u64>,
    /// Allow resuming from an existing `.part` file via a Range request.
    pub allow_resume: bool,
    /// Re-fetch even if the destination file already exists and looks current.
    pub force: bool,
    /// When true, a failure of this payload does not abort a `multi_download`
    /// batch; the driver records it and continues with the rest.
    pub errors_ok: bool,
    /// Also fetch `<remote_name>.sig`, best-effort and capped at
    /// `NetworkConfig::max_sig_size`. The engine does not verify the
    /// signature itself; that is the caller's job once the companion
    /// payload completes.
    pub fetch_signature: bool,
    /// Remove the partial temp file if every mirror fails.
    pub unlink_on_fail: bool,
    /// This payload is a `.sig` companion: the single-transfer driver must
    /// not emit `Init`/`Progress`/`Completed` events for it.
    pub is_signature: bool,
}

impl Request {
    /// Build a request for a single URL with the engine's defaults
    /// (resume enabled, no signature fetch, errors fatal).
    #[must_use]
    pub fn new(url: Url, dest_dir: PathBuf) -> Self {
        let remote_name = crate::url::remote_name_from_url(&url)
            .unwrap_or_else(|| "download".to_string());
        Self {
            servers: vec![url],
            dest_dir,
            remote_name,
            trust_remote_name: false,
            max_size: None,
            allow_resume: true,
            force: false,
            errors_ok: false,
            fetch_signature: false,
            unlink_on_fail: true,
            is_signature: false,
        }
    }

    /// Final published path for the primary file.
    #[must_use]
    pub fn destfile_path(&self, published_name: &str) -> PathBuf {
        self.dest_dir.join(published_name)
    }

    /// Build the paired `.sig` request for a payload whose `fetch_signature`
    /// flag is set. Always optional (`errors_ok = true`) and never resumed:
    /// signatures are small enough that a fresh fetch is cheaper than the
    /// bookkeeping a partial one would need. `max_sig_size` (from
    /// [`sps2_config::NetworkConfig::max_sig_size`]) caps the companion the
    /// same way `max_size` caps any other payload; the core enforces this
    /// cap itself rather than leaving oversized `.sig` files for the caller
    /// to notice after the fact.
    #[must_use]
    pub fn signature_companion(&self, max_sig_size: u64) -> Self {
        let servers = self
            .servers
            .iter()
            .map(|url| append_sig_suffix(url))
            .collect();
        Self {
            servers,
            dest_dir: self.dest_dir.clone(),
            remote_name: format!("{}.sig", self.remote_name),
            trust_remote_name: false,
            max_size: Some(max_sig_size),
            allow_resume: false,
            force: self.force,
            errors_ok: true,
            fetch_signature: false,
            unlink_on_fail: true,
            is_signature: true,
        }
    }
}

/// Append `.sig` to a URL's path, leaving query and fragment untouched.
fn append_sig_suffix(url: &Url) -> Url {
    let mut sig = url.clone();
    let new_path = format!("{}.sig", sig.path());
    sig.set_path(&new_path);
    sig
}

/// Per-attempt mutable state, reset each time the single-transfer driver
/// moves to a new mirror.
#[derive(Debug, Clone, Default)]
pub struct Attempt {
    /// Index into [`Request::servers`] currently being tried.
    pub server_idx: usize,
    /// HTTP status of the most recent response, if any.
    pub respcode: Option<u16>,
    /// Size already present on disk (the resume offset) when this attempt began.
    pub initial_size: u64,
    /// Bytes reported in the last `Progress` event, used to suppress
    /// duplicate/decreasing callbacks.
    pub prevprogress: u64,
    /// `Content-Disposition` filename offered by the server, if any.
    pub content_disp_name: Option<String>,
    /// Local name of the `.part` temp file while this attempt is in flight.
    pub tempfile_name: Option<PathBuf>,
    /// `Last-Modified` the server reported, used for a future conditional GET.
    pub last_modified: Option<SystemTime>,
}

/// A single file transfer: an immutable request plus its in-progress attempt state.
#[derive(Debug, Clone)]
pub struct Payload {
    pub request: Request,
    pub attempt: Attempt,
}

impl Payload {
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            attempt: Attempt::default(),
        }
    }

    /// Current mirror URL, or `None` once every server has been tried.
    #[must_use]
    pub fn current_server(&self) -> Option<&Url> {
        self.request.servers.get(self.attempt.server_idx)
    }

    /// Advance to the next mirror, discarding attempt state tied to the
    /// previous one (but not `initial_size`/`tempfile_name`, which describe
    /// the on-disk `.part` file shared across mirrors for the same payload).
    pub fn retry_next_server(&mut self) {
        self.attempt.server_idx += 1;
        self.attempt.respcode = None;
        self.attempt.content_disp_name = None;
        self.attempt.last_modified = None;
    }

    #[must_use]
    pub fn servers_exhausted(&self) -> bool {
        self.attempt.server_idx >= self.request.servers.len()
    }
}
