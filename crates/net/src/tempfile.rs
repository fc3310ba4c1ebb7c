//! Temp-file discipline: named `.part` files for resumable transfers and
//! anonymous `alpmtmp.XXXXXX`-style files for one-shot fetches (e.g. `.sig`
//! companions), plus the atomic rename that publishes a finished transfer.
//!
//! Permissions are set explicitly on the created file rather than read from
//! and restored to the process umask — the process umask is global mutable
//! state, so toggling it around a single file creation is not safe to do
//! from more than one task at a time. Explicit `0644` sidesteps the race
//! entirely.

use rand::Rng;
use sps2_config::fixed_paths::{ANON_TEMP_PREFIX, ANON_TEMP_SUFFIX_LEN, PART_SUFFIX};
use sps2_errors::Error;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};

const ANON_CREATE_ATTEMPTS: u32 = 16;

/// Resolves the on-disk locations a transfer touches and performs the
/// create/publish/cleanup operations around them.
#[derive(Debug, Clone)]
pub struct TempFileManager {
    dest_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl TempFileManager {
    #[must_use]
    pub fn new(dest_dir: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            tmp_dir: tmp_dir.into(),
        }
    }

    /// Path of the named `.part` file for a given remote filename. This name
    /// is derived only from `remote_name`, never from a server-supplied
    /// `Content-Disposition` value, so resume works even if the server's
    /// hint changes between attempts.
    #[must_use]
    pub fn part_path(&self, remote_name: &str) -> PathBuf {
        self.tmp_dir.join(format!("{remote_name}{PART_SUFFIX}"))
    }

    /// Final destination path a transfer publishes to.
    #[must_use]
    pub fn dest_path(&self, published_name: &str) -> PathBuf {
        self.dest_dir.join(published_name)
    }

    /// Open (or create) the named `.part` file, positioned to append at
    /// `resume_offset`. Passing `resume_offset == 0` always truncates.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub async fn open_named(&self, part_path: &Path, resume_offset: u64) -> Result<File, Error> {
        ensure_dir(&self.tmp_dir).await?;
        let file = if resume_offset > 0 {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(part_path)
                .await
                .map_err(|e| Error::io_with_path(&e, part_path))?
        } else {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(part_path)
                .await
                .map_err(|e| Error::io_with_path(&e, part_path))?;
            set_mode(&file, 0o644).await?;
            file
        };
        Ok(file)
    }

    /// Create an anonymous temp file using `O_CREAT|O_EXCL`-equivalent
    /// exclusive creation, named `alpmtmp.` followed by six random
    /// alphanumeric characters, retrying on collision.
    ///
    /// # Errors
    ///
    /// Returns an error if no unused name is found within a bounded number
    /// of attempts, or if file creation fails for any other reason.
    pub async fn create_anonymous(&self) -> Result<(File, PathBuf), Error> {
        ensure_dir(&self.tmp_dir).await?;
        let mut last_err = None;
        for _ in 0..ANON_CREATE_ATTEMPTS {
            let path = self.tmp_dir.join(random_anon_name());
            match OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    set_mode(&file, 0o644).await?;
                    return Ok((file, path));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(Error::io_with_path(&e, path)),
            }
        }
        Err(last_err.map_or_else(
            || Error::internal("failed to allocate anonymous temp file"),
            |e| Error::io_with_path(&e, &self.tmp_dir),
        ))
    }

    /// Atomically publish a finished temp file to its destination via rename.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails (e.g. the temp file and
    /// destination live on different filesystems).
    pub async fn publish(&self, tmp_path: &Path, dest_path: &Path) -> Result<(), Error> {
        if let Some(parent) = dest_path.parent() {
            ensure_dir(parent).await?;
        }
        fs::rename(tmp_path, dest_path)
            .await
            .map_err(|e| Error::io_with_path(&e, tmp_path))
    }

    /// Best-effort removal used when a transfer fails and `unlink_on_fail` is set.
    pub async fn remove_best_effort(&self, path: &Path) {
        let _ = fs::remove_file(path).await;
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io_with_path(&e, dir))
}

#[cfg(unix)]
async fn set_mode(file: &File, mode: u32) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
        .await
        .map_err(Error::from)
}

#[cfg(not(unix))]
async fn set_mode(_file: &File, _mode: u32) -> Result<(), Error> {
    Ok(())
}

fn random_anon_name() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ANON_TEMP_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();
    format!("{ANON_TEMP_PREFIX}{suffix}")
}
