use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::capture::{cleanup_scratch_file, ComposedImage, SCRATCH_PREFIX};
use crate::permission::{PermissionGateway, PermissionKind, PermissionSystem};
use thiserror::Error;

pub const DEFAULT_FILE_PREFIX: &str = "framecam";
const DEFAULT_ALBUM: &str = "FrameCam";
const DEFAULT_SCRATCH_SUBDIR: &str = "framecam";
const PART_SUFFIX: &str = ".part";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage permission denied")]
    PermissionDenied,
    #[error("no pictures directory available")]
    MissingPicturesDirectory,
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("system time before unix epoch")]
    ClockBeforeEpoch,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
#[error("media registration failed for {path}: {message}")]
pub struct MediaIndexError {
    pub path: PathBuf,
    pub message: String,
}

/// OS registry that makes saved files visible to gallery apps.
pub trait MediaIndex: Send + Sync {
    fn register_media(&self, path: &Path) -> Result<(), MediaIndexError>;
}

/// Desktop galleries discover new files by watching the pictures directory,
/// so there is nothing to register.
#[derive(Debug, Default)]
pub struct PassiveMediaIndex;

impl MediaIndex for PassiveMediaIndex {
    fn register_media(&self, path: &Path) -> Result<(), MediaIndexError> {
        tracing::debug!(path = %path.display(), "media left for directory watchers");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDestination {
    pub directory: PathBuf,
    pub file_name: String,
}

impl SaveDestination {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Problems that do not undo a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveWarning {
    MediaRegistrationFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub destination: SaveDestination,
    pub warnings: Vec<SaveWarning>,
}

#[derive(Debug, Default, Clone)]
pub struct PruneReport {
    pub removed_files: usize,
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub scratch_dir: PathBuf,
    pub pictures_dir: PathBuf,
    pub file_prefix: String,
}

impl StorageLayout {
    pub fn new(scratch_dir: PathBuf, pictures_dir: PathBuf) -> Self {
        Self {
            scratch_dir,
            pictures_dir,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }

    /// `<cache>/framecam` for scratch, `<pictures>/<album>` for saves.
    pub fn with_default_paths(album: Option<&str>) -> StorageResult<Self> {
        let pictures_root = dirs::picture_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
            .ok_or(StorageError::MissingPicturesDirectory)?;
        let scratch_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(DEFAULT_SCRATCH_SUBDIR);
        Ok(Self::new(
            scratch_dir,
            pictures_root.join(album.unwrap_or(DEFAULT_ALBUM)),
        ))
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }
}

/// Copies composed images into the pictures directory.
pub struct StorageService<P: PermissionSystem, M: MediaIndex> {
    layout: StorageLayout,
    permissions: Arc<PermissionGateway<P>>,
    media_index: M,
}

impl<P: PermissionSystem, M: MediaIndex> StorageService<P, M> {
    pub fn new(layout: StorageLayout, permissions: Arc<PermissionGateway<P>>, media_index: M) -> Self {
        Self {
            layout,
            permissions,
            media_index,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.layout.scratch_dir
    }

    pub fn pictures_dir(&self) -> &Path {
        &self.layout.pictures_dir
    }

    /// Each call yields a new file; retrying after a failure is safe.
    pub fn save(&self, image: &ComposedImage) -> StorageResult<SaveReport> {
        if !self.permissions.check(PermissionKind::Storage).is_granted() {
            tracing::info!(capture_id = %image.capture_id, "save refused: storage permission not granted");
            return Err(StorageError::PermissionDenied);
        }

        let directory = self.layout.pictures_dir.clone();
        fs::create_dir_all(&directory).map_err(|err| StorageError::DirectoryCreateFailed {
            path: directory.clone(),
            source: err,
        })?;

        let destination = self.reserve_destination(image)?;
        let target = destination.path();
        if let Err(err) = copy_all_or_nothing(&image.path, &target) {
            cleanup_scratch_file(&target, "reserved save name");
            return Err(err);
        }
        tracing::info!(
            capture_id = %image.capture_id,
            path = %target.display(),
            "composed image saved"
        );

        let mut warnings = Vec::new();
        if let Err(err) = self.media_index.register_media(&target) {
            tracing::warn!(%err, "saved file not registered with media index");
            warnings.push(SaveWarning::MediaRegistrationFailed {
                message: err.to_string(),
            });
        }

        Ok(SaveReport {
            destination,
            warnings,
        })
    }

    /// Claims `<prefix>_<unix millis>.<ext>` by creating it empty, bumping the
    /// millis while the name is taken. The caller owns the reserved file.
    pub fn reserve_destination(&self, image: &ComposedImage) -> StorageResult<SaveDestination> {
        let mut millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| StorageError::ClockBeforeEpoch)?
            .as_millis();
        loop {
            let destination = SaveDestination {
                directory: self.layout.pictures_dir.clone(),
                file_name: format!(
                    "{}_{millis}.{}",
                    self.layout.file_prefix,
                    image.format.extension()
                ),
            };
            let target = destination.path();
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
            {
                Ok(_) => return Ok(destination),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => millis += 1,
                Err(err) => {
                    return Err(StorageError::CopyFailed {
                        from: image.path.clone(),
                        to: target,
                        source: err,
                    })
                }
            }
        }
    }

    /// Removes the scratch file of a dismissed image.
    pub fn discard(&self, image: &ComposedImage) -> StorageResult<()> {
        match fs::remove_file(&image.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    pub fn prune_stale_scratch(&self, max_age_hours: u64) -> StorageResult<PruneReport> {
        prune_stale_scratch_files(&self.layout.scratch_dir, max_age_hours)
    }
}

/// `destination` must already be reserved, which makes its part file
/// private to this call.
fn copy_all_or_nothing(source: &Path, destination: &Path) -> StorageResult<()> {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let part = destination.with_file_name(format!(".{file_name}{PART_SUFFIX}"));

    let result = fs::copy(source, &part)
        .and_then(|_| fs::rename(&part, destination))
        .map_err(|err| StorageError::CopyFailed {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: err,
        });
    if result.is_err() {
        cleanup_scratch_file(&part, "partial save copy");
    }
    result
}

pub fn prune_stale_scratch_files(scratch_dir: &Path, max_age_hours: u64) -> StorageResult<PruneReport> {
    prune_stale_scratch_files_with(scratch_dir, max_age_hours, |path| {
        fs::metadata(path)?.modified()
    })
}

fn prune_stale_scratch_files_with<F>(
    scratch_dir: &Path,
    max_age_hours: u64,
    modified_at: F,
) -> StorageResult<PruneReport>
where
    F: Fn(&Path) -> io::Result<SystemTime>,
{
    let now = SystemTime::now();
    let mut report = PruneReport::default();
    let max_age = Duration::from_secs(max_age_hours.saturating_mul(60 * 60));

    if !scratch_dir.exists() {
        return Ok(report);
    }

    for entry in fs::read_dir(scratch_dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                tracing::warn!(?err, "failed to read scratch directory entry");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }

        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_none_or(|name| !name.starts_with(SCRATCH_PREFIX))
        {
            continue;
        }

        let modified = match modified_at(&path) {
            Ok(modified) => modified,
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    ?err,
                    "skipping scratch file without readable mtime"
                );
                continue;
            }
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);

        if age > max_age {
            match fs::remove_file(&path) {
                Ok(()) => {
                    report.removed_files += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        ?err,
                        "failed to remove stale scratch file"
                    );
                }
            }
        }
    }

    Ok(report)
}
