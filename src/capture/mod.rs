use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::DynamicImage;
use thiserror::Error;

use crate::frame::Frame;

mod camera;
mod compose;

pub use camera::{CameraDevice, CameraLease, CommandCamera, InFlightCapture, SharedCamera};

pub const SCRATCH_PREFIX: &str = "capture_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    fn encoder_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Merged photo + frame written to the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedImage {
    pub capture_id: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub created_at: u64,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera unavailable: {message}")]
    DeviceUnavailable { message: String },
    #[error("camera busy: {message}")]
    DeviceBusy { message: String },
    #[error("failed to read source image {path}: {message}")]
    SourceReadFailed { path: PathBuf, message: String },
    #[error("failed to load frame: {message}")]
    FrameLoadFailed { message: String },
    #[error("compositing failed: {message}")]
    CompositingFailed { message: String },
    #[error("encoding failed: {message}")]
    EncodingFailed { message: String },
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image picker failed: {message}")]
    PickerFailed { message: String },
}

/// Gallery import collaborator. `Ok(None)` means the user cancelled.
pub trait ImagePicker {
    fn pick_image(&self) -> Result<Option<PathBuf>, CaptureError>;
}

/// Snapshot + compose in one call, holding the in-flight marker for the
/// duration.
pub fn capture_with<D: CameraDevice>(
    lease: &CameraLease<D>,
    frame: Option<&Frame>,
    scratch_dir: &Path,
) -> Result<ComposedImage, CaptureError> {
    let _in_flight = lease.begin_capture()?;
    let snapshot = take_snapshot(lease.device())?;
    compose_and_write(&snapshot, frame, scratch_dir)
}

pub fn take_snapshot<D: CameraDevice + ?Sized>(device: &D) -> Result<DynamicImage, CaptureError> {
    if !device.is_active() {
        return Err(CaptureError::DeviceUnavailable {
            message: "camera session is not active".to_string(),
        });
    }
    let snapshot = device.take_still_image()?;
    tracing::debug!(
        width = snapshot.width(),
        height = snapshot.height(),
        "camera snapshot acquired"
    );
    Ok(snapshot)
}

/// Gallery path: decode an existing image and run it through compositing.
pub fn compose_from_file(
    source: &Path,
    frame: Option<&Frame>,
    scratch_dir: &Path,
) -> Result<ComposedImage, CaptureError> {
    let base = image::open(source).map_err(|err| CaptureError::SourceReadFailed {
        path: source.to_path_buf(),
        message: err.to_string(),
    })?;
    compose_and_write(&base, frame, scratch_dir)
}

pub fn compose_with_picker<P: ImagePicker + ?Sized>(
    picker: &P,
    frame: Option<&Frame>,
    scratch_dir: &Path,
) -> Result<Option<ComposedImage>, CaptureError> {
    let Some(source) = picker.pick_image()? else {
        tracing::debug!("image picker cancelled");
        return Ok(None);
    };
    compose_from_file(&source, frame, scratch_dir).map(Some)
}

pub fn compose_and_write(
    base: &DynamicImage,
    frame: Option<&Frame>,
    scratch_dir: &Path,
) -> Result<ComposedImage, CaptureError> {
    let composed = compose(base, frame)?;
    let bytes = encode(&composed, ImageFormat::Png)?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| CaptureError::EncodingFailed {
            message: format!("system time before unix epoch: {err}"),
        })?;
    let capture_id = format!("{}", now.as_nanos());
    let path = scratch_path(scratch_dir, &capture_id, ImageFormat::Png);

    if let Err(err) = write_scratch_file(scratch_dir, &path, &bytes) {
        cleanup_scratch_file(&path, "scratch write failure");
        return Err(err);
    }

    tracing::info!(
        capture_id = %capture_id,
        path = %path.display(),
        frame_id = frame.map(Frame::id),
        "composed image written"
    );
    Ok(ComposedImage {
        capture_id,
        path,
        width: composed.width(),
        height: composed.height(),
        format: ImageFormat::Png,
        created_at: now.as_millis() as u64,
    })
}

/// Overlays the frame if one is selected; without a frame the base image is
/// returned untouched.
pub fn compose(base: &DynamicImage, frame: Option<&Frame>) -> Result<DynamicImage, CaptureError> {
    if base.width() == 0 || base.height() == 0 {
        return Err(CaptureError::CompositingFailed {
            message: "snapshot has no pixels".to_string(),
        });
    }
    let Some(frame) = frame else {
        return Ok(base.clone());
    };

    let overlay = frame
        .load()
        .map_err(|err| CaptureError::FrameLoadFailed {
            message: err.to_string(),
        })?;
    let merged =
        compose::overlay_frame(base, &overlay).ok_or_else(|| CaptureError::CompositingFailed {
            message: format!(
                "frame {} ({}x{}) cannot cover {}x{}",
                frame.id(),
                overlay.width(),
                overlay.height(),
                base.width(),
                base.height()
            ),
        })?;
    Ok(DynamicImage::ImageRgba8(merged))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Cursor::new(Vec::new());
    let result = match format {
        // jpeg has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut bytes, format.encoder_format()),
        ImageFormat::Png => image.write_to(&mut bytes, format.encoder_format()),
    };
    result.map_err(|err| CaptureError::EncodingFailed {
        message: err.to_string(),
    })?;
    Ok(bytes.into_inner())
}

pub fn scratch_path(scratch_dir: &Path, capture_id: &str, format: ImageFormat) -> PathBuf {
    scratch_dir.join(format!(
        "{SCRATCH_PREFIX}{capture_id}.{}",
        format.extension()
    ))
}

fn write_scratch_file(scratch_dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), CaptureError> {
    std::fs::create_dir_all(scratch_dir).map_err(|err| CaptureError::WriteFailed {
        path: scratch_dir.to_path_buf(),
        source: err,
    })?;
    std::fs::write(path, bytes).map_err(|err| CaptureError::WriteFailed {
        path: path.to_path_buf(),
        source: err,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScratchCleanupOutcome {
    Removed,
    NotFound,
    Failed,
}

pub(crate) fn cleanup_scratch_file(path: &Path, stage: &str) -> ScratchCleanupOutcome {
    cleanup_scratch_file_with(path, stage, |path| std::fs::remove_file(path))
}

fn cleanup_scratch_file_with<F>(path: &Path, stage: &str, remove_file: F) -> ScratchCleanupOutcome
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    match remove_file(path) {
        Ok(()) => ScratchCleanupOutcome::Removed,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                stage = stage,
                path = %path.display(),
                "scratch file already missing during cleanup"
            );
            ScratchCleanupOutcome::NotFound
        }
        Err(err) => {
            tracing::warn!(
                stage = stage,
                path = %path.display(),
                ?err,
                "failed to cleanup scratch file"
            );
            ScratchCleanupOutcome::Failed
        }
    }
}
