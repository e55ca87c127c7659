use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use image::DynamicImage;

use super::CaptureError;

/// Source of still images. Implementations must be shareable with worker
/// threads.
pub trait CameraDevice: Send + Sync {
    fn is_active(&self) -> bool;
    fn take_still_image(&self) -> Result<DynamicImage, CaptureError>;
}

/// Camera driven by an external still-capture command, e.g.
/// `fswebcam --no-banner`. The output path is appended as last argument.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    scratch_dir: PathBuf,
    sequence: Arc<AtomicU64>,
}

impl CommandCamera {
    pub fn new(command_line: &str, scratch_dir: impl Into<PathBuf>) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            scratch_dir: scratch_dir.into(),
            sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    fn snapshot_path(&self) -> PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir
            .join(format!("snapshot_{}_{sequence}.jpg", std::process::id()))
    }

    fn run(&self, output: &Path) -> Result<(), CaptureError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(output)
            .status()
            .map_err(|err| CaptureError::DeviceUnavailable {
                message: format!("failed to spawn {}: {err}", self.program),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(CaptureError::DeviceUnavailable {
                message: format!("{} exited with status: {status}", self.program),
            })
        }
    }
}

impl CameraDevice for CommandCamera {
    // each snapshot spawns a fresh process; there is no session to go stale
    fn is_active(&self) -> bool {
        true
    }

    fn take_still_image(&self) -> Result<DynamicImage, CaptureError> {
        std::fs::create_dir_all(&self.scratch_dir).map_err(|err| CaptureError::WriteFailed {
            path: self.scratch_dir.clone(),
            source: err,
        })?;
        let output = self.snapshot_path();
        let result = self.run(&output).and_then(|()| {
            image::open(&output).map_err(|err| CaptureError::DeviceUnavailable {
                message: format!("camera produced unreadable image: {err}"),
            })
        });
        super::cleanup_scratch_file(&output, "camera snapshot");
        result
    }
}

/// Camera handle that can be held by one session at a time. The in-flight
/// marker outlives leases: a capture abandoned by a dropped lease still
/// blocks the device until its worker returns.
pub struct SharedCamera<D> {
    device: Arc<D>,
    claimed: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl<D> Clone for SharedCamera<D> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            claimed: Arc::clone(&self.claimed),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<D: CameraDevice> SharedCamera<D> {
    pub fn new(device: D) -> Self {
        Self {
            device: Arc::new(device),
            claimed: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn acquire(&self) -> Result<CameraLease<D>, CaptureError> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureError::DeviceBusy {
                message: "camera is held by another session".to_string(),
            });
        }
        // only a lease holder sets the marker, so it can only clear from here on
        if self.in_flight.load(Ordering::Acquire) {
            self.claimed.store(false, Ordering::Release);
            return Err(CaptureError::DeviceBusy {
                message: "previous capture is still running".to_string(),
            });
        }
        tracing::debug!("camera lease acquired");
        Ok(CameraLease {
            device: Arc::clone(&self.device),
            claimed: Arc::clone(&self.claimed),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    pub fn is_capturing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Exclusive ownership of the camera. Released on drop.
pub struct CameraLease<D> {
    device: Arc<D>,
    claimed: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl<D: CameraDevice> CameraLease<D> {
    pub fn device(&self) -> &D {
        &self.device
    }

    pub(crate) fn device_handle(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }

    /// Marks a capture as in flight; fails if one already is.
    pub fn begin_capture(&self) -> Result<InFlightCapture, CaptureError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureError::DeviceBusy {
                message: "a capture is already in flight".to_string(),
            });
        }
        Ok(InFlightCapture {
            flag: Arc::clone(&self.in_flight),
        })
    }
}

impl<D> Drop for CameraLease<D> {
    fn drop(&mut self) {
        self.claimed.store(false, Ordering::Release);
        tracing::debug!("camera lease released");
    }
}

/// Clears the in-flight marker when dropped.
#[derive(Debug)]
pub struct InFlightCapture {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightCapture {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCamera;

    impl CameraDevice for StaticCamera {
        fn is_active(&self) -> bool {
            true
        }

        fn take_still_image(&self) -> Result<DynamicImage, CaptureError> {
            Ok(DynamicImage::new_rgba8(2, 2))
        }
    }

    #[test]
    fn second_acquire_fails_until_lease_dropped() {
        let camera = SharedCamera::new(StaticCamera);
        let lease = camera.acquire().expect("first acquire should succeed");
        assert!(camera.is_claimed());

        let other = camera.clone();
        assert!(matches!(
            other.acquire(),
            Err(CaptureError::DeviceBusy { .. })
        ));

        drop(lease);
        assert!(!camera.is_claimed());
        assert!(other.acquire().is_ok());
    }

    #[test]
    fn lease_allows_one_capture_in_flight() {
        let camera = SharedCamera::new(StaticCamera);
        let lease = camera.acquire().expect("acquire should succeed");

        let guard = lease.begin_capture().expect("first capture should start");
        assert!(matches!(
            lease.begin_capture(),
            Err(CaptureError::DeviceBusy { .. })
        ));
        drop(guard);
        assert!(lease.begin_capture().is_ok());
    }

    #[test]
    fn abandoned_capture_keeps_the_device_busy() {
        let camera = SharedCamera::new(StaticCamera);
        let lease = camera.acquire().expect("acquire should succeed");
        let guard = lease.begin_capture().expect("capture should start");

        drop(lease);
        assert!(!camera.is_claimed());
        assert!(camera.is_capturing());
        assert!(matches!(
            camera.acquire(),
            Err(CaptureError::DeviceBusy { .. })
        ));
        assert!(!camera.is_claimed(), "refused acquire must not keep the claim");

        drop(guard);
        let lease = camera.acquire().expect("device should be free again");
        assert!(lease.begin_capture().is_ok());
    }

    #[test]
    fn command_camera_rejects_empty_command_line() {
        assert!(CommandCamera::new("   ", std::env::temp_dir()).is_none());
    }

    #[test]
    fn command_camera_maps_spawn_failure_to_device_unavailable() {
        let camera = CommandCamera::new("framecam-no-such-camera-binary", std::env::temp_dir())
            .expect("command line should parse");
        let err = camera
            .take_still_image()
            .expect_err("missing binary should fail");
        assert!(matches!(err, CaptureError::DeviceUnavailable { .. }));
    }
}
