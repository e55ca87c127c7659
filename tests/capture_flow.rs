use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use framecam::capture::{self, CameraDevice, CaptureError, ImageFormat, SharedCamera};
use framecam::frame::{Frame, FrameCatalog, FrameSource};
use framecam::permission::{NoRuntimePermissions, PermissionGateway, PermissionStrategy};
use framecam::session::{CaptureSession, SessionEvent, SessionServices};
use framecam::share::{ShareOutcome, ShareResult, ShareService, ShareSurface};
use framecam::state::CaptureState;
use framecam::storage::{MediaIndex, MediaIndexError, StorageLayout, StorageService};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

struct SyntheticCamera;

impl CameraDevice for SyntheticCamera {
    fn is_active(&self) -> bool {
        true
    }

    fn take_still_image(&self) -> Result<DynamicImage, CaptureError> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            1080,
            1920,
            Rgb([40, 80, 120]),
        )))
    }
}

#[derive(Clone, Default)]
struct RecordingMediaIndex {
    registered: Arc<Mutex<Vec<PathBuf>>>,
}

impl MediaIndex for RecordingMediaIndex {
    fn register_media(&self, path: &Path) -> Result<(), MediaIndexError> {
        self.registered.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

struct DismissedShareSheet;

impl ShareSurface for DismissedShareSheet {
    fn open_share_sheet(&self, _: &str, _: &str, _: &str) -> ShareResult<ShareOutcome> {
        Ok(ShareOutcome::Cancelled)
    }
}

fn encoded_frame(width: u32, height: u32) -> FrameSource {
    let frame = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([255, 255, 255, 96]),
    ));
    FrameSource::Encoded(Arc::from(capture::encode(&frame, ImageFormat::Png).unwrap()))
}

fn unique_root() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("framecam-flow-{nanos}"))
}

#[test]
fn framed_capture_is_saved_and_registered_once() {
    let root = unique_root();
    let pictures_dir = root.join("Pictures").join("FrameCam");
    let media_index = RecordingMediaIndex::default();
    let registered = Arc::clone(&media_index.registered);

    let catalog = FrameCatalog::new(vec![
        Frame::new(1, "Frame 1", encoded_frame(300, 300)),
        Frame::new(2, "Frame 2", encoded_frame(720, 1280)),
    ])
    .unwrap()
    .into_shared();
    let permissions = Arc::new(PermissionGateway::new(
        PermissionStrategy::resolve(None),
        NoRuntimePermissions,
    ));
    let services = SessionServices {
        catalog,
        permissions: Arc::clone(&permissions),
        storage: Arc::new(StorageService::new(
            StorageLayout::new(root.join("scratch"), pictures_dir.clone()),
            permissions,
            media_index,
        )),
        share: Arc::new(ShareService::new(DismissedShareSheet)),
        share_title: "Share Photo".to_string(),
    };

    let mut session = CaptureSession::open(&SharedCamera::new(SyntheticCamera), services).unwrap();
    session.select_frame(Some(2)).unwrap();
    session.begin_capture().unwrap();
    let updates = session.wait_idle();
    let [Ok(SessionEvent::Captured(image))] = updates.as_slice() else {
        panic!("expected one captured event, got {updates:?}");
    };
    assert_eq!((image.width, image.height), (1080, 1920));
    assert_eq!(image.format, ImageFormat::Png);
    assert!(std::fs::metadata(&image.path).unwrap().len() > 0);
    let decoded = image::open(&image.path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
    assert_eq!(session.state(), CaptureState::Ready);

    session.begin_save().unwrap();
    let updates = session.wait_idle();
    let [Ok(SessionEvent::Saved { report, .. })] = updates.as_slice() else {
        panic!("expected one saved event, got {updates:?}");
    };
    assert!(report.warnings.is_empty());
    let saved = report.destination.path();
    assert_eq!(saved.parent(), Some(pictures_dir.as_path()));
    let name = report.destination.file_name.as_str();
    let millis = name
        .strip_prefix("framecam_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .expect("file name should be framecam_<millis>.png");
    assert!(!millis.is_empty() && millis.bytes().all(|b| b.is_ascii_digit()));
    assert!(saved.exists());

    assert_eq!(registered.lock().unwrap().as_slice(), &[saved]);

    let _ = std::fs::remove_dir_all(root);
}
