use std::path::Path;

use crate::capture::{
    self, CameraDevice, CaptureError, CommandCamera, ComposedImage, SharedCamera,
};
use crate::config::{load_app_config, LoadedConfig};
use crate::error::{AppError, AppResult};
use crate::notification::Notifier;
use crate::permission::{NoRuntimePermissions, PermissionSystem};
use crate::session::{
    notice_for, ActionError, CaptureSession, SessionAction, SessionEvent, SessionServices,
    SessionUpdate,
};
use crate::share::{ShareSurface, WlCopyShareSurface};
use crate::storage::{MediaIndex, PassiveMediaIndex, SaveReport};

mod bootstrap;

pub use self::bootstrap::build_services;

pub type DesktopServices =
    SessionServices<NoRuntimePermissions, PassiveMediaIndex, WlCopyShareSurface>;
pub type DesktopSession =
    CaptureSession<CommandCamera, NoRuntimePermissions, PassiveMediaIndex, WlCopyShareSurface>;

pub struct App {
    services: DesktopServices,
    camera: Option<SharedCamera<CommandCamera>>,
}

impl App {
    pub fn new() -> AppResult<Self> {
        Self::from_config(load_app_config())
    }

    pub fn from_config(loaded: LoadedConfig) -> AppResult<Self> {
        let services = build_services(
            &loaded,
            NoRuntimePermissions,
            PassiveMediaIndex,
            WlCopyShareSurface,
        )?;
        let camera = loaded
            .config
            .camera_command
            .as_deref()
            .and_then(|command| CommandCamera::new(command, services.storage.scratch_dir()));
        if camera.is_none() {
            tracing::warn!("no camera_command configured; camera capture disabled");
        }
        Ok(Self {
            services,
            camera: camera.map(SharedCamera::new),
        })
    }

    pub fn services(&self) -> &DesktopServices {
        &self.services
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    pub fn open_session(&self) -> AppResult<DesktopSession> {
        let camera = self
            .camera
            .as_ref()
            .ok_or_else(|| CaptureError::DeviceUnavailable {
                message: "no camera_command configured".to_string(),
            })?;
        Ok(CaptureSession::open(camera, self.services.clone())?)
    }

    /// Composes an existing picture with a catalog frame, bypassing the camera.
    pub fn import_image(&self, source: &Path, frame_id: Option<u32>) -> AppResult<ComposedImage> {
        let frame = match frame_id {
            Some(id) => Some(
                self.services
                    .catalog
                    .get(id)
                    .ok_or(ActionError::UnknownFrame { id })?,
            ),
            None => None,
        };
        let image =
            capture::compose_from_file(source, frame, self.services.storage.scratch_dir())?;
        tracing::info!(
            capture_id = %image.capture_id,
            source = %source.display(),
            "imported gallery image"
        );
        Ok(image)
    }
}

/// Takes one picture with the selected frame and saves it, forwarding every
/// outcome worth a notice.
pub fn capture_and_save<D, P, M, S, N>(
    session: &mut CaptureSession<D, P, M, S>,
    notifier: &N,
) -> AppResult<SaveReport>
where
    D: CameraDevice + 'static,
    P: PermissionSystem + Send + Sync + 'static,
    M: MediaIndex + 'static,
    S: ShareSurface + 'static,
    N: Notifier + ?Sized,
{
    if let Err(err) = session.begin_capture() {
        settle(notifier, Err(err))?;
    }
    for update in session.wait_idle() {
        settle(notifier, update)?;
    }

    if let Err(err) = session.begin_save() {
        settle(notifier, Err(err))?;
    }
    for update in session.wait_idle() {
        if let SessionEvent::Saved { report, .. } = settle(notifier, update)? {
            return Ok(report);
        }
    }
    Err(ActionError::WorkerLost {
        action: SessionAction::Save,
    }
    .into())
}

fn settle<N: Notifier + ?Sized>(notifier: &N, update: SessionUpdate) -> AppResult<SessionEvent> {
    if let Some(notice) = notice_for(&update) {
        notifier.notify(&notice);
    }
    update.map_err(AppError::from)
}
