//! One capture screen: owns the camera lease, the selected frame and the
//! current composed image, and runs capture/save/share on worker threads
//! with at most one of each in flight.

mod actions;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;

pub use actions::{
    execute_session_action, notice_for, ActionError, ImageAction, SessionAction, SessionEvent,
};
pub use worker::{
    spawn_worker_action, spawn_worker_action_with_abandon, PendingAction, WorkerPoll,
};

use crate::capture::{self, CameraDevice, CameraLease, CaptureError, ComposedImage, SharedCamera};
use crate::frame::{Frame, FrameCatalog};
use crate::notification::Notifier;
use crate::permission::{PermissionGateway, PermissionKind, PermissionSystem};
use crate::share::{ShareService, ShareSurface};
use crate::state::{CaptureEvent, CaptureState, StateMachine};
use crate::storage::{MediaIndex, StorageService};

pub type SessionUpdate = Result<SessionEvent, ActionError>;

/// Services shared by every session of the process.
pub struct SessionServices<P: PermissionSystem, M: MediaIndex, S: ShareSurface> {
    pub catalog: Arc<FrameCatalog>,
    pub permissions: Arc<PermissionGateway<P>>,
    pub storage: Arc<StorageService<P, M>>,
    pub share: Arc<ShareService<S>>,
    pub share_title: String,
}

impl<P: PermissionSystem, M: MediaIndex, S: ShareSurface> Clone for SessionServices<P, M, S> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            permissions: Arc::clone(&self.permissions),
            storage: Arc::clone(&self.storage),
            share: Arc::clone(&self.share),
            share_title: self.share_title.clone(),
        }
    }
}

enum PendingCapture {
    Snapshot(PendingAction<Result<DynamicImage, CaptureError>>),
    Compose(PendingAction<Result<ComposedImage, CaptureError>>),
}

pub struct CaptureSession<D, P, M, S>
where
    D: CameraDevice + 'static,
    P: PermissionSystem + Send + Sync + 'static,
    M: MediaIndex + 'static,
    S: ShareSurface + 'static,
{
    services: SessionServices<P, M, S>,
    lease: CameraLease<D>,
    selected_frame: Option<Frame>,
    machine: StateMachine,
    current: Option<ComposedImage>,
    pending_capture: Option<PendingCapture>,
    pending_save: Option<PendingAction<SessionUpdate>>,
    pending_share: Option<PendingAction<SessionUpdate>>,
}

impl<D, P, M, S> CaptureSession<D, P, M, S>
where
    D: CameraDevice + 'static,
    P: PermissionSystem + Send + Sync + 'static,
    M: MediaIndex + 'static,
    S: ShareSurface + 'static,
{
    /// Claims the camera for this session; fails while another session
    /// holds it.
    pub fn open(
        camera: &SharedCamera<D>,
        services: SessionServices<P, M, S>,
    ) -> Result<Self, ActionError> {
        let lease = camera
            .acquire()
            .map_err(|source| ActionError::CaptureError { source })?;
        let selected_frame = services.catalog.first().cloned();
        tracing::info!(
            frames = services.catalog.len(),
            selected = ?selected_frame.as_ref().map(Frame::id),
            "capture session opened"
        );
        Ok(Self {
            services,
            lease,
            selected_frame,
            machine: StateMachine::new(),
            current: None,
            pending_capture: None,
            pending_save: None,
            pending_share: None,
        })
    }

    pub fn state(&self) -> CaptureState {
        self.machine.state()
    }

    pub fn frames(&self) -> &[Frame] {
        self.services.catalog.frames()
    }

    pub fn selected_frame(&self) -> Option<&Frame> {
        self.selected_frame.as_ref()
    }

    pub fn current_image(&self) -> Option<&ComposedImage> {
        self.current.as_ref()
    }

    pub fn is_busy(&self, action: SessionAction) -> bool {
        match action {
            SessionAction::Capture => self.pending_capture.is_some(),
            SessionAction::Save => self.pending_save.is_some(),
            SessionAction::Share => self.pending_share.is_some(),
            SessionAction::Discard => self.has_pending_work(),
        }
    }

    /// `None` captures without a frame. Does not touch an already composed
    /// image.
    pub fn select_frame(&mut self, id: Option<u32>) -> Result<(), ActionError> {
        self.selected_frame = match id {
            Some(id) => Some(
                self.services
                    .catalog
                    .get(id)
                    .cloned()
                    .ok_or(ActionError::UnknownFrame { id })?,
            ),
            None => None,
        };
        tracing::debug!(frame_id = ?id, "frame selected");
        Ok(())
    }

    pub fn open_settings(&self) {
        self.services.permissions.open_settings();
    }

    pub fn begin_capture(&mut self) -> Result<(), ActionError> {
        if self.pending_capture.is_some() {
            return Err(ActionError::Busy {
                action: SessionAction::Capture,
            });
        }
        if self.pending_save.is_some() || self.pending_share.is_some() {
            return Err(ActionError::Busy {
                action: SessionAction::Capture,
            });
        }
        if !self
            .services
            .permissions
            .ensure(PermissionKind::Camera)
            .is_granted()
        {
            return Err(ActionError::PermissionDenied {
                kind: PermissionKind::Camera,
            });
        }

        let in_flight = self
            .lease
            .begin_capture()
            .map_err(|source| ActionError::CaptureError { source })?;
        if self.state() == CaptureState::Failed {
            self.machine.transition(CaptureEvent::Reset)?;
        }
        self.machine.transition(CaptureEvent::Begin)?;

        // the worker owns the in-flight marker so the device stays busy even
        // if this session goes away mid-snapshot
        let device = self.lease.device_handle();
        let job = spawn_worker_action(move || {
            let _in_flight = in_flight;
            capture::take_snapshot(device.as_ref())
        });
        self.pending_capture = Some(PendingCapture::Snapshot(job));
        Ok(())
    }

    /// Prompts for Storage permission when needed before any work starts.
    pub fn begin_save(&mut self) -> Result<(), ActionError> {
        let image = self.image_for(ImageAction::Save, self.pending_save.is_some())?;
        if !self
            .services
            .permissions
            .ensure(PermissionKind::Storage)
            .is_granted()
        {
            return Err(ActionError::PermissionDenied {
                kind: PermissionKind::Storage,
            });
        }
        self.pending_save = Some(self.spawn_image_action(ImageAction::Save, image));
        Ok(())
    }

    pub fn begin_share(&mut self) -> Result<(), ActionError> {
        let image = self.image_for(ImageAction::Share, self.pending_share.is_some())?;
        self.pending_share = Some(self.spawn_image_action(ImageAction::Share, image));
        Ok(())
    }

    /// Dismisses the composed image and removes its scratch file.
    pub fn discard(&mut self) -> SessionUpdate {
        if self.has_pending_work() {
            return Err(ActionError::Busy {
                action: SessionAction::Discard,
            });
        }
        let image = self.current.take().ok_or(ActionError::NoImage {
            action: SessionAction::Discard,
        })?;
        self.machine.transition(CaptureEvent::Reset)?;
        execute_session_action(
            &image,
            ImageAction::Discard,
            &self.services.storage,
            &self.services.share,
            &self.services.share_title,
        )
    }

    /// Collects finished work without blocking.
    pub fn poll(&mut self) -> Vec<SessionUpdate> {
        self.drive(false)
    }

    /// Blocks until no capture, save or share is outstanding.
    pub fn wait_idle(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while self.has_pending_work() {
            updates.extend(self.drive(true));
        }
        updates
    }

    /// Polls and forwards every outcome that deserves a notice.
    pub fn poll_and_notify<N: Notifier + ?Sized>(&mut self, notifier: &N) -> Vec<SessionUpdate> {
        let updates = self.poll();
        for update in &updates {
            if let Some(notice) = notice_for(update) {
                notifier.notify(&notice);
            }
        }
        updates
    }

    fn has_pending_work(&self) -> bool {
        self.pending_capture.is_some() || self.pending_save.is_some() || self.pending_share.is_some()
    }

    fn image_for(&self, action: ImageAction, busy: bool) -> Result<ComposedImage, ActionError> {
        if busy || self.pending_capture.is_some() {
            return Err(ActionError::Busy {
                action: action.into(),
            });
        }
        self.current.clone().ok_or(ActionError::NoImage {
            action: action.into(),
        })
    }

    fn spawn_image_action(
        &self,
        action: ImageAction,
        image: ComposedImage,
    ) -> PendingAction<SessionUpdate> {
        let storage = Arc::clone(&self.services.storage);
        let share = Arc::clone(&self.services.share);
        let share_title = self.services.share_title.clone();
        spawn_worker_action(move || {
            execute_session_action(&image, action, &storage, &share, &share_title)
        })
    }

    fn drive(&mut self, block: bool) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        if let Some(update) = self.drive_capture(block) {
            updates.push(update);
        }
        if let Some(update) = take_finished(&mut self.pending_save, SessionAction::Save, block) {
            updates.push(update);
        }
        if let Some(update) = take_finished(&mut self.pending_share, SessionAction::Share, block) {
            updates.push(update);
        }
        updates
    }

    fn drive_capture(&mut self, block: bool) -> Option<SessionUpdate> {
        let pending = self.pending_capture.take()?;
        match pending {
            PendingCapture::Snapshot(job) => match poll_job(&job, block) {
                WorkerPoll::Pending => {
                    self.pending_capture = Some(PendingCapture::Snapshot(job));
                    None
                }
                WorkerPoll::Ready(Ok(snapshot)) => {
                    if let Err(err) = self.machine.transition(CaptureEvent::SnapshotAcquired) {
                        return Some(Err(err.into()));
                    }
                    let frame = self.selected_frame.clone();
                    let scratch_dir: PathBuf = self.services.storage.scratch_dir().to_path_buf();
                    // a prune at the next startup covers a session dropped
                    // between the send and the receive
                    let job = spawn_worker_action_with_abandon(
                        move || capture::compose_and_write(&snapshot, frame.as_ref(), &scratch_dir),
                        |result| {
                            if let Ok(image) = result {
                                capture::cleanup_scratch_file(&image.path, "abandoned capture");
                            }
                        },
                    );
                    self.pending_capture = Some(PendingCapture::Compose(job));
                    None
                }
                WorkerPoll::Ready(Err(source)) => {
                    Some(self.fail_capture(ActionError::CaptureError { source }))
                }
                WorkerPoll::Lost => Some(self.fail_capture(ActionError::WorkerLost {
                    action: SessionAction::Capture,
                })),
            },
            PendingCapture::Compose(job) => match poll_job(&job, block) {
                WorkerPoll::Pending => {
                    self.pending_capture = Some(PendingCapture::Compose(job));
                    None
                }
                WorkerPoll::Ready(Ok(image)) => {
                    if let Err(err) = self.machine.transition(CaptureEvent::Composed) {
                        capture::cleanup_scratch_file(&image.path, "rejected capture");
                        return Some(Err(err.into()));
                    }
                    self.drop_current_image();
                    self.current = Some(image.clone());
                    Some(Ok(SessionEvent::Captured(image)))
                }
                WorkerPoll::Ready(Err(source)) => {
                    Some(self.fail_capture(ActionError::CaptureError { source }))
                }
                WorkerPoll::Lost => Some(self.fail_capture(ActionError::WorkerLost {
                    action: SessionAction::Capture,
                })),
            },
        }
    }

    fn fail_capture(&mut self, err: ActionError) -> SessionUpdate {
        tracing::warn!(%err, state = ?self.state(), "capture failed");
        if let Err(state_err) = self.machine.transition(CaptureEvent::Fail) {
            return Err(state_err.into());
        }
        Err(err)
    }

    fn drop_current_image(&mut self) {
        if let Some(image) = self.current.take() {
            if let Err(err) = self.services.storage.discard(&image) {
                tracing::warn!(capture_id = %image.capture_id, %err, "failed to discard previous image");
            }
        }
    }
}

fn poll_job<T>(job: &PendingAction<T>, block: bool) -> WorkerPoll<T> {
    if block {
        job.wait()
    } else {
        job.try_take()
    }
}

fn take_finished(
    slot: &mut Option<PendingAction<SessionUpdate>>,
    action: SessionAction,
    block: bool,
) -> Option<SessionUpdate> {
    let job = slot.take()?;
    match poll_job(&job, block) {
        WorkerPoll::Pending => {
            *slot = Some(job);
            None
        }
        WorkerPoll::Ready(update) => Some(update),
        WorkerPoll::Lost => Some(Err(ActionError::WorkerLost { action })),
    }
}
