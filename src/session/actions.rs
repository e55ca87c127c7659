//! Executes the save/share/discard actions on a composed image and maps
//! their outcomes to user notices.

use thiserror::Error;

use crate::capture::{CaptureError, ComposedImage};
use crate::notification::{NoticeAction, UserNotice};
use crate::permission::{PermissionKind, PermissionSystem};
use crate::share::{ShareError, ShareOutcome, ShareService, ShareSurface};
use crate::state::StateError;
use crate::storage::{MediaIndex, SaveReport, SaveWarning, StorageError, StorageService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Capture,
    Save,
    Share,
    Discard,
}

impl SessionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Save => "save",
            Self::Share => "share",
            Self::Discard => "discard",
        }
    }
}

/// Actions that operate on an already composed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAction {
    Save,
    Share,
    Discard,
}

impl From<ImageAction> for SessionAction {
    fn from(action: ImageAction) -> Self {
        match action {
            ImageAction::Save => Self::Save,
            ImageAction::Share => Self::Share,
            ImageAction::Discard => Self::Discard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Captured(ComposedImage),
    Saved {
        capture_id: String,
        report: SaveReport,
    },
    Shared {
        capture_id: String,
        outcome: ShareOutcome,
    },
    Discarded {
        capture_id: String,
    },
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{} already in progress", action.as_str())]
    Busy { action: SessionAction },

    #[error("nothing to {}: no composed image", action.as_str())]
    NoImage { action: SessionAction },

    #[error("unknown frame id {id}")]
    UnknownFrame { id: u32 },

    #[error("{kind:?} permission denied")]
    PermissionDenied { kind: PermissionKind },

    #[error("capture failed: {source}")]
    CaptureError {
        #[source]
        source: CaptureError,
    },

    #[error("storage error while {operation} {capture_id}: {source}")]
    StorageError {
        operation: &'static str,
        capture_id: String,
        #[source]
        source: StorageError,
    },

    #[error("share error while {operation} {capture_id}: {source}")]
    ShareError {
        operation: &'static str,
        capture_id: String,
        #[source]
        source: ShareError,
    },

    #[error("{} worker stopped before reporting a result", action.as_str())]
    WorkerLost { action: SessionAction },

    #[error(transparent)]
    State(#[from] StateError),
}

pub fn execute_session_action<P, M, S>(
    image: &ComposedImage,
    action: ImageAction,
    storage: &StorageService<P, M>,
    share: &ShareService<S>,
    share_title: &str,
) -> Result<SessionEvent, ActionError>
where
    P: PermissionSystem,
    M: MediaIndex,
    S: ShareSurface,
{
    let capture_id = image.capture_id.clone();
    match action {
        ImageAction::Save => {
            let report = storage.save(image).map_err(|err| match err {
                StorageError::PermissionDenied => ActionError::PermissionDenied {
                    kind: PermissionKind::Storage,
                },
                err => ActionError::StorageError {
                    operation: "save",
                    capture_id: capture_id.clone(),
                    source: err,
                },
            })?;
            Ok(SessionEvent::Saved { capture_id, report })
        }
        ImageAction::Share => {
            let outcome =
                share
                    .share(image, share_title)
                    .map_err(|err| ActionError::ShareError {
                        operation: "share",
                        capture_id: capture_id.clone(),
                        source: err,
                    })?;
            Ok(SessionEvent::Shared {
                capture_id,
                outcome,
            })
        }
        ImageAction::Discard => {
            storage
                .discard(image)
                .map_err(|err| ActionError::StorageError {
                    operation: "discard",
                    capture_id: capture_id.clone(),
                    source: err,
                })?;
            Ok(SessionEvent::Discarded { capture_id })
        }
    }
}

/// What the user should see after an action. `None` when the outcome needs
/// no message, e.g. a dismissed share sheet.
pub fn notice_for(update: &Result<SessionEvent, ActionError>) -> Option<UserNotice> {
    match update {
        Ok(SessionEvent::Captured(_)) | Ok(SessionEvent::Discarded { .. }) => None,
        Ok(SessionEvent::Saved { report, .. }) => {
            let notice = match report.warnings.first() {
                Some(SaveWarning::MediaRegistrationFailed { .. }) => UserNotice::warning(
                    "Photo saved",
                    format!(
                        "Saved to {}. It may take a moment to appear in your gallery.",
                        report.destination.path().display()
                    ),
                ),
                None => UserNotice::info(
                    "Success",
                    format!("Photo saved to {}", report.destination.path().display()),
                ),
            };
            Some(notice)
        }
        Ok(SessionEvent::Shared { outcome, .. }) => match outcome {
            ShareOutcome::Shared | ShareOutcome::Cancelled => None,
        },
        Err(ActionError::PermissionDenied { kind }) => Some(permission_notice(*kind)),
        Err(ActionError::Busy { .. }) => None,
        Err(ActionError::CaptureError { source }) => Some(capture_notice(source)),
        Err(ActionError::StorageError { source, .. }) => Some(UserNotice::error(
            "Error",
            format!("Failed to save photo: {source}"),
        )),
        Err(ActionError::ShareError { source, .. }) => Some(UserNotice::error(
            "Error",
            format!("Failed to share photo: {source}"),
        )),
        Err(err) => Some(UserNotice::error("Error", err.to_string())),
    }
}

fn permission_notice(kind: PermissionKind) -> UserNotice {
    let (title, body) = match kind {
        PermissionKind::Camera => (
            "Camera Permission Required",
            "Camera permission is required to take photos. Please enable it in Settings.",
        ),
        PermissionKind::Storage => (
            "Permission Denied",
            "Storage permission is required to save photos.",
        ),
    };
    UserNotice::error(title, body).with_action(NoticeAction::OpenSettings)
}

fn capture_notice(err: &CaptureError) -> UserNotice {
    match err {
        CaptureError::DeviceUnavailable { .. } | CaptureError::DeviceBusy { .. } => {
            UserNotice::error("Error", "Camera not ready. Try again in a moment.")
        }
        err => UserNotice::error("Error", format!("Failed to capture image: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NoticeLevel;
    use crate::storage::SaveDestination;
    use std::path::PathBuf;

    fn report(warnings: Vec<SaveWarning>) -> SaveReport {
        SaveReport {
            destination: SaveDestination {
                directory: PathBuf::from("/home/test/Pictures/FrameCam"),
                file_name: "framecam_1.png".to_string(),
            },
            warnings,
        }
    }

    #[test]
    fn permission_denied_offers_settings() {
        let notice = notice_for(&Err(ActionError::PermissionDenied {
            kind: PermissionKind::Storage,
        }))
        .expect("denial should be surfaced");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.action, Some(NoticeAction::OpenSettings));
    }

    #[test]
    fn media_registration_failure_is_a_warning_notice() {
        let notice = notice_for(&Ok(SessionEvent::Saved {
            capture_id: "1".to_string(),
            report: report(vec![SaveWarning::MediaRegistrationFailed {
                message: "x".to_string(),
            }]),
        }))
        .expect("save should be surfaced");
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.body.contains("framecam_1.png"));
    }

    #[test]
    fn successful_save_is_an_info_notice() {
        let notice = notice_for(&Ok(SessionEvent::Saved {
            capture_id: "1".to_string(),
            report: report(Vec::new()),
        }))
        .expect("save should be surfaced");
        assert_eq!(notice.level, NoticeLevel::Info);
        assert_eq!(notice.action, None);
    }

    #[test]
    fn cancelled_share_and_busy_produce_no_notice() {
        assert!(notice_for(&Ok(SessionEvent::Shared {
            capture_id: "1".to_string(),
            outcome: ShareOutcome::Cancelled,
        }))
        .is_none());
        assert!(notice_for(&Err(ActionError::Busy {
            action: SessionAction::Save
        }))
        .is_none());
    }

    #[test]
    fn device_errors_get_a_retry_hint() {
        let notice = notice_for(&Err(ActionError::CaptureError {
            source: CaptureError::DeviceUnavailable {
                message: "gone".to_string(),
            },
        }))
        .unwrap();
        assert!(notice.body.contains("Camera not ready"));
    }
}
