use thiserror::Error;

const ANDROID_CAMERA: &str = "android.permission.CAMERA";
const ANDROID_WRITE_EXTERNAL_STORAGE: &str = "android.permission.WRITE_EXTERNAL_STORAGE";
const ANDROID_READ_EXTERNAL_STORAGE: &str = "android.permission.READ_EXTERNAL_STORAGE";
const ANDROID_READ_MEDIA_IMAGES: &str = "android.permission.READ_MEDIA_IMAGES";

/// First API level where storage access moved to scoped media grants.
pub const SCOPED_MEDIA_API_LEVEL: u32 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    Camera,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

/// Answer reported by the OS for a single permission identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsPermissionStatus {
    Granted,
    Denied,
    NeverAskAgain,
    Undetermined,
}

#[derive(Debug, Error)]
pub enum PermissionSystemError {
    #[error("permission query failed for {identifier}: {message}")]
    QueryFailed { identifier: String, message: String },
    #[error("permission request failed for {identifier}: {message}")]
    RequestFailed { identifier: String, message: String },
    #[error("settings deep link failed: {message}")]
    SettingsUnavailable { message: String },
}

/// OS permission subsystem.
pub trait PermissionSystem {
    fn check(&self, identifier: &str) -> Result<OsPermissionStatus, PermissionSystemError>;
    fn request(&self, identifier: &str) -> Result<OsPermissionStatus, PermissionSystemError>;
    fn open_settings(&self) -> Result<(), PermissionSystemError>;
}

/// Platforms without a runtime permission model.
#[derive(Debug, Default)]
pub struct NoRuntimePermissions;

impl PermissionSystem for NoRuntimePermissions {
    fn check(&self, _identifier: &str) -> Result<OsPermissionStatus, PermissionSystemError> {
        Ok(OsPermissionStatus::Granted)
    }

    fn request(&self, _identifier: &str) -> Result<OsPermissionStatus, PermissionSystemError> {
        Ok(OsPermissionStatus::Granted)
    }

    fn open_settings(&self) -> Result<(), PermissionSystemError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageGrant {
    LegacyReadWrite,
    ScopedMediaRead,
}

/// Fixed permission mapping chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStrategy {
    Unrestricted,
    Runtime { storage: StorageGrant },
}

impl PermissionStrategy {
    /// `None` means the platform has no runtime permission model.
    pub fn resolve(api_level: Option<u32>) -> Self {
        match api_level {
            None => Self::Unrestricted,
            Some(level) if level >= SCOPED_MEDIA_API_LEVEL => Self::Runtime {
                storage: StorageGrant::ScopedMediaRead,
            },
            Some(_) => Self::Runtime {
                storage: StorageGrant::LegacyReadWrite,
            },
        }
    }

    pub fn identifiers(self, kind: PermissionKind) -> &'static [&'static str] {
        match (self, kind) {
            (Self::Unrestricted, _) => &[],
            (Self::Runtime { .. }, PermissionKind::Camera) => &[ANDROID_CAMERA],
            (
                Self::Runtime {
                    storage: StorageGrant::LegacyReadWrite,
                },
                PermissionKind::Storage,
            ) => &[ANDROID_WRITE_EXTERNAL_STORAGE, ANDROID_READ_EXTERNAL_STORAGE],
            (
                Self::Runtime {
                    storage: StorageGrant::ScopedMediaRead,
                },
                PermissionKind::Storage,
            ) => &[ANDROID_READ_MEDIA_IMAGES],
        }
    }
}

/// Single entry point for permission checks. Never returns an error: any
/// failure of the underlying subsystem is reported as `Denied`.
pub struct PermissionGateway<P: PermissionSystem> {
    strategy: PermissionStrategy,
    system: P,
}

impl<P: PermissionSystem> PermissionGateway<P> {
    pub fn new(strategy: PermissionStrategy, system: P) -> Self {
        Self { strategy, system }
    }

    pub fn strategy(&self) -> PermissionStrategy {
        self.strategy
    }

    pub fn check(&self, kind: PermissionKind) -> PermissionState {
        let identifiers = self.strategy.identifiers(kind);
        if identifiers.is_empty() {
            return PermissionState::Granted;
        }

        let mut undetermined = false;
        for identifier in identifiers {
            match self.system.check(identifier) {
                Ok(OsPermissionStatus::Granted) => {}
                Ok(OsPermissionStatus::Undetermined) => undetermined = true,
                Ok(status) => {
                    tracing::debug!(?kind, identifier, ?status, "permission not granted");
                    return PermissionState::Denied;
                }
                Err(err) => {
                    tracing::warn!(?kind, identifier, %err, "permission check failed; treating as denied");
                    return PermissionState::Denied;
                }
            }
        }

        if undetermined {
            PermissionState::Unknown
        } else {
            PermissionState::Granted
        }
    }

    pub fn request(&self, kind: PermissionKind) -> PermissionState {
        let identifiers = self.strategy.identifiers(kind);
        if identifiers.is_empty() {
            return PermissionState::Granted;
        }

        for identifier in identifiers {
            match self.system.request(identifier) {
                Ok(OsPermissionStatus::Granted) => {}
                Ok(status) => {
                    tracing::info!(?kind, identifier, ?status, "permission request refused");
                    return PermissionState::Denied;
                }
                Err(err) => {
                    tracing::warn!(?kind, identifier, %err, "permission request failed; treating as denied");
                    return PermissionState::Denied;
                }
            }
        }
        PermissionState::Granted
    }

    /// Checks first and only prompts when the permission is not yet granted.
    pub fn ensure(&self, kind: PermissionKind) -> PermissionState {
        match self.check(kind) {
            PermissionState::Granted => PermissionState::Granted,
            _ => self.request(kind),
        }
    }

    pub fn open_settings(&self) {
        if let Err(err) = self.system.open_settings() {
            tracing::warn!(%err, "failed to open permission settings");
        }
    }
}
