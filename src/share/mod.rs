use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::capture::ComposedImage;

const WL_COPY_COMMAND: &str = "wl-copy";
const MIME_TEXT_URI_LIST: &str = "text/uri-list";

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("shared file {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to resolve absolute path for {path}: {source}")]
    PathResolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("share surface unavailable: {message}")]
    ShareFailed { message: String },
}

pub type ShareResult<T> = std::result::Result<T, ShareError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Cancelled,
}

/// OS share mechanism. Dismissing the sheet is `Ok(ShareOutcome::Cancelled)`.
pub trait ShareSurface: Send + Sync {
    fn open_share_sheet(&self, file_uri: &str, mime_type: &str, title: &str)
        -> ShareResult<ShareOutcome>;
}

/// Hands the file to other apps through the Wayland clipboard as a
/// `text/uri-list` entry.
#[derive(Debug, Default)]
pub struct WlCopyShareSurface;

impl ShareSurface for WlCopyShareSurface {
    fn open_share_sheet(
        &self,
        file_uri: &str,
        mime_type: &str,
        title: &str,
    ) -> ShareResult<ShareOutcome> {
        tracing::debug!(file_uri, mime_type, title, "sharing via wl-copy");
        let mut child = Command::new(WL_COPY_COMMAND)
            .args(["--type", MIME_TEXT_URI_LIST])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|err| ShareError::ShareFailed {
                message: format!("failed to run {WL_COPY_COMMAND}: {err}"),
            })?;

        let payload = format!("{file_uri}\r\n");
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(payload.as_bytes()).map_err(|err| err.to_string()),
            None => Err("command stdin unavailable".to_string()),
        };
        if let Err(message) = written {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ShareError::ShareFailed { message });
        }

        let status = child.wait().map_err(|err| ShareError::ShareFailed {
            message: err.to_string(),
        })?;
        if status.success() {
            Ok(ShareOutcome::Shared)
        } else {
            Err(ShareError::ShareFailed {
                message: format!("{WL_COPY_COMMAND} exited with status: {status}"),
            })
        }
    }
}

pub struct ShareService<S: ShareSurface> {
    surface: S,
}

impl<S: ShareSurface> ShareService<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn share(&self, image: &ComposedImage, title: &str) -> ShareResult<ShareOutcome> {
        File::open(&image.path).map_err(|err| ShareError::Unreadable {
            path: image.path.clone(),
            source: err,
        })?;
        let uri = file_uri(&image.path)?;
        let outcome = self
            .surface
            .open_share_sheet(&uri, image.format.mime_type(), title)?;
        tracing::info!(capture_id = %image.capture_id, ?outcome, "share finished");
        Ok(outcome)
    }
}

fn resolve_absolute_path(path: &Path) -> ShareResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .map_err(|err| ShareError::PathResolve {
            path: path.to_path_buf(),
            source: err,
        })
}

/// `file://` URI with RFC 3986 percent-encoding of the path bytes.
pub fn file_uri(path: &Path) -> ShareResult<String> {
    let absolute = resolve_absolute_path(path)?;
    let raw = absolute.to_string_lossy();
    let mut uri = String::with_capacity(raw.len() + 7);
    uri.push_str("file://");
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                uri.push(char::from(byte));
            }
            _ => uri.push_str(&format!("%{byte:02X}")),
        }
    }
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ImageFormat;
    use std::sync::Mutex;

    struct FakeShareSurface {
        outcome: Result<ShareOutcome, String>,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeShareSurface {
        fn new(outcome: Result<ShareOutcome, String>) -> Self {
            Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ShareSurface for FakeShareSurface {
        fn open_share_sheet(
            &self,
            file_uri: &str,
            mime_type: &str,
            title: &str,
        ) -> ShareResult<ShareOutcome> {
            self.calls.lock().unwrap().push((
                file_uri.to_string(),
                mime_type.to_string(),
                title.to_string(),
            ));
            self.outcome
                .clone()
                .map_err(|message| ShareError::ShareFailed { message })
        }
    }

    fn image_at(path: PathBuf) -> ComposedImage {
        ComposedImage {
            capture_id: "share-1".to_string(),
            path,
            width: 1,
            height: 1,
            format: ImageFormat::Png,
            created_at: 1,
        }
    }

    fn temp_image(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "framecam share {tag} {}.png",
            std::process::id()
        ));
        std::fs::write(&path, b"png").unwrap();
        path
    }

    #[test]
    fn share_passes_uri_mime_and_title() {
        let path = temp_image("ok");
        let service = ShareService::new(FakeShareSurface::new(Ok(ShareOutcome::Shared)));

        let outcome = service.share(&image_at(path.clone()), "Share Photo").unwrap();
        assert_eq!(outcome, ShareOutcome::Shared);

        let calls = service.surface.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.starts_with("file:///"));
        assert!(calls[0].0.contains("framecam%20share%20ok"));
        assert_eq!(calls[0].1, "image/png");
        assert_eq!(calls[0].2, "Share Photo");

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn cancelled_share_is_not_an_error() {
        let path = temp_image("cancel");
        let service = ShareService::new(FakeShareSurface::new(Ok(ShareOutcome::Cancelled)));
        let outcome = service.share(&image_at(path.clone()), "Share Photo").unwrap();
        assert_eq!(outcome, ShareOutcome::Cancelled);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn unreadable_file_never_reaches_the_surface() {
        let service = ShareService::new(FakeShareSurface::new(Ok(ShareOutcome::Shared)));
        let err = service
            .share(
                &image_at(PathBuf::from("/nonexistent/framecam/share.png")),
                "Share Photo",
            )
            .expect_err("missing file should fail");
        assert!(matches!(err, ShareError::Unreadable { .. }));
        assert!(service.surface.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn surface_failure_propagates() {
        let path = temp_image("fail");
        let service = ShareService::new(FakeShareSurface::new(Err("no sheet".to_string())));
        let err = service
            .share(&image_at(path.clone()), "Share Photo")
            .expect_err("surface failure should propagate");
        assert!(matches!(err, ShareError::ShareFailed { .. }));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn file_uri_percent_encodes_reserved_bytes() {
        let uri = file_uri(Path::new("/tmp/a b#c.png")).unwrap();
        assert_eq!(uri, "file:///tmp/a%20b%23c.png");
    }
}
