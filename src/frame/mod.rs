use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate frame id {id}")]
    DuplicateFrameId { id: u32 },
    #[error("failed to load frame {id} from {origin}: {message}")]
    LoadFailed {
        id: u32,
        origin: String,
        message: String,
    },
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Where the pixels of a frame come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    File(PathBuf),
    Encoded(Arc<[u8]>),
}

impl FrameSource {
    fn origin(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Encoded(bytes) => format!("<{} encoded bytes>", bytes.len()),
        }
    }
}

/// A decorative overlay the user can pick before capturing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: u32,
    display_name: String,
    source: FrameSource,
}

impl Frame {
    pub fn new(id: u32, display_name: impl Into<String>, source: FrameSource) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            source,
        }
    }

    pub fn from_path(id: u32, display_name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(
            id,
            display_name,
            FrameSource::File(path.as_ref().to_path_buf()),
        )
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    /// Decodes the frame image, keeping its alpha channel.
    pub fn load(&self) -> CatalogResult<DynamicImage> {
        let decoded = match &self.source {
            FrameSource::File(path) => image::open(path),
            FrameSource::Encoded(bytes) => image::load_from_memory(bytes),
        };
        decoded.map_err(|err| CatalogError::LoadFailed {
            id: self.id,
            origin: self.source.origin(),
            message: err.to_string(),
        })
    }
}

/// Read-only list of frames, built once and shared by every session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCatalog {
    frames: Vec<Frame>,
}

impl FrameCatalog {
    pub fn new(frames: Vec<Frame>) -> CatalogResult<Self> {
        let mut seen = HashSet::with_capacity(frames.len());
        for frame in &frames {
            if !seen.insert(frame.id) {
                return Err(CatalogError::DuplicateFrameId { id: frame.id });
            }
        }
        Ok(Self { frames })
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn get(&self, id: u32) -> Option<&Frame> {
        self.frames.iter().find(|frame| frame.id == id)
    }

    /// First frame in catalog order, used as the initial selection.
    pub fn first(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}
