//! Photo inputs: an optional camera shot plus uploaded files.

use std::io::Cursor;
use std::path::Path;

use tracing::debug;

use crate::error::ValidationError;

/// Number of images a single plan request consumes.
pub const MAX_REQUEST_IMAGES: usize = 2;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSource {
    Camera,
    Upload,
}

#[derive(Debug, Clone)]
pub struct Photo {
    pub label: String,
    pub source: PhotoSource,
    pub bytes: Vec<u8>,
    /// Width and height, when the header could be read.
    pub dimensions: Option<(u32, u32)>,
}

impl Photo {
    pub fn from_bytes(label: impl Into<String>, source: PhotoSource, bytes: Vec<u8>) -> Self {
        let dimensions = probe_dimensions(&bytes);
        Self {
            label: label.into(),
            source,
            bytes,
            dimensions,
        }
    }

    /// Read a png/jpeg file from disk.
    pub fn load(path: &Path, source: PhotoSource) -> Result<Self, ValidationError> {
        let display = path.display().to_string();
        if !has_supported_extension(path) {
            return Err(ValidationError::UnsupportedImage(display));
        }

        let bytes = std::fs::read(path).map_err(|source| ValidationError::ImageRead {
            path: display.clone(),
            source,
        })?;

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(display);

        debug!(label = %label, size = bytes.len(), "loaded photo");
        Ok(Self::from_bytes(label, source, bytes))
    }

    pub fn size_kb(&self) -> usize {
        self.bytes.len().div_ceil(1024)
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// The photos collected for one request. The camera shot, when present,
/// always occupies slot 0.
#[derive(Debug, Clone, Default)]
pub struct PhotoSet {
    camera: Option<Photo>,
    uploads: Vec<Photo>,
}

impl PhotoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_camera(&mut self, photo: Photo) {
        self.camera = Some(Photo {
            source: PhotoSource::Camera,
            ..photo
        });
    }

    pub fn add_upload(&mut self, photo: Photo) {
        self.uploads.push(Photo {
            source: PhotoSource::Upload,
            ..photo
        });
    }

    /// Remove the photo at `index` of the ordered view.
    pub fn remove(&mut self, index: usize) -> Option<Photo> {
        let has_camera = self.camera.is_some();
        if has_camera && index == 0 {
            return self.camera.take();
        }
        let upload_index = if has_camera { index - 1 } else { index };
        (upload_index < self.uploads.len()).then(|| self.uploads.remove(upload_index))
    }

    pub fn camera(&self) -> Option<&Photo> {
        self.camera.as_ref()
    }

    pub fn uploads(&self) -> &[Photo] {
        &self.uploads
    }

    pub fn len(&self) -> usize {
        self.uploads.len() + usize::from(self.camera.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Camera first, then uploads in the order they were added.
    pub fn ordered(&self) -> impl Iterator<Item = &Photo> {
        self.camera.iter().chain(self.uploads.iter())
    }

    /// The images a request will actually send. Extras are dropped silently.
    pub fn for_request(&self) -> Vec<&Photo> {
        self.ordered().take(MAX_REQUEST_IMAGES).collect()
    }
}
