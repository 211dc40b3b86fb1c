//! Image ingestion and preview handles.
//!
//! A selected file is read fully into memory, sniffed for its format, and turned
//! into an [`UploadedImage`]: a base64 data URI for the edit service plus a
//! revocable preview handle for display. Handles are released when dropped, so an
//! image that leaves the workflow takes its preview with it.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageReader;
use log::debug;

use crate::client::MediaType;
use crate::error::{Error, Result};

/// Where an image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A file picked from disk.
    Path(PathBuf),
    /// Bytes already in memory, e.g. from a drag-and-drop.
    Bytes {
        /// Display name of the dropped file.
        name: String,
        /// Raw file contents.
        bytes: Vec<u8>,
    },
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    live: HashMap<u64, Arc<[u8]>>,
}

/// Issues preview handles and tracks which are still alive.
///
/// Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl PreviewRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `bytes` and return a handle that releases them on drop.
    #[must_use]
    pub fn acquire(&self, bytes: Arc<[u8]>) -> PreviewHandle {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.live.insert(id, bytes);
        debug!("preview {id} acquired ({} live)", inner.live.len());

        PreviewHandle {
            id,
            url: format!("preview://{id}"),
            registry: self.clone(),
        }
    }

    /// Number of handles not yet released.
    #[must_use]
    pub fn live(&self) -> usize {
        self.lock().live.len()
    }

    /// Look up the bytes behind a preview url, if the handle is still alive.
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        let id: u64 = url.strip_prefix("preview://")?.parse().ok()?;
        self.lock().live.get(&id).cloned()
    }

    fn release(&self, id: u64) {
        let mut inner = self.lock();
        if inner.live.remove(&id).is_some() {
            debug!("preview {id} released ({} live)", inner.live.len());
        }
    }
}

/// A revocable reference to a displayable preview.
pub struct PreviewHandle {
    id: u64,
    url: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    /// Url under which the preview can be resolved, e.g. `preview://3`.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// Name and size of the file an image was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// File name as shown to the user.
    pub name: String,
    /// Size in bytes.
    pub len: usize,
}

/// An image held in memory for one workflow session.
#[derive(Debug)]
pub struct UploadedImage {
    file: FileHandle,
    preview: PreviewHandle,
    data_uri: Arc<str>,
    media_type: MediaType,
    width: u32,
    height: u32,
}

impl UploadedImage {
    /// The originating file.
    #[must_use]
    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    /// The preview handle for display.
    #[must_use]
    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    /// Base64 data URI, e.g. `data:image/jpeg;base64,...`.
    #[must_use]
    pub fn data_uri(&self) -> &Arc<str> {
        &self.data_uri
    }

    /// Sniffed media type.
    #[must_use]
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Pixel dimensions as `(width, height)`.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Read an image into memory.
///
/// # Errors
///
/// - [`Error::Read`] if the file cannot be read.
/// - [`Error::UnsupportedFormat`] if the content is not PNG, JPEG or WEBP.
/// - [`Error::Image`] if the header cannot be decoded.
pub async fn ingest(source: ImageSource, previews: &PreviewRegistry) -> Result<UploadedImage> {
    let (name, bytes) = match source {
        ImageSource::Path(path) => {
            let bytes = tokio::fs::read(&path).await.map_err(|source| Error::Read {
                path: path.clone(),
                source,
            })?;
            let name = path.file_name().map_or_else(
                || path.display().to_string(),
                |f| f.to_string_lossy().to_string(),
            );
            (name, bytes)
        }
        ImageSource::Bytes { name, bytes } => (name, bytes),
    };

    from_bytes(name, bytes, previews)
}

fn from_bytes(name: String, bytes: Vec<u8>, previews: &PreviewRegistry) -> Result<UploadedImage> {
    let format = image::guess_format(&bytes)
        .map_err(|_| Error::UnsupportedFormat(format!("{name} is not a recognised image")))?;
    let media_type = MediaType::from_format(format)
        .ok_or_else(|| Error::UnsupportedFormat(format!("{format:?}")))?;

    let (width, height) =
        ImageReader::with_format(Cursor::new(bytes.as_slice()), format).into_dimensions()?;

    let data_uri: Arc<str> =
        format!("data:{};base64,{}", media_type.mime(), STANDARD.encode(&bytes)).into();
    let file = FileHandle {
        name,
        len: bytes.len(),
    };
    let preview = previews.acquire(bytes.into());

    debug!(
        "ingested {} ({}x{}, {})",
        file.name,
        width,
        height,
        media_type.mime()
    );

    Ok(UploadedImage {
        file,
        preview,
        data_uri,
        media_type,
        width,
        height,
    })
}
