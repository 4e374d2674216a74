//! Item image persistence.
//!
//! # Responsibility
//! - Persist uploaded image bytes and hand back a stable relative reference.
//! - Resolve references back to paths without escaping the store root.
//!
//! # Invariants
//! - References are relative, `/`-separated and never contain `..`.
//! - Every stored file gets a fresh UUID path:
//!   `<hex[0..2]>/<hex[2..4]>/<hex[4..]><.ext>`.

use crate::model::item::ImageRef;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

const MAX_EXTENSION_CHARS: usize = 16;

pub type ImageStoreResult<T> = Result<T, ImageStoreError>;

#[derive(Debug)]
pub enum ImageStoreError {
    EmptyPayload,
    InvalidReference(String),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ImageStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "image payload must not be empty"),
            Self::InvalidReference(value) => write!(f, "invalid image reference `{value}`"),
            Self::Io { path, source } => {
                write!(f, "image store i/o failed at `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ImageStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Binary asset sink for item images.
pub trait ImageStore {
    /// Persists `bytes` and returns the reference to record on the item.
    fn store(&self, file_name: &str, bytes: &[u8]) -> ImageStoreResult<ImageRef>;
}

/// Filesystem image store rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a reference to an absolute path under the store root.
    pub fn resolve(&self, image: &ImageRef) -> ImageStoreResult<PathBuf> {
        let relative = Path::new(image.as_str());
        let is_plain = !image.as_str().is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(ImageStoreError::InvalidReference(image.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageStore for FsImageStore {
    fn store(&self, file_name: &str, bytes: &[u8]) -> ImageStoreResult<ImageRef> {
        if bytes.is_empty() {
            return Err(ImageStoreError::EmptyPayload);
        }

        let image = ImageRef::new(sharded_name(Uuid::new_v4(), file_name));
        let path = self.resolve(&image)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ImageStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, bytes).map_err(|source| ImageStoreError::Io {
            path: path.clone(),
            source,
        })?;

        info!(
            "event=image_store module=storage status=ok bytes={} ref={image}",
            bytes.len()
        );
        Ok(image)
    }
}

fn sharded_name(id: Uuid, file_name: &str) -> String {
    let hex = id.simple().to_string();
    format!(
        "{}/{}/{}{}",
        &hex[0..2],
        &hex[2..4],
        &hex[4..],
        normalized_extension(file_name)
    )
}

/// Lower-cased `.ext` of `file_name`, or empty when absent or unusual.
fn normalized_extension(file_name: &str) -> String {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let usable = !extension.is_empty()
        && extension.len() <= MAX_EXTENSION_CHARS
        && extension.chars().all(|c| c.is_ascii_alphanumeric());
    if usable {
        format!(".{}", extension.to_ascii_lowercase())
    } else {
        String::new()
    }
}
