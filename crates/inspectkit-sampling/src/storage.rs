//! Capture persistence
//!
//! Every capture lands in the buffer directory as `<image_name>.png`. When
//! requested, a companion `<image_name>.json` holds the flat metadata record.

use image::DynamicImage;
use inspectkit_core::{ImageMetadata, StorageError};
use std::path::{Path, PathBuf};

/// Writes captured frames and their metadata to the buffer directory
#[derive(Debug, Clone)]
pub struct CaptureStore {
    buffer_dir: PathBuf,
}

impl CaptureStore {
    /// Create a store rooted at `buffer_dir`; nothing is created until the first write
    pub fn new(buffer_dir: impl Into<PathBuf>) -> Self {
        Self {
            buffer_dir: buffer_dir.into(),
        }
    }

    /// The buffer directory
    pub fn buffer_dir(&self) -> &Path {
        &self.buffer_dir
    }

    /// Path of the image file for `image_name`
    pub fn image_path(&self, image_name: &str) -> PathBuf {
        self.buffer_dir.join(format!("{}.png", image_name))
    }

    /// Path of the metadata file for `image_name`
    pub fn metadata_path(&self, image_name: &str) -> PathBuf {
        self.buffer_dir.join(format!("{}.json", image_name))
    }

    /// `base`, or `base_<n>` with the smallest `n` whose image file does not exist yet
    ///
    /// A pass interrupted before its layer was bumped leaves files that the
    /// next pass on the same layer would otherwise overwrite.
    pub fn available_name(&self, base: &str) -> String {
        if !self.image_path(base).exists() {
            return base.to_string();
        }
        (1u32..)
            .map(|n| format!("{}_{}", base, n))
            .find(|name| !self.image_path(name).exists())
            .unwrap_or_else(|| base.to_string())
    }

    fn ensure_buffer(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.buffer_dir).map_err(|e| StorageError::BufferUnavailable {
            path: self.buffer_dir.clone(),
            reason: e.to_string(),
        })
    }

    /// Write `frame` and, if `write_metadata`, its metadata record
    ///
    /// Returns the image path.
    pub fn persist(
        &self,
        frame: &DynamicImage,
        metadata: &ImageMetadata,
        write_metadata: bool,
    ) -> Result<PathBuf, StorageError> {
        self.ensure_buffer()?;

        let image_path = self.image_path(&metadata.image_name);
        frame
            .save(&image_path)
            .map_err(|e| StorageError::WriteFailed {
                path: image_path.clone(),
                reason: e.to_string(),
            })?;

        if write_metadata {
            let metadata_path = self.metadata_path(&metadata.image_name);
            let json = serde_json::to_string_pretty(metadata).map_err(|e| {
                StorageError::WriteFailed {
                    path: metadata_path.clone(),
                    reason: e.to_string(),
                }
            })?;
            std::fs::write(&metadata_path, json).map_err(|e| StorageError::WriteFailed {
                path: metadata_path.clone(),
                reason: e.to_string(),
            })?;
        }

        tracing::debug!("Stored {}", image_path.display());
        Ok(image_path)
    }
}
