//! Configuration structures for the operation worker and thumbnails.

use std::path::Path;

use pagecraft_render::{BackendKind, TargetSize};
use serde::{Deserialize, Serialize};

use crate::error::PagecraftError;
use crate::ops::{ReorderPolicy, SaveOptions};

/// Main configuration for pagecraft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagecraftConfig {
    /// Page operation worker configuration.
    pub worker: WorkerConfig,

    /// Thumbnail generation configuration.
    pub thumbnails: ThumbnailConfig,
}

/// Page operation worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// How reorder treats lists that are not a full permutation.
    pub reorder_policy: ReorderPolicy,

    /// Compress streams in produced documents.
    pub compress_output: bool,
}

impl WorkerConfig {
    pub fn save_options(&self) -> SaveOptions {
        SaveOptions {
            compress: self.compress_output,
        }
    }
}

/// Thumbnail generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Maximum thumbnail width in pixels.
    pub width: u32,

    /// Maximum thumbnail height in pixels.
    pub height: u32,

    /// Number of thumbnails kept in the cache.
    pub cache_capacity: usize,

    /// Rasterization backend.
    pub backend: BackendKind,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        let target = TargetSize::default();
        Self {
            width: target.width,
            height: target.height,
            cache_capacity: crate::thumbnail::DEFAULT_CACHE_CAPACITY,
            backend: BackendKind::default(),
        }
    }
}

impl ThumbnailConfig {
    /// Bounding box thumbnails are fitted into.
    pub fn target(&self) -> TargetSize {
        TargetSize::new(self.width, self.height)
    }
}

impl PagecraftConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Reject values no worker can run with.
    pub fn validate(&self) -> crate::Result<()> {
        let thumbnails = &self.thumbnails;
        if thumbnails.width == 0 || thumbnails.height == 0 {
            return Err(PagecraftError::Config(format!(
                "thumbnail size must be non-zero, got {}x{}",
                thumbnails.width, thumbnails.height
            )));
        }
        if thumbnails.cache_capacity == 0 {
            return Err(PagecraftError::Config("thumbnail cache capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PagecraftConfig::default();
        assert_eq!(config.thumbnails.target(), TargetSize::new(200, 280));
        assert_eq!(config.thumbnails.cache_capacity, 50);
        assert_eq!(config.worker.reorder_policy, ReorderPolicy::Lenient);
        assert!(!config.worker.compress_output);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PagecraftConfig =
            serde_json::from_str(r#"{"worker": {"reorder_policy": "permutation"}, "thumbnails": {"width": 120}}"#)
                .unwrap();
        assert_eq!(config.worker.reorder_policy, ReorderPolicy::Permutation);
        assert_eq!(config.thumbnails.width, 120);
        assert_eq!(config.thumbnails.height, 280);
        assert_eq!(config.thumbnails.backend, BackendKind::ImageLayer);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PagecraftConfig::default();
        config.worker.compress_output = true;
        config.thumbnails.backend = BackendKind::Pdfium;
        config.save(&path).unwrap();

        assert_eq!(PagecraftConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = PagecraftConfig::default();
        assert!(config.validate().is_ok());

        config.thumbnails.height = 0;
        assert!(matches!(config.validate(), Err(PagecraftError::Config(_))));

        config.thumbnails.height = 280;
        config.thumbnails.cache_capacity = 0;
        assert!(matches!(config.validate(), Err(PagecraftError::Config(_))));
    }
}
