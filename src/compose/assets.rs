//! Image store: resolves asset identifiers to files and decodes them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};

use crate::compose::error::AssetError;
use crate::config::AssetConfig;

/// Read-only view of a directory of `<identifier>.<extension>` rasters.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    extension: String,
    strict_identifiers: bool,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            strict_identifiers: true,
        }
    }

    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(&config.root, &config.extension).strict_identifiers(config.strict_identifiers)
    }

    /// Toggle rejection of identifiers that could resolve outside `root`.
    pub fn strict_identifiers(mut self, strict: bool) -> Self {
        self.strict_identifiers = strict;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `identifier` is acceptable under the current policy.
    pub fn accepts(&self, identifier: &str) -> bool {
        !self.strict_identifiers || is_plain_identifier(identifier)
    }

    /// Path an identifier resolves to.
    pub fn path_for(&self, identifier: &str) -> Result<PathBuf, AssetError> {
        if !self.accepts(identifier) {
            return Err(AssetError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", identifier, self.extension)))
    }

    /// Read and decode an asset into an RGBA8 buffer.
    ///
    /// Blocking; callers on the async runtime go through `spawn_blocking`.
    pub fn load(&self, identifier: &str) -> Result<RgbaImage, AssetError> {
        let path = self.path_for(identifier)?;
        let bytes = std::fs::read(&path).map_err(|e| AssetError::NotFound {
            identifier: identifier.to_string(),
            source: Arc::new(e),
        })?;

        let decoded = match ImageFormat::from_extension(&self.extension) {
            Some(format) => image::load_from_memory_with_format(&bytes, format),
            None => image::load_from_memory(&bytes),
        }
        .map_err(|e| AssetError::Decode {
            identifier: identifier.to_string(),
            source: Arc::new(e),
        })?;

        tracing::trace!(
            identifier,
            width = decoded.width(),
            height = decoded.height(),
            "Asset decoded"
        );
        Ok(decoded.to_rgba8())
    }
}

fn is_plain_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && !identifier.contains(['/', '\\', '\0'])
        && !identifier.contains("..")
}
