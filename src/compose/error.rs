//! Error taxonomy for asset loading, compositing and rendering.

use std::sync::Arc;

/// Failure to produce a decoded image from the asset store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetError {
    #[error("invalid asset identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("asset {identifier:?} not found: {source}")]
    NotFound {
        identifier: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("asset {identifier:?} could not be decoded: {source}")]
    Decode {
        identifier: String,
        #[source]
        source: Arc<image::ImageError>,
    },
}

/// Failure to serialize a composite canvas.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompositeError {
    #[error("could not encode output image: {0}")]
    Encode(#[source] Arc<image::ImageError>),
}

/// Any failure while computing a composite for a cache key.
///
/// `Clone` so one computation's outcome can be handed to every request
/// waiting on the same key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Composite(#[from] CompositeError),

    #[error("render worker failed: {0}")]
    Worker(String),
}

impl RenderError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Asset(AssetError::InvalidIdentifier(_)) => "invalid_identifier",
            RenderError::Asset(AssetError::NotFound { .. }) => "asset_not_found",
            RenderError::Asset(AssetError::Decode { .. }) => "decode",
            RenderError::Composite(CompositeError::Encode(_)) => "encode",
            RenderError::Worker(_) => "worker",
        }
    }
}
