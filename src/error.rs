//! Error types for configuration, metadata handling and the tile transform.
//!
//! [`ScrambleError`] is the only type that crosses the crate boundary from
//! [`crate::scrambler::Scrambler`]. Internal transform failures are wrapped in
//! the opaque `ScrambleFailed`/`UnscrambleFailed` variants; their cause stays
//! reachable through [`std::error::Error::source`] for server-side logging.

use thiserror::Error;

/// Tile sizing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("image has no usable dimensions ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("tile grid must be at least 1x1 (got {rows}x{cols})")]
    EmptyGrid { rows: u32, cols: u32 },
    #[error("a {rows}x{cols} grid is finer than a {width}x{height} image permits")]
    GridTooFine {
        width: u32,
        height: u32,
        rows: u32,
        cols: u32,
    },
    #[error("a {width}x{height} image is not an exact {rows}x{cols} tiling")]
    NotTileAligned {
        width: u32,
        height: u32,
        rows: u32,
        cols: u32,
    },
}

/// Internal causes of a failed scramble or unscramble.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("cannot decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("cannot read image data: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("cannot encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("permutation covers {actual} tiles, grid has {expected}")]
    TileCount { expected: usize, actual: usize },
}

/// Problems with a persisted [`crate::metadata::ScrambleMetadata`] record.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("scramble metadata is absent")]
    Absent,
    #[error("scramble metadata is malformed: {0}")]
    Malformed(String),
    #[error("scramble metadata is missing `{0}`")]
    MissingField(&'static str),
    #[error("scramble metadata carries an invalid salt: {0}")]
    BadSalt(String),
    #[error("image was stored without scrambling")]
    NotEnabled,
}

/// Boundary error returned by the scrambler.
#[derive(Error, Debug)]
pub enum ScrambleError {
    #[error("scrambling is disabled in this deployment")]
    Disabled,
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("scramble failed")]
    ScrambleFailed(#[source] TransformError),
    #[error("unscramble failed")]
    UnscrambleFailed(#[source] TransformError),
}

impl ScrambleError {
    /// True when the failure was caused by image dimensions that cannot be
    /// tiled with the requested grid.
    pub fn is_dimension_error(&self) -> bool {
        matches!(
            self,
            Self::ScrambleFailed(TransformError::Geometry(_))
                | Self::UnscrambleFailed(TransformError::Geometry(_))
        )
    }
}

/// Configuration load and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("scrambling is enabled but no master key is configured")]
    MissingMasterKey,
    #[error("context string must not be empty")]
    EmptyContext,
    #[error("tile grid must be at least 1x1 and within the tile cap (got {rows}x{cols})")]
    InvalidGrid { rows: u32, cols: u32 },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
