//! Reversible, key-derived image tile scrambling.
//!
//! An image is cut into a fixed grid of equal tiles (remainder pixels are
//! cropped) and the tiles are re-composited in an order derived from a master
//! key and a fresh per-image salt. Only the salt and grid size are persisted;
//! anyone holding the master key can recompute the permutation and restore
//! the image.
//!
//! ```rust,ignore
//! use tilescramble_lib::{Scrambler, ScramblerConfig};
//!
//! let scrambler = Scrambler::new(ScramblerConfig::from_env()?);
//! if let Some(out) = scrambler.scramble_if_needed(&upload, "image/jpeg")? {
//!     store(&out.bytes, &out.metadata.to_json());
//! }
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod kdf;
pub mod metadata;
pub mod permutation;
pub mod prng;
pub mod raster;
pub mod scrambler;
pub mod tiles;

pub use config::ScramblerConfig;
pub use error::{ConfigError, GeometryError, MetadataError, ScrambleError, TransformError};
pub use geometry::TileGeometry;
pub use metadata::{ResolvedMetadata, ScrambleMetadata};
pub use scrambler::{is_image_mime, PermutationSeed, ScrambledImage, Scrambler};
