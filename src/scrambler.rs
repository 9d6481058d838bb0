//! Scramble/unscramble orchestration.
//!
//! The [`Scrambler`] is the only entry point callers need. It owns the
//! immutable configuration, classifies failures into [`ScrambleError`] and
//! logs internal causes through `tracing`; the pieces it drives
//! ([`crate::kdf`], [`crate::permutation`], [`crate::tiles`]) are pure.
//!
//! Each call is self-contained: a `Scrambler` can be cloned or shared across
//! threads freely, and the generator and permutation never outlive one call.

use base64::Engine;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::config::ScramblerConfig;
use crate::error::{GeometryError, MetadataError, ScrambleError, TransformError};
use crate::geometry::TileGeometry;
use crate::kdf::{self, KEY_LEN, SALT_LEN};
use crate::metadata::{ResolvedMetadata, ScrambleMetadata, BASE64URL};
use crate::permutation::generate_permutation;
use crate::raster;
use crate::tiles;

/// Result of a forward transform: PNG bytes plus the record to persist.
///
/// Serialises as camelCase JSON with the PNG carried as standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrambledImage {
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub metadata: ScrambleMetadata,
}

/// Everything a client needs to invert the permutation itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermutationSeed {
    /// base64url (unpadded) HMAC-derived permutation seed.
    pub permutation_seed: String,
    pub tile_rows: u32,
    pub tile_cols: u32,
    pub version: u32,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

/// True for `image/*` MIME types.
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

#[derive(Debug, Clone)]
pub struct Scrambler {
    config: Arc<ScramblerConfig>,
}

impl Scrambler {
    pub fn new(config: ScramblerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn from_shared(config: Arc<ScramblerConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScramblerConfig {
        &self.config
    }

    /// Scramble `bytes` when the feature is on and `mime_type` is an image.
    ///
    /// `Ok(None)` means no transform was performed and the caller stores the
    /// original bytes unchanged.
    pub fn scramble_if_needed(&self, bytes: &[u8], mime_type: &str) -> Result<Option<ScrambledImage>, ScrambleError> {
        if !self.config.enabled() {
            debug!("scrambling disabled, passing upload through");
            return Ok(None);
        }
        if !is_image_mime(mime_type) {
            debug!(mime_type, "not an image, passing upload through");
            return Ok(None);
        }
        self.scramble(bytes).map(Some)
    }

    /// Scramble with a freshly generated salt.
    pub fn scramble(&self, bytes: &[u8]) -> Result<ScrambledImage, ScrambleError> {
        self.scramble_with_salt(bytes, &kdf::generate_salt())
    }

    /// Scramble with a caller-chosen salt. Reusing a salt across images makes
    /// their permutations identical; outside of tests use [`Self::scramble`].
    pub fn scramble_with_salt(&self, bytes: &[u8], salt: &[u8; SALT_LEN]) -> Result<ScrambledImage, ScrambleError> {
        if !self.config.enabled() {
            return Err(ScrambleError::Disabled);
        }
        let (img, metadata) = raster::decode_with_orientation(bytes)
            .and_then(|img| self.scramble_pixels(img, salt))
            .map_err(scramble_failed)?;
        let (width, height) = img.dimensions();
        let scrambled = raster::encode_png(&img).map_err(scramble_failed)?;
        let tiles = self.config.tile_rows() * self.config.tile_cols();
        info!(width, height, tiles, "image scrambled");
        Ok(ScrambledImage {
            bytes: scrambled,
            width,
            height,
            metadata,
        })
    }

    /// Forward transform on decoded pixels. The image is cropped to the
    /// effective tiling area first.
    pub fn scramble_image(&self, img: RgbaImage, salt: &[u8; SALT_LEN]) -> Result<(RgbaImage, ScrambleMetadata), ScrambleError> {
        if !self.config.enabled() {
            return Err(ScrambleError::Disabled);
        }
        self.scramble_pixels(img, salt).map_err(scramble_failed)
    }

    fn scramble_pixels(&self, img: RgbaImage, salt: &[u8; SALT_LEN]) -> Result<(RgbaImage, ScrambleMetadata), TransformError> {
        let cfg = &*self.config;
        let (width, height) = img.dimensions();
        let geometry = TileGeometry::compute(width, height, cfg.tile_rows(), cfg.tile_cols())?;
        debug!(
            width,
            height,
            effective_width = geometry.effective_width,
            effective_height = geometry.effective_height,
            "tile geometry computed"
        );
        let canvas = raster::crop_to(img, geometry.effective_width, geometry.effective_height);

        let perm = kdf::permutation_for(cfg.master_key(), salt, cfg.context_string(), geometry.tile_count());
        let scrambled = tiles::scramble_pixels(&canvas, &perm, &geometry)?;
        let metadata = ScrambleMetadata::scrambled(cfg.version(), salt, cfg.tile_rows(), cfg.tile_cols());
        Ok((scrambled, metadata))
    }

    /// Recompute the permutation an image was scrambled with.
    pub fn recover_permutation(&self, metadata: &ScrambleMetadata) -> Result<Vec<usize>, ScrambleError> {
        self.resolve_permutation(metadata).map(|(_, perm)| perm)
    }

    fn resolve_permutation(&self, metadata: &ScrambleMetadata) -> Result<(ResolvedMetadata, Vec<usize>), ScrambleError> {
        let resolved = metadata.resolve()?;
        let seed = self.seed_for(&resolved)?;
        let perm = generate_permutation(&*seed, resolved.tile_count());
        Ok((resolved, perm))
    }

    /// Permutation seed and grid for a client that applies the inverse itself.
    pub fn recover_permutation_seed(&self, metadata: Option<&ScrambleMetadata>) -> Result<PermutationSeed, ScrambleError> {
        let metadata = metadata.ok_or(MetadataError::Absent)?;
        let resolved = metadata.resolve()?;
        let seed = self.seed_for(&resolved)?;
        Ok(PermutationSeed {
            permutation_seed: BASE64URL.encode(&*seed),
            tile_rows: resolved.tile_rows,
            tile_cols: resolved.tile_cols,
            version: resolved.version,
        })
    }

    /// [`Self::recover_permutation_seed`] for a stored JSON document, either the
    /// bare record or a caller document embedding it.
    pub fn recover_permutation_seed_json(&self, document: Option<&str>) -> Result<PermutationSeed, ScrambleError> {
        let document = document.ok_or(MetadataError::Absent)?;
        let metadata = ScrambleMetadata::from_json(document)?;
        self.recover_permutation_seed(Some(&metadata))
    }

    /// Restore the cropped original from scrambled PNG (or other lossless)
    /// bytes.
    pub fn unscramble(&self, bytes: &[u8], metadata: &ScrambleMetadata) -> Result<Vec<u8>, ScrambleError> {
        let resolved = metadata.resolve()?;
        let seed = self.seed_for(&resolved)?;
        let restored = raster::decode_with_orientation(bytes)
            .and_then(|img| unscramble_pixels(&img, &*seed, &resolved))
            .and_then(|img| raster::encode_png(&img))
            .map_err(unscramble_failed)?;
        info!(tiles = resolved.tile_count(), "image unscrambled");
        Ok(restored)
    }

    /// Inverse transform on decoded pixels. `img` must already have the
    /// effective (cropped) size for the stored grid.
    pub fn unscramble_image(&self, img: &RgbaImage, metadata: &ScrambleMetadata) -> Result<RgbaImage, ScrambleError> {
        let resolved = metadata.resolve()?;
        let seed = self.seed_for(&resolved)?;
        unscramble_pixels(img, &*seed, &resolved).map_err(unscramble_failed)
    }

    fn seed_for(&self, resolved: &ResolvedMetadata) -> Result<Zeroizing<[u8; KEY_LEN]>, ScrambleError> {
        let cfg = &*self.config;
        if !cfg.enabled() {
            return Err(ScrambleError::Disabled);
        }
        let context = match cfg.context_for_version(resolved.version) {
            Some(context) => context,
            None => {
                warn!(
                    version = resolved.version,
                    current = cfg.version(),
                    "no context registered for metadata version, using current context"
                );
                cfg.context_string()
            }
        };
        Ok(kdf::permutation_seed(cfg.master_key(), &resolved.salt, context))
    }
}

/// The stored grid must tile `img` exactly before the permutation is built.
fn unscramble_pixels(img: &RgbaImage, seed: &[u8], resolved: &ResolvedMetadata) -> Result<RgbaImage, TransformError> {
    let (rows, cols) = (resolved.tile_rows, resolved.tile_cols);
    let (width, height) = img.dimensions();
    let geometry = TileGeometry::compute(width, height, rows, cols)?;
    if !geometry.is_exact(width, height) {
        return Err(GeometryError::NotTileAligned {
            width,
            height,
            rows,
            cols,
        }
        .into());
    }
    let perm = generate_permutation(seed, geometry.tile_count());
    tiles::unscramble_pixels(img, &perm, &geometry)
}

fn scramble_failed(cause: TransformError) -> ScrambleError {
    error!(error = %cause, detail = ?cause, "scramble failed");
    ScrambleError::ScrambleFailed(cause)
}

fn unscramble_failed(cause: TransformError) -> ScrambleError {
    error!(error = %cause, detail = ?cause, "unscramble failed");
    ScrambleError::UnscrambleFailed(cause)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrambler() -> Scrambler {
        Scrambler::new(ScramblerConfig::new("test-key", "test-ctx-v1").unwrap().with_grid(4, 4).unwrap())
    }

    #[test]
    fn image_mime_detection() {
        assert!(is_image_mime("image/png"));
        assert!(is_image_mime(" IMAGE/JPEG"));
        assert!(!is_image_mime("video/mp4"));
        assert!(!is_image_mime("image"));
        assert!(!is_image_mime(""));
    }

    #[test]
    fn golden_seed_is_exposed_base64url() {
        let meta = ScrambleMetadata::scrambled(1, &[0u8; SALT_LEN], 4, 4);
        let seed = scrambler().recover_permutation_seed(Some(&meta)).unwrap();
        let raw = BASE64URL.decode(&seed.permutation_seed).unwrap();
        assert_eq!(
            hex::encode(raw),
            "87fa4ee2a9d78296aea2bb38878afdfaeb4c6f32670977dc4d2a078c266bdc69"
        );
        assert_eq!((seed.tile_rows, seed.tile_cols, seed.version), (4, 4, 1));
        assert!(!seed.permutation_seed.contains('='));
    }

    #[test]
    fn recovery_uses_stored_grid() {
        let meta = ScrambleMetadata::scrambled(1, &[0u8; SALT_LEN], 2, 3);
        assert_eq!(scrambler().recover_permutation(&meta).unwrap().len(), 6);
    }

    #[test]
    fn legacy_version_uses_its_own_context() {
        let cfg = ScramblerConfig::new("test-key", "test-ctx-v2")
            .unwrap()
            .with_version(2)
            .with_legacy_context(1, "test-ctx-v1");
        let meta = ScrambleMetadata::scrambled(1, &[0u8; SALT_LEN], 4, 4);
        assert_eq!(
            Scrambler::new(cfg).recover_permutation(&meta).unwrap(),
            vec![9, 6, 8, 1, 7, 15, 13, 14, 10, 2, 12, 0, 11, 4, 5, 3]
        );
    }

    #[test]
    fn unknown_version_falls_back_to_current_context() {
        let meta = ScrambleMetadata::scrambled(7, &[0u8; SALT_LEN], 4, 4);
        let s = scrambler();
        assert_eq!(s.config().version(), 1);
        assert_eq!(s.config().context_for_version(7), None);
        assert_eq!(
            s.recover_permutation(&meta).unwrap(),
            vec![9, 6, 8, 1, 7, 15, 13, 14, 10, 2, 12, 0, 11, 4, 5, 3]
        );
        assert_eq!(s.recover_permutation_seed(Some(&meta)).unwrap().version, 7);
    }

    #[test]
    fn scrambled_image_json_shape() {
        let out = ScrambledImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            width: 48,
            height: 32,
            metadata: ScrambleMetadata::scrambled(1, &[0u8; SALT_LEN], 4, 4),
        };
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["bytes"], "iVBORw==");
        assert_eq!(value["width"], 48);
        assert_eq!(value["height"], 32);
        assert_eq!(value["metadata"]["tileRows"], 4);
        assert_eq!(value["metadata"]["salt"], "AAAAAAAAAAAAAAAAAAAAAA");
        let back: ScrambledImage = serde_json::from_value(value).unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn recovery_requires_enabled_config() {
        let meta = ScrambleMetadata::scrambled(1, &[0u8; SALT_LEN], 4, 4);
        let err = Scrambler::new(ScramblerConfig::disabled())
            .recover_permutation_seed(Some(&meta))
            .unwrap_err();
        assert!(matches!(err, ScrambleError::Disabled));
    }

    #[test]
    fn absent_metadata() {
        let s = scrambler();
        assert!(matches!(
            s.recover_permutation_seed(None),
            Err(ScrambleError::Metadata(MetadataError::Absent))
        ));
        assert!(matches!(
            s.recover_permutation_seed_json(None),
            Err(ScrambleError::Metadata(MetadataError::Absent))
        ));
        assert!(matches!(
            s.recover_permutation_seed_json(Some("[1, 2")),
            Err(ScrambleError::Metadata(MetadataError::Malformed(_)))
        ));
    }
}
