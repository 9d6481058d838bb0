//! Tile extraction and compositing.
//!
//! Both directions are the same operation with a different mapping: scrambling
//! places source tile `i` at slot `P[i]`, unscrambling places scrambled slot
//! `d` at `P⁻¹[d]`. Every destination rectangle is written exactly once.

use image::{imageops, RgbaImage};
use tracing::debug;

use crate::error::TransformError;
use crate::geometry::TileGeometry;
use crate::permutation::invert;

fn extract_one(canvas: &RgbaImage, geometry: &TileGeometry, index: usize) -> RgbaImage {
    let (x, y) = geometry.tile_origin(index);
    imageops::crop_imm(canvas, x, y, geometry.tile_width, geometry.tile_height).to_image()
}

/// Cut `canvas` into tiles in row-major order. `canvas` must already have the
/// effective (cropped) size.
#[cfg(not(feature = "parallel"))]
pub fn extract_tiles(canvas: &RgbaImage, geometry: &TileGeometry) -> Vec<RgbaImage> {
    (0..geometry.tile_count())
        .map(|i| extract_one(canvas, geometry, i))
        .collect()
}

/// Cut `canvas` into tiles in row-major order. `canvas` must already have the
/// effective (cropped) size.
#[cfg(feature = "parallel")]
pub fn extract_tiles(canvas: &RgbaImage, geometry: &TileGeometry) -> Vec<RgbaImage> {
    use rayon::prelude::*;
    (0..geometry.tile_count())
        .into_par_iter()
        .map(|i| extract_one(canvas, geometry, i))
        .collect()
}

/// Place `tiles[i]` at slot `mapping[i]` on a transparent canvas.
pub fn composite(
    tiles: &[RgbaImage],
    mapping: &[usize],
    geometry: &TileGeometry,
) -> Result<RgbaImage, TransformError> {
    let expected = geometry.tile_count();
    if tiles.len() != expected || mapping.len() != expected {
        return Err(TransformError::TileCount {
            expected,
            actual: mapping.len().min(tiles.len()),
        });
    }
    let mut canvas = RgbaImage::new(geometry.effective_width, geometry.effective_height);
    for (tile, &dst) in tiles.iter().zip(mapping) {
        let (x, y) = geometry.tile_origin(dst);
        imageops::replace(&mut canvas, tile, i64::from(x), i64::from(y));
    }
    Ok(canvas)
}

/// Forward transform of an already-cropped canvas.
pub fn scramble_pixels(
    canvas: &RgbaImage,
    perm: &[usize],
    geometry: &TileGeometry,
) -> Result<RgbaImage, TransformError> {
    debug!(
        tiles = perm.len(),
        tile_width = geometry.tile_width,
        tile_height = geometry.tile_height,
        "compositing scrambled tiles"
    );
    let tiles = extract_tiles(canvas, geometry);
    composite(&tiles, perm, geometry)
}

/// Inverse transform: the tile found at slot `d` goes back to `P⁻¹[d]`.
pub fn unscramble_pixels(
    canvas: &RgbaImage,
    perm: &[usize],
    geometry: &TileGeometry,
) -> Result<RgbaImage, TransformError> {
    debug!(tiles = perm.len(), "compositing restored tiles");
    let tiles = extract_tiles(canvas, geometry);
    composite(&tiles, &invert(perm), geometry)
}
