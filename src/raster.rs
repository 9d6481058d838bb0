// Raster decode/encode. Input in any enabled format; output is always RGBA8 PNG
// so tile pixels survive the permutation unchanged.

use image::codecs::png::PngEncoder;
use image::imageops;
use image::metadata::Orientation;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader, RgbaImage};
use std::io::Cursor;

use crate::error::TransformError;

/// Decode `bytes`, applying EXIF orientation so tiles are cut from the upright
/// image.
pub fn decode_with_orientation(bytes: &[u8]) -> Result<RgbaImage, TransformError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let mut decoder = reader.into_decoder().map_err(TransformError::Decode)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(TransformError::Decode)?;
    img.apply_orientation(orientation);
    Ok(img.to_rgba8())
}

/// Crop to `width x height` anchored at the origin. Returns the image as-is
/// when it already has that size.
pub fn crop_to(img: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.width() == width && img.height() == height {
        return img;
    }
    imageops::crop_imm(&img, 0, 0, width, height).to_image()
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, TransformError> {
    let mut out = Cursor::new(Vec::new());
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(TransformError::Encode)?;
    Ok(out.into_inner())
}
