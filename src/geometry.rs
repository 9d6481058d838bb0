use crate::error::GeometryError;

/// Tile boundaries for an image cut into a `rows x cols` grid. Remainder
/// pixels on the right and bottom are cropped, never scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub rows: u32,
    pub cols: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub effective_width: u32,
    pub effective_height: u32,
}

impl TileGeometry {
    pub fn compute(width: u32, height: u32, rows: u32, cols: u32) -> Result<Self, GeometryError> {
        if width == 0 || height == 0 {
            return Err(GeometryError::ZeroDimension { width, height });
        }
        if rows == 0 || cols == 0 {
            return Err(GeometryError::EmptyGrid { rows, cols });
        }
        let tile_width = width / cols;
        let tile_height = height / rows;
        if tile_width == 0 || tile_height == 0 {
            return Err(GeometryError::GridTooFine {
                width,
                height,
                rows,
                cols,
            });
        }
        Ok(Self {
            rows,
            cols,
            tile_width,
            tile_height,
            effective_width: tile_width * cols,
            effective_height: tile_height * rows,
        })
    }

    pub fn tile_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Top-left pixel of the tile at linear index `index` (row-major).
    pub fn tile_origin(&self, index: usize) -> (u32, u32) {
        let cols = self.cols as usize;
        let row = (index / cols) as u32;
        let col = (index % cols) as u32;
        (col * self.tile_width, row * self.tile_height)
    }

    /// True if the image already has the cropped size this grid produces.
    pub fn is_exact(&self, width: u32, height: u32) -> bool {
        self.effective_width == width && self.effective_height == height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn divisible_dimensions() {
        let g = TileGeometry::compute(1024, 768, 4, 4).unwrap();
        assert_eq!((g.tile_width, g.tile_height), (256, 192));
        assert_eq!((g.effective_width, g.effective_height), (1024, 768));
        assert_eq!(g.tile_count(), 16);
        assert!(g.is_exact(1024, 768));
    }

    #[test]
    fn remainder_is_cropped() {
        let g = TileGeometry::compute(103, 50, 3, 10).unwrap();
        assert_eq!((g.tile_width, g.tile_height), (10, 16));
        assert_eq!((g.effective_width, g.effective_height), (100, 48));
        assert!(!g.is_exact(103, 50));
    }

    #[test]
    fn tile_origins_are_row_major() {
        let g = TileGeometry::compute(40, 30, 3, 4).unwrap();
        assert_eq!(g.tile_origin(0), (0, 0));
        assert_eq!(g.tile_origin(3), (30, 0));
        assert_eq!(g.tile_origin(4), (0, 10));
        assert_eq!(g.tile_origin(11), (30, 20));
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert_eq!(
            TileGeometry::compute(0, 10, 1, 1),
            Err(GeometryError::ZeroDimension { width: 0, height: 10 })
        );
        assert!(matches!(
            TileGeometry::compute(10, 0, 1, 1),
            Err(GeometryError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn grid_finer_than_image_rejected() {
        assert_eq!(
            TileGeometry::compute(3, 100, 2, 4),
            Err(GeometryError::GridTooFine {
                width: 3,
                height: 100,
                rows: 2,
                cols: 4
            })
        );
        assert!(matches!(
            TileGeometry::compute(100, 3, 4, 2),
            Err(GeometryError::GridTooFine { .. })
        ));
    }

    #[test]
    fn empty_grid_rejected() {
        assert!(matches!(
            TileGeometry::compute(10, 10, 0, 2),
            Err(GeometryError::EmptyGrid { .. })
        ));
    }

    proptest! {
        #[test]
        fn effective_area_fits_inside_image(w in 1u32..4000, h in 1u32..4000, rows in 1u32..40, cols in 1u32..40) {
            match TileGeometry::compute(w, h, rows, cols) {
                Ok(g) => {
                    prop_assert!(g.effective_width <= w && g.effective_height <= h);
                    prop_assert!(w - g.effective_width < cols);
                    prop_assert!(h - g.effective_height < rows);
                }
                Err(e) => {
                    prop_assert!(w < cols || h < rows, "unexpected {:?}", e);
                }
            }
        }
    }
}
