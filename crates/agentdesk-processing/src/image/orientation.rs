use crate::codec::RasterBuffer;
use image::imageops;

/// Image orientation operations (rotation and flipping)
pub struct ImageOrientation;

impl ImageOrientation {
    /// Get rotation and flip operations needed for a given EXIF orientation.
    /// Returns (clockwise rotation, flip_horizontal, flip_vertical); rotation is applied first.
    pub fn transforms(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            1 => (None, false, false),      // Normal
            2 => (None, true, false),       // Mirror horizontal
            3 => (Some(180), false, false), // Rotate 180
            4 => (None, false, true),       // Mirror vertical
            5 => (Some(90), true, false),   // Transpose
            6 => (Some(90), false, false),  // Rotate 90 CW
            7 => (Some(270), true, false),  // Transverse
            8 => (Some(270), false, false), // Rotate 270 CW
            _ => (None, false, false),      // Invalid, treat as normal
        }
    }

    /// Rotate and flip a raster so it displays upright without the orientation tag.
    pub fn apply(raster: RasterBuffer, orientation: u8) -> RasterBuffer {
        let (rotate, flip_h, flip_v) = Self::transforms(orientation);

        tracing::debug!(
            orientation = orientation,
            rotate = ?rotate,
            flip_horizontal = flip_h,
            flip_vertical = flip_v,
            "Applying EXIF orientation"
        );

        let mut raster = match rotate {
            Some(90) => imageops::rotate90(&raster),
            Some(180) => imageops::rotate180(&raster),
            Some(270) => imageops::rotate270(&raster),
            _ => raster,
        };

        if flip_h {
            raster = imageops::flip_horizontal(&raster);
        }
        if flip_v {
            raster = imageops::flip_vertical(&raster);
        }

        raster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const MARK: Rgba<u8> = Rgba([255, 0, 0, 255]);

    /// 3x2 raster with a single marked pixel at (0, 0).
    fn marked() -> RasterBuffer {
        let mut raster = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255]));
        raster.put_pixel(0, 0, MARK);
        raster
    }

    fn mark_position(raster: &RasterBuffer) -> (u32, u32) {
        raster
            .enumerate_pixels()
            .find(|(_, _, p)| **p == MARK)
            .map(|(x, y, _)| (x, y))
            .unwrap()
    }

    #[test]
    fn test_normal_orientation_is_identity() {
        let raster = marked();
        assert_eq!(ImageOrientation::apply(raster.clone(), 1), raster);
        assert_eq!(ImageOrientation::apply(raster.clone(), 0), raster);
    }

    #[test]
    fn test_quarter_turns_swap_dimensions() {
        for orientation in [5u8, 6, 7, 8] {
            let out = ImageOrientation::apply(marked(), orientation);
            assert_eq!(out.dimensions(), (2, 3), "orientation {}", orientation);
        }
        for orientation in [2u8, 3, 4] {
            let out = ImageOrientation::apply(marked(), orientation);
            assert_eq!(out.dimensions(), (3, 2), "orientation {}", orientation);
        }
    }

    #[test]
    fn test_marked_pixel_lands_in_expected_corner() {
        // Stored top-left pixel ends up where the viewer expects it
        assert_eq!(mark_position(&ImageOrientation::apply(marked(), 2)), (2, 0));
        assert_eq!(mark_position(&ImageOrientation::apply(marked(), 3)), (2, 1));
        assert_eq!(mark_position(&ImageOrientation::apply(marked(), 4)), (0, 1));
        assert_eq!(mark_position(&ImageOrientation::apply(marked(), 5)), (0, 0));
        assert_eq!(mark_position(&ImageOrientation::apply(marked(), 6)), (1, 0));
        assert_eq!(mark_position(&ImageOrientation::apply(marked(), 7)), (1, 2));
        assert_eq!(mark_position(&ImageOrientation::apply(marked(), 8)), (0, 2));
    }
}
