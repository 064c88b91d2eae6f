use crate::codec::RasterBuffer;
use image::Rgba;

/// Integer 3x3 convolution kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel3x3 {
    pub weights: [[i32; 3]; 3],
    pub divisor: i32,
}

pub const SHARPEN_KERNEL: Kernel3x3 = Kernel3x3 {
    weights: [[0, -1, 0], [-1, 5, -1], [0, -1, 0]],
    divisor: 1,
};

pub const NOISE_REDUCTION_KERNEL: Kernel3x3 = Kernel3x3 {
    weights: [[1, 2, 1], [2, 4, 2], [1, 2, 1]],
    divisor: 16,
};

/// Convolve the RGB channels of every interior pixel.
///
/// Border pixels and the alpha channel are copied unchanged; results are
/// clamped to `0..=255`. Rasters narrower or shorter than 3 pixels are returned as is.
pub fn convolve(raster: &RasterBuffer, kernel: &Kernel3x3) -> RasterBuffer {
    let (width, height) = raster.dimensions();
    let mut output = raster.clone();

    if width < 3 || height < 3 || kernel.divisor == 0 {
        return output;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sums = [0i32; 3];

            for (ky, row) in kernel.weights.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    if weight == 0 {
                        continue;
                    }
                    let pixel = raster.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for (sum, &channel) in sums.iter_mut().zip(pixel.0.iter()) {
                        *sum += channel as i32 * weight;
                    }
                }
            }

            let alpha = raster.get_pixel(x, y).0[3];
            let [r, g, b] = sums.map(|s| (s / kernel.divisor).clamp(0, 255) as u8);
            output.put_pixel(x, y, Rgba([r, g, b, alpha]));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_uniform_image_is_unchanged() {
        let raster = RgbaImage::from_pixel(6, 5, Rgba([90, 140, 200, 255]));
        assert_eq!(convolve(&raster, &SHARPEN_KERNEL), raster);
        assert_eq!(convolve(&raster, &NOISE_REDUCTION_KERNEL), raster);
    }

    #[test]
    fn test_sharpen_clamps_and_keeps_alpha() {
        let mut raster = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        raster.put_pixel(1, 1, Rgba([200, 10, 0, 77]));

        let out = convolve(&raster, &SHARPEN_KERNEL);
        assert_eq!(out.get_pixel(1, 1), &Rgba([255, 50, 0, 77]));
    }

    #[test]
    fn test_sharpen_clamps_negative_to_zero() {
        let mut raster = RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 255]));
        raster.put_pixel(1, 1, Rgba([10, 10, 10, 255]));

        let out = convolve(&raster, &SHARPEN_KERNEL);
        assert_eq!(out.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_noise_reduction_spreads_bright_pixel() {
        let mut raster = RgbaImage::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
        raster.put_pixel(2, 2, Rgba([160, 160, 160, 255]));

        let out = convolve(&raster, &NOISE_REDUCTION_KERNEL);
        assert_eq!(out.get_pixel(2, 2).0[0], 40); // 160 * 4 / 16
        assert_eq!(out.get_pixel(1, 2).0[0], 20); // 160 * 2 / 16
        assert_eq!(out.get_pixel(1, 1).0[0], 10); // 160 * 1 / 16
    }

    #[test]
    fn test_borders_untouched() {
        let raster = RgbaImage::from_fn(5, 4, |x, y| Rgba([(x * 50) as u8, (y * 60) as u8, 0, 255]));
        let out = convolve(&raster, &SHARPEN_KERNEL);
        for x in 0..5 {
            assert_eq!(out.get_pixel(x, 0), raster.get_pixel(x, 0));
            assert_eq!(out.get_pixel(x, 3), raster.get_pixel(x, 3));
        }
        for y in 0..4 {
            assert_eq!(out.get_pixel(0, y), raster.get_pixel(0, y));
            assert_eq!(out.get_pixel(4, y), raster.get_pixel(4, y));
        }
    }

    #[test]
    fn test_tiny_raster_returned_as_is() {
        let raster = RgbaImage::from_pixel(2, 10, Rgba([1, 2, 3, 4]));
        assert_eq!(convolve(&raster, &NOISE_REDUCTION_KERNEL), raster);
    }
}
