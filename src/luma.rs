use std::path::Path;

use image::DynamicImage;
use imgref::ImgVec;

use crate::Error;

/// BT.709 luma coefficients.
const KR: f32 = 0.2126;
const KG: f32 = 0.7152;
const KB: f32 = 0.0722;

/// Decode an image file and extract its luma plane.
pub fn load_luma(path: &Path) -> Result<ImgVec<f32>, Error> {
    let img = image::open(path)?;
    Ok(to_luma(&img))
}

/// Convert a decoded image to a floating-point luma plane in `[0, 1]`.
///
/// RGB input is converted with BT.709 coefficients, grayscale input is used
/// as is. Alpha is dropped.
pub fn to_luma(img: &DynamicImage) -> ImgVec<f32> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let buf = if img.color().has_color() {
        img.to_rgb32f()
            .into_raw()
            .chunks_exact(3)
            .map(|px| KR * px[0] + KG * px[1] + KB * px[2])
            .collect()
    } else {
        img.to_luma32f().into_raw()
    };
    ImgVec::new(buf, width, height)
}

/// Width for `height` at aspect ratio `ar`, rounded down to an even number.
///
/// Rounding is half-to-even before the even truncation.
pub fn target_width(ar: f64, height: usize) -> usize {
    let w = (height as f64 * ar).round_ties_even();
    let w = if w.is_finite() && w > 0.0 { w as usize } else { 0 };
    w / 2 * 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn rgb_uses_bt709() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        let luma = to_luma(&DynamicImage::ImageRgb8(img));
        assert_eq!((luma.width(), luma.height()), (2, 1));
        assert!((luma.buf()[0] - KR).abs() < 1e-6);
        assert!((luma.buf()[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn gray_passes_through() {
        let img = GrayImage::from_pixel(3, 2, Luma([51]));
        let luma = to_luma(&DynamicImage::ImageLuma8(img));
        assert_eq!((luma.width(), luma.height()), (3, 2));
        for &v in luma.buf() {
            assert!((v - 0.2).abs() < 1e-6, "{v}");
        }
    }

    #[test]
    fn target_width_is_even() {
        assert_eq!(target_width(16.0 / 9.0, 720), 1280);
        assert_eq!(target_width(16.0 / 9.0, 1080), 1920);
        // 873 * 16/9 = 1552
        assert_eq!(target_width(16.0 / 9.0, 873), 1552);
        // 60 * 16/9 = 106.67 -> 107 -> 106
        assert_eq!(target_width(16.0 / 9.0, 60), 106);
    }

    #[test]
    fn target_width_rounds_half_to_even() {
        // 171 * 0.5 = 85.5 -> 86
        assert_eq!(target_width(0.5, 171), 86);
        // 169 * 0.5 = 84.5 -> 84
        assert_eq!(target_width(0.5, 169), 84);
    }
}
