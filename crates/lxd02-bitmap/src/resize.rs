//! Fitting images to the fixed print width.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

/// Fit an image to `target_width` pixels.
///
/// Narrow input is never upscaled: it is painted at the origin of a white
/// canvas at its native height. Wider input is scaled down proportionally
/// with a Catmull-Rom filter.
pub fn resize_to_fit(img: &GrayImage, target_width: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width <= target_width {
        let mut canvas = GrayImage::from_pixel(target_width, height, Luma([255]));
        imageops::replace(&mut canvas, img, 0, 0);
        return canvas;
    }

    let target_height = ((u64::from(height) * u64::from(target_width) + u64::from(width) / 2)
        / u64::from(width)) as u32;
    let target_height = target_height.max(1);
    log::debug!("resizing {width}x{height} to {target_width}x{target_height}");
    imageops::resize(img, target_width, target_height, FilterType::CatmullRom)
}

/// Crop wider-than-paper input to `width` pixels, anchored at the origin.
pub fn crop_to_width(img: &GrayImage, width: u32) -> GrayImage {
    imageops::crop_imm(img, 0, 0, width.min(img.width()), img.height()).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_input_is_not_upscaled() {
        let img = GrayImage::from_pixel(100, 40, Luma([0]));
        let out = resize_to_fit(&img, 384);

        assert_eq!(out.dimensions(), (384, 40));
        // Original pixels at the origin, white padding past them.
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(99, 39).0[0], 0);
        assert_eq!(out.get_pixel(100, 0).0[0], 255);
        assert_eq!(out.get_pixel(383, 39).0[0], 255);
    }

    #[test]
    fn test_exact_width_keeps_height() {
        let img = GrayImage::from_pixel(384, 17, Luma([0]));
        let out = resize_to_fit(&img, 384);
        assert_eq!(out.dimensions(), (384, 17));
    }

    #[test]
    fn test_wide_input_scales_proportionally() {
        let img = GrayImage::from_pixel(768, 100, Luma([128]));
        let out = resize_to_fit(&img, 384);
        assert_eq!(out.dimensions(), (384, 50));
    }

    #[test]
    fn test_wide_input_height_rounds() {
        // 384 * 99 / 768 = 49.5, rounds to 50
        let img = GrayImage::from_pixel(768, 99, Luma([128]));
        let out = resize_to_fit(&img, 384);
        assert_eq!(out.height(), 50);
    }

    #[test]
    fn test_crop_to_width() {
        let mut img = GrayImage::from_pixel(500, 10, Luma([255]));
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(383, 9, Luma([0]));
        let out = crop_to_width(&img, 384);

        assert_eq!(out.dimensions(), (384, 10));
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(383, 9).0[0], 0);
    }

    #[test]
    fn test_crop_narrower_than_requested() {
        let img = GrayImage::from_pixel(100, 10, Luma([255]));
        let out = crop_to_width(&img, 384);
        assert_eq!(out.dimensions(), (100, 10));
    }
}
