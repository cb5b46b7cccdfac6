//! Document-vs-photo classification over a grey histogram.

use image::GrayImage;

const DEFAULT_DARK_THRESHOLD: u8 = 50;
const DEFAULT_LIGHT_THRESHOLD: u8 = 200;

/// Fraction of extreme pixels above which an image counts as a document.
const DOCUMENT_RATIO: f64 = 0.85;

/// Returns true when the image reads as a text document: the bulk of its
/// pixels sit at the dark and light ends of the histogram. Threshold
/// arguments of 0 select the defaults (dark 50, light 200).
pub fn is_document(img: &GrayImage, dark_threshold: u8, light_threshold: u8) -> bool {
    let dark = if dark_threshold == 0 {
        DEFAULT_DARK_THRESHOLD
    } else {
        dark_threshold
    };
    let light = if light_threshold == 0 {
        DEFAULT_LIGHT_THRESHOLD
    } else {
        light_threshold
    };

    let mut histogram = [0u64; 256];
    for px in img.pixels() {
        histogram[px.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return false;
    }
    let dark_count: u64 = histogram[..dark as usize].iter().sum();
    let light_count: u64 = histogram[light as usize..].iter().sum();

    (dark_count + light_count) as f64 / total as f64 > DOCUMENT_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_black_on_white_is_document() {
        let mut img = GrayImage::from_pixel(100, 100, Luma([255]));
        for x in 0..100 {
            for y in 0..10 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        assert!(is_document(&img, 0, 0));
    }

    #[test]
    fn test_midtone_image_is_not_document() {
        let img = GrayImage::from_pixel(100, 100, Luma([128]));
        assert!(!is_document(&img, 0, 0));
    }

    #[test]
    fn test_gradient_is_not_document() {
        let mut img = GrayImage::new(256, 1);
        for x in 0..256 {
            img.put_pixel(x, 0, Luma([x as u8]));
        }
        assert!(!is_document(&img, 0, 0));
    }

    #[test]
    fn test_empty_image_is_not_document() {
        let img = GrayImage::new(0, 0);
        assert!(!is_document(&img, 0, 0));
    }

    #[test]
    fn test_custom_thresholds() {
        // 90% of pixels at 100: a document only if the dark cutoff is
        // raised past it.
        let mut img = GrayImage::from_pixel(100, 10, Luma([100]));
        for x in 0..100 {
            img.put_pixel(x, 0, Luma([255]));
        }
        assert!(!is_document(&img, 0, 0));
        assert!(is_document(&img, 101, 0));
    }
}
