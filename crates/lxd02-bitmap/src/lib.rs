//! Image pipeline for 1-bpp thermal printer output.
//!
//! Turns an arbitrary raster into a two-colour image at the printer's exact
//! line width: fit to width (never upscaling), then either dither or, for
//! images that read as text documents, plain threshold conversion.

mod classify;
mod dither;
mod resize;

pub use classify::is_document;
pub use dither::{adjust_gamma, threshold_convert, Dither};
pub use resize::{crop_to_width, resize_to_fit};

use image::{DynamicImage, GrayImage, Luma};

/// Default threshold for dark pixels.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Sentinel gamma value meaning "use the default for the selected dither".
pub const DEFAULT_GAMMA: f64 = 0.0;

/// Pipeline configuration for one print job.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub dither: Dither,
    /// Gamma correction; [`DEFAULT_GAMMA`] selects the algorithm default.
    pub gamma: f64,
    /// Crop wider-than-paper input to width instead of scaling it down.
    pub crop: bool,
    /// Skip dithering when the input classifies as a document.
    pub auto_dither: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            dither: Dither::FloydSteinberg,
            gamma: DEFAULT_GAMMA,
            crop: false,
            auto_dither: false,
        }
    }
}

/// Full pipeline: fit the image to `width` pixels and reduce it to two
/// colours (0x00 = black, 0xFF = white).
pub fn resize_and_dither(img: &DynamicImage, width: u32, opts: &PipelineOptions) -> GrayImage {
    let gray = to_grayscale(img);
    let fitted = if opts.crop && gray.width() > width {
        crop_to_width(&gray, width)
    } else {
        resize_to_fit(&gray, width)
    };
    if opts.auto_dither && is_document(&fitted, 0, 0) {
        log::debug!("document detected, skipping dither");
        return threshold_convert(&fitted, DEFAULT_THRESHOLD);
    }
    opts.dither.apply(&fitted, opts.gamma)
}

/// Convert to 8-bit grey using the rec. 601 weights the printer firmware
/// assumes: grey = (299·R + 587·G + 114·B) / 1000. Images that are
/// already greyscale pass through unchanged.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }
    let rgb = img.to_rgb8();
    let mut out = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, px) in rgb.enumerate_pixels() {
        let [r, g, b] = px.0;
        let grey = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000;
        out.put_pixel(x, y, Luma([grey as u8]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_to_grayscale_weights() {
        let mut rgb = image::RgbImage::new(3, 1);
        rgb.put_pixel(0, 0, Rgb([255, 0, 0]));
        rgb.put_pixel(1, 0, Rgb([0, 255, 0]));
        rgb.put_pixel(2, 0, Rgb([0, 0, 255]));
        let gray = to_grayscale(&DynamicImage::ImageRgb8(rgb));

        assert_eq!(gray.get_pixel(0, 0).0[0], (299 * 255 / 1000) as u8);
        assert_eq!(gray.get_pixel(1, 0).0[0], (587 * 255 / 1000) as u8);
        assert_eq!(gray.get_pixel(2, 0).0[0], (114 * 255 / 1000) as u8);
    }

    #[test]
    fn test_to_grayscale_passthrough() {
        let gray = GrayImage::from_pixel(4, 4, Luma([77]));
        let out = to_grayscale(&DynamicImage::ImageLuma8(gray.clone()));
        assert_eq!(out, gray);
    }

    #[test]
    fn test_pipeline_output_is_binary() {
        let mut gray = GrayImage::new(400, 10);
        for (x, y, px) in gray.enumerate_pixels_mut() {
            px.0[0] = ((x + y) % 256) as u8;
        }
        let opts = PipelineOptions::default();
        let out = resize_and_dither(&DynamicImage::ImageLuma8(gray), 384, &opts);

        assert_eq!(out.width(), 384);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_pipeline_crop() {
        let gray = GrayImage::from_pixel(500, 20, Luma([0]));
        let opts = PipelineOptions {
            crop: true,
            ..Default::default()
        };
        let out = resize_and_dither(&DynamicImage::ImageLuma8(gray), 384, &opts);

        // Cropped, not scaled: height is unchanged.
        assert_eq!(out.dimensions(), (384, 20));
    }

    #[test]
    fn test_pipeline_auto_dither_document() {
        // Near-bimodal input classifies as a document and is thresholded.
        let mut gray = GrayImage::from_pixel(384, 10, Luma([255]));
        for x in 0..384 {
            gray.put_pixel(x, 0, Luma([10]));
        }
        let opts = PipelineOptions {
            auto_dither: true,
            ..Default::default()
        };
        let out = resize_and_dither(&DynamicImage::ImageLuma8(gray), 384, &opts);

        for x in 0..384 {
            assert_eq!(out.get_pixel(x, 0).0[0], 0);
            assert_eq!(out.get_pixel(x, 5).0[0], 255);
        }
    }
}
