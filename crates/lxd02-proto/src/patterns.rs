//! Built-in test patterns for print head diagnostics.
//!
//! Image patterns run through the regular pipeline; buffer patterns bypass
//! it and feed `Raster::enumerate` with pre-packed line pairs.

use image::{GrayImage, Luma};

const BLACK: Luma<u8> = Luma([0]);

pub type ImagePattern = fn(u32) -> GrayImage;
pub type BufferPattern = fn(u32) -> Vec<Vec<u8>>;

/// Look up an image pattern by name.
pub fn image_pattern(name: &str) -> Option<ImagePattern> {
    match name {
        "RunningLinesImage" => Some(running_lines),
        "Millimetres" => Some(millimetres),
        "Sine" => Some(sine),
        _ => None,
    }
}

/// Look up a buffer pattern by name.
pub fn buffer_pattern(name: &str) -> Option<BufferPattern> {
    match name {
        "BinaryPattern" => Some(binary_pattern),
        _ => None,
    }
}

/// All pattern names, sorted.
pub fn all_patterns() -> Vec<&'static str> {
    vec!["BinaryPattern", "Millimetres", "RunningLinesImage", "Sine"]
}

/// Eight lines, each two pixels high, shifting one pixel to the right per
/// line so the thermal unit strobes on alternating columns.
fn running_lines(width: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, 16, Luma([255]));
    for y in 0..8 {
        for x in 0..width {
            if (x + y) % 2 == 0 {
                img.put_pixel(x, y * 2, BLACK);
                img.put_pixel(x, y * 2 + 1, BLACK);
            }
        }
    }
    img
}

/// Ruler pattern: 8-dot ticks repeated every 40 dots, one row per tick
/// offset.
fn millimetres(width: u32) -> GrayImage {
    let height = 384 / 8;
    let mut img = GrayImage::from_pixel(width, height, Luma([255]));
    for y in 0..height {
        let mut x = y * 8;
        while x < width {
            for x1 in x..(x + 8).min(width) {
                img.put_pixel(x1, y, BLACK);
            }
            x += 40;
        }
    }
    img
}

/// One-pixel sine wave, amplitude 30, period 100 dots.
fn sine(width: u32) -> GrayImage {
    let height = 64;
    let mut img = GrayImage::from_pixel(width, height, Luma([255]));
    for x in 0..width {
        let y = 32.0 + 30.0 * (f64::from(x) * 2.0 * std::f64::consts::PI / 100.0).sin();
        let y = y as i64;
        if (0..i64::from(height)).contains(&y) {
            img.put_pixel(x, y as u32, BLACK);
        }
    }
    img
}

/// 256 line pairs, pair `i` filled with the byte value `i`.
fn binary_pattern(width: u32) -> Vec<Vec<u8>> {
    // One blob carries two packed lines: width / 8 * 2 bytes.
    let pair_bytes = (width / 4) as usize;
    (0..=255u8).map(|v| vec![v; pair_bytes]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_all_names() {
        for name in all_patterns() {
            assert!(
                image_pattern(name).is_some() || buffer_pattern(name).is_some(),
                "{name} not resolvable"
            );
        }
        assert!(image_pattern("NoSuchPattern").is_none());
        assert!(buffer_pattern("NoSuchPattern").is_none());
    }

    #[test]
    fn test_image_patterns_fit_width() {
        for name in ["RunningLinesImage", "Millimetres", "Sine"] {
            let img = image_pattern(name).unwrap()(384);
            assert_eq!(img.width(), 384, "{name}");
            assert!(img.height() > 0, "{name}");
            assert!(img.pixels().any(|p| p.0[0] == 0), "{name} is blank");
        }
    }

    #[test]
    fn test_running_lines_alternate() {
        let img = running_lines(384);
        // Row pair 0: even columns black; row pair 1 shifts by one.
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(1, 0).0[0], 255);
        assert_eq!(img.get_pixel(0, 2).0[0], 255);
        assert_eq!(img.get_pixel(1, 2).0[0], 0);
        // Both rows of a pair match.
        assert_eq!(img.get_pixel(0, 1).0[0], 0);
    }

    #[test]
    fn test_binary_pattern_blobs() {
        let data = binary_pattern(384);
        assert_eq!(data.len(), 256);
        for (i, blob) in data.iter().enumerate() {
            assert_eq!(blob.len(), 96);
            assert!(blob.iter().all(|&b| b == i as u8));
        }
    }
}
