//! Dither algorithms reducing 8-bit grey to two colours.
//!
//! Each algorithm runs on a gamma-adjusted copy of the input; the per
//! algorithm default gamma compensates for thermal dot spread, where
//! mid-tones print much darker than they render on screen.

use image::{GrayImage, Luma};

use crate::DEFAULT_THRESHOLD;

/// Error diffusion kernel: (dx, dy, weight) taps over a common divisor.
struct Kernel {
    taps: &'static [(i32, i32, i32)],
    div: i32,
}

const FLOYD_STEINBERG: Kernel = Kernel {
    taps: &[(1, 0, 7), (-1, 1, 3), (0, 1, 5), (1, 1, 1)],
    div: 16,
};

const ATKINSON: Kernel = Kernel {
    taps: &[(1, 0, 1), (2, 0, 1), (-1, 1, 1), (0, 1, 1), (1, 1, 1), (0, 2, 1)],
    div: 8,
};

const STUCKI: Kernel = Kernel {
    taps: &[
        (1, 0, 8),
        (2, 0, 4),
        (-2, 1, 2),
        (-1, 1, 4),
        (0, 1, 8),
        (1, 1, 4),
        (2, 1, 2),
        (-2, 2, 1),
        (-1, 2, 2),
        (0, 2, 4),
        (1, 2, 2),
        (2, 2, 1),
    ],
    div: 42,
};

/// 8x8 Bayer ordered dither matrix, levels 0..64.
const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Supported dither algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dither {
    FloydSteinberg,
    Atkinson,
    Stucki,
    Bayer,
    NoDither,
}

impl Dither {
    const ALL: [Dither; 5] = [
        Dither::Atkinson,
        Dither::Bayer,
        Dither::FloydSteinberg,
        Dither::NoDither,
        Dither::Stucki,
    ];

    /// Look up an algorithm by its configuration name. An empty name
    /// selects the default.
    pub fn by_name(name: &str) -> Option<Dither> {
        match name {
            "" | "floyd-steinberg" => Some(Dither::FloydSteinberg),
            "atkinson" => Some(Dither::Atkinson),
            "stucki" => Some(Dither::Stucki),
            "bayer" => Some(Dither::Bayer),
            "no-dither" => Some(Dither::NoDither),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dither::FloydSteinberg => "floyd-steinberg",
            Dither::Atkinson => "atkinson",
            Dither::Stucki => "stucki",
            Dither::Bayer => "bayer",
            Dither::NoDither => "no-dither",
        }
    }

    /// All algorithm names, sorted.
    pub fn all_names() -> Vec<&'static str> {
        Self::ALL.iter().map(Dither::name).collect()
    }

    fn default_gamma(&self) -> f64 {
        match self {
            Dither::FloydSteinberg => 1.5,
            Dither::Atkinson => 3.0,
            Dither::Stucki => 3.5,
            Dither::Bayer => 3.5,
            Dither::NoDither => 1.0,
        }
    }

    /// Reduce `img` to black and white. A `gamma` of 0.0 selects the
    /// algorithm default; values above zero override it.
    pub fn apply(&self, img: &GrayImage, gamma: f64) -> GrayImage {
        if *self == Dither::NoDither {
            return threshold_convert(img, DEFAULT_THRESHOLD);
        }
        let gamma = if gamma > 0.0 {
            gamma
        } else {
            self.default_gamma()
        };
        let adjusted = adjust_gamma(img, gamma);
        match self {
            Dither::FloydSteinberg => diffuse(&adjusted, &FLOYD_STEINBERG),
            Dither::Atkinson => diffuse(&adjusted, &ATKINSON),
            Dither::Stucki => diffuse(&adjusted, &STUCKI),
            Dither::Bayer => ordered(&adjusted, &BAYER8),
            Dither::NoDither => unreachable!(),
        }
    }
}

/// Gamma-adjust via a 256-entry LUT: out = in^(1/gamma). Gamma above 1.0
/// lightens mid-tones.
pub fn adjust_gamma(img: &GrayImage, gamma: f64) -> GrayImage {
    let inv = 1.0 / gamma;
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = ((i as f64 / 255.0).powf(inv) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, px) in img.enumerate_pixels() {
        out.put_pixel(x, y, Luma([lut[px.0[0] as usize]]));
    }
    out
}

/// Black where grey is below `threshold`, white elsewhere.
pub fn threshold_convert(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, px) in img.enumerate_pixels() {
        let v = if px.0[0] < threshold { 0 } else { 255 };
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

fn diffuse(img: &GrayImage, kernel: &Kernel) -> GrayImage {
    let (width, height) = img.dimensions();
    let (w, h) = (width as i32, height as i32);
    let mut buffer: Vec<i32> = img.pixels().map(|p| i32::from(p.0[0])).collect();
    let mut out = GrayImage::new(width, height);

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let old = buffer[idx];
            let new = if old >= i32::from(DEFAULT_THRESHOLD) {
                255
            } else {
                0
            };
            let error = old - new;
            buffer[idx] = new;
            out.put_pixel(x as u32, y as u32, Luma([new as u8]));

            for &(dx, dy, weight) in kernel.taps {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || nx >= w || ny >= h {
                    continue;
                }
                buffer[(ny * w + nx) as usize] += error * weight / kernel.div;
            }
        }
    }
    out
}

fn ordered(img: &GrayImage, matrix: &[[u8; 8]; 8]) -> GrayImage {
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, px) in img.enumerate_pixels() {
        let level = matrix[(y % 8) as usize][(x % 8) as usize];
        let threshold = ((2 * u16::from(level) + 1) * 255 / 128) as u8;
        let v = if px.0[0] > threshold { 255 } else { 0 };
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for (x, y, px) in img.enumerate_pixels_mut() {
            px.0[0] = ((x + y) * 255 / (width + height - 2)) as u8;
        }
        img
    }

    #[test]
    fn test_every_dither_is_two_colour() {
        let img = gradient(64, 64);
        for dither in Dither::ALL {
            let out = dither.apply(&img, 0.0);
            assert_eq!(out.dimensions(), (64, 64));
            assert!(
                out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255),
                "{} produced a non-binary pixel",
                dither.name()
            );
        }
    }

    #[test]
    fn test_diffusion_extremes_are_stable() {
        let black = GrayImage::from_pixel(8, 8, Luma([0]));
        let white = GrayImage::from_pixel(8, 8, Luma([255]));
        for dither in [Dither::FloydSteinberg, Dither::Atkinson, Dither::Stucki] {
            assert!(dither.apply(&black, 0.0).pixels().all(|p| p.0[0] == 0));
            assert!(dither.apply(&white, 0.0).pixels().all(|p| p.0[0] == 255));
        }
    }

    #[test]
    fn test_gamma_lightens_midtones() {
        let img = GrayImage::from_pixel(1, 1, Luma([64]));
        let out = adjust_gamma(&img, 3.0);
        assert!(out.get_pixel(0, 0).0[0] > 64);
    }

    #[test]
    fn test_gamma_identity() {
        let img = gradient(16, 16);
        let out = adjust_gamma(&img, 1.0);
        assert_eq!(out, img);
    }

    #[test]
    fn test_gamma_fixes_extremes() {
        let img = GrayImage::from_pixel(2, 1, Luma([0]));
        let mut img = img;
        img.put_pixel(1, 0, Luma([255]));
        let out = adjust_gamma(&img, 3.5);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn test_threshold_convert() {
        let mut img = GrayImage::new(4, 1);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([127]));
        img.put_pixel(2, 0, Luma([128]));
        img.put_pixel(3, 0, Luma([255]));
        let out = threshold_convert(&img, 128);

        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 0);
        assert_eq!(out.get_pixel(2, 0).0[0], 255);
        assert_eq!(out.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn test_threshold_is_idempotent() {
        let img = gradient(32, 32);
        let once = threshold_convert(&img, 128);
        let twice = threshold_convert(&once, 128);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_caller_gamma_overrides_default() {
        // With an extreme caller gamma, a dark midtone lightens enough to
        // flip the thresholded output compared to gamma 1.0.
        let img = GrayImage::from_pixel(8, 8, Luma([100]));
        let light = Dither::NoDither.apply(&adjust_gamma(&img, 8.0), 0.0);
        let dark = Dither::NoDither.apply(&img, 0.0);
        assert!(light.pixels().all(|p| p.0[0] == 255));
        assert!(dark.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_dither_by_name() {
        assert_eq!(Dither::by_name("bayer"), Some(Dither::Bayer));
        assert_eq!(Dither::by_name(""), Some(Dither::FloydSteinberg));
        assert_eq!(Dither::by_name("nearest"), None);
        for name in Dither::all_names() {
            assert!(Dither::by_name(name).is_some());
        }
    }
}
