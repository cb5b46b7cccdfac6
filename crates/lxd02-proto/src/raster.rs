//! Packing of 1-bpp images into the printer's two-line packet stream.

use image::GrayImage;

use crate::cmd;
use crate::error::{Error, Result};

/// Print head width in pixels.
pub const LINE_WIDTH: u32 = 384;
/// Print resolution.
pub const DPI: u32 = 203;
/// Scan lines carried by one packet.
pub const LINES_PER_PACKET: u32 = 2;
/// One framed packet: 3-byte prefix, two 48-byte lines, terminator.
pub const PACKET_SIZE: usize = 100;

const TERMINATOR: u8 = 0x00;

/// Serialises images into the device's packet framing.
#[derive(Debug, Clone)]
pub struct Raster {
    width: u32,
    dpi: u32,
    threshold: u8,
}

impl Default for Raster {
    fn default() -> Self {
        Self {
            width: LINE_WIDTH,
            dpi: DPI,
            threshold: lxd02_bitmap::DEFAULT_THRESHOLD,
        }
    }
}

impl Raster {
    /// Line width in pixels.
    pub fn line_width(&self) -> u32 {
        self.width
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    fn line_bytes(&self) -> usize {
        (self.width / 8) as usize
    }

    /// Number of packets `serialise` emits for an image of height `height`:
    /// the height is padded so it is even and carries at least one trailing
    /// blank line pair.
    pub fn packet_count(height: u32) -> u32 {
        let padded = if height % 2 != 0 {
            u64::from(height) + 1
        } else {
            u64::from(height) + 2
        };
        (padded / u64::from(LINES_PER_PACKET)) as u32
    }

    /// Serialise a two-colour image into the packet stream. Pixels darker
    /// than the threshold are printed; bits past the image width or height
    /// stay zero.
    pub fn serialise(&self, img: &GrayImage) -> Result<Vec<Vec<u8>>> {
        let (width, height) = img.dimensions();
        if width > self.width {
            return Err(Error::InvalidParam(format!(
                "image width {width} exceeds the {} pixel limit",
                self.width
            )));
        }

        let count = Self::packet_count(height);
        if count > u32::from(u16::MAX) {
            return Err(Error::InvalidParam(format!(
                "packet count {count} does not fit in 16 bits"
            )));
        }

        let mut packets = Vec::with_capacity(count as usize);
        for index in 0..count as u16 {
            let y = u32::from(index) * LINES_PER_PACKET;
            let mut row = Vec::with_capacity(PACKET_SIZE);
            row.extend_from_slice(&cmd::packet_prefix(index));
            row.extend_from_slice(&self.rasterise_line(img, y));
            row.extend_from_slice(&self.rasterise_line(img, y + 1));
            row.push(TERMINATOR);
            packets.push(row);
        }
        Ok(packets)
    }

    /// Wrap externally built line-pair blobs (exactly 96 bytes each) with
    /// prefix and terminator, assigning sequential packet indices.
    pub fn enumerate(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        if data.len() > u16::MAX as usize {
            return Err(Error::InvalidParam(format!(
                "packet count {} does not fit in 16 bits",
                data.len()
            )));
        }
        let pair_bytes = self.line_bytes() * LINES_PER_PACKET as usize;
        let mut packets = Vec::with_capacity(data.len());
        for (index, pair) in data.iter().enumerate() {
            if pair.len() != pair_bytes {
                return Err(Error::InvalidParam(format!(
                    "corrupt raw data on line {index}: length {} != {pair_bytes}",
                    pair.len()
                )));
            }
            let mut row = Vec::with_capacity(PACKET_SIZE);
            row.extend_from_slice(&cmd::packet_prefix(index as u16));
            row.extend_from_slice(pair);
            row.push(TERMINATOR);
            packets.push(row);
        }
        Ok(packets)
    }

    /// Pack one scan line MSB-first. Rows past the image height are blank
    /// padding.
    fn rasterise_line(&self, img: &GrayImage, y: u32) -> Vec<u8> {
        let mut line = vec![0u8; self.line_bytes()];
        if y >= img.height() {
            return line;
        }
        for x in 0..img.width().min(self.width) {
            if img.get_pixel(x, y).0[0] < self.threshold {
                line[(x / 8) as usize] |= 1 << (7 - (x % 8));
            }
        }
        line
    }
}
