//! Raw sample decoding
//!
//! The sensors send frames as one byte per column per pair of rows, column
//! by column:
//!
//! ```text
//! bit   7   6   5   4   3   2   1   0
//!       -   [ row+1 (odd) ] -   [ row (even)  ]
//! ```
//!
//! Each 3-bit sample is scaled to 8 bits by multiplying by 36, which keeps the
//! brightness values drivers and downstream processing were tuned against.

use crate::error::{ProtocolError, Result};
use std::io::Write;

/// Multiplier from 3-bit samples to 8-bit pixels
pub const SAMPLE_SCALE: u8 = 36;

const EVEN_ROW_MASK: u8 = 0x07;
const ODD_ROW_MASK: u8 = 0x70;

/// Number of raw bytes a `width` x `height` frame occupies
///
/// Returns `None` if the size does not fit in `usize`.
pub fn raw_frame_len(width: usize, height: usize) -> Option<usize> {
    width.checked_mul(height.div_ceil(2))
}

/// Raw and decoded byte counts for a frame with valid dimensions
fn frame_sizes(width: usize, height: usize) -> Result<(usize, usize)> {
    let invalid = || ProtocolError::InvalidDimensions { width, height };
    if height % 2 != 0 {
        return Err(invalid());
    }
    let raw = raw_frame_len(width, height).ok_or_else(invalid)?;
    let pixels = width.checked_mul(height).ok_or_else(invalid)?;
    Ok((raw, pixels))
}

/// Decode a packed raw frame into a row-major 8-bit image
///
/// `height` must be even, `raw` must hold at least [`raw_frame_len`] bytes and
/// `out` must be exactly `width * height` bytes. Extra raw bytes are ignored.
/// Every output byte is written.
pub fn assemble_image(raw: &[u8], width: usize, height: usize, out: &mut [u8]) -> Result<()> {
    let (needed, pixels) = frame_sizes(width, height)?;
    if raw.len() < needed {
        return Err(ProtocolError::BufferTooSmall {
            needed,
            available: raw.len(),
        });
    }

    if out.len() != pixels {
        return Err(ProtocolError::BufferSizeMismatch {
            expected: pixels,
            actual: out.len(),
        });
    }

    let pairs = height / 2;
    for (column, samples) in raw[..needed].chunks_exact(pairs.max(1)).enumerate() {
        for (pair, &sample) in samples.iter().enumerate() {
            let row = pair * 2;
            out[width * row + column] = (sample & EVEN_ROW_MASK) * SAMPLE_SCALE;
            out[width * (row + 1) + column] = ((sample & ODD_ROW_MASK) >> 4) * SAMPLE_SCALE;
        }
    }

    Ok(())
}

/// A decoded 8-bit grayscale frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Row-major pixel data, `width * height` bytes
    pub data: Vec<u8>,
}

impl Image {
    /// Decode a raw frame into a newly allocated image
    pub fn assemble(raw: &[u8], width: usize, height: usize) -> Result<Self> {
        let (_, pixels) = frame_sizes(width, height)?;
        let mut data = vec![0u8; pixels];
        assemble_image(raw, width, height, &mut data)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Pixel at (`row`, `column`)
    pub fn pixel(&self, row: usize, column: usize) -> Option<u8> {
        if row >= self.height || column >= self.width {
            return None;
        }
        self.data.get(self.width * row + column).copied()
    }

    /// Write the image as binary PGM (P5)
    pub fn write_pgm<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        writer.write_all(self.pgm_header().as_bytes())?;
        writer.write_all(&self.data)?;
        writer.flush()
    }

    /// Encode the image as binary PGM (P5)
    pub fn to_pgm(&self) -> Vec<u8> {
        let mut buf = self.pgm_header().into_bytes();
        buf.extend_from_slice(&self.data);
        buf
    }

    fn pgm_header(&self) -> String {
        format!("P5\n{} {}\n255\n", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_by_two() {
        let mut out = [0u8; 4];
        assemble_image(&[0x12, 0x34], 2, 2, &mut out).unwrap();
        assert_eq!(out, [72, 144, 36, 108]);
    }

    #[test]
    fn test_unused_bits_ignored() {
        let mut plain = [0u8; 2];
        let mut noisy = [0u8; 2];
        assemble_image(&[0x35], 1, 2, &mut plain).unwrap();
        assemble_image(&[0x35 | 0x88], 1, 2, &mut noisy).unwrap();
        assert_eq!(plain, noisy);
        assert_eq!(plain, [5 * 36, 3 * 36]);
    }

    #[test]
    fn test_full_scale() {
        let mut out = [0u8; 2];
        assemble_image(&[0x77], 1, 2, &mut out).unwrap();
        assert_eq!(out, [252, 252]);
    }

    #[test]
    fn test_column_major_input_order() {
        // 2 columns, 4 rows: column 0 takes the first two bytes
        let raw = [0x10, 0x32, 0x54, 0x76];
        let mut out = [0u8; 8];
        assemble_image(&raw, 2, 4, &mut out).unwrap();

        let rows: Vec<&[u8]> = out.chunks(2).collect();
        assert_eq!(rows[0], &[0, 4 * 36]);
        assert_eq!(rows[1], &[36, 5 * 36]);
        assert_eq!(rows[2], &[2 * 36, 6 * 36]);
        assert_eq!(rows[3], &[3 * 36, 7 * 36]);
    }

    #[test]
    fn test_odd_height_rejected() {
        let mut out = [0u8; 6];
        assert_eq!(
            assemble_image(&[0, 0, 0, 0], 2, 3, &mut out),
            Err(ProtocolError::InvalidDimensions {
                width: 2,
                height: 3
            })
        );
    }

    #[test]
    fn test_short_input_rejected() {
        let mut out = [0u8; 8];
        assert_eq!(
            assemble_image(&[0, 0, 0], 2, 4, &mut out),
            Err(ProtocolError::BufferTooSmall {
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_output_size_mismatch_rejected() {
        let mut out = [0u8; 5];
        assert!(matches!(
            assemble_image(&[0, 0], 2, 2, &mut out),
            Err(ProtocolError::BufferSizeMismatch { expected: 4, .. })
        ));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let huge = 1usize << 63;
        let mut out: [u8; 0] = [];
        assert_eq!(
            assemble_image(&[], huge, 4, &mut out),
            Err(ProtocolError::InvalidDimensions {
                width: huge,
                height: 4
            })
        );
        assert!(matches!(
            Image::assemble(&[], huge, 4),
            Err(ProtocolError::InvalidDimensions { .. })
        ));
        assert_eq!(raw_frame_len(usize::MAX, 4), None);
        assert_eq!(raw_frame_len(128, 8), Some(512));
    }

    #[test]
    fn test_trailing_raw_bytes_ignored() {
        let mut exact = [0u8; 4];
        let mut padded = [0u8; 4];
        assemble_image(&[0x12, 0x34], 2, 2, &mut exact).unwrap();
        assemble_image(&[0x12, 0x34, 0x77, 0xff, 0x55], 2, 2, &mut padded).unwrap();
        assert_eq!(exact, padded);
        assert_eq!(padded, [72, 144, 36, 108]);
    }

    #[test]
    fn test_empty_frame() {
        let mut out: [u8; 0] = [];
        assert!(assemble_image(&[], 0, 0, &mut out).is_ok());
    }

    #[test]
    fn test_pgm_header() {
        let image = Image::assemble(&[0x12, 0x34], 2, 2).unwrap();
        let pgm = image.to_pgm();
        assert!(pgm.starts_with(b"P5\n2 2\n255\n"));
        assert_eq!(&pgm[pgm.len() - 4..], &[72, 144, 36, 108]);

        let mut written = Vec::new();
        image.write_pgm(&mut written).unwrap();
        assert_eq!(written, pgm);
    }

    #[test]
    fn test_pixel_lookup() {
        let image = Image::assemble(&[0x12, 0x34], 2, 2).unwrap();
        assert_eq!(image.pixel(1, 1), Some(108));
        assert_eq!(image.pixel(2, 0), None);
    }
}
