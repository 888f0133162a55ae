use chrono::{DateTime, Utc};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::errors::{PhotoError, Result};

/// Side of the luminance grid the mean hash is computed over (8x8 = 64 bits)
pub const HASH_GRID: u32 = 8;

/// Number of bits in a [`Fingerprint`]
pub const HASH_BITS: u32 = HASH_GRID * HASH_GRID;

/// Sharpness reported for images smaller than the 3x3 Laplacian kernel
pub const MIN_SHARPNESS: f64 = 0.0;

/// A 64-bit mean (average) perceptual hash.
///
/// Bit 63 is the top-left grid cell, bit 0 the bottom-right one, in row-major
/// order. A set bit means the cell's luminance is at or above the grid mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Hamming distance: number of differing bits
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Distance scaled to 0-100 (percent of differing bits)
    pub fn distance_percent(&self, other: &Fingerprint) -> f64 {
        self.distance(other) as f64 / HASH_BITS as f64 * 100.0
    }

    /// Compute the mean hash of an image.
    pub fn of_image(img: &DynamicImage) -> Self {
        let grid = img
            .grayscale()
            .resize_exact(HASH_GRID, HASH_GRID, FilterType::Triangle)
            .to_luma8();

        let cells: Vec<u32> = grid.pixels().map(|p| p.0[0] as u32).collect();
        let sum: u32 = cells.iter().sum();
        let count = cells.len() as u32;

        // value >= sum / count, kept in integers so equal cells never flip
        let bits = cells
            .iter()
            .fold(0u64, |acc, &v| (acc << 1) | u64::from(v * count >= sum));

        Self(bits)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 16 {
            return Err(format!("expected 16 hex digits, got {}", s.len()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| format!("invalid hex fingerprint '{}': {}", s, e))
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_string()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Fingerprint plus quality metrics for one image. Built once per scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Local path or remote id
    pub id: String,
    /// Source byte length
    pub byte_len: u64,
    /// Capture or modification time, when known
    pub timestamp: Option<DateTime<Utc>>,
    /// Width of the original image, before any decode downsampling
    pub width: u32,
    /// Height of the original image, before any decode downsampling
    pub height: u32,
    pub hash: Fingerprint,
    /// Laplacian variance, never negative
    pub sharpness: f64,
}

impl ImageRecord {
    /// Pixel count of the original image
    pub fn resolution(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Decode raw bytes, guessing the container from its magic number.
pub fn decode_bytes(id: &str, bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| PhotoError::from_image_error(id, e))
}

/// Open and decode an image from disk.
pub fn decode_path(id: &str, path: &std::path::Path) -> Result<DynamicImage> {
    let reader = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| PhotoError::Decode {
            id: id.to_string(),
            message: e.to_string(),
        })?;
    reader
        .decode()
        .map_err(|e| PhotoError::from_image_error(id, e))
}

/// Build an [`ImageRecord`] from a decoded image.
///
/// When `max_dimension` is non-zero and the image is larger on either side,
/// the hash and sharpness are computed on a downsampled copy; width and height
/// always describe the original.
pub fn extract(
    id: &str,
    img: &DynamicImage,
    byte_len: u64,
    timestamp: Option<DateTime<Utc>>,
    max_dimension: u32,
) -> Result<ImageRecord> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(PhotoError::Decode {
            id: id.to_string(),
            message: "image has no pixels".to_string(),
        });
    }

    let downsampled;
    let working = if max_dimension > 0 && (width > max_dimension || height > max_dimension) {
        downsampled = img.thumbnail(max_dimension, max_dimension);
        &downsampled
    } else {
        img
    };

    let hash = Fingerprint::of_image(working);
    let sharpness = laplacian_variance(&working.to_luma8());

    tracing::debug!(id, %hash, width, height, sharpness, "fingerprinted");

    Ok(ImageRecord {
        id: id.to_string(),
        byte_len,
        timestamp,
        width,
        height,
        hash,
        sharpness,
    })
}

/// Variance of the 4-neighbour Laplacian response over the image interior.
/// Higher variance means more edge energy, i.e. a sharper image.
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return MIN_SHARPNESS;
    }

    // [ 0  1  0 ]
    // [ 1 -4  1 ]
    // [ 0  1  0 ]
    let px = |x: u32, y: u32| img.get_pixel(x, y)[0] as i32;
    let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let lap = px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4 * px(x, y);
            responses.push(lap as f64);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    let variance = responses.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.max(MIN_SHARPNESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};

    fn checkerboard(size: u32, cell: u32) -> DynamicImage {
        let img = GrayImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let fp = Fingerprint::of_image(&checkerboard(64, 8));
        assert_eq!(fp.distance(&fp), 0);
    }

    #[test]
    fn test_distance_counts_differing_bits() {
        let a = Fingerprint::from_bits(0b0000_0000);
        let b = Fingerprint::from_bits(0b0000_0001);
        let c = Fingerprint::from_bits(0b1111_1111);
        assert_eq!(a.distance(&b), 1);
        assert_eq!(a.distance(&c), 8);
        assert_eq!(b.distance(&c), 7);
        assert!((a.distance_percent(&c) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_image_sets_every_bit() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, image::Rgb([90, 90, 90])));
        assert_eq!(Fingerprint::of_image(&img).bits(), u64::MAX);
    }

    #[test]
    fn test_half_bright_image_splits_bits() {
        let img = GrayImage::from_fn(64, 64, |x, _| if x < 32 { Luma([0]) } else { Luma([255]) });
        let fp = Fingerprint::of_image(&DynamicImage::ImageLuma8(img));
        // Each row reads 00001111
        assert_eq!(fp.bits(), 0x0f0f_0f0f_0f0f_0f0f);
    }

    #[test]
    fn test_hex_roundtrip() {
        let fp = Fingerprint::from_bits(0xdead_beef_0123_4567);
        assert_eq!(fp.to_string(), "deadbeef01234567");
        assert_eq!("deadbeef01234567".parse::<Fingerprint>().unwrap(), fp);
        assert!("xyz".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_sharpness_of_flat_image_is_zero() {
        let flat = GrayImage::from_pixel(16, 16, Luma([128]));
        assert_eq!(laplacian_variance(&flat), 0.0);
    }

    #[test]
    fn test_sharp_edges_beat_blur() {
        let sharp = checkerboard(32, 2).to_luma8();
        let blurred = image::imageops::blur(&sharp, 3.0);
        assert!(laplacian_variance(&sharp) > laplacian_variance(&blurred));
    }

    #[test]
    fn test_tiny_image_gets_minimum_sharpness() {
        let tiny = GrayImage::from_pixel(2, 5, Luma([10]));
        assert_eq!(laplacian_variance(&tiny), MIN_SHARPNESS);
    }

    #[test]
    fn test_downsampling_keeps_original_dimensions() {
        let img = checkerboard(400, 50);
        let record = extract("big.png", &img, 1234, None, 100).unwrap();
        assert_eq!((record.width, record.height), (400, 400));
        assert_eq!(record.resolution(), 160_000);

        let full = extract("big.png", &img, 1234, None, 0).unwrap();
        assert_eq!(record.hash, full.hash);
    }

    #[test]
    fn test_empty_image_is_a_decode_error() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let err = extract("empty.png", &img, 0, None, 0).unwrap_err();
        assert!(matches!(err, PhotoError::Decode { .. }));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let err = decode_bytes("junk.jpg", b"definitely not an image").unwrap_err();
        assert!(err.is_skippable());
    }
}
