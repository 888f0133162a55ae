use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use exif::{In, Reader, Tag, Value};
use image::DynamicImage;
use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use super::fingerprint;
use crate::common::errors::{PhotoError, Result};

/// Known image extensions
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "heic", "heif",
];

/// Where an image's pixels come from
#[derive(Debug, Clone)]
pub enum PixelSource {
    /// A local file, decoded lazily inside a worker
    Path(PathBuf),
    /// Bytes already fetched by a storage collaborator
    Bytes(Vec<u8>),
    /// Pixels already decoded by a codec collaborator
    Decoded(DynamicImage),
}

/// One image handed to the engine by a storage collaborator
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub id: String,
    pub byte_len: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub pixels: PixelSource,
}

impl SourceImage {
    pub fn from_path(path: &Path, byte_len: u64, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            id: path.display().to_string(),
            byte_len,
            timestamp,
            pixels: PixelSource::Path(path.to_path_buf()),
        }
    }

    pub fn from_bytes(id: impl Into<String>, bytes: Vec<u8>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.into(),
            byte_len: bytes.len() as u64,
            timestamp,
            pixels: PixelSource::Bytes(bytes),
        }
    }

    pub fn from_decoded(
        id: impl Into<String>,
        image: DynamicImage,
        byte_len: u64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            byte_len,
            timestamp,
            pixels: PixelSource::Decoded(image),
        }
    }

    /// Decode (if needed) and fingerprint this image
    pub fn fingerprint(&self, max_dimension: u32) -> Result<fingerprint::ImageRecord> {
        match &self.pixels {
            PixelSource::Path(path) => {
                let img = fingerprint::decode_path(&self.id, path)?;
                fingerprint::extract(&self.id, &img, self.byte_len, self.timestamp, max_dimension)
            }
            PixelSource::Bytes(bytes) => {
                let img = fingerprint::decode_bytes(&self.id, bytes)?;
                fingerprint::extract(&self.id, &img, self.byte_len, self.timestamp, max_dimension)
            }
            PixelSource::Decoded(img) => {
                fingerprint::extract(&self.id, img, self.byte_len, self.timestamp, max_dimension)
            }
        }
    }
}

/// A storage provider: anything that can list images for the engine.
/// Authentication and transport stay on the provider's side.
pub trait ImageSource {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// All images this provider offers for the current scan
    fn list(&self) -> Result<Vec<SourceImage>>;
}

/// Inclusive day range filter; either end may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Images with an unknown date are always included
    pub fn contains(&self, timestamp: Option<DateTime<Utc>>) -> bool {
        let Some(ts) = timestamp else {
            return true;
        };
        let day = ts.date_naive();
        self.from.map_or(true, |from| day >= from) && self.to.map_or(true, |to| day <= to)
    }
}

/// Check if a file is an image based on extension
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn date_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // YYYYMMDD
            Regex::new(r"(\d{4})(\d{2})(\d{2})").expect("valid regex"),
            // YYYY-MM-DD or YYYY_MM_DD
            Regex::new(r"(\d{4})[_-](\d{2})[_-](\d{2})").expect("valid regex"),
            // MM-DD-YYYY or MM_DD_YYYY
            Regex::new(r"(\d{2})[_-](\d{2})[_-](\d{4})").expect("valid regex"),
        ]
    })
}

/// Pull a calendar date out of names like `20251107_023639127_iOS.heic`,
/// `2025-11-07_image.jpg` or `photo_11-07-2025.png`.
pub fn date_from_filename(name: &str) -> Option<NaiveDate> {
    for (i, re) in date_patterns().iter().enumerate() {
        let Some(caps) = re.captures(name) else {
            continue;
        };
        let nums: Vec<u32> = (1..=3)
            .filter_map(|g| caps.get(g).and_then(|m| m.as_str().parse().ok()))
            .collect();
        if nums.len() != 3 {
            continue;
        }
        let (year, month, day) = if i == 2 {
            (nums[2], nums[0], nums[1])
        } else {
            (nums[0], nums[1], nums[2])
        };
        if !(1900..=2100).contains(&year) {
            continue;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) {
            return Some(date);
        }
    }
    None
}

/// EXIF capture date tags, most trustworthy first
const EXIF_DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTime, Tag::DateTimeDigitized];

/// Capture time recorded in the image's EXIF block, if any.
/// Files without EXIF, or with dates that do not parse, yield `None`.
pub fn exif_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    let file = File::open(path).ok()?;
    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;

    EXIF_DATE_TAGS.iter().find_map(|&tag| {
        let field = exif.get_field(tag, In::PRIMARY)?;
        let Value::Ascii(ref values) = field.value else {
            return None;
        };
        let raw = String::from_utf8_lossy(values.first()?);
        let raw = raw.trim_end_matches('\0').trim();
        match NaiveDateTime::parse_from_str(raw, "%Y:%m:%d %H:%M:%S") {
            Ok(dt) => Some(dt.and_utc()),
            Err(_) => {
                tracing::debug!(path = %path.display(), value = raw, "unparseable EXIF date");
                None
            }
        }
    })
}

/// Best-known date of a local image: EXIF capture time, then filename date,
/// then modification time
fn local_timestamp(path: &Path, meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    if let Some(taken) = exif_timestamp(path) {
        return Some(taken);
    }
    let from_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(date_from_filename)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt));
    from_name.or_else(|| meta.modified().ok().map(DateTime::<Utc>::from))
}

/// Images under a local directory
#[derive(Debug, Clone)]
pub struct LocalSource {
    pub root: PathBuf,
    /// Skip files smaller than this many bytes
    pub min_size: u64,
    pub dates: DateRange,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            min_size: 0,
            dates: DateRange::default(),
        }
    }

    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn with_dates(mut self, dates: DateRange) -> Self {
        self.dates = dates;
        self
    }
}

impl ImageSource for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    fn list(&self) -> Result<Vec<SourceImage>> {
        if !self.root.is_dir() {
            return Err(PhotoError::Io {
                path: self.root.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let mut images = Vec::new();
        let mut skipped_by_date = 0usize;

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !is_image(entry.path()) {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.len() < self.min_size {
                continue;
            }
            let timestamp = local_timestamp(entry.path(), &meta);
            if !self.dates.contains(timestamp) {
                skipped_by_date += 1;
                continue;
            }
            images.push(SourceImage::from_path(entry.path(), meta.len(), timestamp));
        }

        images.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::info!(
            root = %self.root.display(),
            images = images.len(),
            skipped_by_date,
            "listed local images"
        );

        Ok(images)
    }
}
