use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use image::DynamicImage;
use imageproc::point::Point;
use time::PrimitiveDateTime;

use crate::clock;
use crate::error::MeterError;

/// LCD region of the meter photo, in source image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the rectangle lies entirely inside an image of the given size
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= image_width && b <= image_height)
    }
}

impl Default for Roi {
    fn default() -> Self {
        Self::new(187, 188, 275, 146)
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for Roi {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(MeterError::RoiArity(parts.len()));
        }

        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| MeterError::RoiNotInteger(s.to_string()))?;
        }

        let [x, y, width, height] = values;
        if width == 0 || height == 0 {
            return Err(MeterError::RoiEmpty { width, height });
        }

        Ok(Self::new(x, y, width, height))
    }
}

/// Axis-aligned bounding box, inclusive of both edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn from_points(points: &[Point<u32>]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };

        Some(points.iter().fold(init, |b, p| Self {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }

    /// Smallest box covering both
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// True when the boxes share at least one pixel column
    pub fn overlaps_horizontally(&self, other: &Self) -> bool {
        self.min_x <= other.max_x && other.min_x <= self.max_x
    }
}

/// A bright region of the binarized display that may be one digit
#[derive(Debug, Clone)]
pub struct DigitCandidate {
    /// Outer boundary, in mask coordinates
    pub points: Vec<Point<u32>>,
    pub bbox: BoundingBox,
    /// Area enclosed by the boundary polygon
    pub area: f32,
}

impl DigitCandidate {
    pub fn x(&self) -> u32 {
        self.bbox.min_x
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.bbox.aspect_ratio()
    }
}

/// A photo of the meter, decoded, together with where it lives on disk
#[derive(Clone)]
pub struct CapturedImage {
    pub image: DynamicImage,
    pub path: PathBuf,
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("path", &self.path)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingRecord {
    pub timestamp: PrimitiveDateTime,
    pub reading: String,
}

impl ReadingRecord {
    pub fn new(timestamp: PrimitiveDateTime, reading: impl Into<String>) -> Self {
        Self {
            timestamp,
            reading: reading.into(),
        }
    }

    /// Timestamp as `YYYY-MM-DD HH:MM:SS`
    pub fn timestamp_string(&self) -> String {
        clock::format_timestamp(self.timestamp)
    }
}
