use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::point::Point;

use crate::models::{BoundingBox, DigitCandidate};

/// Outer boundaries of the bright regions in a binary mask.
/// Regions nested inside holes of other regions are skipped.
pub fn find_outer_boundaries(mask: &GrayImage) -> Vec<Vec<Point<u32>>> {
    find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Area enclosed by a closed polygon (shoelace formula)
pub fn polygon_area(points: &[Point<u32>]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64)
        .sum();

    twice_area.abs() as f32 / 2.0
}

/// Outcome of filtering the outer regions of a mask by area
#[derive(Debug, Clone, Default)]
pub struct ContourScan {
    /// Regions inside the area bounds, left to right
    pub candidates: Vec<DigitCandidate>,
    /// Regions at or below the lower bound (specks)
    pub rejected_small: usize,
    /// Regions at or above the upper bound
    pub rejected_large: usize,
}

/// Split the outer regions of `mask` into digit candidates
/// (`min_area < area < max_area`, ordered by the left edge of their bounding
/// box) and counts of what was filtered out
pub fn scan_digit_candidates(mask: &GrayImage, min_area: f32, max_area: f32) -> ContourScan {
    let mut scan = ContourScan::default();

    for points in find_outer_boundaries(mask) {
        let area = polygon_area(&points);
        let Some(bbox) = BoundingBox::from_points(&points) else {
            continue;
        };
        if area <= min_area {
            scan.rejected_small += 1;
        } else if area >= max_area {
            scan.rejected_large += 1;
        } else {
            scan.candidates.push(DigitCandidate { points, bbox, area });
        }
    }

    scan.candidates.sort_by_key(|c| c.x());
    scan
}

/// Find digit candidates: outer regions with `min_area < area < max_area`,
/// ordered left to right
pub fn extract_digit_candidates(
    mask: &GrayImage,
    min_area: f32,
    max_area: f32,
) -> Vec<DigitCandidate> {
    scan_digit_candidates(mask, min_area, max_area).candidates
}

/// Group candidates into digit cells.
///
/// An LCD digit is often several separate segments. Candidates whose column
/// ranges overlap, directly or through a chain of neighbours, belong to the
/// same digit. Expects candidates ordered by left edge and returns one box per
/// cell, left to right.
pub fn digit_cells(candidates: &[DigitCandidate]) -> Vec<BoundingBox> {
    let mut cells: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        match cells.last_mut() {
            Some(cell) if cell.overlaps_horizontally(&candidate.bbox) => {
                *cell = cell.union(&candidate.bbox);
            }
            _ => cells.push(candidate.bbox),
        }
    }
    cells
}
