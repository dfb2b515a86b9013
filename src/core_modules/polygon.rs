//! Polygon approximation of blob outlines.
//!
//! Rays are cast from the blob's centroid at evenly spaced angles. Each ray
//! starts on the circle through the bounding box corner farthest from the
//! centroid and marches inwards one pixel at a time until it lands on a pixel
//! carrying the blob's raw label.

use crate::core_modules::blob::Blob;
use crate::core_modules::blob_detector::LabelMap;
use crate::core_modules::geometry::NormPoint;
use std::f64::consts::TAU;

/// Fills `polygon` on every blob with `points` vertices. `points` is expected
/// to have been sanitized already (at least 3).
pub fn approximate_polygons(blobs: &mut [Blob], map: &LabelMap, points: usize) {
    let width = map.width();
    let height = map.height();
    if width == 0 || height == 0 {
        return;
    }
    for blob in blobs.iter_mut() {
        blob.polygon = approximate(blob, map, points);
    }
}

fn approximate(blob: &Blob, map: &LabelMap, points: usize) -> Vec<NormPoint> {
    let width = map.width() as f64;
    let height = map.height() as f64;
    let rect = &blob.rect;
    let c = &blob.centroid;

    let corners = [
        (rect.x, rect.y),
        (rect.right(), rect.y),
        (rect.right(), rect.bottom()),
        (rect.x, rect.bottom()),
    ];
    let radius = corners
        .iter()
        .map(|&(x, y)| (((x - c.x) * width).powi(2) + ((y - c.y) * height).powi(2)).sqrt())
        .fold(0.0_f64, f64::max)
        .floor() as i64;

    let center_x = (c.x * width).floor();
    let center_y = (c.y * height).floor();
    let max_x = map.width() as i64 - 1;
    let max_y = map.height() as i64 - 1;

    (0..points)
        .map(|j| {
            let angle = j as f64 / points as f64 * TAU;
            let (sin, cos) = angle.sin_cos();
            let mut hit = (center_x as i64, center_y as i64);
            for r in (0..=radius).rev() {
                let r = r as f64;
                let x = ((center_x + r * cos).floor() as i64).clamp(0, max_x);
                let y = ((center_y + r * sin).floor() as i64).clamp(0, max_y);
                hit = (x, y);
                if map.get(x as u32, y as u32) == blob.raw_label() {
                    break;
                }
            }
            NormPoint::new(hit.0 as f64 / width, hit.1 as f64 / height)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisionConfig;
    use crate::core_modules::blob_detector::blob_detector::label_blobs;
    use crate::core_modules::blob_filter::aggregate;
    use crate::core_modules::image_filter::LIT;
    use crate::core_modules::pixel_buffer::PixelBuffer;
    use crate::events::FrameStamp;

    fn square_blob(size: u32, x0: u32, y0: u32, side: u32) -> (Vec<Blob>, LabelMap) {
        let mut threshold = PixelBuffer::new(size, size);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                threshold.set(x, y, [LIT, LIT, LIT, 255]);
            }
        }
        let mut map = LabelMap::default();
        let count = label_blobs(&threshold, &mut map, None).unwrap();
        let blobs = aggregate(&map, count, &VisionConfig::default(), FrameStamp::default());
        (blobs, map)
    }

    #[test]
    fn polygon_vertices_lie_on_the_blob() {
        let (mut blobs, map) = square_blob(20, 5, 5, 8);
        assert_eq!(blobs.len(), 1);
        approximate_polygons(&mut blobs, &map, 6);

        let polygon = &blobs[0].polygon;
        assert_eq!(polygon.len(), 6);
        for p in polygon {
            let x = (p.x * 20.0).round() as u32;
            let y = (p.y * 20.0).round() as u32;
            assert_eq!(map.get(x, y), blobs[0].raw_label(), "vertex ({x}, {y}) off the blob");
        }
        // The first ray points along +x and reaches the right edge.
        assert_eq!(polygon[0], NormPoint::new(12.0 / 20.0, 8.0 / 20.0));
    }

    #[test]
    fn polygon_points_follow_the_requested_count() {
        let (mut blobs, map) = square_blob(16, 3, 3, 6);
        approximate_polygons(&mut blobs, &map, 3);
        assert_eq!(blobs[0].polygon.len(), 3);
        approximate_polygons(&mut blobs, &map, 12);
        assert_eq!(blobs[0].polygon.len(), 12);
    }
}
