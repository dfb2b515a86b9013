// THEORY:
// The `tracker` module adds "memory" to the Spatial Grouping Layer. Blobs are
// rebuilt from scratch every frame, so on their own they have no identity.
// The tracker associates each blob of the current generation with a blob of
// the previous generation and lets it inherit that blob's id and creation
// stamp.
//
// This module solves the "data association problem" with nearest-neighbour
// matching on normalized centroids.
//
// Key architectural principles:
// 1.  **Two Matching Passes**: the first pass lets every current blob pick
//     its nearest previous blob under the distance cutoff. Blobs that lost a
//     duplicate contest get a second chance against the previous blobs that
//     nobody has claimed yet.
// 2.  **Duplicate Resolution**: when two current blobs picked the same
//     previous id, the closer one keeps it.
// 3.  **Lowest Free Id**: blobs that matched nothing get the lowest id not in
//     use in the current generation, so ids stay small and are recycled.
// 4.  **Explicit Matches**: only blobs that actually matched inherit the
//     predecessor's creation stamp and lose their `is_new` flag. A fresh id
//     that happens to equal an old one never does.

use crate::core_modules::blob::{Blob, find_blob_index_by_id, first_free_id};
use crate::error::{VisionError, VisionResult};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Default cutoff on the normalized centroid distance for a match.
pub const DEFAULT_MAX_NORM_DIST: f64 = 0.15;

/// Assigns ids to the current generation, carrying identities forward from
/// `previous` where a blob is close enough to one of them.
///
/// `previous` is only mutated to repair blobs that lost their id.
pub fn track_blobs(
    current: &mut [Blob],
    previous: &mut [Blob],
    max_norm_dist: f64,
) -> VisionResult<()> {
    if previous.is_empty() {
        assign_index_ids(current);
        return Ok(());
    }

    for i in 0..previous.len() {
        if previous[i].id.is_none() {
            let id = first_free_id(previous);
            warn!(index = i, id, "previous blob without id, repaired");
            previous[i].id = Some(id);
        }
    }

    let count = current.len();
    let mut distances = vec![f64::INFINITY; count];
    for blob in current.iter_mut() {
        blob.id = None;
    }

    // --- 1. Nearest previous blob ---
    for (i, blob) in current.iter_mut().enumerate() {
        for prev in previous.iter() {
            let dist = prev.centroid.distance(&blob.centroid);
            if dist < distances[i] && dist < max_norm_dist {
                distances[i] = dist;
                blob.id = prev.id;
            }
        }
    }

    resolve_duplicates(current, &distances);

    // --- 2. Second chance against unclaimed previous blobs ---
    for i in 0..count {
        if current[i].id.is_some() {
            continue;
        }
        distances[i] = f64::INFINITY;
        for prev in previous.iter() {
            let Some(prev_id) = prev.id else { continue };
            if find_blob_index_by_id(current, prev_id).is_some() {
                continue;
            }
            let dist = prev.centroid.distance(&current[i].centroid);
            if dist < distances[i] && dist < max_norm_dist {
                distances[i] = dist;
                current[i].id = Some(prev_id);
            }
        }
    }

    resolve_duplicates(current, &distances);

    // --- 3. Inherit or mint ---
    let matched: Vec<bool> = current.iter().map(|b| b.id.is_some()).collect();
    for i in 0..count {
        if current[i].id.is_none() {
            current[i].id = Some(first_free_id(current));
        }
    }

    for (blob, matched) in current.iter_mut().zip(matched) {
        if !matched {
            blob.is_new = true;
            continue;
        }
        let parent = blob
            .id
            .and_then(|id| find_blob_index_by_id(previous, id))
            .map(|index| previous[index].created);
        if let Some(created) = parent {
            blob.created = created;
            blob.is_new = false;
        }
    }

    check_unique_ids(current)?;
    debug!(current = count, previous = previous.len(), "tracked blobs");
    Ok(())
}

/// Ids equal to the array position, used when tracking is off or there is
/// nothing to track against.
pub fn assign_index_ids(current: &mut [Blob]) {
    for (i, blob) in current.iter_mut().enumerate() {
        blob.id = Some(i as u32);
    }
}

/// Of every pair of blobs sharing an id, clears the one farther from its
/// predecessor. On a tie the later index loses.
fn resolve_duplicates(current: &mut [Blob], distances: &[f64]) {
    let count = current.len();
    for i in 0..count {
        for j in 0..count {
            if i == j {
                continue;
            }
            let (Some(a), Some(b)) = (current[i].id, current[j].id) else {
                continue;
            };
            if a != b {
                continue;
            }
            if distances[i] > distances[j] {
                current[i].id = None;
            } else {
                current[j].id = None;
            }
        }
    }
}

fn check_unique_ids(current: &[Blob]) -> VisionResult<()> {
    let mut seen = HashSet::with_capacity(current.len());
    for blob in current {
        let id = blob
            .id
            .ok_or_else(|| VisionError::tracker("blob left without an id"))?;
        if !seen.insert(id) {
            debug_assert!(false, "duplicate blob id {id}");
            return Err(VisionError::tracker(format!("duplicate blob id {id}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::{NormPoint, NormRect};
    use crate::events::FrameStamp;

    fn blob(x: f64, y: f64, stamp: FrameStamp) -> Blob {
        Blob::new(
            NormRect::new(x - 0.05, y - 0.05, 0.1, 0.1),
            NormPoint::new(x, y),
            0.01,
            1,
            stamp,
        )
    }

    fn ids(blobs: &[Blob]) -> Vec<Option<u32>> {
        blobs.iter().map(|b| b.id).collect()
    }

    #[test]
    fn first_frame_gets_index_ids() {
        let start = FrameStamp::new(0, 0);
        let mut current = vec![blob(0.2, 0.2, start), blob(0.7, 0.7, start)];
        track_blobs(&mut current, &mut [], DEFAULT_MAX_NORM_DIST).unwrap();
        assert_eq!(ids(&current), vec![Some(0), Some(1)]);
    }

    #[test]
    fn moving_blob_keeps_id_and_creation() {
        let first = FrameStamp::new(100, 1);
        let mut previous = vec![blob(0.2, 0.2, first)];
        track_blobs(&mut previous, &mut [], DEFAULT_MAX_NORM_DIST).unwrap();

        let mut current = vec![blob(0.25, 0.22, FrameStamp::new(133, 2))];
        track_blobs(&mut current, &mut previous, DEFAULT_MAX_NORM_DIST).unwrap();
        assert_eq!(current[0].id, Some(0));
        assert_eq!(current[0].created, first);
        assert!(!current[0].is_new);
    }

    #[test]
    fn far_jump_gets_fresh_stamp() {
        let then = FrameStamp::new(0, 1);
        let mut previous = vec![blob(0.1, 0.1, then), blob(0.5, 0.5, then)];
        assign_index_ids(&mut previous);

        // Blob 0 vanishes; a new blob appears far from everything.
        let now = FrameStamp::new(40, 2);
        let mut current = vec![blob(0.52, 0.5, now), blob(0.9, 0.9, now)];
        track_blobs(&mut current, &mut previous, DEFAULT_MAX_NORM_DIST).unwrap();
        assert_eq!(current[0].id, Some(1));
        assert!(!current[0].is_new);
        // Id 0 is free again and is recycled, but the blob is still new.
        assert_eq!(current[1].id, Some(0));
        assert!(current[1].is_new);
        assert_eq!(current[1].created, now);
    }

    #[test]
    fn closer_blob_wins_contested_id() {
        let mut previous = vec![blob(0.5, 0.5, FrameStamp::new(0, 1))];
        assign_index_ids(&mut previous);

        let now = FrameStamp::new(40, 2);
        let mut current = vec![blob(0.6, 0.5, now), blob(0.52, 0.5, now)];
        track_blobs(&mut current, &mut previous, DEFAULT_MAX_NORM_DIST).unwrap();
        assert_eq!(current[1].id, Some(0));
        assert!(!current[1].is_new);
        assert_eq!(current[0].id, Some(1));
        assert!(current[0].is_new);
    }

    #[test]
    fn loser_of_contest_claims_unclaimed_neighbour() {
        let then = FrameStamp::new(0, 1);
        let mut previous = vec![blob(0.5, 0.5, then), blob(0.62, 0.5, then)];
        assign_index_ids(&mut previous);

        // Both current blobs are nearest to previous 0; the loser should fall
        // back to previous 1.
        let now = FrameStamp::new(40, 2);
        let mut current = vec![blob(0.55, 0.5, now), blob(0.51, 0.5, now)];
        track_blobs(&mut current, &mut previous, DEFAULT_MAX_NORM_DIST).unwrap();
        assert_eq!(current[1].id, Some(0));
        assert_eq!(current[0].id, Some(1));
        assert!(!current[0].is_new);
    }

    #[test]
    fn previous_blobs_without_id_are_repaired() {
        let then = FrameStamp::new(0, 1);
        let mut previous = vec![blob(0.2, 0.2, then), blob(0.8, 0.8, then)];
        previous[1].id = Some(0);
        let mut current = vec![blob(0.21, 0.2, FrameStamp::new(40, 2))];
        track_blobs(&mut current, &mut previous, DEFAULT_MAX_NORM_DIST).unwrap();
        assert_eq!(previous[0].id, Some(1));
        assert_eq!(current[0].id, Some(1));
    }

    #[test]
    fn ids_never_collide() {
        let stamp = FrameStamp::new(0, 1);
        let mut previous: Vec<Blob> = (0..5)
            .map(|i| blob(0.1 + i as f64 * 0.02, 0.5, stamp))
            .collect();
        assign_index_ids(&mut previous);
        let mut current: Vec<Blob> = (0..8)
            .map(|i| blob(0.1 + i as f64 * 0.015, 0.5, stamp))
            .collect();
        track_blobs(&mut current, &mut previous, DEFAULT_MAX_NORM_DIST).unwrap();
        let unique: HashSet<_> = current.iter().map(|b| b.id).collect();
        assert_eq!(unique.len(), current.len());
        assert!(current.iter().all(|b| b.id.is_some()));
    }
}
