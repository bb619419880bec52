//! Decimation of dense tracker output into sparse keyframes.

use crate::error::EditError;
use crate::model::{Keyframe, Track};

/// Reduce a track to keyframes every `interval` frames.
///
/// Frames are counted from the first detection, so the first detection is
/// always kept; the last detection is kept even when it falls off-interval.
/// Detections must be sorted by frame (see [`Track::normalize`]).
pub fn decimate(track: &Track, interval: u32) -> Result<Vec<Keyframe>, EditError> {
    if interval == 0 {
        return Err(EditError::invalid("decimation interval must be at least 1"));
    }
    let Some((first, last)) = track.frame_range() else {
        return Ok(Vec::new());
    };

    let keyframes: Vec<Keyframe> = track
        .detections
        .iter()
        .filter(|d| {
            let offset = d.frame_number - first;
            offset % interval == 0 || d.frame_number == last
        })
        .map(|d| Keyframe::new(d.frame_number, d.bbox))
        .collect();

    log::debug!(
        "Decimated track {} from {} detections to {} keyframes (interval {})",
        track.id,
        track.detections.len(),
        keyframes.len(),
        interval
    );
    Ok(keyframes)
}

/// Every detection as a keyframe, without decimation.
pub fn all_keyframes(track: &Track) -> Vec<Keyframe> {
    track
        .detections
        .iter()
        .map(|d| Keyframe::new(d.frame_number, d.bbox))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Detection, TrackId};

    fn dense_track(frames: impl Iterator<Item = u32>) -> Track {
        let detections = frames
            .map(|f| Detection::new(f, BoundingBox::new(f as f32, 0.0, 10.0, 10.0), 0.9))
            .collect();
        Track::new(TrackId::new("t"), "model", detections)
    }

    #[test]
    fn test_decimate_every_fifth_frame() {
        let track = dense_track(0..=100);
        let keyframes = decimate(&track, 5).unwrap();
        let frames: Vec<u32> = keyframes.iter().map(|k| k.frame).collect();
        assert_eq!(frames, (0..=100).step_by(5).collect::<Vec<u32>>());
        assert_eq!(keyframes.len(), 21);
    }

    #[test]
    fn test_decimate_keeps_off_interval_last_frame() {
        let track = dense_track(0..=12);
        let frames: Vec<u32> = decimate(&track, 5)
            .unwrap()
            .iter()
            .map(|k| k.frame)
            .collect();
        assert_eq!(frames, vec![0, 5, 10, 12]);
    }

    #[test]
    fn test_decimate_relative_to_first_detection() {
        let track = dense_track(37..=50);
        let frames: Vec<u32> = decimate(&track, 10)
            .unwrap()
            .iter()
            .map(|k| k.frame)
            .collect();
        assert_eq!(frames, vec![37, 47, 50]);
    }

    #[test]
    fn test_decimate_count_bound() {
        for len in 1..40u32 {
            for interval in 1..8u32 {
                let track = dense_track(0..len);
                let count = decimate(&track, interval).unwrap().len() as u32;
                assert!(count <= len.div_ceil(interval) + 1, "len {len} interval {interval}");
                let frames = decimate(&track, interval).unwrap();
                assert_eq!(frames.first().map(|k| k.frame), Some(0));
                assert_eq!(frames.last().map(|k| k.frame), Some(len - 1));
            }
        }
    }

    #[test]
    fn test_decimate_invalid_interval() {
        let track = dense_track(0..10);
        assert!(matches!(
            decimate(&track, 0),
            Err(EditError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_decimate_empty_track() {
        let track = dense_track(0..0);
        assert!(decimate(&track, 3).unwrap().is_empty());
    }
}
