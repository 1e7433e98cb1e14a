//! Decides which frames go to the encoder, and for how long each is shown

use crate::expand::{expand, ExpandedFrames};
use crate::timing::{normalize, NormalizedTiming, DEFAULT_FRAME_DURATION_MS};
use tracing::{info, warn};

/// Frames in playback order, all shown for `frame_duration_ms`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePlan {
    pub frames: ExpandedFrames,
    /// Duration of every frame in ms
    pub frame_duration_ms: u32,
    /// `true` if a single frame was doubled to make the output animated
    pub duplicated_single_frame: bool,
}

impl EncodePlan {
    /// `durations_ms` has one entry per decoded frame, already clamped to ≥ 1ms.
    ///
    /// If there are frames, but no durations, frames play at the default 25fps.
    #[must_use]
    pub fn new(source_frame_count: usize, durations_ms: &[u32]) -> Self {
        if durations_ms.is_empty() && source_frame_count > 0 {
            warn!("Could not extract frame durations, using uniform timing");
            return Self::with_frames(
                ExpandedFrames::from_indices((0..source_frame_count).collect()),
                DEFAULT_FRAME_DURATION_MS,
            );
        }
        Self::from_timing(source_frame_count, &normalize(durations_ms))
    }

    /// Expands frames according to already-computed timing
    #[must_use]
    pub fn from_timing(source_frame_count: usize, timing: &NormalizedTiming) -> Self {
        info!("Using balanced frame duration: {}ms", timing.uniform_duration);
        Self::with_frames(expand(source_frame_count, &timing.subdivision_counts), timing.uniform_duration)
    }

    fn with_frames(frames: ExpandedFrames, frame_duration_ms: u32) -> Self {
        if let Some(only) = frames.source_index(0).filter(|_| frames.is_single_frame()) {
            // A single frame is normalized to its own duration, so both copies keep it
            info!("Duplicating single frame for AVIF animation");
            return Self {
                frames: ExpandedFrames::from_indices(vec![only, only]),
                frame_duration_ms,
                duplicated_single_frame: true,
            };
        }
        Self {
            frames,
            frame_duration_ms,
            duplicated_single_frame: false,
        }
    }

    /// Length of the whole animation in ms
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        self.frames.len() as u64 * u64::from(self.frame_duration_ms)
    }
}

#[test]
fn balanced() {
    let p = EncodePlan::new(2, &[200, 100]);
    assert_eq!(p.frame_duration_ms, 100);
    assert_eq!(p.frames.iter().collect::<Vec<_>>(), [0, 0, 1]);
    assert_eq!(p.total_duration_ms(), 300);
    assert!(!p.duplicated_single_frame);
}

#[test]
fn single_frame_is_doubled() {
    let p = EncodePlan::new(1, &[500]);
    assert_eq!(p.frame_duration_ms, 500);
    assert_eq!(p.frames.iter().collect::<Vec<_>>(), [0, 0]);
    assert!(p.duplicated_single_frame);
}

#[test]
fn no_timing() {
    let p = EncodePlan::new(3, &[]);
    assert_eq!(p.frame_duration_ms, DEFAULT_FRAME_DURATION_MS);
    assert_eq!(p.frames.iter().collect::<Vec<_>>(), [0, 1, 2]);

    let p = EncodePlan::new(1, &[]);
    assert_eq!(p.frames.len(), 2);
}

#[test]
fn nothing() {
    let p = EncodePlan::new(0, &[]);
    assert!(p.frames.is_empty());
    assert_eq!(p.frame_duration_ms, DEFAULT_FRAME_DURATION_MS);
}

#[test]
#[should_panic]
fn mismatch() {
    let _ = EncodePlan::new(3, &[10, 20]);
}
