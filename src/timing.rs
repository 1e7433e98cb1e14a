//! Harmonizes per-frame GIF delays into one uniform frame duration
//!
//! The encoder accepts a single duration for every frame, so instead of varying durations
//! long frames are repeated. [`normalize()`] finds the duration and the repeat count of each frame.

use tracing::{debug, info};

/// Used when there's no timing information at all (25fps)
pub const DEFAULT_FRAME_DURATION_MS: u32 = 40;

/// Hard cap on halving rounds. Extreme outliers may not converge within it, and that's accepted.
pub const MAX_ITERATIONS: u32 = 10;

/// Longest frame may be at most 10% longer than the shortest
pub const RELATIVE_TOLERANCE: f64 = 1.1;

/// …or differ from it by at most this many milliseconds
pub const ABSOLUTE_TOLERANCE_MS: u32 = 10;

/// GIF delays shorter than this (in 1/100s) are played at [`DEFAULT_GIF_DELAY_CS`] by browsers
pub const MIN_GIF_DELAY_CS: u16 = 2;

/// Delay used for GIF frames with zero or too short delay, in 1/100s
pub const DEFAULT_GIF_DELAY_CS: u16 = 10;

/// Converts GIF delay (in 1/100s) to milliseconds, never less than 1ms
///
/// Delays of 0 and 1 are displayed as 100ms, the same as browsers and ffprobe do.
#[inline]
#[must_use]
pub fn delay_to_ms(delay_cs: u16) -> u32 {
    let delay_cs = if delay_cs < MIN_GIF_DELAY_CS { DEFAULT_GIF_DELAY_CS } else { delay_cs };
    (u32::from(delay_cs) * 10).max(1)
}

/// Working state for one source frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Display time of one repetition, in ms
    pub duration: u32,
    /// How many times the frame is repeated. Always a power of two.
    pub subdivisions: u32,
}

impl FrameRecord {
    #[inline]
    fn new(duration: u32) -> Self {
        Self { duration, subdivisions: 1 }
    }

    #[inline]
    fn split(&mut self) {
        self.duration /= 2;
        self.subdivisions *= 2;
    }
}

/// Result of [`normalize()`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTiming {
    /// Duration of every frame after expansion, in ms
    pub uniform_duration: u32,
    /// Repeat count per source frame, in source order
    pub subdivision_counts: Vec<u32>,
    /// Number of halving rounds that were performed
    pub iterations: u32,
    /// `false` if the iteration cap was hit before durations were within tolerance
    pub converged: bool,
}

impl NormalizedTiming {
    /// Number of frames after expansion
    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.subdivision_counts.iter().map(|&c| c as usize).sum()
    }
}

#[inline]
fn within_tolerance(min_duration: u32, max_duration: u32) -> bool {
    f64::from(max_duration) <= f64::from(min_duration) * RELATIVE_TOLERANCE
        || max_duration.abs_diff(min_duration) <= ABSOLUTE_TOLERANCE_MS
}

/// Durations are in milliseconds and must be ≥ 1 (see [`delay_to_ms()`]).
///
/// Repeatedly halves the longest frame(s) until all durations are within 10% or 10ms
/// of each other, then averages them into one uniform duration. Each frame's repeat count
/// times the uniform duration approximates its original duration.
///
/// Empty input gives [`DEFAULT_FRAME_DURATION_MS`] and no counts.
#[must_use]
pub fn normalize(durations: &[u32]) -> NormalizedTiming {
    if durations.is_empty() {
        return NormalizedTiming {
            uniform_duration: DEFAULT_FRAME_DURATION_MS,
            subdivision_counts: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }
    debug_assert!(durations.iter().all(|&d| d > 0));
    debug!("Original frame durations (ms): {durations:?}");

    let mut frames: Vec<_> = durations.iter().copied().map(FrameRecord::new).collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < MAX_ITERATIONS {
        let (min_duration, max_duration) = min_max(&frames);
        if within_tolerance(min_duration, max_duration) {
            converged = true;
            break;
        }

        // All ties are split together, otherwise the order of frames would affect the result
        let mut split_count = 0;
        for f in frames.iter_mut().filter(|f| f.duration == max_duration) {
            f.split();
            split_count += 1;
        }
        debug!("Iteration {iterations}: split {split_count} frame(s) to {}ms", max_duration / 2);
        iterations += 1;
    }
    if !converged {
        let (min_duration, max_duration) = min_max(&frames);
        converged = within_tolerance(min_duration, max_duration);
    }

    let total: u64 = frames.iter().map(|f| u64::from(f.duration)).sum();
    let uniform_duration = rounded_mean(total, frames.len() as u64);
    let subdivision_counts: Vec<_> = frames.iter().map(|f| f.subdivisions).collect();

    info!("Final frame durations (ms): {:?}", frames.iter().map(|f| f.duration).collect::<Vec<_>>());
    info!("Average uniform duration: {uniform_duration}ms");
    debug!("Frame duplication counts: {subdivision_counts:?}");
    info!("Total frames after balancing: {}", subdivision_counts.iter().sum::<u32>());

    NormalizedTiming {
        uniform_duration,
        subdivision_counts,
        iterations,
        converged,
    }
}

/// Rounds half to even, so 12.5 becomes 12
fn rounded_mean(total: u64, count: u64) -> u32 {
    let (q, r) = (total / count, total % count);
    let q = match (2 * r).cmp(&count) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => q + (q & 1),
    };
    u32::try_from(q).unwrap_or(u32::MAX)
}

fn min_max(frames: &[FrameRecord]) -> (u32, u32) {
    frames.iter().fold((u32::MAX, 0), |(min, max), f| (min.min(f.duration), max.max(f.duration)))
}

#[test]
fn empty() {
    let t = normalize(&[]);
    assert_eq!(t.uniform_duration, 40);
    assert!(t.subdivision_counts.is_empty());
    assert_eq!(t.total_frames(), 0);
}

#[test]
fn all_equal() {
    let t = normalize(&[70, 70, 70]);
    assert_eq!(t.uniform_duration, 70);
    assert_eq!(t.subdivision_counts, [1, 1, 1]);
    assert_eq!(t.iterations, 0);
    assert!(t.converged);

    let t = normalize(&[100, 100]);
    assert_eq!((t.uniform_duration, t.subdivision_counts), (100, vec![1, 1]));
}

#[test]
fn single_frame() {
    for d in [1, 10, 100, 65535, 1_000_000] {
        let t = normalize(&[d]);
        assert_eq!(t.uniform_duration, d);
        assert_eq!(t.subdivision_counts, [1]);
        assert_eq!(t.iterations, 0);
    }
}

#[test]
fn one_long_frame() {
    let t = normalize(&[200, 100]);
    assert_eq!(t.uniform_duration, 100);
    assert_eq!(t.subdivision_counts, [2, 1]);
    assert_eq!(t.iterations, 1);
    let total: u32 = t.subdivision_counts.iter().map(|c| c * t.uniform_duration).sum();
    assert_eq!(total, 300);
}

#[test]
fn ties_are_split_together() {
    let t = normalize(&[400, 100, 400]);
    assert_eq!(t.subdivision_counts, [4, 1, 4]);
    assert_eq!(t.uniform_duration, 100);
    assert_eq!(t.iterations, 2);
}

#[test]
fn large_outlier() {
    // 1000 → 500 → 250 → 125 → 62 → 31 → 15, and 15 is within 10ms of 10
    let t = normalize(&[1000, 10]);
    assert_eq!(t.iterations, 6);
    assert!(t.converged);
    assert_eq!(t.subdivision_counts, [64, 1]);
    assert_eq!(t.uniform_duration, 12); // (15 + 10) / 2, ties to even
}

#[test]
fn relative_tolerance() {
    // 10% apart isn't split even though the difference is over 10ms
    let t = normalize(&[1000, 1100]);
    assert_eq!(t.iterations, 0);
    assert_eq!(t.subdivision_counts, [1, 1]);
    assert_eq!(t.uniform_duration, 1050);

    // 1101 → 550, then 1000 → 500
    let t = normalize(&[1000, 1101]);
    assert_eq!(t.subdivision_counts, [2, 2]);
    assert_eq!(t.uniform_duration, 525);
}

#[test]
fn cap_is_best_effort() {
    let t = normalize(&[1, 100_000]);
    assert_eq!(t.iterations, MAX_ITERATIONS);
    assert!(!t.converged);
    assert_eq!(t.subdivision_counts, [1, 1024]);
    assert_eq!(t.uniform_duration, 49); // (1 + 97) / 2 rounded
}

#[test]
fn counts_are_powers_of_two() {
    let durations = [30, 70, 20, 500, 90, 90, 1230, 10, 1];
    let t = normalize(&durations);
    assert_eq!(t.subdivision_counts.len(), durations.len());
    assert!(t.iterations <= MAX_ITERATIONS);
    for c in &t.subdivision_counts {
        assert!(c.is_power_of_two(), "{c}");
    }
}

#[test]
fn idempotent() {
    let t = normalize(&[200, 100, 50, 400]);
    let again = normalize(&vec![t.uniform_duration; t.subdivision_counts.len()]);
    assert_eq!(again.iterations, 0);
    assert_eq!(again.uniform_duration, t.uniform_duration);
    assert!(again.subdivision_counts.iter().all(|&c| c == 1));
}

#[test]
fn mean_rounding() {
    assert_eq!(rounded_mean(25, 2), 12);
    assert_eq!(rounded_mean(27, 2), 14);
    assert_eq!(rounded_mean(10, 3), 3);
    assert_eq!(rounded_mean(11, 3), 4);
}

#[test]
fn gif_delays() {
    assert_eq!(delay_to_ms(0), 100);
    assert_eq!(delay_to_ms(1), 100);
    assert_eq!(delay_to_ms(2), 20);
    assert_eq!(delay_to_ms(7), 70);
}
