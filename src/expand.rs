//! Repeats source frames so that a uniform frame rate reproduces the original timing

/// Playback order of frames, as indices into the decoded source frames
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpandedFrames {
    indices: Vec<usize>,
}

impl ExpandedFrames {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// AVIF needs at least two frames to be an animation rather than a still image
    #[inline]
    #[must_use]
    pub fn is_single_frame(&self) -> bool {
        self.indices.len() == 1
    }

    /// Index of the source frame displayed at position `i`
    #[inline]
    #[must_use]
    pub fn source_index(&self, i: usize) -> Option<usize> {
        self.indices.get(i).copied()
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Resolves indices against the decoded frames.
    ///
    /// Panics if `source` is shorter than the sequence was expanded for.
    pub fn frames<'a, T>(&'a self, source: &'a [T]) -> impl ExactSizeIterator<Item = &'a T> + 'a {
        self.indices.iter().map(move |&i| &source[i])
    }

    /// How many consecutive copies of each source frame there are, as `(source_index, count)`
    pub fn runs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.indices.chunk_by(|a, b| a == b).map(|run| (run[0], run.len()))
    }

    pub(crate) fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
}

impl<'a> IntoIterator for &'a ExpandedFrames {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, usize>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.indices.iter().copied()
    }
}

/// Frame `i` is repeated `subdivision_counts[i]` times, in source order.
///
/// Panics if there isn't exactly one count per source frame. That means the decoder
/// and the timing code disagree about the number of frames, which is a bug, not bad input.
#[must_use]
pub fn expand(source_frame_count: usize, subdivision_counts: &[u32]) -> ExpandedFrames {
    assert_eq!(source_frame_count, subdivision_counts.len(), "frame count doesn't match timing information");

    let total = subdivision_counts.iter().map(|&c| c as usize).sum();
    let mut indices = Vec::with_capacity(total);
    for (i, &count) in subdivision_counts.iter().enumerate() {
        indices.extend(std::iter::repeat(i).take(count as usize));
    }
    ExpandedFrames { indices }
}

#[test]
fn repeats_in_order() {
    let e = expand(3, &[2, 1, 3]);
    assert_eq!(e.len(), 6);
    assert_eq!(e.iter().collect::<Vec<_>>(), [0, 0, 1, 2, 2, 2]);

    let src = ['A', 'B', 'C'];
    assert_eq!(e.frames(&src).collect::<String>(), "AABCCC");
    assert_eq!(e.runs().collect::<Vec<_>>(), [(0, 2), (1, 1), (2, 3)]);
    assert!(!e.is_single_frame());
}

#[test]
fn identity() {
    let e = expand(4, &[1, 1, 1, 1]);
    assert_eq!((&e).into_iter().collect::<Vec<_>>(), [0, 1, 2, 3]);
    assert_eq!(e.source_index(3), Some(3));
    assert_eq!(e.source_index(4), None);
}

#[test]
fn single() {
    let e = expand(1, &[1]);
    assert!(e.is_single_frame());
    let e = expand(0, &[]);
    assert!(e.is_empty());
    assert!(!e.is_single_frame());
}

#[test]
#[should_panic(expected = "frame count doesn't match")]
fn count_mismatch() {
    let _ = expand(2, &[1, 1, 1]);
}
