use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecSplitError {
    #[error("index truncated while reading {field}: need {needed} bytes, {remaining} left")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("{0} trailing bytes after the last index entry")]
    TrailingBytes(usize),
    #[error("average bucket size must be non-zero")]
    ZeroAverageBucketSize,
    #[error("declared bucket count {declared} disagrees with computed bucket count {computed}")]
    BucketCountMismatch { declared: usize, computed: usize },
    #[error("expected {expected} entry offsets, found {actual}")]
    EntryOffsetCount { expected: usize, actual: usize },
    #[error("entry offsets must start at 0, found {0}")]
    FirstOffsetNonZero(usize),
    #[error("entry offsets decrease at bucket {bucket}")]
    EntryOffsetsNotMonotonic { bucket: usize },
    #[error("bucket {bucket} spans entries {start}..{end}, beyond limit {len}")]
    BucketOutOfBounds {
        bucket: usize,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("two keys map to slot {slot}")]
    Collision { slot: usize },
    #[error("expected {expected} keys, got {actual}")]
    KeyCountMismatch { expected: usize, actual: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serde(#[from] Box<bincode::ErrorKind>),
}

impl RecSplitError {
    /// True for the integrity failures a corrupt or foreign buffer produces.
    pub fn is_malformed_index(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::TrailingBytes(_)
                | Self::ZeroAverageBucketSize
                | Self::BucketCountMismatch { .. }
                | Self::EntryOffsetCount { .. }
                | Self::FirstOffsetNonZero(_)
                | Self::EntryOffsetsNotMonotonic { .. }
                | Self::BucketOutOfBounds { .. }
        )
    }
}
