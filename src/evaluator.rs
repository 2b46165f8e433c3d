use std::borrow::Borrow;
use std::fs::File;
use std::marker::PhantomData;
use std::ops::Range;
use std::path::Path;

use memmap2::Mmap;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::error::RecSplitError;
use crate::format::{ByteOrder, RecSplitIndex};
use crate::hash::UniversalHash;
use crate::settings::{DefaultSettings, RecSplitSettings, Split};
use crate::util::BitSet;

/// Maps each key of the set an index was built for to a distinct slot in
/// `[0, len)`.
///
/// Keys outside that set still get some slot in range; callers that need
/// membership must compare the stored key themselves.
///
/// The evaluator is immutable once constructed and owns copies of the
/// index arrays, so it can be shared across threads freely and outlives
/// the buffer it was parsed from.
pub struct RecSplitEvaluator<T: ?Sized, H, S = DefaultSettings> {
    hash: H,
    settings: S,
    bucket_count: usize,
    leaf_size: usize,
    index_starts: Vec<u32>,
    entry_offsets: Vec<u32>,
    indexes: Vec<u64>,
    _key: PhantomData<fn(&T)>,
}

impl<T: ?Sized, H: UniversalHash<T>> RecSplitEvaluator<T, H, DefaultSettings> {
    /// Parses `buffer` with the default settings.
    pub fn new(buffer: &[u8], order: ByteOrder, hash: H) -> Result<Self, RecSplitError> {
        Self::with_settings(buffer, order, hash, DefaultSettings::default())
    }
}

impl<T: ?Sized, H: UniversalHash<T>, S: RecSplitSettings> RecSplitEvaluator<T, H, S> {
    /// Parses `buffer`, which must contain exactly one index written in
    /// `order` by a writer that used the same `hash` and `settings`.
    pub fn with_settings(
        buffer: &[u8],
        order: ByteOrder,
        hash: H,
        settings: S,
    ) -> Result<Self, RecSplitError> {
        let index = RecSplitIndex::parse(buffer, order).inspect_err(|e| {
            debug!(len = buffer.len(), error = %e, "rejected recsplit index buffer");
        })?;
        Self::from_index(index, hash, settings)
    }

    /// Reads an index file. The mapping is dropped before returning.
    pub fn open(
        path: impl AsRef<Path>,
        order: ByteOrder,
        hash: H,
        settings: S,
    ) -> Result<Self, RecSplitError> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is only read while parsing, which copies every
        // field out before the mapping is dropped at the end of this scope.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::with_settings(&mmap, order, hash, settings)
    }

    /// Checks `index` against `settings` and takes ownership of its arrays.
    pub fn from_index(index: RecSplitIndex, hash: H, settings: S) -> Result<Self, RecSplitError> {
        let RecSplitIndex {
            average_bucket_size,
            index_starts,
            entry_offsets,
            indexes,
        } = index;

        if average_bucket_size == 0 {
            return Err(RecSplitError::ZeroAverageBucketSize);
        }
        if entry_offsets.len() != index_starts.len() + 1 {
            return Err(RecSplitError::EntryOffsetCount {
                expected: index_starts.len() + 1,
                actual: entry_offsets.len(),
            });
        }
        let key_count = entry_offsets.last().map_or(0, |&n| n as usize);
        let bucket_count = settings.bucket_count(key_count, average_bucket_size as usize);
        if bucket_count == 0 {
            return Err(RecSplitError::InvalidSettings(
                "bucket count must be at least 1".into(),
            ));
        }
        if bucket_count != index_starts.len() {
            return Err(RecSplitError::BucketCountMismatch {
                declared: index_starts.len(),
                computed: bucket_count,
            });
        }
        if entry_offsets[0] != 0 {
            return Err(RecSplitError::FirstOffsetNonZero(entry_offsets[0] as usize));
        }
        if let Some(bucket) = entry_offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(RecSplitError::EntryOffsetsNotMonotonic { bucket });
        }

        let evaluator = Self {
            hash,
            leaf_size: settings.leaf_size(),
            settings,
            bucket_count,
            index_starts,
            entry_offsets,
            indexes,
            _key: PhantomData,
        };
        evaluator.check_bucket_bounds()?;
        debug!(
            keys = key_count,
            buckets = bucket_count,
            entries = evaluator.indexes.len(),
            "loaded recsplit index"
        );
        Ok(evaluator)
    }

    /// Every bucket's subtree must fit in `indexes` without running into the
    /// next bucket, so that descent never reads past its own entries.
    fn check_bucket_bounds(&self) -> Result<(), RecSplitError> {
        for bucket in 0..self.bucket_count {
            let start = self.index_starts[bucket] as usize;
            let end = self.skip(start, self.bucket_len(bucket));
            let limit = match self.index_starts.get(bucket + 1) {
                Some(&next) if end > start => (next as usize).max(start).min(self.indexes.len()),
                _ => self.indexes.len(),
            };
            if end > limit {
                return Err(RecSplitError::BucketOutOfBounds {
                    bucket,
                    start,
                    end,
                    len: limit,
                });
            }
        }
        Ok(())
    }

    /// Slot of `key` in `[0, len)`.
    pub fn evaluate(&self, key: &T) -> usize {
        let hash = self.hash.universal_hash(key, 0);
        let bucket = self.bucket_for_hash(hash);
        let add = self.entry_offsets[bucket] as usize;
        let size = self.bucket_len(bucket);
        let position = self.index_starts[bucket] as usize;
        self.descend(position, key, hash, add, size)
    }

    /// Walks one bucket's pre-order entries from the root to the leaf that
    /// holds `key`, rehashing only where the hash index changes.
    fn descend(
        &self,
        mut position: usize,
        key: &T,
        mut hash: u64,
        mut add: usize,
        mut size: usize,
    ) -> usize {
        let mut hash_index = None;
        loop {
            if size < 2 {
                return add;
            }
            let entry = self.indexes[position];
            let entry_hash_index = self.settings.universal_hash_index(entry);
            if hash_index.is_some_and(|current| current != entry_hash_index) {
                hash = self.hash.universal_hash(key, entry_hash_index);
            }
            hash_index = Some(entry_hash_index);

            let mixed = self.settings.supplemental_hash(hash, entry);
            if size <= self.leaf_size {
                return add + self.settings.reduce(mixed, size);
            }
            match self.settings.split(size) {
                Split::Unequal { first } => {
                    if self.settings.reduce(mixed, size) < first {
                        position += 1;
                        size = first;
                    } else {
                        position = self.skip(position + 1, first);
                        add += first;
                        size -= first;
                    }
                }
                Split::Fanout(k) => {
                    let child = size / k;
                    let chosen = self.settings.reduce(mixed, k);
                    position += 1 + chosen * self.subtree_len(child);
                    add += chosen * child;
                    size = child;
                }
            }
        }
    }

    /// Position just past the subtree of `size` keys starting at `position`.
    #[inline]
    pub fn skip(&self, position: usize, size: usize) -> usize {
        position + self.subtree_len(size)
    }

    /// Number of entries a subtree of `size` keys occupies. The layout of a
    /// subtree depends only on its size, so equal fan-out children share one
    /// computation, and the two sides of an unequal split can be counted in
    /// either order.
    pub fn subtree_len(&self, mut size: usize) -> usize {
        let mut total = 0;
        let mut copies = 1;
        loop {
            if size < 2 {
                return total;
            }
            total += copies;
            if size <= self.leaf_size {
                return total;
            }
            match self.settings.split(size) {
                Split::Fanout(k) => {
                    copies *= k;
                    size /= k;
                }
                Split::Unequal { first } => {
                    // Only the smaller side recurses, so depth stays below
                    // log2(size) whatever the split ratio.
                    let other = size - first;
                    total += copies * self.subtree_len(first.min(other));
                    size = first.max(other);
                }
            }
        }
    }

    #[inline]
    fn bucket_for_hash(&self, hash: u64) -> usize {
        if self.bucket_count == 1 {
            0
        } else {
            self.settings.reduce(hash, self.bucket_count)
        }
    }

    #[inline]
    fn bucket_len(&self, bucket: usize) -> usize {
        (self.entry_offsets[bucket + 1] - self.entry_offsets[bucket]) as usize
    }

    /// Bucket `key` falls into.
    pub fn bucket_of(&self, key: &T) -> usize {
        self.bucket_for_hash(self.hash.universal_hash(key, 0))
    }

    /// Slots owned by `bucket`.
    pub fn bucket_range(&self, bucket: usize) -> Range<usize> {
        self.entry_offsets[bucket] as usize..self.entry_offsets[bucket + 1] as usize
    }

    /// Number of keys, N.
    #[inline]
    pub fn len(&self) -> usize {
        self.entry_offsets[self.bucket_count] as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn universal_hash(&self) -> &H {
        &self.hash
    }

    /// Evaluates every key, in order.
    pub fn evaluate_many<K>(&self, keys: &[K]) -> Vec<usize>
    where
        K: Borrow<T> + Sync,
        Self: Sync,
    {
        #[cfg(feature = "parallel")]
        {
            keys.par_iter().map(|k| self.evaluate(k.borrow())).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            keys.iter().map(|k| self.evaluate(k.borrow())).collect()
        }
    }

    /// Checks that `keys` is the exact set the index was built for: every
    /// key lands on its own slot and all slots are covered.
    ///
    /// A failure usually means the hash or settings differ from the writer's.
    pub fn verify<'k, I>(&self, keys: I) -> Result<(), RecSplitError>
    where
        I: IntoIterator<Item = &'k T>,
        T: 'k,
    {
        let mut seen = BitSet::new(self.len());
        let mut count = 0usize;
        for key in keys {
            count += 1;
            if self.is_empty() {
                continue;
            }
            let slot = self.evaluate(key);
            if !seen.insert(slot) {
                return Err(RecSplitError::Collision { slot });
            }
        }
        if count != self.len() || seen.count_ones() != self.len() {
            return Err(RecSplitError::KeyCountMismatch {
                expected: self.len(),
                actual: count,
            });
        }
        Ok(())
    }
}

impl<T: ?Sized, H, S> std::fmt::Debug for RecSplitEvaluator<T, H, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecSplitEvaluator")
            .field("keys", &self.entry_offsets[self.bucket_count])
            .field("buckets", &self.bucket_count)
            .field("leaf_size", &self.leaf_size)
            .field("entries", &self.indexes.len())
            .finish()
    }
}
