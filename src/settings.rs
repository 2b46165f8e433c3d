#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RecSplitError;

/// Bits of an index entry above this shift select the universal hash index;
/// the bits below are the node's split seed.
pub const UNIVERSAL_HASH_INDEX_SHIFT: u32 = 32;

/// How an interior node divides its keys between children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    /// `k` children of `size / k` keys each.
    Fanout(usize),
    /// Two children: `first` keys, then the rest.
    Unequal { first: usize },
}

impl Split {
    /// Decodes the signed form: positive `k` is a fan-out, negative `-m` an
    /// unequal split with `m` keys in the first child.
    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            Split::Unequal {
                first: raw.unsigned_abs() as usize,
            }
        } else {
            Split::Fanout(raw as usize)
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Split::Fanout(k) => k as i32,
            Split::Unequal { first } => -(first as i32),
        }
    }
}

/// Numeric policy shared by the writer and the evaluator.
///
/// Every method must return exactly what the writer used when it produced
/// the index. Nothing in the serialized form records these choices, so a
/// mismatch is not detectable and yields wrong but in-range slots.
///
/// Implementations of [`split`](Self::split) must, for any
/// `size > leaf_size()`, return either `Fanout(k)` with `k >= 2` and
/// `size % k == 0`, or `Unequal { first }` with `0 < first < size`.
pub trait RecSplitSettings {
    /// Number of top-level buckets for `total_keys` keys.
    fn bucket_count(&self, total_keys: usize, average_bucket_size: usize) -> usize;

    fn split(&self, size: usize) -> Split;

    /// Largest subtree resolved by a single leaf entry.
    fn leaf_size(&self) -> usize;

    /// Maps `hash` into `[0, range)`.
    fn reduce(&self, hash: u64, range: usize) -> usize;

    /// Mixes the current key hash with the entry of the node being visited.
    fn supplemental_hash(&self, hash: u64, entry: u64) -> u64;

    /// Seed index of the universal hash a node's entry was built against.
    fn universal_hash_index(&self, entry: u64) -> u64;
}

/// Default settings: leaves of up to `leaf_size` keys, grouped
/// `lower_aggregation` at a time by an equal fan-out, with unequal binary
/// splits above that.
///
/// Fields are only set through [`new`](Self::new), including when
/// deserialized, so `split` never sees a zero leaf size.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawSettings"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultSettings {
    leaf_size: usize,
    lower_aggregation: usize,
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawSettings {
    leaf_size: usize,
    lower_aggregation: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<RawSettings> for DefaultSettings {
    type Error = RecSplitError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        Self::new(raw.leaf_size, raw.lower_aggregation)
    }
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            leaf_size: 8,
            lower_aggregation: 5,
        }
    }
}

impl DefaultSettings {
    pub fn new(leaf_size: usize, lower_aggregation: usize) -> Result<Self, RecSplitError> {
        if leaf_size == 0 {
            return Err(RecSplitError::InvalidSettings(
                "leaf size must be at least 1".into(),
            ));
        }
        if lower_aggregation < 2 {
            return Err(RecSplitError::InvalidSettings(format!(
                "lower aggregation must be at least 2, got {lower_aggregation}"
            )));
        }
        if leaf_size.checked_mul(lower_aggregation).is_none() {
            return Err(RecSplitError::InvalidSettings(
                "leaf size times lower aggregation overflows".into(),
            ));
        }
        Ok(Self {
            leaf_size,
            lower_aggregation,
        })
    }

    /// Leaves grouped under one equal fan-out.
    pub fn lower_aggregation(&self) -> usize {
        self.lower_aggregation
    }

    #[inline]
    fn unit(&self) -> usize {
        self.leaf_size * self.lower_aggregation
    }
}

impl RecSplitSettings for DefaultSettings {
    fn bucket_count(&self, total_keys: usize, average_bucket_size: usize) -> usize {
        total_keys.div_ceil(average_bucket_size.max(1)).max(1)
    }

    fn split(&self, size: usize) -> Split {
        let leaf = self.leaf_size;
        let unit = self.unit();
        if size <= unit {
            if size % leaf == 0 {
                Split::Fanout(size / leaf)
            } else {
                Split::Unequal {
                    first: (size - 1) / leaf * leaf,
                }
            }
        } else {
            Split::Unequal {
                first: unit * ((size / 2) / unit).max(1),
            }
        }
    }

    #[inline]
    fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    #[inline]
    fn reduce(&self, hash: u64, range: usize) -> usize {
        ((hash as u128 * range as u128) >> 64) as usize
    }

    #[inline]
    fn supplemental_hash(&self, hash: u64, entry: u64) -> u64 {
        splitmix64(hash.wrapping_add(entry))
    }

    #[inline]
    fn universal_hash_index(&self, entry: u64) -> u64 {
        entry >> UNIVERSAL_HASH_INDEX_SHIFT
    }
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children(settings: &DefaultSettings, size: usize) -> Vec<usize> {
        match settings.split(size) {
            Split::Fanout(k) => vec![size / k; k],
            Split::Unequal { first } => vec![first, size - first],
        }
    }

    #[test]
    fn split_contract_holds_for_all_sizes() {
        for settings in [
            DefaultSettings::default(),
            DefaultSettings::new(1, 2).unwrap(),
            DefaultSettings::new(5, 3).unwrap(),
            DefaultSettings::new(16, 7).unwrap(),
        ] {
            for size in settings.leaf_size + 1..2_000 {
                match settings.split(size) {
                    Split::Fanout(k) => {
                        assert!(k >= 2, "size {size}: fan-out {k}");
                        assert_eq!(size % k, 0, "size {size}: fan-out {k}");
                    }
                    Split::Unequal { first } => {
                        assert!(first > 0 && first < size, "size {size}: first {first}");
                    }
                }
                assert_eq!(children(&settings, size).iter().sum::<usize>(), size);
            }
        }
    }

    #[test]
    fn default_split_shapes() {
        let s = DefaultSettings::default();
        assert_eq!(s.split(40), Split::Fanout(5));
        assert_eq!(s.split(16), Split::Fanout(2));
        assert_eq!(s.split(13), Split::Unequal { first: 8 });
        assert_eq!(s.split(20), Split::Unequal { first: 16 });
        assert_eq!(s.split(100), Split::Unequal { first: 40 });
        assert_eq!(s.split(400), Split::Unequal { first: 200 });
    }

    #[test]
    fn raw_split_encoding() {
        assert_eq!(Split::from_raw(3), Split::Fanout(3));
        assert_eq!(Split::from_raw(-7), Split::Unequal { first: 7 });
        assert_eq!(Split::Unequal { first: 7 }.to_raw(), -7);
        assert_eq!(Split::Fanout(4).to_raw(), 4);
    }

    #[test]
    fn reduce_stays_in_range() {
        let s = DefaultSettings::default();
        for range in [1usize, 2, 3, 10, 1_000_003] {
            for hash in [0u64, 1, u64::MAX / 3, u64::MAX] {
                assert!(s.reduce(hash, range) < range);
            }
        }
        assert_eq!(s.reduce(u64::MAX, 10), 9);
        assert_eq!(s.reduce(0, 10), 0);
    }

    #[test]
    fn bucket_count_rounds_up() {
        let s = DefaultSettings::default();
        assert_eq!(s.bucket_count(0, 100), 1);
        assert_eq!(s.bucket_count(100, 100), 1);
        assert_eq!(s.bucket_count(101, 100), 2);
        assert_eq!(s.bucket_count(1_000, 7), 143);
    }

    #[test]
    fn entry_layout() {
        let s = DefaultSettings::default();
        let entry = (3u64 << UNIVERSAL_HASH_INDEX_SHIFT) | 0xDEAD;
        assert_eq!(s.universal_hash_index(entry), 3);
        assert_eq!(s.universal_hash_index(0xFFFF_FFFF), 0);
    }

    #[test]
    fn rejects_degenerate_settings() {
        assert!(DefaultSettings::new(0, 5).is_err());
        assert!(DefaultSettings::new(8, 1).is_err());
        assert!(DefaultSettings::new(usize::MAX, 2).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializing_goes_through_validation() {
        let bytes = bincode::serialize(&DefaultSettings::new(4, 3).unwrap()).unwrap();
        let back: DefaultSettings = bincode::deserialize(&bytes).unwrap();
        assert_eq!((back.leaf_size(), back.lower_aggregation()), (4, 3));

        let zero_leaf = bincode::serialize(&(0usize, 5usize)).unwrap();
        assert!(bincode::deserialize::<DefaultSettings>(&zero_leaf).is_err());
        let no_aggregation = bincode::serialize(&(8usize, 1usize)).unwrap();
        assert!(bincode::deserialize::<DefaultSettings>(&no_aggregation).is_err());
    }
}
