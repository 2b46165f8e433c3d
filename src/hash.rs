use xxhash_rust::xxh3::xxh3_64_with_seed;

/// A family of hash functions indexed by a seed.
///
/// `universal_hash(key, index)` must be a pure function of `(key, index)`.
/// Two distinct keys may collide for one index but must separate for some
/// larger index, otherwise no split seed can tell them apart.
pub trait UniversalHash<T: ?Sized> {
    fn universal_hash(&self, key: &T, index: u64) -> u64;
}

impl<T: ?Sized, F> UniversalHash<T> for F
where
    F: Fn(&T, u64) -> u64,
{
    #[inline]
    fn universal_hash(&self, key: &T, index: u64) -> u64 {
        self(key, index)
    }
}

/// String and byte keys, backed by xxh3 seeded with the hash index.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringHash;

impl UniversalHash<[u8]> for StringHash {
    #[inline]
    fn universal_hash(&self, key: &[u8], index: u64) -> u64 {
        xxh3_64_with_seed(key, index)
    }
}

impl UniversalHash<str> for StringHash {
    #[inline]
    fn universal_hash(&self, key: &str, index: u64) -> u64 {
        xxh3_64_with_seed(key.as_bytes(), index)
    }
}

impl UniversalHash<String> for StringHash {
    #[inline]
    fn universal_hash(&self, key: &String, index: u64) -> u64 {
        xxh3_64_with_seed(key.as_bytes(), index)
    }
}

impl UniversalHash<Vec<u8>> for StringHash {
    #[inline]
    fn universal_hash(&self, key: &Vec<u8>, index: u64) -> u64 {
        xxh3_64_with_seed(key, index)
    }
}

/// Integer keys, backed by wyhash over the little-endian key bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntegerHash;

macro_rules! integer_hash {
    ($($t:ty),*) => {
        $(
            impl UniversalHash<$t> for IntegerHash {
                #[inline]
                fn universal_hash(&self, key: &$t, index: u64) -> u64 {
                    wyhash::wyhash(&key.to_le_bytes(), index)
                }
            }
        )*
    };
}

integer_hash!(u32, u64, i32, i64, usize);
