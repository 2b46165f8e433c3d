//! Reference writer used by the tests: builds real indexes by brute-force
//! seed search, using the same settings trait the evaluator reads with.
#![allow(dead_code)]

use hashbrown::HashSet;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use recsplit::{RecSplitIndex, RecSplitSettings, Split, UNIVERSAL_HASH_INDEX_SHIFT, UniversalHash};

/// Hash index used for nodes at `depth`; the root always uses index 0 and the
/// index changes every other level so descent exercises both the rehash and
/// the keep-hash paths.
pub fn hash_index_for_depth(depth: usize) -> u64 {
    (depth / 2) as u64
}

pub fn build_index<T, H, S>(keys: &[&T], hash: &H, settings: &S, average_bucket_size: u16) -> RecSplitIndex
where
    T: ?Sized,
    H: UniversalHash<T>,
    S: RecSplitSettings,
{
    let bucket_count = settings.bucket_count(keys.len(), average_bucket_size as usize);
    let mut buckets: Vec<Vec<&T>> = vec![Vec::new(); bucket_count];
    for &key in keys {
        let h0 = hash.universal_hash(key, 0);
        let b = if bucket_count == 1 {
            0
        } else {
            settings.reduce(h0, bucket_count)
        };
        buckets[b].push(key);
    }

    let mut index_starts = Vec::with_capacity(bucket_count);
    let mut entry_offsets = Vec::with_capacity(bucket_count + 1);
    let mut indexes = Vec::new();
    let mut offset = 0u32;
    for bucket in buckets {
        index_starts.push(indexes.len() as u32);
        entry_offsets.push(offset);
        offset += bucket.len() as u32;
        write_subtree(&bucket, 0, hash, settings, &mut indexes);
    }
    entry_offsets.push(offset);
    RecSplitIndex::new(average_bucket_size, index_starts, entry_offsets, indexes)
}

fn write_subtree<T, H, S>(keys: &[&T], depth: usize, hash: &H, settings: &S, out: &mut Vec<u64>)
where
    T: ?Sized,
    H: UniversalHash<T>,
    S: RecSplitSettings,
{
    let size = keys.len();
    if size < 2 {
        return;
    }
    let hash_index = hash_index_for_depth(depth);
    let hashes: Vec<u64> = keys.iter().map(|k| hash.universal_hash(k, hash_index)).collect();
    let slot = |entry: u64, h: u64, range: usize| settings.reduce(settings.supplemental_hash(h, entry), range);

    if size <= settings.leaf_size() {
        let entry = find_entry(hash_index, |entry| {
            let mut seen = vec![false; size];
            hashes.iter().all(|&h| !std::mem::replace(&mut seen[slot(entry, h, size)], true))
        });
        out.push(entry);
        return;
    }

    match settings.split(size) {
        Split::Unequal { first } => {
            let entry = find_entry(hash_index, |entry| {
                hashes.iter().filter(|&&h| slot(entry, h, size) < first).count() == first
            });
            out.push(entry);
            let (left, right): (Vec<_>, Vec<_>) = keys
                .iter()
                .zip(&hashes)
                .partition(|&(_, &h)| slot(entry, h, size) < first);
            let left: Vec<&T> = left.into_iter().map(|(k, _)| *k).collect();
            let right: Vec<&T> = right.into_iter().map(|(k, _)| *k).collect();
            write_subtree(&left, depth + 1, hash, settings, out);
            write_subtree(&right, depth + 1, hash, settings, out);
        }
        Split::Fanout(k) => {
            let child = size / k;
            let entry = find_entry(hash_index, |entry| {
                let mut counts = vec![0usize; k];
                for &h in &hashes {
                    counts[slot(entry, h, k)] += 1;
                }
                counts.iter().all(|&c| c == child)
            });
            out.push(entry);
            let mut children: Vec<Vec<&T>> = vec![Vec::with_capacity(child); k];
            for (&key, &h) in keys.iter().zip(&hashes) {
                children[slot(entry, h, k)].push(key);
            }
            for group in children {
                write_subtree(&group, depth + 1, hash, settings, out);
            }
        }
    }
}

fn find_entry(hash_index: u64, mut accept: impl FnMut(u64) -> bool) -> u64 {
    (0..=u32::MAX as u64)
        .map(|seed| (hash_index << UNIVERSAL_HASH_INDEX_SHIFT) | seed)
        .find(|&entry| accept(entry))
        .expect("no split seed separates these keys")
}

pub fn random_strings(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(n);
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let s = format!("key-{:016x}", rng.next_u64());
        if seen.insert(s.clone()) {
            out.push(s);
        }
    }
    out
}

pub fn random_u64s(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(n);
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let v = rng.next_u64();
        if seen.insert(v) {
            out.push(v);
        }
    }
    out
}

/// True if `slots` is a permutation of `0..slots.len()`.
pub fn is_permutation(slots: &[usize]) -> bool {
    let mut sorted = slots.to_vec();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, &s)| i == s)
}
