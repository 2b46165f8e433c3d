/// Fixed-size occupancy bitmap over `[0, len)`.
#[derive(Debug)]
pub(crate) struct BitSet {
    bits: Vec<u64>,
    len: usize,
}

impl BitSet {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Marks `idx`, returning false if it was already set.
    #[inline]
    pub(crate) fn insert(&mut self, idx: usize) -> bool {
        debug_assert!(idx < self.len);
        let (w, b) = (idx / 64, idx % 64);
        let fresh = (self.bits[w] >> b) & 1 == 0;
        self.bits[w] |= 1u64 << b;
        fresh
    }

    pub(crate) fn count_ones(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}
