//! Serialized index layout.
//!
//! ```text
//! average_bucket_size   u16
//! declared_bucket_count u32
//! index_total_count     u32
//! index_starts          u32 * declared_bucket_count
//! entry_offsets         u32 * (declared_bucket_count + 1)
//! indexes               u64 * index_total_count
//! ```
//!
//! The byte order is chosen by the producer and is not recorded in the
//! buffer; callers pass it explicitly. No trailing bytes are allowed.

use bytes::{Buf, BufMut};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RecSplitError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Parsed, owned form of a serialized index. Structural consistency is
/// checked by the evaluator, which knows the settings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecSplitIndex {
    pub(crate) average_bucket_size: u16,
    pub(crate) index_starts: Vec<u32>,
    pub(crate) entry_offsets: Vec<u32>,
    pub(crate) indexes: Vec<u64>,
}

impl RecSplitIndex {
    /// `entry_offsets` holds one offset per bucket plus the total key count.
    pub fn new(
        average_bucket_size: u16,
        index_starts: Vec<u32>,
        entry_offsets: Vec<u32>,
        indexes: Vec<u64>,
    ) -> Self {
        debug_assert_eq!(
            entry_offsets.len(),
            index_starts.len() + 1,
            "one entry offset per bucket plus the total"
        );
        Self {
            average_bucket_size,
            index_starts,
            entry_offsets,
            indexes,
        }
    }

    /// Reads an index from `buf`, which must hold exactly one index.
    pub fn parse(mut buf: &[u8], order: ByteOrder) -> Result<Self, RecSplitError> {
        let mut r = Reader {
            buf: &mut buf,
            order,
        };
        let average_bucket_size = r.u16("average bucket size")?;
        let declared_bucket_count = r.u32("bucket count")? as usize;
        let index_total_count = r.u32("index count")? as usize;

        r.ensure("index starts", declared_bucket_count, 4)?;
        let index_starts = (0..declared_bucket_count).map(|_| r.get_u32()).collect();
        r.ensure("entry offsets", declared_bucket_count + 1, 4)?;
        let entry_offsets = (0..=declared_bucket_count).map(|_| r.get_u32()).collect();
        r.ensure("indexes", index_total_count, 8)?;
        let indexes = (0..index_total_count).map(|_| r.get_u64()).collect();

        if r.buf.has_remaining() {
            return Err(RecSplitError::TrailingBytes(r.buf.remaining()));
        }
        Ok(Self {
            average_bucket_size,
            index_starts,
            entry_offsets,
            indexes,
        })
    }

    /// Writes the index in the serialized layout.
    pub fn encode(&self, order: ByteOrder) -> Vec<u8> {
        // The bucket count field covers both arrays.
        debug_assert_eq!(self.entry_offsets.len(), self.index_starts.len() + 1);
        let mut out = Vec::with_capacity(self.encoded_len());
        match order {
            ByteOrder::Big => {
                out.put_u16(self.average_bucket_size);
                out.put_u32(self.index_starts.len() as u32);
                out.put_u32(self.indexes.len() as u32);
                self.index_starts.iter().for_each(|&v| out.put_u32(v));
                self.entry_offsets.iter().for_each(|&v| out.put_u32(v));
                self.indexes.iter().for_each(|&v| out.put_u64(v));
            }
            ByteOrder::Little => {
                out.put_u16_le(self.average_bucket_size);
                out.put_u32_le(self.index_starts.len() as u32);
                out.put_u32_le(self.indexes.len() as u32);
                self.index_starts.iter().for_each(|&v| out.put_u32_le(v));
                self.entry_offsets.iter().for_each(|&v| out.put_u32_le(v));
                self.indexes.iter().for_each(|&v| out.put_u64_le(v));
            }
        }
        out
    }

    pub fn encoded_len(&self) -> usize {
        2 + 4 + 4 + 4 * self.index_starts.len() + 4 * self.entry_offsets.len() + 8 * self.indexes.len()
    }

    #[inline]
    pub fn average_bucket_size(&self) -> u16 {
        self.average_bucket_size
    }

    #[inline]
    pub fn declared_bucket_count(&self) -> usize {
        self.index_starts.len()
    }

    /// Total number of keys, the last entry offset.
    #[inline]
    pub fn key_count(&self) -> usize {
        self.entry_offsets.last().map_or(0, |&n| n as usize)
    }

    pub fn index_starts(&self) -> &[u32] {
        &self.index_starts
    }

    pub fn entry_offsets(&self) -> &[u32] {
        &self.entry_offsets
    }

    pub fn indexes(&self) -> &[u64] {
        &self.indexes
    }

    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecSplitError> {
        Ok(bincode::serialize(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecSplitError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

struct Reader<'a, 'b> {
    buf: &'a mut &'b [u8],
    order: ByteOrder,
}

impl Reader<'_, '_> {
    fn ensure(&self, field: &'static str, count: usize, width: usize) -> Result<(), RecSplitError> {
        let needed = count.saturating_mul(width);
        if self.buf.remaining() < needed {
            return Err(RecSplitError::Truncated {
                field,
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, RecSplitError> {
        self.ensure(field, 1, 2)?;
        Ok(match self.order {
            ByteOrder::Big => self.buf.get_u16(),
            ByteOrder::Little => self.buf.get_u16_le(),
        })
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, RecSplitError> {
        self.ensure(field, 1, 4)?;
        Ok(self.get_u32())
    }

    // Callers must have checked the length with `ensure`.
    #[inline]
    fn get_u32(&mut self) -> u32 {
        match self.order {
            ByteOrder::Big => self.buf.get_u32(),
            ByteOrder::Little => self.buf.get_u32_le(),
        }
    }

    #[inline]
    fn get_u64(&mut self) -> u64 {
        match self.order {
            ByteOrder::Big => self.buf.get_u64(),
            ByteOrder::Little => self.buf.get_u64_le(),
        }
    }
}
