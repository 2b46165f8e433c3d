//! recsplit: read side of a RecSplit minimal perfect hash.
//!
//! - An offline writer splits N keys into buckets and each bucket, recursively,
//!   into subtrees small enough to be resolved by one seeded hash (a leaf).
//! - Each bucket's tree is flattened in pre-order into one `u64` array; a
//!   subtree's length depends only on its key count, so whole subtrees are
//!   skipped without reading them.
//! - [`RecSplitEvaluator`] loads that index and maps every indexed key to a
//!   distinct slot in `[0..N)`. Unknown keys get some slot in range too, so
//!   callers verify identity themselves.

mod error;
mod evaluator;
mod format;
mod hash;
mod settings;
mod util;

pub use error::RecSplitError;
pub use evaluator::RecSplitEvaluator;
pub use format::{ByteOrder, RecSplitIndex};
pub use hash::{IntegerHash, StringHash, UniversalHash};
pub use settings::{DefaultSettings, RecSplitSettings, Split, UNIVERSAL_HASH_INDEX_SHIFT};
