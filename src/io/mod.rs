//! Byte-range I/O for slide files.
//!
//! Slides are read through [`RangeReader`], backed by a local file
//! ([`FileRangeReader`]) and usually wrapped in a [`BlockCache`].

mod block_cache;
mod file_reader;
mod range_reader;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
pub use file_reader::FileRangeReader;
pub use range_reader::{
    check_range, read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le,
    RangeReader,
};
