#![deny(unused_must_use)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

pub use checksum::{ChecksumOutcome, Crc32, crc32};
pub use err::{GptError, Result};
pub use gpt_header::{GPT_HEADER_SIZE, GPT_SIGNATURE, GptHeader};
pub use gpt_parser::{DEFAULT_BLOCK_SIZE, GptParser, GptScan, ParserSettings, ReadSeek};
pub use guid::{Guid, GuidParseError};
pub use header_checksum::PRIMARY_HEADER_LBA;
pub use partition_array::DEFAULT_MAX_PARTITION_ARRAY_BYTES;
pub use partition_entry::{PARTITION_ENTRY_SIZE, PartitionAttributes, PartitionEntry};
pub use utils::{ReadExt, Utf16LeDecodeError, hexdump};

pub mod checksum;
pub mod err;
pub mod gpt_header;
pub mod gpt_parser;
pub mod guid;
pub mod header_checksum;
pub mod partition_array;
pub mod partition_entry;

mod utils;
