use thiserror::Error;

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, GptError>;

/// Every variant is terminal for the call that produced it.
///
/// Checksum mismatches are deliberately absent: they are reported as data through
/// [`crate::ChecksumOutcome`].
#[derive(Debug, Error)]
pub enum GptError {
    #[error("Offset {offset}: Failed to read {what}, input is truncated: {source}")]
    ReadTruncated {
        what: &'static str,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("Invalid GPT header signature, expected `EFI PART`, found `{signature:02X?}`")]
    BadSignature { signature: [u8; 8] },

    #[error("Corrupt GPT header, reserved field at offset 20 is {value:#010x} (expected 0)")]
    NonZeroReserved { value: u32 },

    #[error(
        "Corrupt GPT header, found non-zero byte {value:#04x} at offset {offset} of the header LBA (expected zero padding)"
    )]
    NonZeroPadding { offset: u64, value: u8 },

    #[error("Failed to seek to offset {offset}: {source}")]
    SeekFailure {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("Block size {block_size} is invalid, must be a power of two between 128 and 65536")]
    InvalidBlockSize { block_size: u64 },

    #[error("Header size {header_size} is out of range (expected 92..={block_size})")]
    HeaderSizeOutOfRange { header_size: u32, block_size: u64 },

    #[error(
        "Partition array of {num_entries} entries x {entry_size} bytes exceeds the limit of {limit} bytes"
    )]
    PartitionArrayTooLarge {
        num_entries: u32,
        entry_size: u32,
        limit: u64,
    },

    #[error("Partition entry size {entry_size} is smaller than the 128 byte entry layout")]
    PartitionEntryTooSmall { entry_size: u32 },

    #[error("Computing the byte offset of {what} overflowed")]
    OffsetOverflow { what: &'static str },

    #[error("Failed to open file {}: {source}", path.display())]
    FailedToOpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GptError {
    pub(crate) fn truncated(what: &'static str, offset: u64, source: io::Error) -> Self {
        GptError::ReadTruncated {
            what,
            offset,
            source,
        }
    }

    /// Structural errors mean the image cannot be read as a GPT: a truncated read, a failed
    /// seek, or a header whose layout or fields are malformed.
    ///
    /// Failing to open the input and an invalid configured block size are not structural.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GptError::ReadTruncated { .. }
                | GptError::SeekFailure { .. }
                | GptError::BadSignature { .. }
                | GptError::NonZeroReserved { .. }
                | GptError::NonZeroPadding { .. }
                | GptError::HeaderSizeOutOfRange { .. }
                | GptError::PartitionArrayTooLarge { .. }
                | GptError::PartitionEntryTooSmall { .. }
                | GptError::OffsetOverflow { .. }
        )
    }
}
