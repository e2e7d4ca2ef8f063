use crate::checksum::{ChecksumOutcome, Crc32};
use crate::err::{GptError, Result};
use crate::gpt_header::{GptHeader, ensure_valid_block_size};
use crate::gpt_parser::ReadSeek;
use crate::partition_entry::PartitionEntry;
use crate::utils::ReadExt;

use log::debug;

/// Upper bound on the entry array a header may ask us to read. The usual layout is
/// 128 entries of 128 bytes (16 KiB).
pub const DEFAULT_MAX_PARTITION_ARRAY_BYTES: u64 = 16 * 1024 * 1024;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// `remaining` capped at `max`, without truncating on targets where `usize` is narrower than `u64`.
fn chunk_len(remaining: u64, max: usize) -> usize {
    usize::try_from(remaining).unwrap_or(usize::MAX).min(max)
}

impl GptHeader {
    /// Byte offset and length of the entry array, after checking both against `max_bytes` and
    /// for arithmetic overflow. Nothing is allocated before this passes.
    pub fn partition_array_range(&self, block_size: u64, max_bytes: u64) -> Result<(u64, u64)> {
        ensure_valid_block_size(block_size)?;

        let len = self.partition_array_len();
        if len > max_bytes {
            return Err(GptError::PartitionArrayTooLarge {
                num_entries: self.num_part_entries,
                entry_size: self.single_part_entry_size,
                limit: max_bytes,
            });
        }

        let offset = self.partition_array_offset(block_size)?;
        offset.checked_add(len).ok_or(GptError::OffsetOverflow {
            what: "end of partition entry array",
        })?;

        Ok((offset, len))
    }

    /// Checksums the packed `num_part_entries * single_part_entry_size` bytes at
    /// `lba_start_of_part_entries` and compares against `crc32_of_part_array`.
    ///
    /// An empty array reads nothing and computes `0`.
    pub fn validate_partition_array_checksum<T: ReadSeek>(
        &self,
        stream: &mut T,
        block_size: u64,
        max_bytes: u64,
    ) -> Result<ChecksumOutcome> {
        debug!("Validating partition entry array checksum");
        let (offset, len) = self.partition_array_range(block_size, max_bytes)?;
        stream.try_seek_abs(offset)?;

        let mut hasher = Crc32::new();
        let mut buf = vec![0_u8; chunk_len(len, READ_CHUNK_SIZE)];
        let mut remaining = len;
        while remaining > 0 {
            let n = chunk_len(remaining, buf.len());
            stream.try_fill_named(&mut buf[..n], "partition entry array")?;
            hasher.update(&buf[..n]);
            remaining -= n as u64;
        }

        let outcome = ChecksumOutcome::new(self.crc32_of_part_array, hasher.finalize());
        debug!(
            "Expected checksum: {:#010x}, found: {:#010x}",
            outcome.expected(), outcome.computed()
        );

        Ok(outcome)
    }

    /// Decodes every slot of the entry array, used or not, in on-disk order.
    pub fn read_partition_entries<T: ReadSeek>(
        &self,
        stream: &mut T,
        block_size: u64,
        max_bytes: u64,
    ) -> Result<Vec<PartitionEntry>> {
        let (offset, _) = self.partition_array_range(block_size, max_bytes)?;
        if self.num_part_entries == 0 {
            return Ok(Vec::new());
        }

        stream.try_seek_abs(offset)?;
        (1..=self.num_part_entries)
            .map(|number| PartitionEntry::from_stream(stream, self.single_part_entry_size, number))
            .collect()
    }
}
