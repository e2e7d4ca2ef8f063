use crate::checksum::{ChecksumOutcome, crc32};
use crate::err::{GptError, Result};
use crate::gpt_header::{GPT_HEADER_SIZE, GptHeader, HEADER_CRC_OFFSET, ensure_valid_block_size};
use crate::gpt_parser::ReadSeek;
use crate::utils::{ReadExt, hexdump};

use log::{Level, debug, log_enabled, trace};

/// The primary header always lives at LBA 1.
pub const PRIMARY_HEADER_LBA: u64 = 1;

impl GptHeader {
    /// Recomputes the header CRC from the raw on-disk bytes.
    ///
    /// The checksum covers the first `header_size_bytes` of the header LBA as stored, with the
    /// checksum field itself zeroed, so the bytes are re-read rather than re-serialized from
    /// `self`. A mismatch is reported through the returned outcome, never as an error.
    pub fn validate_header_checksum<T: ReadSeek>(
        &self,
        stream: &mut T,
        block_size: u64,
    ) -> Result<ChecksumOutcome> {
        debug!("Validating header checksum");
        ensure_valid_block_size(block_size)?;

        let header_size = u64::from(self.header_size_bytes);
        if header_size < u64::from(GPT_HEADER_SIZE) || header_size > block_size {
            return Err(GptError::HeaderSizeOutOfRange {
                header_size: self.header_size_bytes,
                block_size,
            });
        }

        let header_offset = PRIMARY_HEADER_LBA * block_size;
        stream.try_seek_abs(header_offset)?;
        let mut raw = stream.try_vec_named(header_size as usize, "raw header bytes")?;

        raw[HEADER_CRC_OFFSET..HEADER_CRC_OFFSET + 4].fill(0);

        if log_enabled!(Level::Trace) {
            trace!(
                "Header bytes used for checksum:\n{}",
                hexdump(&raw, header_offset)
            );
        }

        let outcome = ChecksumOutcome::new(self.crc32_of_header, crc32(&raw));
        debug!(
            "Expected checksum: {:#010x}, found: {:#010x}",
            outcome.expected(), outcome.computed()
        );

        Ok(outcome)
    }
}
