use crate::err::{GptError, Result};
use crate::gpt_parser::ReadSeek;
use crate::guid::Guid;
use crate::utils::ReadExt;

use log::{debug, warn};
use serde::{Serialize, Serializer};

pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
/// Size of the named fields, everything after this up to the end of the LBA is padding.
pub const GPT_HEADER_SIZE: u32 = 92;
pub const GPT_REVISION_1_0: u32 = 0x0001_0000;
/// Byte offset of `crc32_of_header` inside the header.
pub const HEADER_CRC_OFFSET: usize = 16;

pub const MIN_BLOCK_SIZE: u64 = 128;
pub const MAX_BLOCK_SIZE: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GptHeader {
    #[serde(serialize_with = "serialize_signature")]
    pub signature: [u8; 8],
    pub revision: u32,
    pub header_size_bytes: u32,
    pub crc32_of_header: u32,
    // Always zero once decoded.
    pub reserved: u32,
    pub lba_of_current: u64,
    pub lba_of_backup: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: Guid,
    pub lba_start_of_part_entries: u64,
    pub num_part_entries: u32,
    pub single_part_entry_size: u32,
    pub crc32_of_part_array: u32,
}

fn serialize_signature<S: Serializer>(
    signature: &[u8; 8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(signature))
}

pub(crate) fn ensure_valid_block_size(block_size: u64) -> Result<()> {
    if !block_size.is_power_of_two() || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(GptError::InvalidBlockSize { block_size });
    }
    Ok(())
}

impl GptHeader {
    /// Decodes the header starting at the stream's current position, which must be the start of
    /// the header LBA (LBA 1 for the primary header).
    ///
    /// Consumes exactly `block_size` bytes. Everything after the named fields must be zero.
    pub fn from_stream<T: ReadSeek>(stream: &mut T, block_size: u64) -> Result<GptHeader> {
        ensure_valid_block_size(block_size)?;

        let signature = stream.try_bytes_named::<8>("signature")?;
        if &signature != GPT_SIGNATURE {
            return Err(GptError::BadSignature { signature });
        }

        let revision = stream.try_u32_named("revision")?;
        let header_size_bytes = stream.try_u32_named("header_size_bytes")?;
        let crc32_of_header = stream.try_u32_named("crc32_of_header")?;

        let reserved = stream.try_u32_named("reserved")?;
        if reserved != 0 {
            return Err(GptError::NonZeroReserved { value: reserved });
        }

        let lba_of_current = stream.try_u64_named("lba_of_current")?;
        let lba_of_backup = stream.try_u64_named("lba_of_backup")?;
        let first_usable_lba = stream.try_u64_named("first_usable_lba")?;
        let last_usable_lba = stream.try_u64_named("last_usable_lba")?;
        let disk_guid = Guid::from_gpt_bytes(&stream.try_bytes_named::<16>("disk_guid")?);
        let lba_start_of_part_entries = stream.try_u64_named("lba_start_of_part_entries")?;
        let num_part_entries = stream.try_u32_named("num_part_entries")?;
        let single_part_entry_size = stream.try_u32_named("single_part_entry_size")?;
        let crc32_of_part_array = stream.try_u32_named("crc32_of_part_array")?;

        // The rest of the LBA must be zero-filled.
        let padding_len = (block_size - u64::from(GPT_HEADER_SIZE)) as usize;
        let padding = stream.try_vec_named(padding_len, "header padding")?;
        if let Some(position) = padding.iter().position(|&b| b != 0) {
            return Err(GptError::NonZeroPadding {
                offset: u64::from(GPT_HEADER_SIZE) + position as u64,
                value: padding[position],
            });
        }

        let header = GptHeader {
            signature,
            revision,
            header_size_bytes,
            crc32_of_header,
            reserved,
            lba_of_current,
            lba_of_backup,
            first_usable_lba,
            last_usable_lba,
            disk_guid,
            lba_start_of_part_entries,
            num_part_entries,
            single_part_entry_size,
            crc32_of_part_array,
        };

        header.warn_on_unusual_values();
        debug!("GPT header: {:#?}", header);

        Ok(header)
    }

    fn warn_on_unusual_values(&self) {
        if self.revision != GPT_REVISION_1_0 {
            warn!(
                "GPT header revision is {}, only 1.0 is defined",
                self.revision_string()
            );
        }
        if self.lba_of_current != 1 {
            warn!(
                "Primary GPT header claims to live at LBA {}, expected LBA 1",
                self.lba_of_current
            );
        }
        if self.first_usable_lba > self.last_usable_lba {
            warn!(
                "First usable LBA {} is past last usable LBA {}",
                self.first_usable_lba, self.last_usable_lba
            );
        }
    }

    /// `major.minor`, e.g. `1.0` for revision `0x00010000`.
    pub fn revision_string(&self) -> String {
        format!("{}.{}", self.revision >> 16, self.revision & 0xFFFF)
    }

    /// Number of blocks available to partitions, `None` if the range is inverted.
    pub fn usable_lba_count(&self) -> Option<u64> {
        self.last_usable_lba
            .checked_sub(self.first_usable_lba)
            .map(|span| span + 1)
    }

    /// Size of the packed entry array. Two `u32` factors cannot overflow a `u64`.
    pub fn partition_array_len(&self) -> u64 {
        u64::from(self.num_part_entries) * u64::from(self.single_part_entry_size)
    }

    pub fn partition_array_offset(&self, block_size: u64) -> Result<u64> {
        self.lba_start_of_part_entries
            .checked_mul(block_size)
            .ok_or(GptError::OffsetOverflow {
                what: "partition entry array",
            })
    }
}
