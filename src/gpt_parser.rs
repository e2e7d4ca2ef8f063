use crate::checksum::ChecksumOutcome;
use crate::err::{GptError, Result};
use crate::gpt_header::GptHeader;
use crate::header_checksum::PRIMARY_HEADER_LBA;
use crate::partition_array::DEFAULT_MAX_PARTITION_ARRAY_BYTES;
use crate::partition_entry::PartitionEntry;
use crate::utils::ReadExt;

use log::{debug, info, warn};
use serde::Serialize;

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::Path;

pub const DEFAULT_BLOCK_SIZE: u64 = 512;

// Inspired by https://github.com/mitsuhiko/unbox/src/formats/cab.rs
pub trait ReadSeek: Read + Seek {
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }
}

impl<T: Read + Seek> ReadSeek for T {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserSettings {
    /// Logical block (sector) size of the image. Not discovered automatically.
    block_size: u64,
    /// Refuse partition entry arrays larger than this many bytes.
    max_partition_array_bytes: u64,
    /// Decode individual partition entries, in addition to checksumming the array.
    decode_entries: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            block_size: DEFAULT_BLOCK_SIZE,
            max_partition_array_bytes: DEFAULT_MAX_PARTITION_ARRAY_BYTES,
            decode_entries: true,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    pub fn block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn max_partition_array_bytes(mut self, max_bytes: u64) -> Self {
        self.max_partition_array_bytes = max_bytes;
        self
    }

    pub fn decode_entries(mut self, decode_entries: bool) -> Self {
        self.decode_entries = decode_entries;
        self
    }

    pub fn get_block_size(&self) -> u64 {
        self.block_size
    }

    pub fn get_max_partition_array_bytes(&self) -> u64 {
        self.max_partition_array_bytes
    }

    pub fn should_decode_entries(&self) -> bool {
        self.decode_entries
    }
}

/// Everything learned from one pass over the primary GPT.
///
/// The checksum outcomes are computed after the header is decoded and never feed back into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GptScan {
    pub block_size: u64,
    pub header: GptHeader,
    pub header_crc: ChecksumOutcome,
    pub part_array_crc: ChecksumOutcome,
    /// Every slot of the entry array. Empty when entry decoding is disabled or was skipped.
    pub entries: Vec<PartitionEntry>,
    /// Why the entries were not decoded, when the header's entry size is too small for the
    /// entry layout. The checksums above are unaffected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries_skipped: Option<String>,
}

impl GptScan {
    pub fn header_crc_ok(&self) -> bool {
        self.header_crc.is_valid()
    }

    pub fn part_array_crc_ok(&self) -> bool {
        self.part_array_crc.is_valid()
    }

    pub fn is_valid(&self) -> bool {
        self.header_crc_ok() && self.part_array_crc_ok()
    }

    pub fn used_entries(&self) -> impl Iterator<Item = &PartitionEntry> {
        self.entries.iter().filter(|e| e.is_used())
    }
}

pub struct GptParser<T: ReadSeek> {
    data: T,
    config: ParserSettings,
}

impl GptParser<BufReader<File>> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|source| GptError::FailedToOpenFile {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(GptParser::from_read_seek(BufReader::new(f)))
    }
}

impl GptParser<Cursor<Vec<u8>>> {
    pub fn from_buffer(buffer: Vec<u8>) -> Self {
        GptParser::from_read_seek(Cursor::new(buffer))
    }
}

impl<T: ReadSeek> GptParser<T> {
    /// Accepts any `Read + Seek`, including `&mut File`, so the caller can keep owning the handle.
    pub fn from_read_seek(read_seek: T) -> Self {
        GptParser {
            data: read_seek,
            config: ParserSettings::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    pub fn config(&self) -> &ParserSettings {
        &self.config
    }

    pub fn into_inner(self) -> T {
        self.data
    }

    /// Positions the stream at LBA 1 and decodes the primary header.
    pub fn read_header(&mut self) -> Result<GptHeader> {
        let block_size = self.config.block_size;
        let offset = PRIMARY_HEADER_LBA
            .checked_mul(block_size)
            .ok_or(GptError::OffsetOverflow { what: "LBA 1" })?;

        // Skip the protective MBR.
        self.data.try_seek_abs(offset)?;

        GptHeader::from_stream(&mut self.data, block_size)
    }

    /// Decodes the primary header, then runs both integrity checks.
    ///
    /// Structural problems abort with an error. Checksum mismatches do not; both checks always
    /// run and their outcomes are part of the returned [`GptScan`].
    pub fn parse(&mut self) -> Result<GptScan> {
        let block_size = self.config.block_size;
        let max_bytes = self.config.max_partition_array_bytes;

        let header = self.read_header()?;
        info!(
            "GPT header scanned successfully, disk {} with {} partition entries",
            header.disk_guid, header.num_part_entries
        );

        let header_crc = header.validate_header_checksum(&mut self.data, block_size)?;
        if !header_crc.is_valid() {
            warn!(
                "Header checksum mismatch: stored {:#010x}, computed {:#010x}",
                header_crc.expected(), header_crc.computed()
            );
        }

        let part_array_crc =
            header.validate_partition_array_checksum(&mut self.data, block_size, max_bytes)?;
        if !part_array_crc.is_valid() {
            warn!(
                "Partition entry array checksum mismatch: stored {:#010x}, computed {:#010x}",
                part_array_crc.expected(), part_array_crc.computed()
            );
        }

        let mut entries_skipped = None;
        let entries = if self.config.decode_entries {
            match header.read_partition_entries(&mut self.data, block_size, max_bytes) {
                Ok(entries) => entries,
                Err(e @ GptError::PartitionEntryTooSmall { .. }) => {
                    warn!("Not decoding partition entries: {}", e);
                    entries_skipped = Some(e.to_string());
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };
        debug!(
            "Decoded {} partition entries ({} in use)",
            entries.len(),
            entries.iter().filter(|e| e.is_used()).count()
        );

        Ok(GptScan {
            block_size,
            header,
            header_crc,
            part_array_crc,
            entries,
            entries_skipped,
        })
    }
}
