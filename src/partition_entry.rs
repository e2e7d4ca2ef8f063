use crate::err::{GptError, Result};
use crate::gpt_parser::ReadSeek;
use crate::guid::Guid;
use crate::utils::{
    ReadExt, Utf16LeDecodeError, decode_utf16le_bytes_z, decode_utf16le_bytes_z_lossy,
};

use bitflags::bitflags;
use log::{trace, warn};
use serde::{Serialize, Serializer};

/// Size of the named fields of an entry. Entries may be larger, the tail is reserved.
pub const PARTITION_ENTRY_SIZE: u32 = 128;
pub const PARTITION_NAME_LEN: usize = 72;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PartitionAttributes: u64 {
        /// Required for the platform to function, must not be deleted or moved.
        const PLATFORM_REQUIRED = 1 << 0;
        /// Firmware must not produce an `EFI_BLOCK_IO_PROTOCOL` for this partition.
        const NO_BLOCK_IO_PROTOCOL = 1 << 1;
        const LEGACY_BIOS_BOOTABLE = 1 << 2;
        /// Bits 48..=63, meaning depends on the partition type.
        const TYPE_SPECIFIC = 0xFFFF << 48;
    }
}

impl PartitionAttributes {
    pub fn type_specific_bits(&self) -> u16 {
        (self.bits() >> 48) as u16
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionEntry {
    /// 1-based position in the entry array, the way operating systems number partitions.
    pub number: u32,
    pub part_type_guid: Guid,
    pub unique_uuid: Guid,
    pub first_lba: u64,
    /// Inclusive.
    pub last_lba: u64,
    pub attr_flags: u64,
    #[serde(rename = "name", serialize_with = "serialize_name")]
    pub part_name: [u8; PARTITION_NAME_LEN],
}

fn serialize_name<S: Serializer>(
    name: &[u8; PARTITION_NAME_LEN],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&decode_utf16le_bytes_z_lossy(name))
}

impl PartitionEntry {
    /// Decodes one entry of `entry_size` bytes starting at the current position, leaving the
    /// stream at the start of the next entry.
    pub fn from_stream<T: ReadSeek>(stream: &mut T, entry_size: u32, number: u32) -> Result<Self> {
        if entry_size < PARTITION_ENTRY_SIZE {
            return Err(GptError::PartitionEntryTooSmall { entry_size });
        }

        let start = stream.position_or_unknown();

        let part_type_guid = Guid::from_gpt_bytes(&stream.try_bytes_named::<16>("part_type_guid")?);
        let unique_uuid = Guid::from_gpt_bytes(&stream.try_bytes_named::<16>("unique_uuid")?);
        let first_lba = stream.try_u64_named("first_lba")?;
        let last_lba = stream.try_u64_named("last_lba")?;
        let attr_flags = stream.try_u64_named("attr_flags")?;
        let part_name = stream.try_bytes_named::<PARTITION_NAME_LEN>("part_name")?;

        if entry_size > PARTITION_ENTRY_SIZE {
            let next = start
                .checked_add(u64::from(entry_size))
                .ok_or(GptError::OffsetOverflow {
                    what: "next partition entry",
                })?;
            stream.try_seek_abs(next)?;
        }

        let entry = PartitionEntry {
            number,
            part_type_guid,
            unique_uuid,
            first_lba,
            last_lba,
            attr_flags,
            part_name,
        };

        if entry.is_used() {
            trace!("Partition entry {}: {:?}", number, entry);
            if entry.last_lba < entry.first_lba {
                warn!(
                    "Partition {} ends at LBA {} before it starts at LBA {}",
                    number, entry.last_lba, entry.first_lba
                );
            }
        }

        Ok(entry)
    }

    /// Unused slots in the array have an all-zero type GUID.
    pub fn is_used(&self) -> bool {
        !self.part_type_guid.is_zero()
    }

    /// The partition name, decoded as UTF-16LE up to the first NUL.
    pub fn name(&self) -> std::result::Result<String, Utf16LeDecodeError> {
        decode_utf16le_bytes_z(&self.part_name)
    }

    /// Like [`PartitionEntry::name`], replacing invalid code units with U+FFFD.
    pub fn name_lossy(&self) -> String {
        decode_utf16le_bytes_z_lossy(&self.part_name)
    }

    pub fn raw_name(&self) -> &[u8; PARTITION_NAME_LEN] {
        &self.part_name
    }

    /// Number of blocks covered, `None` if the range is inverted.
    pub fn lba_count(&self) -> Option<u64> {
        self.last_lba
            .checked_sub(self.first_lba)
            .map(|span| span + 1)
    }

    pub fn attributes(&self) -> PartitionAttributes {
        PartitionAttributes::from_bits_retain(self.attr_flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_parses_partition_entry() {
        let mut entry = TestEntry::new(
            EFI_SYSTEM,
            "11111111-2222-3333-4444-555555555555",
            2048,
            206_847,
        );
        entry.attributes = 0x8000_0000_0000_0001;
        entry.name = "EFI System";
        let bytes = entry.to_bytes(128);

        let parsed = PartitionEntry::from_stream(&mut Cursor::new(&bytes[..]), 128, 1).unwrap();

        let mut expected_name = [0_u8; PARTITION_NAME_LEN];
        for (i, c) in "EFI System".bytes().enumerate() {
            expected_name[i * 2] = c;
        }
        assert_eq!(
            parsed,
            PartitionEntry {
                number: 1,
                part_type_guid: EFI_SYSTEM.parse().unwrap(),
                unique_uuid: "11111111-2222-3333-4444-555555555555".parse().unwrap(),
                first_lba: 2048,
                last_lba: 206_847,
                attr_flags: 0x8000_0000_0000_0001,
                part_name: expected_name,
            }
        );
        assert!(parsed.is_used());
        assert_eq!(parsed.name().unwrap(), "EFI System");
        assert_eq!(parsed.lba_count(), Some(204_800));
    }

    #[test]
    fn test_attribute_bits() {
        let entry = PartitionEntry {
            number: 1,
            part_type_guid: Guid::ZERO,
            unique_uuid: Guid::ZERO,
            first_lba: 0,
            last_lba: 0,
            attr_flags: 0x1004_0000_0000_0005,
            part_name: [0; PARTITION_NAME_LEN],
        };

        let attributes = entry.attributes();
        assert!(attributes.contains(PartitionAttributes::PLATFORM_REQUIRED));
        assert!(attributes.contains(PartitionAttributes::LEGACY_BIOS_BOOTABLE));
        assert!(!attributes.contains(PartitionAttributes::NO_BLOCK_IO_PROTOCOL));
        assert_eq!(attributes.type_specific_bits(), 0x1004);
        assert_eq!(attributes.bits(), entry.attr_flags);
        assert!(!entry.is_used());
    }

    #[test]
    fn test_skips_tail_of_larger_entries() {
        let first = TestEntry::new(LINUX_FILESYSTEM, DISK_GUID, 34, 99);
        let second = TestEntry::new(EFI_SYSTEM, DISK_GUID, 100, 199);
        let mut bytes = first.to_bytes(256);
        bytes[200] = 0xFF;
        bytes.extend(second.to_bytes(256));
        let mut cursor = Cursor::new(&bytes[..]);

        let a = PartitionEntry::from_stream(&mut cursor, 256, 1).unwrap();
        assert_eq!(cursor.position(), 256);
        let b = PartitionEntry::from_stream(&mut cursor, 256, 2).unwrap();

        assert_eq!(a.first_lba, 34);
        assert_eq!(b.first_lba, 100);
        assert_eq!(b.part_type_guid.to_string(), EFI_SYSTEM);
    }

    #[test]
    fn test_rejects_entries_smaller_than_layout() {
        let bytes = [0_u8; 128];
        assert!(matches!(
            PartitionEntry::from_stream(&mut Cursor::new(&bytes[..]), 64, 1),
            Err(GptError::PartitionEntryTooSmall { entry_size: 64 })
        ));
    }

    #[test]
    fn test_truncated_entry() {
        let bytes = TestEntry::new(EFI_SYSTEM, DISK_GUID, 1, 2).to_bytes(128);
        assert!(matches!(
            PartitionEntry::from_stream(&mut Cursor::new(&bytes[..100]), 128, 1),
            Err(GptError::ReadTruncated { what: "part_name", offset: 56, .. })
        ));
    }

    #[test]
    fn test_invalid_name_falls_back_to_lossy() {
        let mut bytes = TestEntry::new(EFI_SYSTEM, DISK_GUID, 1, 2).to_bytes(128);
        // lone high surrogate followed by 'A'
        bytes[56..60].copy_from_slice(&[0x00, 0xD8, 0x41, 0x00]);
        let entry = PartitionEntry::from_stream(&mut Cursor::new(&bytes[..]), 128, 1).unwrap();

        assert_eq!(entry.name(), Err(Utf16LeDecodeError::InvalidData));
        assert_eq!(entry.name_lossy(), "\u{FFFD}A");
        assert_eq!(serde_json::to_value(&entry).unwrap()["name"], "\u{FFFD}A");
    }
}
