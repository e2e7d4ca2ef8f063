//! Table-driven CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`).
//!
//! This is the checksum GPT uses for both the header and the partition entry array, and the
//! same one zlib, PNG and Ethernet use: init `0xFFFFFFFF`, reflected input and output, final
//! complement.

use serde::Serialize;

const POLYNOMIAL: u32 = 0xEDB8_8320;

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0_u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-32 of `data` in one shot.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(data);
    hasher.finalize()
}

/// Incremental CRC-32, for inputs that are read in chunks.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    acc: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Crc32 { acc: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut acc = self.acc;
        for &byte in data {
            acc = CRC32_TABLE[((acc ^ u32::from(byte)) & 0xFF) as usize] ^ (acc >> 8);
        }
        self.acc = acc;
    }

    pub fn finalize(self) -> u32 {
        self.acc ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of comparing a stored checksum against one computed from the on-disk bytes.
///
/// Only constructible through [`ChecksumOutcome::new`], so `valid` always agrees with the
/// two checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecksumOutcome {
    expected: u32,
    computed: u32,
    valid: bool,
}

impl ChecksumOutcome {
    pub fn new(expected: u32, computed: u32) -> Self {
        ChecksumOutcome {
            expected,
            computed,
            valid: expected == computed,
        }
    }

    /// The checksum stored on disk.
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// The checksum recomputed from the bytes that were read.
    pub fn computed(&self) -> u32 {
        self.computed
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}
