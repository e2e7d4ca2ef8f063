use std::io::SeekFrom;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::err::{GptError, Result};
use crate::gpt_parser::ReadSeek;

/// Little-endian primitive reads over a positioned stream.
///
/// Failures carry the offset the read started at, so a short image reports where it ran out.
pub trait ReadExt: ReadSeek + Sized {
    #[inline]
    fn try_seek_abs(&mut self, offset: u64) -> Result<u64> {
        self.seek(SeekFrom::Start(offset))
            .map_err(|source| GptError::SeekFailure { offset, source })
    }

    /// Current position, or `u64::MAX` if the stream cannot report one.
    #[inline]
    fn position_or_unknown(&mut self) -> u64 {
        self.tell().unwrap_or(u64::MAX)
    }

    #[inline]
    fn try_u8_named(&mut self, name: &'static str) -> Result<u8> {
        let offset = self.position_or_unknown();
        self.read_u8()
            .map_err(|e| GptError::truncated(name, offset, e))
    }

    #[inline]
    fn try_u16_named(&mut self, name: &'static str) -> Result<u16> {
        let offset = self.position_or_unknown();
        self.read_u16::<LittleEndian>()
            .map_err(|e| GptError::truncated(name, offset, e))
    }

    #[inline]
    fn try_u32_named(&mut self, name: &'static str) -> Result<u32> {
        let offset = self.position_or_unknown();
        self.read_u32::<LittleEndian>()
            .map_err(|e| GptError::truncated(name, offset, e))
    }

    #[inline]
    fn try_u64_named(&mut self, name: &'static str) -> Result<u64> {
        let offset = self.position_or_unknown();
        self.read_u64::<LittleEndian>()
            .map_err(|e| GptError::truncated(name, offset, e))
    }

    #[inline]
    fn try_bytes_named<const N: usize>(&mut self, name: &'static str) -> Result<[u8; N]> {
        let offset = self.position_or_unknown();
        let mut buf = [0_u8; N];
        self.read_exact(&mut buf)
            .map_err(|e| GptError::truncated(name, offset, e))?;
        Ok(buf)
    }

    /// Reads exactly `len` bytes into a fresh buffer. Callers bound `len` before calling.
    fn try_vec_named(&mut self, len: usize, name: &'static str) -> Result<Vec<u8>> {
        let offset = self.position_or_unknown();
        let mut buf = vec![0_u8; len];
        self.read_exact(&mut buf)
            .map_err(|e| GptError::truncated(name, offset, e))?;
        Ok(buf)
    }

    /// Fills `buf` completely, used for chunked reads of large regions.
    #[inline]
    fn try_fill_named(&mut self, buf: &mut [u8], name: &'static str) -> Result<()> {
        let offset = self.position_or_unknown();
        self.read_exact(buf)
            .map_err(|e| GptError::truncated(name, offset, e))
    }
}

impl<T: ReadSeek> ReadExt for T {}
