mod hexdump;
mod read_ext;
mod utf16;

pub use self::hexdump::hexdump;
pub use self::read_ext::ReadExt;
pub use self::utf16::Utf16LeDecodeError;
pub(crate) use self::utf16::{decode_utf16le_bytes_z, decode_utf16le_bytes_z_lossy};
