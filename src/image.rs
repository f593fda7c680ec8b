use anyhow::{ensure, Result};

/// Loader magic, "ulp" plus a NUL.
pub const MAGIC: [u8; 4] = *b"ulp\0";

/// The 12-byte header in front of every loader image. All fields are
/// little-endian byte counts; `text_size` covers the boot and text
/// sections together, `data_size` the initialized data, `bss_size` the
/// zero-initialized data plus the stack reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub text_offset: u16,
    pub text_size: u16,
    pub data_size: u16,
    pub bss_size: u16,
}

impl Header {
    pub const LEN: usize = 12;

    pub fn parse(bin: &[u8]) -> Result<Self> {
        ensure!(
            bin.len() >= Self::LEN,
            "image of {} bytes is shorter than the {}-byte header",
            bin.len(),
            Self::LEN
        );
        ensure!(bin[0..4] == MAGIC, "bad image magic {:02x?}", &bin[0..4]);
        let half = |i: usize| u16::from_le_bytes([bin[i], bin[i + 1]]);
        Ok(Self {
            text_offset: half(4),
            text_size: half(6),
            data_size: half(8),
            bss_size: half(10),
        })
    }
}
