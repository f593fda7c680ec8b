use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Words of RAM visible to the ULP. The loader reserves 8176 bytes; the
/// coprocessor addresses them as 32-bit words.
pub const RAM_WORDS: usize = 8176 / 4;

/// Mask the load/store units apply to an effective address.
pub const ADDR_MASK: u16 = 0x7FF;

#[derive(Clone, Serialize, Deserialize)]
pub struct UlpRam {
    words: Vec<u32>,
}

impl UlpRam {
    pub fn new() -> Self {
        Self {
            words: vec![0; RAM_WORDS],
        }
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Direct word access, used by instruction fetch and the host side of
    /// the mailbox. No address masking: an index past the RAM is a fault.
    pub fn word(&self, idx: u16) -> Result<u32> {
        match self.words.get(idx as usize) {
            Some(w) => Ok(*w),
            None => bail!("word index {idx:#05x} beyond the {RAM_WORDS}-word RAM"),
        }
    }

    pub fn set_word(&mut self, idx: u16, val: u32) -> Result<()> {
        match self.words.get_mut(idx as usize) {
            Some(w) => {
                *w = val;
                Ok(())
            }
            None => bail!("word index {idx:#05x} beyond the {RAM_WORDS}-word RAM"),
        }
    }

    /// Load-unit read: the effective address wraps modulo 2048 words.
    pub fn read(&self, addr: u16) -> Result<u32> {
        self.word(addr & ADDR_MASK)
    }

    /// Store-unit write, same wrapping as [`UlpRam::read`].
    pub fn write(&mut self, addr: u16, val: u32) -> Result<()> {
        self.set_word(addr & ADDR_MASK, val)
    }
}

impl Default for UlpRam {
    fn default() -> Self {
        Self::new()
    }
}
