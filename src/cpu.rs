use anyhow::{ensure, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::decoder::decode;
use crate::exec;
use crate::image::Header;
use crate::memory::{UlpRam, RAM_WORDS};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Flags: u8 {
        const ZERO = 1 << 0;
        const OVERFLOW = 1 << 1;
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Trap {
    #[error("invalid instruction {raw:#010x} at {ip:#06x}")]
    InvalidInstruction { ip: u16, raw: u32 },
    #[error("memory fault at word {addr:#05x}: {source}")]
    Memory {
        addr: u16,
        #[source]
        source: anyhow::Error,
    },
    #[error("exceeded cycle budget of {budget}, output so far {output:?}")]
    Budget { budget: u64, output: String },
    #[error("unknown host function code {code}, output so far {output:?}")]
    Protocol { code: u16, output: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub r: [u16; 4],       // general registers R0..R3
    pub flags: Flags,      // zero and overflow, updated by the ALU
    pub sc: u8,            // stage counter
    pub ip: u16,           // instruction pointer, word-addressed
    pub wake: bool,        // set once a wake/sleep encoding retires
    pub cycles: u64,
    data_offset: u16,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            r: [0; 4],
            flags: Flags::empty(),
            sc: 0,
            ip: 0,
            wake: false,
            cycles: 0,
            data_offset: 0,
        }
    }

    /// RAM word index where the program's data region begins; the host
    /// mailbox occupies its first five words.
    pub fn data_offset(&self) -> u16 {
        self.data_offset
    }

    /// Copy a loader image into RAM and reset the execution counters.
    /// Everything after the header lands at word 0; the header's text size
    /// tells us where the data region starts.
    pub fn load(&mut self, ram: &mut UlpRam, bin: &[u8]) -> Result<()> {
        let header = Header::parse(bin)?;
        let start = header.text_offset as usize;
        ensure!(start <= bin.len(), "text offset {start} beyond image");
        let code = &bin[start..];
        ensure!(
            code.len() / 4 <= RAM_WORDS,
            "image of {} words does not fit in the {RAM_WORDS}-word RAM",
            code.len() / 4
        );
        ram.clear();
        for (i, chunk) in code.chunks_exact(4).enumerate() {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            ram.set_word(i as u16, word)?;
        }
        self.data_offset = header.text_size / 4;
        self.ip = 0;
        self.cycles = 0;
        Ok(())
    }

    /// Fetch, decode and execute one instruction.
    pub fn step(&mut self, ram: &mut UlpRam) -> Result<(), Trap> {
        let ip = self.ip;
        let raw = ram.word(ip).map_err(|source| Trap::Memory { addr: ip, source })?;
        let d = decode(raw).ok_or(Trap::InvalidInstruction { ip, raw })?;
        exec::exec(self, ram, d)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
