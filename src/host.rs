use crate::cpu::{Cpu, Trap};
use crate::memory::UlpRam;

/// Host function codes written by the ULP into mailbox word 3.
const FN_ACK: u16 = 0;
const FN_DONE: u16 = 1;
const FN_PRINT_U16: u16 = 2;
const FN_PRINT_CHAR: u16 = 3;

/// Run the machine while playing the host side of the mailbox handshake.
///
/// The mailbox occupies the first five words of the data region: the two
/// Peterson mutex flags, the turn word, a function code and a parameter.
/// The host samples the ULP-side flag after every tick; the 1 -> 0 edge
/// means the ULP just released the mutex, at which point the pending
/// function code is consumed and acknowledged by clearing it.
///
/// Returns the accumulated output once the program signals done, or a
/// trap if the cycle budget runs out first.
pub fn run_with_host(cpu: &mut Cpu, ram: &mut UlpRam, max_cycles: u64) -> Result<String, Trap> {
    let base = cpu.data_offset();
    let mut out = String::new();
    let mut prev = 0u16;
    loop {
        if cpu.cycles >= max_cycles {
            return Err(Trap::Budget {
                budget: max_cycles,
                output: out,
            });
        }
        cpu.step(ram)?;
        let flag = low16(ram, base)?;
        if prev == 1 && flag == 0 {
            let code = low16(ram, base + 3)?;
            let param = low16(ram, base + 4)?;
            ram.set_word(base + 3, 0)
                .map_err(|source| Trap::Memory { addr: base + 3, source })?;
            match code {
                FN_ACK => {}
                FN_DONE => return Ok(out),
                FN_PRINT_U16 => out.push_str(&format!("{param} ")),
                FN_PRINT_CHAR => out.push((param & 0xFF) as u8 as char),
                code => {
                    return Err(Trap::Protocol { code, output: out });
                }
            }
        }
        prev = flag;
    }
}

fn low16(ram: &UlpRam, idx: u16) -> Result<u16, Trap> {
    ram.word(idx)
        .map(|w| w as u16)
        .map_err(|source| Trap::Memory { addr: idx, source })
}
