use crate::cpu::{Cpu, Flags, Trap};
use crate::decoder::{AluSel, Decoded, Op};
use crate::memory::{UlpRam, ADDR_MASK};

/// Execute one decoded instruction, advancing the instruction pointer and
/// the cycle counter (fetch time included, per the ULP timing tables).
pub fn exec(cpu: &mut Cpu, ram: &mut UlpRam, d: Decoded) -> Result<(), Trap> {
    match d.op {
        Op::Alu(sel) => {
            cpu.cycles += 6;
            cpu.ip = cpu.ip.wrapping_add(1);
            let a = cpu.r[d.rsrc as usize] as u32;
            let b = cpu.r[d.rsrc2 as usize] as u32;
            alu(cpu, sel, a, b, d.rdst, false);
        }
        Op::AluImm(sel) => {
            cpu.cycles += 6;
            cpu.ip = cpu.ip.wrapping_add(1);
            let a = cpu.r[d.rsrc as usize] as u32;
            alu(cpu, sel, a, d.imm as u32, d.rdst, true);
        }
        Op::StageInc => {
            cpu.cycles += 6;
            cpu.ip = cpu.ip.wrapping_add(1);
            cpu.sc = cpu.sc.wrapping_add(d.imm as u8);
        }
        Op::StageDec => {
            cpu.cycles += 6;
            cpu.ip = cpu.ip.wrapping_add(1);
            cpu.sc = cpu.sc.wrapping_sub(d.imm as u8);
        }
        Op::StageRst => {
            cpu.cycles += 6;
            cpu.ip = cpu.ip.wrapping_add(1);
            cpu.sc = 0;
        }
        Op::St => {
            // The store unit packs the instruction pointer and destination
            // register index into the upper half of the written word.
            let upper = ((cpu.ip << 5) as u32) | d.rdst as u32;
            let value = (upper << 16) | cpu.r[d.rsrc as usize] as u32;
            let addr = cpu.r[d.rdst as usize].wrapping_add(d.imm);
            ram.write(addr, value).map_err(|source| Trap::Memory {
                addr: addr & ADDR_MASK,
                source,
            })?;
            cpu.ip = cpu.ip.wrapping_add(1);
            cpu.cycles += 8;
        }
        Op::Ld => {
            let addr = cpu.r[d.rsrc as usize].wrapping_add(d.imm);
            let value = ram.read(addr).map_err(|source| Trap::Memory {
                addr: addr & ADDR_MASK,
                source,
            })?;
            cpu.r[d.rdst as usize] = value as u16;
            cpu.ip = cpu.ip.wrapping_add(1);
            cpu.cycles += 8;
        }
        Op::Jump | Op::JumpEq | Op::JumpOv => {
            cpu.cycles += 4;
            let target = if d.reg_target {
                cpu.r[d.rdst as usize]
            } else {
                d.imm
            };
            let taken = match d.op {
                Op::Jump => true,
                Op::JumpEq => cpu.flags.contains(Flags::ZERO),
                _ => cpu.flags.contains(Flags::OVERFLOW),
            };
            if taken {
                cpu.ip = target;
            } else {
                cpu.ip = cpu.ip.wrapping_add(1);
            }
        }
        Op::Jumpr => {
            cpu.cycles += 4;
            let mut taken = cpu.r[0] < d.imm;
            if d.cond == 1 {
                taken = !taken;
            }
            branch_step(cpu, d.step, taken);
        }
        Op::Jumps => {
            cpu.cycles += 4;
            let threshold = d.imm as u8;
            let taken = match d.cond {
                0 => cpu.sc < threshold,
                1 => cpu.sc >= threshold,
                _ => cpu.sc <= threshold,
            };
            branch_step(cpu, d.step, taken);
        }
        Op::Wake => {
            cpu.wake = true;
            cpu.ip = cpu.ip.wrapping_add(1);
            cpu.cycles += 6;
        }
    }
    Ok(())
}

/// Relative branch with a sign-magnitude step: bit 7 selects direction,
/// the low seven bits are the word distance.
fn branch_step(cpu: &mut Cpu, step: u8, taken: bool) {
    if !taken {
        cpu.ip = cpu.ip.wrapping_add(1);
        return;
    }
    let distance = (step & 0x7F) as u16;
    if step & 0x80 != 0 {
        cpu.ip = cpu.ip.wrapping_sub(distance);
    } else {
        cpu.ip = cpu.ip.wrapping_add(distance);
    }
}

fn alu(cpu: &mut Cpu, sel: AluSel, a: u32, b: u32, rdst: u8, imm_form: bool) {
    let out = match sel {
        AluSel::Add => {
            let out = a.wrapping_add(b);
            cpu.flags.set(Flags::OVERFLOW, out > 0xFFFF);
            out
        }
        AluSel::Sub => {
            let out = a.wrapping_sub(b);
            cpu.flags.set(Flags::OVERFLOW, out > 0xFFFF);
            out
        }
        AluSel::And => a & b,
        AluSel::Or => a | b,
        AluSel::Move => {
            // register move copies rsrc; the immediate form copies imm
            if imm_form {
                b
            } else {
                a
            }
        }
        AluSel::Lsh => {
            if b >= 32 {
                0
            } else {
                a << b
            }
        }
        AluSel::Rsh => {
            if b >= 32 {
                0
            } else {
                a >> b
            }
        }
    };
    let out16 = out as u16;
    cpu.r[rdst as usize] = out16;
    cpu.flags.set(Flags::ZERO, out16 == 0);
}
