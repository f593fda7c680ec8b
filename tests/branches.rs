use ulp_rs::{Cpu, Trap, UlpRam};

// op=8 subOp=0: absolute jump; sel=1 takes the target from a register
fn enc_jump(jump_type: u32, addr: u32) -> u32 {
    (8 << 28) | (jump_type << 22) | ((addr & 0x7FF) << 2)
}

fn enc_jump_reg(jump_type: u32, rdst: u32) -> u32 {
    (8 << 28) | (jump_type << 22) | (1 << 21) | rdst
}

// op=8 subOp=1: step-relative jump on R0 vs threshold; cond 1 inverts
fn enc_jumpr(step: u32, cond: u32, threshold: u32) -> u32 {
    (8 << 28) | (1 << 25) | ((step & 0xFF) << 17) | ((cond & 1) << 16) | (threshold & 0xFFFF)
}

// op=8 subOp=2: step-relative jump on the stage counter
fn enc_jumps(step: u32, cond: u32, threshold: u32) -> u32 {
    (8 << 28) | (2 << 25) | ((step & 0xFF) << 17) | ((cond & 3) << 15) | (threshold & 0xFF)
}

fn enc_move_imm(rdst: u32, imm: u32) -> u32 {
    (7 << 28) | (1 << 25) | (4 << 21) | ((imm & 0xFFFF) << 4) | rdst
}

fn machine(words: &[u32]) -> (Cpu, UlpRam) {
    let mut ram = UlpRam::new();
    for (i, w) in words.iter().enumerate() {
        ram.set_word(i as u16, *w).unwrap();
    }
    (Cpu::new(), ram)
}

#[test]
fn unconditional_jump() {
    let (mut cpu, mut ram) = machine(&[enc_jump(0, 5)]);
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 5);
    assert_eq!(cpu.cycles, 4);
}

#[test]
fn jump_via_register() {
    let (mut cpu, mut ram) = machine(&[enc_jump_reg(0, 2)]);
    cpu.r[2] = 7;
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 7);
}

#[test]
fn jump_eq_follows_zero_flag() {
    // move r0, 0 sets zero; the eq jump is taken
    let (mut cpu, mut ram) = machine(&[enc_move_imm(0, 0), enc_jump(1, 9)]);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 9);

    // move r0, 1 clears zero; the eq jump falls through
    let (mut cpu, mut ram) = machine(&[enc_move_imm(0, 1), enc_jump(1, 9)]);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 2);
}

#[test]
fn jump_ov_follows_overflow_flag() {
    let (mut cpu, mut ram) = machine(&[enc_jump(2, 9)]);
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 1);
}

#[test]
fn jumpr_below_threshold() {
    let (mut cpu, mut ram) = machine(&[enc_move_imm(0, 3), enc_jumpr(4, 0, 5)]);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 1 + 4);
}

#[test]
fn jumpr_inverted_condition_is_ge() {
    let (mut cpu, mut ram) = machine(&[enc_move_imm(0, 5), enc_jumpr(4, 1, 5)]);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 1 + 4);

    let (mut cpu, mut ram) = machine(&[enc_move_imm(0, 4), enc_jumpr(4, 1, 5)]);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 2);
}

#[test]
fn jumpr_backward_step() {
    // bit 7 of the step flips direction; magnitude uses the low 7 bits
    let (mut cpu, mut ram) = machine(&[0, 0, 0, enc_jumpr(0x80 | 3, 0, 1)]);
    cpu.ip = 3;
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 0);
}

#[test]
fn jumps_compares_stage_counter() {
    // stage_inc 4
    let stage_inc = (7 << 28) | (2 << 25) | (4 << 4);
    let (mut cpu, mut ram) = machine(&[stage_inc, enc_jumps(3, 0, 5)]);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 1 + 3); // 4 < 5

    let (mut cpu, mut ram) = machine(&[stage_inc, enc_jumps(3, 1, 5)]);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 2); // 4 >= 5 is false

    let (mut cpu, mut ram) = machine(&[stage_inc, enc_jumps(3, 2, 4)]);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    assert_eq!(cpu.ip, 1 + 3); // 4 <= 4
}

#[test]
fn halt_word_is_a_decode_fault() {
    // the machine model stops decoding at op=11; a reached halt traps
    let (mut cpu, mut ram) = machine(&[0xB000_0000]);
    let err = cpu.step(&mut ram).unwrap_err();
    assert!(matches!(err, Trap::InvalidInstruction { ip: 0, .. }));
}

#[test]
fn wake_sets_the_flag() {
    let (mut cpu, mut ram) = machine(&[(9 << 28) | 1]);
    cpu.step(&mut ram).unwrap();
    assert!(cpu.wake);
    assert_eq!(cpu.ip, 1);
    assert_eq!(cpu.cycles, 6);
}
