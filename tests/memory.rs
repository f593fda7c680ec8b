use ulp_rs::{Cpu, Trap, UlpRam};

// op=6: store R[rsrc] at R[rdst]+offset
fn enc_st(rsrc: u32, rdst: u32, offset: u32) -> u32 {
    (6 << 28) | (4 << 25) | ((offset & 0x7FF) << 10) | (rdst << 2) | rsrc
}

// op=13: load R[rdst] from R[rsrc]+offset
fn enc_ld(rdst: u32, rsrc: u32, offset: u32) -> u32 {
    (13 << 28) | ((offset & 0x7FF) << 10) | (rsrc << 2) | rdst
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
fn store_packs_ip_and_register_into_upper_half() {
    let program = [
        enc_move_imm(1, 0xBEEF),
        enc_move_imm(2, 32),
        enc_st(1, 2, 4),
    ];
    let (mut cpu, mut ram) = machine(&program);
    for _ in 0..3 {
        cpu.step(&mut ram).unwrap();
    }
    // the store executed at word 2 with destination register r2
    let expected = (((2u32 << 5) | 2) << 16) | 0xBEEF;
    assert_eq!(ram.word(36).unwrap(), expected);
    assert_eq!(cpu.cycles, 6 + 6 + 8);
}

#[test]
fn load_reads_the_lower_half() {
    let program = [
        enc_move_imm(1, 0xBEEF),
        enc_move_imm(2, 32),
        enc_st(1, 2, 4),
        enc_ld(3, 2, 4),
    ];
    let (mut cpu, mut ram) = machine(&program);
    for _ in 0..4 {
        cpu.step(&mut ram).unwrap();
    }
    assert_eq!(cpu.r[3], 0xBEEF);
}

#[test]
fn negative_offset_wraps_modulo_ram() {
    // offset 0x7FF is -1 in the 11-bit field
    let program = [
        enc_move_imm(1, 0x1234),
        enc_move_imm(2, 8),
        enc_st(1, 2, 0x7FF),
        enc_ld(0, 2, 0x7FF),
    ];
    let (mut cpu, mut ram) = machine(&program);
    for _ in 0..4 {
        cpu.step(&mut ram).unwrap();
    }
    assert_eq!(ram.word(7).unwrap() & 0xFFFF, 0x1234);
    assert_eq!(cpu.r[0], 0x1234);
}

#[test]
fn access_past_ram_is_a_memory_fault() {
    // word 2044 is inside the 2048-word address space but outside RAM
    let program = [enc_move_imm(2, 2044), enc_st(0, 2, 0)];
    let (mut cpu, mut ram) = machine(&program);
    cpu.step(&mut ram).unwrap();
    let err = cpu.step(&mut ram).unwrap_err();
    assert!(matches!(err, Trap::Memory { addr: 2044, .. }));
}

#[test]
fn fetch_past_ram_is_a_memory_fault() {
    let (mut cpu, mut ram) = machine(&[]);
    cpu.ip = 3000;
    let err = cpu.step(&mut ram).unwrap_err();
    assert!(matches!(err, Trap::Memory { addr: 3000, .. }));
}
