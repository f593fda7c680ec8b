#![allow(dead_code)]

use ulp_asm::Assembler;
use ulp_rs::{run_with_host, Cpu, Trap, UlpRam};

pub const RESERVED_BYTES: usize = 8176;
pub const CYCLE_BUDGET: u64 = 8_000_000;

/// The canonical runtime: stack setup, the ULP half of the Peterson
/// mutex over the mailbox, and the send/done/print routines the host
/// protocol is built from. Test bodies are appended at `main` and fall
/// through into the postlude.
pub const PRELUDE: &str = r#"
    .boot
move r3, __stack_end - 32
jump main

    .boot.data
.int 0, 0, 0    // the two mutex flags and the turn word
.int 0, 0       // function code and parameter for the host

    .text
ulp_mutex_take:
    st r0, r3, -1
    move r0, 1
    st r0, r0, (__boot_data_start-1)    // flag[0] = 1
    st r0, r0, (__boot_data_start-1)+2  // turn = 1
ulp_mutex_take.loop:
    ld r0, r0, (__boot_data_start-1)+1  // r0 = flag[1]
    jumpr ulp_mutex_take.end, 1, lt
    ld r0, r0, (__boot_data_start-1)+2  // r0 = turn
    jumpr ulp_mutex_take.loop, 0, gt
ulp_mutex_take.end:
    ld r0, r3, -1
    jump r2

    .text
ulp_mutex_give:
    st r0, r3, -1
    move r0, 0
    st r0, r0, __boot_data_start        // flag[0] = 0
    ld r0, r3, -1
    jump r2

// send_esp(fn, param): wait for the previous code to be acknowledged,
// then publish the next one under the mutex
    .text
send_esp:
    sub r3, r3, 2
    st r0, r3, 0
    st r2, r3, 1

    move r2, send_esp.loop
    jump ulp_mutex_take
send_esp.loop:
    ld r0, r2, __boot_data_start - send_esp.loop + 3
    jumpr send_esp.end, 0, le
    move r2, send_esp.loop.1
    jump ulp_mutex_give
send_esp.loop.1:
    move r2, send_esp.loop
    jump ulp_mutex_take
send_esp.end:
    ld r0, r3, 2
    st r0, r2, __boot_data_start - send_esp.loop + 3
    ld r0, r3, 3
    st r0, r2, __boot_data_start - send_esp.loop + 4
    call ulp_mutex_give

    ld r2, r3, 1
    ld r0, r3, 0
    add r3, r3, 2
    jump r2

    .text
done:
    sub r3, r3, 1
    move r0, 1
    st r0, r3, 0
    call send_esp
    halt

    .text
print_u16:
    sub r3, r3, 3
    st r2, r3, 2
    move r2, 2
print_u16.call:
    st r2, r3, 0
    ld r2, r3, 3
    st r2, r3, 1
    call send_esp
    ld r2, r3, 2
    add r3, r3, 3
    jump r2

    .text
print_char:
    sub r3, r3, 3
    st r2, r3, 2
    move r2, 3
    jump print_u16.call

    .text
main:
"#;

pub const POSTLUDE: &str = "\njump done\n";

/// Assemble a test body between the prelude and postlude, run it against
/// the emulated host and return whatever it printed.
pub fn run_with_header(body: &str, reduce: bool) -> String {
    let source = format!("{PRELUDE}{body}{POSTLUDE}");
    run_source(&source, reduce).expect("run")
}

pub fn run_source(source: &str, reduce: bool) -> Result<String, Trap> {
    let mut asm = Assembler::new();
    let bin = asm
        .build_binary(source, "test.S", RESERVED_BYTES, reduce)
        .expect("assemble");
    execute(&bin)
}

pub fn execute(bin: &[u8]) -> Result<String, Trap> {
    let mut cpu = Cpu::new();
    let mut ram = UlpRam::new();
    cpu.load(&mut ram, bin).expect("load");
    run_with_host(&mut cpu, &mut ram, CYCLE_BUDGET)
}
