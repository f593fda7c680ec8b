use crate::ast::{Arg, InstrStmt, LabelMap};
use crate::error::AsmError;
use crate::token::{Kind, Token};

const LT: i64 = 0;
const GE: i64 = 1;
const LE: i64 = 2;

/// Encode one instruction statement into little-endian 32-bit words.
/// The label map must already hold the location label `.` bound to the
/// statement's own address.
pub fn encode_instr(instr: &InstrStmt, labels: &LabelMap) -> Result<Vec<u8>, AsmError> {
    match instr.mnemonic.kind {
        Kind::Add => alu(instr, labels, 0),
        Kind::Sub => alu(instr, labels, 1),
        Kind::And => alu(instr, labels, 2),
        Kind::Or => alu(instr, labels, 3),
        Kind::Move => mov(instr, labels),
        Kind::Lsh => alu(instr, labels, 5),
        Kind::Rsh => alu(instr, labels, 6),
        Kind::StageInc => stage(instr, labels, 0),
        Kind::StageDec => stage(instr, labels, 1),
        Kind::StageRst => Ok(words(&[stage_word(2, 0)])),
        Kind::St => memory(instr, labels, 6, 0b100),
        Kind::Ld => memory(instr, labels, 13, 0),
        Kind::Jump => jump(instr, labels),
        Kind::Jumpr => jumpr(instr, labels),
        Kind::Jumps => jumps(instr, labels),
        Kind::Call => call(instr, labels),
        Kind::Halt => Ok(words(&[single_word(11, 0, 0)])),
        Kind::Wake => Ok(words(&[single_word(9, 0, 1)])),
        Kind::Sleep => single(instr, labels, 9, 1),
        Kind::Wait => single(instr, labels, 4, 0),
        _ => Err(AsmError::NotEncodable {
            pos: instr.mnemonic.pos.clone(),
            mnemonic: instr.mnemonic.lexeme.clone(),
        }),
    }
}

// instruction families

fn alu(instr: &InstrStmt, labels: &LabelMap, alu_sel: i64) -> Result<Vec<u8>, AsmError> {
    let rdst = expect_reg(instr, 0)?;
    let rsrc = expect_reg(instr, 1)?;
    let (val, is_reg) = reg_or_expr(instr, 2, labels)?;
    let sub_op = if is_reg { 0 } else { 1 };
    // in the register form the third index lands in the low immediate bits
    Ok(words(&[standard_word(sub_op, alu_sel, val, rsrc, rdst)]))
}

fn mov(instr: &InstrStmt, labels: &LabelMap) -> Result<Vec<u8>, AsmError> {
    let rdst = expect_reg(instr, 0)?;
    let (val, is_reg) = reg_or_expr(instr, 1, labels)?;
    let val = val & 0xFFFF;
    let w = if is_reg {
        standard_word(0, 4, 0, val, rdst)
    } else {
        standard_word(1, 4, val, 0, rdst)
    };
    Ok(words(&[w]))
}

fn stage(instr: &InstrStmt, labels: &LabelMap, alu_sel: i64) -> Result<Vec<u8>, AsmError> {
    let imm = expect_expr(instr, 0, labels)?;
    Ok(words(&[stage_word(alu_sel, imm)]))
}

fn memory(instr: &InstrStmt, labels: &LabelMap, op: i64, sub_op: i64) -> Result<Vec<u8>, AsmError> {
    let ra = expect_reg(instr, 0)?;
    let rb = expect_reg(instr, 1)?;
    let offset = expect_expr(instr, 2, labels)?;
    Ok(words(&[memory_word(op, sub_op, offset, ra, rb)]))
}

fn jump(instr: &InstrStmt, labels: &LabelMap) -> Result<Vec<u8>, AsmError> {
    let (val, is_reg) = reg_or_expr(instr, 0, labels)?;
    let jump_type = match instr.args.get(1) {
        None => 0,
        Some(Arg::Cond(t)) => match t.kind {
            Kind::Eq => 1,
            Kind::Ov => 2,
            _ => {
                return Err(AsmError::Message {
                    pos: t.pos.clone(),
                    message: "unsupported condition for jump, only eq and ov exist".into(),
                })
            }
        },
        Some(_) => {
            return Err(AsmError::Internal("jump argument survived validation".into()));
        }
    };
    Ok(words(&[jump_word(jump_type, is_reg, val)]))
}

fn jumpr(instr: &InstrStmt, labels: &LabelMap) -> Result<Vec<u8>, AsmError> {
    let (step, threshold, cond) = branch_args(instr, labels)?;
    validate_step(instr, step)?;
    let threshold = threshold & 0xFFFF;
    match cond.kind {
        Kind::Eq => {
            // two instructions: skip the second when the value is above the
            // threshold, then jump when it is at least the threshold; the
            // second sits one word later so its step shrinks by one
            validate_step(instr, step - 1)?;
            if threshold == 0xFFFF {
                // threshold+1 would roll over, invert the skip instead
                Ok(words(&[
                    jumpr_word(2, LT, 0xFFFF),
                    jumpr_word(step - 1, GE, 0xFFFF),
                ]))
            } else {
                Ok(words(&[
                    jumpr_word(2, GE, threshold + 1),
                    jumpr_word(step - 1, GE, threshold),
                ]))
            }
        }
        Kind::Lt => Ok(words(&[jumpr_word(step, LT, threshold)])),
        Kind::Le => {
            if threshold == 0xFFFF {
                // always true
                Ok(words(&[jumpr_word(step, GE, 0)]))
            } else {
                Ok(words(&[jumpr_word(step, LT, threshold + 1)]))
            }
        }
        Kind::Gt => {
            if threshold == 0xFFFF {
                // never true
                Ok(words(&[jumpr_word(step, LT, 0)]))
            } else {
                Ok(words(&[jumpr_word(step, GE, threshold + 1)]))
            }
        }
        Kind::Ge => Ok(words(&[jumpr_word(step, GE, threshold)])),
        _ => Err(AsmError::Message {
            pos: cond.pos.clone(),
            message: "unsupported condition for jumpr".into(),
        }),
    }
}

fn jumps(instr: &InstrStmt, labels: &LabelMap) -> Result<Vec<u8>, AsmError> {
    let (step, threshold, cond) = branch_args(instr, labels)?;
    validate_step(instr, step)?;
    let threshold = threshold & 0xFF;
    match cond.kind {
        Kind::Eq => {
            validate_step(instr, step - 1)?;
            Ok(words(&[
                jumps_word(2, LT, threshold),
                jumps_word(step - 1, LE, threshold),
            ]))
        }
        Kind::Lt => Ok(words(&[jumps_word(step, LT, threshold)])),
        Kind::Le => Ok(words(&[jumps_word(step, LE, threshold)])),
        Kind::Gt => {
            if threshold == 0xFF {
                // never true
                Ok(words(&[jumps_word(step, LT, 0)]))
            } else {
                Ok(words(&[jumps_word(step, GE, threshold + 1)]))
            }
        }
        Kind::Ge => Ok(words(&[jumps_word(step, GE, threshold)])),
        _ => Err(AsmError::Message {
            pos: cond.pos.clone(),
            message: "unsupported condition for jumps".into(),
        }),
    }
}

/// `call target` is a pseudo-instruction: load the return address into r2,
/// then jump. The return address is two words past `.`.
fn call(instr: &InstrStmt, labels: &LabelMap) -> Result<Vec<u8>, AsmError> {
    let here = here_word(instr, labels)?;
    let (val, is_reg) = reg_or_expr(instr, 0, labels)?;
    let mov = standard_word(1, 4, (here + 2) & 0xFFFF, 0, 2);
    let jmp = jump_word(0, is_reg, val);
    Ok(words(&[mov, jmp]))
}

fn single(instr: &InstrStmt, labels: &LabelMap, op: i64, sub_op: i64) -> Result<Vec<u8>, AsmError> {
    let imm = expect_expr(instr, 0, labels)?;
    Ok(words(&[single_word(op, sub_op, imm)]))
}

// argument helpers

fn expect_reg(instr: &InstrStmt, i: usize) -> Result<i64, AsmError> {
    match instr.args.get(i) {
        Some(Arg::Reg(t)) => match t.kind.register_index() {
            Some(r) => Ok(r as i64),
            None => Err(AsmError::Internal(format!(
                "\"{}\" is not a register",
                t.lexeme
            ))),
        },
        _ => Err(AsmError::Internal(format!(
            "argument {} of {} survived validation without being a register",
            i + 1,
            instr.mnemonic.lexeme
        ))),
    }
}

fn expect_expr(instr: &InstrStmt, i: usize, labels: &LabelMap) -> Result<i64, AsmError> {
    match instr.args.get(i) {
        Some(Arg::Expr(e)) => e.eval(labels),
        _ => Err(AsmError::Internal(format!(
            "argument {} of {} survived validation without being an expression",
            i + 1,
            instr.mnemonic.lexeme
        ))),
    }
}

fn reg_or_expr(instr: &InstrStmt, i: usize, labels: &LabelMap) -> Result<(i64, bool), AsmError> {
    match instr.args.get(i) {
        Some(Arg::Reg(_)) => Ok((expect_reg(instr, i)?, true)),
        Some(Arg::Expr(e)) => Ok((e.eval(labels)?, false)),
        _ => Err(AsmError::Internal(format!(
            "argument {} of {} survived validation",
            i + 1,
            instr.mnemonic.lexeme
        ))),
    }
}

fn here_word(instr: &InstrStmt, labels: &LabelMap) -> Result<i64, AsmError> {
    match labels.get(".") {
        Some(l) => Ok(l.value / 4),
        None => Err(AsmError::Internal(format!(
            "the location label \".\" is unbound while encoding {}",
            instr.mnemonic.lexeme
        ))),
    }
}

fn branch_args<'a>(
    instr: &'a InstrStmt,
    labels: &LabelMap,
) -> Result<(i64, i64, &'a Token), AsmError> {
    let dest = expect_expr(instr, 0, labels)?;
    let here = here_word(instr, labels)?;
    let step = dest - here;
    let threshold = expect_expr(instr, 1, labels)?;
    match instr.args.get(2) {
        Some(Arg::Cond(t)) => Ok((step, threshold, t)),
        _ => Err(AsmError::Internal(format!(
            "argument 3 of {} survived validation without being a condition",
            instr.mnemonic.lexeme
        ))),
    }
}

fn validate_step(instr: &InstrStmt, step: i64) -> Result<(), AsmError> {
    if !(-127..=127).contains(&step) {
        return Err(AsmError::StepRange {
            pos: instr.mnemonic.pos.clone(),
            step,
        });
    }
    Ok(())
}

// word assembly

fn mask(val: i64, bits: u32) -> u32 {
    (val as u64 & ((1u64 << bits) - 1)) as u32
}

fn words(ws: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ws.len() * 4);
    for w in ws {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out
}

/// op 7, sub-op 0/1: ALU among registers or with an immediate.
fn standard_word(sub_op: i64, alu_sel: i64, imm: i64, rsrc: i64, rdst: i64) -> u32 {
    (7 << 28)
        | (mask(sub_op, 3) << 25)
        | (mask(alu_sel, 4) << 21)
        | (mask(imm, 17) << 4)
        | (mask(rsrc, 2) << 2)
        | mask(rdst, 2)
}

/// op 7, sub-op 2: stage counter manipulation.
fn stage_word(alu_sel: i64, imm: i64) -> u32 {
    (7 << 28) | (2 << 25) | (mask(alu_sel, 4) << 21) | (mask(imm, 8) << 4)
}

/// op 6 (store) and op 13 (load), with the 11-bit signed word offset.
fn memory_word(op: i64, sub_op: i64, offset: i64, ra: i64, rb: i64) -> u32 {
    (mask(op, 4) << 28)
        | (mask(sub_op, 3) << 25)
        | (mask(offset, 11) << 10)
        | (mask(rb, 2) << 2)
        | mask(ra, 2)
}

/// op 8, sub-op 0: absolute jump to an immediate or register address.
fn jump_word(jump_type: i64, reg_target: bool, arg: i64) -> u32 {
    let sel = i64::from(reg_target);
    let mut w = (8 << 28) | (mask(jump_type, 3) << 22) | (mask(sel, 1) << 21);
    if reg_target {
        w |= mask(arg, 2);
    } else {
        w |= mask(arg, 11) << 2;
    }
    w
}

/// Sign-magnitude step byte: backward jumps set bit 7.
fn step_bits(step: i64) -> i64 {
    if step < 0 {
        -step | 0x80
    } else {
        step
    }
}

/// op 8, sub-op 1: step-relative jump comparing R0 to a threshold.
fn jumpr_word(step: i64, cond: i64, threshold: i64) -> u32 {
    (8 << 28)
        | (1 << 25)
        | (mask(step_bits(step), 8) << 17)
        | (mask(cond, 1) << 16)
        | mask(threshold, 16)
}

/// op 8, sub-op 2: step-relative jump comparing the stage counter.
fn jumps_word(step: i64, cond: i64, threshold: i64) -> u32 {
    (8 << 28)
        | (2 << 25)
        | (mask(step_bits(step), 8) << 17)
        | (mask(cond, 2) << 15)
        | mask(threshold, 8)
}

/// halt/wake/sleep/wait: a bare op/sub-op with a 16-bit immediate.
fn single_word(op: i64, sub_op: i64, imm: i64) -> u32 {
    (mask(op, 4) << 28) | (mask(sub_op, 3) << 25) | mask(imm, 16)
}
