use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluSel {
    Add,
    Sub,
    And,
    Or,
    Move,
    Lsh,
    Rsh,
}

impl AluSel {
    fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::And,
            3 => Self::Or,
            4 => Self::Move,
            5 => Self::Lsh,
            6 => Self::Rsh,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Alu(AluSel),
    AluImm(AluSel),
    StageInc,
    StageDec,
    StageRst,
    St,
    Ld,
    Jump,
    JumpEq,
    JumpOv,
    Jumpr,
    Jumps,
    Wake,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Op,
    pub rdst: u8,
    pub rsrc: u8,
    pub rsrc2: u8,
    /// Immediate, memory offset or comparison threshold, per `op`.
    pub imm: u16,
    /// Raw sign-magnitude step field for jumpr/jumps.
    pub step: u8,
    pub cond: u8,
    /// Jump target comes from `rdst` instead of `imm`.
    pub reg_target: bool,
}

impl Decoded {
    fn new(op: Op) -> Self {
        Self {
            op,
            rdst: 0,
            rsrc: 0,
            rsrc2: 0,
            imm: 0,
            step: 0,
            cond: 0,
            reg_target: false,
        }
    }
}

#[inline]
fn field(raw: u32, offset: u32, width: u32) -> u32 {
    (raw >> offset) & ((1 << width) - 1)
}

pub fn decode(raw: u32) -> Option<Decoded> {
    let op = field(raw, 28, 4);
    let sub = field(raw, 25, 3);
    match op {
        7 => match sub {
            0 => {
                let sel = AluSel::from_bits(field(raw, 21, 4))?;
                Some(Decoded {
                    rdst: field(raw, 0, 2) as u8,
                    rsrc: field(raw, 2, 2) as u8,
                    rsrc2: field(raw, 4, 2) as u8,
                    ..Decoded::new(Op::Alu(sel))
                })
            }
            1 => {
                let sel = AluSel::from_bits(field(raw, 21, 4))?;
                Some(Decoded {
                    rdst: field(raw, 0, 2) as u8,
                    rsrc: field(raw, 2, 2) as u8,
                    imm: field(raw, 4, 16) as u16,
                    ..Decoded::new(Op::AluImm(sel))
                })
            }
            2 => {
                let op = match field(raw, 21, 4) {
                    0 => Op::StageInc,
                    1 => Op::StageDec,
                    2 => Op::StageRst,
                    _ => return None,
                };
                Some(Decoded {
                    imm: field(raw, 4, 8) as u16,
                    ..Decoded::new(op)
                })
            }
            _ => None,
        },
        6 => Some(Decoded {
            rsrc: field(raw, 0, 2) as u8,
            rdst: field(raw, 2, 2) as u8,
            imm: field(raw, 10, 11) as u16,
            ..Decoded::new(Op::St)
        }),
        13 => Some(Decoded {
            rdst: field(raw, 0, 2) as u8,
            rsrc: field(raw, 2, 2) as u8,
            imm: field(raw, 10, 11) as u16,
            ..Decoded::new(Op::Ld)
        }),
        8 => match sub {
            0 => {
                let op = match field(raw, 22, 3) {
                    0 => Op::Jump,
                    1 => Op::JumpEq,
                    2 => Op::JumpOv,
                    _ => return None,
                };
                Some(Decoded {
                    rdst: field(raw, 0, 2) as u8,
                    imm: field(raw, 2, 11) as u16,
                    reg_target: field(raw, 21, 1) == 1,
                    ..Decoded::new(op)
                })
            }
            1 => Some(Decoded {
                imm: field(raw, 0, 16) as u16,
                cond: field(raw, 16, 1) as u8,
                step: field(raw, 17, 8) as u8,
                ..Decoded::new(Op::Jumpr)
            }),
            2 => Some(Decoded {
                imm: field(raw, 0, 8) as u16,
                cond: field(raw, 15, 2) as u8,
                step: field(raw, 17, 8) as u8,
                ..Decoded::new(Op::Jumps)
            }),
            _ => None,
        },
        // Both the wake and sleep encodings land here; the machine model
        // only latches the wake indicator.
        9 => Some(Decoded::new(Op::Wake)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_alu_imm_move() {
        // move r0, 5 => op=7 subOp=1 aluSel=4 imm=5
        let d = decode(0x7280_0050).expect("move");
        assert_eq!(d.op, Op::AluImm(AluSel::Move));
        assert_eq!(d.rdst, 0);
        assert_eq!(d.imm, 5);
    }

    #[test]
    fn decode_rejects_unknown_op() {
        // halt is op=11; the machine model has no execute path for it
        assert!(decode(0xB000_0000).is_none());
        assert!(decode(0x0000_0000).is_none());
    }

    #[test]
    fn decode_jumpr_fields() {
        // op=8 subOp=1 step=0x82 cond=1 threshold=0x1234
        let raw = (8 << 28) | (1 << 25) | (0x82 << 17) | (1 << 16) | 0x1234;
        let d = decode(raw).expect("jumpr");
        assert_eq!(d.op, Op::Jumpr);
        assert_eq!(d.step, 0x82);
        assert_eq!(d.cond, 1);
        assert_eq!(d.imm, 0x1234);
    }
}
