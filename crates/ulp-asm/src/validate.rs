use crate::ast::{Arg, InstrStmt};
use crate::error::AsmError;
use crate::token::Kind;

/// One permissible argument position.
#[derive(Clone, Copy)]
struct Shape {
    reg: bool,
    expr: bool,
    cond: bool,
}

const REG: Shape = Shape {
    reg: true,
    expr: false,
    cond: false,
};
const EXPR: Shape = Shape {
    reg: false,
    expr: true,
    cond: false,
};
const COND: Shape = Shape {
    reg: false,
    expr: false,
    cond: true,
};
const REG_OR_EXPR: Shape = Shape {
    reg: true,
    expr: true,
    cond: false,
};

fn check(instr: &InstrStmt, shapes: &[Shape]) -> Result<(), AsmError> {
    if instr.args.len() != shapes.len() {
        return Err(AsmError::ArgCount {
            pos: instr.mnemonic.pos.clone(),
            mnemonic: instr.mnemonic.lexeme.clone(),
            expected: shapes.len(),
            got: instr.args.len(),
        });
    }
    for (i, (arg, shape)) in instr.args.iter().zip(shapes).enumerate() {
        let ok = match arg {
            Arg::Reg(_) => shape.reg,
            Arg::Expr(_) => shape.expr,
            Arg::Cond(_) => shape.cond,
        };
        if !ok {
            return Err(AsmError::ArgType {
                pos: instr.mnemonic.pos.clone(),
                mnemonic: instr.mnemonic.lexeme.clone(),
                position: i + 1,
            });
        }
    }
    Ok(())
}

/// Per-mnemonic argument arity and kinds. Conditions on `jump` are
/// narrowed further at encode time (only `eq` and `ov` exist in silicon).
pub fn validate(instr: &InstrStmt) -> Result<(), AsmError> {
    match instr.mnemonic.kind {
        Kind::Add | Kind::Sub | Kind::And | Kind::Or | Kind::Lsh | Kind::Rsh => {
            check(instr, &[REG, REG, REG_OR_EXPR])
        }
        Kind::Move => check(instr, &[REG, REG_OR_EXPR]),
        Kind::St | Kind::Ld => check(instr, &[REG, REG, EXPR]),
        // jump has an optional condition, try the short form first
        Kind::Jump => check(instr, &[REG_OR_EXPR]).or_else(|_| check(instr, &[REG_OR_EXPR, COND])),
        Kind::Jumpr | Kind::Jumps => check(instr, &[EXPR, EXPR, COND]),
        Kind::StageInc | Kind::StageDec | Kind::Sleep | Kind::Wait => check(instr, &[EXPR]),
        Kind::Adc => check(instr, &[REG, EXPR, EXPR]),
        Kind::I2cRd | Kind::RegWr => check(instr, &[EXPR; 4]),
        Kind::I2cWr => check(instr, &[EXPR; 5]),
        Kind::RegRd => check(instr, &[EXPR; 3]),
        Kind::StageRst | Kind::Halt | Kind::Wake => check(instr, &[]),
        Kind::Call => check(instr, &[REG_OR_EXPR]),
        kind => Err(AsmError::Internal(format!(
            "no validation rule for \"{kind}\""
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::token::Token;

    fn reg(kind: Kind) -> Arg {
        Arg::Reg(Token::synthetic(kind, "r"))
    }

    fn expr(n: i64) -> Arg {
        let mut t = Token::synthetic(Kind::Number, "");
        t.number = n;
        Arg::Expr(Expr::Literal(t))
    }

    fn cond(kind: Kind) -> Arg {
        Arg::Cond(Token::synthetic(kind, "c"))
    }

    fn instr(kind: Kind, args: Vec<Arg>) -> InstrStmt {
        InstrStmt {
            mnemonic: Token::synthetic(kind, "mnemonic"),
            args,
        }
    }

    #[test]
    fn alu_accepts_register_or_immediate_source() {
        assert!(validate(&instr(Kind::Add, vec![reg(Kind::R0), reg(Kind::R1), reg(Kind::R2)])).is_ok());
        assert!(validate(&instr(Kind::Add, vec![reg(Kind::R0), reg(Kind::R1), expr(7)])).is_ok());
    }

    #[test]
    fn missing_argument_is_a_count_error() {
        let e = validate(&instr(Kind::Add, vec![reg(Kind::R0), reg(Kind::R0)])).unwrap_err();
        assert!(matches!(e, AsmError::ArgCount { expected: 3, got: 2, .. }));
    }

    #[test]
    fn destination_must_be_a_register() {
        let e = validate(&instr(Kind::Move, vec![expr(1), reg(Kind::R0)])).unwrap_err();
        assert!(matches!(e, AsmError::ArgType { position: 1, .. }));
    }

    #[test]
    fn jump_condition_is_optional() {
        assert!(validate(&instr(Kind::Jump, vec![expr(0)])).is_ok());
        assert!(validate(&instr(Kind::Jump, vec![reg(Kind::R2)])).is_ok());
        assert!(validate(&instr(Kind::Jump, vec![expr(0), cond(Kind::Eq)])).is_ok());
        assert!(validate(&instr(Kind::Jump, vec![expr(0), expr(1)])).is_err());
    }

    #[test]
    fn jumpr_needs_expr_expr_cond() {
        assert!(validate(&instr(Kind::Jumpr, vec![expr(0), expr(1), cond(Kind::Lt)])).is_ok());
        let e = validate(&instr(Kind::Jumpr, vec![expr(0), reg(Kind::R0), cond(Kind::Lt)])).unwrap_err();
        assert!(matches!(e, AsmError::ArgType { position: 2, .. }));
    }

    #[test]
    fn nullary_instructions_reject_arguments() {
        assert!(validate(&instr(Kind::Halt, vec![])).is_ok());
        assert!(validate(&instr(Kind::Halt, vec![expr(1)])).is_err());
    }

    #[test]
    fn peripheral_forms_take_expressions() {
        assert!(validate(&instr(Kind::RegWr, vec![expr(1), expr(2), expr(3), expr(4)])).is_ok());
        assert!(validate(&instr(Kind::I2cWr, vec![expr(1); 5])).is_ok());
        assert!(validate(&instr(Kind::RegRd, vec![expr(1); 3])).is_ok());
        assert!(validate(&instr(Kind::Adc, vec![reg(Kind::R1), expr(1), expr(2)])).is_ok());
    }

    #[test]
    fn call_takes_one_target() {
        assert!(validate(&instr(Kind::Call, vec![expr(0)])).is_ok());
        assert!(validate(&instr(Kind::Call, vec![reg(Kind::R0)])).is_ok());
        assert!(validate(&instr(Kind::Call, vec![])).is_err());
    }
}
