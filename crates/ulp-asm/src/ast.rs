use std::collections::HashMap;
use std::fmt;

use crate::error::AsmError;
use crate::token::{Kind, Token};

/// The six spans of the output image, in their fixed placement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionId {
    Boot,
    #[default]
    Text,
    BootData,
    Data,
    Bss,
    Stack,
}

/// A resolved label. Values are byte offsets from the image base; ULP
/// code sees them divided by four, since its memory is word-indexed.
#[derive(Debug, Clone)]
pub struct Label {
    pub name: String,
    pub value: i64,
    pub global: bool,
    pub section: SectionId,
}

pub type LabelMap = HashMap<String, Label>;

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Token),
    Unary { op: Token, expr: Box<Expr> },
    Binary { op: Token, left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    pub fn eval(&self, labels: &LabelMap) -> Result<i64, AsmError> {
        match self {
            Expr::Literal(t) => match t.kind {
                Kind::Number => Ok(t.number),
                Kind::Identifier => match labels.get(&t.lexeme) {
                    Some(l) => Ok(l.value / 4),
                    None => Err(AsmError::UnknownIdentifier {
                        pos: t.pos.clone(),
                        name: t.lexeme.clone(),
                    }),
                },
                Kind::Here => match labels.get(".") {
                    Some(l) => Ok(l.value / 4),
                    None => Err(AsmError::Internal("the location label \".\" is unbound".into())),
                },
                _ => Ok(0),
            },
            Expr::Unary { op, expr } => {
                let v = expr.eval(labels)?;
                match op.kind {
                    Kind::Minus => Ok(-v),
                    kind => Err(AsmError::Internal(format!("unknown unary operator \"{kind}\""))),
                }
            }
            Expr::Binary { op, left, right } => {
                let l = left.eval(labels)?;
                let r = right.eval(labels)?;
                match op.kind {
                    Kind::Plus => Ok(l.wrapping_add(r)),
                    Kind::Minus => Ok(l.wrapping_sub(r)),
                    Kind::Star => Ok(l.wrapping_mul(r)),
                    Kind::Slash => {
                        if r == 0 {
                            Err(AsmError::Message {
                                pos: op.pos.clone(),
                                message: "division by zero".into(),
                            })
                        } else {
                            Ok(l / r)
                        }
                    }
                    Kind::ShiftLeft => Ok(if (0..64).contains(&r) { l << r } else { 0 }),
                    Kind::ShiftRight => Ok(if (0..64).contains(&r) { l >> r } else { 0 }),
                    kind => Err(AsmError::Internal(format!("unknown binary operator \"{kind}\""))),
                }
            }
        }
    }

    /// Does the value depend on the current location `.`? Relative
    /// expressions change meaning when the instruction moves.
    pub fn is_relative(&self) -> bool {
        match self {
            Expr::Literal(t) => t.kind == Kind::Here,
            Expr::Unary { expr, .. } => expr.is_relative(),
            Expr::Binary { left, right, .. } => left.is_relative() || right.is_relative(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(t) => write!(f, "{t}"),
            Expr::Unary { op, expr } => write!(f, "({op}{expr})"),
            Expr::Binary { op, left, right } => write!(f, "({left}{op}{right})"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Arg {
    Reg(Token),
    Cond(Token),
    Expr(Expr),
}

impl Arg {
    pub fn is_relative(&self) -> bool {
        match self {
            Arg::Expr(e) => e.is_relative(),
            // a condition can fall through, a register never moves
            Arg::Reg(_) | Arg::Cond(_) => false,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Reg(t) => write!(f, "{t}"),
            Arg::Cond(t) => write!(f, "{t}"),
            Arg::Expr(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstrStmt {
    pub mnemonic: Token,
    pub args: Vec<Arg>,
}

impl InstrStmt {
    /// Encoded size in bytes. `call` and the synthesized equality forms of
    /// `jumpr`/`jumps` take two instruction words.
    pub fn size(&self) -> usize {
        match self.mnemonic.kind {
            Kind::Jumpr | Kind::Jumps => match self.args.get(2) {
                Some(Arg::Cond(t)) if t.kind == Kind::Eq => 8,
                _ => 4,
            },
            Kind::Call => 8,
            _ => 4,
        }
    }

    /// Candidate for common-tail folding: anything but the step-relative
    /// jumpr/jumps, and only when no argument mentions `.`.
    pub fn can_reduce(&self) -> bool {
        let kind = self.mnemonic.kind;
        if !kind.is_instruction() || kind == Kind::Jumpr || kind == Kind::Jumps {
            return false;
        }
        !self.args.iter().any(Arg::is_relative)
    }

    /// An unconditional jump ends a straight-line run; the conditional
    /// forms fall through and do not.
    pub fn is_terminator(&self) -> bool {
        self.mnemonic.kind == Kind::Jump && self.args.len() <= 1
    }
}

/// Canonical rendering, used as the key for common-tail comparison: two
/// instructions fold together iff their rendered forms match.
impl fmt::Display for InstrStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i == 0 {
                write!(f, " {arg}")?;
            } else {
                write!(f, ", {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Section selector or one of the inert directives.
    Directive(Token),
    /// `.global name`
    Global(Token),
    /// `name:`
    Label(Token),
    /// `.int expr, expr, ...` emitting one little-endian word each
    Words(Vec<Expr>),
    Instr(InstrStmt),
}

impl Stmt {
    pub fn size(&self) -> usize {
        match self {
            Stmt::Words(exprs) => exprs.len() * 4,
            Stmt::Instr(i) => i.size(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    fn num(n: i64) -> Expr {
        let mut t = Token::synthetic(Kind::Number, "");
        t.number = n;
        Expr::Literal(t)
    }

    fn bin(op: Kind, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op: Token::synthetic(op, ""),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn eval_arithmetic() {
        let labels = LabelMap::new();
        assert_eq!(bin(Kind::Plus, num(2), num(3)).eval(&labels).unwrap(), 5);
        assert_eq!(bin(Kind::Star, num(4), num(7)).eval(&labels).unwrap(), 28);
        assert_eq!(bin(Kind::ShiftLeft, num(1), num(4)).eval(&labels).unwrap(), 16);
        let neg = Expr::Unary {
            op: Token::synthetic(Kind::Minus, ""),
            expr: Box::new(num(9)),
        };
        assert_eq!(neg.eval(&labels).unwrap(), -9);
    }

    #[test]
    fn labels_evaluate_to_word_offsets() {
        let mut labels = LabelMap::new();
        labels.insert(
            "main".into(),
            Label {
                name: "main".into(),
                value: 8,
                global: false,
                section: SectionId::Text,
            },
        );
        let e = Expr::Literal(Token::synthetic(Kind::Identifier, "main"));
        assert_eq!(e.eval(&labels).unwrap(), 2);
    }

    #[test]
    fn undefined_identifier_is_an_error() {
        let labels = LabelMap::new();
        let e = Expr::Literal(Token::synthetic(Kind::Identifier, "nope"));
        assert!(matches!(
            e.eval(&labels),
            Err(AsmError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn relative_detection() {
        let here = Expr::Literal(Token::synthetic(Kind::Here, "."));
        assert!(here.is_relative());
        assert!(bin(Kind::Plus, num(1), here).is_relative());
        assert!(!num(1).is_relative());
    }

    #[test]
    fn instruction_sizes() {
        let eq = Token::synthetic(Kind::Eq, "eq");
        let lt = Token::synthetic(Kind::Lt, "lt");
        let jumpr = |cond: Token| InstrStmt {
            mnemonic: Token::synthetic(Kind::Jumpr, "jumpr"),
            args: vec![Arg::Expr(num(0)), Arg::Expr(num(1)), Arg::Cond(cond)],
        };
        assert_eq!(jumpr(eq).size(), 8);
        assert_eq!(jumpr(lt).size(), 4);
        let call = InstrStmt {
            mnemonic: Token::synthetic(Kind::Call, "call"),
            args: vec![Arg::Expr(num(0))],
        };
        assert_eq!(call.size(), 8);
    }
}
