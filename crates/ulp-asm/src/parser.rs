use crate::ast::{Arg, Expr, InstrStmt, Stmt};
use crate::error::AsmError;
use crate::token::{Kind, Token};
use crate::validate;

/// Recursive-descent parser with one-token lookahead. A failed statement
/// is reported and parsing resumes at the next line, so one run surfaces
/// every statement-level problem.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, AsmError> {
        let mut p = Parser {
            tokens,
            position: 0,
        };
        p.program()
    }

    fn program(&mut self) -> Result<Vec<Stmt>, AsmError> {
        let mut stmts = Vec::new();
        let mut errors = Vec::new();
        loop {
            if self.matches(Kind::Eof) {
                break;
            }
            match self.statement() {
                Ok(Some(s)) => stmts.push(s),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(stmts)
        } else {
            Err(AsmError::many("error while parsing", errors))
        }
    }

    fn statement(&mut self) -> Result<Option<Stmt>, AsmError> {
        while self.matches(Kind::NewLine) {}
        if self.check(Kind::Eof) {
            return Ok(None);
        }
        let t = self.peek().clone();
        if t.kind == Kind::Identifier {
            // labels share a line with whatever follows them
            return match self.label() {
                Ok(s) => Ok(Some(s)),
                Err(e) => {
                    self.next_line();
                    Err(e)
                }
            };
        }
        let result = if t.kind.is_directive() {
            self.directive()
        } else if t.kind.is_instruction() {
            self.instruction()
        } else {
            Err(AsmError::Message {
                pos: t.pos.clone(),
                message: "expected a statement".into(),
            })
        };
        match result {
            Ok(s) => {
                // directives and instructions run to the end of the line
                match self.consume_endline() {
                    Ok(()) => Ok(Some(s)),
                    Err(e) => {
                        self.next_line();
                        Err(e)
                    }
                }
            }
            Err(e) => {
                self.next_line();
                Err(e)
            }
        }
    }

    fn directive(&mut self) -> Result<Stmt, AsmError> {
        let t = self.next().clone();
        match t.kind {
            Kind::Global => {
                if self.matches(Kind::Identifier) {
                    Ok(Stmt::Global(self.previous().clone()))
                } else {
                    Err(self.expected(Kind::Identifier))
                }
            }
            Kind::Int => self.directive_int(&t),
            _ => Ok(Stmt::Directive(t)),
        }
    }

    fn directive_int(&mut self, t: &Token) -> Result<Stmt, AsmError> {
        let args = self.arguments()?;
        if args.is_empty() {
            return Err(AsmError::Message {
                pos: t.pos.clone(),
                message: "expected at least 1 argument".into(),
            });
        }
        let mut exprs = Vec::with_capacity(args.len());
        for (i, a) in args.into_iter().enumerate() {
            match a {
                Arg::Expr(e) => exprs.push(e),
                _ => {
                    return Err(AsmError::Message {
                        pos: t.pos.clone(),
                        message: format!("expected an expression on argument {}", i + 1),
                    })
                }
            }
        }
        Ok(Stmt::Words(exprs))
    }

    fn instruction(&mut self) -> Result<Stmt, AsmError> {
        let t = self.next().clone();
        let args = self.arguments()?;
        let instr = InstrStmt { mnemonic: t, args };
        validate::validate(&instr)?;
        Ok(Stmt::Instr(instr))
    }

    fn label(&mut self) -> Result<Stmt, AsmError> {
        self.matches(Kind::Identifier);
        let t = self.previous().clone();
        self.consume(Kind::Colon).map_err(|e| AsmError::Unfinished {
            pos: t.pos.clone(),
            lexeme: t.lexeme.clone(),
            expected: "\":\" to define a label",
            source: Box::new(e),
        })?;
        Ok(Stmt::Label(t))
    }

    fn arguments(&mut self) -> Result<Vec<Arg>, AsmError> {
        let mut args = Vec::new();
        if self.at_end_of_line() {
            return Ok(args);
        }
        args.push(self.argument()?);
        while self.matches(Kind::Comma) {
            let comma = self.previous().clone();
            let a = self.argument().map_err(|e| AsmError::Unfinished {
                pos: comma.pos.clone(),
                lexeme: comma.lexeme.clone(),
                expected: "an argument",
                source: Box::new(e),
            })?;
            args.push(a);
        }
        Ok(args)
    }

    fn argument(&mut self) -> Result<Arg, AsmError> {
        let t = self.peek().clone();
        if t.kind.is_register() {
            self.advance();
            return Ok(Arg::Reg(t));
        }
        if t.kind.is_condition() {
            self.advance();
            return Ok(Arg::Cond(t));
        }
        Ok(Arg::Expr(self.expression()?))
    }

    // expression grammar, lowest precedence first: shifts, additive,
    // multiplicative, unary minus, primary

    fn expression(&mut self) -> Result<Expr, AsmError> {
        let mut expr = self.additive()?;
        while self.matches_any(&[Kind::ShiftRight, Kind::ShiftLeft]) {
            let op = self.previous().clone();
            let right = self.additive().map_err(|e| unfinished(&op, "an additive", e))?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr, AsmError> {
        let mut expr = self.factor()?;
        while self.matches_any(&[Kind::Minus, Kind::Plus]) {
            let op = self.previous().clone();
            let right = self.factor().map_err(|e| unfinished(&op, "a factor", e))?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, AsmError> {
        let mut expr = self.unary()?;
        while self.matches_any(&[Kind::Slash, Kind::Star]) {
            let op = self.previous().clone();
            let right = self.unary().map_err(|e| unfinished(&op, "a unary", e))?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, AsmError> {
        if self.matches(Kind::Minus) {
            let op = self.previous().clone();
            let expr = self.unary().map_err(|e| unfinished(&op, "a unary", e))?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, AsmError> {
        if self.matches_any(&[Kind::Number, Kind::Here, Kind::Identifier]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }
        if self.matches(Kind::LeftParen) {
            let open = self.previous().clone();
            let expr = self
                .expression()
                .map_err(|e| unfinished(&open, "an expression", e))?;
            self.consume(Kind::RightParen)
                .map_err(|e| unfinished(&open, "\")\"", e))?;
            return Ok(expr);
        }
        Err(AsmError::Message {
            pos: self.peek().pos.clone(),
            message: "expected an expression".into(),
        })
    }

    // token stream plumbing

    fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[(self.position - 1).min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> &Token {
        let i = self.position.min(self.tokens.len() - 1);
        self.advance();
        &self.tokens[i]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        } else {
            self.position = self.tokens.len() - 1;
        }
    }

    fn check(&self, kind: Kind) -> bool {
        self.peek().kind == kind
    }

    fn matches(&mut self, kind: Kind) -> bool {
        if self.check(kind) {
            if kind != Kind::Eof {
                self.advance();
            }
            return true;
        }
        false
    }

    fn matches_any(&mut self, kinds: &[Kind]) -> bool {
        kinds.iter().any(|&k| self.matches(k))
    }

    fn consume(&mut self, kind: Kind) -> Result<(), AsmError> {
        if self.matches(kind) {
            Ok(())
        } else {
            Err(self.expected(kind))
        }
    }

    fn expected(&mut self, kind: Kind) -> AsmError {
        let got = self.peek();
        let text = if got.kind == Kind::Eof {
            "end of file".to_string()
        } else {
            got.lexeme.clone()
        };
        AsmError::Expected {
            pos: got.pos.clone(),
            expected: kind,
            got: text,
        }
    }

    fn at_end_of_line(&self) -> bool {
        matches!(self.peek().kind, Kind::Eof | Kind::NewLine)
    }

    fn consume_endline(&mut self) -> Result<(), AsmError> {
        if self.check(Kind::Eof) {
            return Ok(());
        }
        self.consume(Kind::NewLine)
    }

    fn next_line(&mut self) {
        while self.consume_endline().is_err() {
            self.advance();
        }
    }
}

fn unfinished(op: &Token, expected: &'static str, source: AsmError) -> AsmError {
    AsmError::Unfinished {
        pos: op.pos.clone(),
        lexeme: op.lexeme.clone(),
        expected,
        source: Box::new(source),
    }
}
