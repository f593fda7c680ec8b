use crate::error::AsmError;
use crate::token::{Kind, SourceRef, Token};

/// Turn a source file into a token list ending with an end-of-file token.
/// Unknown tokens are reported all at once so the user sees every bad
/// lexeme in a single run.
pub fn scan(source: &str, file: &str) -> Result<Vec<Token>, AsmError> {
    let mut lx = Lexer {
        src: source.as_bytes(),
        file,
        pos: 0,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    loop {
        let tok = lx.next_token();
        if tok.kind == Kind::Unknown {
            errors.push(AsmError::UnknownToken {
                pos: tok.pos.clone(),
                lexeme: tok.lexeme.clone(),
            });
        }
        let done = tok.kind == Kind::Eof;
        tokens.push(tok);
        if done {
            break;
        }
    }
    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(AsmError::many("error while scanning", errors))
    }
}

struct Lexer<'a> {
    src: &'a [u8],
    file: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            let pos = self.here();
            let Some(c) = self.peek() else {
                return self.build(String::new(), pos);
            };
            if c == b'\n' {
                self.advance();
                return Token {
                    kind: Kind::NewLine,
                    lexeme: "\n".to_string(),
                    pos,
                    number: 0,
                };
            }
            if is_ident_byte(c) {
                let lexeme = self.ident_run();
                return self.build(lexeme, pos);
            }
            self.advance();
            match (c, self.peek()) {
                (b'/', Some(b'/')) | (b'#', _) => {
                    self.skip_line();
                    continue;
                }
                (b'/', Some(b'*')) => {
                    self.advance();
                    self.skip_block_comment();
                    continue;
                }
                _ => {}
            }
            let mut lexeme = (c as char).to_string();
            // greedy two-character punctuation
            if let Some(n) = self.peek() {
                let pair = matches!(
                    (c, n),
                    (b'>', b'>') | (b'<', b'<') | (b'<', b'=') | (b'>', b'=') | (b'!', b'=') | (b'=', b'=')
                );
                if pair {
                    lexeme.push(n as char);
                    self.advance();
                }
            }
            return self.build(lexeme, pos);
        }
    }

    fn build(&self, lexeme: String, pos: SourceRef) -> Token {
        let mut tok = Token {
            kind: Kind::Unknown,
            lexeme,
            pos,
            number: 0,
        };
        if tok.lexeme.is_empty() {
            tok.kind = Kind::Eof;
            return tok;
        }
        if let Some(kind) = Kind::keyword(&tok.lexeme) {
            tok.kind = kind;
            return tok;
        }
        if let Some(n) = parse_number(&tok.lexeme) {
            tok.kind = Kind::Number;
            tok.number = n;
            return tok;
        }
        let first = tok.lexeme.as_bytes()[0];
        if is_ident_byte(first) && !first.is_ascii_digit() && first != b'.' {
            tok.kind = Kind::Identifier;
        }
        tok
    }

    fn ident_run(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_ident_byte(c) {
                break;
            }
            self.advance();
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn skip_line(&mut self) {
        // stop in front of the newline so it still becomes a token
        while let Some(c) = self.peek() {
            if c == b'\n' {
                return;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        // an unterminated block comment silently closes at end of file
        while let Some(c) = self.peek() {
            self.advance();
            if c == b'*' && self.peek() == Some(b'/') {
                self.advance();
                return;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == b' ' || c == b'\t' || c == b'\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn here(&self) -> SourceRef {
        SourceRef {
            file: self.file.to_string(),
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

fn parse_number(lexeme: &str) -> Option<i64> {
    if let Some(hex) = lexeme.strip_prefix("0x").or_else(|| lexeme.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(oct) = lexeme.strip_prefix("0o").or_else(|| lexeme.strip_prefix("0O")) {
        return i64::from_str_radix(oct, 8).ok();
    }
    if let Some(bin) = lexeme.strip_prefix("0b").or_else(|| lexeme.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).ok();
    }
    lexeme.parse::<i64>().ok()
}
