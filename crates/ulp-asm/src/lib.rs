pub mod ast;
pub mod compiler;
pub mod encode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod reduce;
pub mod token;
pub mod validate;

pub use compiler::{Compiler, Section};
pub use error::AsmError;

use ast::Stmt;

/// One assembly run: source text in, image bytes (or a textual listing)
/// out. The compiler is kept around so callers can query section sizes
/// after a build.
#[derive(Default)]
pub struct Assembler {
    pub compiler: Compiler,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble `source` into a loadable binary image.
    pub fn build_binary(
        &mut self,
        source: &str,
        name: &str,
        reserved_bytes: usize,
        reduce: bool,
    ) -> Result<Vec<u8>, AsmError> {
        let program = parse_source(source, name)?;
        self.compiler = Compiler::default();
        self.compiler.compile_to_bin(program, reserved_bytes, reduce)
    }

    /// Assemble `source` into the one-byte-per-line listing form.
    pub fn build_listing(
        &mut self,
        source: &str,
        name: &str,
        reserved_bytes: usize,
        reduce: bool,
    ) -> Result<String, AsmError> {
        let program = parse_source(source, name)?;
        self.compiler = Compiler::default();
        self.compiler.compile_to_asm(program, reserved_bytes, reduce)
    }
}

fn parse_source(source: &str, name: &str) -> Result<Vec<Stmt>, AsmError> {
    let tokens = lexer::scan(source, name)?;
    parser::Parser::parse(tokens)
}
