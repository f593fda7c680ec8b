use thiserror::Error;

use crate::token::{Kind, SourceRef};

/// Everything the assembler can report. Diagnostics that originate in a
/// source token carry its `file:line:column` reference.
#[derive(Debug, Error)]
pub enum AsmError {
    #[error("{pos}: unknown token \"{lexeme}\"")]
    UnknownToken { pos: SourceRef, lexeme: String },

    #[error("{pos}: expected \"{expected}\" got \"{got}\"")]
    Expected {
        pos: SourceRef,
        expected: Kind,
        got: String,
    },

    #[error("{pos}: \"{lexeme}\" is unfinished, expected {expected}: {source}")]
    Unfinished {
        pos: SourceRef,
        lexeme: String,
        expected: &'static str,
        source: Box<AsmError>,
    },

    #[error("{pos}: {message}")]
    Message { pos: SourceRef, message: String },

    #[error("{pos}: {mnemonic} takes {expected} arguments but got {got}")]
    ArgCount {
        pos: SourceRef,
        mnemonic: String,
        expected: usize,
        got: usize,
    },

    #[error("{pos}: invalid kind of argument {position} to {mnemonic}")]
    ArgType {
        pos: SourceRef,
        mnemonic: String,
        position: usize,
    },

    #[error("{pos}: unknown identifier \"{name}\"")]
    UnknownIdentifier { pos: SourceRef, name: String },

    #[error("{pos}: .global names undefined label \"{name}\"")]
    UnknownGlobal { pos: SourceRef, name: String },

    #[error("overflowing the {reserved} reserved bytes: {sections}")]
    Overflow { reserved: usize, sections: String },

    #[error("{pos}: step of {step} is outside the range -127..=127")]
    StepRange { pos: SourceRef, step: i64 },

    #[error("{pos}: no encoding for \"{mnemonic}\"")]
    NotEncodable { pos: SourceRef, mnemonic: String },

    #[error("internal error: {0}, please file a bug report")]
    Internal(String),

    #[error("{context}:\n{}", render(.errors))]
    Many {
        context: &'static str,
        errors: Vec<AsmError>,
    },
}

impl AsmError {
    pub fn many(context: &'static str, errors: Vec<AsmError>) -> AsmError {
        AsmError::Many { context, errors }
    }
}

fn render(errors: &[AsmError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
