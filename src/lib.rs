//! `orion` library crate.
//!
//! High-level layout:
//! - frontend: `lexer` + `parser` produce the shared AST (`ast`)
//! - backend: `target` ABI descriptors + `codegen` assembly emission
//! - `runtime`: the C-ABI support library linked into produced executables
pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod target;
pub mod token;

use thiserror::Error;

use codegen::CodeGenerator;
use target::Target;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
}

/// Full pipeline: source text in, GAS assembly text out.
pub fn compile(source: &str, target: &Target) -> Result<String, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::parse_tokens(tokens)?;
    Ok(CodeGenerator::new(target.clone()).generate(&program))
}
