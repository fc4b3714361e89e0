//! Flux: small floating-point expressions for layout parameters.
//!
//! Source text is tokenized by [`lexer`], turned into a [`Node`] tree by
//! [`parser`] and evaluated against local variables and an [`Environment`] of
//! functions and constants. [`Flux`] wraps the pipeline and caches the tree.

use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;

pub mod builtins;
pub mod env;
pub mod evaluator;
pub mod flux;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod special;
pub mod vector;

pub use env::{Arity, Environment, Function};
pub use evaluator::EvalError;
pub use flux::Flux;
pub use lexer::{tokenize, LexError, Lexer, Token, TokenKind};
pub use parser::{parse, Node, ParseError};
pub use vector::{Flux2, Flux3, Flux4};

/// Any failure along the tokenize, parse, evaluate pipeline.
#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

/// Tokenizes, parses and evaluates `source` in one go, without caching.
pub fn eval(
    source: &str,
    variables: &HashMap<String, f64>,
    env: &Environment,
) -> Result<f64, Error> {
    let tokens = tokenize(source)?;
    let tree = parse(&tokens)?;
    Ok(tree.evaluate(variables, env)?)
}
