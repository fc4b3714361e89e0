//! Operator tables consulted by the parser.

/// Binary operators grouped by precedence. Index 0 is parsed first and so
/// binds loosest; every level is left-associative.
pub const BINARY_PRECEDENCE: &[&[&str]] = &[
    &["&", "|", "^"],                                            // bitwise
    &["<<", ">>"],                                               // bit shift
    &["+", "-"],                                                 // additive
    &["*", "/"],                                                 // multiplicative
    &["%", "%%"],                                                // modulo
    &["**", "//"],                                               // power, flooring division
    &["<?", ">?", "!!"],                                         // min, max, absolute difference
    &["==", "!=", "<", ">", "<=", ">=", "!<", "!>", "!<=", "!>="], // relational
    &["&&", "||"],                                               // logical
    &["=>"],                                                     // implication
    &["??"],                                                     // null-coalescing
];

/// Prefix operators, all binding tighter than any binary level.
pub const UNARY_OPERATORS: &[&str] = &["+", "-", "*", "/", "!", "~"];

pub const CONDITIONAL: &str = "?";
pub const CONDITIONAL_ELSE: &str = ":";

/// Returns the precedence level of a binary operator.
pub fn binary_level(symbol: &str) -> Option<usize> {
    BINARY_PRECEDENCE
        .iter()
        .position(|level| level.contains(&symbol))
}

pub fn is_unary(symbol: &str) -> bool {
    UNARY_OPERATORS.contains(&symbol)
}
