use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    grammar,
    lexer::{Token, TokenKind},
};

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of tokens in {context}")]
    #[diagnostic(code(flux::parse::unexpected_eof))]
    UnexpectedEof { context: &'static str },

    #[error("unexpected token \"{token}\" in {context}")]
    #[diagnostic(code(flux::parse::unexpected_token))]
    UnexpectedToken {
        token: String,
        context: &'static str,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("expected \"{expected}\" in {context}")]
    #[diagnostic(code(flux::parse::expected_token))]
    ExpectedToken {
        expected: &'static str,
        context: &'static str,
        #[label("found here")]
        span: Option<SourceSpan>,
        found: Option<String>,
    },

    #[error("\"{operator}\" is not a prefix operator")]
    #[diagnostic(
        code(flux::parse::unknown_unary_operator),
        help("prefix operators are + - * / ! ~")
    )]
    UnknownUnaryOperator {
        operator: String,
        #[label("this operator")]
        span: SourceSpan,
    },

    #[error("unexpected tokens at the end of expression, starting with \"{token}\"")]
    #[diagnostic(code(flux::parse::trailing_tokens))]
    TrailingTokens {
        token: String,
        #[label("nothing is expected from here on")]
        span: SourceSpan,
    },

    #[error("expression is nested more than {limit} levels deep")]
    #[diagnostic(
        code(flux::parse::too_deep),
        help("split the expression or remove redundant parentheses")
    )]
    TooDeep {
        limit: usize,
        #[label("too deep from here")]
        span: SourceSpan,
    },

    #[error("invalid numeric literal \"{literal}\": {reason}")]
    #[diagnostic(code(flux::parse::invalid_number))]
    InvalidNumber {
        literal: String,
        reason: String,
        #[label("this numeric literal")]
        span: SourceSpan,
    },
}

/// A parsed expression. Every child is owned by exactly one parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(f64),
    Variable(String),
    FunctionCall {
        name: String,
        args: Vec<Node>,
    },
    /// A unary (one operand) or binary (two operands) operator application.
    Operator {
        symbol: String,
        operands: Vec<Node>,
    },
    Conditional {
        condition: Box<Node>,
        if_true: Box<Node>,
        if_false: Box<Node>,
    },
}

impl Node {
    pub fn unary(symbol: impl Into<String>, operand: Node) -> Self {
        Node::Operator {
            symbol: symbol.into(),
            operands: vec![operand],
        }
    }

    pub fn binary(symbol: impl Into<String>, left: Node, right: Node) -> Self {
        Node::Operator {
            symbol: symbol.into(),
            operands: vec![left, right],
        }
    }

    /// Names of all variables referenced by this tree, in first-seen order.
    pub fn free_variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'n>(&'n self, names: &mut Vec<&'n str>) {
        match self {
            Node::Number(_) => {}
            Node::Variable(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Node::FunctionCall { args, .. } => {
                args.iter().for_each(|arg| arg.collect_variables(names))
            }
            Node::Operator { operands, .. } => operands
                .iter()
                .for_each(|operand| operand.collect_variables(names)),
            Node::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                condition.collect_variables(names);
                if_true.collect_variables(names);
                if_false.collect_variables(names);
            }
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Number(n) => write!(f, "{}", n),
            Node::Variable(name) => write!(f, "{}", name),
            Node::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Node::Operator { symbol, operands } => match operands.as_slice() {
                [operand] => write!(f, "({}{})", symbol, operand),
                [left, right] => write!(f, "({} {} {})", left, symbol, right),
                _ => {
                    write!(f, "({}", symbol)?;
                    for operand in operands {
                        write!(f, " {}", operand)?;
                    }
                    write!(f, ")")
                }
            },
            Node::Conditional {
                condition,
                if_true,
                if_false,
            } => write!(f, "({} ? {} : {})", condition, if_true, if_false),
        }
    }
}

/// Parses a whole token sequence into one expression tree.
pub fn parse(tokens: &[Token<'_>]) -> Result<Node, ParseError> {
    Parser::new(tokens).parse()
}

/// How many parentheses, calls and prefix operators may enclose each other.
pub const MAX_NESTING: usize = 64;

pub struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    depth: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    pub fn new(tokens: &'t [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let mut expr = self.parse_level(0)?;

        if self.peek().is_some_and(|t| t.is_operator(grammar::CONDITIONAL)) {
            expr = self.parse_conditional(expr)?;
        }

        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(ParseError::TrailingTokens {
                token: token.slice.to_string(),
                span: token.span(),
            }),
        }
    }

    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self, context: &'static str) -> Result<&'t Token<'a>, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or(ParseError::UnexpectedEof { context })?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(
        &mut self,
        expected: &'static str,
        kind: TokenKind,
        context: &'static str,
    ) -> Result<(), ParseError> {
        match self.peek() {
            Some(token) if token.kind == kind && token.slice == expected => {
                self.pos += 1;
                Ok(())
            }
            found => Err(ParseError::ExpectedToken {
                expected,
                context,
                span: found.map(Token::span),
                found: found.map(|t| t.slice.to_string()),
            }),
        }
    }

    /// Runs `parse` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        opened_by: &Token<'_>,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::TooDeep {
                limit: MAX_NESTING,
                span: opened_by.span(),
            });
        }

        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_level(&mut self, level: usize) -> Result<Node, ParseError> {
        let Some(operators) = grammar::BINARY_PRECEDENCE.get(level) else {
            return self.parse_unary();
        };

        let mut left = self.parse_level(level + 1)?;
        while let Some(token) = self.peek() {
            if token.kind != TokenKind::Operator || !operators.contains(&token.slice) {
                break;
            }
            self.pos += 1;

            let right = self.parse_level(level + 1)?;
            left = Node::binary(token.slice, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        let Some(token) = self.peek() else {
            return Err(ParseError::UnexpectedEof {
                context: "unary operator expression",
            });
        };

        if token.kind != TokenKind::Operator {
            return self.parse_primary();
        }
        if !grammar::is_unary(token.slice) {
            return Err(ParseError::UnknownUnaryOperator {
                operator: token.slice.to_string(),
                span: token.span(),
            });
        }
        self.pos += 1;

        let operand = self.nested(token, Self::parse_unary)?;
        Ok(Node::unary(token.slice, operand))
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let token = self.advance("primary expression")?;

        match token.kind {
            TokenKind::Number => parse_number(token),
            TokenKind::Identifier => {
                if self.peek().is_some_and(|t| t.is_punctuation("(")) {
                    self.nested(token, |parser| parser.parse_call(token.slice))
                } else {
                    Ok(Node::Variable(token.slice.to_string()))
                }
            }
            TokenKind::Punctuation if token.slice == "(" => {
                self.nested(token, Self::parse_parenthesized)
            }
            _ => Err(ParseError::UnexpectedToken {
                token: token.slice.to_string(),
                context: "primary expression",
                span: token.span(),
            }),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Node, ParseError> {
        const CONTEXT: &str = "function call expression";

        self.expect("(", TokenKind::Punctuation, CONTEXT)?;

        let mut args = Vec::new();
        while self.peek().is_some_and(|t| !t.is_punctuation(")")) {
            args.push(self.parse_level(0)?);
            if self.peek().is_some_and(|t| t.is_punctuation(",")) {
                self.pos += 1;
            } else {
                break;
            }
        }

        self.expect(")", TokenKind::Punctuation, CONTEXT)?;

        Ok(Node::FunctionCall {
            name: name.to_string(),
            args,
        })
    }

    fn parse_parenthesized(&mut self) -> Result<Node, ParseError> {
        let expr = self.parse_level(0)?;
        self.expect(")", TokenKind::Punctuation, "parenthesis expression")?;
        Ok(expr)
    }

    fn parse_conditional(&mut self, condition: Node) -> Result<Node, ParseError> {
        const CONTEXT: &str = "conditional expression";

        self.expect(grammar::CONDITIONAL, TokenKind::Operator, CONTEXT)?;
        let if_true = self.parse_level(0)?;
        self.expect(grammar::CONDITIONAL_ELSE, TokenKind::Operator, CONTEXT)?;
        let if_false = self.parse_level(0)?;

        Ok(Node::Conditional {
            condition: Box::new(condition),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        })
    }
}

fn parse_number(token: &Token<'_>) -> Result<Node, ParseError> {
    let digits = token.slice.replace('\'', "");
    digits
        .parse::<f64>()
        .map(Node::Number)
        .map_err(|err| ParseError::InvalidNumber {
            literal: token.slice.to_string(),
            reason: err.to_string(),
            span: token.span(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_input(input: &str) -> Node {
        let tokens = tokenize(input).unwrap();
        parse(&tokens).unwrap()
    }

    fn parse_err(input: &str) -> ParseError {
        let tokens = tokenize(input).unwrap();
        parse(&tokens).unwrap_err()
    }

    #[test]
    fn test_number() {
        assert_eq!(parse_input("42"), Node::Number(42.0));
        assert_eq!(parse_input("1'000.5"), Node::Number(1000.5));
    }

    #[test]
    fn test_variable_and_call() {
        assert_eq!(parse_input("psx"), Node::Variable("psx".into()));
        assert_eq!(
            parse_input("max(a, 2)"),
            Node::FunctionCall {
                name: "max".into(),
                args: vec![Node::Variable("a".into()), Node::Number(2.0)],
            }
        );
        assert_eq!(
            parse_input("nan()"),
            Node::FunctionCall {
                name: "nan".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_multiplicative_binds_tighter() {
        assert_eq!(parse_input("2 + 3 * 4").to_string(), "(2 + (3 * 4))");
        assert_eq!(parse_input("(2 + 3) * 4").to_string(), "((2 + 3) * 4)");
    }

    #[test]
    fn test_levels_are_left_associative() {
        assert_eq!(parse_input("2 ** 3 ** 2").to_string(), "((2 ** 3) ** 2)");
        assert_eq!(parse_input("8 - 4 - 2").to_string(), "((8 - 4) - 2)");
    }

    #[test]
    fn test_bitwise_is_loosest_and_coalescing_tightest() {
        assert_eq!(parse_input("a & b + c").to_string(), "(a & (b + c))");
        assert_eq!(parse_input("a + b ?? c").to_string(), "(a + (b ?? c))");
    }

    #[test]
    fn test_unary_chain() {
        assert_eq!(parse_input("- ~ x").to_string(), "(-(~x))");
        assert_eq!(parse_input("2 * -x").to_string(), "(2 * (-x))");
    }

    #[test]
    fn test_absolute_difference() {
        assert_eq!(parse_input("a !! b").to_string(), "(a !! b)");
    }

    #[test]
    fn test_conditional_at_top_level() {
        let node = parse_input("x > 1 ? x : -x");
        assert_eq!(node.to_string(), "((x > 1) ? x : (-x))");
    }

    #[test]
    fn test_conditional_is_not_nested() {
        assert!(matches!(
            parse_err("a ? b ? c : d : e"),
            ParseError::ExpectedToken { expected: ":", .. }
        ));
        assert!(matches!(
            parse_err("(a ? b : c)"),
            ParseError::ExpectedToken { expected: ")", .. }
        ));
    }

    #[test]
    fn test_missing_colon() {
        assert!(matches!(
            parse_err("a ? b"),
            ParseError::ExpectedToken {
                expected: ":",
                found: None,
                ..
            }
        ));
    }

    #[test]
    fn test_unclosed_parenthesis() {
        assert!(matches!(
            parse_err("(1 + 2"),
            ParseError::ExpectedToken { expected: ")", .. }
        ));
        assert!(matches!(
            parse_err("min(1, 2"),
            ParseError::ExpectedToken { expected: ")", .. }
        ));
    }

    #[test]
    fn test_trailing_tokens() {
        assert!(matches!(
            parse_err("1 2"),
            ParseError::TrailingTokens { ref token, .. } if token == "2"
        ));
        assert!(matches!(parse_err("1 )"), ParseError::TrailingTokens { .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_err(""), ParseError::UnexpectedEof { .. }));
        assert!(matches!(parse_err("1 +"), ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_invalid_number() {
        assert!(matches!(
            parse_err("1.2.3"),
            ParseError::InvalidNumber { ref literal, .. } if literal == "1.2.3"
        ));
    }

    #[test]
    fn test_merged_operators_are_rejected() {
        assert!(matches!(
            parse_err("2 *- 3"),
            ParseError::TrailingTokens { .. }
        ));
        assert!(matches!(
            parse_err("?? 3"),
            ParseError::UnknownUnaryOperator { .. }
        ));
    }

    #[test]
    fn test_unexpected_punctuation() {
        assert!(matches!(
            parse_err("1 + ,"),
            ParseError::UnexpectedToken { ref token, .. } if token == ","
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_input(&nested(MAX_NESTING)), Node::Number(1.0));

        assert!(matches!(
            parse_err(&nested(MAX_NESTING + 1)),
            ParseError::TooDeep { limit: MAX_NESTING, .. }
        ));
        assert!(matches!(
            parse_err(&nested(1000)),
            ParseError::TooDeep { .. }
        ));
        assert!(matches!(
            parse_err(&format!("{}1", "- ".repeat(1000))),
            ParseError::TooDeep { .. }
        ));
        assert!(matches!(
            parse_err(&format!("{}1{}", "abs(".repeat(200), ")".repeat(200))),
            ParseError::TooDeep { .. }
        ));
    }

    #[test]
    fn test_free_variables() {
        let node = parse_input("psx * 0.5 + f(csy, psx) ? w : h");
        assert_eq!(node.free_variables(), vec!["psx", "csy", "w", "h"]);
    }
}
