use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("invalid character in token: {character:?} (at {offset})")]
    #[diagnostic(code(flux::lex::unexpected_character))]
    UnexpectedCharacter {
        character: char,
        offset: usize,
        #[label("this input character")]
        span: SourceSpan,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub slice: &'a str,
    pub offset: usize,
    pub kind: TokenKind,
}

impl Token<'_> {
    pub fn span(&self) -> SourceSpan {
        (self.offset..self.offset + self.slice.len()).into()
    }

    pub fn is_operator(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Operator && self.slice == symbol
    }

    pub fn is_punctuation(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.slice == symbol
    }
}

impl<'a> std::fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `a`-`z`, `A`-`Z` or `_`, then any of those, digits or `.`.
    Identifier,
    /// A digit, then digits, `.` (decimal point) or `'` (digit separator).
    Number,
    /// A run of `+ - * / % ^ = ! ~ & | < > ? : [ ]`.
    Operator,
    /// One of `@ # $ ( ) { } \ ; ,`. Never merged with its neighbours.
    Punctuation,
}

impl TokenKind {
    fn starting_with(c: char) -> Option<Self> {
        match c {
            'a'..='z' | 'A'..='Z' | '_' => Some(Self::Identifier),
            '0'..='9' => Some(Self::Number),
            c if is_operator_char(c) => Some(Self::Operator),
            c if is_punctuation_char(c) => Some(Self::Punctuation),
            _ => None,
        }
    }

    fn continues_with(self, c: char) -> bool {
        match self {
            Self::Identifier => matches!(c, 'a'..='z' | 'A'..='Z' | '_' | '0'..='9' | '.'),
            Self::Number => matches!(c, '0'..='9' | '.' | '\''),
            Self::Operator => is_operator_char(c),
            Self::Punctuation => false,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TokenKind::Identifier => "identifier",
                TokenKind::Number => "number",
                TokenKind::Operator => "operator",
                TokenKind::Punctuation => "punctuation",
            }
        )
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '%' | '^' | '=' | '!' | '~' | '&' | '|' | '<' | '>' | '?' | ':'
            | '[' | ']'
    )
}

fn is_punctuation_char(c: char) -> bool {
    matches!(c, '@' | '#' | '$' | '(' | ')' | '{' | '}' | '\\' | ';' | ',')
}

/// Tokenizes the whole of `source`, stopping at the first invalid character.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    let tokens = Lexer::new(source).collect::<Result<Vec<_>, _>>()?;
    log::trace!("tokenized {:?} into {} tokens", source, tokens.len());
    Ok(tokens)
}

#[derive(Debug)]
pub struct Lexer<'a> {
    rest: &'a str,
    byte: usize,
    peeked: Option<Result<Token<'a>, LexError>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            byte: 0,
            peeked: None,
        }
    }

    pub fn peek(&mut self) -> Option<&Result<Token<'a>, LexError>> {
        if self.peeked.is_some() {
            return self.peeked.as_ref();
        }

        self.peeked = self.next();
        self.peeked.as_ref()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(next) = self.peeked.take() {
            return Some(next);
        }

        loop {
            let mut chars = self.rest.chars();
            let c = chars.next()?;
            let offset = self.byte;
            let c_onwards = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            if c.is_ascii_whitespace() || c == '\x0B' {
                continue;
            }

            let Some(kind) = TokenKind::starting_with(c) else {
                // Leave the lexer exhausted so a caller that keeps iterating stops here.
                self.byte += self.rest.len();
                self.rest = "";
                return Some(Err(LexError::UnexpectedCharacter {
                    character: c,
                    offset,
                    span: (offset..offset + c.len_utf8()).into(),
                }));
            };

            let end = c_onwards
                .char_indices()
                .skip(1)
                .find(|&(_, c)| !kind.continues_with(c))
                .map_or(c_onwards.len(), |(i, _)| i);

            let literal = &c_onwards[..end];
            let extra_byte = literal.len() - c.len_utf8();
            self.byte += extra_byte;
            self.rest = &self.rest[extra_byte..];

            return Some(Ok(Token {
                slice: literal,
                offset,
                kind,
            }));
        }
    }
}
