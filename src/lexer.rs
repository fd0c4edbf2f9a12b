use logos::Logos;
use std::fmt;

use crate::error::{Error, SyntaxError};
use crate::stream::{self, CharStream};

//===----------------------------------------------------------------------===//
// Token
//
// Uses the logos crate for tokenization. The surface has four token kinds:
// the two parens, quoted strings, and "misc" runs that the parser later
// classifies into booleans, characters, numbers, and symbols.
//===----------------------------------------------------------------------===//

#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token {
    // Space, tab, and newline separate tokens; newlines are counted back in
    // from the spans when lines are assigned.
    #[regex(r"[ \t\n]+", logos::skip)]
    // Line comments: from ; to end-of-line.
    #[regex(r";[^\n]*", logos::skip)]
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // String literal, stored verbatim with its quotes. No escape
    // processing: the first closing quote ends the string.
    #[regex(r#""[^"]*""#, callback = |lex| lex.slice().to_owned())]
    Str(String),

    // An opening quote that runs to EOF without closing. Lexes to a syntax
    // error; the parser never sees it.
    #[regex(r#""[^"]*"#, priority = 0, callback = |lex| lex.slice().to_owned())]
    UnterminatedStr(String),

    // Maximal run terminated by whitespace, parens, or a comment. A quote
    // inside the run does not terminate it, but cannot start one.
    #[regex(r#"[^ \t\n();"][^ \t\n();]*"#, callback = |lex| lex.slice().to_owned())]
    Misc(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Str(s) => write!(f, "{}", s),
            Token::UnterminatedStr(s) => write!(f, "{}", s),
            Token::Misc(s) => write!(f, "{}", s),
        }
    }
}

/// A token plus the line on which it began.
#[derive(Debug, PartialEq, Clone)]
pub struct TokenCst {
    pub token: Token,
    pub line: u64,
}

//===----------------------------------------------------------------------===//
// Lexer
//===----------------------------------------------------------------------===//

pub struct Lexer;

impl Lexer {
    /// Drain a character stream and tokenize its contents.
    pub fn lex(input: &mut dyn CharStream) -> Result<Vec<TokenCst>, Error> {
        let source = stream::read_to_string(input);
        Self::tokenize(&source)
    }

    /// Tokenize source text. Every non-EOF character either lands in
    /// exactly one token's lexeme, is whitespace/comment noise, or raises
    /// an error here.
    pub fn tokenize(source: &str) -> Result<Vec<TokenCst>, Error> {
        let mut lexer = Token::lexer(source);
        let mut tokens = Vec::new();

        let mut line: u64 = 1;
        let mut scanned = 0usize;

        while let Some(result) = lexer.next() {
            let span = lexer.span();
            // Count the newlines between the previous token start and this
            // one; string lexemes may span lines, so the gap includes them.
            line += source[scanned..span.start].matches('\n').count() as u64;
            scanned = span.start;

            match result {
                Ok(Token::UnterminatedStr(_)) => {
                    return Err(Error::Syntax(SyntaxError::UnpairedString { line }));
                }
                Ok(token) => tokens.push(TokenCst { token, line }),
                Err(()) => return Err(Error::InvalidLex { line }),
            }
        }

        Ok(tokens)
    }
}
