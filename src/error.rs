use std::fmt;

use crate::stream::Source;

//===----------------------------------------------------------------------===//
// Error
//===----------------------------------------------------------------------===//

/// Interpreter error kinds. Any failure unwinds all pending evaluations
/// immediately; there is no local recovery.
#[derive(Debug, Clone)]
pub enum Error {
    Syntax(SyntaxError),
    /// The lexer produced input no rule accepts.
    InvalidLex { line: u64 },
    /// A symbol had no binding in the environment chain.
    SymbolNotFound { line: u64, name: String },
    /// An operand had the wrong variant.
    TypeMismatch { line: u64, expected: &'static str, found: &'static str },
    /// The environment stack ran out of slots.
    StackOverflow { line: u64 },
    /// The node pool exhausted its id space.
    Alloc,
    /// A file stream was opened twice.
    StreamAlreadyOpen,
    /// `run` was called before a successful `parse`.
    NotParsed,
    /// A user-visible runtime error.
    Runtime { line: u64, message: String },
}

impl Error {
    /// Source line the error refers to, if it carries one.
    pub fn line(&self) -> Option<u64> {
        match self {
            Error::Syntax(e) => Some(e.line()),
            Error::InvalidLex { line }
            | Error::SymbolNotFound { line, .. }
            | Error::TypeMismatch { line, .. }
            | Error::StackOverflow { line }
            | Error::Runtime { line, .. } => Some(*line),
            Error::Alloc | Error::StreamAlreadyOpen | Error::NotParsed => None,
        }
    }

    /// Fill in a missing (zero) line annotation. Errors raised by layers
    /// that do not know the source position leave line 0 for the caller.
    pub fn at(self, line: u64) -> Error {
        match self {
            Error::StackOverflow { line: 0 } => Error::StackOverflow { line },
            Error::SymbolNotFound { line: 0, name } => {
                Error::SymbolNotFound { line, name }
            }
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Syntax(e) => write!(f, "{}", e),
            Error::InvalidLex { .. } => write!(f, "invalid lexicon"),
            Error::SymbolNotFound { name, .. } => {
                write!(f, "variable '{}' was not found", name)
            }
            Error::TypeMismatch { expected, found, .. } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Error::StackOverflow { .. } => write!(f, "environment stack overflow"),
            Error::Alloc => write!(f, "node allocation failed"),
            Error::StreamAlreadyOpen => write!(f, "stream has already been opened"),
            Error::NotParsed => write!(f, "no program has been parsed"),
            Error::Runtime { message, .. } => write!(f, "{}", message),
        }
    }
}

//===----------------------------------------------------------------------===//
// SyntaxError
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone)]
pub enum SyntaxError {
    /// An opening `"` never found its closing quote before EOF.
    UnpairedString { line: u64 },
    /// A list was still open when the tokens ran out, or a stray `)`
    /// appeared at top level.
    ParenMismatch { line: u64 },
    BadBoolean { line: u64, lexeme: String },
    BadCharacter { line: u64, lexeme: String },
    BadNumber { line: u64, lexeme: String },
    BadString { line: u64 },
    /// Fixed-arity form or primitive applied to the wrong operand count.
    Arity { line: u64, form: &'static str },
    /// A call supplied more or fewer arguments than the parameter list.
    CallArity { line: u64, expected: usize, given: usize },
    Malformed { line: u64, message: String },
}

impl SyntaxError {
    pub fn line(&self) -> u64 {
        match self {
            SyntaxError::UnpairedString { line }
            | SyntaxError::ParenMismatch { line }
            | SyntaxError::BadBoolean { line, .. }
            | SyntaxError::BadCharacter { line, .. }
            | SyntaxError::BadNumber { line, .. }
            | SyntaxError::BadString { line }
            | SyntaxError::Arity { line, .. }
            | SyntaxError::CallArity { line, .. }
            | SyntaxError::Malformed { line, .. } => *line,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyntaxError::UnpairedString { .. } => write!(f, "string '\"' unpaired"),
            SyntaxError::ParenMismatch { .. } => {
                write!(f, "Parentheses do not match")
            }
            SyntaxError::BadBoolean { lexeme, .. } => {
                write!(f, "not a boolean value: {}", lexeme)
            }
            SyntaxError::BadCharacter { lexeme, .. } => {
                write!(f, "invalid character syntax: {}", lexeme)
            }
            SyntaxError::BadNumber { lexeme, .. } => {
                write!(f, "invalid number: {}", lexeme)
            }
            SyntaxError::BadString { .. } => write!(f, "string format mismatch"),
            SyntaxError::Arity { form, .. } => write!(f, "'{}' syntax error", form),
            SyntaxError::CallArity { expected, given, .. } => write!(
                f,
                "invalid number of actual parameters: expected {}, got {}",
                expected, given
            ),
            SyntaxError::Malformed { message, .. } => write!(f, "{}", message),
        }
    }
}

//===----------------------------------------------------------------------===//
// Diagnostic
//===----------------------------------------------------------------------===//

/// A reportable error: the kind plus enough context to point at the source.
/// Column information is not tracked; it renders as 0.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub error: Error,
    /// The source text the error originated from, used to show the
    /// offending line. Empty when unavailable.
    pub source: String,
    pub file: Source,
}

impl Diagnostic {
    pub fn new(error: Error, source: String, file: Source) -> Self {
        Self { error, source, file }
    }

    /// Formats a multi-line report: the message, a `--> file:line:0`
    /// location header, and the offending source line when available.
    pub fn format(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("error: {}\n", self.error));

        let Some(line) = self.error.line() else {
            output.push_str(&format!("  --> {}\n", self.file.display()));
            return output;
        };

        output.push_str(&format!("  --> {}:{}:0\n", self.file.display(), line));

        if let Some(content) = self.source.lines().nth(line.saturating_sub(1) as usize)
        {
            output.push_str("   |\n");
            output.push_str(&format!("{:4} | {}\n", line, content));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_points_at_offending_line() {
        let source = "(+ 1 2)\n(car 5)\n".to_string();
        let error = Error::TypeMismatch { line: 2, expected: "pair", found: "number" };
        let report = Diagnostic::new(error, source, Source::Repl).format();

        assert!(report.contains("type mismatch"));
        assert!(report.contains("REPL:2:0"));
        assert!(report.contains("(car 5)"));
    }

    #[test]
    fn lineless_errors_still_format() {
        let report =
            Diagnostic::new(Error::Alloc, String::new(), Source::Repl).format();
        assert!(report.contains("allocation failed"));
    }
}
