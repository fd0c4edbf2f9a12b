use crate::arena::Arena;
use crate::error::{Error, SyntaxError};
use crate::lexer::{Token, TokenCst};
use crate::value::{NodeRef, Obj};

//===----------------------------------------------------------------------===//
// Reader
//
// Consumes the token vector front-to-back with a cursor and builds the AST
// in the arena. The root is a right-nested pair-list holding the top-level
// expressions in source order; an empty program parses to nil.
//===----------------------------------------------------------------------===//

#[derive(Debug)]
pub struct Reader<'a> {
    arena: &'a mut Arena,
    tokens: Vec<TokenCst>,
    position: usize,
    /// Line of the most recently consumed token, for errors raised when the
    /// cursor runs out.
    last_line: u64,
}

impl<'a> Reader<'a> {
    /// Parse a whole token sequence into the root node.
    pub fn parse(arena: &'a mut Arena, tokens: Vec<TokenCst>) -> Result<NodeRef, Error> {
        let mut reader = Reader { arena, tokens, position: 0, last_line: 1 };
        reader.read_program()
    }

    fn next(&mut self) -> Option<TokenCst> {
        let tc = self.tokens.get(self.position).cloned()?;
        self.position += 1;
        self.last_line = tc.line;
        Some(tc)
    }

    fn peek(&self) -> Option<&TokenCst> {
        self.tokens.get(self.position)
    }

    fn read_program(&mut self) -> Result<NodeRef, Error> {
        let mut forms = Vec::new();
        while self.peek().is_some() {
            let line = self.peek().map(|t| t.line).unwrap_or(self.last_line);
            let form = self.read_form()?;
            forms.push((form, line));
        }

        let mut list: NodeRef = None;
        for (form, line) in forms.into_iter().rev() {
            list = Some(self.arena.alloc_pair(form, list, line)?);
        }
        Ok(list)
    }

    fn read_form(&mut self) -> Result<NodeRef, Error> {
        let Some(tc) = self.next() else {
            return Err(Error::Syntax(SyntaxError::ParenMismatch {
                line: self.last_line,
            }));
        };

        match tc.token {
            Token::LParen => self.read_list(),
            Token::RParen => {
                // A closing paren can only be consumed by read_list.
                Err(Error::Syntax(SyntaxError::ParenMismatch { line: tc.line }))
            }
            Token::Str(lexeme) => self.read_string(&lexeme, tc.line),
            Token::Misc(lexeme) => self.read_misc(&lexeme, tc.line),
            Token::UnterminatedStr(_) => Err(Error::InvalidLex { line: tc.line }),
        }
    }

    /// `list-body := ')' | expression list-body`
    fn read_list(&mut self) -> Result<NodeRef, Error> {
        match self.peek() {
            None => Err(Error::Syntax(SyntaxError::ParenMismatch {
                line: self.last_line,
            })),
            Some(tc) if tc.token == Token::RParen => {
                self.next();
                Ok(None)
            }
            Some(tc) => {
                let line = tc.line;
                let head = self.read_form()?;
                let tail = self.read_list()?;
                Ok(Some(self.arena.alloc_pair(head, tail, line)?))
            }
        }
    }

    /// The lexeme arrives with its surrounding quotes; strip them.
    fn read_string(&mut self, lexeme: &str, line: u64) -> Result<NodeRef, Error> {
        if lexeme.len() < 2 || !lexeme.starts_with('"') || !lexeme.ends_with('"') {
            return Err(Error::Syntax(SyntaxError::BadString { line }));
        }
        let content = lexeme[1..lexeme.len() - 1].to_string();
        Ok(Some(self.arena.alloc_atom(Obj::Str(content), line)?))
    }

    /// Classify a misc run by its first characters: boolean, character,
    /// number, or symbol.
    fn read_misc(&mut self, lexeme: &str, line: u64) -> Result<NodeRef, Error> {
        let mut chars = lexeme.chars();
        let first = chars.next().unwrap_or('\0');
        let second = chars.next();

        match first {
            '#' => self.read_boolean(lexeme, line),
            '\'' => self.read_character(lexeme, line),
            '.' | '+' | '-' if matches!(second, Some(c) if c.is_ascii_digit() || c == '.') => {
                self.read_number(lexeme, line)
            }
            c if c.is_ascii_digit() => self.read_number(lexeme, line),
            _ => Ok(Some(
                self.arena.alloc_atom(Obj::Symbol(lexeme.to_string()), line)?,
            )),
        }
    }

    fn read_boolean(&mut self, lexeme: &str, line: u64) -> Result<NodeRef, Error> {
        let value = match lexeme {
            "#t" | "#T" => true,
            "#f" | "#F" => false,
            _ => {
                return Err(Error::Syntax(SyntaxError::BadBoolean {
                    line,
                    lexeme: lexeme.to_string(),
                }));
            }
        };
        Ok(Some(self.arena.alloc_atom(Obj::Bool(value), line)?))
    }

    /// A character literal is exactly `'X'` for a single character X.
    fn read_character(&mut self, lexeme: &str, line: u64) -> Result<NodeRef, Error> {
        let chars: Vec<char> = lexeme.chars().collect();
        if chars.len() != 3 || chars[0] != '\'' || chars[2] != '\'' {
            return Err(Error::Syntax(SyntaxError::BadCharacter {
                line,
                lexeme: lexeme.to_string(),
            }));
        }
        Ok(Some(self.arena.alloc_atom(Obj::Char(chars[1]), line)?))
    }

    /// Optional sign, integer part, optional `.` and fraction. Anything
    /// left over after the numeric run is an error.
    fn read_number(&mut self, lexeme: &str, line: u64) -> Result<NodeRef, Error> {
        let bad = || {
            Error::Syntax(SyntaxError::BadNumber { line, lexeme: lexeme.to_string() })
        };

        let mut rest = lexeme;
        rest = rest.strip_prefix(['+', '-']).unwrap_or(rest);

        let int_digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        rest = &rest[int_digits..];

        let mut frac_digits = 0;
        if let Some(after_dot) = rest.strip_prefix('.') {
            frac_digits = after_dot.chars().take_while(|c| c.is_ascii_digit()).count();
            rest = &after_dot[frac_digits..];
        }

        if !rest.is_empty() || int_digits + frac_digits == 0 {
            return Err(bad());
        }

        let value: f64 = lexeme.parse().map_err(|_| bad())?;
        Ok(Some(self.arena.alloc_atom(Obj::Number(value), line)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Result<(Arena, NodeRef), Error> {
        let mut arena = Arena::new();
        let tokens = Lexer::tokenize(source)?;
        let root = Reader::parse(&mut arena, tokens)?;
        Ok((arena, root))
    }

    fn first_form(arena: &Arena, root: NodeRef) -> NodeRef {
        arena.head(root.expect("empty program"))
    }

    #[test]
    fn empty_program_parses_to_nil() {
        let (_, root) = parse("").unwrap();
        assert_eq!(root, None);
    }

    #[test]
    fn top_level_forms_become_a_list_in_source_order() {
        let (arena, root) = parse("1 2 3").unwrap();
        let items = arena.list_items(root);
        assert_eq!(items.len(), 3);
        let values: Vec<f64> = items
            .iter()
            .map(|item| match arena.obj(item.unwrap()) {
                Obj::Number(n) => *n,
                other => panic!("expected number, got {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn atoms_classify_by_leading_characters() {
        for (source, expect) in [
            ("#t", "boolean"),
            ("#F", "boolean"),
            ("'x'", "character"),
            ("42", "number"),
            ("-4.25", "number"),
            (".5", "number"),
            ("+.5", "number"),
            ("\"hi\"", "string"),
            ("foo", "symbol"),
            ("+", "symbol"),
            ("-", "symbol"),
            ("set-car!", "symbol"),
        ] {
            let (arena, root) = parse(source).unwrap();
            let atom = first_form(&arena, root).unwrap();
            assert_eq!(arena.obj(atom).type_name(), expect, "for {:?}", source);
        }
    }

    #[test]
    fn number_values_parse_as_f64() {
        let (arena, root) = parse("-12.5").unwrap();
        match arena.obj(first_form(&arena, root).unwrap()) {
            Obj::Number(n) => assert_eq!(*n, -12.5),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn string_atom_strips_quotes_only() {
        let (arena, root) = parse(r#""a b; (c)""#).unwrap();
        match arena.obj(first_form(&arena, root).unwrap()) {
            Obj::Str(s) => assert_eq!(s, "a b; (c)"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn nested_lists_are_right_nested_pairs() {
        let (arena, root) = parse("(1 (2 3))").unwrap();
        let outer = first_form(&arena, root);
        let items = arena.list_items(outer);
        assert_eq!(items.len(), 2);
        let inner = arena.list_items(items[1]);
        assert_eq!(inner.len(), 2);
        assert!(arena.is_proper_list(outer));
    }

    #[test]
    fn empty_list_is_nil() {
        let (_, root) = parse("()").unwrap();
        // One top-level form whose value is nil.
        assert!(root.is_some());
    }

    #[test]
    fn unclosed_list_reports_paren_mismatch() {
        let err = parse("(+ 1\n(- 2").unwrap_err();
        match err {
            Error::Syntax(SyntaxError::ParenMismatch { line }) => assert_eq!(line, 2),
            other => panic!("expected paren mismatch, got {:?}", other),
        }
    }

    #[test]
    fn stray_close_paren_reports_paren_mismatch() {
        let err = parse(")").unwrap_err();
        assert!(matches!(err, Error::Syntax(SyntaxError::ParenMismatch { .. })));
    }

    #[test]
    fn malformed_atoms_are_syntax_errors() {
        assert!(matches!(
            parse("#x").unwrap_err(),
            Error::Syntax(SyntaxError::BadBoolean { .. })
        ));
        assert!(matches!(
            parse("'ab'").unwrap_err(),
            Error::Syntax(SyntaxError::BadCharacter { .. })
        ));
        assert!(matches!(
            parse("1.2.3").unwrap_err(),
            Error::Syntax(SyntaxError::BadNumber { .. })
        ));
        assert!(matches!(
            parse("..").unwrap_err(),
            Error::Syntax(SyntaxError::BadNumber { .. })
        ));
    }

    #[test]
    fn dot_alone_is_a_symbol() {
        let (arena, root) = parse(".").unwrap();
        assert_eq!(arena.obj(first_form(&arena, root).unwrap()).type_name(), "symbol");
    }
}
