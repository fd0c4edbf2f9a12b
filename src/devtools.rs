use std::fmt::Write;

use crate::arena::Arena;
use crate::lexer::TokenCst;
use crate::value::{NodeRef, Obj};

/// Pretty-prints the AST with indentation, one element per line. Used by
/// the `--print-ast` debug flag.
pub fn pretty_print_ast(arena: &Arena, root: NodeRef) -> String {
    pretty_print_with_indent(arena, root, 0)
}

fn pretty_print_with_indent(arena: &Arena, node: NodeRef, indent: usize) -> String {
    let indent_str = "  ".repeat(indent);
    let mut result = String::new();

    let Some(id) = node else {
        write!(result, "Nil").unwrap();
        return result;
    };

    match arena.obj(id) {
        Obj::Bool(b) => write!(result, "Bool:{}", b).unwrap(),
        Obj::Number(n) => write!(result, "Number:{}", n).unwrap(),
        Obj::Char(c) => write!(result, "Char:'{}'", c).unwrap(),
        Obj::Str(s) => write!(result, "Str:\"{}\"", s).unwrap(),
        Obj::Symbol(name) => write!(result, "Symbol:{}", name).unwrap(),
        Obj::Func { env, .. } => write!(result, "Func:env={}", env).unwrap(),
        Obj::Pair { .. } => {
            write!(result, "(").unwrap();
            let items = arena.list_items(Some(id));
            for item in &items {
                write!(
                    result,
                    "\n{}  {}",
                    indent_str,
                    pretty_print_with_indent(arena, *item, indent + 1)
                )
                .unwrap();
            }
            // An improper tail hangs off the last pair of the chain.
            let mut last = id;
            while let Some(next) = arena.tail(last) {
                if !arena.obj(next).is_pair() {
                    write!(
                        result,
                        "\n{}  . {}",
                        indent_str,
                        pretty_print_with_indent(arena, Some(next), indent + 1)
                    )
                    .unwrap();
                    break;
                }
                last = next;
            }
            write!(result, "\n{})", indent_str).unwrap();
        }
    }

    result
}

/// Dump the token list, one token per line with its source line. Used by
/// the `--print-tokens` debug flag.
pub fn dump_tokens(tokens: &[TokenCst]) -> String {
    let mut result = String::new();
    for tc in tokens {
        writeln!(result, "line {:4}  {:?}", tc.line, tc.token).unwrap();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::reader::Reader;

    #[test]
    fn ast_dump_shows_nesting() {
        let mut arena = Arena::new();
        let tokens = Lexer::tokenize("(+ 1 (f 2))").unwrap();
        let root = Reader::parse(&mut arena, tokens).unwrap();
        let form = arena.head(root.unwrap());

        let dump = pretty_print_ast(&arena, form);
        assert!(dump.contains("Symbol:+"));
        assert!(dump.contains("Number:1"));
        assert!(dump.contains("Symbol:f"));
    }

    #[test]
    fn token_dump_lists_lines() {
        let tokens = Lexer::tokenize("1\n2").unwrap();
        let dump = dump_tokens(&tokens);
        assert!(dump.contains("line    1"));
        assert!(dump.contains("line    2"));
    }
}
