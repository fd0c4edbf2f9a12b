//! Atom printer.
//!
//! `display` and `print` go through a pluggable [`PrintSink`] so embedders
//! control where rendered text lands. The rendering convention matches the
//! reference console output.

use itertools::Itertools;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::arena::Arena;
use crate::value::{NodeId, NodeRef, Obj};

pub trait PrintSink {
    fn write(&mut self, text: &str);
}

/// Default sink: stdout, flushed per write so interleaving with prompts and
/// diagnostics stays ordered.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl PrintSink for ConsoleSink {
    fn write(&mut self, text: &str) {
        print!("{}", text);
        io::stdout().flush().ok();
    }
}

/// Buffering sink for tests and tooling. Clones share one buffer, so a
/// test can keep a handle while the interpreter owns the sink.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    buffer: Rc<RefCell<String>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }
}

impl PrintSink for CaptureSink {
    fn write(&mut self, text: &str) {
        self.buffer.borrow_mut().push_str(text);
    }
}

/// Render `node` and hand it to the sink, with an optional trailing newline.
pub fn print_node(arena: &Arena, node: NodeRef, newline: bool, sink: &mut dyn PrintSink) {
    sink.write(&render_node(arena, node));
    if newline {
        sink.write("\n");
    }
}

/// Render a node per the console convention:
/// nil, `#t`/`#f`, numbers in the host default format, strings quoted
/// verbatim, `'c'` characters, `symbol = name`, `#func`, and lists as
/// `( e1 e2 ... )` with improper tails as `. tail`.
pub fn render_node(arena: &Arena, node: NodeRef) -> String {
    let Some(id) = node else {
        return "nil".to_string();
    };

    match arena.obj(id) {
        Obj::Symbol(name) => format!("symbol = {}", name),
        Obj::Pair { .. } => render_pair(arena, id),
        other => other.to_string(),
    }
}

fn render_pair(arena: &Arena, pair: NodeId) -> String {
    let mut parts = Vec::new();
    let mut cur = Some(pair);
    while let Some(id) = cur {
        match arena.obj(id) {
            Obj::Pair { head, tail } => {
                parts.push(render_node(arena, *head));
                cur = *tail;
            }
            _ => {
                parts.push(".".to_string());
                parts.push(render_node(arena, Some(id)));
                break;
            }
        }
    }
    format!("( {} )", parts.iter().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(arena: &mut Arena, obj: Obj) -> NodeRef {
        Some(arena.alloc_atom(obj, 1).unwrap())
    }

    #[test]
    fn atom_rendering_follows_the_convention() {
        let mut arena = Arena::new();
        assert_eq!(render_node(&arena, None), "nil");

        let t = atom(&mut arena, Obj::Bool(true));
        assert_eq!(render_node(&arena, t), "#t");
        let f = atom(&mut arena, Obj::Bool(false));
        assert_eq!(render_node(&arena, f), "#f");

        let n = atom(&mut arena, Obj::Number(2.5));
        assert_eq!(render_node(&arena, n), "2.5");

        let s = atom(&mut arena, Obj::Str("hi".into()));
        assert_eq!(render_node(&arena, s), "\"hi\"");

        let c = atom(&mut arena, Obj::Char('x'));
        assert_eq!(render_node(&arena, c), "'x'");

        let sym = atom(&mut arena, Obj::Symbol("foo".into()));
        assert_eq!(render_node(&arena, sym), "symbol = foo");

        let func = arena.alloc_func(None, None, 0, 1).unwrap();
        assert_eq!(render_node(&arena, Some(func)), "#func");
    }

    #[test]
    fn proper_list_renders_space_separated() {
        let mut arena = Arena::new();
        let one = atom(&mut arena, Obj::Number(1.0));
        let two = atom(&mut arena, Obj::Number(2.0));
        let tail = arena.alloc_pair(two, None, 1).unwrap();
        let list = arena.alloc_pair(one, Some(tail), 1).unwrap();

        assert_eq!(render_node(&arena, Some(list)), "( 1 2 )");
    }

    #[test]
    fn improper_tail_renders_dotted() {
        let mut arena = Arena::new();
        let one = atom(&mut arena, Obj::Number(1.0));
        let two = atom(&mut arena, Obj::Number(2.0));
        let pair = arena.alloc_pair(one, two, 1).unwrap();

        assert_eq!(render_node(&arena, Some(pair)), "( 1 . 2 )");
    }

    #[test]
    fn capture_sink_accumulates_writes() {
        let mut arena = Arena::new();
        let n = atom(&mut arena, Obj::Number(7.0));
        let mut sink = CaptureSink::new();
        print_node(&arena, n, false, &mut sink);
        print_node(&arena, None, true, &mut sink);
        assert_eq!(sink.contents(), "7nil\n");
    }
}
