//! Node pool for the interpreter.
//!
//! Every syntax and runtime node lives in a single arena owned by the
//! interpreter instance. Handles ([`NodeId`]) are plain indices, so pair
//! cells are shared by reference: a `set_head`/`set_tail` through one alias
//! is visible through all of them. Nothing is freed before the arena is
//! dropped.

use crate::error::Error;
use crate::value::{EnvSp, Node, NodeId, NodeRef, Obj};

#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn alloc(&mut self, node: Node) -> Result<NodeId, Error> {
        let id = self.nodes.len();
        if id > u32::MAX as usize {
            return Err(Error::Alloc);
        }
        self.nodes.push(node);
        Ok(NodeId(id as u32))
    }

    /// Allocate a pair cell with the given head/tail and source line.
    pub fn alloc_pair(
        &mut self,
        head: NodeRef,
        tail: NodeRef,
        line: u64,
    ) -> Result<NodeId, Error> {
        self.alloc(Node { line, obj: Obj::Pair { head, tail } })
    }

    /// Generic two-slot cons used by the environment stack; carries line 0.
    pub fn alloc_cons(&mut self, head: NodeRef, tail: NodeRef) -> Result<NodeId, Error> {
        self.alloc_pair(head, tail, 0)
    }

    /// Allocate a function node closing over the environment index `env`.
    pub fn alloc_func(
        &mut self,
        params: NodeRef,
        body: NodeRef,
        env: EnvSp,
        line: u64,
    ) -> Result<NodeId, Error> {
        self.alloc(Node { line, obj: Obj::Func { params, body, env } })
    }

    /// Allocate an atom (boolean, number, character, string, or symbol).
    pub fn alloc_atom(&mut self, obj: Obj, line: u64) -> Result<NodeId, Error> {
        debug_assert!(
            !matches!(obj, Obj::Pair { .. } | Obj::Func { .. }),
            "alloc_atom takes atom payloads only"
        );
        self.alloc(Node { line, obj })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn obj(&self, id: NodeId) -> &Obj {
        &self.nodes[id.0 as usize].obj
    }

    pub fn line(&self, id: NodeId) -> u64 {
        self.nodes[id.0 as usize].line
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Head of a pair cell. Callers check pair-ness first; reaching a
    /// non-pair here is an interpreter bug.
    pub fn head(&self, id: NodeId) -> NodeRef {
        match self.obj(id) {
            Obj::Pair { head, .. } => *head,
            other => unreachable!("head of non-pair node ({})", other.type_name()),
        }
    }

    /// Tail of a pair cell.
    pub fn tail(&self, id: NodeId) -> NodeRef {
        match self.obj(id) {
            Obj::Pair { tail, .. } => *tail,
            other => unreachable!("tail of non-pair node ({})", other.type_name()),
        }
    }

    pub fn set_head(&mut self, id: NodeId, value: NodeRef) {
        match &mut self.nodes[id.0 as usize].obj {
            Obj::Pair { head, .. } => *head = value,
            other => unreachable!("set_head of non-pair node ({})", other.type_name()),
        }
    }

    pub fn set_tail(&mut self, id: NodeId, value: NodeRef) {
        match &mut self.nodes[id.0 as usize].obj {
            Obj::Pair { tail, .. } => *tail = value,
            other => unreachable!("set_tail of non-pair node ({})", other.type_name()),
        }
    }

    /// Number of elements in a proper list; stops at the first non-pair
    /// (improper) tail.
    pub fn list_len(&self, list: NodeRef) -> usize {
        let mut count = 0;
        let mut cur = list;
        while let Some(id) = cur {
            match self.obj(id) {
                Obj::Pair { tail, .. } => {
                    count += 1;
                    cur = *tail;
                }
                _ => break,
            }
        }
        count
    }

    /// Collect the element references of a list, front to back. The caller
    /// can then evaluate elements while mutating the arena.
    pub fn list_items(&self, list: NodeRef) -> Vec<NodeRef> {
        let mut items = Vec::new();
        let mut cur = list;
        while let Some(id) = cur {
            match self.obj(id) {
                Obj::Pair { head, tail } => {
                    items.push(*head);
                    cur = *tail;
                }
                _ => break,
            }
        }
        items
    }

    /// Whether `list` is nil or a chain of pairs terminated by nil.
    pub fn is_proper_list(&self, list: NodeRef) -> bool {
        let mut cur = list;
        while let Some(id) = cur {
            match self.obj(id) {
                Obj::Pair { tail, .. } => cur = *tail,
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_mutation_is_visible_through_aliases() {
        let mut arena = Arena::new();
        let one = arena.alloc_atom(Obj::Number(1.0), 1).unwrap();
        let two = arena.alloc_atom(Obj::Number(2.0), 1).unwrap();
        let nine = arena.alloc_atom(Obj::Number(9.0), 1).unwrap();

        let pair = arena.alloc_pair(Some(one), Some(two), 1).unwrap();
        let alias = pair;

        arena.set_head(pair, Some(nine));
        match arena.obj(arena.head(alias).unwrap()) {
            Obj::Number(n) => assert_eq!(*n, 9.0),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn list_len_counts_proper_lists() {
        let mut arena = Arena::new();
        let a = arena.alloc_atom(Obj::Number(1.0), 1).unwrap();
        let b = arena.alloc_atom(Obj::Number(2.0), 1).unwrap();
        let tail = arena.alloc_pair(Some(b), None, 1).unwrap();
        let list = arena.alloc_pair(Some(a), Some(tail), 1).unwrap();

        assert_eq!(arena.list_len(Some(list)), 2);
        assert_eq!(arena.list_len(None), 0);
        assert!(arena.is_proper_list(Some(list)));
    }

    #[test]
    fn improper_list_is_detected() {
        let mut arena = Arena::new();
        let a = arena.alloc_atom(Obj::Number(1.0), 1).unwrap();
        let b = arena.alloc_atom(Obj::Number(2.0), 1).unwrap();
        let dotted = arena.alloc_pair(Some(a), Some(b), 1).unwrap();

        assert!(!arena.is_proper_list(Some(dotted)));
        assert_eq!(arena.list_len(Some(dotted)), 1);
    }
}
