//! The Arena and AST Builder (spec §4.1): an append-only, indexable
//! container of [`ASTNode`]s plus the factory operations that allocate
//! nodes, set their payloads, and link them into lists.

use super::node::{ASTNode, NodeId, Payload, Tag};
use crate::error::FatalError;
use crate::symbol_table::Symbol;
use crate::value::{Literal, Type};

/// Append-only container of AST nodes. Node `0` is preoccupied by an empty
/// `Program` node (`body=0`, `globals=0`) at construction and is later
/// overwritten in place by [`Arena::set_program`] once the parser has
/// finished building the top-level sequence.
pub struct Arena {
    nodes: Vec<ASTNode>,
}

impl Arena {
    /// Creates the arena with id `0` preoccupied by an empty `Program` node.
    /// Fails only on allocation exhaustion.
    pub fn init() -> Result<Self, FatalError> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve(1)
            .map_err(|_| FatalError::OutOfMemory)?;
        nodes.push(ASTNode::new(
            Tag::Program,
            Type::Void,
            Payload::Program { body: 0, globals_count: 0 },
        ));
        Ok(Arena { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Bounds-checked identifier -> node lookup.
    pub fn get(&self, id: NodeId) -> &ASTNode {
        self.nodes
            .get(id)
            .unwrap_or_else(|| panic!("node id {} out of bounds ({} nodes)", id, self.nodes.len()))
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut ASTNode {
        let len = self.nodes.len();
        self.nodes
            .get_mut(id)
            .unwrap_or_else(|| panic!("node id {} out of bounds ({} nodes)", id, len))
    }

    fn push(&mut self, node: ASTNode) -> Result<NodeId, FatalError> {
        self.nodes.try_reserve(1).map_err(|_| FatalError::OutOfMemory)?;
        let id = self.nodes.len();
        self.nodes.push(node);
        Ok(id)
    }

    pub fn node_boolean(&mut self, value: bool) -> Result<NodeId, FatalError> {
        self.push(ASTNode::new(Tag::Boolean, Type::Boolean, Payload::Literal(Literal::Boolean(value))))
    }

    pub fn node_integer(&mut self, value: i32) -> Result<NodeId, FatalError> {
        self.push(ASTNode::new(Tag::Integer, Type::Integer, Payload::Literal(Literal::Integer(value))))
    }

    pub fn node_float(&mut self, value: f32) -> Result<NodeId, FatalError> {
        self.push(ASTNode::new(Tag::Float, Type::Float, Payload::Literal(Literal::Float(value))))
    }

    /// Takes ownership of `value`; the node exclusively owns the buffer.
    pub fn node_string(&mut self, value: String) -> Result<NodeId, FatalError> {
        self.push(ASTNode::new(Tag::String, Type::String, Payload::Literal(Literal::String(value))))
    }

    /// Emits `GlobVar` if `sym.is_global`, else `LocVar`. Parser recovery
    /// (symbol lookup failed) emits a `GlobVar` with `Void` type and slot 0.
    pub fn node_variable(&mut self, sym: Option<&Symbol>) -> Result<NodeId, FatalError> {
        match sym {
            Some(sym) if sym.is_global => {
                self.push(ASTNode::new(Tag::GlobVar, sym.ty, Payload::Variable { slot: sym.pos }))
            }
            Some(sym) => self.push(ASTNode::new(Tag::LocVar, sym.ty, Payload::Variable { slot: sym.pos })),
            None => self.push(ASTNode::new(Tag::GlobVar, Type::Void, Payload::Variable { slot: 0 })),
        }
    }

    /// Wraps `child_id` in a `Cast` node targeting `target_type`.
    pub fn node_cast(&mut self, target_type: Type, child_id: NodeId) -> Result<NodeId, FatalError> {
        self.push(ASTNode::new(Tag::Cast, target_type, Payload::Cast { child: child_id }))
    }

    /// Creates a childless container with the given tag. Forbidden for
    /// literal/variable tags.
    pub fn node_empty(&mut self, tag: Tag) -> Result<NodeId, FatalError> {
        assert!(!tag.is_leaf(), "node_empty called with leaf tag {tag:?}");
        self.push(ASTNode::new(tag, Type::Void, Payload::Container { first: 0, last: 0 }))
    }

    /// Single-child container. `child_id == 0` yields a childless container.
    pub fn node_tag(&mut self, tag: Tag, child_id: NodeId) -> Result<NodeId, FatalError> {
        self.push(ASTNode::new(tag, Type::Void, Payload::Container { first: child_id, last: child_id }))
    }

    /// Two-child container; if either operand is `0`, degrades to
    /// `node_tag` on the other.
    pub fn node_pair(&mut self, tag: Tag, a: NodeId, b: NodeId) -> Result<NodeId, FatalError> {
        if a == 0 {
            return self.node_tag(tag, b);
        }
        if b == 0 {
            return self.node_tag(tag, a);
        }
        let id = self.push(ASTNode::new(tag, Type::Void, Payload::Container { first: a, last: 0 }))?;
        self.get_mut(a).next_sibling = b;
        self.get_mut(id).payload = Payload::Container { first: a, last: b };
        Ok(id)
    }

    /// Appends `elem_id` to the end of `list_id`'s child chain. A no-op
    /// (returns `list_id` unchanged) when `elem_id == 0`.
    pub fn node_append(&mut self, list_id: NodeId, elem_id: NodeId) -> NodeId {
        if elem_id == 0 {
            return list_id;
        }
        let (first, last) = self.get(list_id).payload.as_container();
        if first == 0 {
            self.get_mut(list_id).payload = Payload::Container { first: elem_id, last: elem_id };
        } else {
            self.get_mut(last).next_sibling = elem_id;
            self.get_mut(list_id).payload = Payload::Container { first, last: elem_id };
        }
        list_id
    }

    /// Allocates a `Function` node owning `body_id`'s sequence.
    pub fn node_function(&mut self, body_id: NodeId, locals_count: usize) -> Result<NodeId, FatalError> {
        self.push(ASTNode::new(Tag::Function, Type::Void, Payload::Function { body: body_id, locals_count }))
    }

    /// Allocates a `Function` node with a placeholder payload (`body=0`,
    /// `locals_count=0`) so the id exists — and is bindable as a call
    /// target — before the body is parsed. Self- and mutually-recursive
    /// calls resolve against this id; [`Arena::set_function`] patches it
    /// once the body is known, mirroring how node `0` is reserved for
    /// `Program` and finished later by [`Arena::set_program`].
    pub fn node_function_placeholder(&mut self) -> Result<NodeId, FatalError> {
        self.push(ASTNode::new(Tag::Function, Type::Void, Payload::Function { body: 0, locals_count: 0 }))
    }

    /// Overwrites a placeholder `Function` node in place.
    pub fn set_function(&mut self, id: NodeId, body_id: NodeId, locals_count: usize) {
        self.get_mut(id).payload = Payload::Function { body: body_id, locals_count };
    }

    /// Overwrites node `0` in place with the finished top-level `Program`
    /// node, as the parser contract (spec §6) requires.
    pub fn set_program(&mut self, body_id: NodeId, globals_count: usize) {
        self.get_mut(0).payload = Payload::Program { body: body_id, globals_count };
    }

    /// Iterates `container_id`'s children via the `next_sibling` chain.
    pub fn children(&self, container_id: NodeId) -> ChildIter<'_> {
        let (first, _) = self.get(container_id).payload.as_container();
        ChildIter { arena: self, current: first }
    }
}

/// Walks a container node's singly-linked child list.
pub struct ChildIter<'a> {
    arena: &'a Arena,
    current: NodeId,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == 0 {
            return None;
        }
        let id = self.current;
        self.current = self.arena.get(id).next_sibling;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_identifier_stability() {
        let mut arena = Arena::init().unwrap();
        let n1 = arena.node_integer(1).unwrap();
        let n2 = arena.node_integer(2).unwrap();
        assert_eq!(arena.get(n1).tag, Tag::Integer);
        assert_eq!(arena.get(n2).tag, Tag::Integer);
        // allocating further nodes doesn't disturb earlier ids.
        let _n3 = arena.node_integer(3).unwrap();
        assert!(matches!(arena.get(n1).payload, Payload::Literal(Literal::Integer(1))));
    }

    #[test]
    fn append_absorbs_empty_operand() {
        let mut arena = Arena::init().unwrap();
        let list = arena.node_empty(Tag::Sequence).unwrap();
        let unchanged = arena.node_append(list, 0);
        assert_eq!(unchanged, list);
        assert_eq!(arena.get(list).payload.as_container(), (0, 0));
    }

    #[test]
    fn pair_degrades_to_tag_on_empty_operand() {
        let mut arena = Arena::init().unwrap();
        let x = arena.node_integer(7).unwrap();
        let p1 = arena.node_pair(Tag::Plus, 0, x).unwrap();
        assert_eq!(arena.get(p1).payload.as_container(), (x, x));

        let y = arena.node_integer(9).unwrap();
        let p2 = arena.node_pair(Tag::Plus, y, 0).unwrap();
        assert_eq!(arena.get(p2).payload.as_container(), (y, y));
    }

    #[test]
    fn append_builds_sibling_chain() {
        let mut arena = Arena::init().unwrap();
        let list = arena.node_empty(Tag::Sequence).unwrap();
        let a = arena.node_integer(1).unwrap();
        let b = arena.node_integer(2).unwrap();
        arena.node_append(list, a);
        arena.node_append(list, b);

        let (first, last) = arena.get(list).payload.as_container();
        assert_eq!(first, a);
        assert_eq!(last, b);
        assert_eq!(arena.get(a).next_sibling, b);
        assert_eq!(arena.get(b).next_sibling, 0);
    }
}
