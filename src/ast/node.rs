use crate::value::{Literal, Type};

/// Identifier of a node in the [`Arena`](super::Arena). Id `0` is the
/// sentinel "empty" node and, after [`Arena::init`](super::Arena::init), the
/// root `Program` node.
pub type NodeId = usize;

/// Discriminant of an [`ASTNode`]. Selects both the evaluator's dispatch
/// handler and the payload variant a node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString)]
#[allow(non_camel_case_types)]
pub enum Tag {
    // literals
    Integer,
    Float,
    Boolean,
    String,
    LocVar,
    GlobVar,

    // statements
    Program,
    Function,
    Call,
    Sequence,
    If,
    For,
    DoWhile,
    While,
    Print,
    Assign,
    Return,

    // expressions
    Cast,
    Plus,
    Minus,
    Times,
    Divide,
    LogOr,
    LogAnd,
    Uminus,
    Eqt,
    Neq,
    Leq,
    Geq,
    Lst,
    Grt,
}

impl Tag {
    /// Literal and variable nodes are leaves: they never own a child chain.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Tag::Integer | Tag::Float | Tag::Boolean | Tag::String | Tag::LocVar | Tag::GlobVar
        )
    }
}

/// The payload variant selected by a node's [`Tag`]. Mirrors the closed set
/// in spec §3: literal payloads carry their value, `LocVar`/`GlobVar` carry a
/// stack slot, `Cast` carries a single child, `Function`/`Program` carry
/// their dedicated fields, and every other non-leaf tag carries a generic
/// singly-linked child list.
#[derive(Debug, Clone)]
pub enum Payload {
    Literal(Literal),
    Variable { slot: usize },
    Cast { child: NodeId },
    Function { body: NodeId, locals_count: usize },
    Program { body: NodeId, globals_count: usize },
    /// A singly-linked child list: `first`/`last` are the head/tail node
    /// ids, chained via each child's [`ASTNode::next_sibling`].
    Container { first: NodeId, last: NodeId },
}

impl Payload {
    pub fn as_container(&self) -> (NodeId, NodeId) {
        match self {
            Payload::Container { first, last } => (*first, *last),
            other => panic!("expected a container payload, found {:?}", other),
        }
    }
}

/// A single node in the AST arena: a tag, the language type of the value it
/// produces (`Void` for statements), its link to the next sibling in an
/// enclosing child list, and a tag-selected payload.
#[derive(Debug, Clone)]
pub struct ASTNode {
    pub tag: Tag,
    pub ty: Type,
    pub next_sibling: NodeId,
    pub payload: Payload,
}

impl ASTNode {
    pub fn new(tag: Tag, ty: Type, payload: Payload) -> Self {
        ASTNode { tag, ty, next_sibling: 0, payload }
    }
}
