//! The AST: an arena-backed tagged-node graph (spec §3, §4.1).

pub mod arena;
pub mod node;

pub use arena::Arena;
pub use node::{ASTNode, NodeId, Payload, Tag};
