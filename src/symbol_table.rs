//! The Symbol Table (spec §4.2): a scope stack layered over a
//! name→symbol mapping, assigning each declared symbol a stack slot and
//! threading function parameter lists in source order.

use std::collections::HashMap;
use std::fmt;

use crate::ast::node::NodeId;
use crate::error::SymtabError;
use crate::value::Type;

/// Stable index into [`SymbolTable`]'s backing arena. Never reused: a
/// symbol popped off the active declaration stack on [`SymbolTable::leave`]
/// stays addressable here for as long as another symbol (its owning
/// function, via `param_next`) still references it.
pub type SymbolId = usize;

/// A declared name: a variable, a function, or a function parameter.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub is_function: bool,
    pub is_param: bool,
    pub is_global: bool,
    pub ty: Type,
    /// Insertion index into the *active* declaration stack at the time
    /// this symbol was declared (`SymbolTable::decl.len()` pre-push).
    /// Reused across non-overlapping scope lifetimes — it is the distance
    /// used for slot/collision arithmetic, not a stable handle.
    pub id: usize,
    /// Assigned stack slot: for globals, the index among non-function
    /// globals; for locals, the 0-based offset within the function frame.
    pub pos: usize,
    /// The `Function` AST node this symbol denotes, if `is_function`.
    /// `0` (the sentinel) until the parser backpatches it.
    pub body_id: NodeId,
    /// The symbol previously bound to this name, restored on scope exit.
    pub shadow_prev: Option<SymbolId>,
    /// Head of this function's parameter list (if `is_function`), or the
    /// next parameter in that list (if `is_param`). The two roles share
    /// one field exactly as the source's `param_next` does.
    pub param_next: Option<SymbolId>,
}

/// Lexical scope stack, name resolution, and slot assignment.
///
/// Declared symbols live forever in `arena` (an append-only store, so a
/// function's parameters stay reachable through its `param_next` chain
/// after their declaring scope is left — the source frees everything but
/// parameters on scope exit and frees parameters with their function;
/// here nothing is ever freed, so that distinction collapses to "which
/// symbols `leave` unlinks from `decl`/`map`", with no memory-safety
/// consequence). `decl` is the stack of symbols currently in scope,
/// mirroring the source's `decl` array, and does shrink on `leave`.
pub struct SymbolTable {
    arena: Vec<Symbol>,
    decl: Vec<SymbolId>,
    map: HashMap<String, SymbolId>,
    block: Vec<usize>,
    max_pos: usize,
}

impl SymbolTable {
    /// Empties the state and pushes the (always-present) global frame.
    pub fn new() -> Self {
        SymbolTable {
            arena: Vec::new(),
            decl: Vec::new(),
            map: HashMap::new(),
            block: vec![0],
            max_pos: 0,
        }
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.arena[id]
    }

    fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.arena[id]
    }

    /// Pushes a new scope frame. Resets `max_pos` only when transitioning
    /// from the global scope into the first local scope — nested blocks
    /// within a function keep accumulating it, which is what lets
    /// `max_locals` watermark the function's peak slot usage.
    pub fn enter(&mut self) {
        if self.block.len() == 1 {
            self.max_pos = 0;
        }
        self.block.push(0);
    }

    /// Pops the top frame, restoring or unbinding each of its symbols'
    /// name mapping in reverse declaration order. Popping the global frame
    /// is a programming error.
    pub fn leave(&mut self) {
        assert!(self.block.len() > 1, "cannot leave the global scope");
        let count = self.block.pop().unwrap();
        for _ in 0..count {
            let symbol_id = self.decl.pop().expect("decl/block count mismatch");
            let (name, shadow_prev) = {
                let sym = self.get(symbol_id);
                (sym.name.clone(), sym.shadow_prev)
            };
            match shadow_prev {
                Some(prev) => {
                    self.map.insert(name, prev);
                }
                None => {
                    self.map.remove(&name);
                }
            }
        }
    }

    /// Declares `name` with type `ty` in the current (top) scope.
    /// Duplicate declaration in the same scope is the only recoverable
    /// failure; the name's existing binding is left untouched.
    pub fn declare(&mut self, name: String, ty: Type, is_function: bool) -> Result<SymbolId, SymtabError> {
        let shadow_prev = self.map.get(&name).copied();
        let is_global = self.block.len() == 1;
        let id = self.decl.len();

        if let Some(prev_id) = shadow_prev {
            let frame_start = id - *self.block.last().unwrap();
            if self.get(prev_id).id >= frame_start {
                return Err(SymtabError::DuplicateDeclaration { name });
            }
        }

        let pos = if is_global {
            self.decl.iter().filter(|&&sid| !self.get(sid).is_function).count()
        } else {
            let p = id - self.block[0];
            self.max_pos = self.max_pos.max(p);
            p
        };

        let symbol_id = self.arena.len();
        self.arena.push(Symbol {
            name: name.clone(),
            is_function,
            is_param: false,
            is_global,
            ty,
            id,
            pos,
            body_id: 0,
            shadow_prev,
            param_next: None,
        });

        self.map.insert(name, symbol_id);
        self.decl.push(symbol_id);
        *self.block.last_mut().unwrap() += 1;
        Ok(symbol_id)
    }

    /// Records `func`'s `Function` AST node once the parser knows it.
    pub fn set_body(&mut self, func: SymbolId, body_id: NodeId) {
        self.get_mut(func).body_id = body_id;
    }

    /// Prepends `sym` to `func`'s parameter list. Declaration order at the
    /// call site is thus reversed in the linked list unless the parser
    /// declares parameters right-to-left; `param_next` is the contract
    /// both sides agree to read in source order.
    pub fn param(&mut self, func: SymbolId, sym: SymbolId) {
        let head = self.get(func).param_next;
        self.get_mut(sym).param_next = head;
        self.get_mut(func).param_next = Some(sym);
        self.get_mut(sym).is_param = true;
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.map.get(name).copied()
    }

    /// Slot count for the current/last function body.
    pub fn max_locals(&self) -> usize {
        self.max_pos + 1
    }

    /// Number of non-function symbols in the global frame.
    pub fn max_globals(&self) -> usize {
        self.decl[..self.block[0]]
            .iter()
            .filter(|&&sid| !self.get(sid).is_function)
            .count()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnostic dump of the currently live scopes, in the shape documented
/// by the original symbol table header: symbol/block counts, then each
/// live block's symbols by id, type, and name.
impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "+---------------------")?;
        writeln!(f, "|Symbol count: {}", self.decl.len())?;
        writeln!(f, "|Block count: {}", self.block.len())?;
        let mut offset = 0;
        for (block_idx, &count) in self.block.iter().enumerate() {
            writeln!(f, "|--------< {} >--------", block_idx)?;
            for &symbol_id in &self.decl[offset..offset + count] {
                let sym = self.get(symbol_id);
                if sym.is_function {
                    write!(f, "|({}) {} {}(", sym.id, sym.ty, sym.name)?;
                    let mut param = sym.param_next;
                    let mut first = true;
                    while let Some(pid) = param {
                        let p = self.get(pid);
                        if !first {
                            write!(f, ", ")?;
                        }
                        write!(f, "{} {}", p.ty, p.name)?;
                        first = false;
                        param = p.param_next;
                    }
                    writeln!(f, ")")?;
                } else {
                    writeln!(f, "|({}) {} {} @ {}", sym.id, sym.ty, sym.name, sym.pos)?;
                }
            }
            offset += count;
        }
        writeln!(f, "+---------------------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_slots_skip_functions() {
        let mut table = SymbolTable::new();
        let a = table.declare("a".into(), Type::Integer, false).unwrap();
        let _f = table.declare("f".into(), Type::Void, true).unwrap();
        let b = table.declare("b".into(), Type::Integer, false).unwrap();
        assert_eq!(table.get(a).pos, 0);
        assert_eq!(table.get(b).pos, 1);
        assert_eq!(table.max_globals(), 2);
    }

    #[test]
    fn shadowing_is_reversible() {
        let mut table = SymbolTable::new();
        table.declare("x".into(), Type::Integer, false).unwrap();
        table.enter();
        table.declare("x".into(), Type::Float, false).unwrap();
        assert_eq!(table.get(table.lookup("x").unwrap()).ty, Type::Float);
        table.leave();
        assert_eq!(table.get(table.lookup("x").unwrap()).ty, Type::Integer);
    }

    #[test]
    fn duplicate_declaration_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        table.enter();
        table.declare("x".into(), Type::Integer, false).unwrap();
        let before = table.lookup("x");
        let err = table.declare("x".into(), Type::Float, false);
        assert!(err.is_err());
        assert_eq!(table.lookup("x"), before);
    }

    #[test]
    fn local_slots_are_dense_and_distinct() {
        let mut table = SymbolTable::new();
        table.enter();
        let a = table.declare("a".into(), Type::Integer, false).unwrap();
        let b = table.declare("b".into(), Type::Integer, false).unwrap();
        table.enter();
        let c = table.declare("c".into(), Type::Integer, false).unwrap();
        let slots: Vec<usize> = [a, b, c].iter().map(|&id| table.get(id).pos).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(slots.iter().all(|&p| p < table.max_locals()));
    }

    #[test]
    fn parameters_stay_reachable_after_scope_exit() {
        let mut table = SymbolTable::new();
        let f = table.declare("f".into(), Type::Integer, true).unwrap();
        table.enter();
        let p1 = table.declare("n".into(), Type::Integer, false).unwrap();
        table.param(f, p1);
        table.leave();
        // f's parameter list survives even though its declaring scope is gone.
        let head = table.get(f).param_next.unwrap();
        assert_eq!(table.get(head).name, "n");
    }
}
