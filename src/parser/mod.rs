//! The parser: an external collaborator (spec §1, §6) that lexes/parses
//! C1/Minako source text and drives the [`Arena`](crate::ast::Arena)/
//! [`SymbolTable`](crate::symbol_table::SymbolTable) to populate node `0`
//! per the parser contract. Out of core scope for invariant purposes, but
//! it has to be correct enough to make the end-to-end scenarios in spec §8
//! actually run.

mod minako_parser;

use crate::ast::Arena;
use crate::error::CompileError;

/// The finished AST plus a diagnostic dump of the (by now entirely global)
/// symbol table, for the CLI's `--dump-symbols` flag.
pub struct ParseOutput {
    pub arena: Arena,
    pub symbols: String,
}

/// Parses `source` and builds a finished [`Arena`] rooted at node `0`,
/// per the parser contract in spec §6: the top-level `Program` node's
/// body is a `Sequence` that calls `main`, and `globals_count` is the
/// number of non-function global variables declared.
pub fn parse(source: &str) -> Result<ParseOutput, CompileError> {
    let mut builder = minako_parser::Builder::new()?;
    builder.parse_program(source)?;
    let symbols = builder.symbol_table().to_string();
    Ok(ParseOutput { arena: builder.into_arena(), symbols })
}
