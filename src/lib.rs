//! The C1/Minako interpreter (spec §1): a tree-walking interpreter for a
//! small statically-typed imperative language. Wires together the three
//! core subsystems (AST, symbol table, evaluator) behind the parser that
//! drives them.

// External Modules
extern crate pest;
#[macro_use]
extern crate pest_derive;

// Internal Modules
pub mod ast;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod symbol_table;
pub mod tracer;
pub mod value;

#[cfg(test)]
mod test;

use std::fmt;
use std::io::Read;

use error::CompileError;
use evaluator::Evaluator;

pub const DEFAULT_STACK_SIZE: usize = 1024;

/// The two externally observable outcomes of a run (spec §6): a clean
/// parse-and-execute, or a parse failure that never reaches the
/// evaluator. Fatal runtime aborts are reported separately — they
/// terminate the process rather than returning through here (spec §7).
pub struct RunReport {
    pub symbols: String,
}

/// Reads and runs `source`, per the parser contract in spec §6. Returns
/// the symbol table dump (for `--dump-symbols`) on success.
pub fn run(source: &str, stack_size: usize, trace: bool) -> Result<RunReport, RunError> {
    let output = parser::parse(source).map_err(RunError::Compile)?;
    let mut evaluator = Evaluator::new(&output.arena, stack_size, trace);
    evaluator.run().map_err(RunError::Fatal)?;
    Ok(RunReport { symbols: output.symbols })
}

/// Reads all of `reader` as UTF-8 source text (spec §6: a source file or
/// standard input).
pub fn read_source(reader: &mut impl Read) -> std::io::Result<String> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

/// The outer error type surfaced to the CLI: either the source failed to
/// compile (nonzero exit, spec §7 "Parse error") or the evaluator hit a
/// fatal runtime condition (spec §7 "Stack overflow"/"Allocation
/// exhaustion").
#[derive(Debug)]
pub enum RunError {
    Compile(CompileError),
    Fatal(error::FatalError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Compile(err) => write!(f, "{}", err),
            RunError::Fatal(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RunError {}
