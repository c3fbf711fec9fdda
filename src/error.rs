//! Crate-wide error types (spec §7): a two-tier split between recoverable
//! errors surfaced during parsing and fatal aborts raised by the
//! evaluator or the arena.

use std::fmt;

use crate::value::Type;

/// A recoverable failure from [`crate::symbol_table::SymbolTable`]. The
/// only one defined: duplicate declaration in the same scope.
#[derive(Debug, Clone)]
pub enum SymtabError {
    DuplicateDeclaration { name: String },
}

impl fmt::Display for SymtabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymtabError::DuplicateDeclaration { name } => {
                write!(f, "'{}' is already declared in this scope", name)
            }
        }
    }
}

impl std::error::Error for SymtabError {}

/// A recoverable failure while lexing, parsing, or type-checking source
/// text. Carried to the CLI boundary and mapped to a nonzero exit code;
/// the interpreter never executes the AST when this is returned.
#[derive(Debug, Clone)]
pub enum ParseError {
    /// Wraps the underlying grammar failure reported by `pest`.
    Syntax(String),
    UndeclaredName { name: String },
    Redeclaration(SymtabError),
    /// An expression's static type does not fit where it was used
    /// (condition, operand, argument, comparison operand).
    TypeMismatch { expected: String, found: Type },
    /// `==`/`!=`/`<`/`<=`/`>`/`>=` attempted with at least one `Void`
    /// operand — left undefined by the source, rejected here (spec §9
    /// Open Question "String comparison and equality on Void").
    VoidComparison,
    WrongArgumentCount { name: String, expected: usize, found: usize },
    NotCallable { name: String },
    /// A function name was referenced where a variable was expected.
    NotAVariable { name: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Syntax(msg) => write!(f, "syntax error: {}", msg),
            ParseError::UndeclaredName { name } => write!(f, "undeclared name '{}'", name),
            ParseError::Redeclaration(inner) => write!(f, "{}", inner),
            ParseError::TypeMismatch { expected, found } => {
                write!(f, "expected {} expression, found {}", expected, found)
            }
            ParseError::VoidComparison => write!(f, "cannot compare a void expression"),
            ParseError::WrongArgumentCount { name, expected, found } => write!(
                f,
                "'{}' takes {} argument(s), {} given",
                name, expected, found
            ),
            ParseError::NotCallable { name } => write!(f, "'{}' is not a function", name),
            ParseError::NotAVariable { name } => write!(f, "'{}' is not a variable", name),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<SymtabError> for ParseError {
    fn from(err: SymtabError) -> Self {
        ParseError::Redeclaration(err)
    }
}

/// An unrecoverable condition: the process reports it on stderr and
/// aborts immediately, never propagating it as a `Result` past the
/// evaluator/arena boundary (spec §7).
#[derive(Debug, Clone)]
pub enum FatalError {
    /// The value stack's fixed capacity was exceeded.
    StackOverflow,
    /// A `Vec::try_reserve` call failed.
    OutOfMemory,
    /// An AST invariant the parser's type checker is supposed to
    /// guarantee was violated (e.g. a `Cast` targeting anything but
    /// `Float`, or an operator applied to mismatched operand types).
    InvariantViolation(String),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::StackOverflow => write!(f, "stack overflow"),
            FatalError::OutOfMemory => write!(f, "out-of-memory error"),
            FatalError::InvariantViolation(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for FatalError {}

/// The parser's outer error type: a syntax/type error (recoverable, a
/// nonzero exit code) or a fatal abort surfacing early (arena allocation
/// exhaustion while building the tree). Lets parser code use `?` freely
/// across [`ParseError`], [`SymtabError`], and [`FatalError`] without
/// picking one at every call site.
#[derive(Debug)]
pub enum CompileError {
    Parse(ParseError),
    Fatal(FatalError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parse(err) => write!(f, "{}", err),
            CompileError::Fatal(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

impl From<SymtabError> for CompileError {
    fn from(err: SymtabError) -> Self {
        CompileError::Parse(err.into())
    }
}

impl From<FatalError> for CompileError {
    fn from(err: FatalError) -> Self {
        CompileError::Fatal(err)
    }
}
