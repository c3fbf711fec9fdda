//! Recursive-descent tree builder driven by a `pest` grammar (spec §6).
//!
//! The grammar (`grammar.pest`) only describes syntax; this module carries
//! the type checker the spec assumes already ran by the time the AST
//! Builder and Symbol Table are invoked (spec §6 "parser contract", §4.3.8
//! "the parser MUST have inserted `Cast` nodes to reconcile mixed-type
//! operands"). Declaration order is single-pass: a function's own name is
//! bound before its body is parsed (so self-recursion like `fact` works),
//! but a function can only call names already declared above it in the
//! source — there is no forward-declaration support for mutual recursion,
//! matching a straightforward single-pass compiler of this kind.

use pest::iterators::Pair;
use pest::Parser;

use crate::ast::{Arena, NodeId, Tag};
use crate::error::{CompileError, FatalError, ParseError};
use crate::symbol_table::SymbolTable;
use crate::value::Type;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct MinakoParser;

pub(crate) struct Builder {
    arena: Arena,
    table: SymbolTable,
    /// The enclosing function's declared return type, used to coerce
    /// `return` expressions. `main` and friends always carry one since
    /// functions never nest in this grammar.
    return_type: Type,
}

impl Builder {
    pub(crate) fn new() -> Result<Self, FatalError> {
        Ok(Builder { arena: Arena::init()?, table: SymbolTable::new(), return_type: Type::Void })
    }

    pub(crate) fn into_arena(self) -> Arena {
        self.arena
    }

    pub(crate) fn symbol_table(&self) -> &SymbolTable {
        &self.table
    }

    pub(crate) fn parse_program(&mut self, source: &str) -> Result<(), CompileError> {
        let mut pairs = MinakoParser::parse(Rule::program, source)
            .map_err(|err| ParseError::Syntax(err.to_string()))?;
        let program = pairs.next().expect("Rule::program always produces one pair");

        for item in program.into_inner() {
            match item.as_rule() {
                Rule::function_def => self.function_def(item)?,
                Rule::global_decl => self.global_decl(item)?,
                Rule::EOI => {}
                other => unreachable!("unexpected top-level rule {:?}", other),
            }
        }

        let main_id = self
            .table
            .lookup("main")
            .ok_or_else(|| ParseError::UndeclaredName { name: "main".to_string() })?;
        let main_sym = self.table.get(main_id);
        if !main_sym.is_function {
            return Err(ParseError::NotCallable { name: "main".to_string() }.into());
        }
        let mut param_count = 0;
        let mut next = main_sym.param_next;
        while let Some(pid) = next {
            param_count += 1;
            next = self.table.get(pid).param_next;
        }
        if param_count != 0 {
            return Err(ParseError::WrongArgumentCount {
                name: "main".to_string(),
                expected: 0,
                found: param_count,
            }
            .into());
        }
        let function_node = main_sym.body_id;

        let empty_args = self.arena.node_empty(Tag::Sequence)?;
        let call = self.arena.node_pair(Tag::Call, empty_args, function_node)?;
        let top_seq = self.arena.node_tag(Tag::Sequence, call)?;
        let globals_count = self.table.max_globals();
        self.arena.set_program(top_seq, globals_count);
        Ok(())
    }

    fn global_decl(&mut self, pair: Pair<Rule>) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let ty = parse_type(inner.next().unwrap());
        let name = inner.next().unwrap().as_str().to_string();
        self.table.declare(name, ty, false)?;
        Ok(())
    }

    fn function_def(&mut self, pair: Pair<Rule>) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let ty = parse_type(inner.next().unwrap());
        let name = inner.next().unwrap().as_str().to_string();

        let mut next = inner.next().unwrap();
        let param_pairs: Vec<Pair<Rule>> = if next.as_rule() == Rule::param_list {
            let params = next.into_inner().collect();
            next = inner.next().unwrap();
            params
        } else {
            Vec::new()
        };
        let block_pair = next;

        let func_sym = self.table.declare(name, ty, true)?;
        let placeholder = self.arena.node_function_placeholder()?;
        self.table.set_body(func_sym, placeholder);

        self.table.enter();
        let mut param_syms = Vec::with_capacity(param_pairs.len());
        for param_pair in param_pairs {
            let mut pi = param_pair.into_inner();
            let param_ty = parse_type(pi.next().unwrap());
            let param_name = pi.next().unwrap().as_str().to_string();
            param_syms.push(self.table.declare(param_name, param_ty, false)?);
        }
        // `param` prepends, so linking in reverse declaration order leaves
        // the list's head-to-tail walk in source (left-to-right) order.
        for &sym in param_syms.iter().rev() {
            self.table.param(func_sym, sym);
        }

        let saved_return_type = self.return_type;
        self.return_type = ty;
        let body_seq = self.block(block_pair)?;
        self.return_type = saved_return_type;

        let locals = self.table.max_locals();
        self.table.leave();
        self.arena.set_function(placeholder, body_seq, locals);
        Ok(())
    }

    /// A `block` always opens its own scope, whether it's a function's
    /// top-level body or a nested `{ ... }` inside a statement — position
    /// numbering stays continuous across nesting depth regardless (spec
    /// §4.2: `pos` is measured from the bottom of the scope stack, not
    /// the enclosing frame), so no special-casing is needed here.
    fn block(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        self.table.enter();
        let seq = self.arena.node_empty(Tag::Sequence)?;
        for item in pair.into_inner() {
            match item.as_rule() {
                Rule::var_decl => self.var_decl(item)?,
                Rule::statement => {
                    let stmt_id = self.statement(item)?;
                    self.arena.node_append(seq, stmt_id);
                }
                other => unreachable!("unexpected rule inside block: {:?}", other),
            }
        }
        self.table.leave();
        Ok(seq)
    }

    fn var_decl(&mut self, pair: Pair<Rule>) -> Result<(), CompileError> {
        let mut inner = pair.into_inner();
        let ty = parse_type(inner.next().unwrap());
        let name = inner.next().unwrap().as_str().to_string();
        self.table.declare(name, ty, false)?;
        Ok(())
    }

    fn statement(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let inner = pair.into_inner().next().unwrap();
        match inner.as_rule() {
            Rule::if_stmt => self.if_stmt(inner),
            Rule::while_stmt => self.while_stmt(inner),
            Rule::do_while_stmt => self.do_while_stmt(inner),
            Rule::for_stmt => self.for_stmt(inner),
            Rule::print_stmt => self.print_stmt(inner),
            Rule::return_stmt => self.return_stmt(inner),
            Rule::assign_stmt => self.assign_stmt(inner),
            Rule::call_stmt => self.call_stmt(inner),
            Rule::block => self.block(inner),
            other => unreachable!("unexpected statement rule {:?}", other),
        }
    }

    fn if_stmt(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let mut inner = pair.into_inner();
        let cond = self.require_boolean(inner.next().unwrap())?;
        let then_branch = self.statement(inner.next().unwrap())?;
        let else_branch = inner.next().map(|p| self.statement(p)).transpose()?;

        let id = self.arena.node_empty(Tag::If)?;
        self.arena.node_append(id, cond);
        self.arena.node_append(id, then_branch);
        if let Some(else_branch) = else_branch {
            self.arena.node_append(id, else_branch);
        }
        Ok(id)
    }

    fn while_stmt(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let mut inner = pair.into_inner();
        let cond = self.require_boolean(inner.next().unwrap())?;
        let body = self.statement(inner.next().unwrap())?;
        Ok(self.arena.node_pair(Tag::While, cond, body)?)
    }

    fn do_while_stmt(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let mut inner = pair.into_inner();
        let body = self.statement(inner.next().unwrap())?;
        let cond = self.require_boolean(inner.next().unwrap())?;
        Ok(self.arena.node_pair(Tag::DoWhile, cond, body)?)
    }

    fn for_stmt(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let mut inner = pair.into_inner();
        let init = self.assign_stmt(inner.next().unwrap())?;
        let cond = self.require_boolean(inner.next().unwrap())?;
        let step = self.assign_expr(inner.next().unwrap())?;
        let body = self.statement(inner.next().unwrap())?;

        let id = self.arena.node_empty(Tag::For)?;
        self.arena.node_append(id, init);
        self.arena.node_append(id, cond);
        self.arena.node_append(id, step);
        self.arena.node_append(id, body);
        Ok(id)
    }

    fn print_stmt(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let mut inner = pair.into_inner();
        let (expr_id, ty) = self.expr(inner.next().unwrap())?;
        if ty == Type::Void {
            return Err(ParseError::TypeMismatch { expected: "a value".to_string(), found: ty }.into());
        }
        Ok(self.arena.node_tag(Tag::Print, expr_id)?)
    }

    fn return_stmt(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let mut inner = pair.into_inner();
        match inner.next() {
            Some(expr_pair) => {
                let (expr_id, ty) = self.expr(expr_pair)?;
                let coerced = self.coerce(expr_id, ty, self.return_type)?;
                Ok(self.arena.node_tag(Tag::Return, coerced)?)
            }
            None => Ok(self.arena.node_empty(Tag::Return)?),
        }
    }

    fn assign_stmt(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let assign_expr_pair = pair.into_inner().next().unwrap();
        self.assign_expr(assign_expr_pair)
    }

    fn assign_expr(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let mut inner = pair.into_inner();
        let name = inner.next().unwrap().as_str();
        let sym_id = self
            .table
            .lookup(name)
            .ok_or_else(|| ParseError::UndeclaredName { name: name.to_string() })?;
        let sym = self.table.get(sym_id).clone();
        if sym.is_function {
            return Err(ParseError::NotAVariable { name: name.to_string() }.into());
        }
        let var_node = self.arena.node_variable(Some(&sym))?;

        let (expr_id, expr_ty) = self.expr(inner.next().unwrap())?;
        let coerced = self.coerce(expr_id, expr_ty, sym.ty)?;
        Ok(self.arena.node_pair(Tag::Assign, var_node, coerced)?)
    }

    fn call_stmt(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let call_expr_pair = pair.into_inner().next().unwrap();
        let (id, _ty) = self.call_expr(call_expr_pair)?;
        Ok(id)
    }

    fn call_expr(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let mut inner = pair.into_inner();
        let name = inner.next().unwrap().as_str();
        let sym_id = self
            .table
            .lookup(name)
            .ok_or_else(|| ParseError::UndeclaredName { name: name.to_string() })?;
        let sym = self.table.get(sym_id).clone();
        if !sym.is_function {
            return Err(ParseError::NotCallable { name: name.to_string() }.into());
        }

        let mut param_types = Vec::new();
        let mut next = sym.param_next;
        while let Some(pid) = next {
            let p = self.table.get(pid);
            param_types.push(p.ty);
            next = p.param_next;
        }

        let arg_pairs: Vec<Pair<Rule>> = match inner.next() {
            Some(arg_list) => arg_list.into_inner().collect(),
            None => Vec::new(),
        };
        if arg_pairs.len() != param_types.len() {
            return Err(ParseError::WrongArgumentCount {
                name: name.to_string(),
                expected: param_types.len(),
                found: arg_pairs.len(),
            }
            .into());
        }

        let args_seq = self.arena.node_empty(Tag::Sequence)?;
        for (arg_pair, param_ty) in arg_pairs.into_iter().zip(param_types) {
            let (arg_id, arg_ty) = self.expr(arg_pair)?;
            let coerced = self.coerce(arg_id, arg_ty, param_ty)?;
            self.arena.node_append(args_seq, coerced);
        }

        let function_node = sym.body_id;
        let call = self.arena.node_pair(Tag::Call, args_seq, function_node)?;
        Ok((call, sym.ty))
    }

    fn require_boolean(&mut self, pair: Pair<Rule>) -> Result<NodeId, CompileError> {
        let (id, ty) = self.expr(pair)?;
        if ty != Type::Boolean {
            return Err(ParseError::TypeMismatch { expected: "bool".to_string(), found: ty }.into());
        }
        Ok(id)
    }

    fn expr(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        self.logic_or(pair.into_inner().next().unwrap())
    }

    fn logic_or(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let mut inner = pair.into_inner();
        let mut acc = self.logic_and(inner.next().unwrap())?;
        while inner.next().is_some() {
            let rhs = self.logic_and(inner.next().unwrap())?;
            acc = self.logical(Tag::LogOr, acc, rhs)?;
        }
        Ok(acc)
    }

    fn logic_and(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let mut inner = pair.into_inner();
        let mut acc = self.equality(inner.next().unwrap())?;
        while inner.next().is_some() {
            let rhs = self.equality(inner.next().unwrap())?;
            acc = self.logical(Tag::LogAnd, acc, rhs)?;
        }
        Ok(acc)
    }

    fn equality(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let mut inner = pair.into_inner();
        let mut acc = self.relational(inner.next().unwrap())?;
        while let Some(op) = inner.next() {
            let tag = match op.as_str() {
                "==" => Tag::Eqt,
                "!=" => Tag::Neq,
                other => unreachable!("unexpected eq_op {:?}", other),
            };
            let rhs = self.relational(inner.next().unwrap())?;
            acc = self.compare(tag, acc, rhs)?;
        }
        Ok(acc)
    }

    fn relational(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let mut inner = pair.into_inner();
        let mut acc = self.additive(inner.next().unwrap())?;
        while let Some(op) = inner.next() {
            let tag = match op.as_str() {
                "<=" => Tag::Leq,
                ">=" => Tag::Geq,
                "<" => Tag::Lst,
                ">" => Tag::Grt,
                other => unreachable!("unexpected rel_op {:?}", other),
            };
            let rhs = self.additive(inner.next().unwrap())?;
            acc = self.compare(tag, acc, rhs)?;
        }
        Ok(acc)
    }

    fn additive(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let mut inner = pair.into_inner();
        let mut acc = self.multiplicative(inner.next().unwrap())?;
        while let Some(op) = inner.next() {
            let tag = match op.as_str() {
                "+" => Tag::Plus,
                "-" => Tag::Minus,
                other => unreachable!("unexpected add_op {:?}", other),
            };
            let rhs = self.multiplicative(inner.next().unwrap())?;
            acc = self.arith(tag, acc, rhs)?;
        }
        Ok(acc)
    }

    fn multiplicative(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let mut inner = pair.into_inner();
        let mut acc = self.unary(inner.next().unwrap())?;
        while let Some(op) = inner.next() {
            let tag = match op.as_str() {
                "*" => Tag::Times,
                "/" => Tag::Divide,
                other => unreachable!("unexpected mul_op {:?}", other),
            };
            let rhs = self.unary(inner.next().unwrap())?;
            acc = self.arith(tag, acc, rhs)?;
        }
        Ok(acc)
    }

    fn unary(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let mut inner = pair.into_inner();
        let first = inner.next().unwrap();
        if first.as_rule() == Rule::neg_op {
            let (operand, ty) = self.unary(inner.next().unwrap())?;
            let id = match ty {
                Type::Integer | Type::Float => self.arena.node_tag(Tag::Uminus, operand)?,
                _ => {
                    return Err(ParseError::TypeMismatch { expected: "numeric".to_string(), found: ty }.into())
                }
            };
            self.arena.get_mut(id).ty = ty;
            Ok((id, ty))
        } else {
            self.primary(first)
        }
    }

    fn primary(&mut self, pair: Pair<Rule>) -> Result<(NodeId, Type), CompileError> {
        let inner = pair.into_inner().next().unwrap();
        match inner.as_rule() {
            Rule::float_lit => {
                let id = self.arena.node_float(inner.as_str().parse().expect("grammar guarantees a float"))?;
                Ok((id, Type::Float))
            }
            Rule::integer_lit => {
                let id =
                    self.arena.node_integer(inner.as_str().parse().expect("grammar guarantees an int"))?;
                Ok((id, Type::Integer))
            }
            Rule::boolean_lit => {
                let id = self.arena.node_boolean(inner.as_str() == "true")?;
                Ok((id, Type::Boolean))
            }
            Rule::string_lit => {
                let raw = inner.as_str();
                let literal = raw[1..raw.len() - 1].to_string();
                let id = self.arena.node_string(literal)?;
                Ok((id, Type::String))
            }
            Rule::call_expr => self.call_expr(inner),
            Rule::identifier => {
                let name = inner.as_str();
                let sym_id = self
                    .table
                    .lookup(name)
                    .ok_or_else(|| ParseError::UndeclaredName { name: name.to_string() })?;
                let sym = self.table.get(sym_id).clone();
                if sym.is_function {
                    return Err(ParseError::NotAVariable { name: name.to_string() }.into());
                }
                let id = self.arena.node_variable(Some(&sym))?;
                Ok((id, sym.ty))
            }
            Rule::expr => self.expr(inner),
            other => unreachable!("unexpected primary rule {:?}", other),
        }
    }

    /// Applies spec §4.3.8's implicit `Integer -> Float` widening. Any
    /// other mismatch is a static type error the parser must catch (the
    /// evaluator treats it as an internal invariant violation instead).
    fn coerce(&mut self, id: NodeId, from: Type, to: Type) -> Result<NodeId, CompileError> {
        if from == to {
            return Ok(id);
        }
        if from == Type::Integer && to == Type::Float {
            return Ok(self.arena.node_cast(Type::Float, id)?);
        }
        Err(ParseError::TypeMismatch { expected: to.to_string(), found: from }.into())
    }

    /// Unifies two numeric operands, inserting a widening `Cast` on the
    /// `Integer` side when the other is `Float`.
    fn unify_numeric(
        &mut self,
        lhs: NodeId,
        lty: Type,
        rhs: NodeId,
        rty: Type,
    ) -> Result<(NodeId, NodeId, Type), CompileError> {
        match (lty, rty) {
            (Type::Integer, Type::Integer) => Ok((lhs, rhs, Type::Integer)),
            (Type::Float, Type::Float) => Ok((lhs, rhs, Type::Float)),
            (Type::Integer, Type::Float) => Ok((self.arena.node_cast(Type::Float, lhs)?, rhs, Type::Float)),
            (Type::Float, Type::Integer) => Ok((lhs, self.arena.node_cast(Type::Float, rhs)?, Type::Float)),
            _ => Err(ParseError::TypeMismatch { expected: "numeric".to_string(), found: lty }.into()),
        }
    }

    fn arith(&mut self, tag: Tag, lhs: (NodeId, Type), rhs: (NodeId, Type)) -> Result<(NodeId, Type), CompileError> {
        let (l, r, ty) = self.unify_numeric(lhs.0, lhs.1, rhs.0, rhs.1)?;
        let id = self.arena.node_pair(tag, l, r)?;
        self.arena.get_mut(id).ty = ty;
        Ok((id, ty))
    }

    fn compare(&mut self, tag: Tag, lhs: (NodeId, Type), rhs: (NodeId, Type)) -> Result<(NodeId, Type), CompileError> {
        let (l, r) = match (lhs.1, rhs.1) {
            (Type::Void, _) | (_, Type::Void) => return Err(ParseError::VoidComparison.into()),
            (Type::String, _) | (_, Type::String) => {
                return Err(ParseError::TypeMismatch { expected: "comparable".to_string(), found: Type::String }.into())
            }
            (Type::Boolean, Type::Boolean) => {
                if !matches!(tag, Tag::Eqt | Tag::Neq) {
                    return Err(ParseError::TypeMismatch { expected: "numeric".to_string(), found: Type::Boolean }.into());
                }
                (lhs.0, rhs.0)
            }
            _ => {
                let (l, r, _) = self.unify_numeric(lhs.0, lhs.1, rhs.0, rhs.1)?;
                (l, r)
            }
        };
        let id = self.arena.node_pair(tag, l, r)?;
        self.arena.get_mut(id).ty = Type::Boolean;
        Ok((id, Type::Boolean))
    }

    fn logical(&mut self, tag: Tag, lhs: (NodeId, Type), rhs: (NodeId, Type)) -> Result<(NodeId, Type), CompileError> {
        if lhs.1 != Type::Boolean {
            return Err(ParseError::TypeMismatch { expected: "bool".to_string(), found: lhs.1 }.into());
        }
        if rhs.1 != Type::Boolean {
            return Err(ParseError::TypeMismatch { expected: "bool".to_string(), found: rhs.1 }.into());
        }
        let id = self.arena.node_pair(tag, lhs.0, rhs.0)?;
        self.arena.get_mut(id).ty = Type::Boolean;
        Ok((id, Type::Boolean))
    }
}

fn parse_type(pair: Pair<Rule>) -> Type {
    match pair.as_str() {
        "void" => Type::Void,
        "bool" => Type::Boolean,
        "int" => Type::Integer,
        "float" => Type::Float,
        "string" => Type::String,
        other => unreachable!("grammar only accepts known type keywords, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Arena {
        super::super::parse(source).expect("expected source to parse").arena
    }

    #[test]
    fn parses_print_of_sum() {
        parse_ok("void main() { print(1 + 2); }");
    }

    #[test]
    fn rejects_undeclared_name() {
        let err = super::super::parse("void main() { print(x); }").unwrap_err();
        assert!(matches!(err, CompileError::Parse(ParseError::UndeclaredName { .. })));
    }

    #[test]
    fn rejects_duplicate_declaration_in_same_scope() {
        let err = super::super::parse("void main() { int x; int x; }").unwrap_err();
        assert!(matches!(err, CompileError::Parse(ParseError::Redeclaration(_))));
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let src = "int add(int a, int b) { return a + b; } void main() { print(add(1)); }";
        let err = super::super::parse(src).unwrap_err();
        assert!(matches!(err, CompileError::Parse(ParseError::WrongArgumentCount { .. })));
    }

    #[test]
    fn inserts_widening_cast_on_mixed_arithmetic() {
        let arena = parse_ok("float x; void main() { x = 2; print(x * 1.5); }");
        // the assignment's expression (an Integer literal) must have been
        // wrapped in a Cast targeting Float.
        let found_cast = (0..arena.len()).any(|id| arena.get(id).tag == Tag::Cast);
        assert!(found_cast);
    }

    #[test]
    fn self_recursion_resolves_without_forward_declaration() {
        let src = "int fact(int n) { if (n <= 1) return 1; return n * fact(n-1); } \
                   void main() { print(fact(5)); }";
        parse_ok(src);
    }

    #[test]
    fn shadowed_block_scope_round_trips() {
        let src = "int x; void main() { x = 1; { int x; x = 2; print(x); } print(x); }";
        parse_ok(src);
    }
}
