//! The Evaluator (spec §4.3): a stack machine that interprets the AST
//! rooted at node 0 against a fixed-capacity value stack, a base
//! pointer/stack pointer pair, a single result register, and a
//! return-flag.

use std::fmt;
use std::io::{self, Write};

use crate::ast::node::{NodeId, Payload, Tag};
use crate::ast::Arena;
use crate::error::FatalError;
use crate::tracer::Tracer;
use crate::value::{format_float, Literal, Type};

/// A runtime value: `type` is implicit in the variant. Strings borrow
/// from the AST's owned literal buffers rather than copying (spec §3).
#[derive(Debug, Clone, Copy)]
pub enum StackValue<'a> {
    Void,
    Boolean(i32),
    Integer(i32),
    Float(f32),
    String(&'a str),
}

impl<'a> fmt::Display for StackValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackValue::Void => write!(f, "void"),
            StackValue::Boolean(b) => write!(f, "{}", if *b != 0 { "true" } else { "false" }),
            StackValue::Integer(i) => write!(f, "{}", i),
            StackValue::Float(v) => write!(f, "{}", format_float(*v)),
            StackValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// Interprets a finished [`Arena`] (spec §4.3). One evaluator per
/// program run; owns the value stack and the `bp`/`sp`/register/
/// return-flag state the dispatch table closes over.
pub struct Evaluator<'a> {
    arena: &'a Arena,
    stack: Vec<StackValue<'a>>,
    bp: usize,
    sp: usize,
    result: StackValue<'a>,
    return_flag: bool,
    tracer: Tracer,
    output: Box<dyn Write + 'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(arena: &'a Arena, stack_size: usize, trace: bool) -> Self {
        Self::with_output(arena, stack_size, trace, Box::new(io::stdout()))
    }

    /// Like [`Evaluator::new`], but `Print` (spec §4.3.9) writes to
    /// `output` instead of standard output — lets tests observe exactly
    /// what a program prints without capturing the process's stdout.
    pub fn with_output(arena: &'a Arena, stack_size: usize, trace: bool, output: Box<dyn Write + 'a>) -> Self {
        Evaluator {
            arena,
            stack: vec![StackValue::Void; stack_size],
            bp: 0,
            sp: 0,
            result: StackValue::Void,
            return_flag: false,
            tracer: Tracer::new(trace),
            output,
        }
    }

    /// Dispatches the program root (node `0`).
    pub fn run(&mut self) -> Result<(), FatalError> {
        self.dispatch(0)?;
        Ok(())
    }

    /// Dispatches `id`, writing the result into the register and
    /// returning it, matching the source's `dispatch()` which does both
    /// to let callers chain (`let lhs = dispatch(first)`).
    fn dispatch(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let tag = self.arena.get(id).tag;
        self.tracer.enter(tag);
        let value = match tag {
            Tag::Integer | Tag::Float | Tag::Boolean | Tag::String => self.literal(id)?,
            Tag::LocVar => {
                let slot = self.variable_slot(id)?;
                self.slot_value(self.bp + slot)?
            }
            Tag::GlobVar => {
                let slot = self.variable_slot(id)?;
                self.slot_value(slot)?
            }
            Tag::Program => self.exec_program(id)?,
            Tag::Function => self.exec_function(id)?,
            Tag::Call => self.exec_call(id)?,
            Tag::Sequence => self.exec_sequence(id)?,
            Tag::If => self.exec_if(id)?,
            Tag::For => self.exec_for(id)?,
            Tag::DoWhile | Tag::While => self.exec_loop(id)?,
            Tag::Print => self.exec_print(id)?,
            Tag::Assign => self.exec_assign(id)?,
            Tag::Return => self.exec_return(id)?,
            Tag::Cast => self.exec_cast(id)?,
            Tag::Plus | Tag::Minus | Tag::Times | Tag::Divide => self.exec_arith(tag, id)?,
            Tag::LogOr | Tag::LogAnd => self.exec_logical(tag, id)?,
            Tag::Uminus => self.exec_uminus(id)?,
            Tag::Eqt | Tag::Neq | Tag::Leq | Tag::Geq | Tag::Lst | Tag::Grt => self.exec_compare(tag, id)?,
        };
        self.result = value;
        self.tracer.leave(tag, value);
        Ok(value)
    }

    fn variable_slot(&self, id: NodeId) -> Result<usize, FatalError> {
        match self.arena.get(id).payload {
            Payload::Variable { slot } => Ok(slot),
            _ => Err(FatalError::InvariantViolation("variable node missing a slot".into())),
        }
    }

    fn slot_value(&self, idx: usize) -> Result<StackValue<'a>, FatalError> {
        self.stack
            .get(idx)
            .copied()
            .ok_or_else(|| FatalError::InvariantViolation(format!("slot {} out of bounds", idx)))
    }

    fn literal(&self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        match &self.arena.get(id).payload {
            Payload::Literal(Literal::Boolean(b)) => Ok(StackValue::Boolean(if *b { 1 } else { 0 })),
            Payload::Literal(Literal::Integer(i)) => Ok(StackValue::Integer(*i)),
            Payload::Literal(Literal::Float(v)) => Ok(StackValue::Float(*v)),
            Payload::Literal(Literal::String(s)) => Ok(StackValue::String(s.as_str())),
            _ => Err(FatalError::InvariantViolation("literal node missing its value".into())),
        }
    }

    fn truthy(&self, value: StackValue<'a>) -> Result<bool, FatalError> {
        match value {
            StackValue::Boolean(b) => Ok(b != 0),
            _ => Err(FatalError::InvariantViolation("expected a boolean value".into())),
        }
    }

    /// §4.3.1: reset state, scrub every slot, reserve the global frame,
    /// then run the body as a `Sequence`.
    fn exec_program(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let (body, globals) = match self.arena.get(id).payload {
            Payload::Program { body, globals_count } => (body, globals_count),
            _ => return Err(FatalError::InvariantViolation("node 0 is not a Program node".into())),
        };
        self.return_flag = false;
        self.bp = 0;
        self.sp = 0;
        for slot in self.stack.iter_mut() {
            *slot = StackValue::Void;
        }
        self.sp += globals;
        if self.sp >= self.stack.len() {
            return Err(FatalError::StackOverflow);
        }
        self.dispatch(body)
    }

    /// §4.3.3: the callee's frame setup. Argument slots are already
    /// materialized by `exec_call` before this runs.
    fn exec_function(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let (body, locals) = match self.arena.get(id).payload {
            Payload::Function { body, locals_count } => (body, locals_count),
            _ => return Err(FatalError::InvariantViolation("Call target is not a Function node".into())),
        };
        self.bp = self.sp;
        self.sp += locals;
        let value = self.dispatch(body)?;
        self.return_flag = false;
        Ok(value)
    }

    /// §4.3.4: full call protocol — overflow check, argument region
    /// reservation, left-to-right argument evaluation, callee dispatch,
    /// slot scrubbing, frame teardown.
    fn exec_call(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let (args_id, function_id) = self.arena.get(id).payload.as_container();
        let locals = match self.arena.get(function_id).payload {
            Payload::Function { locals_count, .. } => locals_count,
            _ => return Err(FatalError::InvariantViolation("Call target is not a Function node".into())),
        };
        if self.sp + locals >= self.stack.len() {
            return Err(FatalError::StackOverflow);
        }

        let params_base = self.sp;
        let saved_bp = self.bp;

        self.sp += locals;
        let mut i = 0;
        for arg in self.arena.children(args_id) {
            let value = self.dispatch(arg)?;
            self.stack[params_base + i] = value;
            self.sp += 1;
            i += 1;
        }

        self.sp = params_base;
        self.dispatch(function_id)?;

        for slot in &mut self.stack[params_base..params_base + locals] {
            *slot = StackValue::Void;
        }
        self.sp = self.bp;
        self.bp = saved_bp;

        Ok(self.result)
    }

    /// §4.3.2: run children in order, stopping early once `return_flag`
    /// is set.
    fn exec_sequence(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let mut last = StackValue::Void;
        for child in self.arena.children(id) {
            last = self.dispatch(child)?;
            if self.return_flag {
                break;
            }
        }
        Ok(last)
    }

    fn exec_if(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let mut children = self.arena.children(id);
        let cond = children.next().ok_or_else(missing("If", "condition"))?;
        let then_branch = children.next().ok_or_else(missing("If", "then-branch"))?;
        let else_branch = children.next();

        let cond_value = self.dispatch(cond)?;
        if self.truthy(cond_value)? {
            self.dispatch(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.dispatch(else_branch)
        } else {
            Ok(StackValue::Void)
        }
    }

    /// §4.3.7: `For` does NOT check `return_flag` between the body and
    /// the step/condition legs — preserved from the source verbatim
    /// (spec §9 open question).
    fn exec_for(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let mut children = self.arena.children(id);
        let init = children.next().ok_or_else(missing("For", "init"))?;
        let cond = children.next().ok_or_else(missing("For", "condition"))?;
        let step = children.next().ok_or_else(missing("For", "step"))?;
        let body = children.next().ok_or_else(missing("For", "body"))?;

        self.dispatch(init)?;
        loop {
            let cond_value = self.dispatch(cond)?;
            if !self.truthy(cond_value)? {
                break;
            }
            self.dispatch(body)?;
            self.dispatch(step)?;
        }
        Ok(StackValue::Void)
    }

    /// §4.3.7: `While` and `DoWhile` share identical body-first
    /// semantics in the source; both dispatch here (spec §9).
    fn exec_loop(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let mut children = self.arena.children(id);
        let cond = children.next().ok_or_else(missing("loop", "condition"))?;
        let body = children.next().ok_or_else(missing("loop", "body"))?;

        loop {
            self.dispatch(body)?;
            if self.return_flag {
                break;
            }
            let cond_value = self.dispatch(cond)?;
            if !self.truthy(cond_value)? {
                break;
            }
        }
        Ok(StackValue::Void)
    }

    fn exec_print(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let mut children = self.arena.children(id);
        let expr = children.next().ok_or_else(missing("Print", "expression"))?;
        let value = self.dispatch(expr)?;
        writeln!(self.output, "{}", value)
            .map_err(|err| FatalError::InvariantViolation(format!("write to stdout failed: {}", err)))?;
        Ok(StackValue::Void)
    }

    fn exec_assign(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let mut children = self.arena.children(id);
        let var = children.next().ok_or_else(missing("Assign", "target"))?;
        let expr = children.next().ok_or_else(missing("Assign", "expression"))?;

        let value = self.dispatch(expr)?;
        let var_node = self.arena.get(var);
        let slot = match var_node.payload {
            Payload::Variable { slot } => slot,
            _ => return Err(FatalError::InvariantViolation("Assign target is not a variable".into())),
        };
        match var_node.tag {
            Tag::GlobVar => self.stack[slot] = value,
            Tag::LocVar => self.stack[self.bp + slot] = value,
            _ => return Err(FatalError::InvariantViolation("Assign target is not a variable".into())),
        }
        Ok(value)
    }

    fn exec_return(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let mut children = self.arena.children(id);
        let value = match children.next() {
            Some(expr) => self.dispatch(expr)?,
            None => StackValue::Void,
        };
        self.return_flag = true;
        Ok(value)
    }

    /// §4.3.8: only `Integer -> Float` is defined; anything else is an
    /// AST invariant violation.
    fn exec_cast(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let child = match self.arena.get(id).payload {
            Payload::Cast { child } => child,
            _ => return Err(FatalError::InvariantViolation("Cast node missing its operand".into())),
        };
        let target = self.arena.get(id).ty;
        let value = self.dispatch(child)?;
        match (value, target) {
            (StackValue::Integer(i), Type::Float) => Ok(StackValue::Float(i as f32)),
            _ => Err(FatalError::InvariantViolation(format!("unsupported cast to {}", target))),
        }
    }

    fn exec_arith(&mut self, tag: Tag, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let (lhs_id, rhs_id) = self.arena.get(id).payload.as_container();
        let lhs = self.dispatch(lhs_id)?;
        let rhs = self.dispatch(rhs_id)?;
        match (lhs, rhs) {
            (StackValue::Integer(a), StackValue::Integer(b)) => {
                let result = match tag {
                    Tag::Plus => a.wrapping_add(b),
                    Tag::Minus => a.wrapping_sub(b),
                    Tag::Times => a.wrapping_mul(b),
                    // Division by zero is undefined in the source; we
                    // produce 0 rather than trap or corrupt state.
                    Tag::Divide if b == 0 => 0,
                    Tag::Divide => a.wrapping_div(b),
                    _ => unreachable!("exec_arith called with non-arithmetic tag"),
                };
                Ok(StackValue::Integer(result))
            }
            (StackValue::Float(a), StackValue::Float(b)) => {
                let result = match tag {
                    Tag::Plus => a + b,
                    Tag::Minus => a - b,
                    Tag::Times => a * b,
                    Tag::Divide => a / b,
                    _ => unreachable!("exec_arith called with non-arithmetic tag"),
                };
                Ok(StackValue::Float(result))
            }
            _ => Err(FatalError::InvariantViolation(format!(
                "{} applied to mismatched operand types",
                tag
            ))),
        }
    }

    fn exec_uminus(&mut self, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let mut children = self.arena.children(id);
        let operand = children.next().ok_or_else(missing("Uminus", "operand"))?;
        match self.dispatch(operand)? {
            StackValue::Integer(v) => Ok(StackValue::Integer(v.wrapping_neg())),
            StackValue::Float(v) => Ok(StackValue::Float(-v)),
            _ => Err(FatalError::InvariantViolation("Uminus applied to a non-numeric operand".into())),
        }
    }

    fn exec_compare(&mut self, tag: Tag, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let (lhs_id, rhs_id) = self.arena.get(id).payload.as_container();
        let lhs = self.dispatch(lhs_id)?;
        let rhs = self.dispatch(rhs_id)?;
        let outcome = match (lhs, rhs) {
            (StackValue::Integer(a), StackValue::Integer(b)) => compare_ord(tag, a.partial_cmp(&b)),
            (StackValue::Float(a), StackValue::Float(b)) => compare_ord(tag, a.partial_cmp(&b)),
            (StackValue::Boolean(a), StackValue::Boolean(b)) => compare_eq(tag, a == b),
            // String operands are rejected at the parser's type-check
            // stage (spec §9 open question); reaching here is an
            // invariant violation like any other operand mismatch.
            _ => None,
        };
        let outcome = outcome.ok_or_else(|| {
            FatalError::InvariantViolation(format!("{} applied to incomparable operands", tag))
        })?;
        Ok(StackValue::Boolean(outcome as i32))
    }

    /// §4.3.8: short-circuit boolean operators, writing the boolean
    /// outcome to the register. The source computes both sides and
    /// discards the result without writing it back — almost certainly a
    /// bug (spec §9); this implements the intended semantics instead.
    fn exec_logical(&mut self, tag: Tag, id: NodeId) -> Result<StackValue<'a>, FatalError> {
        let (lhs_id, rhs_id) = self.arena.get(id).payload.as_container();
        let lhs_bool = self.truthy(self.dispatch(lhs_id)?)?;

        let outcome = match tag {
            Tag::LogOr if lhs_bool => true,
            Tag::LogAnd if !lhs_bool => false,
            Tag::LogOr | Tag::LogAnd => self.truthy(self.dispatch(rhs_id)?)?,
            _ => unreachable!("exec_logical called with a non-logical tag"),
        };
        Ok(StackValue::Boolean(outcome as i32))
    }
}

fn compare_ord(tag: Tag, ord: Option<std::cmp::Ordering>) -> Option<bool> {
    use std::cmp::Ordering::*;
    let ord = ord?;
    Some(match tag {
        Tag::Eqt => ord == Equal,
        Tag::Neq => ord != Equal,
        Tag::Leq => ord != Greater,
        Tag::Geq => ord != Less,
        Tag::Lst => ord == Less,
        Tag::Grt => ord == Greater,
        _ => return None,
    })
}

fn compare_eq(tag: Tag, eq: bool) -> Option<bool> {
    match tag {
        Tag::Eqt => Some(eq),
        Tag::Neq => Some(!eq),
        _ => None,
    }
}

fn missing(node: &'static str, field: &'static str) -> impl FnOnce() -> FatalError {
    move || FatalError::InvariantViolation(format!("{} node missing its {}", node, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Arena;
    use crate::value::Type;

    /// `void main() { print(1 + 2); }` shaped by hand, skipping the
    /// parser: a `Program` whose body calls a zero-local `main`.
    fn build_print_sum(arena: &mut Arena) {
        let one = arena.node_integer(1).unwrap();
        let two = arena.node_integer(2).unwrap();
        let sum = arena.node_pair(Tag::Plus, one, two).unwrap();
        let print_node = arena.node_tag(Tag::Print, sum).unwrap();
        let body = arena.node_tag(Tag::Sequence, print_node).unwrap();
        let function = arena.node_function(body, 0).unwrap();
        let empty_args = arena.node_empty(Tag::Sequence).unwrap();
        let call = arena.node_pair(Tag::Call, empty_args, function).unwrap();
        let program_body = arena.node_tag(Tag::Sequence, call).unwrap();
        arena.set_program(program_body, 0);
    }

    #[test]
    fn arithmetic_and_print_drive_the_evaluator() {
        let mut arena = Arena::init().unwrap();
        build_print_sum(&mut arena);
        let mut eval = Evaluator::new(&arena, 1024, false);
        eval.run().unwrap();
    }

    #[test]
    fn short_circuit_or_skips_the_right_operand() {
        let mut arena = Arena::init().unwrap();
        let lhs = arena.node_boolean(true).unwrap();
        // A call to a nonexistent function would panic on dispatch;
        // short-circuiting must never evaluate it.
        let empty_args = arena.node_empty(Tag::Sequence).unwrap();
        let rhs = arena.node_pair(Tag::Call, empty_args, 9999).unwrap();
        let or_node = arena.node_pair(Tag::LogOr, lhs, rhs).unwrap();
        let print_node = arena.node_tag(Tag::Print, or_node).unwrap();
        let body = arena.node_tag(Tag::Sequence, print_node).unwrap();
        arena.set_program(body, 0);

        let mut eval = Evaluator::new(&arena, 1024, false);
        eval.run().unwrap();
    }

    #[test]
    fn division_by_zero_does_not_corrupt_state() {
        let mut arena = Arena::init().unwrap();
        let a = arena.node_integer(10).unwrap();
        let b = arena.node_integer(0).unwrap();
        let div = arena.node_pair(Tag::Divide, a, b).unwrap();
        let print_node = arena.node_tag(Tag::Print, div).unwrap();
        let body = arena.node_tag(Tag::Sequence, print_node).unwrap();
        arena.set_program(body, 0);

        let mut eval = Evaluator::new(&arena, 1024, false);
        eval.run().unwrap();
    }

    /// §9: slots vacated by a returning call are scrubbed back to `Void`,
    /// not left holding the callee's last values.
    #[test]
    fn call_teardown_scrubs_vacated_slots() {
        let mut arena = Arena::init().unwrap();
        let param = arena.node_variable(None).unwrap(); // LocVar slot 0, patched below
        arena.get_mut(param).tag = Tag::LocVar;
        let ret = arena.node_tag(Tag::Return, param).unwrap();
        let body = arena.node_tag(Tag::Sequence, ret).unwrap();
        let function = arena.node_function(body, 1).unwrap();

        let arg = arena.node_integer(5).unwrap();
        let args_seq = arena.node_tag(Tag::Sequence, arg).unwrap();
        let call = arena.node_pair(Tag::Call, args_seq, function).unwrap();
        let program_body = arena.node_tag(Tag::Sequence, call).unwrap();
        arena.set_program(program_body, 0);

        let mut eval = Evaluator::new(&arena, 1024, false);
        eval.run().unwrap();
        assert!(matches!(eval.stack[0], StackValue::Void));
    }

    #[test]
    fn cast_widens_integer_to_float() {
        let mut arena = Arena::init().unwrap();
        let i = arena.node_integer(2).unwrap();
        let cast = arena.node_cast(Type::Float, i).unwrap();
        let print_node = arena.node_tag(Tag::Print, cast).unwrap();
        let body = arena.node_tag(Tag::Sequence, print_node).unwrap();
        arena.set_program(body, 0);

        let mut eval = Evaluator::new(&arena, 1024, false);
        eval.run().unwrap();
    }
}
