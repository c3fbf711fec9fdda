//! Indented dispatch tracing (spec §6 "Debug trace"), gated by `--trace`
//! and disabled by default. Mirrors the source's `TRACE_ENTER`/
//! `TRACE_LEAVE` bracketing without pulling in a logging framework —
//! the teacher doesn't carry one either, and this is scoped as optional
//! diagnostic output, not an application log.

use std::fmt;

use crate::ast::Tag;

pub struct Tracer {
    enabled: bool,
    depth: usize,
}

impl Tracer {
    pub fn new(enabled: bool) -> Self {
        Tracer { enabled, depth: 0 }
    }

    pub fn enter(&mut self, tag: Tag) {
        if !self.enabled {
            return;
        }
        eprintln!("{}> {}", "  ".repeat(self.depth), tag);
        self.depth += 1;
    }

    pub fn leave(&mut self, tag: Tag, result: impl fmt::Display) {
        if !self.enabled {
            return;
        }
        self.depth = self.depth.saturating_sub(1);
        eprintln!("{}< {} = {}", "  ".repeat(self.depth), tag, result);
    }
}
