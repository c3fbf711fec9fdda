//! End-to-end interpreter tests (spec §8): literal source text in,
//! literal standard-output text out, running the real parser and
//! evaluator together rather than hand-built ASTs.

mod interpreter_test;
