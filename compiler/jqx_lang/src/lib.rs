//! jqx Lang - compiling and running jq filter programs.
//!
//! # Pipeline
//!
//! 1. `lexer`: source text to tokens (logos)
//! 2. `parser`: tokens to an [`Expr`](ast::Expr) tree
//! 3. `resolve`: every call and variable checked against its scope
//! 4. `eval`: the tree run as a generator, outputs pushed into a sink
//!
//! [`Evaluator`] ties these together: construct one, [`compile`] a
//! program, then [`run`] it once per input.
//!
//! ```ignore
//! let mut evaluator = Evaluator::new()?;
//! evaluator.compile(".a", &Value::null())?;
//! let outputs = evaluator.run_collect(Value::from_json(r#"{"a":123}"#)?)?;
//! ```
//!
//! [`compile`]: Evaluator::compile
//! [`run`]: Evaluator::run

mod ast;
mod builtins;
mod errors;
mod eval;
mod evaluator;
mod lexer;
mod ops;
mod parser;
mod resolve;

pub use ast::Span;
pub use errors::{CompileError, EvalError, InitError};
pub use evaluator::{Completion, Evaluator};
