//! The compiled-program evaluator.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ops::ControlFlow;

use jqx_value::Value;
use tracing::{debug, trace};

use crate::ast::Expr;
use crate::builtins::env_object;
use crate::errors::{CompileError, EvalError, InitError};
use crate::eval::{Ctx, Env, Unwind};
use crate::parser::parse;
use crate::resolve::{resolve, Globals};

const PRELUDE: &str = include_str!("prelude.jq");

/// How a run ended, when it did not end in an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Every output was produced.
    Finished,
    /// The program called `halt`.
    Halted,
    /// The sink asked to stop before the program was done.
    Stopped,
}

struct Program {
    expr: Expr,
    env: Env,
}

/// One evaluator instance: builtins, plus at most one compiled program.
///
/// `Evaluator` is `Send` but deliberately not `Sync`: a single instance
/// runs one program at a time, on whichever thread currently owns it.
pub struct Evaluator {
    base: Env,
    globals: Globals,
    program: Option<Program>,
    _not_sync: PhantomData<Cell<()>>,
}

impl Evaluator {
    /// Set up an evaluator with the builtin library loaded.
    pub fn new() -> Result<Self, InitError> {
        let prelude = parse(PRELUDE).map_err(first_error)?;
        let problems = resolve(PRELUDE, &prelude, &Globals::default());
        if !problems.is_empty() {
            return Err(first_error(problems));
        }

        let mut globals = Globals::default();
        globals.add_definitions(&prelude);
        globals.vars.push("ENV".to_owned());

        let mut base = Env::default();
        let mut expr = prelude;
        while let Expr::Def { def, rest } = expr {
            base = base.bind_func(def);
            expr = *rest;
        }
        base = base.bind_var("ENV", env_object());

        debug!(builtins = globals.funcs.len(), "evaluator ready");
        Ok(Evaluator {
            base,
            globals,
            program: None,
            _not_sync: PhantomData,
        })
    }

    /// Compile `source`, replacing any previous program.
    ///
    /// `args` names variables visible to the program: either an object
    /// (`{"x": 1}` binds `$x`) or an array of `{"name": .., "value": ..}`
    /// entries. Anything else binds nothing. On failure every problem found
    /// is returned and the evaluator is left without a program.
    pub fn compile(&mut self, source: &str, args: &Value) -> Result<(), Vec<CompileError>> {
        self.program = None;
        let bindings = named_args(source, args).map_err(|err| vec![err])?;

        let expr = parse(source)?;
        let mut globals = self.globals.clone();
        globals.vars.extend(bindings.iter().map(|(name, _)| name.clone()));
        let problems = resolve(source, &expr, &globals);
        if !problems.is_empty() {
            debug!(errors = problems.len(), "compile failed");
            return Err(problems);
        }

        let env = bindings
            .into_iter()
            .fold(self.base.clone(), |env, (name, value)| env.bind_var(&name, value));
        self.program = Some(Program { expr, env });
        debug!(len = source.len(), "compiled program");
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.program.is_some()
    }

    /// Run the compiled program on `input`, handing each output to `sink`.
    ///
    /// The sink returns `ControlFlow::Break` to stop evaluation early. The
    /// first error raised by the program ends the run; outputs already
    /// given to the sink stay given.
    pub fn run(
        &mut self,
        input: Value,
        sink: &mut dyn FnMut(Value) -> ControlFlow<()>,
    ) -> Result<Completion, EvalError> {
        let Some(program) = &self.program else {
            return Err(EvalError::msg("no program has been compiled"));
        };
        trace!("running program");
        let cx = Ctx::new();
        let result = cx.eval(&program.expr, &program.env, input, &mut |v| match sink(v) {
            ControlFlow::Continue(()) => Ok(()),
            ControlFlow::Break(()) => Err(Unwind::Stop),
        });
        match result {
            Ok(()) | Err(Unwind::Break(_)) => Ok(Completion::Finished),
            Err(Unwind::Halt) => Ok(Completion::Halted),
            Err(Unwind::Stop) => Ok(Completion::Stopped),
            Err(Unwind::Error(err)) => Err(err),
        }
    }

    /// Run on `input` and collect every output.
    ///
    /// On error, the outputs produced before it are returned with it.
    pub fn run_collect(&mut self, input: Value) -> Result<Vec<Value>, (Vec<Value>, EvalError)> {
        let mut outputs = Vec::new();
        let result = self.run(input, &mut |v| {
            outputs.push(v);
            ControlFlow::Continue(())
        });
        match result {
            Ok(_) => Ok(outputs),
            Err(err) => Err((outputs, err)),
        }
    }
}

fn first_error(mut errors: Vec<CompileError>) -> InitError {
    let first = if errors.is_empty() {
        CompileError::new(PRELUDE, 0..0, "empty error list")
    } else {
        errors.swap_remove(0)
    };
    InitError::Prelude(first)
}

/// Program arguments as `(name, value)` pairs.
fn named_args(source: &str, args: &Value) -> Result<Vec<(String, Value)>, CompileError> {
    let invalid = || {
        CompileError::new(
            source,
            0..0,
            "program arguments must be an object or an array of {name, value} objects",
        )
    };
    match args {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| match (item.get("name"), item.get("value")) {
                (Some(Value::String(name)), value) => Ok((
                    name.as_str().to_owned(),
                    value.cloned().unwrap_or_else(Value::null),
                )),
                _ => Err(invalid()),
            })
            .collect(),
        _ => Ok(Vec::new()),
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("compiled", &self.is_compiled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
