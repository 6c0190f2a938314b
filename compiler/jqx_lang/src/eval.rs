//! Tree-walking evaluation.
//!
//! Filters are generators. Rather than materialising every result, `eval`
//! pushes each output into a sink as soon as it is produced; the sink's
//! return value decides whether the generator keeps going. Early exits
//! (errors, `limit`, `halt`, or a consumer that stopped listening) travel
//! back up the Rust stack as [`Unwind`].

use std::cell::Cell;
use std::sync::Arc;

use jqx_value::{Map, Value};

use crate::ast::{Expr, FuncDef};
use crate::builtins;
use crate::errors::EvalError;
use crate::ops;
use jqx_stack::ensure_sufficient_stack;

/// Deepest chain of nested function calls before evaluation gives up.
pub(crate) const MAX_CALL_DEPTH: usize = 10_000;

/// Why a generator stopped early.
#[derive(Debug)]
pub(crate) enum Unwind {
    Error(EvalError),
    /// Stop the generator owning this label (`limit`, `first`, `isempty`).
    Break(usize),
    /// `halt`: stop the whole program without error.
    Halt,
    /// The consumer stopped accepting outputs.
    Stop,
}

impl From<EvalError> for Unwind {
    fn from(err: EvalError) -> Self {
        Unwind::Error(err)
    }
}

pub(crate) type Flow = Result<(), Unwind>;

/// Receives each output of a filter.
pub(crate) type Sink<'s> = &'s mut dyn FnMut(Value) -> Flow;

/// Lexical environment: an immutable linked list of bindings.
#[derive(Clone, Default)]
pub(crate) struct Env(Option<Arc<Frame>>);

struct Frame {
    binding: Binding,
    parent: Env,
}

enum Binding {
    Var(String, Value),
    /// A definition. Its body runs in the environment of this very frame,
    /// which is what makes recursion work.
    Func(Arc<FuncDef>),
    /// A filter argument, evaluated lazily in the caller's environment.
    Param { name: String, body: Arc<Expr>, env: Env },
}

pub(crate) enum Callee<'e> {
    Def(&'e Arc<FuncDef>, Env),
    Param(&'e Arc<Expr>, &'e Env),
}

impl Env {
    fn push(&self, binding: Binding) -> Env {
        Env(Some(Arc::new(Frame {
            binding,
            parent: self.clone(),
        })))
    }

    pub fn bind_var(&self, name: &str, value: Value) -> Env {
        self.push(Binding::Var(name.to_owned(), value))
    }

    pub fn bind_func(&self, def: Arc<FuncDef>) -> Env {
        self.push(Binding::Func(def))
    }

    fn bind_param(&self, name: &str, body: Arc<Expr>, env: Env) -> Env {
        self.push(Binding::Param {
            name: name.to_owned(),
            body,
            env,
        })
    }

    fn frames(&self) -> impl Iterator<Item = (&Frame, &Env)> {
        std::iter::successors(self.0.as_ref().map(|f| (&**f, self)), |(frame, _)| {
            frame.parent.0.as_ref().map(|f| (&**f, &frame.parent))
        })
    }

    pub fn lookup_var(&self, name: &str) -> Option<&Value> {
        self.frames().find_map(|(frame, _)| match &frame.binding {
            Binding::Var(n, value) if n == name => Some(value),
            _ => None,
        })
    }

    pub fn lookup_func(&self, name: &str, arity: usize) -> Option<Callee<'_>> {
        self.frames().find_map(|(frame, env)| match &frame.binding {
            Binding::Func(def) if def.name == name && def.arity() == arity => {
                Some(Callee::Def(def, env.clone()))
            }
            Binding::Param { name: n, body, env } if arity == 0 && n == name => {
                Some(Callee::Param(body, env))
            }
            _ => None,
        })
    }
}

/// Per-run evaluation state.
pub(crate) struct Ctx {
    depth: Cell<usize>,
    labels: Cell<usize>,
}

impl Ctx {
    pub fn new() -> Self {
        Ctx {
            depth: Cell::new(0),
            labels: Cell::new(0),
        }
    }

    /// A label no other running generator uses.
    pub fn fresh_label(&self) -> usize {
        let label = self.labels.get();
        self.labels.set(label + 1);
        label
    }

    pub fn eval(&self, expr: &Expr, env: &Env, input: Value, out: Sink<'_>) -> Flow {
        ensure_sufficient_stack(|| self.eval_expr(expr, env, input, out))
    }

    /// Evaluate `expr` and collect every output.
    pub fn collect(&self, expr: &Expr, env: &Env, input: Value) -> Result<Vec<Value>, Unwind> {
        let mut items = Vec::new();
        self.eval(expr, env, input, &mut |v| {
            items.push(v);
            Ok(())
        })?;
        Ok(items)
    }

    fn eval_expr(&self, expr: &Expr, env: &Env, input: Value, out: Sink<'_>) -> Flow {
        match expr {
            Expr::Identity => out(input),
            Expr::RecurseAll => self.recurse_all(input, out),
            Expr::Literal(value) => out(value.clone()),
            Expr::Index { target, key } => self.eval(target, env, input.clone(), &mut |t| {
                self.eval(key, env, input.clone(), &mut |k| out(ops::index(&t, &k)?))
            }),
            Expr::Slice { target, from, to } => self.eval(target, env, input.clone(), &mut |t| {
                self.eval_or_null(from.as_deref(), env, &input, &mut |f| {
                    self.eval_or_null(to.as_deref(), env, &input, &mut |e| {
                        out(ops::slice(&t, &f, &e)?)
                    })
                })
            }),
            Expr::Iterate(target) => self.eval(target, env, input, &mut |t| {
                for child in ops::children(&t)? {
                    out(child)?;
                }
                Ok(())
            }),
            Expr::Try { body, handler } => self.eval_try(body, handler.as_deref(), env, input, out),
            Expr::Array(None) => out(Value::empty_array()),
            Expr::Array(Some(inner)) => {
                let items = self.collect(inner, env, input)?;
                out(Value::array(items))
            }
            Expr::Object(entries) => self.build_object(entries, env, &input, Map::new(), out),
            Expr::Neg(inner) => self.eval(inner, env, input, &mut |v| match v {
                Value::Number(n) => out(Value::number(-n)),
                other => Err(EvalError::msg(format!(
                    "{} cannot be negated",
                    ops::describe(&other)
                ))
                .into()),
            }),
            Expr::Pipe(lhs, rhs) => {
                self.eval(lhs, env, input, &mut |v| self.eval(rhs, env, v, out))
            }
            Expr::Comma(lhs, rhs) => {
                self.eval(lhs, env, input.clone(), out)?;
                self.eval(rhs, env, input, out)
            }
            // Right operand varies slowest, as in jq.
            Expr::Binary(op, lhs, rhs) => self.eval(rhs, env, input.clone(), &mut |r| {
                self.eval(lhs, env, input.clone(), &mut |l| out(ops::binary(*op, l, &r)?))
            }),
            Expr::And(lhs, rhs) => self.eval(lhs, env, input.clone(), &mut |l| {
                if l.is_truthy() {
                    self.eval(rhs, env, input.clone(), &mut |r| out(Value::from(r.is_truthy())))
                } else {
                    out(Value::from(false))
                }
            }),
            Expr::Or(lhs, rhs) => self.eval(lhs, env, input.clone(), &mut |l| {
                if l.is_truthy() {
                    out(Value::from(true))
                } else {
                    self.eval(rhs, env, input.clone(), &mut |r| out(Value::from(r.is_truthy())))
                }
            }),
            Expr::Alt(lhs, rhs) => self.eval_alt(lhs, rhs, env, input, out),
            Expr::If {
                cond,
                then,
                otherwise,
            } => self.eval(cond, env, input.clone(), &mut |c| {
                if c.is_truthy() {
                    self.eval(then, env, input.clone(), out)
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise, env, input.clone(), out)
                } else {
                    out(input.clone())
                }
            }),
            Expr::Var { name, .. } => match env.lookup_var(name) {
                Some(value) => out(value.clone()),
                None => Err(EvalError::msg(format!("${name} is not defined")).into()),
            },
            Expr::Bind { source, name, body } => {
                self.eval(source, env, input.clone(), &mut |v| {
                    self.eval(body, &env.bind_var(name, v), input.clone(), out)
                })
            }
            Expr::Reduce {
                source,
                name,
                init,
                update,
            } => self.eval(init, env, input.clone(), &mut |start| {
                let mut acc = Some(start);
                self.eval(source, env, input.clone(), &mut |x| {
                    let current = acc.take().unwrap_or_else(Value::null);
                    // The last output of the update wins; no output leaves null.
                    self.eval(update, &env.bind_var(name, x), current, &mut |v| {
                        acc = Some(v);
                        Ok(())
                    })
                })?;
                out(acc.take().unwrap_or_else(Value::null))
            }),
            Expr::Foreach {
                source,
                name,
                init,
                update,
                extract,
            } => self.eval(init, env, input.clone(), &mut |start| {
                let mut acc = start;
                self.eval(source, env, input.clone(), &mut |x| {
                    let scope = env.bind_var(name, x);
                    let mut next = None;
                    self.eval(update, &scope, acc.clone(), &mut |v| {
                        next = Some(v.clone());
                        match extract {
                            Some(extract) => self.eval(extract, &scope, v, out),
                            None => out(v),
                        }
                    })?;
                    if let Some(next) = next {
                        acc = next;
                    }
                    Ok(())
                })
            }),
            Expr::Call { name, args, .. } => match env.lookup_func(name, args.len()) {
                Some(Callee::Def(def, def_env)) => self.call_def(def, def_env, args, env, input, out),
                Some(Callee::Param(body, closure_env)) => self.eval(body, closure_env, input, out),
                None => builtins::call(self, name, args, env, input, out),
            },
            Expr::Def { def, rest } => self.eval(rest, &env.bind_func(Arc::clone(def)), input, out),
        }
    }

    fn call_def(
        &self,
        def: &FuncDef,
        def_env: Env,
        args: &[Arc<Expr>],
        caller: &Env,
        input: Value,
        out: Sink<'_>,
    ) -> Flow {
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(EvalError::msg("Maximum call depth exceeded").into());
        }
        let mut scope = def_env;
        for (param, arg) in def.params.iter().zip(args) {
            scope = scope.bind_param(param, Arc::clone(arg), caller.clone());
        }
        self.depth.set(depth + 1);
        let result = self.eval(&def.body, &scope, input, out);
        self.depth.set(depth);
        result
    }

    fn eval_or_null(
        &self,
        expr: Option<&Expr>,
        env: &Env,
        input: &Value,
        out: Sink<'_>,
    ) -> Flow {
        match expr {
            Some(expr) => self.eval(expr, env, input.clone(), out),
            None => out(Value::null()),
        }
    }

    /// Run `body` into `out`. The outer `Err` carries an unwind raised
    /// downstream by `out`; the inner result is the body's own.
    fn eval_guarded(
        &self,
        body: &Expr,
        env: &Env,
        input: Value,
        out: Sink<'_>,
    ) -> Result<Flow, Unwind> {
        let mut downstream = None;
        let result = self.eval(body, env, input, &mut |v| {
            out(v).map_err(|unwind| {
                downstream = Some(unwind);
                Unwind::Stop
            })
        });
        match downstream {
            Some(unwind) => Err(unwind),
            None => Ok(result),
        }
    }

    fn eval_try(
        &self,
        body: &Expr,
        handler: Option<&Expr>,
        env: &Env,
        input: Value,
        out: Sink<'_>,
    ) -> Flow {
        match self.eval_guarded(body, env, input, out)? {
            Err(Unwind::Error(err)) => match handler {
                Some(handler) => self.eval(handler, env, err.payload, out),
                None => Ok(()),
            },
            other => other,
        }
    }

    /// `lhs // rhs`: the truthy outputs of `lhs`, or else those of `rhs`.
    /// Errors in `lhs` count as no output.
    fn eval_alt(&self, lhs: &Expr, rhs: &Expr, env: &Env, input: Value, out: Sink<'_>) -> Flow {
        let mut any = false;
        let result = self.eval_guarded(lhs, env, input.clone(), &mut |v| {
            if v.is_truthy() {
                any = true;
                out(v)
            } else {
                Ok(())
            }
        })?;
        match result {
            Ok(()) | Err(Unwind::Error(_)) => {}
            Err(other) => return Err(other),
        }
        if any {
            Ok(())
        } else {
            self.eval(rhs, env, input, out)
        }
    }

    /// Every combination of key and value outputs yields one object.
    fn build_object(
        &self,
        entries: &[(Expr, Expr)],
        env: &Env,
        input: &Value,
        acc: Map,
        out: Sink<'_>,
    ) -> Flow {
        let Some(((key, value), rest)) = entries.split_first() else {
            return out(Value::object(acc));
        };
        self.eval(key, env, input.clone(), &mut |k| {
            let k = match k {
                Value::String(k) => k,
                other => {
                    return Err(EvalError::msg(format!(
                        "Object keys must be strings, not {}",
                        other.kind()
                    ))
                    .into())
                }
            };
            self.eval(value, env, input.clone(), &mut |v| {
                let mut next = acc.clone();
                next.insert(k.as_str().to_owned(), v);
                self.build_object(rest, env, input, next, out)
            })
        })
    }

    /// `..`: the input, then every descendant, depth first.
    pub fn recurse_all(&self, input: Value, out: Sink<'_>) -> Flow {
        ensure_sufficient_stack(|| {
            let children = match &input {
                Value::Array(items) => items.to_vec(),
                Value::Object(map) => map.values().cloned().collect(),
                _ => Vec::new(),
            };
            out(input)?;
            for child in children {
                self.recurse_all(child, out)?;
            }
            Ok(())
        })
    }
}
