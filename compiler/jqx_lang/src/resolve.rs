//! Name resolution.
//!
//! Checks every function call and variable reference against the lexical
//! scope before a program is accepted, so that evaluation never meets an
//! unknown name. All problems are reported, not just the first.

use rustc_hash::FxHashMap;

use crate::ast::{Expr, FuncDef};
use crate::builtins::NATIVES;
use crate::errors::CompileError;

/// Names visible to a program before its own definitions.
#[derive(Clone, Debug, Default)]
pub(crate) struct Globals {
    pub funcs: Vec<(String, usize)>,
    pub vars: Vec<String>,
}

impl Globals {
    /// Signatures of the leading `def` chain of `expr`, in order.
    pub fn add_definitions(&mut self, mut expr: &Expr) {
        while let Expr::Def { def, rest } = expr {
            self.funcs.push((def.name.clone(), def.arity()));
            expr = rest;
        }
    }
}

pub(crate) fn resolve(source: &str, expr: &Expr, globals: &Globals) -> Vec<CompileError> {
    let mut resolver = Resolver {
        source,
        natives: native_arities(),
        funcs: globals.funcs.clone(),
        vars: globals.vars.clone(),
        errors: Vec::new(),
    };
    resolver.expr(expr);
    resolver.errors
}

fn native_arities() -> FxHashMap<&'static str, u8> {
    let mut natives = FxHashMap::default();
    for &(name, arity) in NATIVES {
        *natives.entry(name).or_insert(0) |= 1 << arity;
    }
    natives
}

struct Resolver<'a> {
    source: &'a str,
    /// Native name to a bit set of its arities.
    natives: FxHashMap<&'static str, u8>,
    funcs: Vec<(String, usize)>,
    vars: Vec<String>,
    errors: Vec<CompileError>,
}

impl Resolver<'_> {
    fn has_func(&self, name: &str, arity: usize) -> bool {
        self.funcs.iter().rev().any(|(n, a)| n == name && *a == arity)
            || self
                .natives
                .get(name)
                .is_some_and(|arities| arity < 8 && arities & (1 << arity) != 0)
    }

    fn with_var(&mut self, name: &str, body: &Expr) {
        self.vars.push(name.to_owned());
        self.expr(body);
        self.vars.pop();
    }

    fn def(&mut self, def: &FuncDef) {
        let mark = self.funcs.len();
        self.funcs.push((def.name.clone(), def.arity()));
        for param in &def.params {
            self.funcs.push((param.clone(), 0));
        }
        self.expr(&def.body);
        self.funcs.truncate(mark);
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Identity | Expr::RecurseAll | Expr::Literal(_) => {}
            Expr::Index { target, key } => {
                self.expr(target);
                self.expr(key);
            }
            Expr::Slice { target, from, to } => {
                self.expr(target);
                if let Some(from) = from {
                    self.expr(from);
                }
                if let Some(to) = to {
                    self.expr(to);
                }
            }
            Expr::Iterate(inner) | Expr::Neg(inner) => self.expr(inner),
            Expr::Try { body, handler } => {
                self.expr(body);
                if let Some(handler) = handler {
                    self.expr(handler);
                }
            }
            Expr::Array(inner) => {
                if let Some(inner) = inner {
                    self.expr(inner);
                }
            }
            Expr::Object(entries) => {
                for (key, value) in entries {
                    self.expr(key);
                    self.expr(value);
                }
            }
            Expr::Pipe(a, b)
            | Expr::Comma(a, b)
            | Expr::Binary(_, a, b)
            | Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Alt(a, b) => {
                self.expr(a);
                self.expr(b);
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.expr(then);
                if let Some(otherwise) = otherwise {
                    self.expr(otherwise);
                }
            }
            Expr::Var { name, span } => {
                if !self.vars.iter().any(|v| v == name) {
                    self.errors.push(CompileError::new(
                        self.source,
                        span.clone(),
                        format!("${name} is not defined"),
                    ));
                }
            }
            Expr::Bind { source, name, body } => {
                self.expr(source);
                self.with_var(name, body);
            }
            Expr::Reduce {
                source,
                name,
                init,
                update,
            } => {
                self.expr(source);
                self.expr(init);
                self.with_var(name, update);
            }
            Expr::Foreach {
                source,
                name,
                init,
                update,
                extract,
            } => {
                self.expr(source);
                self.expr(init);
                self.vars.push(name.clone());
                self.expr(update);
                if let Some(extract) = extract {
                    self.expr(extract);
                }
                self.vars.pop();
            }
            Expr::Call { name, args, span } => {
                if !self.has_func(name, args.len()) {
                    self.errors.push(CompileError::new(
                        self.source,
                        span.clone(),
                        format!("{name}/{} is not defined", args.len()),
                    ));
                }
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Def { def, rest } => {
                self.def(def);
                self.funcs.push((def.name.clone(), def.arity()));
                self.expr(rest);
                self.funcs.pop();
            }
        }
    }
}
