//! Recursive descent parser for filter programs.
//!
//! Precedence, loosest first:
//!
//! | Level       | Operators                          | Assoc |
//! |-------------|------------------------------------|-------|
//! | pipe        | `def ...;`, `\|`, `as $x \|`       | right |
//! | comma       | `,`                                | left  |
//! | alternative | `//`                               | right |
//! | or          | `or`                               | left  |
//! | and         | `and`                              | left  |
//! | comparison  | `== != < <= > >=`                  | none  |
//! | additive    | `+ -`                              | left  |
//! | multiplic.  | `* / %`                            | left  |
//! | unary       | `-`                                |       |
//! | postfix     | `.f` `."s"` `[e]` `[]` `[a:b]` `?` |       |
//!
//! The first syntax error stops parsing; there is no recovery.

use std::sync::Arc;

use jqx_value::Value;

use crate::ast::{Args, BinaryOp, Expr, FuncDef, Span};
use crate::errors::CompileError;
use crate::lexer::{self, Token};
use jqx_stack::ensure_sufficient_stack;

type ParseResult<T> = Result<T, CompileError>;

/// Parse a whole program. Returns lexer errors and the parse error together.
pub(crate) fn parse(source: &str) -> Result<Expr, Vec<CompileError>> {
    let (tokens, mut errors) = lexer::lex(source);
    if !errors.is_empty() {
        return Err(errors);
    }
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    match parser.parse_program() {
        Ok(expr) => Ok(expr),
        Err(err) => {
            errors.push(err);
            Err(errors)
        }
    }
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

// Cursor
impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    fn bump(&mut self) -> Option<(Token, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> ParseResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> CompileError {
        let found = match self.peek() {
            Some(token) => token.describe(),
            None => "end of file".to_owned(),
        };
        CompileError::new(
            self.source,
            self.span(),
            format!("syntax error, unexpected {found}"),
        )
    }

    fn expect_var(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(Token::Var(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }
}

// Grammar
impl Parser<'_> {
    fn parse_program(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_pipe()?;
        if self.peek().is_some() {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    fn parse_pipe(&mut self) -> ParseResult<Expr> {
        ensure_sufficient_stack(|| {
            if self.check(&Token::Def) {
                let def = self.parse_def()?;
                // A program made only of definitions behaves as `.`.
                let rest = if self.peek().is_none() || self.check(&Token::RParen) {
                    Expr::Identity
                } else {
                    self.parse_pipe()?
                };
                return Ok(Expr::Def {
                    def: Arc::new(def),
                    rest: Box::new(rest),
                });
            }
            let lhs = self.parse_comma()?;
            if self.eat(&Token::Pipe) {
                let rhs = self.parse_pipe()?;
                return Ok(Expr::Pipe(Box::new(lhs), Box::new(rhs)));
            }
            Ok(lhs)
        })
    }

    /// `def name(params): body;`
    fn parse_def(&mut self) -> ParseResult<FuncDef> {
        self.expect(&Token::Def)?;
        let name = match self.bump() {
            Some((Token::Ident(name), _)) => name,
            Some((token, _)) => match token.keyword() {
                Some(kw) => kw.to_owned(),
                None => {
                    self.pos -= 1;
                    return Err(self.unexpected());
                }
            },
            None => return Err(self.unexpected()),
        };

        let mut params = Vec::new();
        let mut value_params = Vec::new();
        if self.eat(&Token::LParen) {
            loop {
                match self.peek() {
                    Some(Token::Ident(param)) => params.push(param.clone()),
                    Some(Token::Var(param)) => {
                        value_params.push(param.clone());
                        params.push(param.clone());
                    }
                    _ => return Err(self.unexpected()),
                }
                self.pos += 1;
                if !self.eat(&Token::Semi) {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
        }
        self.expect(&Token::Colon)?;
        let mut body = self.parse_pipe()?;
        self.expect(&Token::Semi)?;

        // `def f($a): body` is `def f(a): a as $a | body`.
        for param in value_params.into_iter().rev() {
            body = Expr::Bind {
                source: Box::new(Expr::Call {
                    name: param.clone(),
                    args: Args::new(),
                    span: 0..0,
                }),
                name: param,
                body: Box::new(body),
            };
        }
        Ok(FuncDef { name, params, body })
    }

    fn parse_comma(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_alt()?;
        while self.eat(&Token::Comma) {
            let rhs = self.parse_alt()?;
            lhs = Expr::Comma(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_alt(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_or()?;
        if self.eat(&Token::Alt) {
            let rhs = self.parse_alt()?;
            return Ok(Expr::Alt(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::LtEq) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::GtEq) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        let term = self.parse_postfix()?;
        if self.eat(&Token::As) {
            let name = self.expect_var()?;
            self.expect(&Token::Pipe)?;
            let body = self.parse_pipe()?;
            return Ok(Expr::Bind {
                source: Box::new(term),
                name,
                body: Box::new(body),
            });
        }
        Ok(term)
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut term = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Field(name)) => {
                    let name = name.clone();
                    self.pos += 1;
                    term = Expr::field(term, name);
                }
                Some(Token::Dot) if matches!(self.peek_at(1), Some(Token::Str(_))) => {
                    self.pos += 1;
                    if let Some((Token::Str(key), _)) = self.bump() {
                        term = Expr::field(term, key);
                    }
                }
                Some(Token::Dot) if matches!(self.peek_at(1), Some(Token::LBracket)) => {
                    self.pos += 1;
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    term = self.parse_bracket_suffix(term)?;
                }
                Some(Token::Question) => {
                    self.pos += 1;
                    term = Expr::Try {
                        body: Box::new(term),
                        handler: None,
                    };
                }
                _ => return Ok(term),
            }
        }
    }

    /// After `[`: `]`, `e]`, `e:]`, `:e]` or `e:e]`.
    fn parse_bracket_suffix(&mut self, target: Expr) -> ParseResult<Expr> {
        let target = Box::new(target);
        if self.eat(&Token::RBracket) {
            return Ok(Expr::Iterate(target));
        }
        if self.eat(&Token::Colon) {
            let to = self.parse_pipe()?;
            self.expect(&Token::RBracket)?;
            return Ok(Expr::Slice {
                target,
                from: None,
                to: Some(Box::new(to)),
            });
        }
        let key = self.parse_pipe()?;
        if self.eat(&Token::Colon) {
            let to = if self.check(&Token::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_pipe()?))
            };
            self.expect(&Token::RBracket)?;
            return Ok(Expr::Slice {
                target,
                from: Some(Box::new(key)),
                to,
            });
        }
        self.expect(&Token::RBracket)?;
        Ok(Expr::Index {
            target,
            key: Box::new(key),
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let Some((token, span)) = self.bump() else {
            return Err(self.unexpected());
        };
        match token {
            Token::Dot => match self.peek() {
                Some(Token::Str(key)) => {
                    let key = key.clone();
                    self.pos += 1;
                    Ok(Expr::field(Expr::Identity, key))
                }
                _ => Ok(Expr::Identity),
            },
            Token::DotDot => Ok(Expr::RecurseAll),
            Token::Field(name) => Ok(Expr::field(Expr::Identity, name)),
            Token::Number(n) => Ok(Expr::literal(n)),
            Token::Str(s) => Ok(Expr::literal(s)),
            Token::True => Ok(Expr::literal(true)),
            Token::False => Ok(Expr::literal(false)),
            Token::Null => Ok(Expr::Literal(Value::null())),
            Token::Var(name) => Ok(Expr::Var { name, span }),
            Token::LParen => {
                let inner = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                if self.eat(&Token::RBracket) {
                    return Ok(Expr::Array(None));
                }
                let inner = self.parse_pipe()?;
                self.expect(&Token::RBracket)?;
                Ok(Expr::Array(Some(Box::new(inner))))
            }
            Token::LBrace => self.parse_object(),
            Token::If => self.parse_if(),
            Token::Try => {
                let body = self.parse_postfix()?;
                let handler = if self.eat(&Token::Catch) {
                    Some(Box::new(self.parse_postfix()?))
                } else {
                    None
                };
                Ok(Expr::Try {
                    body: Box::new(body),
                    handler,
                })
            }
            Token::Reduce => self.parse_reduce(),
            Token::Foreach => self.parse_foreach(),
            Token::Def => {
                self.pos -= 1;
                self.parse_pipe()
            }
            Token::Ident(name) => {
                let mut args = Args::new();
                if self.eat(&Token::LParen) {
                    loop {
                        args.push(Arc::new(self.parse_pipe()?));
                        if !self.eat(&Token::Semi) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen)?;
                }
                Ok(Expr::Call { name, args, span })
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    /// After `if`.
    fn parse_if(&mut self) -> ParseResult<Expr> {
        let cond = self.parse_pipe()?;
        self.expect(&Token::Then)?;
        let then = self.parse_pipe()?;
        let otherwise = if self.eat(&Token::Elif) {
            // `elif` is a nested `if` that shares the outer `end`.
            Some(Box::new(self.parse_if()?))
        } else if self.eat(&Token::Else) {
            let otherwise = self.parse_pipe()?;
            self.expect(&Token::End)?;
            Some(Box::new(otherwise))
        } else {
            self.expect(&Token::End)?;
            None
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise,
        })
    }

    /// After `reduce`: `source as $x (init; update)`.
    fn parse_reduce(&mut self) -> ParseResult<Expr> {
        let source = self.parse_postfix()?;
        self.expect(&Token::As)?;
        let name = self.expect_var()?;
        self.expect(&Token::LParen)?;
        let init = self.parse_pipe()?;
        self.expect(&Token::Semi)?;
        let update = self.parse_pipe()?;
        self.expect(&Token::RParen)?;
        Ok(Expr::Reduce {
            source: Box::new(source),
            name,
            init: Box::new(init),
            update: Box::new(update),
        })
    }

    /// After `foreach`: `source as $x (init; update)` or `(init; update; extract)`.
    fn parse_foreach(&mut self) -> ParseResult<Expr> {
        let source = self.parse_postfix()?;
        self.expect(&Token::As)?;
        let name = self.expect_var()?;
        self.expect(&Token::LParen)?;
        let init = self.parse_pipe()?;
        self.expect(&Token::Semi)?;
        let update = self.parse_pipe()?;
        let extract = if self.eat(&Token::Semi) {
            Some(Box::new(self.parse_pipe()?))
        } else {
            None
        };
        self.expect(&Token::RParen)?;
        Ok(Expr::Foreach {
            source: Box::new(source),
            name,
            init: Box::new(init),
            update: Box::new(update),
            extract,
        })
    }

    /// After `{`.
    fn parse_object(&mut self) -> ParseResult<Expr> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(Expr::Object(entries));
        }
        loop {
            entries.push(self.parse_object_entry()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::Object(entries))
    }

    fn parse_object_entry(&mut self) -> ParseResult<(Expr, Expr)> {
        let Some((token, span)) = self.bump() else {
            return Err(self.unexpected());
        };
        let name = match token {
            Token::Var(name) => {
                // `{$x}` is `{"x": $x}`.
                return Ok((Expr::literal(name.as_str()), Expr::Var { name, span }));
            }
            Token::LParen => {
                let key = self.parse_pipe()?;
                self.expect(&Token::RParen)?;
                self.expect(&Token::Colon)?;
                let value = self.parse_object_value()?;
                return Ok((key, value));
            }
            Token::Ident(name) | Token::Str(name) => name,
            other => match other.keyword() {
                Some(kw) => kw.to_owned(),
                None => {
                    self.pos -= 1;
                    return Err(self.unexpected());
                }
            },
        };
        if self.eat(&Token::Colon) {
            let value = self.parse_object_value()?;
            return Ok((Expr::literal(name), value));
        }
        // `{a}` is `{"a": .a}`.
        let value = Expr::field(Expr::Identity, name.as_str());
        Ok((Expr::literal(name), value))
    }

    /// Object values bind tighter than `,`: a postfix term, optionally negated,
    /// optionally piped into further such terms.
    fn parse_object_value(&mut self) -> ParseResult<Expr> {
        let lhs = if self.eat(&Token::Minus) {
            Expr::Neg(Box::new(self.parse_postfix()?))
        } else {
            self.parse_postfix()?
        };
        if self.eat(&Token::Pipe) {
            let rhs = self.parse_object_value()?;
            return Ok(Expr::Pipe(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }
}

#[cfg(test)]
mod tests;
