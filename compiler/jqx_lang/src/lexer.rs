//! Tokenizer for filter programs.
//!
//! Built on logos. Whitespace and `#` comments are skipped; string literals
//! are cooked with JSON escape rules as they are lexed.

use logos::Logos;

use crate::ast::Span;
use crate::errors::CompileError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r\n]+|#[^\n]*)")]
pub(crate) enum Token {
    // Keywords
    #[token("def")]
    Def,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("end")]
    End,
    #[token("as")]
    As,
    #[token("reduce")]
    Reduce,
    #[token("foreach")]
    Foreach,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Punctuation
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token("|")]
    Pipe,
    #[token(",")]
    Comma,
    #[token("//")]
    Alt,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token("?")]
    Question,

    // Payload tokens
    #[regex(r"\.[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_owned())]
    Field(String),
    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_owned())]
    Var(String),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*(::[a-zA-Z_][a-zA-Z0-9_]*)*", |lex| lex.slice().to_owned())]
    Ident(String),
    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| serde_json::from_str::<String>(lex.slice()).ok())]
    Str(String),
}

impl Token {
    /// Name used in syntax error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Field(name) => format!("FIELD .{name}"),
            Token::Var(name) => format!("'${name}'"),
            Token::Ident(name) => format!("IDENT {name}"),
            Token::Number(_) => "LITERAL".to_owned(),
            Token::Str(_) => "QQSTRING_START".to_owned(),
            other => match other.keyword() {
                Some(kw) => kw.to_owned(),
                None => format!("'{}'", other.punct()),
            },
        }
    }

    /// Keyword spelling, so keywords can still be used as object keys.
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            Token::Def => "def",
            Token::If => "if",
            Token::Then => "then",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::End => "end",
            Token::As => "as",
            Token::Reduce => "reduce",
            Token::Foreach => "foreach",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::And => "and",
            Token::Or => "or",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            _ => return None,
        })
    }

    fn punct(&self) -> &'static str {
        match self {
            Token::Dot => ".",
            Token::DotDot => "..",
            Token::Pipe => "|",
            Token::Comma => ",",
            Token::Alt => "//",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Colon => ":",
            Token::Semi => ";",
            Token::Question => "?",
            _ => "?",
        }
    }
}

/// Tokenize `source`, collecting every unrecognised fragment as an error.
pub(crate) fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<CompileError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                let message = if source[span.clone()].starts_with('"') {
                    "syntax error, unsupported or malformed string literal"
                } else {
                    "syntax error, unexpected INVALID_CHARACTER (Unix shell quoting issues?)"
                };
                errors.push(CompileError::new(source, span, message));
            }
        }
    }
    (tokens, errors)
}
