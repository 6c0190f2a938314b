#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use pretty_assertions::assert_eq;

fn parse_ok(source: &str) -> Expr {
    match parse(source) {
        Ok(expr) => expr,
        Err(errors) => panic!("{source}: {errors:?}"),
    }
}

fn parse_err(source: &str) -> Vec<CompileError> {
    match parse(source) {
        Ok(expr) => panic!("{source}: expected an error, got {expr:?}"),
        Err(errors) => errors,
    }
}

#[test]
fn pipe_is_right_associative() {
    let Expr::Pipe(lhs, rhs) = parse_ok(".a | .b | .c") else {
        panic!("expected a pipe");
    };
    assert!(matches!(*lhs, Expr::Index { .. }));
    assert!(matches!(*rhs, Expr::Pipe(..)));
}

#[test]
fn comma_binds_tighter_than_pipe() {
    let Expr::Pipe(lhs, _) = parse_ok("1, 2 | 3") else {
        panic!("expected a pipe");
    };
    assert!(matches!(*lhs, Expr::Comma(..)));
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let Expr::Binary(BinaryOp::Add, _, rhs) = parse_ok("1 + 2 * 3") else {
        panic!("expected an addition");
    };
    assert!(matches!(*rhs, Expr::Binary(BinaryOp::Mul, ..)));
}

#[test]
fn binding_body_extends_to_the_end() {
    let Expr::Comma(_, rhs) = parse_ok("1, . as $x | $x, 2") else {
        panic!("expected a comma");
    };
    let Expr::Bind { name, body, .. } = *rhs else {
        panic!("expected a binding");
    };
    assert_eq!(name, "x");
    assert!(matches!(*body, Expr::Comma(..)));
}

#[test]
fn postfix_chain() {
    let expr = parse_ok(r#".a."b"[0][1:][]?"#);
    let Expr::Try { body, handler: None } = expr else {
        panic!("expected a try");
    };
    let Expr::Iterate(target) = *body else {
        panic!("expected an iteration");
    };
    assert!(matches!(*target, Expr::Slice { from: Some(_), to: None, .. }));
}

#[test]
fn object_shorthands() {
    let Expr::Object(entries) = parse_ok(r#"{a, $b, "c": 1, (.d): 2, if: -3 | 4}"#) else {
        panic!("expected an object");
    };
    assert_eq!(entries.len(), 5);
    assert!(matches!(&entries[0].1, Expr::Index { .. }));
    assert!(matches!(&entries[1].1, Expr::Var { name, .. } if name == "b"));
    assert!(matches!(&entries[3].0, Expr::Index { .. }));
    assert!(matches!(&entries[4].1, Expr::Pipe(..)));
}

#[test]
fn value_parameters_become_bindings() {
    let Expr::Def { def, rest } = parse_ok("def f($a; g): $a; f(1; 2)") else {
        panic!("expected a definition");
    };
    assert_eq!(def.name, "f");
    assert_eq!(def.params, vec!["a".to_owned(), "g".to_owned()]);
    assert!(matches!(def.body, Expr::Bind { .. }));
    assert!(matches!(*rest, Expr::Call { ref args, .. } if args.len() == 2));
}

#[test]
fn definitions_alone_are_identity() {
    let Expr::Def { rest, .. } = parse_ok("def f: 1;") else {
        panic!("expected a definition");
    };
    assert!(matches!(*rest, Expr::Identity));
}

#[test]
fn elif_chains_nest() {
    let Expr::If { otherwise, .. } = parse_ok("if . then 1 elif . then 2 else 3 end") else {
        panic!("expected an if");
    };
    assert!(matches!(otherwise.as_deref(), Some(Expr::If { otherwise: Some(_), .. })));
}

#[test]
fn syntax_error_quotes_the_program() {
    let errors = parse_err("a b");
    assert!(!errors.is_empty());
    assert!(errors.iter().any(|e| e.to_string().contains("a b")));
    assert!(errors[0].message.contains("IDENT b"), "{}", errors[0].message);
}

#[test]
fn unexpected_end_of_file() {
    let errors = parse_err(".[");
    assert_eq!(errors[0].message, "syntax error, unexpected end of file");
    assert_eq!(errors[0].snippet, ".[");
}

#[test]
fn comparisons_do_not_chain() {
    parse_err("1 < 2 < 3");
}

#[test]
fn deep_nesting_does_not_overflow() {
    let depth = 5_000;
    let source = format!("{}1{}", "[".repeat(depth), "]".repeat(depth));
    parse_ok(&source);
}
