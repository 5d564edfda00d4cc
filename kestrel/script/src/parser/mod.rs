//! Parser turning script source text into an [`ast::Program`](crate::ast::Program).

mod expr;
mod stmt;
mod token;
mod utils;

use winnow::Parser;
use winnow::combinator::repeat;
use winnow::stream::Stream;

use self::token::{build_token_stream, describe, tokenize};
use crate::ast::{Ident, Program, Stmt};
use crate::error::SyntaxError;

/// Parses a whole program.
pub fn parse_program(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut stream = build_token_stream(&tokens);
    let body: Result<Vec<Stmt>, _> = repeat(0.., stmt::statement).parse_next(&mut stream);
    let offset = tokens.len() - stream.input.eof_offset();
    match body {
        Ok(body) if offset == tokens.len() => Ok(Program { body }),
        _ if stream.state.too_deep() => {
            let span = tokens
                .get(offset)
                .map_or(source.len()..source.len(), |t| t.span.clone());
            Err(SyntaxError::new(
                "Maximum nesting depth exceeded",
                source,
                span,
            ))
        }
        _ => Err(match tokens.get(offset) {
            Some(token) => SyntaxError::new(describe(token), source, token.span.clone()),
            None => SyntaxError::new(
                "Unexpected end of input",
                source,
                source.len()..source.len(),
            ),
        }),
    }
}

/// Parses a function from a comma separated parameter list and a body, the way the `Function`
/// constructor does.
pub fn parse_function(params: &str, body: &str) -> Result<(Vec<Ident>, Program), SyntaxError> {
    let names = if params.trim().is_empty() {
        Vec::new()
    } else {
        params
            .split(',')
            .map(|param| {
                let name = param.trim();
                let valid = name
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
                if valid {
                    Ok(Ident::new(name))
                } else {
                    Err(SyntaxError::new(
                        format!("Invalid parameter name '{name}'"),
                        params,
                        0..params.len(),
                    ))
                }
            })
            .collect::<Result<_, _>>()?
    };
    let program = parse_program(body)?;
    Ok((names, program))
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::ast::{BinaryOp, Expr, LogicalOp, VarKind};

    fn parse_expr(source: &str) -> Expr {
        let program = parse_program(source).unwrap();
        match program.body.as_slice() {
            [Stmt::Expr(expr)] => expr.0.clone(),
            other => panic!("expected a single expression statement, got {other:?}"),
        }
    }

    fn parse_err(source: &str) -> String {
        let err = parse_program(source).unwrap_err();
        let (line, column) = err.position();
        format!("{}:{}: {}", line, column, err.message())
    }

    #[test]
    fn test_precedence() {
        let Expr::Binary { op, left, right } = parse_expr("1 + 2 * 3") else {
            panic!("expected a binary expression");
        };
        assert_eq!(op, BinaryOp::Add);
        assert_eq!(left.0, Expr::Number(1.0));
        assert!(matches!(right.0, Expr::Binary { op: BinaryOp::Mul, .. }));

        let Expr::Logical { op, left, .. } = parse_expr("a && b || c") else {
            panic!("expected a logical expression");
        };
        assert_eq!(op, LogicalOp::Or);
        assert!(matches!(left.0, Expr::Logical { op: LogicalOp::And, .. }));
    }

    #[test]
    fn test_left_associativity() {
        let Expr::Binary { op, left, right } = parse_expr("10 - 4 - 3") else {
            panic!("expected a binary expression");
        };
        assert_eq!(op, BinaryOp::Sub);
        assert!(matches!(left.0, Expr::Binary { op: BinaryOp::Sub, .. }));
        assert_eq!(right.0, Expr::Number(3.0));
    }

    #[test]
    fn test_member_call_chain() {
        let Expr::Call { callee, args } = parse_expr("db._collection('c').count()") else {
            panic!("expected a call");
        };
        assert!(args.is_empty());
        let Expr::Member { object, property } = &callee.0 else {
            panic!("expected a member access");
        };
        assert_eq!(property, "count");
        assert!(matches!(object.0, Expr::Call { .. }));
    }

    #[test]
    fn test_arrow_and_function_expressions() {
        let Expr::Function(def) = parse_expr("(a, b) => a + b") else {
            panic!("expected a function");
        };
        assert!(def.arrow);
        assert_eq!(def.params, vec!["a", "b"]);
        assert!(matches!(def.body.as_slice(), [Stmt::Return(Some(_))]));

        let Expr::Call { callee, args } = parse_expr("(function (params) { return params; })(p)")
        else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 1);
        let Expr::Function(def) = &callee.0 else {
            panic!("expected a function");
        };
        assert!(!def.arrow);
        assert_eq!(def.name, None);
    }

    #[test]
    fn test_object_literal() {
        let Expr::Object(properties) = parse_expr("({ a: 1, 'b c': 2, new: 3, d, e() { }, })")
        else {
            panic!("expected an object literal");
        };
        let keys: Vec<_> = properties.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b c", "new", "d", "e"]);
    }

    #[test]
    fn test_statements() {
        let program = parse_program(
            r"
            var x = 1, y;
            for (let i = 0; i < 3; i++) { x += i }
            for (const k in obj) continue
            while (false) break;
            try { throw new Error('x') } catch (e) { } finally { }
            if (x) y = 1; else y = 2
            function f(a) { return a }
            ;
            ",
        )
        .unwrap();
        assert_eq!(program.body.len(), 8);
        assert!(matches!(program.body[2], Stmt::ForEach { of: false, .. }));
        assert!(matches!(program.body[7], Stmt::Empty));
    }

    #[test]
    fn test_string_literals_and_jump_statements() {
        assert_eq!(parse_expr("'single'"), Expr::String("single".into()));
        assert_eq!(parse_expr(r#""double""#), Expr::String("double".into()));

        let program = parse_program("let a = 1; const b = 2; while (a) { break; continue }")
            .unwrap();
        assert!(matches!(
            program.body[0],
            Stmt::Var {
                kind: VarKind::Let,
                ..
            }
        ));
        assert!(matches!(
            program.body[1],
            Stmt::Var {
                kind: VarKind::Const,
                ..
            }
        ));
        let Stmt::While { body, .. } = &program.body[2] else {
            panic!("expected a while loop");
        };
        let Stmt::Block(statements) = body.as_ref() else {
            panic!("expected a block");
        };
        assert!(matches!(statements.as_slice(), [Stmt::Break, Stmt::Continue]));
    }

    #[test]
    fn test_syntax_errors() {
        assert_snapshot!(parse_err("var = 1"), @"1:5: Unexpected token '='");
        assert_snapshot!(parse_err("return (function () {"), @"1:22: Unexpected end of input");
        assert_snapshot!(parse_err("a +\n}"), @"2:1: Unexpected token '}'");
        assert_snapshot!(parse_err("x = 'unterminated"), @"1:5: Invalid or unexpected token");
        assert_snapshot!(parse_err("try { }"), @"1:1: Unexpected token 'try'");
        assert_snapshot!(parse_err("var 1"), @"1:5: Unexpected number");
        assert_snapshot!(parse_err("1 )"), @"1:3: Unexpected token ')'");
    }

    #[test]
    fn test_nesting_limit() {
        let source = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        let err = parse_program(&source).unwrap_err();
        assert_eq!(err.message(), "Maximum nesting depth exceeded");
    }

    #[test]
    fn test_parse_function() {
        let (params, program) = parse_function("params", "return (params);").unwrap();
        assert_eq!(params, vec!["params"]);
        assert_eq!(program.body.len(), 1);
        assert!(parse_function("a b", "").is_err());
        assert!(parse_function("", "").unwrap().0.is_empty());
    }
}
