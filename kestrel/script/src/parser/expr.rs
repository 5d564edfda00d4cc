use std::sync::Arc;

use winnow::combinator::{alt, cut_err, delimited, dispatch, fail, opt, peek, preceded, separated, terminated};
use winnow::stream::Location;
use winnow::{ModalResult, Parser};

use super::stmt::block;
use super::token::{Token, TokenStream, any};
use super::utils::{SpannedParserExt, expect, nested, peek_kind, skip};
use crate::ast::*;
use crate::lexer::TokenKind;
use crate::span::Spanned;

pub(super) fn expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    assignment_expression(input)
}

pub(super) fn assignment_expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    nested(input, |input| {
        alt((arrow_function, conditional_expression)).parse_next(input)
    })
}

pub(super) fn identifier(input: &mut TokenStream) -> ModalResult<Ident> {
    any.verify_map(|kind: &TokenKind| match kind {
        TokenKind::Identifier(name) => Some(Ident::new(name)),
        _ => None,
    })
    .parse_next(input)
}

pub(super) fn parameters(input: &mut TokenStream) -> ModalResult<Vec<Ident>> {
    delimited(
        TokenKind::LeftParen,
        terminated(
            separated(0.., identifier, TokenKind::Comma),
            opt(TokenKind::Comma),
        ),
        TokenKind::RightParen,
    )
    .parse_next(input)
}

/// Parses the `( ... )` parameter list and `{ ... }` body following the `function` keyword (and
/// its optional name).
pub(super) fn function_tail(input: &mut TokenStream) -> ModalResult<(Vec<Ident>, Vec<Stmt>)> {
    (cut_err(parameters), cut_err(block)).parse_next(input)
}

fn conditional_expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    let test = binary_expression(input, 1)?;
    match peek_kind(input)? {
        Some(kind) if kind.is_assignment_operator() => {
            let op = assign_operator(&kind);
            skip(input)?;
            let value = cut_err(assignment_expression).parse_next(input)?;
            let span = test.1.start..value.1.end;
            let expr = Expr::Assign {
                op,
                target: Box::new(test),
                value: Box::new(value),
            };
            Ok(Spanned(expr, span))
        }
        Some(TokenKind::QuestionMark) => {
            skip(input)?;
            let consequent = cut_err(assignment_expression).parse_next(input)?;
            cut_err(|input: &mut TokenStream| expect(input, TokenKind::Colon)).parse_next(input)?;
            let alternate = cut_err(assignment_expression).parse_next(input)?;
            let span = test.1.start..alternate.1.end;
            let expr = Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            };
            Ok(Spanned(expr, span))
        }
        _ => Ok(test),
    }
}

fn assign_operator(kind: &TokenKind) -> AssignOp {
    match kind {
        TokenKind::PlusAssign => AssignOp::Add,
        TokenKind::MinusAssign => AssignOp::Sub,
        TokenKind::AsteriskAssign => AssignOp::Mul,
        TokenKind::SolidusAssign => AssignOp::Div,
        _ => AssignOp::Assign,
    }
}

fn arrow_function(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    (
        alt((identifier.map(|name| vec![name]), parameters)),
        TokenKind::Arrow,
        cut_err(arrow_body),
    )
        .with_span()
        .map(|((params, _, body), span)| {
            let def = FunctionDef {
                name: None,
                params,
                body,
                arrow: true,
                span: span.clone(),
            };
            Spanned(Expr::Function(Arc::new(def)), span)
        })
        .parse_next(input)
}

fn arrow_body(input: &mut TokenStream) -> ModalResult<Vec<Stmt>> {
    dispatch! {peek(any);
        TokenKind::LeftBrace => block,
        _ => assignment_expression.map(|expr| vec![Stmt::Return(Some(expr))]),
    }
    .parse_next(input)
}

#[derive(Debug, Clone, Copy)]
enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Binding power of infix operators; higher binds tighter.
fn infix_operator(kind: TokenKind) -> Option<(u8, Operator)> {
    use Operator::{Binary, Logical};
    let operator = match kind {
        TokenKind::Or => (1, Logical(LogicalOp::Or)),
        TokenKind::Nullish => (1, Logical(LogicalOp::Nullish)),
        TokenKind::And => (2, Logical(LogicalOp::And)),
        TokenKind::Equals => (3, Binary(BinaryOp::Eq)),
        TokenKind::NotEquals => (3, Binary(BinaryOp::Ne)),
        TokenKind::StrictEquals => (3, Binary(BinaryOp::StrictEq)),
        TokenKind::StrictNotEquals => (3, Binary(BinaryOp::StrictNe)),
        TokenKind::LeftAngleBracket => (4, Binary(BinaryOp::Lt)),
        TokenKind::LessThanOrEquals => (4, Binary(BinaryOp::Le)),
        TokenKind::RightAngleBracket => (4, Binary(BinaryOp::Gt)),
        TokenKind::GreaterThanOrEquals => (4, Binary(BinaryOp::Ge)),
        TokenKind::Instanceof => (4, Binary(BinaryOp::Instanceof)),
        TokenKind::In => (4, Binary(BinaryOp::In)),
        TokenKind::Plus => (5, Binary(BinaryOp::Add)),
        TokenKind::Minus => (5, Binary(BinaryOp::Sub)),
        TokenKind::Asterisk => (6, Binary(BinaryOp::Mul)),
        TokenKind::Solidus => (6, Binary(BinaryOp::Div)),
        TokenKind::Percent => (6, Binary(BinaryOp::Mod)),
        _ => return None,
    };
    Some(operator)
}

/// Precedence climbing over left-associative infix operators.
fn binary_expression(input: &mut TokenStream, min_power: u8) -> ModalResult<SpannedExpr> {
    let mut left = unary_expression(input)?;
    loop {
        let Some((power, operator)) = peek_kind(input)?.and_then(infix_operator) else {
            break;
        };
        if power < min_power {
            break;
        }
        skip(input)?;
        let right = cut_err(|input: &mut TokenStream| {
            nested(input, |input| binary_expression(input, power + 1))
        })
        .parse_next(input)?;
        let span = left.1.start..right.1.end;
        let (left_expr, right_expr) = (Box::new(left), Box::new(right));
        let expr = match operator {
            Operator::Binary(op) => Expr::Binary {
                op,
                left: left_expr,
                right: right_expr,
            },
            Operator::Logical(op) => Expr::Logical {
                op,
                left: left_expr,
                right: right_expr,
            },
        };
        left = Spanned(expr, span);
    }
    Ok(left)
}

fn unary_expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    let start = input.current_token_start();
    let op = match peek_kind(input)? {
        Some(TokenKind::Exclamation) => UnaryOp::Not,
        Some(TokenKind::Minus) => UnaryOp::Minus,
        Some(TokenKind::Plus) => UnaryOp::Plus,
        Some(TokenKind::Typeof) => UnaryOp::Typeof,
        Some(TokenKind::Void) => UnaryOp::Void,
        Some(kind @ (TokenKind::Increment | TokenKind::Decrement)) => {
            skip(input)?;
            let target = cut_err(|input: &mut TokenStream| nested(input, unary_expression))
                .parse_next(input)?;
            let span = start..target.1.end;
            let op = if kind == TokenKind::Increment {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            let expr = Expr::Update {
                op,
                prefix: true,
                target: Box::new(target),
            };
            return Ok(Spanned(expr, span));
        }
        _ => return postfix_expression(input),
    };
    skip(input)?;
    let operand =
        cut_err(|input: &mut TokenStream| nested(input, unary_expression)).parse_next(input)?;
    let span = start..operand.1.end;
    let expr = Expr::Unary {
        op,
        operand: Box::new(operand),
    };
    Ok(Spanned(expr, span))
}

fn postfix_expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    let target = call_expression(input)?;
    let op = match peek_kind(input)? {
        Some(TokenKind::Increment) => UpdateOp::Increment,
        Some(TokenKind::Decrement) => UpdateOp::Decrement,
        _ => return Ok(target),
    };
    skip(input)?;
    let span = target.1.start..input.previous_token_end();
    let expr = Expr::Update {
        op,
        prefix: false,
        target: Box::new(target),
    };
    Ok(Spanned(expr, span))
}

enum Suffix {
    Member(Ident),
    Index(SpannedExpr),
    Call(Vec<SpannedExpr>),
}

fn call_expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    let callee = primary_expression(input)?;
    suffixes(input, callee, true)
}

/// Member accesses and calls following `callee`. Calls are left out for the callee of `new`.
fn suffixes(
    input: &mut TokenStream,
    mut expr: SpannedExpr,
    allow_call: bool,
) -> ModalResult<SpannedExpr> {
    loop {
        let suffix = match peek_kind(input)? {
            Some(TokenKind::Period) => preceded(TokenKind::Period, cut_err(property_name))
                .map(Suffix::Member)
                .parse_next(input)?,
            Some(TokenKind::LeftBracket) => delimited(
                TokenKind::LeftBracket,
                cut_err(expression),
                cut_err(TokenKind::RightBracket),
            )
            .map(Suffix::Index)
            .parse_next(input)?,
            Some(TokenKind::LeftParen) if allow_call => {
                arguments.map(Suffix::Call).parse_next(input)?
            }
            _ => break,
        };
        let span = expr.1.start..input.previous_token_end();
        let object = Box::new(expr);
        let next = match suffix {
            Suffix::Member(property) => Expr::Member { object, property },
            Suffix::Index(index) => Expr::Index {
                object,
                index: Box::new(index),
            },
            Suffix::Call(args) => Expr::Call {
                callee: object,
                args,
            },
        };
        expr = Spanned(next, span);
    }
    Ok(expr)
}

fn arguments(input: &mut TokenStream) -> ModalResult<Vec<SpannedExpr>> {
    delimited(
        TokenKind::LeftParen,
        terminated(
            separated(0.., assignment_expression, TokenKind::Comma),
            opt(TokenKind::Comma),
        ),
        cut_err(TokenKind::RightParen),
    )
    .parse_next(input)
}

fn primary_expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    dispatch! {peek(any);
        TokenKind::Number(_) | TokenKind::HexNumber(_) => number.map(Expr::Number).spanned(),
        TokenKind::DoubleQuoted(_) | TokenKind::SingleQuoted(_) => {
            string.map(Expr::String).spanned()
        },
        TokenKind::True => TokenKind::True.value(Expr::Bool(true)).spanned(),
        TokenKind::False => TokenKind::False.value(Expr::Bool(false)).spanned(),
        TokenKind::Null => TokenKind::Null.value(Expr::Null).spanned(),
        TokenKind::This => TokenKind::This.value(Expr::This).spanned(),
        TokenKind::Identifier(_) => identifier.map(Expr::Ident).spanned(),
        TokenKind::LeftParen => delimited(
            TokenKind::LeftParen,
            expression,
            cut_err(TokenKind::RightParen),
        ),
        TokenKind::LeftBracket => array_literal,
        TokenKind::LeftBrace => object_literal,
        TokenKind::Function => function_expression,
        TokenKind::New => new_expression,
        _ => fail,
    }
    .parse_next(input)
}

fn number(input: &mut TokenStream) -> ModalResult<f64> {
    any.verify_map(|kind: &TokenKind| match kind {
        TokenKind::Number(s) => s.parse::<f64>().ok(),
        TokenKind::HexNumber(s) => u64::from_str_radix(&s[2..], 16).ok().map(|n| n as f64),
        _ => None,
    })
    .parse_next(input)
}

fn string(input: &mut TokenStream) -> ModalResult<Ident> {
    any.verify_map(|kind: &TokenKind| kind.unescape())
        .parse_next(input)
}

/// A name after `.`, where keywords are allowed.
fn property_name(input: &mut TokenStream) -> ModalResult<Ident> {
    winnow::token::any
        .verify_map(|token: &Token| match token.kind {
            TokenKind::Identifier(name) => Some(Ident::new(name)),
            kind if kind.is_keyword() => Some(Ident::new(token.slice)),
            _ => None,
        })
        .parse_next(input)
}

fn array_literal(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    delimited(
        TokenKind::LeftBracket,
        terminated(
            separated(0.., assignment_expression, TokenKind::Comma),
            opt(TokenKind::Comma),
        ),
        cut_err(TokenKind::RightBracket),
    )
    .map(Expr::Array)
    .spanned()
    .parse_next(input)
}

fn object_literal(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    delimited(
        TokenKind::LeftBrace,
        terminated(
            separated(0.., property, TokenKind::Comma),
            opt(TokenKind::Comma),
        ),
        cut_err(TokenKind::RightBrace),
    )
    .map(Expr::Object)
    .spanned()
    .parse_next(input)
}

/// Returns the key and whether it was written as a plain identifier.
fn property_key(input: &mut TokenStream) -> ModalResult<(Ident, bool)> {
    alt((
        identifier.map(|name| (name, true)),
        property_name.map(|name| (name, false)),
        string.map(|key| (key, false)),
        number.map(|n| (Ident::new(crate::value::number_to_string(n)), false)),
    ))
    .parse_next(input)
}

fn property(input: &mut TokenStream) -> ModalResult<Property> {
    let ((key, shorthand), key_span) = property_key.with_span().parse_next(input)?;
    match peek_kind(input)? {
        Some(TokenKind::Colon) => {
            let value = preceded(TokenKind::Colon, cut_err(assignment_expression)).parse_next(input)?;
            Ok(Property { key, value })
        }
        Some(TokenKind::LeftParen) => {
            let (params, body) = function_tail(input)?;
            let span = key_span.start..input.previous_token_end();
            let def = FunctionDef {
                name: Some(key.clone()),
                params,
                body,
                arrow: false,
                span: span.clone(),
            };
            let value = Spanned(Expr::Function(Arc::new(def)), span);
            Ok(Property { key, value })
        }
        _ if shorthand => {
            let value = Spanned(Expr::Ident(key.clone()), key_span);
            Ok(Property { key, value })
        }
        _ => fail.parse_next(input),
    }
}

fn function_expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    (TokenKind::Function, opt(identifier), function_tail)
        .with_span()
        .map(|((_, name, (params, body)), span)| {
            let def = FunctionDef {
                name,
                params,
                body,
                arrow: false,
                span: span.clone(),
            };
            Spanned(Expr::Function(Arc::new(def)), span)
        })
        .parse_next(input)
}

fn new_expression(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    let start = input.current_token_start();
    expect(input, TokenKind::New)?;
    let callee = cut_err(primary_expression).parse_next(input)?;
    let callee = suffixes(input, callee, false)?;
    let args = opt(arguments).parse_next(input)?.unwrap_or_default();
    let span = start..input.previous_token_end();
    let expr = Expr::New {
        callee: Box::new(callee),
        args,
    };
    Ok(Spanned(expr, span))
}
