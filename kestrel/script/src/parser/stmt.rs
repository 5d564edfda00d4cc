use std::sync::Arc;

use winnow::combinator::{
    alt, cut_err, delimited, dispatch, empty, fail, opt, peek, preceded, repeat, separated,
    terminated,
};
use winnow::{ModalResult, Parser};

use super::expr::{assignment_expression, expression, function_tail, identifier};
use super::token::{TokenStream, any};
use super::utils::nested;
use crate::ast::*;
use crate::lexer::TokenKind;

pub(super) fn statement(input: &mut TokenStream) -> ModalResult<Stmt> {
    nested(input, |input| {
        dispatch! {peek((any, opt(any)));
            (TokenKind::LeftBrace, _) => block.map(Stmt::Block),
            (TokenKind::Var | TokenKind::Let | TokenKind::Const, _) => {
                terminated(variable_declaration, opt(TokenKind::Semicolon))
            },
            (TokenKind::Function, Some(TokenKind::Identifier(_))) => function_declaration,
            (TokenKind::Return, _) => return_statement,
            (TokenKind::Throw, _) => throw_statement,
            (TokenKind::If, _) => if_statement,
            (TokenKind::While, _) => while_statement,
            (TokenKind::For, _) => for_statement,
            (TokenKind::Break, _) => {
                terminated(TokenKind::Break, opt(TokenKind::Semicolon)).value(Stmt::Break)
            },
            (TokenKind::Continue, _) => {
                terminated(TokenKind::Continue, opt(TokenKind::Semicolon)).value(Stmt::Continue)
            },
            (TokenKind::Try, _) => try_statement,
            (TokenKind::Semicolon, _) => TokenKind::Semicolon.value(Stmt::Empty),
            _ => terminated(expression, opt(TokenKind::Semicolon)).map(Stmt::Expr),
        }
        .parse_next(input)
    })
}

pub(super) fn block(input: &mut TokenStream) -> ModalResult<Vec<Stmt>> {
    delimited(
        TokenKind::LeftBrace,
        repeat(0.., statement),
        cut_err(TokenKind::RightBrace),
    )
    .parse_next(input)
}

fn var_kind(input: &mut TokenStream) -> ModalResult<VarKind> {
    dispatch! {any;
        TokenKind::Var => empty.value(VarKind::Var),
        TokenKind::Let => empty.value(VarKind::Let),
        TokenKind::Const => empty.value(VarKind::Const),
        _ => fail,
    }
    .parse_next(input)
}

fn variable_declaration(input: &mut TokenStream) -> ModalResult<Stmt> {
    (
        var_kind,
        cut_err(separated(1.., declarator, TokenKind::Comma)),
    )
        .map(|(kind, declarations)| Stmt::Var { kind, declarations })
        .parse_next(input)
}

fn declarator(input: &mut TokenStream) -> ModalResult<VarDeclarator> {
    (
        identifier,
        opt(preceded(TokenKind::Assign, cut_err(assignment_expression))),
    )
        .map(|(name, init)| VarDeclarator { name, init })
        .parse_next(input)
}

fn function_declaration(input: &mut TokenStream) -> ModalResult<Stmt> {
    (TokenKind::Function, identifier, function_tail)
        .with_span()
        .map(|((_, name, (params, body)), span)| {
            Stmt::Function(Arc::new(FunctionDef {
                name: Some(name),
                params,
                body,
                arrow: false,
                span,
            }))
        })
        .parse_next(input)
}

fn return_statement(input: &mut TokenStream) -> ModalResult<Stmt> {
    delimited(
        TokenKind::Return,
        opt(expression),
        opt(TokenKind::Semicolon),
    )
    .map(Stmt::Return)
    .parse_next(input)
}

fn throw_statement(input: &mut TokenStream) -> ModalResult<Stmt> {
    delimited(
        TokenKind::Throw,
        cut_err(expression),
        opt(TokenKind::Semicolon),
    )
    .map(Stmt::Throw)
    .parse_next(input)
}

fn condition(input: &mut TokenStream) -> ModalResult<SpannedExpr> {
    cut_err(delimited(
        TokenKind::LeftParen,
        expression,
        TokenKind::RightParen,
    ))
    .parse_next(input)
}

fn if_statement(input: &mut TokenStream) -> ModalResult<Stmt> {
    (
        preceded(TokenKind::If, condition),
        cut_err(statement),
        opt(preceded(TokenKind::Else, cut_err(statement))),
    )
        .map(|(test, consequent, alternate)| Stmt::If {
            test,
            consequent: Box::new(consequent),
            alternate: alternate.map(Box::new),
        })
        .parse_next(input)
}

fn while_statement(input: &mut TokenStream) -> ModalResult<Stmt> {
    (preceded(TokenKind::While, condition), cut_err(statement))
        .map(|(test, body)| Stmt::While {
            test,
            body: Box::new(body),
        })
        .parse_next(input)
}

fn for_statement(input: &mut TokenStream) -> ModalResult<Stmt> {
    preceded(
        (TokenKind::For, cut_err(TokenKind::LeftParen)),
        cut_err(alt((for_each_tail, for_classic_tail))),
    )
    .parse_next(input)
}

/// `[var] name of|in iterable) body`
fn for_each_tail(input: &mut TokenStream) -> ModalResult<Stmt> {
    (
        opt(var_kind),
        identifier,
        alt((TokenKind::Of.value(true), TokenKind::In.value(false))),
        cut_err(terminated(expression, TokenKind::RightParen)),
        cut_err(statement),
    )
        .map(|(kind, name, of, iterable, body)| Stmt::ForEach {
            kind,
            name,
            of,
            iterable,
            body: Box::new(body),
        })
        .parse_next(input)
}

/// `init; test; update) body`
fn for_classic_tail(input: &mut TokenStream) -> ModalResult<Stmt> {
    (
        opt(alt((variable_declaration, expression.map(Stmt::Expr)))),
        TokenKind::Semicolon,
        cut_err(opt(expression)),
        cut_err(TokenKind::Semicolon),
        cut_err(opt(expression)),
        cut_err(TokenKind::RightParen),
        cut_err(statement),
    )
        .map(|(init, _, test, _, update, _, body)| Stmt::For {
            init: init.map(Box::new),
            test,
            update,
            body: Box::new(body),
        })
        .parse_next(input)
}

fn catch_clause(input: &mut TokenStream) -> ModalResult<CatchClause> {
    preceded(
        TokenKind::Catch,
        cut_err((
            opt(delimited(
                TokenKind::LeftParen,
                identifier,
                TokenKind::RightParen,
            )),
            block,
        )),
    )
    .map(|(param, body)| CatchClause { param, body })
    .parse_next(input)
}

type TryParts = (Vec<Stmt>, Option<CatchClause>, Option<Vec<Stmt>>);

fn try_statement(input: &mut TokenStream) -> ModalResult<Stmt> {
    (
        preceded(TokenKind::Try, cut_err(block)),
        opt(catch_clause),
        opt(preceded(TokenKind::Finally, cut_err(block))),
    )
        .verify(|(_, handler, finalizer): &TryParts| handler.is_some() || finalizer.is_some())
        .map(|(block, handler, finalizer)| Stmt::Try {
            block,
            handler,
            finalizer,
        })
        .parse_next(input)
}
