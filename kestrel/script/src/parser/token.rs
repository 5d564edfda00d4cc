use std::ops::Range;

use logos::Logos;
use winnow::error::ParserError;
use winnow::stream::{Location, Stream, StreamIsPartial, TokenSlice};
use winnow::{Parser, Stateful};

use crate::error::SyntaxError;
use crate::lexer::TokenKind;

/// Deepest nesting of expressions and statements the parser accepts.
pub(super) const MAX_NESTING_DEPTH: usize = 64;

/// A wrapper around [`winnow::token::any`] to return [`TokenKind`] directly.
///
/// If the matched token itself is needed, use [`winnow::token::any`] instead.
#[inline(always)]
pub(super) fn any<'a: 'b, 'b, I, E>(input: &mut I) -> Result<&'b TokenKind<'a>, E>
where
    I: Stream<Token = &'b Token<'a>> + StreamIsPartial,
    E: ParserError<I>,
{
    winnow::token::any
        .map(|t: &Token| &t.kind)
        .parse_next(input)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Token<'a> {
    pub(super) kind: TokenKind<'a>,
    pub(super) slice: &'a str,
    pub(super) span: Range<usize>,
}

impl<'a, 'b, I, E> Parser<I, I::Token, E> for TokenKind<'a>
where
    I: Stream<Token = &'b Token<'a>> + StreamIsPartial,
    E: ParserError<I>,
{
    #[inline(always)]
    fn parse_next(&mut self, i: &mut I) -> Result<I::Token, E> {
        winnow::token::any
            .verify(|t: &Token| t.kind.eq(self))
            .parse_next(i)
    }
}

impl Location for Token<'_> {
    #[inline(always)]
    fn previous_token_end(&self) -> usize {
        self.span.end
    }

    #[inline(always)]
    fn current_token_start(&self) -> usize {
        self.span.start
    }
}

#[derive(Debug, Default)]
pub(super) struct State {
    depth: usize,
    too_deep: bool,
}

impl State {
    /// Enters one nesting level, returning `false` once the limit is exceeded.
    pub(super) fn enter(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.too_deep = true;
        }
        !self.too_deep
    }

    pub(super) fn exit(&mut self) {
        self.depth -= 1;
    }

    pub(super) fn too_deep(&self) -> bool {
        self.too_deep
    }
}

pub(super) type TokenStream<'a, 'b> = Stateful<TokenSlice<'b, Token<'a>>, State>;

pub(super) fn tokenize(input: &str) -> Result<Vec<Token<'_>>, SyntaxError> {
    let mut lexer = TokenKind::lexer(input).spanned();
    let mut tokens = Vec::new();
    while let Some((kind, span)) = lexer.next() {
        match kind {
            Ok(kind) => {
                let slice = lexer.slice();
                tokens.push(Token { kind, slice, span });
            }
            Err(e) => {
                return Err(SyntaxError::from_tokenize_error(e, input, span));
            }
        }
    }
    Ok(tokens)
}

pub(super) fn build_token_stream<'a, 'b>(input: &'b [Token<'a>]) -> TokenStream<'a, 'b> {
    Stateful {
        input: TokenSlice::new(input),
        state: State::default(),
    }
}

/// Describes a token the way syntax errors mention it.
pub(super) fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier(name) => format!("Unexpected identifier '{name}'"),
        TokenKind::Number(_) | TokenKind::HexNumber(_) => "Unexpected number".to_string(),
        TokenKind::DoubleQuoted(_) | TokenKind::SingleQuoted(_) => {
            "Unexpected string".to_string()
        }
        _ => format!("Unexpected token '{}'", token.slice),
    }
}
