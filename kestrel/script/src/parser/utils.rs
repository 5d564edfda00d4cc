use winnow::combinator::{opt, peek};
use winnow::error::{ContextError, ErrMode};
use winnow::stream::{Location, Stream};
use winnow::{ModalResult, Parser};

use super::token::{TokenStream, any};
use crate::lexer::TokenKind;
use crate::span::Spanned;

pub(super) trait SpannedParserExt<I, O, E>: Parser<I, O, E> + Sized
where
    I: Stream + Location,
{
    /// Wraps the output with the span of the tokens it was parsed from.
    #[inline(always)]
    fn spanned(self) -> impl Parser<I, Spanned<O>, E> {
        self.with_span().map(|(value, span)| Spanned(value, span))
    }
}

impl<I, O, E, P> SpannedParserExt<I, O, E> for P
where
    I: Stream + Location,
    P: Parser<I, O, E>,
{
}

/// Runs `parser` one nesting level deeper, failing irrecoverably past the nesting limit.
pub(super) fn nested<'a, 'b, O>(
    input: &mut TokenStream<'a, 'b>,
    parser: impl FnOnce(&mut TokenStream<'a, 'b>) -> ModalResult<O>,
) -> ModalResult<O> {
    if !input.state.enter() {
        input.state.exit();
        return Err(ErrMode::Cut(ContextError::new()));
    }
    let result = parser(input);
    input.state.exit();
    result
}

/// Returns the kind of the next token without consuming it.
#[inline]
pub(super) fn peek_kind<'a>(input: &mut TokenStream<'a, '_>) -> ModalResult<Option<TokenKind<'a>>> {
    peek(opt(any))
        .map(|kind: Option<&TokenKind<'a>>| kind.copied())
        .parse_next(input)
}

/// Consumes the next token.
#[inline]
pub(super) fn skip(input: &mut TokenStream) -> ModalResult<()> {
    winnow::token::any.void().parse_next(input)
}

/// Consumes the next token if it is `kind`.
#[inline]
pub(super) fn expect<'a>(input: &mut TokenStream<'a, '_>, kind: TokenKind<'a>) -> ModalResult<()> {
    kind.void().parse_next(input)
}
