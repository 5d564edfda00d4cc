use logos::{Lexer as LogosLexer, Logos, Skip};
use smol_str::SmolStr;

use crate::error::TokenErrorKind;
use crate::unescape::unescape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Logos)]
#[logos(error = TokenErrorKind)]
// Whitespaces should be skipped.
#[logos(skip r"[\p{White_Space}]+")]
// Line comments.
#[logos(skip r"//[^\r\n]*")]
pub enum TokenKind<'a> {
    // The followings are *keywords*.
    #[token("break")]
    Break,
    #[token("catch")]
    Catch,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("finally")]
    Finally,
    #[token("for")]
    For,
    #[token("function")]
    Function,
    #[token("if")]
    If,
    #[token("in")]
    In,
    #[token("instanceof")]
    Instanceof,
    #[token("let")]
    Let,
    #[token("new")]
    New,
    #[token("null")]
    Null,
    #[token("of")]
    Of,
    #[token("return")]
    Return,
    #[token("this")]
    This,
    #[token("throw")]
    Throw,
    #[token("true")]
    True,
    #[token("try")]
    Try,
    #[token("typeof")]
    Typeof,
    #[token("var")]
    Var,
    #[token("void")]
    Void,
    #[token("while")]
    While,

    // The followings are *punctuators*.
    #[token("=>")]
    Arrow,
    #[token("===")]
    StrictEquals,
    #[token("!==")]
    StrictNotEquals,
    #[token("==")]
    Equals,
    #[token("!=")]
    NotEquals,
    #[token("<=")]
    LessThanOrEquals,
    #[token(">=")]
    GreaterThanOrEquals,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("??")]
    Nullish,
    #[token("++")]
    Increment,
    #[token("--")]
    Decrement,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    AsteriskAssign,
    #[token("/=")]
    SolidusAssign,
    #[token("=")]
    Assign,
    #[token("<")]
    LeftAngleBracket,
    #[token(">")]
    RightAngleBracket,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Asterisk,
    #[token("/")]
    Solidus,
    #[token("%")]
    Percent,
    #[token("!")]
    Exclamation,
    #[token("?")]
    QuestionMark,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,

    // The followings are identifiers and literals.
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Identifier(&'a str),
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    Number(&'a str),
    #[regex(r"0[xX][0-9a-fA-F]+")]
    HexNumber(&'a str),
    #[regex(r#""([^"\\\r\n]|\\[^\r\n])*""#, |lex| strip(lex.slice()))]
    DoubleQuoted(&'a str),
    #[regex(r#"'([^'\\\r\n]|\\[^\r\n])*'"#, |lex| strip(lex.slice()))]
    SingleQuoted(&'a str),

    // Block comments. This token should never be produced.
    #[regex(r"/\*", handle_comment)]
    _BlockComment,
}

impl TokenKind<'_> {
    /// Returns the unescaped content of a string literal.
    pub fn unescape(&self) -> Option<SmolStr> {
        match self {
            Self::DoubleQuoted(s) | Self::SingleQuoted(s) => unescape(s),
            _ => None,
        }
    }

    /// Keywords may still be used as property names (`obj.new`, `{ default: 1 }`).
    pub fn is_keyword(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Break
                | Catch
                | Const
                | Continue
                | Else
                | False
                | Finally
                | For
                | Function
                | If
                | In
                | Instanceof
                | Let
                | New
                | Null
                | Of
                | Return
                | This
                | Throw
                | True
                | Try
                | Typeof
                | Var
                | Void
                | While
        )
    }

    #[inline]
    pub fn is_assignment_operator(&self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::PlusAssign
                | Self::MinusAssign
                | Self::AsteriskAssign
                | Self::SolidusAssign
        )
    }
}

/// Return the input with the surrounding quotes removed.
fn strip(input: &str) -> &str {
    &input[1..input.len() - 1]
}

fn handle_comment<'a>(lex: &mut LogosLexer<'a, TokenKind<'a>>) -> Result<Skip, TokenErrorKind> {
    let remainder = lex.remainder();
    if let Some(len) = remainder.find("*/") {
        lex.bump(len + 2);
        Ok(Skip)
    } else {
        lex.bump(remainder.len());
        Err(TokenErrorKind::IncompleteComment)
    }
}
