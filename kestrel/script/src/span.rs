//! Contains the definition of [`Spanned`], an AST wrapper providing span information.

use std::ops::Range;

/// A wrapper around a value that contains its byte span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T>(pub T, pub Range<usize>);

impl<T> Spanned<T> {
    /// Returns the span of the value.
    #[inline(always)]
    pub fn span(&self) -> Range<usize> {
        self.1.clone()
    }

    /// Returns the inner value.
    #[inline(always)]
    pub fn value(&self) -> &T {
        &self.0
    }

    pub fn map<F, O>(self, f: F) -> Spanned<O>
    where
        F: FnOnce(T) -> O,
    {
        let Spanned(value, span) = self;
        Spanned(f(value), span)
    }
}

/// Translates a byte offset into a 1-based `(line, column)` pair, counting columns in characters.
///
/// Offsets past the end of `input` resolve to the position right after the last character.
pub fn line_column(input: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (index, c) in input.char_indices() {
        if index >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::line_column;

    #[test]
    fn test_line_column() {
        let input = "\nThis\nis\na\nmulti-line\nstring.\n";
        assert_eq!(line_column(input, 0), (1, 1));
        assert_eq!(line_column(input, 7), (3, 2));
        assert_eq!(line_column(input, input.len()), (7, 1));
    }

    #[test]
    fn test_line_column_utf8() {
        let input = "这是\n一个\r\n多行\n\n字符串\r.";
        let offset = input.find("串").unwrap();
        assert_eq!(line_column(input, offset), (5, 3));
    }
}
