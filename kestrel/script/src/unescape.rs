use itertools::Itertools;
use smol_str::{SmolStr, SmolStrBuilder};

/// Resolves the escape sequences of a string literal body.
///
/// Returns `None` if a `\x` or `\u` escape is malformed.
pub fn unescape(mut input: &str) -> Option<SmolStr> {
    let mut builder = SmolStrBuilder::new();
    while let Some(pos) = input.find('\\') {
        let (first, last) = input.split_at(pos);
        builder.push_str(first);
        let mut char_indices = last.char_indices();
        let ((_, _), (_, next)) = char_indices.next_tuple()?;
        let consumed = match next {
            'n' => push(&mut builder, '\n'),
            't' => push(&mut builder, '\t'),
            'r' => push(&mut builder, '\r'),
            'b' => push(&mut builder, '\x08'),
            'f' => push(&mut builder, '\x0c'),
            'v' => push(&mut builder, '\x0b'),
            '0' => push(&mut builder, '\0'),
            'x' => {
                builder.push(hex_char(last.get(2..4)?)?);
                4
            }
            'u' => {
                builder.push(hex_char(last.get(2..6)?)?);
                6
            }
            other => {
                builder.push(other);
                1 + other.len_utf8()
            }
        };
        input = &last[consumed..];
    }
    builder.push_str(input);
    Some(builder.finish())
}

#[inline]
fn push(builder: &mut SmolStrBuilder, c: char) -> usize {
    builder.push(c);
    2
}

fn hex_char(digits: &str) -> Option<char> {
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
}
