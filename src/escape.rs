//! Quoted strings of the text graph format.
//!
//! Supported escapes: `\"` `\\` `\'` `\n` `\t` `\r` `\0` `\a` `\b` `\f` `\v`,
//! `\xHH` (ASCII only), `\uHHHH` and `\u{H..}`.

/// Wraps `s` in double quotes, escaping what the parser would misread.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Why a quoted string could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnquoteError {
    /// Input did not start with `"`.
    NotQuoted,

    /// Input ended before the closing `"`.
    Unterminated,

    /// The escape following a backslash, as written.
    InvalidEscape(String),
}

/// Reads a quoted string from `chars`, which must be positioned on the
/// opening quote. Consumes up to and including the closing quote.
pub fn unquote_from<I: Iterator<Item = char>>(chars: &mut I) -> Result<String, UnquoteError> {
    if chars.next() != Some('"') {
        return Err(UnquoteError::NotQuoted);
    }
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(UnquoteError::Unterminated),
            Some('"') => return Ok(out),
            Some('\\') => out.push(unescape(chars)?),
            Some(c) => out.push(c),
        }
    }
}

/// Decodes a whole quoted string; trailing input is rejected.
pub fn unquote(s: &str) -> Result<String, UnquoteError> {
    let mut chars = s.chars();
    let out = unquote_from(&mut chars)?;
    match chars.next() {
        None => Ok(out),
        Some(_) => Err(UnquoteError::Unterminated),
    }
}

fn unescape<I: Iterator<Item = char>>(chars: &mut I) -> Result<char, UnquoteError> {
    let c = chars.next().ok_or(UnquoteError::Unterminated)?;
    let simple = match c {
        '"' => Some('"'),
        '\\' => Some('\\'),
        '\'' => Some('\''),
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '0' => Some('\0'),
        'a' => Some('\x07'),
        'b' => Some('\x08'),
        'f' => Some('\x0c'),
        'v' => Some('\x0b'),
        _ => None,
    };
    if let Some(decoded) = simple {
        return Ok(decoded);
    }

    let mut written = c.to_string();
    let code = match c {
        'x' => {
            let code = hex_digits(chars, 2, &mut written)?;
            if code > 0x7f {
                return Err(UnquoteError::InvalidEscape(written));
            }
            code
        }
        'u' => {
            let mut lookahead = chars.next();
            if lookahead == Some('{') {
                written.push('{');
                let mut code = 0u32;
                let mut digits = 0;
                loop {
                    match chars.next() {
                        Some('}') if digits > 0 => {
                            written.push('}');
                            break;
                        }
                        Some(h) if h.is_ascii_hexdigit() && digits < 6 => {
                            written.push(h);
                            code = code * 16 + h.to_digit(16).unwrap_or(0);
                            digits += 1;
                        }
                        Some(other) => {
                            written.push(other);
                            return Err(UnquoteError::InvalidEscape(written));
                        }
                        None => return Err(UnquoteError::Unterminated),
                    }
                }
                code
            } else {
                let mut rest = std::iter::from_fn(|| lookahead.take()).chain(chars);
                hex_digits(&mut rest, 4, &mut written)?
            }
        }
        _ => return Err(UnquoteError::InvalidEscape(written)),
    };
    char::from_u32(code).ok_or(UnquoteError::InvalidEscape(written))
}

fn hex_digits<I: Iterator<Item = char>>(
    chars: &mut I,
    count: usize,
    written: &mut String,
) -> Result<u32, UnquoteError> {
    let mut code = 0u32;
    for _ in 0..count {
        let h = chars.next().ok_or(UnquoteError::Unterminated)?;
        written.push(h);
        let digit = h
            .to_digit(16)
            .ok_or_else(|| UnquoteError::InvalidEscape(written.clone()))?;
        code = code * 16 + digit;
    }
    Ok(code)
}
