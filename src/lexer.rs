//! Tokenization. A source string becomes a flat token stream terminated by
//! [`TokenKind::Eof`]; every token carries its 1-based source column so
//! later stages can point at the offending location. Comments run from `#`
//! to end of line or between `(*` and the first `*)`.
//!
//! Two context-sensitive rules shape the scanner: a `-` starts a number
//! only when a digit follows (otherwise it is an ordinary atom character),
//! and a `.` joins an atom only when an atom character follows it — so
//! `.s` and `module.member` are single atoms while a statement-terminating
//! `.` stands alone.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char as chr, digit1, multispace1, one_of},
    combinator::{opt, recognize, rest},
    multi::many0,
    sequence::{pair, preceded, terminated},
    IResult, Parser,
};

use crate::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Atom(String),
    Int(i64),
    Float(f64),
    /// Character literal, stored as its code point.
    Char(i64),
    Str(String),
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Semi,
    /// The `==` separating a definition name from its body.
    EqDef,
    /// `DEFINE`, `LIBRA` or `PUBLIC`.
    Define,
    /// `HIDE` or `PRIVATE`.
    Hide,
    In,
    End,
    Module,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based character column; reset at every newline.
    pub column: usize,
}

/// Scan a complete source string into tokens. The result always ends with
/// an Eof token.
pub fn lex(source: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut remaining = source;
    let mut column = 1usize;
    loop {
        let after = skip_trivia(remaining);
        advance_column(&mut column, &remaining[..remaining.len() - after.len()]);
        remaining = after;
        if remaining.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                column,
            });
            return Ok(tokens);
        }
        let col = column;
        let (after, kind) = scan_token(remaining, col)?;
        advance_column(&mut column, &remaining[..remaining.len() - after.len()]);
        remaining = after;
        tokens.push(Token { kind, column: col });
    }
}

fn advance_column(column: &mut usize, consumed: &str) {
    for ch in consumed.chars() {
        if ch == '\n' {
            *column = 1;
        } else {
            *column += 1;
        }
    }
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(chr('#'), take_while(|c| c != '\n'))).parse(input)
}

/// `(* ... *)`; the first `*)` closes. An unterminated comment consumes
/// the remainder of the source.
fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(preceded(
        tag("(*"),
        alt((terminated(take_until("*)"), tag("*)")), rest)),
    ))
    .parse(input)
}

fn skip_trivia(input: &str) -> &str {
    let result: IResult<&str, &str> =
        recognize(many0(alt((multispace1, line_comment, block_comment)))).parse(input);
    match result {
        Ok((after, _)) => after,
        Err(_) => input,
    }
}

fn is_atom_char(ch: char) -> bool {
    !ch.is_whitespace()
        && !matches!(
            ch,
            '[' | ']' | '{' | '}' | '(' | ')' | ';' | '"' | '\'' | '#'
        )
}

fn scan_token(input: &str, col: usize) -> Result<(&str, TokenKind), Error> {
    let mut chars = input.chars();
    let first = chars.next().expect("scan_token called on empty input");
    match first {
        '[' => Ok((chars.as_str(), TokenKind::LBracket)),
        ']' => Ok((chars.as_str(), TokenKind::RBracket)),
        '{' => Ok((chars.as_str(), TokenKind::LBrace)),
        '}' => Ok((chars.as_str(), TokenKind::RBrace)),
        ';' => Ok((chars.as_str(), TokenKind::Semi)),
        '.' => match chars.clone().next() {
            // `.s` is an operator atom; a bare `.` terminates statements
            Some(next) if next != '.' && is_atom_char(next) => scan_atom(input),
            _ => Ok((chars.as_str(), TokenKind::Dot)),
        },
        '\'' => scan_char(chars.as_str(), col),
        '"' => Ok(scan_string(chars.as_str())),
        '0'..='9' => scan_number(input, col),
        '-' if matches!(chars.clone().next(), Some('0'..='9')) => scan_number(input, col),
        ch if is_atom_char(ch) => scan_atom(input),
        ch => Err(Error::at(col, format!("unexpected character: {ch}"))),
    }
}

fn scan_number(input: &str, col: usize) -> Result<(&str, TokenKind), Error> {
    let parsed: IResult<&str, &str> = recognize((
        opt(chr('-')),
        digit1,
        opt(recognize(pair(chr('.'), digit1))),
        opt(recognize((one_of("eE"), opt(one_of("+-")), digit1))),
    ))
    .parse(input);
    let (after, text) = parsed.map_err(|_| Error::at(col, "invalid number"))?;
    if text.contains('.') || text.contains('e') || text.contains('E') {
        match text.parse::<f64>() {
            Ok(x) => Ok((after, TokenKind::Float(x))),
            Err(_) => Err(Error::at(col, format!("invalid float: {text}"))),
        }
    } else {
        match text.parse::<i64>() {
            Ok(n) => Ok((after, TokenKind::Int(n))),
            Err(_) => Err(Error::at(col, format!("invalid integer: {text}"))),
        }
    }
}

/// Escape body after the backslash: the usual control letters, quotes, or
/// 1-3 decimal digits naming a code point.
fn scan_escape(input: &str) -> (&str, char) {
    let mut chars = input.chars();
    match chars.next() {
        None => ("", '\\'),
        Some('n') => (chars.as_str(), '\n'),
        Some('t') => (chars.as_str(), '\t'),
        Some('b') => (chars.as_str(), '\u{8}'),
        Some('r') => (chars.as_str(), '\r'),
        Some('f') => (chars.as_str(), '\u{c}'),
        Some(ch @ ('\'' | '"' | '\\')) => (chars.as_str(), ch),
        Some(ch @ '0'..='9') => {
            let mut code = ch as u32 - '0' as u32;
            let mut after = chars.as_str();
            for _ in 0..2 {
                match after.chars().next() {
                    Some(d @ '0'..='9') => {
                        code = code * 10 + (d as u32 - '0' as u32);
                        after = &after[1..];
                    }
                    _ => break,
                }
            }
            (
                after,
                char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
            )
        }
        Some(ch) => (chars.as_str(), ch),
    }
}

/// `input` starts just after the opening apostrophe.
fn scan_char(input: &str, col: usize) -> Result<(&str, TokenKind), Error> {
    let mut chars = input.chars();
    match chars.next() {
        None => Err(Error::at(col, "unexpected end of input after '")),
        Some('\\') => {
            let (after, ch) = scan_escape(chars.as_str());
            Ok((after, TokenKind::Char(ch as i64)))
        }
        Some(ch) => Ok((chars.as_str(), TokenKind::Char(ch as i64))),
    }
}

/// `input` starts just after the opening quote. An unterminated string
/// consumes to end of input with the text collected so far.
fn scan_string(input: &str) -> (&str, TokenKind) {
    let mut remaining = input;
    let mut text = String::new();
    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            None => return ("", TokenKind::Str(text)),
            Some('"') => return (chars.as_str(), TokenKind::Str(text)),
            Some('\\') => {
                let (after, ch) = scan_escape(chars.as_str());
                text.push(ch);
                remaining = after;
            }
            Some(ch) => {
                text.push(ch);
                remaining = chars.as_str();
            }
        }
    }
}

fn scan_atom(input: &str) -> Result<(&str, TokenKind), Error> {
    let mut end = 0;
    let mut iter = input.char_indices().peekable();
    while let Some((i, ch)) = iter.next() {
        if ch == '.' {
            // dotted module reference: the dot joins only when an atom
            // character (itself not a dot) follows
            match iter.peek() {
                Some((_, next)) if *next != '.' && is_atom_char(*next) => {}
                _ => break,
            }
        } else if !is_atom_char(ch) {
            break;
        }
        end = i + ch.len_utf8();
    }
    let text = &input[..end];
    let after = &input[end..];
    let kind = match text {
        "DEFINE" | "LIBRA" | "PUBLIC" => TokenKind::Define,
        "HIDE" | "PRIVATE" => TokenKind::Hide,
        "IN" => TokenKind::In,
        "END" => TokenKind::End,
        "MODULE" => TokenKind::Module,
        "==" => TokenKind::EqDef,
        _ => TokenKind::Atom(text.to_owned()),
    };
    Ok((after, kind))
}
