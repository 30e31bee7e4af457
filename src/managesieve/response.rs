//! ManageSieve response grammar.
//!
//! A server line is a sequence of atoms, quoted strings, literals and at
//! most one parenthesised response code. A line whose first atom is `OK`,
//! `NO` or `BYE` ends a response; anything before it is data (capabilities,
//! script listings, SASL challenges).

use std::fmt;

use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Atom(String),
    String(Vec<u8>),
    /// Contents of a `(...)` response code, without the parentheses
    Code(String),
}

impl Token {
    /// Text of an atom or string token
    pub fn text(&self) -> Option<String> {
        match self {
            Token::Atom(atom) => Some(atom.clone()),
            Token::String(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Token::Code(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bye,
}

impl Status {
    fn from_atom(atom: &str) -> Option<Self> {
        match atom.to_ascii_uppercase().as_str() {
            "OK" => Some(Status::Ok),
            "NO" => Some(Status::No),
            "BYE" => Some(Status::Bye),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::No => "NO",
            Status::Bye => "BYE",
        };
        f.write_str(name)
    }
}

/// The final line of a server response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub code: Option<String>,
    pub text: Option<String>,
}

impl Response {
    /// Returns `Some` if `tokens` form a final `OK`/`NO`/`BYE` line.
    pub fn classify(tokens: &[Token]) -> Option<Response> {
        let status = match tokens.first() {
            Some(Token::Atom(atom)) => Status::from_atom(atom)?,
            _ => return None,
        };

        let mut code = None;
        let mut text = None;
        for token in &tokens[1..] {
            match token {
                Token::Code(c) if code.is_none() && text.is_none() => code = Some(c.clone()),
                other if text.is_none() => text = other.text(),
                _ => {}
            }
        }

        Some(Response { status, code, text })
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Human-readable reason, falling back to the response code
    pub fn reason(&self) -> String {
        match (&self.text, &self.code) {
            (Some(text), _) => text.clone(),
            (None, Some(code)) => code.clone(),
            (None, None) => self.status.to_string(),
        }
    }
}

/// Splits one physical line (without CRLF) into tokens.
///
/// If the line ends in a literal announcement `{N}` or `{N+}`, the length is
/// returned alongside the tokens; the caller must read N octets and continue
/// with the next physical line.
pub fn tokenize(line: &[u8]) -> Result<(Vec<Token>, Option<usize>), ProtocolError> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < line.len() {
        match line[i] {
            b' ' => i += 1,
            b'"' => {
                let (value, next) = quoted_string(line, i + 1)?;
                tokens.push(Token::String(value));
                i = next;
            }
            b'{' => {
                let close = line[i..]
                    .iter()
                    .position(|&c| c == b'}')
                    .map(|offset| i + offset)
                    .ok_or_else(|| ProtocolError::malformed("unterminated literal length"))?;
                if close != line.len() - 1 {
                    return Err(ProtocolError::malformed("literal length must end the line"));
                }
                let inner = &line[i + 1..close];
                let digits = inner.strip_suffix(b"+").unwrap_or(inner);
                let len = std::str::from_utf8(digits)
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| {
                        ProtocolError::malformed(format!(
                            "bad literal length '{}'",
                            String::from_utf8_lossy(inner)
                        ))
                    })?;
                return Ok((tokens, Some(len)));
            }
            b'(' => {
                let (code, next) = response_code(line, i + 1)?;
                tokens.push(Token::Code(code));
                i = next;
            }
            _ => {
                let end = line[i..]
                    .iter()
                    .position(|&c| c == b' ')
                    .map_or(line.len(), |offset| i + offset);
                tokens.push(Token::Atom(
                    String::from_utf8_lossy(&line[i..end]).into_owned(),
                ));
                i = end;
            }
        }
    }

    Ok((tokens, None))
}

fn quoted_string(line: &[u8], start: usize) -> Result<(Vec<u8>, usize), ProtocolError> {
    let mut value = Vec::new();
    let mut i = start;
    loop {
        match line.get(i) {
            None => return Err(ProtocolError::malformed("unterminated quoted string")),
            Some(b'\\') => {
                let escaped = line
                    .get(i + 1)
                    .ok_or_else(|| ProtocolError::malformed("dangling escape"))?;
                value.push(*escaped);
                i += 2;
            }
            Some(b'"') => return Ok((value, i + 1)),
            Some(&c) => {
                value.push(c);
                i += 1;
            }
        }
    }
}

fn response_code(line: &[u8], start: usize) -> Result<(String, usize), ProtocolError> {
    let mut in_quote = false;
    let mut i = start;
    while let Some(&c) = line.get(i) {
        match c {
            b'\\' if in_quote => i += 1,
            b'"' => in_quote = !in_quote,
            b')' if !in_quote => {
                let code = String::from_utf8_lossy(&line[start..i]).into_owned();
                return Ok((code, i + 1));
            }
            _ => {}
        }
        i += 1;
    }
    Err(ProtocolError::malformed("unterminated response code"))
}

/// Quotes `value` as a ManageSieve quoted string
pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
