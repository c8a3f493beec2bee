//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about grammar beyond recognising keywords,
//! operators, literals and identifiers. Multi-character punctuators are
//! matched before single-character ones to avoid ambiguity, and every token
//! records a 1-based line/column for diagnostics.

use crate::diag::Pos;
use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Keyword,
  Ident,
  Num,
  Str,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
  pub pos: Pos,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, pos: Pos, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
      pos,
    }
  }
}

pub const KEYWORDS: [&str; 19] = [
  "public", "class", "static", "void", "int", "boolean", "string", "if", "else", "while", "do",
  "switch", "case", "default", "return", "print", "read", "true", "false",
];

const MULTI_PUNCTUATORS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];

fn is_keyword(text: &str) -> bool {
  KEYWORDS.contains(&text)
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;
  let mut line = 1u32;
  let mut line_start = 0usize;

  let pos_at = |offset: usize, line: u32, line_start: usize| -> Pos {
    let col = input[line_start..offset].chars().count() as u32 + 1;
    Pos::new(line, col)
  };

  while i < bytes.len() {
    let c = bytes[i];
    if c == b'\n' {
      i += 1;
      line += 1;
      line_start = i;
      continue;
    }
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if input[i..].starts_with("//") {
      while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
      }
      continue;
    }

    let pos = pos_at(i, line, line_start);

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i32>()
        .map_err(|err| CompileError::at(input, pos, format!("invalid number: {err}")))?;
      tokens.push(Token::new(
        TokenKind::Num,
        start,
        i - start,
        pos,
        Some(i64::from(value)),
      ));
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let kind = if is_keyword(&input[start..i]) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, pos, None));
      continue;
    }

    if c == b'"' {
      let start = i;
      i += 1;
      loop {
        match bytes.get(i) {
          None | Some(b'\n') => {
            return Err(CompileError::at(input, pos, "unterminated string literal"));
          }
          Some(b'\\') => {
            if !matches!(bytes.get(i + 1), Some(b'n' | b't' | b'"' | b'\\' | b'\'')) {
              let escape_pos = pos_at(i, line, line_start);
              return Err(CompileError::at(
                input,
                escape_pos,
                "unrecognised escape sequence in string literal",
              ));
            }
            i += 2;
          }
          Some(b'"') => {
            i += 1;
            break;
          }
          Some(_) => i += 1,
        }
      }
      tokens.push(Token::new(TokenKind::Str, start, i - start, pos, None));
      continue;
    }

    if let Some(op) = MULTI_PUNCTUATORS
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), pos, None));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'+'
        | b'-'
        | b'*'
        | b'/'
        | b'%'
        | b'^'
        | b'!'
        | b'('
        | b')'
        | b'{'
        | b'}'
        | b'<'
        | b'>'
        | b'='
        | b','
        | b';'
        | b':'
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, pos, None));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::at(
      input,
      pos,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  let eof_pos = pos_at(input.len(), line, line_start);
  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, eof_pos, None));
  Ok(tokens)
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

/// One line per token, `line:col KIND [text]`, used by `--emit tokens`.
pub fn dump(tokens: &[Token], source: &str) -> String {
  let mut out = String::new();
  for token in tokens {
    let text = token_text(token, source);
    let line = match token.kind {
      TokenKind::Num => format!("{} NUM ({})", token.pos, token.value.unwrap_or_default()),
      TokenKind::Str => format!("{} STR {text}", token.pos),
      TokenKind::Ident => format!("{} ID {text}", token.pos),
      TokenKind::Keyword => format!("{} {}", token.pos, text.to_ascii_uppercase()),
      TokenKind::Punctuator => format!("{} PUNCT {text}", token.pos),
      TokenKind::Eof => format!("{} EOF", token.pos),
    };
    out.push_str(&line);
    out.push('\n');
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .unwrap()
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn keywords_and_identifiers_are_distinct() {
    assert_eq!(
      kinds("int count while"),
      vec![
        TokenKind::Keyword,
        TokenKind::Ident,
        TokenKind::Keyword,
        TokenKind::Eof
      ]
    );
  }

  #[test]
  fn positions_are_one_based_and_track_lines() {
    let tokens = tokenize("x\n  y = 10;").unwrap();
    assert_eq!(tokens[0].pos, Pos::new(1, 1));
    assert_eq!(tokens[1].pos, Pos::new(2, 3));
    assert_eq!(tokens[3].pos, Pos::new(2, 7));
    assert_eq!(tokens[3].value, Some(10));
  }

  #[test]
  fn two_character_operators_win() {
    let source = "a <= b && c != d";
    let tokens = tokenize(source).unwrap();
    let texts: Vec<_> = tokens.iter().map(|t| token_text(t, source)).collect();
    assert_eq!(texts, vec!["a", "<=", "b", "&&", "c", "!=", "d", ""]);
  }

  #[test]
  fn comments_are_skipped() {
    assert_eq!(
      kinds("// nothing here\nx // trailing"),
      vec![TokenKind::Ident, TokenKind::Eof]
    );
  }

  #[test]
  fn string_literal_keeps_escapes_verbatim() {
    let source = r#"print("a\n\"b\"");"#;
    let tokens = tokenize(source).unwrap();
    assert_eq!(tokens[2].kind, TokenKind::Str);
    assert_eq!(token_text(&tokens[2], source), r#""a\n\"b\"""#);
  }

  #[test]
  fn unterminated_string_is_an_error() {
    let err = tokenize("\"abc").unwrap_err();
    assert!(err.to_string().contains("unterminated string literal"));
  }

  #[test]
  fn integer_overflow_is_an_error() {
    let err = tokenize("x = 99999999999;").unwrap_err();
    assert!(err.to_string().starts_with("1:5 invalid number"));
  }

  #[test]
  fn invalid_character_reports_position() {
    let err = tokenize("x = 1;\n  @").unwrap_err();
    assert!(err.to_string().starts_with("2:3 invalid token: '@'"));
  }
}
