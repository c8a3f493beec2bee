//! Shared error utilities used across the compilation pipeline.
//!
//! Two kinds of failure travel through `CompileError`. Lexical and syntax
//! errors abort immediately and are rendered with the offending source line
//! and a caret under the column. Semantic problems are collected by
//! the [`Reporter`](crate::diag::Reporter) instead, and only show up here once
//! a pass boundary refuses to hand the tree to the next pass.

use std::path::PathBuf;

use snafu::Snafu;

use crate::diag::{Diagnostic, Pass, Pos};

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
  #[snafu(display("{line}:{col} {message}\n{source_line}\n{marker}"))]
  Syntax {
    line: u32,
    col: u32,
    source_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("{pass} rejected the program:\n{}", render(diagnostics)))]
  Rejected {
    pass: Pass,
    diagnostics: Vec<Diagnostic>,
  },

  #[snafu(display("internal compiler error: {message}"))]
  Internal { message: String },

  #[snafu(display("could not {action} {}: {source}", path.display()))]
  Io {
    action: &'static str,
    path: PathBuf,
    source: std::io::Error,
  },
}

impl CompileError {
  /// Construct a syntax error anchored at a 1-based line/column in `source`.
  pub fn at(source: &str, pos: Pos, message: impl Into<String>) -> Self {
    let source_line = source
      .lines()
      .nth(pos.line.saturating_sub(1) as usize)
      .unwrap_or("")
      .to_string();
    let marker = format!("{}^", " ".repeat(pos.col.saturating_sub(1) as usize));
    Self::Syntax {
      line: pos.line,
      col: pos.col,
      source_line,
      marker,
      message: message.into(),
    }
  }

  /// An invariant an earlier pass should have guaranteed does not hold.
  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal {
      message: message.into(),
    }
  }

  /// Diagnostics carried by a rejected pass; empty for every other variant.
  pub fn diagnostics(&self) -> &[Diagnostic] {
    match self {
      Self::Rejected { diagnostics, .. } => diagnostics,
      _ => &[],
    }
  }
}

fn render(diagnostics: &[Diagnostic]) -> String {
  diagnostics
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("\n")
}
