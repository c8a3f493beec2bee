//! Semantic diagnostics and the error reporter shared by the analysis passes.
//!
//! Passes never abort on a user error. They record it here and keep walking
//! so sibling subtrees are still checked; the pipeline consults the fatal
//! counter between passes and stops there instead.

use std::fmt;

/// 1-based source position attached to identifiers, literals and keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
  pub line: u32,
  pub col: u32,
}

impl Pos {
  pub const fn new(line: u32, col: u32) -> Self {
    Self { line, col }
  }
}

impl fmt::Display for Pos {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.col)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
  Fatal,
  Warning,
}

/// Categories of problems found by name resolution and type checking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
  MultiplyDeclared,
  Undeclared,
  MissingMain,
  OperandTypeMismatch { operator: OperatorClass },
  TypeMismatch,
  ConditionNotBoolean { construct: &'static str },
  SwitchNotInt,
  ArgCountMismatch { method: String },
  ArgTypeMismatch { method: String, position: usize },
  ReturnTypeMismatch,
  AssignTypeMismatch { expression: bool },
  NotCallable { name: String },
  MethodAsValue { name: String },
  DuplicateCaseLabel { label: String },
}

/// Operator family used to phrase operand mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorClass {
  Arithmetic,
  Logical,
  Relational,
}

impl DiagnosticKind {
  pub fn message(&self) -> String {
    match self {
      Self::MultiplyDeclared => "Multiply declared identifier".to_string(),
      Self::Undeclared => "Undeclared identifier".to_string(),
      Self::MissingMain => "No main method declared".to_string(),
      Self::OperandTypeMismatch { operator } => match operator {
        OperatorClass::Arithmetic => "Arithmetic operator applied to non-numeric operand",
        OperatorClass::Logical => "Logical operator applied to non-boolean operand",
        OperatorClass::Relational => "Relational operator applied to non-numeric operand",
      }
      .to_string(),
      Self::TypeMismatch => "Type mismatch in equality".to_string(),
      Self::ConditionNotBoolean { construct } => {
        format!("Condition in {construct} statement must be boolean")
      }
      Self::SwitchNotInt => "Switch expression must be integer".to_string(),
      Self::ArgCountMismatch { method } => format!("Wrong number of arguments for method {method}"),
      Self::ArgTypeMismatch { method, position } => {
        format!("Type mismatch in argument {position} of call to {method}")
      }
      Self::ReturnTypeMismatch => "Return type mismatch".to_string(),
      Self::AssignTypeMismatch { expression: false } => "Type mismatch in assignment".to_string(),
      Self::AssignTypeMismatch { expression: true } => {
        "Type mismatch in assignment expression".to_string()
      }
      Self::NotCallable { name } => format!("Attempt to call non-method {name}"),
      Self::MethodAsValue { name } => format!("Method {name} used as a value"),
      Self::DuplicateCaseLabel { label } => format!("Duplicate {label} label is unreachable"),
    }
  }
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub pos: Pos,
  pub severity: Severity,
  pub kind: DiagnosticKind,
}

impl Diagnostic {
  pub fn is_fatal(&self) -> bool {
    self.severity == Severity::Fatal
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let tag = match self.severity {
      Severity::Fatal => "ERROR",
      Severity::Warning => "WARNING",
    };
    write!(f, "{} **{tag}** {}", self.pos, self.kind.message())
  }
}

/// Pipeline stage that produced, or gated on, a set of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
  NameResolution,
  TypeChecking,
}

impl fmt::Display for Pass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NameResolution => f.write_str("name resolution"),
      Self::TypeChecking => f.write_str("type checking"),
    }
  }
}

/// Accumulates diagnostics for one compilation run.
#[derive(Debug, Default)]
pub struct Reporter {
  diagnostics: Vec<Diagnostic>,
  fatal_count: usize,
}

impl Reporter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record an error that must stop the pipeline at the next pass boundary.
  pub fn fatal(&mut self, pos: Pos, kind: DiagnosticKind) {
    log::debug!("{pos} error: {}", kind.message());
    self.fatal_count += 1;
    self.diagnostics.push(Diagnostic {
      pos,
      severity: Severity::Fatal,
      kind,
    });
  }

  /// Record a warning; the fatal counter is left untouched.
  pub fn warn(&mut self, pos: Pos, kind: DiagnosticKind) {
    log::debug!("{pos} warning: {}", kind.message());
    self.diagnostics.push(Diagnostic {
      pos,
      severity: Severity::Warning,
      kind,
    });
  }

  pub fn fatal_count(&self) -> usize {
    self.fatal_count
  }

  pub fn diagnostics(&self) -> &[Diagnostic] {
    &self.diagnostics
  }

  pub fn into_diagnostics(self) -> Vec<Diagnostic> {
    self.diagnostics
  }

  /// Refuse to continue past `pass` when it recorded any fatal error.
  pub fn gate(&self, pass: Pass) -> crate::CompileResult<()> {
    if self.fatal_count == 0 {
      log::debug!("{pass} finished cleanly");
      return Ok(());
    }
    log::debug!("{pass} finished with {} fatal error(s)", self.fatal_count);
    Err(crate::CompileError::Rejected {
      pass,
      diagnostics: self.diagnostics.clone(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn warnings_do_not_count_as_fatal() {
    let mut reporter = Reporter::new();
    reporter.warn(
      Pos::new(3, 5),
      DiagnosticKind::DuplicateCaseLabel {
        label: "case 1".into(),
      },
    );
    assert_eq!(reporter.fatal_count(), 0);
    assert!(reporter.gate(Pass::NameResolution).is_ok());

    reporter.fatal(Pos::new(4, 1), DiagnosticKind::Undeclared);
    assert_eq!(reporter.fatal_count(), 1);
    assert_eq!(reporter.diagnostics().len(), 2);
  }

  #[test]
  fn gate_carries_every_diagnostic() {
    let mut reporter = Reporter::new();
    reporter.fatal(Pos::new(2, 7), DiagnosticKind::MultiplyDeclared);
    let err = reporter.gate(Pass::NameResolution).unwrap_err();
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(
      err.to_string(),
      "name resolution rejected the program:\n2:7 **ERROR** Multiply declared identifier"
    );
  }

  #[test]
  fn diagnostic_messages_name_the_method() {
    let kind = DiagnosticKind::ArgTypeMismatch {
      method: "f".into(),
      position: 2,
    };
    assert_eq!(kind.message(), "Type mismatch in argument 2 of call to f");
  }
}
