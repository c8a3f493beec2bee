//! Bottom-up type synthesis over a resolved program.
//!
//! Every expression synthesises a [`Type`]. `Type::Error` marks a subtree that
//! already produced a diagnostic; parents that see it stay silent and pass it
//! upward so one mistake is reported once.

use rustc_hash::FxHashSet;

use crate::ast::{
  BinaryOp, Body, CallExp, Decl, Exp, Ident, MethodDecl, Program, Stmt, SwitchGroup, SwitchLabel,
  UnaryOp,
};
use crate::diag::{DiagnosticKind, OperatorClass, Pos, Reporter};
use crate::error::{CompileError, CompileResult};
use crate::resolve::Resolution;
use crate::ty::Type;

/// Check every method body in `program`.
///
/// User errors go to `reporter`; an `Err` means an identifier reached this
/// pass without a binding.
pub fn check_program(
  program: &Program,
  resolution: &Resolution,
  reporter: &mut Reporter,
) -> CompileResult<()> {
  let mut checker = TypeChecker::new(resolution, reporter);
  for decl in &program.decls {
    if let Decl::Method(method) = decl {
      checker.check_method(method)?;
    }
  }
  Ok(())
}

/// Whether a call appears as an expression or as a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallForm {
  Expression,
  Statement,
}

struct TypeChecker<'a> {
  resolution: &'a Resolution,
  reporter: &'a mut Reporter,
  /// Declared return types of the enclosing method bodies, innermost last.
  returns: Vec<Type>,
}

impl<'a> TypeChecker<'a> {
  fn new(resolution: &'a Resolution, reporter: &'a mut Reporter) -> Self {
    Self {
      resolution,
      reporter,
      returns: Vec::new(),
    }
  }

  fn check_method(&mut self, method: &MethodDecl) -> CompileResult<()> {
    log::trace!("type checking method {}", method.name.name);
    self.returns.push(method.ret.to_type());
    let result = self.check_body(&method.body);
    self.returns.pop();
    result
  }

  fn check_body(&mut self, body: &Body) -> CompileResult<()> {
    self.check_stmts(&body.stmts)
  }

  fn check_stmts(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
    for stmt in stmts {
      self.check_stmt(stmt)?;
    }
    Ok(())
  }

  fn check_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Print(exp) => {
        self.synth_exp(exp)?;
      }
      Stmt::Assign { target, value } => {
        let target_ty = self.synth_ident(target)?;
        let value_ty = self.synth_exp(value)?;
        if !target_ty.is_error() && !value_ty.is_error() && target_ty != value_ty {
          self.reporter.fatal(
            target.pos,
            DiagnosticKind::AssignTypeMismatch { expression: false },
          );
        }
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        self.check_condition(cond, "if")?;
        self.check_stmts(then_branch)?;
        if let Some(else_branch) = else_branch {
          self.check_stmts(else_branch)?;
        }
      }
      Stmt::While { cond, body } => {
        self.check_condition(cond, "while")?;
        self.check_stmts(body)?;
      }
      Stmt::DoWhile { body, cond } => {
        self.check_stmts(body)?;
        self.check_condition(cond, "do-while")?;
      }
      Stmt::Call(call) => {
        self.synth_call(call, CallForm::Statement)?;
      }
      Stmt::Return { value, .. } => {
        if let Some(value) = value {
          self.check_return(value)?;
        }
      }
      Stmt::Block(body) => self.check_body(body)?,
      Stmt::Switch { scrutinee, groups } => {
        let ty = self.synth_exp(scrutinee)?;
        if !ty.is_error() && !ty.is_integer() {
          self
            .reporter
            .fatal(scrutinee.pos(), DiagnosticKind::SwitchNotInt);
        }
        self.check_case_labels(groups);
        for group in groups {
          self.check_stmts(&group.stmts)?;
        }
      }
    }
    Ok(())
  }

  fn check_condition(&mut self, cond: &Exp, construct: &'static str) -> CompileResult<()> {
    let ty = self.synth_exp(cond)?;
    if !ty.is_error() && !ty.is_boolean() {
      self
        .reporter
        .fatal(cond.pos(), DiagnosticKind::ConditionNotBoolean { construct });
    }
    Ok(())
  }

  fn check_return(&mut self, value: &Exp) -> CompileResult<()> {
    let ty = self.synth_exp(value)?;
    let expected = self
      .returns
      .last()
      .copied()
      .ok_or_else(|| CompileError::internal("return statement outside of a method body"))?;
    if !ty.is_error() && ty != expected {
      self
        .reporter
        .fatal(value.pos(), DiagnosticKind::ReturnTypeMismatch);
    }
    Ok(())
  }

  /// Later groups repeating a case value, or a second `default`, can never run.
  fn check_case_labels(&mut self, groups: &[SwitchGroup]) {
    let mut seen_values = FxHashSet::default();
    let mut seen_default = false;
    for group in groups {
      let duplicate = match group.label {
        SwitchLabel::Case { value, .. } => {
          (!seen_values.insert(value)).then(|| format!("case {value}"))
        }
        SwitchLabel::Default { .. } => {
          std::mem::replace(&mut seen_default, true).then(|| "default".to_string())
        }
      };
      if let Some(label) = duplicate {
        self
          .reporter
          .warn(group.label.pos(), DiagnosticKind::DuplicateCaseLabel { label });
      }
    }
  }

  fn synth_exp(&mut self, exp: &Exp) -> CompileResult<Type> {
    let ty = match exp {
      Exp::IntLit { .. } | Exp::ReadInt(_) => Type::Int,
      Exp::StrLit { .. } => Type::String,
      Exp::True(_) | Exp::False(_) => Type::Bool,
      Exp::Id(ident) => self.synth_ident(ident)?,
      Exp::Call(call) => self.synth_call(call, CallForm::Expression)?,
      Exp::Unary { op, operand } => self.synth_unary(*op, operand)?,
      Exp::Binary { op, lhs, rhs } => self.synth_binary(*op, lhs, rhs)?,
      Exp::Assign { target, value } => {
        let target_ty = self.synth_ident(target)?;
        let value_ty = self.synth_exp(value)?;
        if !target_ty.is_error() && !value_ty.is_error() && target_ty != value_ty {
          self.reporter.fatal(
            target.pos,
            DiagnosticKind::AssignTypeMismatch { expression: true },
          );
          Type::Error
        } else {
          target_ty
        }
      }
    };
    Ok(ty)
  }

  /// Type of an identifier used as a value.
  fn synth_ident(&mut self, ident: &Ident) -> CompileResult<Type> {
    let (_, symbol) = self.resolution.expect_bound(ident)?;
    if symbol.is_method() {
      self.reporter.fatal(
        ident.pos,
        DiagnosticKind::MethodAsValue {
          name: ident.name.clone(),
        },
      );
      return Ok(Type::Error);
    }
    Ok(symbol.ty)
  }

  fn synth_call(&mut self, call: &CallExp, form: CallForm) -> CompileResult<Type> {
    let mut arg_types = Vec::with_capacity(call.args.len());
    for arg in &call.args {
      arg_types.push(self.synth_exp(arg)?);
    }

    let (_, symbol) = self.resolution.expect_bound(&call.callee)?;
    let Some(params) = &symbol.params else {
      self.reporter.fatal(
        call.callee.pos,
        DiagnosticKind::NotCallable {
          name: call.callee.name.clone(),
        },
      );
      return Ok(Type::Error);
    };

    if params.len() != arg_types.len() {
      self.reporter.fatal(
        call.callee.pos,
        DiagnosticKind::ArgCountMismatch {
          method: symbol.name.clone(),
        },
      );
      return Ok(Type::Error);
    }

    for (index, (arg_ty, param_ty)) in arg_types.iter().zip(params).enumerate() {
      if !arg_ty.is_error() && arg_ty != param_ty {
        self.reporter.fatal(
          call.callee.pos,
          DiagnosticKind::ArgTypeMismatch {
            method: symbol.name.clone(),
            position: index + 1,
          },
        );
      }
    }

    Ok(match form {
      CallForm::Expression => symbol.ty,
      CallForm::Statement => Type::Void,
    })
  }

  fn synth_unary(&mut self, op: UnaryOp, operand: &Exp) -> CompileResult<Type> {
    let ty = self.synth_exp(operand)?;
    let (required, class) = match op {
      UnaryOp::Neg => (Type::Int, OperatorClass::Arithmetic),
      UnaryOp::Not => (Type::Bool, OperatorClass::Logical),
    };
    if ty.is_error() {
      return Ok(Type::Error);
    }
    if ty != required {
      self.operand_mismatch(operand.pos(), class);
      return Ok(Type::Error);
    }
    Ok(required)
  }

  fn synth_binary(&mut self, op: BinaryOp, lhs: &Exp, rhs: &Exp) -> CompileResult<Type> {
    let lhs_ty = self.synth_exp(lhs)?;
    let rhs_ty = self.synth_exp(rhs)?;
    if lhs_ty.is_error() || rhs_ty.is_error() {
      return Ok(Type::Error);
    }

    let (operand, result, class) = match op {
      BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
        (Type::Int, Type::Int, OperatorClass::Arithmetic)
      }
      BinaryOp::And | BinaryOp::Or => (Type::Bool, Type::Bool, OperatorClass::Logical),
      BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
        (Type::Int, Type::Bool, OperatorClass::Relational)
      }
      BinaryOp::Eq | BinaryOp::Ne => {
        if lhs_ty == rhs_ty {
          return Ok(Type::Bool);
        }
        self.reporter.fatal(lhs.pos(), DiagnosticKind::TypeMismatch);
        return Ok(Type::Error);
      }
    };

    if lhs_ty != operand || rhs_ty != operand {
      self.operand_mismatch(lhs.pos(), class);
      return Ok(Type::Error);
    }
    Ok(result)
  }

  fn operand_mismatch(&mut self, pos: Pos, operator: OperatorClass) {
    self
      .reporter
      .fatal(pos, DiagnosticKind::OperandTypeMismatch { operator });
  }
}

#[cfg(test)]
mod tests {
  use rstest::rstest;

  use super::*;
  use crate::diag::Diagnostic;
  use crate::options::Options;
  use crate::parser::parse;
  use crate::resolve::resolve;
  use crate::tokenizer::tokenize;

  fn check(source: &str) -> Vec<Diagnostic> {
    let program = parse(tokenize(source).unwrap(), source).unwrap();
    let mut reporter = Reporter::new();
    let resolution = resolve(&program, &mut reporter, &Options::default());
    assert_eq!(reporter.fatal_count(), 0, "{:?}", reporter.diagnostics());
    check_program(&program, &resolution, &mut reporter).unwrap();
    reporter.into_diagnostics()
  }

  fn messages(source: &str) -> Vec<String> {
    check(source)
      .iter()
      .map(|d| d.kind.message())
      .collect()
  }

  /// Type a single expression in a context with one variable of each type.
  fn type_of(expr: &str) -> (Type, Vec<String>) {
    let source = format!(
      "public class T {{
         public static int f(int a, boolean b) {{ return a; }}
         public static void p() {{ }}
         public static void main() {{ int i; boolean b; string s; print({expr}); }}
       }}"
    );
    let program = parse(tokenize(&source).unwrap(), &source).unwrap();
    let mut reporter = Reporter::new();
    let resolution = resolve(&program, &mut reporter, &Options::default());
    assert_eq!(reporter.fatal_count(), 0, "{:?}", reporter.diagnostics());

    let main = program.methods().find(|m| m.name.name == "main").unwrap();
    let Stmt::Print(exp) = &main.body.stmts[0] else {
      panic!("expected a print statement");
    };
    let mut checker = TypeChecker::new(&resolution, &mut reporter);
    let ty = checker.synth_exp(exp).unwrap();
    let messages = reporter
      .diagnostics()
      .iter()
      .map(|d| d.kind.message())
      .collect();
    (ty, messages)
  }

  #[rstest]
  #[case("1 + 2 * 3", Type::Int)]
  #[case("i % 2 - -i", Type::Int)]
  #[case("2 ^ 10", Type::Int)]
  #[case("read()", Type::Int)]
  #[case("b && !b || true", Type::Bool)]
  #[case("i < 3", Type::Bool)]
  #[case("i >= i", Type::Bool)]
  #[case("s == \"x\"", Type::Bool)]
  #[case("b != false", Type::Bool)]
  #[case("\"hello\"", Type::String)]
  #[case("f(1, true)", Type::Int)]
  #[case("i = 5", Type::Int)]
  #[case("i = i = 5", Type::Int)]
  fn well_typed_expressions(#[case] expr: &str, #[case] expected: Type) {
    let (ty, messages) = type_of(expr);
    assert!(messages.is_empty(), "{messages:?}");
    assert_eq!(ty, expected);
  }

  #[rstest]
  #[case("1 + true", "Arithmetic operator applied to non-numeric operand")]
  #[case("s * 2", "Arithmetic operator applied to non-numeric operand")]
  #[case("-b", "Arithmetic operator applied to non-numeric operand")]
  #[case("b ^ 2", "Arithmetic operator applied to non-numeric operand")]
  #[case("1 && b", "Logical operator applied to non-boolean operand")]
  #[case("!i", "Logical operator applied to non-boolean operand")]
  #[case("i == b", "Type mismatch in equality")]
  #[case("s != 1", "Type mismatch in equality")]
  #[case("b < 1", "Relational operator applied to non-numeric operand")]
  #[case("s > s", "Relational operator applied to non-numeric operand")]
  #[case("i = true", "Type mismatch in assignment expression")]
  #[case("f(1)", "Wrong number of arguments for method f")]
  #[case("i(1)", "Attempt to call non-method i")]
  #[case("f + 1", "Method f used as a value")]
  fn ill_typed_expressions(#[case] expr: &str, #[case] message: &str) {
    let (ty, messages) = type_of(expr);
    assert_eq!(messages, vec![message.to_string()]);
    assert_eq!(ty, Type::Error);
  }

  #[rstest]
  #[case("(1 + true) + 2")]
  #[case("!(1 + true)")]
  #[case("(1 + true) == b")]
  #[case("(i = true) < 3")]
  fn errors_are_absorbed(#[case] expr: &str) {
    let (ty, messages) = type_of(expr);
    assert_eq!(ty, Type::Error);
    assert_eq!(messages.len(), 1, "{messages:?}");
  }

  #[rstest]
  #[case("f(true, true)", &["Type mismatch in argument 1 of call to f"])]
  #[case("f(i, 3)", &["Type mismatch in argument 2 of call to f"])]
  #[case(
    "f(s, i)",
    &["Type mismatch in argument 1 of call to f", "Type mismatch in argument 2 of call to f"]
  )]
  #[case("f(1 + true, false)", &["Arithmetic operator applied to non-numeric operand"])]
  #[case("f(i, b) + 1", &[])]
  fn mistyped_arguments_keep_the_return_type(#[case] expr: &str, #[case] expected: &[&str]) {
    let (ty, messages) = type_of(expr);
    assert_eq!(messages, expected);
    assert_eq!(ty, Type::Int);
  }

  #[test]
  fn both_sides_wrong_reports_once_at_left_operand() {
    let diagnostics = check(
      "public class T {\n  public static void main() { print(true + \"s\"); }\n}",
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].pos, Pos::new(2, 37));
  }

  #[test]
  fn argument_count_mismatch_suppresses_positional_checks() {
    let diagnostics = check(
      "public class T {
         public static void g(int a, int b) { }
         public static void main() { g(true, \"x\", 3); }
       }",
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
      diagnostics[0].kind,
      DiagnosticKind::ArgCountMismatch {
        method: "g".to_string()
      }
    );
  }

  #[test]
  fn each_bad_argument_is_reported() {
    assert_eq!(
      messages(
        "public class T {
           public static void g(int a, boolean b, string c) { }
           public static void main() { g(true, 1, \"ok\"); }
         }"
      ),
      vec![
        "Type mismatch in argument 1 of call to g",
        "Type mismatch in argument 2 of call to g"
      ]
    );
  }

  #[test]
  fn conditions_must_be_boolean() {
    assert_eq!(
      messages(
        "public class T {
           public static void main() {
             if (1) { } else { }
             while (\"s\") { }
             do { } while (2);
           }
         }"
      ),
      vec![
        "Condition in if statement must be boolean",
        "Condition in while statement must be boolean",
        "Condition in do-while statement must be boolean"
      ]
    );
  }

  #[test]
  fn switch_requires_integer_and_flags_unreachable_labels() {
    let diagnostics = check(
      "public class T {
         public static void main() {
           switch (true) { case 1: default: }
           switch (3) { case 1: case 2: case 1: default: default: }
         }
       }",
    );
    let rendered: Vec<_> = diagnostics
      .iter()
      .map(|d| (d.is_fatal(), d.kind.message()))
      .collect();
    assert_eq!(
      rendered,
      vec![
        (true, "Switch expression must be integer".to_string()),
        (false, "Duplicate case 1 label is unreachable".to_string()),
        (false, "Duplicate default label is unreachable".to_string()),
      ]
    );
  }

  #[test]
  fn return_is_checked_against_the_enclosing_method() {
    assert_eq!(
      messages(
        "public class T {
           public static boolean yes() { return true; }
           public static int count() { return yes(); }
           public static void main() { return 1; }
         }"
      ),
      vec!["Return type mismatch", "Return type mismatch"]
    );
  }

  #[test]
  fn bare_return_is_accepted_anywhere() {
    assert!(
      check(
        "public class T {
           public static int f() { return; }
           public static void main() { return; }
         }"
      )
      .is_empty()
    );
  }

  #[test]
  fn assignment_statement_mismatch() {
    let diagnostics = check(
      "public class T {\n  static boolean flag;\n  public static void main() { flag = 3; }\n}",
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
      diagnostics[0].kind,
      DiagnosticKind::AssignTypeMismatch { expression: false }
    );
    assert_eq!(diagnostics[0].pos, Pos::new(3, 31));
  }

  #[test]
  fn call_statement_ignores_return_type() {
    assert!(
      check(
        "public class T {
           public static int f(int n) { return n; }
           public static void main() { f(2); print(f(f(1))); }
         }"
      )
      .is_empty()
    );
  }
}
