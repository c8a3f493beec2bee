//! Source printer used by `--emit ast`.
//!
//! Every operator application is wrapped in parentheses so the output shows
//! exactly how the parser grouped it. When a [`Resolution`] is supplied each
//! identifier is followed by the type of the symbol it is bound to, e.g.
//! `x(int)`, or by its signature for methods, e.g. `f(int,boolean->void)`.

use crate::ast::{
  Body, CallExp, Decl, Exp, Ident, MethodDecl, Program, Stmt, SwitchLabel, UnaryOp, VarDecl,
};
use crate::resolve::Resolution;

const INDENT: usize = 2;

/// Print `program` back as source text.
pub fn unparse(program: &Program, resolution: Option<&Resolution>) -> String {
  let mut printer = Unparser {
    out: String::new(),
    resolution,
  };
  printer.program(program);
  printer.out
}

/// Print a single expression.
pub fn unparse_exp(exp: &Exp, resolution: Option<&Resolution>) -> String {
  let mut printer = Unparser {
    out: String::new(),
    resolution,
  };
  printer.exp(exp);
  printer.out
}

struct Unparser<'r> {
  out: String,
  resolution: Option<&'r Resolution>,
}

impl Unparser<'_> {
  fn line(&mut self, indent: usize, text: &str) {
    self.out.push_str(&format!("{:indent$}{text}\n", ""));
  }

  fn start(&mut self, indent: usize) {
    self.out.push_str(&format!("{:indent$}", ""));
  }

  fn program(&mut self, program: &Program) {
    self.out.push_str(&format!("public class {} {{\n", program.name.name));
    for decl in &program.decls {
      match decl {
        Decl::Field(field) => {
          self.start(INDENT);
          self.out.push_str("static ");
          self.var_decl(field);
          self.out.push_str(";\n");
        }
        Decl::Method(method) => self.method(method, INDENT),
      }
    }
    self.line(0, "}");
  }

  fn method(&mut self, method: &MethodDecl, indent: usize) {
    self.start(indent);
    self.out.push_str(&format!("public static {} ", method.ret.keyword()));
    self.ident(&method.name);
    self.out.push('(');
    for (index, formal) in method.formals.iter().enumerate() {
      if index > 0 {
        self.out.push_str(", ");
      }
      self.var_decl(formal);
    }
    self.out.push_str(") {\n");
    self.body(&method.body, indent + INDENT);
    self.line(indent, "}");
  }

  fn var_decl(&mut self, decl: &VarDecl) {
    self.out.push_str(&format!("{} ", decl.ty.keyword()));
    self.ident(&decl.name);
  }

  fn body(&mut self, body: &Body, indent: usize) {
    for decl in &body.decls {
      self.start(indent);
      self.var_decl(decl);
      self.out.push_str(";\n");
    }
    self.stmts(&body.stmts, indent);
  }

  fn stmts(&mut self, stmts: &[Stmt], indent: usize) {
    for stmt in stmts {
      self.stmt(stmt, indent);
    }
  }

  fn stmt(&mut self, stmt: &Stmt, indent: usize) {
    match stmt {
      Stmt::Print(exp) => {
        self.start(indent);
        self.out.push_str("print(");
        self.exp(exp);
        self.out.push_str(");\n");
      }
      Stmt::Assign { target, value } => {
        self.start(indent);
        self.ident(target);
        self.out.push_str(" = ");
        self.exp(value);
        self.out.push_str(";\n");
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        self.start(indent);
        self.out.push_str("if (");
        self.exp(cond);
        self.out.push_str(") {\n");
        self.stmts(then_branch, indent + INDENT);
        match else_branch {
          Some(else_branch) => {
            self.line(indent, "} else {");
            self.stmts(else_branch, indent + INDENT);
            self.line(indent, "}");
          }
          None => self.line(indent, "}"),
        }
      }
      Stmt::While { cond, body } => {
        self.start(indent);
        self.out.push_str("while (");
        self.exp(cond);
        self.out.push_str(") {\n");
        self.stmts(body, indent + INDENT);
        self.line(indent, "}");
      }
      Stmt::DoWhile { body, cond } => {
        self.line(indent, "do {");
        self.stmts(body, indent + INDENT);
        self.start(indent);
        self.out.push_str("} while (");
        self.exp(cond);
        self.out.push_str(");\n");
      }
      Stmt::Call(call) => {
        self.start(indent);
        self.call(call);
        self.out.push_str(";\n");
      }
      Stmt::Return { value, .. } => {
        self.start(indent);
        self.out.push_str("return");
        if let Some(value) = value {
          self.out.push(' ');
          self.exp(value);
        }
        self.out.push_str(";\n");
      }
      Stmt::Block(body) => {
        self.line(indent, "{");
        self.body(body, indent + INDENT);
        self.line(indent, "}");
      }
      Stmt::Switch { scrutinee, groups } => {
        self.start(indent);
        self.out.push_str("switch (");
        self.exp(scrutinee);
        self.out.push_str(") {\n");
        for group in groups {
          let label = match group.label {
            SwitchLabel::Case { value, .. } => format!("case {value}:"),
            SwitchLabel::Default { .. } => "default:".to_string(),
          };
          self.line(indent + INDENT, &label);
          self.stmts(&group.stmts, indent + 2 * INDENT);
        }
        self.line(indent, "}");
      }
    }
  }

  fn call(&mut self, call: &CallExp) {
    self.ident(&call.callee);
    self.out.push('(');
    for (index, arg) in call.args.iter().enumerate() {
      if index > 0 {
        self.out.push_str(", ");
      }
      self.exp(arg);
    }
    self.out.push(')');
  }

  fn exp(&mut self, exp: &Exp) {
    match exp {
      Exp::IntLit { value, .. } => {
        self.out.push_str(&value.to_string());
      }
      Exp::StrLit { value, .. } => self.out.push_str(value),
      Exp::True(_) => self.out.push_str("true"),
      Exp::False(_) => self.out.push_str("false"),
      Exp::ReadInt(_) => self.out.push_str("read()"),
      Exp::Id(ident) => self.ident(ident),
      Exp::Call(call) => self.call(call),
      Exp::Unary { op, operand } => {
        self.out.push_str(match op {
          UnaryOp::Neg => "(-",
          UnaryOp::Not => "(!",
        });
        self.exp(operand);
        self.out.push(')');
      }
      Exp::Binary { op, lhs, rhs } => {
        self.out.push('(');
        self.exp(lhs);
        self.out.push_str(&format!(" {} ", op.symbol()));
        self.exp(rhs);
        self.out.push(')');
      }
      Exp::Assign { target, value } => {
        self.out.push('(');
        self.ident(target);
        self.out.push_str(" = ");
        self.exp(value);
        self.out.push(')');
      }
    }
  }

  fn ident(&mut self, ident: &Ident) {
    self.out.push_str(&ident.name);
    let Some(symbol) = self.resolution.and_then(|r| r.symbol_of(ident)) else {
      return;
    };
    match &symbol.params {
      Some(params) => {
        let params: Vec<_> = params.iter().map(|ty| ty.name()).collect();
        self.out.push_str(&format!("({}->{})", params.join(","), symbol.ty));
      }
      None => {
        self.out.push_str(&format!("({})", symbol.ty));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diag::Reporter;
  use crate::options::Options;
  use crate::parser::parse;
  use crate::resolve::resolve;
  use crate::tokenizer::tokenize;

  fn parse_source(source: &str) -> Program {
    parse(tokenize(source).unwrap(), source).unwrap()
  }

  #[test]
  fn operators_are_fully_parenthesised() {
    let program = parse_source(
      "public class A { public static void main() { int x; x = -1 + 2 * 3 ^ 2 ^ 1; } }",
    );
    let main = program.methods().next().unwrap();
    let Stmt::Assign { value, .. } = &main.body.stmts[0] else {
      panic!("expected an assignment");
    };
    assert_eq!(unparse_exp(value, None), "((-1) + (2 * (3 ^ (2 ^ 1))))");
  }

  #[test]
  fn whole_program_layout() {
    let source = "public class A {
      static int g;
      public static int f(int a) { if (a < 0) { return 0; } else { return a; } }
      public static void main() { do { g = f(g); } while (!(g == 3)); }
    }";
    let expected = "\
public class A {
  static int g;
  public static int f(int a) {
    if ((a < 0)) {
      return 0;
    } else {
      return a;
    }
  }
  public static void main() {
    do {
      g = f(g);
    } while ((!(g == 3)));
  }
}
";
    assert_eq!(unparse(&parse_source(source), None), expected);
  }

  #[test]
  fn resolved_identifiers_show_their_types() {
    let source = "public class A {
      static boolean flag;
      public static int f(int a, boolean b) { return a; }
      public static void main() { flag = f(1, flag) > 0; }
    }";
    let program = parse_source(source);
    let mut reporter = Reporter::new();
    let resolution = resolve(&program, &mut reporter, &Options::default());
    let text = unparse(&program, Some(&resolution));
    assert!(text.contains("flag(boolean) = (f(int,boolean->int)(1, flag(boolean)) > 0);"));
    assert!(text.contains("public static int f(int,boolean->int)(int a(int), boolean b(boolean))"));
  }

  #[test]
  fn switch_groups_are_indented_under_labels() {
    let program = parse_source(
      "public class A { public static void main() { switch (2) { case -1: print(\"n\"); default: } } }",
    );
    let text = unparse(&program, None);
    assert!(text.contains("    switch (2) {\n      case -1:\n        print(\"n\");\n      default:\n    }\n"));
  }
}
