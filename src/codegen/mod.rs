//! Code generation: lower a checked program into MIPS assembly for SPIM.
//!
//! The generator is a stack machine. Every expression leaves exactly one word
//! on the evaluation stack and every statement leaves the stack as it found
//! it. The emitter's depth counter is compared around each node so a broken
//! lowering surfaces as an internal error instead of silently wrong code.

mod emit;
mod frame;

pub use frame::{Frame, layout};

use emit::{A0, Emitter, FALSE, FP, RA, SP, T0, T1, TRUE, V0, ZERO};

use crate::ast::{
  BinaryOp, CallExp, Exp, Ident, MethodDecl, Program, Stmt, SwitchLabel, UnaryOp,
};
use crate::error::{CompileError, CompileResult};
use crate::options::Options;
use crate::resolve::{ENTRY_METHOD, Resolution};
use crate::symtab::{Storage, Symbol};
use crate::ty::{Type, WORD_SIZE};

/// Emit assembly for a program that passed name resolution and type checking.
pub fn generate(
  program: &Program,
  resolution: &mut Resolution,
  options: &Options,
) -> CompileResult<String> {
  let mut frames = Vec::new();
  for method in program.methods() {
    frames.push(layout(method, resolution)?);
  }

  let mut codegen = Codegen {
    emit: Emitter::new(options.annotate),
    resolution,
    exit_label: String::new(),
  };
  codegen.gen_globals(program)?;
  for (method, frame) in program.methods().zip(frames) {
    codegen.gen_method(method, frame)?;
  }
  Ok(codegen.emit.finish())
}

struct Codegen<'a> {
  emit: Emitter,
  resolution: &'a Resolution,
  /// Label the current method's `return` statements branch to.
  exit_label: String,
}

impl Codegen<'_> {
  fn gen_globals(&mut self, program: &Program) -> CompileResult<()> {
    let mut fields = program.fields().peekable();
    if fields.peek().is_none() {
      return Ok(());
    }
    self.emit.instr(".data", &[]);
    self.emit.instr(".align", &["2"]);
    for field in fields {
      let (_, symbol) = self.resolution.expect_bound(&field.name)?;
      let label = global_label(symbol)?;
      self.emit.label(label);
      self.emit.instr(".space", &[&WORD_SIZE.to_string()]);
    }
    Ok(())
  }

  fn gen_method(&mut self, method: &MethodDecl, frame: Frame) -> CompileResult<()> {
    let (_, symbol) = self.resolution.expect_bound(&method.name)?;
    let label = global_label(symbol)?.to_string();
    let is_entry = method.name.name == ENTRY_METHOD;
    log::debug!("generating {label}");

    self.exit_label = self.emit.fresh_label();
    self.emit.reset_depth();

    self.emit.instr(".text", &[]);
    if is_entry {
      self.emit.instr(".globl", &[ENTRY_METHOD]);
    }
    self.emit.label(&label);

    self.emit.comment("prologue");
    self.emit.push(RA);
    self.emit.push(FP);
    self
      .emit
      .instr("addu", &[FP, SP, &frame.fp_adjust().to_string()]);
    if frame.locals > 0 {
      self
        .emit
        .instr("subu", &[SP, SP, &frame.locals_size().to_string()]);
    }

    let base = self.emit.depth();
    self.gen_stmts(&method.body.stmts)?;
    self.check_effect(base, 0, "method body", &method.name)?;

    self.emit.label(&self.exit_label);
    self.emit.comment("epilogue");
    if is_entry {
      self.emit.instr("li", &[V0, "10"]);
      self.emit.instr("syscall", &[]);
    } else {
      self
        .emit
        .indexed("lw", RA, frame.return_address_offset(), FP, "");
      self.emit.instr("move", &[T0, FP]);
      self.emit.indexed("lw", FP, frame.saved_fp_offset(), FP, "");
      self.emit.instr("move", &[SP, T0]);
      self.emit.instr("jr", &[RA]);
    }
    self.emit.reset_depth();
    Ok(())
  }

  fn check_effect(&self, before: i32, expected: i32, what: &str, at: &Ident) -> CompileResult<()> {
    let actual = self.emit.depth() - before;
    if actual != expected {
      return Err(CompileError::internal(format!(
        "{what} near {} changed the stack by {actual} words, expected {expected}",
        at.pos
      )));
    }
    Ok(())
  }

  fn gen_stmts(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
    for stmt in stmts {
      let before = self.emit.depth();
      self.gen_stmt(stmt)?;
      let actual = self.emit.depth() - before;
      if actual != 0 {
        return Err(CompileError::internal(format!(
          "statement changed the stack by {actual} words"
        )));
      }
    }
    Ok(())
  }

  fn gen_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Print(exp) => {
        let is_string = self.is_string(exp)?;
        self.gen_exp(exp)?;
        self.emit.pop(A0);
        self
          .emit
          .instr("li", &[V0, if is_string { "4" } else { "1" }]);
        self.emit.instr("syscall", &[]);
      }
      Stmt::Assign { target, value } => {
        self.gen_exp(value)?;
        self.emit.pop(T0);
        self.store(target, T0)?;
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        let else_label = self.emit.fresh_label();
        let end_label = self.emit.fresh_label();
        self.gen_exp(cond)?;
        self.emit.pop(T0);
        self.emit.instr("beq", &[T0, ZERO, &else_label]);
        self.gen_stmts(then_branch)?;
        self.emit.instr("b", &[&end_label]);
        self.emit.label(&else_label);
        if let Some(else_branch) = else_branch {
          self.gen_stmts(else_branch)?;
        }
        self.emit.label(&end_label);
      }
      Stmt::While { cond, body } => {
        let top_label = self.emit.fresh_label();
        let end_label = self.emit.fresh_label();
        self.emit.label(&top_label);
        self.gen_exp(cond)?;
        self.emit.pop(T0);
        self.emit.instr("beq", &[T0, ZERO, &end_label]);
        self.gen_stmts(body)?;
        self.emit.instr("b", &[&top_label]);
        self.emit.label(&end_label);
      }
      Stmt::DoWhile { body, cond } => {
        let top_label = self.emit.fresh_label();
        self.emit.label(&top_label);
        self.gen_stmts(body)?;
        self.gen_exp(cond)?;
        self.emit.pop(T0);
        self.emit.instr("bne", &[T0, ZERO, &top_label]);
      }
      Stmt::Call(call) => self.gen_call(call)?,
      Stmt::Return { value, .. } => {
        if let Some(value) = value {
          self.gen_exp(value)?;
          self.emit.pop(V0);
        }
        self.emit.instr("b", &[&self.exit_label]);
      }
      Stmt::Block(body) => self.gen_stmts(&body.stmts)?,
      Stmt::Switch { scrutinee, groups } => {
        let end_label = self.emit.fresh_label();
        let group_labels: Vec<String> = groups.iter().map(|_| self.emit.fresh_label()).collect();

        self.gen_exp(scrutinee)?;
        self.emit.pop(T0);
        let mut default_label = None;
        for (group, label) in groups.iter().zip(&group_labels) {
          match group.label {
            SwitchLabel::Case { value, .. } => {
              self.emit.instr("li", &[T1, &value.to_string()]);
              self.emit.instr("beq", &[T0, T1, label]);
            }
            SwitchLabel::Default { .. } => {
              default_label.get_or_insert(label);
            }
          }
        }
        self
          .emit
          .instr("b", &[default_label.unwrap_or(&end_label)]);

        for (group, label) in groups.iter().zip(&group_labels) {
          self.emit.label(label);
          self.gen_stmts(&group.stmts)?;
          self.emit.instr("b", &[&end_label]);
        }
        self.emit.label(&end_label);
      }
    }
    Ok(())
  }

  fn gen_exp(&mut self, exp: &Exp) -> CompileResult<()> {
    let before = self.emit.depth();
    self.gen_exp_inner(exp)?;
    let actual = self.emit.depth() - before;
    if actual != 1 {
      return Err(CompileError::internal(format!(
        "expression at {} changed the stack by {actual} words, expected 1",
        exp.pos()
      )));
    }
    Ok(())
  }

  fn gen_exp_inner(&mut self, exp: &Exp) -> CompileResult<()> {
    match exp {
      Exp::IntLit { value, .. } => {
        self.emit.instr("li", &[T0, &value.to_string()]);
        self.emit.push(T0);
      }
      Exp::StrLit { value, .. } => {
        let label = self.emit.intern_string(value);
        self.emit.instr("la", &[T0, &label]);
        self.emit.push(T0);
      }
      Exp::True(_) => {
        self.emit.instr("li", &[T0, TRUE]);
        self.emit.push(T0);
      }
      Exp::False(_) => {
        self.emit.instr("li", &[T0, FALSE]);
        self.emit.push(T0);
      }
      Exp::ReadInt(_) => {
        self.emit.instr("li", &[V0, "5"]);
        self.emit.instr("syscall", &[]);
        self.emit.push(V0);
      }
      Exp::Id(ident) => {
        self.load(ident, T0)?;
        self.emit.push(T0);
      }
      Exp::Call(call) => {
        self.gen_call(call)?;
        self.emit.push(V0);
      }
      Exp::Unary { op, operand } => {
        self.gen_exp(operand)?;
        self.emit.pop(T0);
        let opcode = match op {
          UnaryOp::Neg => "neg",
          UnaryOp::Not => "not",
        };
        self.emit.instr(opcode, &[T0, T0]);
        self.emit.push(T0);
      }
      Exp::Binary { op, lhs, rhs } => {
        self.gen_exp(lhs)?;
        self.gen_exp(rhs)?;
        self.emit.pop(T1);
        self.emit.pop(T0);
        self.gen_binary(*op);
      }
      Exp::Assign { target, value } => {
        self.gen_exp(value)?;
        self.emit.pop(T0);
        self.store(target, T0)?;
        self.emit.push(T0);
      }
    }
    Ok(())
  }

  /// Combine `$t0` (left) and `$t1` (right) and push the result.
  fn gen_binary(&mut self, op: BinaryOp) {
    let arithmetic = match op {
      BinaryOp::Add => "add",
      BinaryOp::Sub => "sub",
      BinaryOp::Mul => "mul",
      BinaryOp::Div => "div",
      BinaryOp::Mod => "rem",
      BinaryOp::And => "and",
      BinaryOp::Or => "or",
      BinaryOp::Pow => return self.gen_power(),
      BinaryOp::Eq => return self.gen_compare("beq"),
      BinaryOp::Ne => return self.gen_compare("bne"),
      BinaryOp::Lt => return self.gen_compare("blt"),
      BinaryOp::Gt => return self.gen_compare("bgt"),
      BinaryOp::Le => return self.gen_compare("ble"),
      BinaryOp::Ge => return self.gen_compare("bge"),
    };
    self.emit.instr(arithmetic, &[T0, T0, T1]);
    self.emit.push(T0);
  }

  /// Materialise the outcome of `branch $t0, $t1` as TRUE or FALSE.
  fn gen_compare(&mut self, branch: &str) {
    let true_label = self.emit.fresh_label();
    let done_label = self.emit.fresh_label();
    self.emit.instr(branch, &[T0, T1, &true_label]);
    self.emit.instr("li", &[A0, FALSE]);
    self.emit.push(A0);
    self.emit.instr("b", &[&done_label]);
    // only one of the two pushes runs
    self.emit.discard(1);
    self.emit.label(&true_label);
    self.emit.instr("li", &[A0, TRUE]);
    self.emit.push(A0);
    self.emit.label(&done_label);
  }

  /// `$t0 ^ $t1` by repeated multiplication; non-positive exponents give 1.
  fn gen_power(&mut self) {
    let loop_label = self.emit.fresh_label();
    let done_label = self.emit.fresh_label();
    self.emit.instr("li", &[A0, "1"]);
    self.emit.label(&loop_label);
    self.emit.instr("blez", &[T1, &done_label]);
    self.emit.instr("mul", &[A0, A0, T0]);
    self.emit.instr("subu", &[T1, T1, "1"]);
    self.emit.instr("b", &[&loop_label]);
    self.emit.label(&done_label);
    self.emit.push(A0);
  }

  /// Push the arguments, jump, and account for the callee popping them.
  fn gen_call(&mut self, call: &CallExp) -> CompileResult<()> {
    let (_, symbol) = self.resolution.expect_bound(&call.callee)?;
    if !symbol.is_method() {
      return Err(CompileError::internal(format!(
        "call of non-method `{}` reached code generation",
        call.callee.name
      )));
    }
    let label = global_label(symbol)?.to_string();
    for arg in &call.args {
      self.gen_exp(arg)?;
    }
    self.emit.instr("jal", &[&label]);
    self.emit.discard(call.args.len());
    Ok(())
  }

  fn load(&mut self, ident: &Ident, reg: &str) -> CompileResult<()> {
    match address(self.resolution, ident)? {
      Address::Frame(offset) => self.emit.indexed("lw", reg, offset, FP, ""),
      Address::Label(label) => self.emit.instr("lw", &[reg, &label]),
    }
    Ok(())
  }

  fn store(&mut self, ident: &Ident, reg: &str) -> CompileResult<()> {
    match address(self.resolution, ident)? {
      Address::Frame(offset) => self.emit.indexed("sw", reg, offset, FP, ""),
      Address::Label(label) => self.emit.instr("sw", &[reg, &label]),
    }
    Ok(())
  }

  /// Whether `exp` evaluates to a string address rather than a number.
  fn is_string(&self, exp: &Exp) -> CompileResult<bool> {
    let ty = match exp {
      Exp::StrLit { .. } => Type::String,
      Exp::Id(ident) | Exp::Assign { target: ident, .. } => {
        self.resolution.expect_bound(ident)?.1.ty
      }
      Exp::Call(call) => self.resolution.expect_bound(&call.callee)?.1.ty,
      Exp::IntLit { .. }
      | Exp::True(_)
      | Exp::False(_)
      | Exp::ReadInt(_)
      | Exp::Unary { .. }
      | Exp::Binary { .. } => return Ok(false),
    };
    Ok(ty == Type::String)
  }
}

enum Address {
  Frame(i32),
  Label(String),
}

fn address(resolution: &Resolution, ident: &Ident) -> CompileResult<Address> {
  let (_, symbol) = resolution.expect_bound(ident)?;
  if symbol.is_method() {
    return Err(CompileError::internal(format!(
      "method `{}` used as a variable reached code generation",
      ident.name
    )));
  }
  match &symbol.storage {
    Storage::Local {
      offset: Some(offset),
    } => Ok(Address::Frame(*offset)),
    Storage::Local { offset: None } => Err(CompileError::internal(format!(
      "local `{}` has no frame offset",
      ident.name
    ))),
    Storage::Global { label } => Ok(Address::Label(label.clone())),
  }
}

fn global_label(symbol: &Symbol) -> CompileResult<&str> {
  symbol.label().ok_or_else(|| {
    CompileError::internal(format!("`{}` has no assembly label", symbol.name))
  })
}

#[cfg(test)]
mod tests {
  use rustc_hash::FxHashSet;

  use super::*;
  use crate::diag::Reporter;
  use crate::parser::parse;
  use crate::resolve::resolve;
  use crate::tokenizer::tokenize;

  fn compile_with(source: &str, options: &Options) -> String {
    let program = parse(tokenize(source).unwrap(), source).unwrap();
    let mut reporter = Reporter::new();
    let mut resolution = resolve(&program, &mut reporter, options);
    assert_eq!(reporter.fatal_count(), 0, "{:?}", reporter.diagnostics());
    generate(&program, &mut resolution, options).unwrap()
  }

  fn compile(source: &str) -> String {
    compile_with(source, &Options::default().with_annotations(false))
  }

  fn in_main(body: &str) -> String {
    compile(&format!(
      "public class T {{ public static void main() {{ {body} }} }}"
    ))
  }

  /// Instruction lines with their whitespace collapsed, labels dropped.
  fn instructions(asm: &str) -> Vec<String> {
    asm
      .lines()
      .filter(|line| line.starts_with('\t'))
      .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
      .collect()
  }

  fn contains_sequence(haystack: &[String], needle: &[&str]) -> bool {
    haystack
      .windows(needle.len())
      .any(|window| window.iter().zip(needle).all(|(a, b)| a == b))
  }

  #[test]
  fn addition_assigned_to_a_local() {
    let asm = in_main("int x; x = 3 + 4;");
    let lines = instructions(&asm);
    assert!(contains_sequence(
      &lines,
      &[
        "li $t0, 3",
        "sw $t0, 0($sp)",
        "subu $sp, $sp, 4",
        "li $t0, 4",
        "sw $t0, 0($sp)",
        "subu $sp, $sp, 4",
        "addu $sp, $sp, 4",
        "lw $t1, 0($sp)",
        "addu $sp, $sp, 4",
        "lw $t0, 0($sp)",
        "add $t0, $t0, $t1",
        "sw $t0, 0($sp)",
        "subu $sp, $sp, 4",
        "addu $sp, $sp, 4",
        "lw $t0, 0($sp)",
        "sw $t0, -8($fp)",
      ]
    ));
  }

  #[test]
  fn comparison_materialises_a_boolean() {
    let asm = in_main("boolean b; b = 1 < 2;");
    // .L0 is the exit label of main
    assert!(asm.contains(
      "\tblt   $t0, $t1, .L1\n\
       \tli    $a0, 0\n\
       \tsw    $a0, 0($sp)\n\
       \tsubu  $sp, $sp, 4\n\
       \tb     .L2\n\
       .L1:\n\
       \tli    $a0, -1\n\
       \tsw    $a0, 0($sp)\n\
       \tsubu  $sp, $sp, 4\n\
       .L2:\n"
    ));
  }

  #[test]
  fn main_exits_through_syscall() {
    let asm = in_main("");
    assert!(asm.contains("\t.globl main\nmain:\n"));
    assert!(asm.ends_with(".L0:\n\tli    $v0, 10\n\tsyscall\n"));
    assert!(!asm.contains("jr"));
  }

  #[test]
  fn other_methods_restore_the_caller_frame() {
    let asm = compile(
      "public class T {
         public static int id(int a, int b) { int t; return a; }
         public static void main() { }
       }",
    );
    let lines = instructions(&asm);
    assert!(contains_sequence(
      &lines,
      &[
        "sw $ra, 0($sp)",
        "subu $sp, $sp, 4",
        "sw $fp, 0($sp)",
        "subu $sp, $sp, 4",
        "addu $fp, $sp, 16",
        "subu $sp, $sp, 4",
        "lw $t0, 0($fp)",
      ]
    ));
    assert!(asm.contains(
      "\tlw    $ra, -8($fp)\n\
       \tmove  $t0, $fp\n\
       \tlw    $fp, -12($fp)\n\
       \tmove  $sp, $t0\n\
       \tjr    $ra\n"
    ));
    assert!(asm.contains("_id:\n"));
  }

  #[test]
  fn calls_push_arguments_and_result() {
    let asm = compile(
      "public class T {
         public static int f(int a) { return a; }
         public static void main() { f(1); print(f(2)); }
       }",
    );
    let lines = instructions(&asm);
    assert!(contains_sequence(
      &lines,
      &["li $t0, 1", "sw $t0, 0($sp)", "subu $sp, $sp, 4", "jal _f", "li $t0, 2"]
    ));
    assert!(contains_sequence(
      &lines,
      &[
        "jal _f",
        "sw $v0, 0($sp)",
        "subu $sp, $sp, 4",
        "addu $sp, $sp, 4",
        "lw $a0, 0($sp)",
        "li $v0, 1",
        "syscall",
      ]
    ));
  }

  #[test]
  fn globals_live_in_the_data_section() {
    let asm = compile(
      "public class T {
         static int count;
         public static void main() { count = count + 1; }
       }",
    );
    assert!(asm.starts_with("\t.data\n\t.align 2\n_count:\n\t.space 4\n"));
    assert!(asm.contains("\tlw    $t0, _count\n"));
    assert!(asm.contains("\tsw    $t0, _count\n"));
  }

  #[test]
  fn strings_print_with_syscall_four() {
    let asm = in_main("print(\"hi\"); print(\"hi\");");
    let lines = instructions(&asm);
    assert!(contains_sequence(
      &lines,
      &["la $t0, .L1", "sw $t0, 0($sp)", "subu $sp, $sp, 4"]
    ));
    assert!(lines.iter().any(|line| line == "li $v0, 4"));
    assert!(asm.ends_with("\t.data\n.L1:\n\t.asciiz \"hi\"\n"));
  }

  #[test]
  fn if_else_branches_on_false() {
    let asm = in_main("if (true) { print(1); } else { print(2); }");
    let lines = instructions(&asm);
    assert!(contains_sequence(
      &lines,
      &["lw $t0, 0($sp)", "beq $t0, $zero, .L1"]
    ));
    assert!(asm.contains("\tb     .L2\n.L1:\n"));
  }

  #[test]
  fn switch_dispatches_then_jumps_to_end() {
    let asm = in_main("switch (2) { case 1: print(1); case 2: print(2); default: print(3); }");
    let lines = instructions(&asm);
    // .L1 is the end label; groups are .L2, .L3 and .L4
    assert!(contains_sequence(
      &lines,
      &[
        "lw $t0, 0($sp)",
        "li $t1, 1",
        "beq $t0, $t1, .L2",
        "li $t1, 2",
        "beq $t0, $t1, .L3",
        "b .L4",
      ]
    ));
    assert_eq!(lines.iter().filter(|line| *line == "b .L1").count(), 3);
  }

  #[test]
  fn switch_without_default_falls_out() {
    let asm = in_main("switch (5) { case 1: }");
    let lines = instructions(&asm);
    assert!(contains_sequence(&lines, &["beq $t0, $t1, .L2", "b .L1"]));
  }

  #[test]
  fn loops_and_power_are_balanced() {
    let asm = in_main(
      "int i; i = 0; while (i < 3) { i = i + 2 ^ 2; } do { i = i - 1; } while (i > 0 && !false);",
    );
    assert!(asm.contains("blez"));
    assert!(asm.contains("\tbne   $t0, $zero, "));
  }

  #[test]
  fn labels_are_unique_across_nested_control_flow() {
    let asm = compile(
      "public class T {
         public static int f(int n) {
           while (n > 0) {
             if (n == 3) { n = n - 1; } else { switch (n) { case 1: if (n <= 1) { } case 2: } }
             do { n = n - 1; } while (n >= 10 || n != 7);
           }
           return n;
         }
         public static void main() {
           int i;
           i = 0;
           if (i < 2) { while (i != 4) { i = i + 1; } }
           switch (f(i)) { case 0: print(i > 1); default: print(i == 0); }
         }
       }",
    );

    let defined: Vec<&str> = asm
      .lines()
      .filter_map(|line| line.strip_suffix(':'))
      .filter(|label| label.starts_with(".L"))
      .collect();
    let unique: FxHashSet<&str> = defined.iter().copied().collect();
    assert!(defined.len() > 10, "{defined:?}");
    assert_eq!(unique.len(), defined.len(), "{defined:?}");

    for line in instructions(&asm) {
      if let Some(target) = line.split(' ').last().filter(|op| op.starts_with(".L")) {
        assert!(unique.contains(target), "branch to undefined {target}");
      }
    }
  }

  #[test]
  fn annotations_mark_pushes() {
    let asm = compile_with(
      "public class T { public static void main() { print(1); } }",
      &Options::default(),
    );
    assert!(asm.contains("\t\t#PUSH"));
    assert!(asm.contains("\t\t# prologue\n"));
  }

  #[test]
  fn unbound_identifier_is_an_internal_error() {
    let source = "public class T { public static void main() { x = 1; } }";
    let program = parse(tokenize(source).unwrap(), source).unwrap();
    let mut reporter = Reporter::new();
    let mut resolution = resolve(&program, &mut reporter, &Options::default());
    let err = generate(&program, &mut resolution, &Options::default()).unwrap_err();
    assert!(matches!(err, CompileError::Internal { .. }));
  }
}
