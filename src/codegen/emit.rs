//! Line-oriented MIPS assembly writer.
//!
//! Besides formatting, the emitter tracks how many words the generated code
//! has pushed onto the evaluation stack so far. The traversal compares this
//! depth before and after each node to check the stack effect of its code.

pub const SP: &str = "$sp";
pub const FP: &str = "$fp";
pub const RA: &str = "$ra";
pub const V0: &str = "$v0";
pub const A0: &str = "$a0";
pub const T0: &str = "$t0";
pub const T1: &str = "$t1";
pub const ZERO: &str = "$zero";

pub const TRUE: &str = "-1";
pub const FALSE: &str = "0";

/// Opcodes up to this long line their operands up in one column.
const OPCODE_WIDTH: usize = 4;

pub struct Emitter {
  out: String,
  annotate: bool,
  depth: i32,
  next_label: u32,
  strings: Vec<(String, String)>,
}

impl Emitter {
  pub fn new(annotate: bool) -> Self {
    Self {
      out: String::new(),
      annotate,
      depth: 0,
      next_label: 0,
      strings: Vec::new(),
    }
  }

  /// `opcode op1, op2, ...`
  pub fn instr(&mut self, opcode: &str, operands: &[&str]) {
    self.instr_with_comment(opcode, operands, "");
  }

  /// Like [`Emitter::instr`], with a trailing comment when annotation is on.
  pub fn instr_with_comment(&mut self, opcode: &str, operands: &[&str], comment: &str) {
    self.out.push('\t');
    self.out.push_str(opcode);
    if !operands.is_empty() {
      let pad = (OPCODE_WIDTH + 2).saturating_sub(opcode.len()).max(1);
      self.out.push_str(&format!("{:pad$}{}", "", operands.join(", ")));
    }
    if self.annotate && !comment.is_empty() {
      self.out.push_str(&format!("\t\t#{comment}"));
    }
    self.out.push('\n');
  }

  /// `opcode reg, offset(base)`
  pub fn indexed(&mut self, opcode: &str, reg: &str, offset: i32, base: &str, comment: &str) {
    let address = format!("{offset}({base})");
    self.instr_with_comment(opcode, &[reg, &address], comment);
  }

  pub fn label(&mut self, label: &str) {
    self.out.push_str(&format!("{label}:\n"));
  }

  /// A comment on a line of its own, dropped when annotation is off.
  pub fn comment(&mut self, text: &str) {
    if self.annotate {
      self.out.push_str(&format!("\t\t# {text}\n"));
    }
  }

  pub fn push(&mut self, reg: &str) {
    self.indexed("sw", reg, 0, SP, "PUSH");
    self.instr("subu", &[SP, SP, "4"]);
    self.depth += 1;
  }

  pub fn pop(&mut self, reg: &str) {
    self.instr("addu", &[SP, SP, "4"]);
    self.indexed("lw", reg, 0, SP, "POP");
    self.depth -= 1;
  }

  /// Record words removed from the evaluation stack by code other than `pop`,
  /// such as a callee discarding its arguments.
  pub fn discard(&mut self, words: usize) {
    self.depth -= words as i32;
  }

  /// Words pushed and not yet popped since the last reset.
  pub fn depth(&self) -> i32 {
    self.depth
  }

  pub fn reset_depth(&mut self) {
    self.depth = 0;
  }

  /// Mint a label that has not been handed out before.
  pub fn fresh_label(&mut self) -> String {
    let label = format!(".L{}", self.next_label);
    self.next_label += 1;
    log::trace!("minted label {label}");
    label
  }

  /// Label of a `.asciiz` entry holding `literal`, which includes its quotes.
  /// Equal literals share one entry.
  pub fn intern_string(&mut self, literal: &str) -> String {
    if let Some((label, _)) = self.strings.iter().find(|(_, text)| text == literal) {
      return label.clone();
    }
    let label = self.fresh_label();
    self.strings.push((label.clone(), literal.to_string()));
    label
  }

  /// The assembly text, with interned strings appended in a data section.
  pub fn finish(mut self) -> String {
    if !self.strings.is_empty() {
      let strings = std::mem::take(&mut self.strings);
      self.out.push('\n');
      self.instr(".data", &[]);
      for (label, literal) in &strings {
        self.label(label);
        self.instr(".asciiz", &[literal]);
      }
    }
    self.out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn operands_are_aligned_after_short_opcodes() {
    let mut emit = Emitter::new(true);
    emit.instr("li", &[T0, "3"]);
    emit.instr("addu", &[SP, SP, "4"]);
    emit.instr("syscall", &[]);
    emit.instr(".asciiz", &["\"hi\""]);
    assert_eq!(
      emit.finish(),
      "\tli    $t0, 3\n\taddu  $sp, $sp, 4\n\tsyscall\n\t.asciiz \"hi\"\n"
    );
  }

  #[test]
  fn push_and_pop_track_depth() {
    let mut emit = Emitter::new(true);
    emit.push(T0);
    emit.push(T1);
    assert_eq!(emit.depth(), 2);
    emit.pop(T1);
    emit.discard(1);
    assert_eq!(emit.depth(), 0);
    assert_eq!(
      emit.finish(),
      "\tsw    $t0, 0($sp)\t\t#PUSH\n\
       \tsubu  $sp, $sp, 4\n\
       \tsw    $t1, 0($sp)\t\t#PUSH\n\
       \tsubu  $sp, $sp, 4\n\
       \taddu  $sp, $sp, 4\n\
       \tlw    $t1, 0($sp)\t\t#POP\n"
    );
  }

  #[test]
  fn comments_can_be_suppressed() {
    let mut emit = Emitter::new(false);
    emit.comment("prologue");
    emit.push(A0);
    assert_eq!(emit.finish(), "\tsw    $a0, 0($sp)\n\tsubu  $sp, $sp, 4\n");
  }

  #[test]
  fn labels_are_never_reused() {
    let mut emit = Emitter::new(true);
    let first = emit.fresh_label();
    let second = emit.fresh_label();
    assert_ne!(first, second);
    assert_eq!(first, ".L0");
  }

  #[test]
  fn strings_are_interned_once() {
    let mut emit = Emitter::new(true);
    let a = emit.intern_string("\"x\"");
    let b = emit.intern_string("\"x\"");
    let c = emit.intern_string("\"y\"");
    assert_eq!(a, b);
    assert_ne!(a, c);
    let text = emit.finish();
    assert!(text.ends_with("\t.data\n.L0:\n\t.asciiz \"x\"\n.L1:\n\t.asciiz \"y\"\n"));
  }
}
