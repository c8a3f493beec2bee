//! Activation record layout.
//!
//! The caller pushes arguments left to right, so once the callee has pushed
//! `$ra` and `$fp` and pointed `$fp` at the caller's stack top, the frame
//! reads downward from `$fp`:
//!
//! ```text
//!   0($fp)             parameter 0
//!  -4($fp)             parameter 1
//!   ...
//!  -4n($fp)            saved $ra
//!  -4n-4($fp)          saved $fp
//!  -4n-8($fp)          local 0
//!   ...
//! ```
//!
//! Every local declared anywhere in the method body, nested blocks included,
//! gets its own slot in declaration order. Slots are not shared between
//! sibling blocks.

use crate::ast::{Body, Ident, MethodDecl, Stmt};
use crate::error::{CompileError, CompileResult};
use crate::resolve::Resolution;
use crate::ty::WORD_SIZE;

/// Slot counts for one method's activation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
  pub params: usize,
  pub locals: usize,
}

impl Frame {
  pub fn param_offset(&self, index: usize) -> i32 {
    -WORD_SIZE * index as i32
  }

  pub fn return_address_offset(&self) -> i32 {
    -WORD_SIZE * self.params as i32
  }

  pub fn saved_fp_offset(&self) -> i32 {
    self.return_address_offset() - WORD_SIZE
  }

  pub fn local_offset(&self, index: usize) -> i32 {
    self.saved_fp_offset() - WORD_SIZE * (index as i32 + 1)
  }

  /// Distance from `$sp` after the two saves up to the new `$fp`.
  pub fn fp_adjust(&self) -> i32 {
    WORD_SIZE * (self.params as i32 + 2)
  }

  pub fn locals_size(&self) -> i32 {
    WORD_SIZE * self.locals as i32
  }
}

/// Assign a frame offset to every parameter and local of `method`.
pub fn layout(method: &MethodDecl, resolution: &mut Resolution) -> CompileResult<Frame> {
  let mut locals = Vec::new();
  collect_body(&method.body, &mut locals);

  let frame = Frame {
    params: method.formals.len(),
    locals: locals.len(),
  };

  for (index, formal) in method.formals.iter().enumerate() {
    assign(resolution, &formal.name, frame.param_offset(index))?;
  }
  for (index, local) in locals.iter().enumerate() {
    assign(resolution, local, frame.local_offset(index))?;
  }

  log::debug!(
    "frame for {}: {} params, {} locals",
    method.name.name,
    frame.params,
    frame.locals
  );
  Ok(frame)
}

fn assign(resolution: &mut Resolution, ident: &Ident, offset: i32) -> CompileResult<()> {
  let symbol = resolution
    .binding(ident.id)
    .and_then(|id| resolution.symbols.get_mut(id))
    .ok_or_else(|| {
      CompileError::internal(format!("declaration of `{}` has no symbol", ident.name))
    })?;
  symbol.assign_offset(offset)
}

fn collect_body<'a>(body: &'a Body, out: &mut Vec<&'a Ident>) {
  out.extend(body.decls.iter().map(|decl| &decl.name));
  collect_stmts(&body.stmts, out);
}

fn collect_stmts<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a Ident>) {
  for stmt in stmts {
    match stmt {
      Stmt::Block(body) => collect_body(body, out),
      Stmt::If {
        then_branch,
        else_branch,
        ..
      } => {
        collect_stmts(then_branch, out);
        if let Some(else_branch) = else_branch {
          collect_stmts(else_branch, out);
        }
      }
      Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => collect_stmts(body, out),
      Stmt::Switch { groups, .. } => {
        for group in groups {
          collect_stmts(&group.stmts, out);
        }
      }
      Stmt::Print(_) | Stmt::Assign { .. } | Stmt::Call(_) | Stmt::Return { .. } => {}
    }
  }
}
