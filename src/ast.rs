//! Syntax tree for Simple programs.
//!
//! The tree is built once by the parser and never mutated afterwards. Each
//! node owns its children outright. Identifier nodes carry a [`NodeId`] that
//! is unique within the program; name resolution records bindings in a side
//! table keyed by that id instead of writing into the tree.

use crate::diag::Pos;
use crate::ids::NodeId;
use crate::ty::Type;

/// Declared type as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeNode {
  Int,
  Boolean,
  String,
  Void,
}

impl TypeNode {
  pub fn to_type(self) -> Type {
    match self {
      Self::Int => Type::Int,
      Self::Boolean => Type::Bool,
      Self::String => Type::String,
      Self::Void => Type::Void,
    }
  }

  pub fn keyword(self) -> &'static str {
    match self {
      Self::Int => "int",
      Self::Boolean => "boolean",
      Self::String => "string",
      Self::Void => "void",
    }
  }
}

/// An identifier occurrence, either declaring or using a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
  pub id: NodeId,
  pub name: String,
  pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct Program {
  pub name: Ident,
  pub decls: Vec<Decl>,
  /// Number of identifier nodes; every `NodeId` in the tree is below this.
  pub node_count: u32,
}

impl Program {
  pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
    self.decls.iter().filter_map(|decl| match decl {
      Decl::Method(method) => Some(method),
      Decl::Field(_) => None,
    })
  }

  pub fn fields(&self) -> impl Iterator<Item = &VarDecl> {
    self.decls.iter().filter_map(|decl| match decl {
      Decl::Field(field) => Some(field),
      Decl::Method(_) => None,
    })
  }
}

/// Top-level declaration inside the program's class body.
#[derive(Debug, Clone)]
pub enum Decl {
  Field(VarDecl),
  Method(MethodDecl),
}

/// Field, local variable or formal parameter: a type and a name.
#[derive(Debug, Clone)]
pub struct VarDecl {
  pub ty: TypeNode,
  pub name: Ident,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
  pub ret: TypeNode,
  pub name: Ident,
  pub formals: Vec<VarDecl>,
  pub body: Body,
}

/// Declarations followed by statements; used for method bodies and blocks.
#[derive(Debug, Clone, Default)]
pub struct Body {
  pub decls: Vec<VarDecl>,
  pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
  Print(Exp),
  Assign {
    target: Ident,
    value: Exp,
  },
  If {
    cond: Exp,
    then_branch: Vec<Stmt>,
    else_branch: Option<Vec<Stmt>>,
  },
  While {
    cond: Exp,
    body: Vec<Stmt>,
  },
  DoWhile {
    body: Vec<Stmt>,
    cond: Exp,
  },
  Call(CallExp),
  Return {
    pos: Pos,
    value: Option<Exp>,
  },
  Block(Body),
  Switch {
    scrutinee: Exp,
    groups: Vec<SwitchGroup>,
  },
}

#[derive(Debug, Clone)]
pub struct SwitchGroup {
  pub label: SwitchLabel,
  pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchLabel {
  Case { value: i64, pos: Pos },
  Default { pos: Pos },
}

impl SwitchLabel {
  pub fn pos(self) -> Pos {
    match self {
      Self::Case { pos, .. } | Self::Default { pos } => pos,
    }
  }
}

#[derive(Debug, Clone)]
pub struct CallExp {
  pub callee: Ident,
  pub args: Vec<Exp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Pow,
  And,
  Or,
  Eq,
  Ne,
  Lt,
  Gt,
  Le,
  Ge,
}

impl BinaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Mod => "%",
      Self::Pow => "^",
      Self::And => "&&",
      Self::Or => "||",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::Lt => "<",
      Self::Gt => ">",
      Self::Le => "<=",
      Self::Ge => ">=",
    }
  }
}

#[derive(Debug, Clone)]
pub enum Exp {
  IntLit {
    value: i64,
    pos: Pos,
  },
  /// Raw literal text including the surrounding quotes.
  StrLit {
    value: String,
    pos: Pos,
  },
  True(Pos),
  False(Pos),
  Id(Ident),
  Call(CallExp),
  Unary {
    op: UnaryOp,
    operand: Box<Exp>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Exp>,
    rhs: Box<Exp>,
  },
  Assign {
    target: Ident,
    value: Box<Exp>,
  },
  ReadInt(Pos),
}

impl Exp {
  /// Position diagnostics about this expression are reported at: the
  /// leftmost leaf for operators, the callee or target for calls and
  /// assignments.
  pub fn pos(&self) -> Pos {
    match self {
      Self::IntLit { pos, .. } | Self::StrLit { pos, .. } => *pos,
      Self::True(pos) | Self::False(pos) | Self::ReadInt(pos) => *pos,
      Self::Id(ident) => ident.pos,
      Self::Call(call) => call.callee.pos,
      Self::Unary { operand, .. } => operand.pos(),
      Self::Binary { lhs, .. } => lhs.pos(),
      Self::Assign { target, .. } => target.pos,
    }
  }

  pub fn binary(op: BinaryOp, lhs: Exp, rhs: Exp) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn unary(op: UnaryOp, operand: Exp) -> Self {
    Self::Unary {
      op,
      operand: Box::new(operand),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ident(raw: u32, name: &str, line: u32, col: u32) -> Ident {
    Ident {
      id: NodeId::from_raw(raw),
      name: name.to_string(),
      pos: Pos::new(line, col),
    }
  }

  #[test]
  fn binary_position_is_leftmost_operand() {
    let exp = Exp::binary(
      BinaryOp::Add,
      Exp::unary(UnaryOp::Neg, Exp::Id(ident(0, "x", 3, 9))),
      Exp::IntLit {
        value: 1,
        pos: Pos::new(3, 14),
      },
    );
    assert_eq!(exp.pos(), Pos::new(3, 9));
  }

  #[test]
  fn type_nodes_map_to_types() {
    assert_eq!(TypeNode::Boolean.to_type(), Type::Bool);
    assert_eq!(TypeNode::Void.keyword(), "void");
  }
}
