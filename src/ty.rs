use std::fmt;

/// Bytes in one machine word; every value and stack slot is one word.
pub const WORD_SIZE: i32 = 4;

/// Types synthesised by the checker. `Error` absorbs: once an expression is
/// typed `Error`, nothing built on top of it reports again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
  Int,
  Bool,
  String,
  Void,
  Error,
}

impl Type {
  pub fn is_error(self) -> bool {
    matches!(self, Type::Error)
  }

  pub fn is_integer(self) -> bool {
    matches!(self, Type::Int)
  }

  pub fn is_boolean(self) -> bool {
    matches!(self, Type::Bool)
  }

  pub fn name(self) -> &'static str {
    match self {
      Type::Int => "int",
      Type::Bool => "boolean",
      Type::String => "string",
      Type::Void => "void",
      Type::Error => "error",
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
