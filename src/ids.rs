//! Strongly typed identifier wrappers.
//!
//! Identifier nodes and symbols are addressed by index rather than by
//! reference, so the tree stays immutable while side tables map one to the
//! other.

use std::fmt;

macro_rules! define_id {
  ($name:ident) => {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
    pub struct $name(pub u32);

    impl $name {
      /// Construct an identifier from a raw value.
      pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
      }

      pub const fn index(self) -> usize {
        self.0 as usize
      }
    }

    impl fmt::Debug for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, concat!(stringify!($name), "({})"), self.0)
      }
    }
  };
}

define_id!(NodeId);
define_id!(SymbolId);
