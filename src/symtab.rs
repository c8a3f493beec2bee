//! Symbol records and the scope stack used during name resolution.
//!
//! The table is deliberately policy-free: `insert` writes into the innermost
//! scope unconditionally and duplicate detection is left to the caller, who
//! checks `lookup_local` first. Symbols live in an arena owned by the table and
//! are addressed by [`SymbolId`]; popping a scope only forgets the names.

use rustc_hash::FxHashMap;

use crate::error::{CompileError, CompileResult};
use crate::ids::SymbolId;
use crate::ty::Type;

/// Where a symbol's value lives at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
  /// Addressed by an assembly label; fields and methods.
  Global { label: String },
  /// Addressed relative to `$fp`. The offset is filled in by frame layout.
  Local { offset: Option<i32> },
}

/// Compiled form of one declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
  pub name: String,
  /// Declared type; the return type for methods.
  pub ty: Type,
  /// Ordered parameter types, present only for methods.
  pub params: Option<Vec<Type>>,
  pub storage: Storage,
}

impl Symbol {
  pub fn global(name: impl Into<String>, ty: Type, label: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ty,
      params: None,
      storage: Storage::Global {
        label: label.into(),
      },
    }
  }

  pub fn local(name: impl Into<String>, ty: Type) -> Self {
    Self {
      name: name.into(),
      ty,
      params: None,
      storage: Storage::Local { offset: None },
    }
  }

  pub fn method(
    name: impl Into<String>,
    ret: Type,
    params: Vec<Type>,
    label: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      ty: ret,
      params: Some(params),
      storage: Storage::Global {
        label: label.into(),
      },
    }
  }

  pub fn is_method(&self) -> bool {
    self.params.is_some()
  }

  pub fn label(&self) -> Option<&str> {
    match &self.storage {
      Storage::Global { label } => Some(label),
      Storage::Local { .. } => None,
    }
  }

  /// Record the frame offset of a local. Globals have no frame slot.
  pub fn assign_offset(&mut self, offset: i32) -> CompileResult<()> {
    match &mut self.storage {
      Storage::Local { offset: slot } => {
        *slot = Some(offset);
        Ok(())
      }
      Storage::Global { .. } => Err(CompileError::internal(format!(
        "global `{}` cannot receive a frame offset",
        self.name
      ))),
    }
  }
}

/// Every symbol declared in a compilation unit, indexed by [`SymbolId`].
#[derive(Debug, Clone, Default)]
pub struct SymbolArena {
  entries: Vec<Symbol>,
}

impl SymbolArena {
  pub fn alloc(&mut self, symbol: Symbol) -> SymbolId {
    let id = SymbolId::from_raw(self.entries.len() as u32);
    self.entries.push(symbol);
    id
  }

  pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
    self.entries.get(id.index())
  }

  pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
    self.entries.get_mut(id.index())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
    self
      .entries
      .iter()
      .enumerate()
      .map(|(index, symbol)| (SymbolId::from_raw(index as u32), symbol))
  }
}

type Scope = FxHashMap<String, SymbolId>;

/// Stack of scopes, innermost last.
#[derive(Debug, Default)]
pub struct SymbolTable {
  scopes: Vec<Scope>,
  symbols: SymbolArena,
  entered: usize,
  exited: usize,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Push an empty scope.
  pub fn enter_scope(&mut self) {
    self.scopes.push(Scope::default());
    self.entered += 1;
    log::trace!("enter scope (depth {})", self.scopes.len());
  }

  /// Pop the innermost scope. Popping an empty stack does nothing.
  pub fn exit_scope(&mut self) {
    if self.scopes.pop().is_some() {
      self.exited += 1;
      log::trace!("exit scope (depth {})", self.scopes.len());
    }
  }

  /// Find `name` in the innermost scope that declares it.
  pub fn lookup(&self, name: &str) -> Option<SymbolId> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).copied())
  }

  /// Find `name` in the innermost scope only.
  pub fn lookup_local(&self, name: &str) -> Option<SymbolId> {
    self.scopes.last()?.get(name).copied()
  }

  /// Store `symbol` and bind its name in the innermost scope, replacing any
  /// binding of that name there. With no open scope the symbol is stored but
  /// not visible by name.
  pub fn insert(&mut self, symbol: Symbol) -> SymbolId {
    let name = symbol.name.clone();
    let id = self.symbols.alloc(symbol);
    if let Some(scope) = self.scopes.last_mut() {
      scope.insert(name, id);
    }
    id
  }

  pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
    self.symbols.get(id)
  }

  /// Number of open scopes.
  pub fn depth(&self) -> usize {
    self.scopes.len()
  }

  /// `(enter_scope calls, effective exit_scope calls)` since creation.
  pub fn scope_events(&self) -> (usize, usize) {
    (self.entered, self.exited)
  }

  /// Discard the scope stack and keep the symbols.
  pub fn into_symbols(self) -> SymbolArena {
    self.symbols
  }
}
