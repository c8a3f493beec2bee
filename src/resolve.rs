//! Name resolution: binds every identifier node to exactly one symbol.
//!
//! The pass walks the tree once, maintaining a [`SymbolTable`] whose scopes
//! follow the lexical nesting of the program. Declarations insert symbols;
//! uses look them up. Each successful lookup is recorded in a side table keyed
//! by [`NodeId`], which later passes read instead of touching the scope stack.

use crate::ast::{Body, CallExp, Decl, Exp, Ident, MethodDecl, Program, Stmt, VarDecl};
use crate::diag::{DiagnosticKind, Reporter};
use crate::error::{CompileError, CompileResult};
use crate::ids::{NodeId, SymbolId};
use crate::options::Options;
use crate::symtab::{Symbol, SymbolArena, SymbolTable};

/// Label of the distinguished entry method.
pub const ENTRY_METHOD: &str = "main";

/// Output of name resolution: the symbols and the identifier bindings.
#[derive(Debug, Clone)]
pub struct Resolution {
  pub symbols: SymbolArena,
  bindings: Vec<Option<SymbolId>>,
  /// `enter_scope` calls made during the pass.
  pub scopes_entered: usize,
  /// `exit_scope` calls made during the pass.
  pub scopes_exited: usize,
  /// Scopes still open when the pass finished.
  pub open_scopes: usize,
}

impl Resolution {
  pub fn binding(&self, id: NodeId) -> Option<SymbolId> {
    self.bindings.get(id.index()).copied().flatten()
  }

  pub fn symbol_of(&self, ident: &Ident) -> Option<&Symbol> {
    self.binding(ident.id).and_then(|id| self.symbols.get(id))
  }

  /// The binding of an identifier that earlier passes guaranteed is bound.
  pub fn expect_bound(&self, ident: &Ident) -> CompileResult<(SymbolId, &Symbol)> {
    self
      .binding(ident.id)
      .and_then(|id| self.symbols.get(id).map(|symbol| (id, symbol)))
      .ok_or_else(|| {
        CompileError::internal(format!(
          "identifier `{}` at {} has no binding",
          ident.name, ident.pos
        ))
      })
  }

  /// Number of identifier nodes that received a binding.
  pub fn bound_count(&self) -> usize {
    self.bindings.iter().filter(|binding| binding.is_some()).count()
  }
}

/// Resolve every name in `program`, reporting problems to `reporter`.
pub fn resolve(program: &Program, reporter: &mut Reporter, options: &Options) -> Resolution {
  let mut resolver = Resolver {
    table: SymbolTable::new(),
    bindings: vec![None; program.node_count as usize],
    reporter,
    options: *options,
  };
  resolver.resolve_program(program);

  let (scopes_entered, scopes_exited) = resolver.table.scope_events();
  let open_scopes = resolver.table.depth();
  let symbols = resolver.table.into_symbols();
  log::debug!(
    "name resolution: {} symbols, {scopes_entered} scopes entered, {scopes_exited} exited",
    symbols.len()
  );
  Resolution {
    symbols,
    bindings: resolver.bindings,
    scopes_entered,
    scopes_exited,
    open_scopes,
  }
}

struct Resolver<'r> {
  table: SymbolTable,
  bindings: Vec<Option<SymbolId>>,
  reporter: &'r mut Reporter,
  options: Options,
}

impl Resolver<'_> {
  fn resolve_program(&mut self, program: &Program) {
    self.table.enter_scope();

    for decl in &program.decls {
      match decl {
        Decl::Field(field) => self.declare_field(field),
        Decl::Method(method) => self.resolve_method(method),
      }
    }

    let has_entry = self
      .table
      .lookup_local(ENTRY_METHOD)
      .and_then(|id| self.table.symbol(id))
      .is_some_and(|symbol| symbol.params.as_ref().is_some_and(Vec::is_empty));
    if !has_entry {
      self
        .reporter
        .fatal(program.name.pos, DiagnosticKind::MissingMain);
    }

    self.table.exit_scope();
  }

  fn declare_field(&mut self, field: &VarDecl) {
    let name = &field.name.name;
    let symbol = Symbol::global(name, field.ty.to_type(), format!("_{name}"));
    self.declare(&field.name, symbol);
  }

  fn declare_local(&mut self, decl: &VarDecl) {
    let symbol = Symbol::local(&decl.name.name, decl.ty.to_type());
    self.declare(&decl.name, symbol);
  }

  /// Insert `symbol` unless its name is already taken in the innermost scope.
  fn declare(&mut self, name: &Ident, symbol: Symbol) {
    if self.table.lookup_local(&name.name).is_some() {
      self
        .reporter
        .fatal(name.pos, DiagnosticKind::MultiplyDeclared);
      return;
    }
    let id = self.table.insert(symbol);
    self.bind(name, id);
  }

  fn resolve_method(&mut self, method: &MethodDecl) {
    let name = &method.name.name;
    let label = if name == ENTRY_METHOD {
      ENTRY_METHOD.to_string()
    } else {
      format!("_{name}")
    };
    let params = method
      .formals
      .iter()
      .map(|formal| formal.ty.to_type())
      .collect();
    // visible before the body so recursive calls resolve
    self.declare(
      &method.name,
      Symbol::method(name, method.ret.to_type(), params, label),
    );

    self.table.enter_scope();
    for formal in &method.formals {
      self.declare_local(formal);
    }
    self.resolve_body_contents(&method.body);
    self.table.exit_scope();
  }

  fn resolve_body_contents(&mut self, body: &Body) {
    for decl in &body.decls {
      self.declare_local(decl);
    }
    self.resolve_stmts(&body.stmts);
  }

  fn resolve_scoped(&mut self, stmts: &[Stmt]) {
    self.table.enter_scope();
    self.resolve_stmts(stmts);
    self.table.exit_scope();
  }

  fn resolve_stmts(&mut self, stmts: &[Stmt]) {
    for stmt in stmts {
      self.resolve_stmt(stmt);
    }
  }

  fn resolve_stmt(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::Print(exp) => self.resolve_exp(exp),
      Stmt::Assign { target, value } => {
        self.resolve_use(target);
        self.resolve_exp(value);
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        self.resolve_exp(cond);
        self.resolve_scoped(then_branch);
        if let Some(else_branch) = else_branch {
          self.resolve_scoped(else_branch);
        }
      }
      Stmt::While { cond, body } => {
        self.resolve_exp(cond);
        self.resolve_scoped(body);
      }
      Stmt::DoWhile { body, cond } => {
        self.resolve_scoped(body);
        self.resolve_exp(cond);
      }
      Stmt::Call(call) => self.resolve_call(call),
      Stmt::Return { value, .. } => {
        if let Some(value) = value {
          self.resolve_exp(value);
        }
      }
      Stmt::Block(body) => {
        self.table.enter_scope();
        self.resolve_body_contents(body);
        self.table.exit_scope();
      }
      Stmt::Switch { scrutinee, groups } => {
        self.resolve_exp(scrutinee);
        for group in groups {
          if self.options.scoped_switch_groups {
            self.resolve_scoped(&group.stmts);
          } else {
            self.resolve_stmts(&group.stmts);
          }
        }
      }
    }
  }

  fn resolve_call(&mut self, call: &CallExp) {
    self.resolve_use(&call.callee);
    for arg in &call.args {
      self.resolve_exp(arg);
    }
  }

  fn resolve_exp(&mut self, exp: &Exp) {
    match exp {
      Exp::IntLit { .. } | Exp::StrLit { .. } | Exp::True(_) | Exp::False(_) | Exp::ReadInt(_) => {}
      Exp::Id(ident) => self.resolve_use(ident),
      Exp::Call(call) => self.resolve_call(call),
      Exp::Unary { operand, .. } => self.resolve_exp(operand),
      Exp::Binary { lhs, rhs, .. } => {
        self.resolve_exp(lhs);
        self.resolve_exp(rhs);
      }
      Exp::Assign { target, value } => {
        self.resolve_use(target);
        self.resolve_exp(value);
      }
    }
  }

  fn resolve_use(&mut self, ident: &Ident) {
    match self.table.lookup(&ident.name) {
      Some(id) => self.bind(ident, id),
      None => self.reporter.fatal(ident.pos, DiagnosticKind::Undeclared),
    }
  }

  fn bind(&mut self, ident: &Ident, symbol: SymbolId) {
    let index = ident.id.index();
    if index >= self.bindings.len() {
      self.bindings.resize(index + 1, None);
    }
    debug_assert!(self.bindings[index].is_none(), "identifier node bound twice");
    self.bindings[index] = Some(symbol);
  }
}
