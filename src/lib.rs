//! Crate root: wires together the compilation pipeline.
//!
//! Each stage hands the next one an immutable tree plus side tables:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the program tree.
//! - `resolve` binds identifiers to symbols through the `symtab` scope stack.
//! - `typecheck` synthesises types and reports misuse.
//! - `codegen` lays out frames and lowers the tree into MIPS assembly.
//! - `diag` and `error` centralise reporting shared by the other modules.
//!
//! The two semantic passes only record diagnostics; [`compile`] stops at the
//! first pass boundary where a fatal one was recorded.

pub mod ast;
pub mod codegen;
pub mod diag;
pub mod error;
pub mod ids;
pub mod options;
pub mod parser;
pub mod resolve;
pub mod symtab;
pub mod tokenizer;
pub mod ty;
pub mod typecheck;
pub mod unparse;

pub use diag::{Diagnostic, DiagnosticKind, Pass, Pos, Severity};
pub use error::{CompileError, CompileResult};
pub use options::Options;

use diag::Reporter;

/// Output of a successful compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
  pub assembly: String,
  /// Non-fatal diagnostics recorded along the way.
  pub warnings: Vec<Diagnostic>,
}

/// Compile a source string into SPIM assembly.
pub fn compile(source: &str, options: &Options) -> CompileResult<Compilation> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens, source)?;
  log::debug!(
    "parsed class {} with {} declarations",
    program.name.name,
    program.decls.len()
  );

  let mut reporter = Reporter::new();
  let mut resolution = resolve::resolve(&program, &mut reporter, options);
  reporter.gate(Pass::NameResolution)?;

  typecheck::check_program(&program, &resolution, &mut reporter)?;
  reporter.gate(Pass::TypeChecking)?;

  let assembly = codegen::generate(&program, &mut resolution, options)?;
  Ok(Compilation {
    assembly,
    warnings: reporter.into_diagnostics(),
  })
}

/// Compile with default options, keeping only the assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  compile(source, &Options::default()).map(|compilation| compilation.assembly)
}

/// Print the parsed program back as source. Identifiers are annotated with
/// their types when name resolution succeeds.
pub fn render_ast(source: &str, options: &Options) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens, source)?;
  let mut reporter = Reporter::new();
  let resolution = resolve::resolve(&program, &mut reporter, options);
  let resolution = (reporter.fatal_count() == 0).then_some(&resolution);
  Ok(unparse::unparse(&program, resolution))
}

/// One line per token, for inspecting the lexer.
pub fn render_tokens(source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  Ok(tokenizer::dump(&tokens, source))
}
