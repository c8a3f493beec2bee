//! simplec: compile a Simple program to SPIM assembly.
//!
//! Usage:
//!   simplec [OPTIONS] <INPUT> [-o <OUTPUT>]
//!
//! Examples:
//!   simplec fact.sim -o fact.s
//!   simplec fact.sim --emit ast
//!   RUST_LOG=trace simplec fact.sim --no-comments

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use snafu::ResultExt;

use simplec::error::IoSnafu;
use simplec::{CompileResult, Options};

/// Simple language compiler
#[derive(Parser, Debug)]
#[command(name = "simplec")]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Source file
  #[arg(value_name = "INPUT")]
  input: PathBuf,

  /// Output file; standard output when omitted
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// What to produce
  #[arg(long, value_name = "STAGE", default_value = "asm")]
  emit: EmitStage,

  /// Give each switch case group its own scope
  #[arg(long)]
  scoped_switch: bool,

  /// Leave PUSH/POP and frame comments out of the assembly
  #[arg(long)]
  no_comments: bool,

  /// Log pass progress to stderr
  #[arg(short, long)]
  verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmitStage {
  /// Assembly for SPIM
  Asm,
  /// The parsed program, with resolved types
  Ast,
  /// The token stream
  Tokens,
}

fn main() {
  let args = Args::parse();
  let default_level = if args.verbose { "debug" } else { "warn" };
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

  if let Err(err) = run(&args) {
    eprintln!("{err}");
    process::exit(1);
  }
}

fn run(args: &Args) -> CompileResult<()> {
  let source = fs::read_to_string(&args.input).context(IoSnafu {
    action: "read",
    path: args.input.clone(),
  })?;

  let options = Options::default()
    .with_scoped_switch_groups(args.scoped_switch)
    .with_annotations(!args.no_comments);

  let output = match args.emit {
    EmitStage::Asm => {
      let compilation = simplec::compile(&source, &options)?;
      for warning in &compilation.warnings {
        eprintln!("{warning}");
      }
      compilation.assembly
    }
    EmitStage::Ast => simplec::render_ast(&source, &options)?,
    EmitStage::Tokens => simplec::render_tokens(&source)?,
  };

  match &args.output {
    Some(path) => fs::write(path, output).context(IoSnafu {
      action: "write",
      path: path.clone(),
    }),
    None => {
      print!("{output}");
      Ok(())
    }
  }
}
