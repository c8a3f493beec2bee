//! Recursive-descent parser producing the program tree.
//!
//! Statements and declarations are dispatched on their leading keyword; the
//! expression grammar is a precedence-climbing set of helpers, one per
//! binding level, from assignment (loosest) down to primaries. Every
//! identifier node gets a fresh [`NodeId`] as it is built.

use crate::ast::{
  BinaryOp, Body, CallExp, Decl, Exp, Ident, MethodDecl, Program, Stmt, SwitchGroup, SwitchLabel,
  TypeNode, UnaryOp, VarDecl,
};
use crate::diag::Pos;
use crate::error::{CompileError, CompileResult};
use crate::ids::NodeId;
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Parse a whole compilation unit from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source);

  if stream.is_eof() {
    return Err(stream.error_here("program is empty"));
  }

  stream.skip("public")?;
  stream.skip("class")?;
  let name = stream.get_ident()?;
  stream.skip("{")?;

  let mut decls = Vec::new();
  while !stream.is("}") {
    if stream.is_eof() {
      return Err(stream.error_here("unexpected end of input inside class body"));
    }
    decls.push(parse_decl(&mut stream)?);
  }
  stream.skip("}")?;

  if !stream.is_eof() {
    let token = stream.peek_token();
    let got = describe_token(Some(token), source);
    return Err(CompileError::at(
      source,
      token.pos,
      format!("unexpected token \"{got}\" after class body"),
    ));
  }

  Ok(Program {
    name,
    decls,
    node_count: stream.next_node,
  })
}

fn parse_decl(stream: &mut TokenStream) -> CompileResult<Decl> {
  if stream.equal("static") {
    let ty = parse_var_type(stream)?;
    let name = stream.get_ident()?;
    stream.skip(";")?;
    return Ok(Decl::Field(VarDecl { ty, name }));
  }

  stream.skip("public")?;
  stream.skip("static")?;
  let ret = parse_type(stream)?;
  let name = stream.get_ident()?;
  stream.skip("(")?;
  let mut formals = Vec::new();
  if !stream.is(")") {
    loop {
      let ty = parse_var_type(stream)?;
      let name = stream.get_ident()?;
      formals.push(VarDecl { ty, name });
      if !stream.equal(",") {
        break;
      }
    }
  }
  stream.skip(")")?;
  let body = parse_body(stream)?;

  Ok(Decl::Method(MethodDecl {
    ret,
    name,
    formals,
    body,
  }))
}

fn parse_type(stream: &mut TokenStream) -> CompileResult<TypeNode> {
  let ty = match stream.peek_text() {
    Some("int") => TypeNode::Int,
    Some("boolean") => TypeNode::Boolean,
    Some("string") => TypeNode::String,
    Some("void") => TypeNode::Void,
    _ => {
      let got = describe_token(Some(stream.peek_token()), stream.source);
      return Err(stream.error_here(format!("expected a type, but got \"{got}\"")));
    }
  };
  stream.advance();
  Ok(ty)
}

/// A type for a field, local or formal: anything but `void`.
fn parse_var_type(stream: &mut TokenStream) -> CompileResult<TypeNode> {
  let pos = stream.peek_token().pos;
  let ty = parse_type(stream)?;
  if ty == TypeNode::Void {
    return Err(CompileError::at(
      stream.source,
      pos,
      "only methods may be declared void",
    ));
  }
  Ok(ty)
}

fn starts_type(stream: &TokenStream) -> bool {
  matches!(
    stream.peek_text(),
    Some("int" | "boolean" | "string" | "void")
  )
}

/// `{ vardecl* stmt* }`
fn parse_body(stream: &mut TokenStream) -> CompileResult<Body> {
  stream.skip("{")?;
  let mut decls = Vec::new();
  while starts_type(stream) {
    let ty = parse_var_type(stream)?;
    let name = stream.get_ident()?;
    stream.skip(";")?;
    decls.push(VarDecl { ty, name });
  }
  let stmts = parse_stmts_until(stream, &["}"])?;
  stream.skip("}")?;
  Ok(Body { decls, stmts })
}

/// `{ stmt* }`
fn parse_stmt_list(stream: &mut TokenStream) -> CompileResult<Vec<Stmt>> {
  stream.skip("{")?;
  let stmts = parse_stmts_until(stream, &["}"])?;
  stream.skip("}")?;
  Ok(stmts)
}

fn parse_stmts_until(stream: &mut TokenStream, terminators: &[&str]) -> CompileResult<Vec<Stmt>> {
  let mut stmts = Vec::new();
  while !terminators.iter().any(|t| stream.is(t)) {
    if stream.is_eof() {
      return Err(stream.error_here("unexpected end of input inside statement list"));
    }
    if starts_type(stream) {
      return Err(stream.error_here("declarations must precede statements"));
    }
    stmts.push(parse_stmt(stream)?);
  }
  Ok(stmts)
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  if stream.equal("print") {
    stream.skip("(")?;
    let exp = parse_expr(stream)?;
    stream.skip(")")?;
    stream.skip(";")?;
    return Ok(Stmt::Print(exp));
  }

  if stream.equal("if") {
    let cond = parse_paren_expr(stream)?;
    let then_branch = parse_stmt_list(stream)?;
    let else_branch = if stream.equal("else") {
      Some(parse_stmt_list(stream)?)
    } else {
      None
    };
    return Ok(Stmt::If {
      cond,
      then_branch,
      else_branch,
    });
  }

  if stream.equal("while") {
    let cond = parse_paren_expr(stream)?;
    let body = parse_stmt_list(stream)?;
    return Ok(Stmt::While { cond, body });
  }

  if stream.equal("do") {
    let body = parse_stmt_list(stream)?;
    stream.skip("while")?;
    let cond = parse_paren_expr(stream)?;
    stream.skip(";")?;
    return Ok(Stmt::DoWhile { body, cond });
  }

  if stream.is("return") {
    let pos = stream.peek_token().pos;
    stream.advance();
    let value = if stream.is(";") {
      None
    } else {
      Some(parse_expr(stream)?)
    };
    stream.skip(";")?;
    return Ok(Stmt::Return { pos, value });
  }

  if stream.is("{") {
    return Ok(Stmt::Block(parse_body(stream)?));
  }

  if stream.equal("switch") {
    return parse_switch(stream);
  }

  let target = stream.get_ident()?;
  if stream.is("(") {
    let args = parse_args(stream)?;
    stream.skip(";")?;
    return Ok(Stmt::Call(CallExp {
      callee: target,
      args,
    }));
  }
  stream.skip("=")?;
  let value = parse_expr(stream)?;
  stream.skip(";")?;
  Ok(Stmt::Assign { target, value })
}

fn parse_switch(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let scrutinee = parse_paren_expr(stream)?;
  stream.skip("{")?;
  let mut groups = Vec::new();
  while !stream.is("}") {
    let pos = stream.peek_token().pos;
    let label = if stream.equal("case") {
      let negative = stream.equal("-");
      let (value, _) = stream.get_number()?;
      SwitchLabel::Case {
        value: if negative { -value } else { value },
        pos,
      }
    } else if stream.equal("default") {
      SwitchLabel::Default { pos }
    } else {
      let got = describe_token(Some(stream.peek_token()), stream.source);
      return Err(stream.error_here(format!(
        "expected \"case\" or \"default\", but got \"{got}\""
      )));
    };
    stream.skip(":")?;
    let stmts = parse_stmts_until(stream, &["case", "default", "}"])?;
    groups.push(SwitchGroup { label, stmts });
  }
  stream.skip("}")?;
  Ok(Stmt::Switch { scrutinee, groups })
}

fn parse_paren_expr(stream: &mut TokenStream) -> CompileResult<Exp> {
  stream.skip("(")?;
  let exp = parse_expr(stream)?;
  stream.skip(")")?;
  Ok(exp)
}

fn parse_args(stream: &mut TokenStream) -> CompileResult<Vec<Exp>> {
  stream.skip("(")?;
  let mut args = Vec::new();
  if !stream.is(")") {
    loop {
      args.push(parse_expr(stream)?);
      if !stream.equal(",") {
        break;
      }
    }
  }
  stream.skip(")")?;
  Ok(args)
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Exp> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<Exp> {
  if stream.peek_token().kind == TokenKind::Ident && stream.nth_is(1, "=") {
    let target = stream.get_ident()?;
    stream.skip("=")?;
    let value = parse_assign(stream)?;
    return Ok(Exp::Assign {
      target,
      value: Box::new(value),
    });
  }
  parse_or(stream)
}

/// Parse one left-associative precedence level.
fn parse_level(
  stream: &mut TokenStream,
  ops: &[(&str, BinaryOp)],
  next: fn(&mut TokenStream) -> CompileResult<Exp>,
) -> CompileResult<Exp> {
  let mut node = next(stream)?;

  loop {
    let Some(op) = ops
      .iter()
      .find(|(symbol, _)| stream.is(symbol))
      .map(|(_, op)| *op)
    else {
      break;
    };
    stream.advance();
    let rhs = next(stream)?;
    node = Exp::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_or(stream: &mut TokenStream) -> CompileResult<Exp> {
  parse_level(stream, &[("||", BinaryOp::Or)], parse_and)
}

fn parse_and(stream: &mut TokenStream) -> CompileResult<Exp> {
  parse_level(stream, &[("&&", BinaryOp::And)], parse_equality)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Exp> {
  parse_level(
    stream,
    &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
    parse_relational,
  )
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Exp> {
  parse_level(
    stream,
    &[
      ("<", BinaryOp::Lt),
      ("<=", BinaryOp::Le),
      (">", BinaryOp::Gt),
      (">=", BinaryOp::Ge),
    ],
    parse_add,
  )
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Exp> {
  parse_level(
    stream,
    &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
    parse_mul,
  )
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Exp> {
  parse_level(
    stream,
    &[
      ("*", BinaryOp::Mul),
      ("/", BinaryOp::Div),
      ("%", BinaryOp::Mod),
    ],
    parse_power,
  )
}

fn parse_power(stream: &mut TokenStream) -> CompileResult<Exp> {
  let base = parse_unary(stream)?;
  if stream.equal("^") {
    // right-associative: 2 ^ 3 ^ 2 == 2 ^ (3 ^ 2)
    let exponent = parse_power(stream)?;
    return Ok(Exp::binary(BinaryOp::Pow, base, exponent));
  }
  Ok(base)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Exp> {
  if stream.equal("-") {
    let operand = parse_unary(stream)?;
    return Ok(Exp::unary(UnaryOp::Neg, operand));
  }

  if stream.equal("!") {
    let operand = parse_unary(stream)?;
    return Ok(Exp::unary(UnaryOp::Not, operand));
  }

  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Exp> {
  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  let token = stream.peek_token().clone();
  match token.kind {
    TokenKind::Num => {
      let (value, pos) = stream.get_number()?;
      Ok(Exp::IntLit { value, pos })
    }
    TokenKind::Str => {
      stream.advance();
      Ok(Exp::StrLit {
        value: token_text(&token, stream.source).to_string(),
        pos: token.pos,
      })
    }
    TokenKind::Ident => {
      let ident = stream.get_ident()?;
      if stream.is("(") {
        let args = parse_args(stream)?;
        return Ok(Exp::Call(CallExp {
          callee: ident,
          args,
        }));
      }
      Ok(Exp::Id(ident))
    }
    TokenKind::Keyword => match token_text(&token, stream.source) {
      "true" => {
        stream.advance();
        Ok(Exp::True(token.pos))
      }
      "false" => {
        stream.advance();
        Ok(Exp::False(token.pos))
      }
      "read" => {
        stream.advance();
        stream.skip("(")?;
        stream.skip(")")?;
        Ok(Exp::ReadInt(token.pos))
      }
      other => Err(stream.error_here(format!("expected an expression, but got \"{other}\""))),
    },
    TokenKind::Punctuator | TokenKind::Eof => {
      let got = describe_token(Some(&token), stream.source);
      Err(stream.error_here(format!("expected an expression, but got \"{got}\"")))
    }
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
  next_node: u32,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
      next_node: 0,
    }
  }

  /// The current token, or the trailing `Eof` once the cursor runs past it.
  fn peek_token(&self) -> &Token {
    let last = self.tokens.len().saturating_sub(1);
    &self.tokens[self.pos.min(last)]
  }

  fn peek_text(&self) -> Option<&'a str> {
    let token = self.tokens.get(self.pos)?;
    match token.kind {
      TokenKind::Eof => None,
      _ => Some(token_text(token, self.source)),
    }
  }

  fn advance(&mut self) {
    if self.pos < self.tokens.len() {
      self.pos += 1;
    }
  }

  /// Whether the token `n` places ahead is the given keyword or punctuator.
  fn nth_is(&self, n: usize, text: &str) -> bool {
    self.tokens.get(self.pos + n).is_some_and(|token| {
      matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword)
        && token_text(token, self.source) == text
    })
  }

  fn is(&self, text: &str) -> bool {
    self.nth_is(0, text)
  }

  /// Consume the current token if it matches the provided keyword or punctuator.
  fn equal(&mut self, text: &str) -> bool {
    if self.is(text) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let got = describe_token(self.tokens.get(self.pos), self.source);
      Err(self.error_here(format!("expected \"{s}\", but got \"{got}\"")))
    }
  }

  fn error_here(&self, message: impl Into<String>) -> CompileError {
    CompileError::at(self.source, self.peek_token().pos, message)
  }

  /// Parse the current token as an integer literal returning its value and position.
  fn get_number(&mut self) -> CompileResult<(i64, Pos)> {
    let token = self.peek_token();
    if token.kind != TokenKind::Num {
      let got = describe_token(Some(token), self.source);
      return Err(self.error_here(format!("expected a number, but got \"{got}\"")));
    }
    let pos = token.pos;
    let value = token.value.ok_or_else(|| {
      CompileError::at(
        self.source,
        pos,
        "internal error: numeric token missing value",
      )
    })?;
    self.pos += 1;
    Ok((value, pos))
  }

  /// Parse the current token as an identifier, minting its node id.
  fn get_ident(&mut self) -> CompileResult<Ident> {
    let token = self.peek_token();
    if token.kind != TokenKind::Ident {
      let got = describe_token(Some(token), self.source);
      return Err(self.error_here(format!("expected an identifier, but got \"{got}\"")));
    }
    let ident = Ident {
      id: NodeId::from_raw(self.next_node),
      name: token_text(token, self.source).to_string(),
      pos: token.pos,
    };
    self.next_node += 1;
    self.pos += 1;
    Ok(ident)
  }

  fn is_eof(&self) -> bool {
    self.peek_token().kind == TokenKind::Eof
  }
}
