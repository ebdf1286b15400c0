//! The AST shapes this crate translates. The parser that produces these
//! trees is out of scope (see the specification's PURPOSE & SCOPE); this
//! module exists only to give the translator a concrete Rust type to match
//! on. Node shapes mirror the external interface's node kinds (`AnnAssign`,
//! `FunctionDef`, `Assign`, `If`, `For`, `Return`, `Assert`, `Call`,
//! `BinOp`, `BoolOp`, `UnaryOp`, `Compare`, `Num`, `Str`, `NameConstant`,
//! `Name`, `Attribute`, `Subscript`, `List`, `Dict`, `Pass`, `Break`,
//! `Expr`, `AugAssign`).
//!
//! Type annotations are not a separate grammar: like the source language
//! itself, an annotation is just an ordinary expression (`num`, `num(wei)`,
//! `num[10]`, `{x: num, y: num}`, …) that [`crate::types::ty::parse_type`]
//! interprets structurally.

use num::BigInt;
use crate::span::Pos;
use crate::symbol::Symbol;

/// An integer or floating-point literal. Integers are carried at arbitrary
/// precision (mirroring the source language's unbounded integer literals)
/// until the expression translator range-checks and narrows them.
#[derive(Clone, Debug, PartialEq)]
pub enum NumLit {
  Int(BigInt),
  Float(f64),
}

/// `True`, `False`, or `None` (`ast.NameConstant`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameConstant { True, False, Null }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOpKind { Add, Sub, Mul, Div, Mod }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolOpKind { And, Or }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOpKind { Not, USub }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp { Gt, GtE, Lt, LtE, Eq, NotEq }

/// An expression node. Annotations reuse this type (see module docs).
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
  Num(NumLit, Pos),
  Str(String, Pos),
  NameConstant(NameConstant, Pos),
  Name(Symbol, Pos),
  Attribute { value: Box<Expr>, attr: Symbol, pos: Pos },
  Subscript { value: Box<Expr>, index: Box<Expr>, pos: Pos },
  BinOp { left: Box<Expr>, op: BinOpKind, right: Box<Expr>, pos: Pos },
  BoolOp { op: BoolOpKind, values: Vec<Expr>, pos: Pos },
  UnaryOp { op: UnaryOpKind, operand: Box<Expr>, pos: Pos },
  Compare { left: Box<Expr>, ops: Vec<CompareOp>, comparators: Vec<Expr>, pos: Pos },
  /// A call `f(a1, ..., an)`. `func` is almost always a bare `Name` in this
  /// source language (no higher-order calls, no dynamic dispatch).
  Call { func: Box<Expr>, args: Vec<Expr>, pos: Pos },
  List { elts: Vec<Expr>, pos: Pos },
  /// A `{k1: v1, ...}` literal. Keys are bare identifiers, not arbitrary
  /// expressions (the source grammar requires this, mirroring struct field
  /// names).
  Dict { keys: Vec<Symbol>, values: Vec<Expr>, pos: Pos },
}

impl Expr {
  #[must_use] pub fn pos(&self) -> Pos {
    match self {
      Expr::Num(_, pos) | Expr::Str(_, pos) | Expr::NameConstant(_, pos) | Expr::Name(_, pos)
      | Expr::Attribute { pos, .. } | Expr::Subscript { pos, .. } | Expr::BinOp { pos, .. }
      | Expr::BoolOp { pos, .. } | Expr::UnaryOp { pos, .. } | Expr::Compare { pos, .. }
      | Expr::Call { pos, .. } | Expr::List { pos, .. } | Expr::Dict { pos, .. } => *pos,
    }
  }
}

/// A statement node.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
  /// `name: annotation` with no value, used for local variable declarations.
  AnnAssign { target: Symbol, annotation: Expr, pos: Pos },
  /// `targets[0] = value`. `targets` is kept as a list (mirroring
  /// `ast.Assign`) even though the source grammar only accepts a single
  /// target; anything else is a [`crate::error::Error::Structure`].
  Assign { targets: Vec<Expr>, value: Expr, pos: Pos },
  If { test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>, pos: Pos },
  /// `for target in range(...): body`.
  For { target: Symbol, iter: Expr, body: Vec<Stmt>, pos: Pos },
  Return { value: Option<Expr>, pos: Pos },
  Assert { test: Expr, pos: Pos },
  AugAssign { target: Expr, op: BinOpKind, value: Expr, pos: Pos },
  /// A bare expression statement, i.e. `ast.Expr`. This is how the source
  /// language spells the `send(...)`/`selfdestruct(...)` builtin calls.
  Expr { value: Expr, pos: Pos },
  Pass { pos: Pos },
  Break { pos: Pos },
}

impl Stmt {
  #[must_use] pub fn pos(&self) -> Pos {
    match self {
      Stmt::AnnAssign { pos, .. } | Stmt::Assign { pos, .. } | Stmt::If { pos, .. }
      | Stmt::For { pos, .. } | Stmt::Return { pos, .. } | Stmt::Assert { pos, .. }
      | Stmt::AugAssign { pos, .. } | Stmt::Expr { pos, .. } | Stmt::Pass { pos }
      | Stmt::Break { pos } => *pos,
    }
  }
}

/// A single function parameter, always explicitly annotated (the language
/// has no inference of missing type annotations).
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
  pub name: Symbol,
  pub annotation: Expr,
  pub pos: Pos,
}

/// `def name(args) -> returns: body`.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
  pub name: Symbol,
  pub args: Vec<Param>,
  /// Absent, a plain type expression, or a call-shape annotation carrying
  /// at most one unit description and at most one `const` marker (§4.D).
  pub returns: Option<Expr>,
  pub body: Vec<Stmt>,
  pub pos: Pos,
}

/// A top-level module item: either a persistent-storage declaration or a
/// function definition. Anything else is a [`crate::error::Error::Structure`].
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
  AnnAssign { target: Symbol, annotation: Expr, pos: Pos },
  FunctionDef(FunctionDef),
}

/// A whole source module: the ordered top-level statements.
pub type Module = Vec<Item>;
