//! The LIR node (component B): a uniform tree whose structural shape is
//! validated against the opcode registry (component L, [`crate::types::entity`])
//! at construction time rather than trusted from callers.
//!
//! Every constructor here returns [`Result<Node>`] and rejects a
//! structurally invalid tree with [`Error::Structure`] immediately — there
//! is no way to build a `Node` that later trips an invariant deeper in the
//! pipeline, matching §7's "no partial recovery" propagation rule.

use num::BigInt;

use crate::error::{Error, Result};
use crate::span::Pos;
use crate::symbol::Symbol;
use crate::types::entity::{OpKind, OpTable, PseudoOp, VARIADIC};
use crate::types::ty::Type;

pub use crate::types::ty::Location;

/// The payload a leaf (or opcode head) node carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
  /// An integer literal, or (for `repeat`'s round count and similar
  /// structural positions) a constant used by the validator itself. Carried
  /// at arbitrary precision: the VM's 256-bit words can hold values (e.g.
  /// the address-space bound `2^160`, or `MAXDECIMAL = (2^128-1)*10^10`)
  /// that do not fit in a 128-bit machine integer.
  Int(BigInt),
  /// An opcode/pseudo-opcode mnemonic, a control-form keyword, or a bound
  /// variable name (inside a `with` scope).
  Sym(Symbol),
  /// The no-value sentinel; leaves nothing on the stack and takes no args.
  Null,
}

/// A single LIR tree node. See the module-level docs and §3 of the
/// specification for the structural invariants every constructed `Node`
/// satisfies.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
  pub value: Value,
  pub args: Vec<Node>,
  pub typ: Option<Type>,
  pub location: Location,
  valency: u32,
}

impl Node {
  /// The node's valency: whether (and, for `multi`, how many words) it
  /// leaves on the VM stack. Zero for every node except a leaf, an
  /// opcode/pseudo-opcode whose table valency is 1, an `if`/`with` whose
  /// result branch is valency-1, or a `multi` (whose valency is the sum of
  /// its children's).
  #[must_use] pub fn valency(&self) -> u32 { self.valency }

  fn leaf(value: Value, typ: Option<Type>, location: Location, valency: u32) -> Self {
    Self { value, args: Vec::new(), typ, location, valency }
  }

  /// An integer literal, untyped and unlocated until the caller attaches a
  /// type (most callers immediately wrap this in a range clamp; see
  /// `crate::expr`).
  #[must_use] pub fn int(n: impl Into<BigInt>) -> Self { Self::leaf(Value::Int(n.into()), None, Location::None, 1) }

  /// An integer literal built directly from a [`BigInt`] (for values, like
  /// the prelude's numeric bounds, that do not fit any machine integer
  /// type).
  #[must_use] pub fn bigint(n: BigInt) -> Self { Self::leaf(Value::Int(n), None, Location::None, 1) }

  /// A bare symbolic reference: either a `with`-bound variable name used
  /// inside its scope, or (as a bare head with zero args) a nullary opcode
  /// like `CALLER`. Use [`Node::op`] to build an opcode/pseudo-opcode node
  /// with arguments instead.
  #[must_use] pub fn var(name: Symbol) -> Self { Self::leaf(Value::Sym(name), None, Location::None, 1) }

  /// The `null` literal: assignable to any base type, where it
  /// zero-initializes (§3). Valency 1 like any other value-producing leaf;
  /// callers virtually always consume it immediately through
  /// `base_type_conversion` or a setter's dedicated null case rather than
  /// embedding it in a tree as-is. Not to be confused with [`Node::pass`],
  /// the valency-0 statement no-op.
  #[must_use] pub fn null() -> Self { Self::leaf(Value::Null, Some(Type::Null), Location::None, 1) }

  /// Build an opcode or pseudo-opcode node, validating its arity and (for
  /// ordinary opcodes and the simple pseudo-opcodes) every argument's
  /// valency. Control forms (`if`, `with`, `repeat`, `seq`, `multi`) have
  /// their own bespoke structural rules and are rejected here in favor of
  /// their dedicated constructors below.
  pub fn op(mnemonic: &str, args: Vec<Node>, table: &dyn OpTable, pos: Pos) -> Result<Self> {
    let kind = table.lookup(mnemonic)
      .ok_or_else(|| Error::structure(pos, format!("unknown opcode `{mnemonic}`")))?;
    match kind {
      OpKind::Real(op) => {
        let spec = op.spec();
        check_fixed_arity(op.mnemonic(), &args, spec.arity, pos)?;
        require_all_valency_one(op.mnemonic(), &args, pos)?;
        Ok(Self { value: Value::Sym(mnemonic_symbol(op.mnemonic())), args, typ: None, location: Location::None, valency: u32::from(spec.valency) })
      }
      OpKind::Pseudo(p @ (PseudoOp::Clamp | PseudoOp::UClampLt | PseudoOp::ClampNonzero
        | PseudoOp::Sha3_32 | PseudoOp::Ceil32 | PseudoOp::Assert)) => {
        let spec = p.spec();
        check_fixed_arity(p.mnemonic(), &args, spec.arity, pos)?;
        require_all_valency_one(p.mnemonic(), &args, pos)?;
        Ok(Self { value: Value::Sym(mnemonic_symbol(p.mnemonic())), args, typ: None, location: Location::None, valency: u32::from(spec.valency) })
      }
      OpKind::Pseudo(PseudoOp::Lll) => {
        check_fixed_arity("LLL", &args, 2, pos)?;
        if args[1].valency != 1 {
          return Err(Error::structure(pos, "lll's length argument must be valency-1"));
        }
        Ok(Self { value: Value::Sym(mnemonic_symbol("LLL")), args, typ: None, location: Location::None, valency: 1 })
      }
      OpKind::Pseudo(
        PseudoOp::If | PseudoOp::With | PseudoOp::Repeat | PseudoOp::Seq | PseudoOp::Multi
        | PseudoOp::Pass | PseudoOp::Break,
      ) => Err(Error::structure(pos, format!("{mnemonic} must be built with its dedicated constructor"))),
    }
  }

  /// `if test then [else]`. `test` must be valency-1. With an `else`
  /// branch, both branches must agree in valency and that becomes the
  /// overall valency; without one, `then` must be valency-0 and the overall
  /// valency is 0 (invariant 2, §3).
  pub fn if_(test: Node, then: Node, else_: Option<Node>, pos: Pos) -> Result<Self> {
    if test.valency != 1 {
      return Err(Error::structure(pos, "if's test must be valency-1"));
    }
    let valency = match &else_ {
      Some(e) => {
        if then.valency != e.valency {
          return Err(Error::structure(pos, "if's branches must agree in valency"));
        }
        then.valency
      }
      None => {
        if then.valency != 0 {
          return Err(Error::structure(pos, "a two-armed if's body must be valency-0"));
        }
        0
      }
    };
    let mut args = vec![test, then];
    if let Some(e) = else_ { args.push(e) }
    Ok(Self { value: Value::Sym(mnemonic_symbol("IF")), args, typ: None, location: Location::None, valency })
  }

  /// `with v init body`: bind symbolic name `v` to the valency-1 value
  /// `init` within `body`. Overall valency equals `body`'s.
  pub fn with(var: Symbol, init: Node, body: Node, pos: Pos) -> Result<Self> {
    if init.valency != 1 {
      return Err(Error::structure(pos, "with's init expression must be valency-1"));
    }
    let valency = body.valency;
    let args = vec![Node::leaf(Value::Sym(var), None, Location::None, 0), init, body];
    Ok(Self { value: Value::Sym(mnemonic_symbol("WITH")), args, typ: None, location: Location::None, valency })
  }

  /// `repeat memloc start rounds body`: `rounds` must be a positive
  /// constant integer, `body` must be valency-0; `memloc` and `start` must
  /// be valency-1. Overall valency is always 0.
  pub fn repeat(memloc: Node, start: Node, rounds: i64, body: Node, pos: Pos) -> Result<Self> {
    if memloc.valency != 1 || start.valency != 1 {
      return Err(Error::structure(pos, "repeat's memloc and start must be valency-1"));
    }
    if rounds <= 0 {
      return Err(Error::structure(pos, "repeat's round count must be a positive constant"));
    }
    if body.valency != 0 {
      return Err(Error::structure(pos, "repeat's body must be valency-0"));
    }
    let args = vec![memloc, start, Node::int(rounds), body];
    Ok(Self { value: Value::Sym(mnemonic_symbol("REPEAT")), args, typ: None, location: Location::None, valency: 0 })
  }

  /// `seq a1 ... an`: no per-argument valency requirement. Overall valency
  /// is the last child's valency, or 0 for an empty sequence.
  #[must_use] pub fn seq(args: Vec<Node>) -> Self {
    let valency = args.last().map_or(0, Node::valency);
    Self { value: Value::Sym(mnemonic_symbol("SEQ")), args, typ: None, location: Location::None, valency }
  }

  /// `multi x1 ... xn`: every child must be valency-1; overall valency is
  /// their sum (this is how a tuple/struct/list value is assembled as a
  /// flat run of stack words before a setter consumes it).
  pub fn multi(args: Vec<Node>, typ: Option<Type>, pos: Pos) -> Result<Self> {
    require_all_valency_one("multi", &args, pos)?;
    let valency = args.len() as u32;
    Ok(Self { value: Value::Sym(mnemonic_symbol("MULTI")), args, typ, location: Location::None, valency })
  }

  #[must_use] pub fn pass() -> Self {
    Self { value: Value::Sym(mnemonic_symbol("PASS")), args: Vec::new(), typ: None, location: Location::None, valency: 0 }
  }

  #[must_use] pub fn break_() -> Self {
    Self { value: Value::Sym(mnemonic_symbol("BREAK")), args: Vec::new(), typ: None, location: Location::None, valency: 0 }
  }

  /// Attach a type and location to an already-built node (used once an
  /// opcode/pseudo-opcode node has been constructed and the caller knows
  /// what source type and location it represents).
  #[must_use] pub fn typed(mut self, typ: Type, location: Location) -> Self {
    self.typ = Some(typ);
    self.location = location;
    self
  }

  /// Attach (or clear) a type without touching location. Used by
  /// `unwrap_location` to carry a loaded value's type onto the
  /// `mload`/`sload`/`calldataload` node that reads it.
  #[must_use] pub fn with_typ(mut self, typ: Option<Type>) -> Self {
    self.typ = typ;
    self
  }

  /// `true` for a node built by [`Node::multi`] (a flat run of stack words
  /// assembled from a list/dict literal). The setter synthesizer (§4.H)
  /// special-cases assignment from such a node.
  #[must_use] pub fn is_multi(&self) -> bool {
    matches!(&self.value, Value::Sym(s) if &*s.as_str() == "MULTI")
  }

  /// Recursively rewrite a nested literal (`i128`, or list of the same) into
  /// an LIR tree: a scalar becomes an integer leaf, a list becomes a `multi`
  /// of the recursively-converted elements. Used by the setter synthesizer
  /// and constant-folding call sites that need to turn a plain Rust literal
  /// into LIR without going through the expression translator.
  pub fn from_literal(lit: &Literal, pos: Pos) -> Result<Self> {
    match lit {
      Literal::Int(n) => Ok(Node::int(*n)),
      Literal::List(items) => {
        let args = items.iter().map(|l| Node::from_literal(l, pos)).collect::<Result<Vec<_>>>()?;
        Node::multi(args, None, pos)
      }
    }
  }
}

/// A plain Rust value fed to [`Node::from_literal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal { Int(i128), List(Vec<Literal>) }

fn check_fixed_arity(mnemonic: &str, args: &[Node], arity: u8, pos: Pos) -> Result<()> {
  if arity == VARIADIC { return Ok(()) }
  if args.len() != arity as usize {
    return Err(Error::structure(pos, format!("{mnemonic} takes {arity} argument(s), got {}", args.len())));
  }
  Ok(())
}

fn require_all_valency_one(mnemonic: &str, args: &[Node], pos: Pos) -> Result<()> {
  if args.iter().any(|a| a.valency != 1) {
    return Err(Error::structure(pos, format!("every argument to {mnemonic} must be valency-1")));
  }
  Ok(())
}

fn mnemonic_symbol(mnemonic: &str) -> Symbol {
  crate::symbol::intern(mnemonic)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::entity::StaticOpTable;

  #[test]
  fn builds_simple_opcode() {
    let table = StaticOpTable;
    let n = Node::op("ADD", vec![Node::int(1), Node::int(2)], &table, Pos::default()).unwrap();
    assert_eq!(n.valency(), 1);
  }

  #[test]
  fn rejects_wrong_arity() {
    let table = StaticOpTable;
    assert!(Node::op("ADD", vec![Node::int(1)], &table, Pos::default()).is_err());
  }

  #[test]
  fn if_without_else_requires_valency_zero_body() {
    let table = StaticOpTable;
    let test = Node::op("ISZERO", vec![Node::int(0)], &table, Pos::default()).unwrap();
    assert!(Node::if_(test.clone(), Node::pass(), None, Pos::default()).is_ok());
    let bad_body = Node::op("ADD", vec![Node::int(1), Node::int(2)], &table, Pos::default()).unwrap();
    assert!(Node::if_(test, bad_body, None, Pos::default()).is_err());
  }

  #[test]
  fn multi_valency_is_sum_of_children() {
    let m = Node::multi(vec![Node::int(1), Node::int(2), Node::int(3)], None, Pos::default()).unwrap();
    assert_eq!(m.valency(), 3);
  }

  #[test]
  fn seq_valency_is_last_childs() {
    let table = StaticOpTable;
    let last = Node::op("ADD", vec![Node::int(1), Node::int(2)], &table, Pos::default()).unwrap();
    let s = Node::seq(vec![Node::pass(), last]);
    assert_eq!(s.valency(), 1);
    assert_eq!(Node::seq(vec![]).valency(), 0);
  }

  #[test]
  fn repeat_rejects_nonpositive_rounds() {
    assert!(Node::repeat(Node::int(256), Node::int(0), 0, Node::pass(), Pos::default()).is_err());
  }

  #[test]
  fn from_literal_builds_nested_multi() {
    let lit = Literal::List(vec![Literal::Int(1), Literal::List(vec![Literal::Int(2), Literal::Int(3)])]);
    let n = Node::from_literal(&lit, Pos::default()).unwrap();
    assert_eq!(n.valency(), 2);
  }
}
