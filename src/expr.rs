//! The expression translator (component F): turns a single [`Expr`] into an
//! LIR [`Node`], threading the per-function [`Context`] for name resolution
//! and memory layout.
//!
//! Two flavors of translation matter throughout this module, mirroring the
//! original compiler's `parse_expr`/`parse_value_expr` split:
//!
//! - [`translate_expr`] ("location expr") returns a node that still carries
//!   its [`Location`] — useful when the caller is about to compute a child
//!   address (`Attribute`/`Subscript`) rather than read the value.
//! - [`translate_value_expr`] additionally threads the result through
//!   [`unwrap_location`], emitting the `sload`/`mload`/`calldataload` that
//!   actually reads it. Every binary/unary/comparison/call operand goes
//!   through this; list and dict literal elements deliberately do not (they
//!   keep their element addresses, faithfully matching the layout the
//!   setter synthesizer expects to see).

use std::collections::BTreeMap;
use std::rc::Rc;

use num::BigInt;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::numeric;
use crate::span::Pos;
use crate::symbol::{intern, Symbol};
use crate::types::ast::{BinOpKind, BoolOpKind, CompareOp, Expr, NameConstant, NumLit, UnaryOpKind};
use crate::types::entity::OpTable;
use crate::types::lir::{Location, Node};
use crate::types::ty::{self, Base, BaseKind, Type, Units};
use crate::config::Options;

/// Translate an expression, preserving whatever [`Location`] the result
/// lives at (storage/memory/calldata/none). See the module docs for when to
/// reach for this versus [`translate_value_expr`].
pub fn translate_expr(expr: &Expr, ctx: &Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  translate_expr_at(expr, ctx, table, opts, 0)
}

/// Translate an expression and unwrap its location, i.e. emit the load that
/// actually reads the value onto the stack.
pub fn translate_value_expr(expr: &Expr, ctx: &Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let orig = translate_expr_at(expr, ctx, table, opts, 0)?;
  unwrap_location(orig, table, expr.pos())
}

fn translate_value_expr_at(expr: &Expr, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let orig = translate_expr_at(expr, ctx, table, opts, depth)?;
  unwrap_location(orig, table, expr.pos())
}

fn bump_depth(depth: u32, opts: Options, pos: Pos) -> Result<u32> {
  if depth >= opts.max_expr_depth {
    return Err(Error::structure(pos, "expression nesting exceeds the configured maximum depth"));
  }
  Ok(depth + 1)
}

fn translate_expr_at(expr: &Expr, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let depth = bump_depth(depth, opts, expr.pos())?;
  match expr {
    Expr::Num(lit, pos) => translate_num(lit, *pos, opts),
    Expr::Str(s, pos) => translate_str(s, *pos, ctx, table),
    Expr::NameConstant(nc, pos) => translate_name_constant(*nc, *pos),
    Expr::Name(sym, pos) => translate_name(*sym, *pos, ctx, table, opts),
    Expr::Attribute { value, attr, pos } => translate_attribute(value, *attr, *pos, ctx, table, opts, depth),
    Expr::Subscript { value, index, pos } => translate_subscript(value, index, *pos, ctx, table, opts, depth),
    Expr::BinOp { left, op, right, pos } => translate_binop(left, *op, right, *pos, ctx, table, opts, depth),
    Expr::Compare { left, ops, comparators, pos } => translate_compare(left, ops, comparators, *pos, ctx, table, opts, depth),
    Expr::BoolOp { op, values, pos } => translate_boolop(*op, values, *pos, ctx, table, opts, depth),
    Expr::UnaryOp { op, operand, pos } => translate_unaryop(*op, operand, *pos, ctx, table, opts, depth),
    Expr::Call { func, args, pos } => translate_call(func, args, *pos, ctx, table, opts, depth),
    Expr::List { elts, pos } => translate_list(elts, *pos, ctx, table, opts, depth),
    Expr::Dict { keys, values, pos } => translate_dict(keys, values, *pos, ctx, table, opts, depth),
  }
}

fn translate_num(lit: &NumLit, pos: Pos, opts: Options) -> Result<Node> {
  let bound = numeric::literal_bound();
  match lit {
    NumLit::Int(n) => {
      if *n > bound || *n < -bound.clone() {
        return Err(Error::invalid_type(pos, "integer literal out of range"));
      }
      Ok(Node::bigint(n.clone()).typed(Type::num(), Location::None))
    }
    NumLit::Float(f) => {
      let scale = opts.decimal_scale();
      let scaled = (f * scale as f64).floor();
      if !scaled.is_finite() {
        return Err(Error::invalid_type(pos, "decimal literal is not finite"));
      }
      let scaled_big = BigInt::from(scaled as i128);
      if scaled_big > bound || scaled_big < -bound {
        return Err(Error::invalid_type(pos, "decimal literal out of range"));
      }
      Ok(Node::bigint(scaled_big).typed(Type::Base(Base::plain(BaseKind::Decimal)), Location::None))
    }
  }
}

/// A string literal only ever denotes an `address` or `bytes32` constant: a
/// 42-char `0x…` string (20 bytes) is an address, a 66-char `0x…` string (32
/// bytes) is bytes32, and anything else is a structure error. There is no
/// general byte-string literal in this language.
fn translate_str(s: &str, pos: Pos, _ctx: &Context<'_>, _table: &dyn OpTable) -> Result<Node> {
  let (typ, nbytes) = match s.len() {
    42 => (Type::address(), 20),
    66 => (Type::Base(Base::plain(BaseKind::Bytes32)), 32),
    _ => return Err(Error::invalid_type(pos, format!("unsupported bytes literal: {s}"))),
  };
  if !s.starts_with("0x") {
    return Err(Error::invalid_type(pos, format!("unsupported bytes literal: {s}")));
  }
  let bytes = hex::decode(&s[2..]).map_err(|_| Error::invalid_type(pos, format!("unsupported bytes literal: {s}")))?;
  if bytes.len() != nbytes {
    return Err(Error::invalid_type(pos, format!("unsupported bytes literal: {s}")));
  }
  let value = BigInt::from_bytes_be(num::bigint::Sign::Plus, &bytes);
  Ok(Node::bigint(value).typed(typ, Location::None))
}

fn translate_name_constant(nc: NameConstant, _pos: Pos) -> Result<Node> {
  Ok(match nc {
    NameConstant::True => Node::int(1i64).typed(Type::bool_(), Location::None),
    NameConstant::False => Node::int(0i64).typed(Type::bool_(), Location::None),
    NameConstant::Null => Node::null(),
  })
}

fn translate_name(sym: Symbol, pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  if let Some(arg) = ctx.args.get(&sym) {
    return translate_arg(arg, table, opts, pos);
  }
  if let Some(v) = ctx.vars.get(&sym) {
    return Ok(Node::int(i64::from(v.offset)).typed(v.typ.clone(), Location::Memory));
  }
  let text = sym.as_str();
  match &*text {
    "self" => Ok(Node::op("ADDRESS", vec![], table, pos)?.typed(Type::address(), Location::None)),
    "true" => Ok(Node::int(1i64).typed(Type::bool_(), Location::None)),
    "false" => Ok(Node::int(0i64).typed(Type::bool_(), Location::None)),
    "null" => Ok(Node::null()),
    _ => Err(Error::var_decl(pos, format!("undeclared variable `{text}`"))),
  }
}

/// Load and range-clamp a function argument from its bound location: regular
/// functions read calldata directly, the constructor reads its arguments
/// code-copied from just past the end of the deployed code.
fn translate_arg(arg: &crate::context::ArgSlot, table: &dyn OpTable, opts: Options, pos: Pos) -> Result<Node> {
  let data_decl = if arg.offset >= 0 {
    Node::op("CALLDATALOAD", vec![Node::int(arg.offset)], table, pos)?
  } else {
    let code_offset = Node::op("SUB", vec![
      Node::op("CODESIZE", vec![], table, pos)?,
      Node::int(-arg.offset),
    ], table, pos)?;
    let copy = Node::op("CODECOPY", vec![
      Node::int(i64::from(crate::config::CODE_ARG_SCRATCH)),
      code_offset,
      Node::int(32i64),
    ], table, pos)?;
    let load = Node::op("MLOAD", vec![Node::int(i64::from(crate::config::CODE_ARG_SCRATCH))], table, pos)?;
    Node::seq(vec![copy, load])
  };
  match &arg.typ {
    Type::Base(b) if b.kind == BaseKind::Num => {
      let lo = mload(table, pos, opts.minnum_slot())?;
      let hi = mload(table, pos, opts.maxnum_slot())?;
      Ok(clamp(table, pos, lo, data_decl, hi)?.typed(arg.typ.clone(), Location::None))
    }
    Type::Base(b) if b.kind == BaseKind::Bool => {
      Ok(uclamplt(table, pos, data_decl, Node::int(2i64))?.typed(arg.typ.clone(), Location::None))
    }
    Type::Base(b) if b.kind == BaseKind::Address => {
      let bound = mload(table, pos, opts.addr_bound_slot())?;
      Ok(uclamplt(table, pos, data_decl, bound)?.typed(arg.typ.clone(), Location::None))
    }
    Type::Base(b) if matches!(b.kind, BaseKind::Num256 | BaseKind::Signed256 | BaseKind::Bytes32 | BaseKind::Decimal) => {
      Ok(data_decl.typed(arg.typ.clone(), Location::None))
    }
    Type::ByteArray(_) => Ok(data_decl.typed(arg.typ.clone(), Location::Calldata)),
    other => Err(Error::invalid_type(pos, format!("unsupported argument type: {other:?}"))),
  }
}

fn mload(table: &dyn OpTable, pos: Pos, slot: u32) -> Result<Node> {
  Node::op("MLOAD", vec![Node::int(i64::from(slot))], table, pos)
}

fn clamp(table: &dyn OpTable, pos: Pos, min: Node, val: Node, max: Node) -> Result<Node> {
  Node::op("CLAMP", vec![min, val, max], table, pos)
}

fn uclamplt(table: &dyn OpTable, pos: Pos, val: Node, bound: Node) -> Result<Node> {
  Node::op("UCLAMPLT", vec![val, bound], table, pos)
}

fn clamp_nonzero(table: &dyn OpTable, pos: Pos, val: Node) -> Result<Node> {
  Node::op("CLAMP_NONZERO", vec![val], table, pos)
}

fn sha3_32(table: &dyn OpTable, pos: Pos, val: Node) -> Result<Node> {
  Node::op("SHA3_32", vec![val], table, pos)
}

fn unit_literal(name: &str) -> Units {
  BTreeMap::from([(intern(name), 1)])
}

fn builtin_namespace_member(ns: &str, attr: &str, table: &dyn OpTable, pos: Pos) -> Result<Node> {
  let (mnemonic, typ): (&str, Type) = match (ns, attr) {
    ("msg", "sender") => ("CALLER", Type::address()),
    ("msg", "value") => ("CALLVALUE", Type::Base(Base { kind: BaseKind::Num, unit: Some(unit_literal("wei")), positional: false })),
    ("block", "difficulty") => ("DIFFICULTY", Type::num()),
    ("block", "timestamp") => ("TIMESTAMP", Type::Base(Base { kind: BaseKind::Num, unit: Some(unit_literal("sec")), positional: true })),
    ("block", "coinbase") => ("COINBASE", Type::address()),
    ("block", "number") => ("NUMBER", Type::num()),
    ("tx", "origin") => ("ORIGIN", Type::address()),
    _ => return Err(Error::structure(pos, format!("unsupported keyword: {ns}.{attr}"))),
  };
  Ok(Node::op(mnemonic, vec![], table, pos)?.typed(typ, Location::None))
}

fn translate_attribute(value: &Expr, attr: Symbol, pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let attr_text = attr.as_str();
  if &*attr_text == "balance" {
    let addr = translate_value_expr_at(value, ctx, table, opts, depth)?;
    let Some(Type::Base(b)) = addr.typ.as_ref() else {
      return Err(Error::type_mismatch(pos, "`.balance` is only valid on an address"));
    };
    if b.kind != BaseKind::Address {
      return Err(Error::type_mismatch(pos, "`.balance` is only valid on an address"));
    }
    let typ = Type::Base(Base { kind: BaseKind::Num, unit: Some(unit_literal("wei")), positional: false });
    return Ok(Node::op("BALANCE", vec![addr], table, pos)?.typed(typ, Location::None));
  }
  if let Expr::Name(base, _) = value {
    let base_text = base.as_str();
    if &*base_text == "self" {
      let g = ctx.globals.get(&attr)
        .ok_or_else(|| Error::var_decl(pos, format!("persistent variable `{attr_text}` undeclared")))?;
      return Ok(Node::int(i64::from(g.slot)).typed(g.typ.clone(), Location::Storage));
    }
    if matches!(&*base_text, "msg" | "block" | "tx") {
      return builtin_namespace_member(&base_text, &attr_text, table, pos);
    }
  }
  let sub = translate_expr_at(value, ctx, table, opts, depth)?;
  add_variable_offset(sub, Key::Field(attr), table, pos, opts)
}

fn translate_subscript(value: &Expr, index: &Expr, pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let sub = translate_expr_at(value, ctx, table, opts, depth)?;
  let idx = translate_value_expr_at(index, ctx, table, opts, depth)?;
  add_variable_offset(sub, Key::Index(idx), table, pos, opts)
}

/// A struct member name, or a value-expression index, the way
/// [`add_variable_offset`] needs to tell them apart.
pub(crate) enum Key {
  Field(Symbol),
  Index(Node),
}

/// Resolve one step of a (possibly nested) member/index access, emitting the
/// address arithmetic appropriate to `parent`'s location: storage children
/// hash the parent slot with the member/element offset; memory children add
/// a byte offset to the parent address directly.
pub(crate) fn add_variable_offset(parent: Node, key: Key, table: &dyn OpTable, pos: Pos, opts: Options) -> Result<Node> {
  let typ = parent.typ.clone()
    .ok_or_else(|| Error::type_mismatch(pos, "cannot access the child of a valueless node"))?;
  let location = parent.location;
  match &typ {
    Type::Struct(members) => {
      let Key::Field(name) = key else {
        return Err(Error::type_mismatch(pos, "expecting a member variable access, not an index"));
      };
      let field_text = name.as_str();
      let subtype = members.get(&name).cloned()
        .ok_or_else(|| Error::type_mismatch(pos, format!("object does not have member variable `{field_text}`")))?;
      match location {
        Location::Storage => {
          let index = members.keys().take_while(|&&k| k != name).count();
          let addr = sha3_32(table, pos, parent)?;
          Ok(Node::op("ADD", vec![addr, Node::int(index as i64)], table, pos)?.typed(subtype, Location::Storage))
        }
        Location::Memory => {
          let mut offset: u32 = 0;
          for (&k, v) in members.iter() {
            if k == name { break }
            offset += 32 * ty::get_size_of_type(v, pos)?;
          }
          Ok(Node::op("ADD", vec![Node::int(i64::from(offset)), parent], table, pos)?.typed(subtype, Location::Memory))
        }
        _ => Err(Error::type_mismatch(pos, "not expecting a member variable access here")),
      }
    }
    Type::List(elem, count) => {
      let Key::Index(idx) = key else {
        return Err(Error::type_mismatch(pos, "expecting an index, not a member access"));
      };
      let idx_typ = idx.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "index expression has no type"))?;
      let converted = base_type_conversion(idx, &idx_typ, &Type::num(), table, pos, opts)?;
      let clamped = uclamplt(table, pos, converted, Node::int(i64::from(*count)))?;
      match location {
        Location::Storage => {
          let addr = sha3_32(table, pos, parent)?;
          Ok(Node::op("ADD", vec![addr, clamped], table, pos)?.typed((**elem).clone(), Location::Storage))
        }
        Location::Memory => {
          let elem_size = 32 * ty::get_size_of_type(elem, pos)?;
          let mul = Node::op("MUL", vec![Node::int(i64::from(elem_size)), clamped], table, pos)?;
          Ok(Node::op("ADD", vec![mul, parent], table, pos)?.typed((**elem).clone(), Location::Memory))
        }
        _ => Err(Error::type_mismatch(pos, "not expecting an array access here")),
      }
    }
    Type::Mapping(keytype, valuetype) => {
      let Key::Index(idx) = key else {
        return Err(Error::type_mismatch(pos, "expecting a key, not a member access"));
      };
      if location != Location::Storage {
        return Err(Error::type_mismatch(pos, "mappings can only live in storage"));
      }
      let idx_typ = idx.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "key expression has no type"))?;
      let converted = base_type_conversion(idx, &idx_typ, &Type::Base((**keytype).clone()), table, pos, opts)?;
      let addr = sha3_32(table, pos, parent)?;
      Ok(Node::op("ADD", vec![addr, converted], table, pos)?.typed((**valuetype).clone(), Location::Storage))
    }
    _ => Err(Error::type_mismatch(pos, "cannot access the child of a non-aggregate value")),
  }
}

/// Convert a value already read out (or about to be) from `frm` into `to`.
/// Handles the `null` zero-initializer, identical-shape passthrough, and the
/// one implicit numeric widening this language allows: `num` -> `decimal`.
pub(crate) fn base_type_conversion(orig: Node, frm: &Type, to: &Type, table: &dyn OpTable, pos: Pos, opts: Options) -> Result<Node> {
  let orig = unwrap_location(orig, table, pos)?;
  if matches!(frm, Type::Null) {
    let Type::Base(_) = to else {
      return Err(Error::type_mismatch(pos, "`null` can only be converted to a base type"));
    };
    return Ok(Node::int(0i64).typed(to.clone(), Location::None));
  }
  let (Type::Base(fb), Type::Base(tb)) = (frm, to) else {
    return Err(Error::type_mismatch(pos, "type conversion requires two base types"));
  };
  if fb.kind == tb.kind && fb.unit == tb.unit && fb.positional == tb.positional {
    return Ok(orig.with_typ(Some(to.clone())));
  }
  if !ty::are_units_compatible(fb.unit.as_ref(), tb.unit.as_ref()) {
    return Err(Error::type_mismatch(pos, "unit mismatch in implicit conversion"));
  }
  if fb.kind == BaseKind::Num && tb.kind == BaseKind::Decimal {
    return Ok(Node::op("MUL", vec![orig, Node::int(opts.decimal_scale())], table, pos)?.typed(to.clone(), Location::None));
  }
  Err(Error::type_mismatch(pos, format!("cannot convert {:?} to {:?}", fb.kind, tb.kind)))
}

fn expect_base<'a>(t: &'a Type, pos: Pos) -> Result<&'a Base> {
  match t {
    Type::Base(b) => Ok(b),
    _ => Err(Error::type_mismatch(pos, "expected a base (scalar numeric) type")),
  }
}

fn guarded_mul(left: Node, right: Node, table: &dyn OpTable, pos: Pos, divide_by_scale: Option<i128>, result_unit: Option<Units>) -> Result<Node> {
  let (l_sym, r_sym, ans_sym) = (intern("_L"), intern("_R"), intern("_ans"));
  let (l_var, r_var, ans_var) = (Node::var(l_sym), Node::var(r_sym), Node::var(ans_sym));
  let mul = Node::op("MUL", vec![l_var.clone(), r_var.clone()], table, pos)?;
  let sdiv_check = Node::op("SDIV", vec![ans_var.clone(), l_var.clone()], table, pos)?;
  let eq = Node::op("EQ", vec![sdiv_check, r_var], table, pos)?;
  let not_l = Node::op("NOT", vec![l_var], table, pos)?;
  let or_node = Node::op("OR", vec![eq, not_l], table, pos)?;
  let assert_node = Node::op("ASSERT", vec![or_node], table, pos)?;
  let result = match divide_by_scale {
    Some(scale) => Node::op("SDIV", vec![ans_var, Node::int(scale)], table, pos)?,
    None => ans_var,
  };
  let inner = Node::with(ans_sym, mul, Node::seq(vec![assert_node, result]), pos)?;
  let with_l = Node::with(l_sym, left, inner, pos)?;
  let with_r = Node::with(r_sym, right, with_l, pos)?;
  Ok(with_r.typed(Type::Base(Base { kind: BaseKind::Decimal, unit: result_unit, positional: false }), Location::None))
}

/// Clamp a newly constructed value-producing node (`location == None`) back
/// into its type's representable range: `num` against MINNUM/MAXNUM,
/// `decimal` against MINDECIMAL/MAXDECIMAL. Mirrors the original compiler's
/// `parse_expr` tail, which re-clamps every arithmetic/unary result this way
/// (everything else — literals, name/attribute/subscript loads, the
/// `floor`/`decimal`/`as_number` builtins — returns before reaching that
/// tail and clamps itself, if at all, on its own terms).
pub(crate) fn finalize_value(node: Node, table: &dyn OpTable, opts: Options, pos: Pos) -> Result<Node> {
  if node.location != Location::None {
    return Ok(node);
  }
  match node.typ.clone() {
    Some(Type::Base(b)) if b.kind == BaseKind::Num => {
      let lo = mload(table, pos, opts.minnum_slot())?;
      let hi = mload(table, pos, opts.maxnum_slot())?;
      let typ = node.typ.clone();
      Ok(clamp(table, pos, lo, node, hi)?.with_typ(typ))
    }
    Some(Type::Base(b)) if b.kind == BaseKind::Decimal => {
      let lo = mload(table, pos, opts.mindecimal_slot())?;
      let hi = mload(table, pos, opts.maxdecimal_slot())?;
      let typ = node.typ.clone();
      Ok(clamp(table, pos, lo, node, hi)?.with_typ(typ))
    }
    _ => Ok(node),
  }
}

fn translate_binop(left: &Expr, op: BinOpKind, right: &Expr, pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let node = translate_binop_core(left, op, right, pos, ctx, table, opts, depth)?;
  finalize_value(node, table, opts, pos)
}

fn translate_binop_core(left: &Expr, op: BinOpKind, right: &Expr, pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let left = translate_value_expr_at(left, ctx, table, opts, depth)?;
  let right = translate_value_expr_at(right, ctx, table, opts, depth)?;
  binop_nodes(left, op, right, pos, table, opts)
}

/// The node-level arithmetic lowering shared by ordinary `BinOp` expressions
/// and augmented assignment (`t op= e`, which the original compiler
/// synthesizes as `t = t op e` and routes through this same lowering rather
/// than emitting raw opcodes): unit/positional algebra, decimal scaling, the
/// `guarded_mul` overflow assertion, and the `clamp_nonzero` divisor guards.
/// Operands are already-lowered value nodes.
pub(crate) fn binop_nodes(left: Node, op: BinOpKind, right: Node, pos: Pos, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let left_typ = left.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "operand has no type"))?;
  let right_typ = right.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "operand has no type"))?;
  if !ty::is_numeric_type(&left_typ) || !ty::is_numeric_type(&right_typ) {
    return Err(Error::type_mismatch(pos, "arithmetic requires numeric operands"));
  }
  let lb = expect_base(&left_typ, pos)?.clone();
  let rb = expect_base(&right_typ, pos)?.clone();

  match op {
    BinOpKind::Add | BinOpKind::Sub => {
      if lb.unit.is_some() && rb.unit.is_some() && lb.unit != rb.unit {
        return Err(Error::type_mismatch(pos, "unit mismatch between operands"));
      }
      if matches!(op, BinOpKind::Add) && lb.positional && rb.positional {
        return Err(Error::type_mismatch(pos, "cannot add two positional quantities"));
      }
      let new_unit = lb.unit.clone().or_else(|| rb.unit.clone());
      let new_positional = lb.positional ^ rb.positional;
      let mnemonic = if matches!(op, BinOpKind::Add) { "ADD" } else { "SUB" };
      let scale = Node::int(opts.decimal_scale());
      if lb.kind == rb.kind {
        Ok(Node::op(mnemonic, vec![left, right], table, pos)?
          .typed(Type::Base(Base { kind: lb.kind, unit: new_unit, positional: new_positional }), Location::None))
      } else if lb.kind == BaseKind::Num && rb.kind == BaseKind::Decimal {
        let scaled = Node::op("MUL", vec![left, scale], table, pos)?;
        Ok(Node::op(mnemonic, vec![scaled, right], table, pos)?
          .typed(Type::Base(Base { kind: BaseKind::Decimal, unit: new_unit, positional: new_positional }), Location::None))
      } else if lb.kind == BaseKind::Decimal && rb.kind == BaseKind::Num {
        let scaled = Node::op("MUL", vec![right, scale], table, pos)?;
        Ok(Node::op(mnemonic, vec![left, scaled], table, pos)?
          .typed(Type::Base(Base { kind: BaseKind::Decimal, unit: new_unit, positional: new_positional }), Location::None))
      } else {
        Err(Error::type_mismatch(pos, format!("unsupported operand types for {mnemonic}: {:?} {:?}", lb.kind, rb.kind)))
      }
    }
    BinOpKind::Mul => {
      if lb.positional || rb.positional {
        return Err(Error::type_mismatch(pos, "cannot multiply a positional quantity"));
      }
      let new_unit = ty::combine_units(lb.unit.as_ref(), rb.unit.as_ref(), false);
      match (lb.kind, rb.kind) {
        (BaseKind::Decimal, BaseKind::Decimal) => guarded_mul(left, right, table, pos, Some(opts.decimal_scale()), new_unit),
        (BaseKind::Num, BaseKind::Decimal) | (BaseKind::Decimal, BaseKind::Num) => guarded_mul(left, right, table, pos, None, new_unit),
        (a, b) if a == b => Ok(Node::op("MUL", vec![left, right], table, pos)?
          .typed(Type::Base(Base { kind: a, unit: new_unit, positional: false }), Location::None)),
        (a, b) => Err(Error::type_mismatch(pos, format!("unsupported operand types for multiplication: {a:?} {b:?}"))),
      }
    }
    BinOpKind::Div => {
      if lb.positional || rb.positional {
        return Err(Error::type_mismatch(pos, "cannot divide a positional quantity"));
      }
      let new_unit = ty::combine_units(lb.unit.as_ref(), rb.unit.as_ref(), true);
      match (lb.kind, rb.kind) {
        (_, BaseKind::Num) => {
          let guarded = clamp_nonzero(table, pos, right)?;
          Ok(Node::op("SDIV", vec![left, guarded], table, pos)?
            .typed(Type::Base(Base { kind: lb.kind, unit: new_unit, positional: false }), Location::None))
        }
        (BaseKind::Decimal, BaseKind::Decimal) => {
          let (l_sym, r_sym) = (intern("_L"), intern("_R"));
          let (l_var, r_var) = (Node::var(l_sym), Node::var(r_sym));
          let mul = Node::op("MUL", vec![l_var, Node::int(opts.decimal_scale())], table, pos)?;
          let sdiv = Node::op("SDIV", vec![mul, r_var], table, pos)?;
          let guarded_r = clamp_nonzero(table, pos, right)?;
          let with_r = Node::with(r_sym, guarded_r, sdiv, pos)?;
          let with_l = Node::with(l_sym, left, with_r, pos)?;
          Ok(with_l.typed(Type::Base(Base { kind: BaseKind::Decimal, unit: new_unit, positional: false }), Location::None))
        }
        (BaseKind::Num, BaseKind::Decimal) => {
          let scale2 = opts.decimal_scale() * opts.decimal_scale();
          let scaled = Node::op("MUL", vec![left, Node::bigint(BigInt::from(scale2))], table, pos)?;
          let guarded_r = clamp_nonzero(table, pos, right)?;
          Ok(Node::op("SDIV", vec![scaled, guarded_r], table, pos)?
            .typed(Type::Base(Base { kind: BaseKind::Decimal, unit: new_unit, positional: false }), Location::None))
        }
        (a, b) => Err(Error::type_mismatch(pos, format!("unsupported operand types for division: {a:?} {b:?}"))),
      }
    }
    BinOpKind::Mod => {
      if lb.positional || rb.positional {
        return Err(Error::type_mismatch(pos, "cannot take the modulus of a positional quantity"));
      }
      if lb.unit.is_some() && rb.unit.is_some() && lb.unit != rb.unit {
        return Err(Error::type_mismatch(pos, "unit mismatch between operands"));
      }
      let new_unit = lb.unit.clone().or_else(|| rb.unit.clone());
      match (lb.kind, rb.kind) {
        (a, b) if a == b => {
          let guarded = clamp_nonzero(table, pos, right)?;
          Ok(Node::op("SMOD", vec![left, guarded], table, pos)?
            .typed(Type::Base(Base { kind: a, unit: new_unit, positional: false }), Location::None))
        }
        (BaseKind::Decimal, BaseKind::Num) => {
          let guarded = clamp_nonzero(table, pos, right)?;
          let scaled = Node::op("MUL", vec![guarded, Node::int(opts.decimal_scale())], table, pos)?;
          Ok(Node::op("SMOD", vec![left, scaled], table, pos)?
            .typed(Type::Base(Base { kind: BaseKind::Decimal, unit: new_unit, positional: false }), Location::None))
        }
        (BaseKind::Num, BaseKind::Decimal) => {
          let scaled_left = Node::op("MUL", vec![left, Node::int(opts.decimal_scale())], table, pos)?;
          Ok(Node::op("SMOD", vec![scaled_left, right], table, pos)?
            .typed(Type::Base(Base { kind: BaseKind::Decimal, unit: new_unit, positional: false }), Location::None))
        }
        (a, b) => Err(Error::type_mismatch(pos, format!("unsupported operand types for modulus: {a:?} {b:?}"))),
      }
    }
  }
}

fn translate_compare(left: &Expr, ops: &[CompareOp], comparators: &[Expr], pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  if ops.len() != 1 || comparators.len() != 1 {
    return Err(Error::structure(pos, "chained comparisons are not supported"));
  }
  let left = translate_value_expr_at(left, ctx, table, opts, depth)?;
  let right = translate_value_expr_at(&comparators[0], ctx, table, opts, depth)?;
  let lt = left.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "operand has no type"))?;
  let rt = right.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "operand has no type"))?;
  let mnemonic = match ops[0] {
    CompareOp::Gt => "SGT",
    CompareOp::GtE => "SGE",
    CompareOp::Lt => "SLT",
    CompareOp::LtE => "SLE",
    CompareOp::Eq => "EQ",
    CompareOp::NotEq => "NE",
  };
  if !matches!(ops[0], CompareOp::Eq | CompareOp::NotEq) && (!ty::is_numeric_type(&lt) || !ty::is_numeric_type(&rt)) {
    return Err(Error::type_mismatch(pos, "ordering comparisons require numeric operands"));
  }
  let (lb, rb) = match (&lt, &rt) {
    (Type::Base(a), Type::Base(b)) => (a, b),
    _ => return Err(Error::type_mismatch(pos, "comparison requires two base-typed operands")),
  };
  if !ty::are_units_compatible(lb.unit.as_ref(), rb.unit.as_ref()) && !ty::are_units_compatible(rb.unit.as_ref(), lb.unit.as_ref()) {
    return Err(Error::type_mismatch(pos, "unit mismatch in comparison"));
  }
  let scale = Node::int(opts.decimal_scale());
  let node = if lb.kind == rb.kind {
    Node::op(mnemonic, vec![left, right], table, pos)?
  } else if lb.kind == BaseKind::Decimal && rb.kind == BaseKind::Num {
    let scaled = Node::op("MUL", vec![right, scale], table, pos)?;
    Node::op(mnemonic, vec![left, scaled], table, pos)?
  } else if lb.kind == BaseKind::Num && rb.kind == BaseKind::Decimal {
    let scaled = Node::op("MUL", vec![left, scale], table, pos)?;
    Node::op(mnemonic, vec![scaled, right], table, pos)?
  } else {
    return Err(Error::type_mismatch(pos, "unsupported operand types for comparison"));
  };
  Ok(node.typed(Type::bool_(), Location::None))
}

fn translate_boolop(op: BoolOpKind, values: &[Expr], pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  if values.len() != 2 {
    return Err(Error::structure(pos, "boolean operators take exactly two operands"));
  }
  let left = translate_value_expr_at(&values[0], ctx, table, opts, depth)?;
  let right = translate_value_expr_at(&values[1], ctx, table, opts, depth)?;
  for v in [&left, &right] {
    if !matches!(v.typ, Some(Type::Base(ref b)) if b.kind == BaseKind::Bool) {
      return Err(Error::type_mismatch(pos, "boolean operators require boolean operands"));
    }
  }
  let mnemonic = match op { BoolOpKind::And => "AND", BoolOpKind::Or => "OR" };
  Ok(Node::op(mnemonic, vec![left, right], table, pos)?.typed(Type::bool_(), Location::None))
}

fn translate_unaryop(op: UnaryOpKind, operand: &Expr, pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let operand = translate_value_expr_at(operand, ctx, table, opts, depth)?;
  match op {
    UnaryOpKind::Not => {
      if !matches!(operand.typ, Some(Type::Base(ref b)) if b.kind == BaseKind::Bool) {
        return Err(Error::type_mismatch(pos, "`not` requires a boolean operand"));
      }
      Ok(Node::op("ISZERO", vec![operand], table, pos)?.typed(Type::bool_(), Location::None))
    }
    UnaryOpKind::USub => {
      let t = operand.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "operand has no type"))?;
      if !ty::is_numeric_type(&t) {
        return Err(Error::type_mismatch(pos, "unary negation requires a numeric operand"));
      }
      let negated = Node::op("SUB", vec![Node::int(0i64), operand], table, pos)?.typed(t, Location::None);
      finalize_value(negated, table, opts, pos)
    }
  }
}

fn translate_call(func: &Expr, args: &[Expr], pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let Expr::Name(fname, _) = func else {
    return Err(Error::structure(pos, "call target must be a bare name"));
  };
  let text = fname.as_str();
  if args.len() != 1 && matches!(&*text, "floor" | "decimal" | "as_number") {
    return Err(Error::structure(pos, format!("`{text}` takes exactly one argument")));
  }
  match &*text {
    "floor" => {
      let sub = translate_value_expr_at(&args[0], ctx, table, opts, depth)?;
      let t = sub.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "argument to `floor` has no type"))?;
      match &t {
        Type::Base(b) if matches!(b.kind, BaseKind::Num | BaseKind::Num256 | BaseKind::Signed256) => Ok(sub),
        Type::Base(b) if b.kind == BaseKind::Decimal => {
          let (unit, positional) = (b.unit.clone(), b.positional);
          Ok(Node::op("SDIV", vec![sub, Node::int(opts.decimal_scale())], table, pos)?
            .typed(Type::Base(Base { kind: BaseKind::Num, unit, positional }), Location::None))
        }
        _ => Err(Error::type_mismatch(pos, "`floor` requires a numeric argument")),
      }
    }
    "decimal" => {
      let sub = translate_value_expr_at(&args[0], ctx, table, opts, depth)?;
      let t = sub.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "argument to `decimal` has no type"))?;
      match &t {
        Type::Base(b) if b.kind == BaseKind::Decimal => Ok(sub),
        Type::Base(b) if b.kind == BaseKind::Num => {
          let (unit, positional) = (b.unit.clone(), b.positional);
          Ok(Node::op("MUL", vec![sub, Node::int(opts.decimal_scale())], table, pos)?
            .typed(Type::Base(Base { kind: BaseKind::Decimal, unit, positional }), Location::None))
        }
        _ => Err(Error::type_mismatch(pos, "`decimal` requires a `num` or `decimal` argument")),
      }
    }
    "as_number" => {
      let sub = translate_value_expr_at(&args[0], ctx, table, opts, depth)?;
      let t = sub.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "argument to `as_number` has no type"))?;
      match &t {
        Type::Base(b) if matches!(b.kind, BaseKind::Num | BaseKind::Decimal) => {
          Ok(sub.with_typ(Some(Type::Base(Base { kind: b.kind, unit: None, positional: false }))))
        }
        _ => Err(Error::type_mismatch(pos, "`as_number` only strips the unit off a `num` or `decimal`")),
      }
    }
    _ => Err(Error::structure(pos, format!("unsupported call target `{text}`"))),
  }
}

fn translate_list(elts: &[Expr], pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  if elts.is_empty() {
    return Err(Error::structure(pos, "a list literal must have at least one element"));
  }
  let nodes: Vec<Node> = elts.iter()
    .map(|e| translate_expr_at(e, ctx, table, opts, depth))
    .collect::<Result<_>>()?;
  let first_type = nodes[0].typ.clone();
  let all_same = nodes.iter().all(|n| n.typ == first_type);
  let elem_type = if all_same { first_type.unwrap_or(Type::Mixed) } else { Type::Mixed };
  let count = nodes.len() as u32;
  Node::multi(nodes, Some(Type::List(Rc::new(elem_type), count)), pos)
}

fn translate_dict(keys: &[Symbol], values: &[Expr], pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options, depth: u32) -> Result<Node> {
  let mut seen: BTreeMap<Symbol, Node> = BTreeMap::new();
  let mut members: BTreeMap<Symbol, Type> = BTreeMap::new();
  for (k, v) in keys.iter().zip(values.iter()) {
    let text = k.as_str();
    if !ty::is_varname_valid(&text) {
      return Err(Error::type_mismatch(pos, format!("`{text}` is not a valid struct member name")));
    }
    if seen.contains_key(k) {
      return Err(Error::type_mismatch(pos, format!("member variable `{text}` duplicated")));
    }
    let n = translate_expr_at(v, ctx, table, opts, depth)?;
    let t = n.typ.clone().ok_or_else(|| Error::type_mismatch(pos, format!("member `{text}` has no type")))?;
    members.insert(*k, t);
    seen.insert(*k, n);
  }
  // `BTreeMap<Symbol, _>` iterates in alphabetical-by-name order (see the
  // `Ord` impl on `Symbol`), which is exactly the struct layout order.
  let ordered: Vec<Node> = seen.into_values().collect();
  Node::multi(ordered, Some(Type::Struct(Rc::new(members))), pos)
}

/// Unwrap a located node into the load that reads its value: `sload` from
/// storage, `mload` from memory, `calldataload` from calldata, or a no-op if
/// the node is already a plain value (`Location::None`).
pub(crate) fn unwrap_location(orig: Node, table: &dyn OpTable, pos: Pos) -> Result<Node> {
  let typ = orig.typ.clone();
  match orig.location {
    Location::Storage => Ok(Node::op("SLOAD", vec![orig], table, pos)?.with_typ(typ)),
    Location::Memory => Ok(Node::op("MLOAD", vec![orig], table, pos)?.with_typ(typ)),
    Location::Calldata => Ok(Node::op("CALLDATALOAD", vec![orig], table, pos)?.with_typ(typ)),
    Location::None => Ok(orig),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::{ArgSlot, Context};
  use crate::module::Global;
  use crate::types::ast::NumLit;
  use crate::types::entity::StaticOpTable;
  use crate::types::lir::Value;
  use hashbrown::HashMap;

  fn ctx_fixture<'g>(args: HashMap<Symbol, ArgSlot>, globals: &'g HashMap<Symbol, Global>) -> Context<'g> {
    Context::new(args, globals, None, false, intern("f"), Options::default())
  }

  #[test]
  fn integer_literal_has_num_type() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let ctx = ctx_fixture(HashMap::new(), &globals);
    let e = Expr::Num(NumLit::Int(BigInt::from(42)), Pos::default());
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.typ, Some(Type::num()));
    assert_eq!(n.valency(), 1);
  }

  #[test]
  fn oversized_literal_is_rejected() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let ctx = ctx_fixture(HashMap::new(), &globals);
    let too_big = numeric::literal_bound() + BigInt::from(1);
    let e = Expr::Num(NumLit::Int(too_big), Pos::default());
    assert!(translate_expr(&e, &ctx, &table, Options::default()).is_err());
  }

  #[test]
  fn forty_two_char_hex_string_is_an_address() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let ctx = ctx_fixture(HashMap::new(), &globals);
    let e = Expr::Str("0x".to_string() + &"ab".repeat(20), Pos::default());
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.typ, Some(Type::address()));
    assert_eq!(n.location, Location::None);
  }

  #[test]
  fn sixty_six_char_hex_string_is_bytes32() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let ctx = ctx_fixture(HashMap::new(), &globals);
    let e = Expr::Str("0x".to_string() + &"ab".repeat(32), Pos::default());
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.typ, Some(Type::Base(Base::plain(BaseKind::Bytes32))));
  }

  #[test]
  fn arbitrary_string_literal_is_rejected() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let ctx = ctx_fixture(HashMap::new(), &globals);
    let e = Expr::Str("not a hex literal".to_string(), Pos::default());
    assert!(translate_expr(&e, &ctx, &table, Options::default()).is_err());
  }

  #[test]
  fn self_name_resolves_to_a_storage_global() {
    let table = StaticOpTable;
    let mut globals = HashMap::new();
    globals.insert(intern("total_supply"), Global { name: intern("total_supply"), slot: 3, typ: Type::num() });
    let ctx = ctx_fixture(HashMap::new(), &globals);
    let e = Expr::Attribute {
      value: Box::new(Expr::Name(intern("self"), Pos::default())),
      attr: intern("total_supply"),
      pos: Pos::default(),
    };
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.location, Location::Storage);
  }

  #[test]
  fn msg_sender_is_caller_opcode() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let ctx = ctx_fixture(HashMap::new(), &globals);
    let e = Expr::Attribute {
      value: Box::new(Expr::Name(intern("msg"), Pos::default())),
      attr: intern("sender"),
      pos: Pos::default(),
    };
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.typ, Some(Type::address()));
  }

  #[test]
  fn add_two_nums_is_range_clamped_add() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let mut args = HashMap::new();
    args.insert(intern("a"), ArgSlot { offset: 4, typ: Type::num() });
    args.insert(intern("b"), ArgSlot { offset: 36, typ: Type::num() });
    let ctx = ctx_fixture(args, &globals);
    let e = Expr::BinOp {
      left: Box::new(Expr::Name(intern("a"), Pos::default())),
      op: BinOpKind::Add,
      right: Box::new(Expr::Name(intern("b"), Pos::default())),
      pos: Pos::default(),
    };
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.typ, Some(Type::num()));
    assert_eq!(n.valency(), 1);
    // The sum is re-clamped into MINNUM..MAXNUM: the top-level node is the
    // clamp, with the actual `add` buried as its middle argument.
    assert_eq!(n.value, Value::Sym(intern("CLAMP")));
    assert_eq!(n.args[1].value, Value::Sym(intern("ADD")));
  }

  #[test]
  fn adding_two_positionals_is_rejected() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let positional = Type::Base(Base { kind: BaseKind::Num, unit: Some(unit_literal("sec")), positional: true });
    let mut args = HashMap::new();
    args.insert(intern("a"), ArgSlot { offset: 4, typ: positional.clone() });
    args.insert(intern("b"), ArgSlot { offset: 36, typ: positional });
    let ctx = ctx_fixture(args, &globals);
    let e = Expr::BinOp {
      left: Box::new(Expr::Name(intern("a"), Pos::default())),
      op: BinOpKind::Add,
      right: Box::new(Expr::Name(intern("b"), Pos::default())),
      pos: Pos::default(),
    };
    assert!(translate_expr(&e, &ctx, &table, Options::default()).is_err());
  }

  #[test]
  fn decimal_multiplication_builds_a_guarded_with_tree() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let decimal = Type::Base(Base::plain(BaseKind::Decimal));
    let mut args = HashMap::new();
    args.insert(intern("a"), ArgSlot { offset: 4, typ: decimal.clone() });
    args.insert(intern("b"), ArgSlot { offset: 36, typ: decimal });
    let ctx = ctx_fixture(args, &globals);
    let e = Expr::BinOp {
      left: Box::new(Expr::Name(intern("a"), Pos::default())),
      op: BinOpKind::Mul,
      right: Box::new(Expr::Name(intern("b"), Pos::default())),
      pos: Pos::default(),
    };
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.typ, Some(Type::Base(Base::plain(BaseKind::Decimal))));
    assert_eq!(n.valency(), 1);
  }

  #[test]
  fn list_literal_is_multi_with_element_type() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let ctx = ctx_fixture(HashMap::new(), &globals);
    let e = Expr::List {
      elts: vec![
        Expr::Num(NumLit::Int(BigInt::from(1)), Pos::default()),
        Expr::Num(NumLit::Int(BigInt::from(2)), Pos::default()),
      ],
      pos: Pos::default(),
    };
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.valency(), 2);
    assert!(matches!(n.typ, Some(Type::List(_, 2))));
  }

  #[test]
  fn struct_field_access_on_memory_variable_adds_byte_offset() {
    let table = StaticOpTable;
    let globals = HashMap::new();
    let mut ctx = ctx_fixture(HashMap::new(), &globals);
    let struct_typ = Type::Struct(Rc::new(BTreeMap::from([
      (intern("a"), Type::num()),
      (intern("b"), Type::num()),
    ])));
    let offset = ctx.new_variable(intern("s"), struct_typ, Pos::default()).unwrap();
    let e = Expr::Attribute {
      value: Box::new(Expr::Name(intern("s"), Pos::default())),
      attr: intern("b"),
      pos: Pos::default(),
    };
    let n = translate_expr(&e, &ctx, &table, Options::default()).unwrap();
    assert_eq!(n.location, Location::Memory);
    assert_eq!(n.typ, Some(Type::num()));
    let _ = offset;
  }
}
