//! The setter synthesizer (component H): turns a location node plus a value
//! node into a node that performs the assignment, recursing structurally for
//! lists and structs so the whole-aggregate case is just many base-type
//! stores wired together.
//!
//! Three shapes of right-hand side matter here, mirroring the original
//! compiler's `make_setter`:
//! - a `multi` node (a list/dict literal, still a flat run of stack words) —
//!   assign element-wise, positionally for a list and by sorted field name
//!   for a struct;
//! - a `null` literal — zero-initialize every leaf recursively;
//! - anything else — the address (or value, for a base type) of another
//!   variable of the same aggregate shape, copied element-wise.
//!
//! Every recursive case binds the source and/or destination address to a
//! `with`-scoped `_L`/`_R` temporary before descending, so the address
//! expression is evaluated once no matter how many leaves the aggregate has.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::expr::{add_variable_offset, base_type_conversion, Key};
use crate::config::Options;
use crate::span::Pos;
use crate::symbol::{intern, Symbol};
use crate::types::entity::OpTable;
use crate::types::lir::{Location, Node};
use crate::types::ty::Type;

/// Build the node that stores `right` into `left`. `left` must carry a
/// type and a concrete storage/memory location; `right` is either a `multi`,
/// a `null`, or another location/value node of compatible shape.
pub fn make_setter(left: Node, right: Node, table: &dyn OpTable, pos: Pos, opts: Options) -> Result<Node> {
  let left_typ = left.typ.clone()
    .ok_or_else(|| Error::type_mismatch(pos, "assignment target has no type"))?;
  match &left_typ {
    Type::Base(_) => make_setter_base(left, right, &left_typ, table, pos, opts),
    Type::List(_elem, count) => make_setter_list(left, right, *count, table, pos, opts),
    Type::Struct(members) => make_setter_struct(left, right, members, table, pos, opts),
    Type::ByteArray(maxlen) => make_setter_bytearray(left, right, *maxlen, table, pos),
    Type::Mapping(..) => Err(Error::type_mismatch(pos, "cannot assign directly to a mapping")),
    Type::Mixed | Type::Null => Err(Error::type_mismatch(pos, "cannot assign to this type")),
  }
}

fn make_setter_base(left: Node, right: Node, left_typ: &Type, table: &dyn OpTable, pos: Pos, opts: Options) -> Result<Node> {
  let mnemonic = match left.location {
    Location::Storage => "SSTORE",
    Location::Memory => "MSTORE",
    Location::Calldata | Location::None =>
      return Err(Error::type_mismatch(pos, "assignment target must live in storage or memory")),
  };
  let right_typ = right.typ.clone()
    .ok_or_else(|| Error::type_mismatch(pos, "assignment source has no type"))?;
  let value = base_type_conversion(right, &right_typ, left_typ, table, pos, opts)?;
  Node::op(mnemonic, vec![left, value], table, pos)
}

fn make_setter_list(left: Node, right: Node, count: u32, table: &dyn OpTable, pos: Pos, opts: Options) -> Result<Node> {
  if right.is_multi() {
    if right.args.len() as u32 != count {
      return Err(Error::type_mismatch(pos, "list literal has the wrong number of elements for this target"));
    }
    let l_sym = intern("_L");
    let l_var = Node::var(l_sym);
    let mut stmts = Vec::with_capacity(count as usize);
    for (i, elt) in right.args.into_iter().enumerate() {
      let left_i = add_variable_offset(l_var.clone(), Key::Index(Node::int(i as i64)), table, pos, opts)?;
      stmts.push(make_setter(left_i, elt, table, pos, opts)?);
    }
    return Node::with(l_sym, left, Node::seq(stmts), pos);
  }

  if matches!(right.typ, Some(Type::Null)) {
    let l_sym = intern("_L");
    let l_var = Node::var(l_sym);
    let mut stmts = Vec::with_capacity(count as usize);
    for i in 0..count {
      let left_i = add_variable_offset(l_var.clone(), Key::Index(Node::int(i64::from(i))), table, pos, opts)?;
      stmts.push(make_setter(left_i, Node::null(), table, pos, opts)?);
    }
    return Node::with(l_sym, left, Node::seq(stmts), pos);
  }

  let l_sym = intern("_L");
  let r_sym = intern("_R");
  let l_var = Node::var(l_sym);
  let r_var = Node::var(r_sym);
  let mut stmts = Vec::with_capacity(count as usize);
  for i in 0..count {
    let left_i = add_variable_offset(l_var.clone(), Key::Index(Node::int(i64::from(i))), table, pos, opts)?;
    let right_i = add_variable_offset(r_var.clone(), Key::Index(Node::int(i64::from(i))), table, pos, opts)?;
    stmts.push(make_setter(left_i, right_i, table, pos, opts)?);
  }
  let inner = Node::with(r_sym, right, Node::seq(stmts), pos)?;
  Node::with(l_sym, left, inner, pos)
}

fn make_setter_struct(left: Node, right: Node, members: &Rc<BTreeMap<Symbol, Type>>, table: &dyn OpTable, pos: Pos, opts: Options) -> Result<Node> {
  if right.is_multi() {
    if right.args.len() != members.len() {
      return Err(Error::type_mismatch(pos, "struct literal has the wrong number of members for this target"));
    }
    let l_sym = intern("_L");
    let l_var = Node::var(l_sym);
    let mut stmts = Vec::with_capacity(members.len());
    for (name, elt) in members.keys().copied().zip(right.args) {
      let left_i = add_variable_offset(l_var.clone(), Key::Field(name), table, pos, opts)?;
      stmts.push(make_setter(left_i, elt, table, pos, opts)?);
    }
    return Node::with(l_sym, left, Node::seq(stmts), pos);
  }

  if matches!(right.typ, Some(Type::Null)) {
    let l_sym = intern("_L");
    let l_var = Node::var(l_sym);
    let mut stmts = Vec::with_capacity(members.len());
    for name in members.keys().copied() {
      let left_i = add_variable_offset(l_var.clone(), Key::Field(name), table, pos, opts)?;
      stmts.push(make_setter(left_i, Node::null(), table, pos, opts)?);
    }
    return Node::with(l_sym, left, Node::seq(stmts), pos);
  }

  let l_sym = intern("_L");
  let r_sym = intern("_R");
  let l_var = Node::var(l_sym);
  let r_var = Node::var(r_sym);
  let mut stmts = Vec::with_capacity(members.len());
  for name in members.keys().copied() {
    let left_i = add_variable_offset(l_var.clone(), Key::Field(name), table, pos, opts)?;
    let right_i = add_variable_offset(r_var.clone(), Key::Field(name), table, pos, opts)?;
    stmts.push(make_setter(left_i, right_i, table, pos, opts)?);
  }
  let inner = Node::with(r_sym, right, Node::seq(stmts), pos)?;
  Node::with(l_sym, left, inner, pos)
}

/// Byte arrays are copied a fixed `1 + ceil(maxlen/32)` words (length word
/// plus data words) regardless of the source's actual runtime length — the
/// bound is a compile-time constant, so there is no need for a
/// runtime-length-dependent copy. A calldata source uses a single
/// `CALLDATACOPY`; a memory source is unrolled into per-word loads and
/// stores since there is no bulk memory-to-memory opcode in the table.
/// Storage is not a supported byte array source.
fn make_setter_bytearray(left: Node, right: Node, maxlen: u32, table: &dyn OpTable, pos: Pos) -> Result<Node> {
  let word_count = 1 + maxlen.div_ceil(32);
  match right.location {
    Location::Calldata => {
      let len = Node::int(i64::from(word_count * 32));
      Node::op("CALLDATACOPY", vec![left, right, len], table, pos)
    }
    Location::Memory => {
      let l_sym = intern("_L");
      let r_sym = intern("_R");
      let l_var = Node::var(l_sym);
      let r_var = Node::var(r_sym);
      let mut stmts = Vec::with_capacity(word_count as usize);
      for i in 0..word_count {
        let off = Node::int(i64::from(i * 32));
        let l_addr = Node::op("ADD", vec![l_var.clone(), off.clone()], table, pos)?;
        let r_addr = Node::op("ADD", vec![r_var.clone(), off], table, pos)?;
        let loaded = Node::op("MLOAD", vec![r_addr], table, pos)?;
        stmts.push(Node::op("MSTORE", vec![l_addr, loaded], table, pos)?);
      }
      let inner = Node::with(r_sym, right, Node::seq(stmts), pos)?;
      Node::with(l_sym, left, inner, pos)
    }
    Location::Storage =>
      Err(Error::type_mismatch(pos, "copying a byte array out of storage is not supported")),
    Location::None =>
      Err(Error::type_mismatch(pos, "byte array assignment source must be calldata or memory")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::entity::StaticOpTable;
  use crate::types::ty::{Base, BaseKind};

  #[test]
  fn base_store_to_memory_uses_mstore() {
    let left = Node::int(64).typed(Type::num(), Location::Memory);
    let right = Node::int(5).typed(Type::num(), Location::None);
    let node = make_setter(left, right, &StaticOpTable, Pos::default(), Options::default()).unwrap();
    assert_eq!(node.valency(), 0);
  }

  #[test]
  fn base_store_requires_storage_or_memory_target() {
    let left = Node::int(64).typed(Type::num(), Location::Calldata);
    let right = Node::int(5).typed(Type::num(), Location::None);
    assert!(make_setter(left, right, &StaticOpTable, Pos::default(), Options::default()).is_err());
  }

  #[test]
  fn list_literal_assigns_element_wise() {
    let elem_ty = Type::num();
    let left = Node::int(64).typed(Type::List(Rc::new(elem_ty.clone()), 2), Location::Memory);
    let a = Node::int(1).typed(elem_ty.clone(), Location::None);
    let b = Node::int(2).typed(elem_ty, Location::None);
    let right = Node::multi(vec![a, b], Some(Type::List(Rc::new(Type::num()), 2)), Pos::default()).unwrap();
    let node = make_setter(left, right, &StaticOpTable, Pos::default(), Options::default()).unwrap();
    assert_eq!(node.valency(), 0);
  }

  #[test]
  fn list_literal_with_wrong_arity_is_rejected() {
    let elem_ty = Type::num();
    let left = Node::int(64).typed(Type::List(Rc::new(elem_ty.clone()), 2), Location::Memory);
    let a = Node::int(1).typed(elem_ty, Location::None);
    let right = Node::multi(vec![a], Some(Type::List(Rc::new(Type::num()), 1)), Pos::default()).unwrap();
    assert!(make_setter(left, right, &StaticOpTable, Pos::default(), Options::default()).is_err());
  }

  #[test]
  fn struct_null_zero_initializes_every_member() {
    let mut members = BTreeMap::new();
    members.insert(intern("a"), Type::num());
    members.insert(intern("b"), Type::bool_());
    let left = Node::int(64).typed(Type::Struct(Rc::new(members)), Location::Memory);
    let right = Node::null();
    let node = make_setter(left, right, &StaticOpTable, Pos::default(), Options::default()).unwrap();
    assert_eq!(node.valency(), 0);
  }

  #[test]
  fn mapping_target_is_rejected() {
    let left = Node::int(64).typed(
      Type::Mapping(Rc::new(Base::plain(BaseKind::Num)), Rc::new(Type::num())),
      Location::Storage,
    );
    let right = Node::int(1).typed(Type::num(), Location::None);
    assert!(make_setter(left, right, &StaticOpTable, Pos::default(), Options::default()).is_err());
  }

  #[test]
  fn byte_array_from_calldata_uses_calldatacopy() {
    let left = Node::int(64).typed(Type::ByteArray(64), Location::Memory);
    let right = Node::int(4).typed(Type::ByteArray(64), Location::Calldata);
    let node = make_setter(left, right, &StaticOpTable, Pos::default(), Options::default()).unwrap();
    assert_eq!(node.valency(), 0);
  }

  #[test]
  fn byte_array_from_storage_is_rejected() {
    let left = Node::int(64).typed(Type::ByteArray(64), Location::Memory);
    let right = Node::int(4).typed(Type::ByteArray(64), Location::Storage);
    assert!(make_setter(left, right, &StaticOpTable, Pos::default(), Options::default()).is_err());
  }
}
