//! The type system (component A): representation, parsing from annotation
//! expressions, canonicalization to ABI spellings, size computation, and the
//! unit/positional algebra.
//!
//! Types form a small `Rc`-based tree so that looking a variable's type up
//! in a symbol table and handing it to three different call sites doesn't
//! require cloning a potentially large struct layout.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::span::Pos;
use crate::symbol::{intern, Symbol};
use crate::types::entity::is_reserved;

/// A vector of integer exponents over symbolic base units (`{wei: 1}`,
/// `{sec: 1, m: -1}`). Stored in a `BTreeMap` so two units with the same
/// content compare equal regardless of insertion order, and so
/// [`canonicalize_type`] can emit them in a stable order.
///
/// A *type* with no unit is `None`, not `Some(<empty map>)`; see
/// [`combine_units`] for why the empty map never escapes this module.
pub type Units = BTreeMap<Symbol, i32>;

/// The seven scalar kinds a [`Base`] type can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseKind { Num, Decimal, Bool, Address, Bytes32, Num256, Signed256 }

impl BaseKind {
  fn from_name(name: &str) -> Option<Self> {
    Some(match name {
      "num" => Self::Num,
      "decimal" => Self::Decimal,
      "bool" => Self::Bool,
      "address" => Self::Address,
      "bytes32" => Self::Bytes32,
      "num256" => Self::Num256,
      "signed256" => Self::Signed256,
      _ => return None,
    })
  }

  fn canonical(self) -> &'static str {
    match self {
      Self::Num => "int128",
      Self::Decimal => "real128x10",
      Self::Bool => "bool",
      Self::Address => "address",
      Self::Bytes32 => "bytes32",
      Self::Num256 => "uint256",
      Self::Signed256 => "int256",
    }
  }

  /// Only these two kinds model physical quantities; units and the
  /// positional flag are meaningless on the others.
  fn admits_unit(self) -> bool { matches!(self, Self::Num | Self::Decimal) }
}

/// A scalar type: a kind, an optional unit vector, and the positional flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Base {
  pub kind: BaseKind,
  pub unit: Option<Units>,
  pub positional: bool,
}

impl Base {
  #[must_use] pub fn plain(kind: BaseKind) -> Self { Self { kind, unit: None, positional: false } }
}

/// Where a type annotation is being parsed from. Mappings are only legal in
/// storage; byte-array return-from-storage is unsupported (§9 design note).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location { Storage, Memory, Calldata, None }

/// A source-language type. `List`/`Struct` box their element/member types in
/// `Rc` so cloning a `Type` handle (routine in symbol table lookups) never
/// deep-copies a layout.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
  Base(Base),
  /// Fixed-length homogeneous sequence. `count >= 1`.
  List(Rc<Type>, u32),
  /// Unbounded associative map. Storage-only; `keytype` must be a [`Base`].
  Mapping(Rc<Base>, Rc<Type>),
  /// Ordered field-name -> type. The `BTreeMap` keeps members in sorted key
  /// order, which is the struct layout order (§5 ordering guarantee).
  Struct(Rc<BTreeMap<Symbol, Type>>),
  /// Bounded byte sequence; `maxlen` in bytes.
  ByteArray(u32),
  /// Placeholder for a list literal with heterogeneous element types.
  /// Disallowed at any use site that needs a concrete element type.
  Mixed,
  /// The type of the literal `null`; assignable to any base type.
  Null,
}

impl Type {
  #[must_use] pub fn num() -> Self { Type::Base(Base::plain(BaseKind::Num)) }
  #[must_use] pub fn bool_() -> Self { Type::Base(Base::plain(BaseKind::Bool)) }
  #[must_use] pub fn address() -> Self { Type::Base(Base::plain(BaseKind::Address)) }
}

/// `true` for any [`Type::Base`].
#[must_use] pub fn is_base_type(t: &Type) -> bool { matches!(t, Type::Base(_)) }

/// `true` for a base type whose kind participates in arithmetic.
#[must_use] pub fn is_numeric_type(t: &Type) -> bool {
  matches!(t, Type::Base(b) if matches!(b.kind,
    BaseKind::Num | BaseKind::Decimal | BaseKind::Num256 | BaseKind::Signed256))
}

/// A name is valid as a declared identifier iff it is not reserved (an
/// opcode/pseudo-opcode mnemonic, a keyword, or underscore-prefixed).
#[must_use] pub fn is_varname_valid(name: &str) -> bool { !is_reserved(name) }

/// Merge two optional unit vectors. `div == false` adds exponents (unit
/// composition under multiplication); `div == true` subtracts `b`'s
/// exponents from `a`'s (unit composition under division). An absent
/// operand is the additive identity. Any key whose combined exponent is
/// zero is dropped; a result with no remaining keys collapses to `None`
/// rather than `Some(<empty map>)`, so two absent-unit types always compare
/// equal to each other through plain `Option` equality.
#[must_use] pub fn combine_units(a: Option<&Units>, b: Option<&Units>, div: bool) -> Option<Units> {
  if a.is_none() && b.is_none() { return None }
  let sign = if div { -1 } else { 1 };
  let mut out: Units = BTreeMap::new();
  if let Some(ua) = a { for (&k, &e) in ua { *out.entry(k).or_insert(0) += e; } }
  if let Some(ub) = b { for (&k, &e) in ub { *out.entry(k).or_insert(0) += sign * e; } }
  out.retain(|_, e| *e != 0);
  if out.is_empty() { None } else { Some(out) }
}

/// Two base types are unit-compatible iff the source unit is absent, or the
/// two unit vectors are equal.
#[must_use] pub fn are_units_compatible(src: Option<&Units>, dst: Option<&Units>) -> bool {
  src.is_none() || src == dst
}

/// Strip units from every [`Base`] reachable in `t`, recursively. Used when
/// a statement introduces a local variable from an expression's inferred
/// type (§4.G): the variable's declared type tracks shape and kind but not
/// the transient unit the initializing expression happened to carry.
#[must_use] pub fn set_default_units(t: &Type) -> Type {
  match t {
    Type::Base(b) => Type::Base(Base { kind: b.kind, unit: None, positional: b.positional }),
    Type::List(sub, n) => Type::List(Rc::new(set_default_units(sub)), *n),
    Type::Struct(members) => {
      Type::Struct(Rc::new(members.iter().map(|(&k, v)| (k, set_default_units(v))).collect()))
    }
    other => other.clone(),
  }
}

/// Storage/memory word count for a type: base types occupy one word; a list
/// occupies `count` times its element size; a struct occupies the sum of its
/// members' sizes. Mappings have no fixed size (unbounded); byte arrays are
/// sized by their own `maxlen`/32 rather than through this function. Both
/// are reported as [`Error::InvalidType`] if asked for here.
pub fn get_size_of_type(t: &Type, pos: Pos) -> Result<u32> {
  match t {
    Type::Base(_) => Ok(1),
    Type::List(sub, n) => Ok(get_size_of_type(sub, pos)?.saturating_mul(*n)),
    Type::Struct(members) => {
      members.values().try_fold(0u32, |acc, m| Ok(acc + get_size_of_type(m, pos)?))
    }
    Type::Mapping(..) => Err(Error::invalid_type(pos, "mappings have no fixed storage size")),
    Type::ByteArray(_) => {
      Err(Error::invalid_type(pos, "byte array size is not computed through get_size_of_type"))
    }
    Type::Mixed => Err(Error::invalid_type(pos, "cannot size a heterogeneous list literal")),
    Type::Null => Err(Error::invalid_type(pos, "cannot size the null type")),
  }
}

/// Render a type as its stable ABI spelling. This is a compatibility
/// surface (§6): once published, a spelling must not change.
pub fn canonicalize_type(t: &Type, pos: Pos) -> Result<String> {
  Ok(match t {
    Type::Base(b) => b.kind.canonical().to_string(),
    Type::List(sub, n) => format!("{}[{}]", canonicalize_type(sub, pos)?, n),
    Type::ByteArray(max) => format!("bytes<={max}>"),
    Type::Struct(members) => {
      let fields: Result<Vec<String>> = members.iter()
        .map(|(k, v)| Ok(format!("{}:{}", k, canonicalize_type(v, pos)?)))
        .collect();
      format!("{{{}}}", fields?.join(","))
    }
    Type::Mapping(..) => return Err(Error::invalid_type(pos, "mappings have no ABI representation")),
    Type::Mixed => return Err(Error::invalid_type(pos, "cannot canonicalize a heterogeneous list literal")),
    Type::Null => return Err(Error::invalid_type(pos, "cannot canonicalize the null type")),
  })
}

fn unit_from_args(kind: BaseKind, args: &[crate::types::ast::Expr], pos: Pos) -> Result<(Option<Units>, bool)> {
  if args.is_empty() { return Ok((None, false)) }
  if !kind.admits_unit() {
    return Err(Error::invalid_type(pos, format!("{} cannot carry a unit or positional flag", kind.canonical())));
  }
  let mut unit: Units = BTreeMap::new();
  let mut positional = false;
  for arg in args {
    let crate::types::ast::Expr::Name(sym, apos) = arg else {
      return Err(Error::invalid_type(arg.pos(), "unit annotation must be a bare name"));
    };
    let text = sym.as_str();
    if &*text == "positional" {
      positional = true;
      continue;
    }
    if unit.insert(*sym, 1).is_some() {
      return Err(Error::invalid_type(*apos, format!("duplicate unit `{text}` in annotation")));
    }
  }
  Ok((if unit.is_empty() { None } else { Some(unit) }, positional))
}

/// Parse a type out of an annotation expression. Annotations reuse the
/// ordinary expression grammar (see [`crate::types::ast`]): a bare name is a
/// scalar kind, a call attaches a unit/positional flag (or builds a mapping
/// or byte array), a subscript builds a fixed-length list, and a dict
/// literal builds a struct.
pub fn parse_type(expr: &crate::types::ast::Expr, location: Location) -> Result<Type> {
  use crate::types::ast::Expr;
  match expr {
    Expr::Name(sym, pos) => {
      let text = sym.as_str();
      let kind = BaseKind::from_name(&text)
        .ok_or_else(|| Error::invalid_type(*pos, format!("unknown type name `{text}`")))?;
      Ok(Type::Base(Base::plain(kind)))
    }
    Expr::Call { func, args, pos } => {
      let Expr::Name(fname, _) = func.as_ref() else {
        return Err(Error::invalid_type(*pos, "type annotation call must name a type"));
      };
      let text = fname.as_str();
      if &*text == "bytes" {
        let [Expr::Num(n, npos)] = args.as_slice() else {
          return Err(Error::invalid_type(*pos, "bytes(maxlen) takes exactly one integer argument"));
        };
        let crate::types::ast::NumLit::Int(n) = n else {
          return Err(Error::invalid_type(*npos, "byte array max length must be an integer"));
        };
        let max: u32 = n.try_into().map_err(|_| Error::invalid_type(*npos, "byte array max length out of range"))?;
        return Ok(Type::ByteArray(max));
      }
      if &*text == "map" {
        if location != Location::Storage {
          return Err(Error::invalid_type(*pos, "mapping types are only valid in storage"));
        }
        let [key_expr, val_expr] = args.as_slice() else {
          return Err(Error::invalid_type(*pos, "map(keytype, valuetype) takes exactly two arguments"));
        };
        let key_ty = parse_type(key_expr, location)?;
        let Type::Base(key_base) = key_ty else {
          return Err(Error::invalid_type(key_expr.pos(), "mapping key type must be a base type"));
        };
        let val_ty = parse_type(val_expr, location)?;
        return Ok(Type::Mapping(Rc::new(key_base), Rc::new(val_ty)));
      }
      let kind = BaseKind::from_name(&text)
        .ok_or_else(|| Error::invalid_type(*pos, format!("unknown type name `{text}`")))?;
      let (unit, positional) = unit_from_args(kind, args, *pos)?;
      Ok(Type::Base(Base { kind, unit, positional }))
    }
    Expr::Subscript { value, index, pos } => {
      let elem = parse_type(value, location)?;
      let crate::types::ast::Expr::Num(crate::types::ast::NumLit::Int(n), npos) = index.as_ref() else {
        return Err(Error::invalid_type(*pos, "list length must be a positive integer literal"));
      };
      let count: u32 = n.try_into().map_err(|_| Error::invalid_type(*npos, "list length out of range"))?;
      if count == 0 {
        return Err(Error::invalid_type(*npos, "list length must be at least 1"));
      }
      Ok(Type::List(Rc::new(elem), count))
    }
    Expr::Dict { keys, values, pos } => {
      let mut members: BTreeMap<Symbol, Type> = BTreeMap::new();
      for (k, v) in keys.iter().zip(values.iter()) {
        let field_ty = parse_type(v, location)?;
        if members.insert(*k, field_ty).is_some() {
          return Err(Error::var_decl(*pos, format!("duplicate struct field `{}`", k.as_str())));
        }
      }
      Ok(Type::Struct(Rc::new(members)))
    }
    other => Err(Error::invalid_type(other.pos(), "not a valid type annotation")),
  }
}

pub(crate) fn unit_of(t: &Type) -> Option<&Units> {
  match t { Type::Base(b) => b.unit.as_ref(), _ => None }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ast::Expr;

  fn name(s: &str) -> Expr { Expr::Name(intern(s), Pos::default()) }

  #[test]
  fn parses_plain_base() {
    assert_eq!(parse_type(&name("num"), Location::Memory).unwrap(), Type::num());
  }

  #[test]
  fn parses_unit_call() {
    let e = Expr::Call { func: Box::new(name("num")), args: vec![name("wei")], pos: Pos::default() };
    let t = parse_type(&e, Location::Memory).unwrap();
    let Type::Base(b) = t else { panic!("expected base") };
    assert_eq!(b.unit, Some(BTreeMap::from([(intern("wei"), 1)])));
    assert!(!b.positional);
  }

  #[test]
  fn rejects_unit_on_bool() {
    let e = Expr::Call { func: Box::new(name("bool")), args: vec![name("wei")], pos: Pos::default() };
    assert!(parse_type(&e, Location::Memory).is_err());
  }

  #[test]
  fn combine_units_round_trips() {
    let wei: Units = BTreeMap::from([(intern("wei"), 1)]);
    let sec: Units = BTreeMap::from([(intern("sec"), 1)]);
    let per_sec = combine_units(Some(&wei), Some(&sec), true);
    let back = combine_units(per_sec.as_ref(), Some(&sec), false);
    assert_eq!(back, Some(wei));
  }

  #[test]
  fn combine_units_cancels_to_none() {
    let wei: Units = BTreeMap::from([(intern("wei"), 1)]);
    assert_eq!(combine_units(Some(&wei), Some(&wei), true), None);
  }

  #[test]
  fn units_compatible_rules() {
    let wei: Units = BTreeMap::from([(intern("wei"), 1)]);
    assert!(are_units_compatible(None, Some(&wei)));
    assert!(are_units_compatible(None, None));
    assert!(are_units_compatible(Some(&wei), Some(&wei)));
    assert!(!are_units_compatible(Some(&wei), None));
  }

  #[test]
  fn sizes_struct_and_list() {
    let pos = Pos::default();
    let list = Type::List(Rc::new(Type::num()), 4);
    assert_eq!(get_size_of_type(&list, pos).unwrap(), 4);
    let s = Type::Struct(Rc::new(BTreeMap::from([
      (intern("a"), Type::num()),
      (intern("b"), Type::List(Rc::new(Type::num()), 2)),
    ])));
    assert_eq!(get_size_of_type(&s, pos).unwrap(), 3);
  }

  #[test]
  fn rejects_reserved_varname() {
    assert!(!is_varname_valid("add"));
    assert!(!is_varname_valid("_tmp"));
    assert!(is_varname_valid("balance_of"));
  }
}
