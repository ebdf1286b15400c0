//! A small string interner for identifiers (field names, argument names,
//! local variable names). Interning means `Symbol` is `Copy` and hashing or
//! comparing two of them is a pointer-sized integer operation, which matters
//! because the expression translator does name lookups constantly.

use std::cell::RefCell;
use hashbrown::HashMap;

/// An interned identifier. Two `Symbol`s are equal iff the strings they were
/// interned from are equal.
///
/// Ordering is **not** derived from the interned id: struct member layout
/// and dict-literal field order (§5) are a sorted-by-name compatibility
/// surface, and members are routinely stored in a `BTreeMap<Symbol, _>`
/// (see [`crate::types::ty::Type::Struct`]) to get that ordering for free
/// by iterating the map. If `Ord` compared intern ids, the map would
/// iterate in first-use order instead, silently breaking that surface the
/// moment two fields were interned out of alphabetical order. `Ord` here
/// therefore compares the resolved text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

impl PartialOrd for Symbol {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for Symbol {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    if self.0 == other.0 { return std::cmp::Ordering::Equal }
    self.as_str().cmp(&other.as_str())
  }
}

thread_local! {
  static INTERNER: RefCell<Interner> = RefCell::new(Interner::default());
}

#[derive(Default)]
struct Interner {
  map: HashMap<Box<str>, u32>,
  strings: Vec<Box<str>>,
}

impl Interner {
  fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&id) = self.map.get(s) { return Symbol(id) }
    let id = u32::try_from(self.strings.len()).expect("too many distinct identifiers");
    let boxed: Box<str> = s.into();
    self.map.insert(boxed.clone(), id);
    self.strings.push(boxed);
    Symbol(id)
  }

  fn resolve(&self, sym: Symbol) -> Box<str> { self.strings[sym.0 as usize].clone() }
}

/// Intern a string, returning a [`Symbol`] that compares equal to any other
/// interning of the same text.
#[must_use] pub fn intern(s: &str) -> Symbol {
  INTERNER.with(|i| i.borrow_mut().intern(s))
}

impl Symbol {
  /// Recover the original text. Allocates; only meant for diagnostics and
  /// ABI/signature emission, never for hot-path comparisons.
  #[must_use] pub fn as_str(self) -> Box<str> {
    INTERNER.with(|i| i.borrow().resolve(self))
  }
}

impl std::fmt::Display for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl From<&str> for Symbol {
  fn from(s: &str) -> Self { intern(s) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_text_interns_equal() {
    assert_eq!(intern("foo"), intern("foo"));
    assert_ne!(intern("foo"), intern("bar"));
  }

  #[test]
  fn round_trips_text() {
    let s = intern("total_supply");
    assert_eq!(&*s.as_str(), "total_supply");
  }
}
