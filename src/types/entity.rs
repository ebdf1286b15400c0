//! The opcode registry: fixed tables describing the arity and valency of
//! every VM opcode and pseudo-opcode the LIR node constructor (see
//! [`crate::types::lir`]) is allowed to reference. Real opcode metadata
//! (hex encoding, gas cost) is a lowering-stage concern and is out of scope
//! here; we still carry placeholder fields for them so the table's shape
//! matches what a real lowering stage would need, per the external
//! interface in the specification.

use crate::symbol::Symbol;

macro_rules! make_ops {
  {$($(#[$attr0:meta])* enum $name:ident {
    $($(#[$attr:meta])* $x:ident $mnemonic:literal ($arity:literal, $valency:literal),)*
  })*} => {
    $(
      $(#[$attr0])*
      #[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
      pub enum $name { $($(#[$attr])* $x),* }

      impl $name {
        /// Evaluate a function on all elements of the type, with their mnemonics and specs.
        pub fn scan(mut f: impl FnMut(Self, &'static str, OpSpec)) {
          $(f($name::$x, $mnemonic, OpSpec { arity: $arity, valency: $valency });)*
        }

        /// Look up a variant by its uppercase mnemonic.
        #[must_use] pub fn from_str(s: &str) -> Option<Self> {
          match s {
            $($mnemonic => Some(Self::$x),)*
            _ => None,
          }
        }

        /// The canonical uppercase mnemonic for this opcode.
        #[must_use] pub fn mnemonic(self) -> &'static str {
          match self { $(Self::$x => $mnemonic,)* }
        }

        /// The fixed arity/valency record for this opcode.
        #[must_use] pub fn spec(self) -> OpSpec {
          match self { $(Self::$x => OpSpec { arity: $arity, valency: $valency },)* }
        }
      }
    )*
  }
}

/// The fixed metadata this crate needs about an opcode: how many valency-1
/// arguments it takes, and whether it leaves a value on the stack.
/// `arity == VARIADIC` marks forms validated structurally instead (`seq`,
/// `multi`; see §3 invariants 5-6 of the specification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSpec {
  pub arity: u8,
  pub valency: u8,
}

/// Sentinel arity for variadic pseudo-opcodes (`seq`, `multi`), which are
/// validated structurally rather than by a fixed argument count.
pub const VARIADIC: u8 = u8::MAX;

make_ops! {
  /// Real VM opcodes this crate's LIR may reference. This is a small subset
  /// of the full registry (the complete table, including hex encodings and
  /// gas costs, belongs to the lowering stage) — just enough for the
  /// translator to validate the nodes it builds.
  enum Opcode {
    Add "ADD" (2, 1),
    Sub "SUB" (2, 1),
    Mul "MUL" (2, 1),
    SDiv "SDIV" (2, 1),
    SMod "SMOD" (2, 1),
    Eq "EQ" (2, 1),
    Ne "NE" (2, 1),
    Lt "LT" (2, 1),
    Sgt "SGT" (2, 1),
    Sge "SGE" (2, 1),
    Sle "SLE" (2, 1),
    Slt "SLT" (2, 1),
    And "AND" (2, 1),
    Or "OR" (2, 1),
    Not "NOT" (1, 1),
    IsZero "ISZERO" (1, 1),
    MLoad "MLOAD" (1, 1),
    MStore "MSTORE" (2, 0),
    SLoad "SLOAD" (1, 1),
    SStore "SSTORE" (2, 0),
    CallDataLoad "CALLDATALOAD" (1, 1),
    CallDataCopy "CALLDATACOPY" (3, 0),
    CodeCopy "CODECOPY" (3, 0),
    CodeSize "CODESIZE" (0, 1),
    Address "ADDRESS" (0, 1),
    Balance "BALANCE" (1, 1),
    Caller "CALLER" (0, 1),
    CallValue "CALLVALUE" (0, 1),
    Difficulty "DIFFICULTY" (0, 1),
    Timestamp "TIMESTAMP" (0, 1),
    Coinbase "COINBASE" (0, 1),
    Number "NUMBER" (0, 1),
    Origin "ORIGIN" (0, 1),
    Call "CALL" (7, 1),
    Pop "POP" (1, 0),
    SelfDestruct "SELFDESTRUCT" (1, 0),
    Return "RETURN" (2, 0),
  }

  /// Synthetic pseudo-opcodes. `seq` and `multi` are listed with
  /// [`VARIADIC`] arity and are validated by the structural rules in §3 of
  /// the specification rather than a fixed argument count; the control
  /// forms (`if`, `with`, `repeat`, `lll`) have their own bespoke structural
  /// checks too and are included here only so the registry lookup always
  /// succeeds for every symbolic value the LIR can carry.
  enum PseudoOp {
    Clamp "CLAMP" (3, 1),
    UClampLt "UCLAMPLT" (2, 1),
    ClampNonzero "CLAMP_NONZERO" (1, 1),
    Sha3_32 "SHA3_32" (1, 1),
    Ceil32 "CEIL32" (1, 1),
    Assert "ASSERT" (1, 0),
    Lll "LLL" (2, 1),
    If "IF" (VARIADIC, 0),
    With "WITH" (3, 0),
    Repeat "REPEAT" (4, 0),
    Seq "SEQ" (VARIADIC, 0),
    Multi "MULTI" (VARIADIC, 0),
    Pass "PASS" (0, 0),
    Break "BREAK" (0, 0),
  }
}

/// Either a real opcode or a pseudo-opcode/control form, keyed by the
/// uppercased mnemonic the way the source language's reserved-word check
/// does (§4.A `is_varname_valid`: opcode mnemonics are reserved names).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind { Real(Opcode), Pseudo(PseudoOp) }

/// Abstracts over the opcode/pseudo-opcode registries so the LIR node
/// constructor (and tests) can be decoupled from the specific static table;
/// a test can substitute a fixture with a subset of opcodes.
pub trait OpTable {
  /// Look up a symbolic LIR node value by its mnemonic (case-insensitive).
  fn lookup(&self, mnemonic: &str) -> Option<OpKind>;
}

/// The production opcode table: the two fixed registries above.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticOpTable;

impl OpTable for StaticOpTable {
  fn lookup(&self, mnemonic: &str) -> Option<OpKind> {
    let upper = mnemonic.to_ascii_uppercase();
    if let Some(op) = Opcode::from_str(&upper) { return Some(OpKind::Real(op)) }
    PseudoOp::from_str(&upper).map(OpKind::Pseudo)
  }
}

/// A name is reserved (and therefore rejected by `is_varname_valid`, §4.A)
/// if it collides with an opcode or pseudo-opcode mnemonic, or begins with
/// an underscore (the convention used for compiler-generated `with`
/// binders like `_L`, `_R`, `_addr`; see §9's design note on symbolic LIR
/// names).
#[must_use] pub fn is_reserved(name: &str) -> bool {
  if name.starts_with('_') { return true }
  let upper = name.to_ascii_uppercase();
  Opcode::from_str(&upper).is_some() || PseudoOp::from_str(&upper).is_some() || is_keyword(&upper)
}

/// Source-language keywords that are reserved independent of the opcode
/// tables (builtin namespaces and literal constants).
fn is_keyword(upper: &str) -> bool {
  matches!(upper, "SELF" | "TRUE" | "FALSE" | "NULL" | "MSG" | "BLOCK" | "TX" | "RANGE"
    | "FLOOR" | "DECIMAL" | "AS_NUMBER" | "SEND" | "SUICIDE" | "CONST")
}

/// Intern-free convenience used by [`is_reserved`] callers that already
/// have a [`Symbol`]; kept here so the reserved-word check has a single
/// home regardless of which representation the caller has on hand.
#[must_use] pub fn is_reserved_symbol(sym: Symbol) -> bool {
  is_reserved(&sym.as_str())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn looks_up_real_and_pseudo_ops() {
    let t = StaticOpTable;
    assert_eq!(t.lookup("add"), Some(OpKind::Real(Opcode::Add)));
    assert_eq!(t.lookup("SSTORE"), Some(OpKind::Real(Opcode::SStore)));
    assert_eq!(t.lookup("uclamplt"), Some(OpKind::Pseudo(PseudoOp::UClampLt)));
    assert_eq!(t.lookup("not_an_op"), None);
  }

  #[test]
  fn arities_match_spec() {
    assert_eq!(Opcode::Add.spec(), OpSpec { arity: 2, valency: 1 });
    assert_eq!(Opcode::MStore.spec(), OpSpec { arity: 2, valency: 0 });
    assert_eq!(PseudoOp::Clamp.spec(), OpSpec { arity: 3, valency: 1 });
  }

  #[test]
  fn reserved_names() {
    assert!(is_reserved("add"));
    assert!(is_reserved("_L"));
    assert!(is_reserved("self"));
    assert!(!is_reserved("balance_of"));
  }
}
