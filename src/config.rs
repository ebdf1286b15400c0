//! Translator-wide constants, bundled so that the bit-exact values pinned by
//! the ABI/prelude compatibility surface live in one place instead of being
//! scattered as magic numbers through the expression and statement
//! translators. This is not a file- or env-loaded configuration layer —
//! there is no CLI at this layer — it is an in-process options struct an
//! embedder can override for testing a future VM revision.

/// Byte offset where the first user-declared local variable is allocated.
/// Offsets below this are reserved for the prelude's numeric-bounds
/// constants and the calldata-selector slot.
pub const RESERVED_MEMORY: u32 = 256;

/// `10^DECIMAL_SCALE_EXP` is the fixed-point scale factor for `decimal`.
pub const DECIMAL_SCALE_EXP: u32 = 10;

/// Byte offset of slot 28, where the low 4 bytes of the method selector
/// land after the prelude copies the first word of calldata.
pub const SELECTOR_SLOT: u32 = 28;

/// Prelude slot holding the address-space bound `2^160`, used to clamp
/// `address`-typed argument loads.
pub const ADDR_BOUND_SLOT: u32 = 32;
/// Prelude slot holding `MAXNUM = 2^128 - 1`.
pub const MAXNUM_SLOT: u32 = 64;
/// Prelude slot holding `MINNUM = -(2^128 - 1)`.
pub const MINNUM_SLOT: u32 = 96;
/// Prelude slot holding `MAXDECIMAL = (2^128 - 1) * 10^10`.
pub const MAXDECIMAL_SLOT: u32 = 128;
/// Prelude slot holding `MINDECIMAL = -(2^128 - 1) * 10^10`.
pub const MINDECIMAL_SLOT: u32 = 160;

/// Scratch memory word used transiently when unpacking a constructor's
/// code-copied negative-offset argument (mirrors the original compiler's
/// use of byte offset 192 as a one-word scratch slot).
pub const CODE_ARG_SCRATCH: u32 = 192;

/// Calldata offset of the first non-selector argument to a regular
/// (non-constructor) function.
pub const CALLDATA_ARGS_START: u32 = 4;

/// Width in bytes of one VM word / stack slot.
pub const WORD_SIZE: u32 = 32;

/// Translator-wide options. `Copy` and cheap to pass by value; every public
/// entry point either takes one explicitly or defaults to
/// [`Options::default`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
  /// See [`RESERVED_MEMORY`].
  pub reserved_memory: u32,
  /// See [`DECIMAL_SCALE_EXP`].
  pub decimal_scale_exp: u32,
  /// Maximum AST nesting depth the expression translator will recurse
  /// through before raising a [`crate::error::Error::Structure`] instead of
  /// risking a stack overflow. Not part of the wire-level contract, just a
  /// defense-in-depth knob (see SYSTEM OVERVIEW §5).
  pub max_expr_depth: u32,
  /// Base byte offset of the five prelude numeric-bounds slots; the slots
  /// themselves sit at `prelude_base`, `+32`, `+64`, `+96`, `+128` (see
  /// [`ADDR_BOUND_SLOT`] through [`MINDECIMAL_SLOT`] for the default
  /// layout this corresponds to).
  pub prelude_base: u32,
}

impl Options {
  /// `10^decimal_scale_exp`, the decimal fixed-point scale factor, as an
  /// `i128` (it is used in numeric contexts far larger than `u64`).
  #[must_use] pub fn decimal_scale(self) -> i128 {
    10i128.pow(self.decimal_scale_exp)
  }

  #[must_use] pub fn addr_bound_slot(self) -> u32 { self.prelude_base }
  #[must_use] pub fn maxnum_slot(self) -> u32 { self.prelude_base + WORD_SIZE }
  #[must_use] pub fn minnum_slot(self) -> u32 { self.prelude_base + 2 * WORD_SIZE }
  #[must_use] pub fn maxdecimal_slot(self) -> u32 { self.prelude_base + 3 * WORD_SIZE }
  #[must_use] pub fn mindecimal_slot(self) -> u32 { self.prelude_base + 4 * WORD_SIZE }
}

impl Default for Options {
  fn default() -> Self {
    Self {
      reserved_memory: RESERVED_MEMORY,
      decimal_scale_exp: DECIMAL_SCALE_EXP,
      max_expr_depth: 256,
      prelude_base: ADDR_BOUND_SLOT,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_slots_match_spec_layout() {
    let o = Options::default();
    assert_eq!(o.addr_bound_slot(), 32);
    assert_eq!(o.maxnum_slot(), 64);
    assert_eq!(o.minnum_slot(), 96);
    assert_eq!(o.maxdecimal_slot(), 128);
    assert_eq!(o.mindecimal_slot(), 160);
  }
}
