//! Arbitrary-precision constants the expression translator and the
//! top-level prelude need: the compile-time literal bound and the runtime
//! numeric-bounds constants written into the fixed memory prelude (§3).
//! Several of these (`2^160`, `MAXDECIMAL`) do not fit any machine integer
//! type, hence `BigInt` throughout.

use num::BigInt;

/// `2^exp`, computed by repeated multiplication to avoid depending on a
/// particular `pow` API surface of the `num` facade crate.
#[must_use] pub fn pow2(exp: u32) -> BigInt {
  let mut r = BigInt::from(1u8);
  let two = BigInt::from(2u8);
  for _ in 0..exp { r *= &two; }
  r
}

/// `10^exp`.
#[must_use] pub fn pow10(exp: u32) -> BigInt {
  let mut r = BigInt::from(1u8);
  let ten = BigInt::from(10u8);
  for _ in 0..exp { r *= &ten; }
  r
}

/// The inclusive bound on an integer or (pre-scaling) decimal literal:
/// `2^127 - 1` (§4.F).
#[must_use] pub fn literal_bound() -> BigInt { pow2(127) - BigInt::from(1u8) }

/// `2^160`, the address-space bound stored at [`crate::config::ADDR_BOUND_SLOT`].
#[must_use] pub fn addr_bound() -> BigInt { pow2(160) }

/// `MAXNUM = 2^128 - 1`, stored at [`crate::config::MAXNUM_SLOT`].
#[must_use] pub fn maxnum() -> BigInt { pow2(128) - BigInt::from(1u8) }

/// `MINNUM = -(2^128 - 1)`, stored at [`crate::config::MINNUM_SLOT`].
#[must_use] pub fn minnum() -> BigInt { -maxnum() }

/// `MAXDECIMAL = (2^128 - 1) * 10^decimal_scale_exp`, stored at
/// [`crate::config::MAXDECIMAL_SLOT`].
#[must_use] pub fn maxdecimal(decimal_scale_exp: u32) -> BigInt { maxnum() * pow10(decimal_scale_exp) }

/// `MINDECIMAL = -(2^128 - 1) * 10^decimal_scale_exp`, stored at
/// [`crate::config::MINDECIMAL_SLOT`].
#[must_use] pub fn mindecimal(decimal_scale_exp: u32) -> BigInt { -maxdecimal(decimal_scale_exp) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pow2_matches_known_values() {
    assert_eq!(pow2(10), BigInt::from(1024));
    assert_eq!(pow2(0), BigInt::from(1));
  }

  #[test]
  fn maxnum_minnum_are_negatives() {
    assert_eq!(maxnum(), -minnum());
  }

  #[test]
  fn maxdecimal_scales_maxnum() {
    assert_eq!(maxdecimal(10), maxnum() * pow10(10));
  }
}
