//! The error taxonomy. Every fallible entry point in this crate returns
//! [`Result<T>`], never panics on malformed *input* (a `debug_assert!` or
//! `unreachable!` deeper in the translator means the type checker above
//! failed to rule something out, which is a bug in this crate, not in the
//! caller's source).

use std::fmt;
use thiserror::Error;
use crate::span::Pos;

/// One of the five error kinds from the translator's error taxonomy.
/// Each carries the position of the offending AST node, when the caller
/// supplied one (fixture ASTs built by hand in tests may omit it).
#[derive(Debug, Error)]
pub enum Error {
  /// Unsupported, malformed, or out-of-range type annotations and literals.
  #[error("{pos}: invalid type: {message}")]
  InvalidType { pos: Pos, message: String },

  /// Incompatible operands, locations, or conversions; unit violations;
  /// structural mismatches in assignment.
  #[error("{pos}: type mismatch: {message}")]
  TypeMismatch { pos: Pos, message: String },

  /// Duplicate, reserved, or undeclared names; invalid identifiers.
  #[error("{pos}: variable declaration error: {message}")]
  VariableDeclaration { pos: Pos, message: String },

  /// Misplaced or unsupported AST shapes; wrong call arities for built-ins.
  #[error("{pos}: structure error: {message}")]
  Structure { pos: Pos, message: String },

  /// Any state-mutating attempt inside a function declared constant.
  #[error("{pos}: constancy violation: {message}")]
  ConstancyViolation { pos: Pos, message: String },
}

impl Error {
  #[must_use] pub fn pos(&self) -> Pos {
    match *self {
      Self::InvalidType { pos, .. }
      | Self::TypeMismatch { pos, .. }
      | Self::VariableDeclaration { pos, .. }
      | Self::Structure { pos, .. }
      | Self::ConstancyViolation { pos, .. } => pos,
    }
  }

  pub(crate) fn invalid_type(pos: Pos, message: impl fmt::Display) -> Self {
    Self::InvalidType { pos, message: message.to_string() }
  }
  pub(crate) fn type_mismatch(pos: Pos, message: impl fmt::Display) -> Self {
    Self::TypeMismatch { pos, message: message.to_string() }
  }
  pub(crate) fn var_decl(pos: Pos, message: impl fmt::Display) -> Self {
    Self::VariableDeclaration { pos, message: message.to_string() }
  }
  pub(crate) fn structure(pos: Pos, message: impl fmt::Display) -> Self {
    Self::Structure { pos, message: message.to_string() }
  }
  pub(crate) fn constancy(pos: Pos, message: impl fmt::Display) -> Self {
    Self::ConstancyViolation { pos, message: message.to_string() }
  }
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
