//! The ABI descriptor shape (component I). Built once per function from the
//! already-bound parameter/return information (see [`crate::binder`]); this
//! module only knows how to turn that information into the externally
//! visible descriptor, not how to derive it.

use crate::error::Result;
use crate::span::Pos;
use crate::symbol::Symbol;
use crate::types::ty::{canonicalize_type, Type};

/// One named, canonically-typed parameter or return value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiParam {
  pub name: String,
  pub ty: String,
}

/// `"constructor"` for `__init__`, `"function"` for everything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiKind { Constructor, Function }

/// The externally visible descriptor for one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiFunction {
  pub signature: String,
  pub inputs: Vec<AbiParam>,
  pub outputs: Vec<AbiParam>,
  pub constant: bool,
  pub kind: AbiKind,
}

/// Build a descriptor from a function's already-resolved name, parameter
/// list, optional return type, constancy flag, and constructor-ness. The
/// single output field (when present) is always named `"out"` (§4.I).
pub fn describe(
  signature: String,
  params: &[(Symbol, Type)],
  output: Option<&Type>,
  constant: bool,
  is_constructor: bool,
  pos: Pos,
) -> Result<AbiFunction> {
  let inputs = params.iter()
    .map(|(name, ty)| Ok(AbiParam { name: name.to_string(), ty: canonicalize_type(ty, pos)? }))
    .collect::<Result<Vec<_>>>()?;
  let outputs = match output {
    Some(ty) => vec![AbiParam { name: "out".to_string(), ty: canonicalize_type(ty, pos)? }],
    None => Vec::new(),
  };
  Ok(AbiFunction {
    signature,
    inputs,
    outputs,
    constant,
    kind: if is_constructor { AbiKind::Constructor } else { AbiKind::Function },
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::intern;

  #[test]
  fn describes_function_with_output() {
    let params = vec![(intern("to"), Type::address()), (intern("amount"), Type::num())];
    let abi = describe(
      "transfer(address,int128)".to_string(),
      &params,
      Some(&Type::bool_()),
      false,
      false,
      Pos::default(),
    ).unwrap();
    assert_eq!(abi.inputs.len(), 2);
    assert_eq!(abi.outputs, vec![AbiParam { name: "out".to_string(), ty: "bool".to_string() }]);
    assert_eq!(abi.kind, AbiKind::Function);
  }

  #[test]
  fn constructor_has_no_outputs_by_convention() {
    let abi = describe("__init__()".to_string(), &[], None, false, true, Pos::default()).unwrap();
    assert!(abi.outputs.is_empty());
    assert_eq!(abi.kind, AbiKind::Constructor);
  }
}
