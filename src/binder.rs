//! The function binder (component D): derives a function's parameter
//! layout, return type, constancy flag, canonical signature, and 4-byte
//! selector from its AST declaration.

use hashbrown::HashMap;
use sha3::{Digest, Keccak256};

use crate::error::{Error, Result};
use crate::span::Pos;
use crate::symbol::{intern, Symbol};
use crate::types::ast::{Expr, FunctionDef};
use crate::types::ty::{self, canonicalize_type, Location, Type};

/// The name recognized as the constructor; its parameters are laid out at
/// negative calldata-equivalent offsets (appended after the code) rather
/// than read from calldata (§4.D).
pub const CONSTRUCTOR_NAME: &str = "__init__";

/// One bound parameter: declared name, resolved calldata/code offset, and
/// type.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundArg {
  pub name: Symbol,
  pub offset: i64,
  pub typ: Type,
}

/// The fully bound shape of a function declaration (§4.D).
#[derive(Clone, Debug, PartialEq)]
pub struct BoundFunction {
  pub name: Symbol,
  pub args: Vec<BoundArg>,
  pub output_type: Option<Type>,
  pub is_constant: bool,
  pub signature: String,
  pub selector: u32,
}

impl BoundFunction {
  #[must_use] pub fn is_constructor(&self) -> bool { self.name.as_str().as_ref() == CONSTRUCTOR_NAME }
}

/// Interpret the `high-to-low big-endian first 4 bytes of KECCAK-256`
/// compatibility surface (§6) as a `u32`.
#[must_use] pub fn selector_of(signature: &str) -> u32 {
  let digest = Keccak256::digest(signature.as_bytes());
  u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Bind one function declaration: resolve parameter offsets/types, the
/// return annotation (absent / plain / call-shape with unit and `const`),
/// and compute the canonical signature and selector.
pub fn bind_function(def: &FunctionDef) -> Result<BoundFunction> {
  let is_ctor = def.name.as_str().as_ref() == CONSTRUCTOR_NAME;
  let n = def.args.len();
  let mut args = Vec::with_capacity(n);
  let mut seen: HashMap<Symbol, ()> = HashMap::new();
  for (i, param) in def.args.iter().enumerate() {
    let text = param.name.as_str();
    if !ty::is_varname_valid(&text) {
      return Err(Error::var_decl(param.pos, format!("argument name invalid or reserved: {text}")));
    }
    if seen.insert(param.name, ()).is_some() {
      return Err(Error::var_decl(param.pos, format!("duplicate function argument name: {text}")));
    }
    let typ = ty::parse_type(&param.annotation, Location::None)?;
    let offset: i64 = if is_ctor {
      -32 * (n as i64) + 32 * (i as i64)
    } else {
      4 + 32 * (i as i64)
    };
    args.push(BoundArg { name: param.name, offset, typ });
  }

  let (output_type, is_constant) = bind_return(def.returns.as_ref(), def.pos)?;

  let param_types: Result<Vec<String>> = args.iter()
    .map(|a| canonicalize_type(&a.typ, def.pos))
    .collect();
  let signature = format!("{}({})", def.name.as_str(), param_types?.join(","));
  let selector = selector_of(&signature);

  Ok(BoundFunction { name: def.name, args, output_type, is_constant, signature, selector })
}

/// Resolve a function's return annotation (§4.D): absent, a plain type
/// expression, or a call-shape annotation carrying at most one unit
/// description and at most one `const` marker.
fn bind_return(returns: Option<&Expr>, pos: Pos) -> Result<(Option<Type>, bool)> {
  let Some(returns) = returns else { return Ok((None, false)) };
  match returns {
    Expr::Call { func, args, pos: call_pos } => {
      let const_sym = intern("const");
      let mut consts = Vec::new();
      let mut units = Vec::new();
      for arg in args {
        if matches!(arg, Expr::Name(s, _) if *s == const_sym) {
          consts.push(arg);
        } else {
          units.push(arg.clone());
        }
      }
      if consts.len() > 1 || units.len() > 1 {
        return Err(Error::invalid_type(*call_pos, "expecting at most one unit declaration and const keyword"));
      }
      let is_const = consts.len() == 1;
      let typ_expr = if units.is_empty() {
        (**func).clone()
      } else {
        Expr::Call { func: func.clone(), args: units, pos: *call_pos }
      };
      let typ = ty::parse_type(&typ_expr, Location::None)?;
      Ok((Some(typ), is_const))
    }
    other => Ok((Some(ty::parse_type(other, Location::None)?), false)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::span::Pos;
  use crate::symbol::intern;
  use crate::types::ast::Param;

  fn num_ann() -> Expr { Expr::Name(intern("num"), Pos::default()) }
  fn address_ann() -> Expr { Expr::Name(intern("address"), Pos::default()) }

  #[test]
  fn regular_function_offsets_start_at_four() {
    let def = FunctionDef {
      name: intern("transfer"),
      args: vec![
        Param { name: intern("to"), annotation: address_ann(), pos: Pos::default() },
        Param { name: intern("amount"), annotation: num_ann(), pos: Pos::default() },
      ],
      returns: None,
      body: vec![],
      pos: Pos::default(),
    };
    let bound = bind_function(&def).unwrap();
    assert_eq!(bound.args[0].offset, 4);
    assert_eq!(bound.args[1].offset, 36);
    assert_eq!(bound.signature, "transfer(address,int128)");
  }

  #[test]
  fn constructor_offsets_are_negative() {
    let def = FunctionDef {
      name: intern(CONSTRUCTOR_NAME),
      args: vec![
        Param { name: intern("a"), annotation: num_ann(), pos: Pos::default() },
        Param { name: intern("b"), annotation: address_ann(), pos: Pos::default() },
      ],
      returns: None,
      body: vec![],
      pos: Pos::default(),
    };
    let bound = bind_function(&def).unwrap();
    assert_eq!(bound.args[0].offset, -64);
    assert_eq!(bound.args[1].offset, -32);
    assert!(bound.is_constructor());
  }

  #[test]
  fn return_call_shape_extracts_const_and_unit() {
    let returns = Expr::Call {
      func: Box::new(Expr::Name(intern("num"), Pos::default())),
      args: vec![Expr::Name(intern("const"), Pos::default())],
      pos: Pos::default(),
    };
    let (typ, is_const) = bind_return(Some(&returns), Pos::default()).unwrap();
    assert!(is_const);
    assert_eq!(typ, Some(Type::num()));
  }

  #[test]
  fn rejects_duplicate_argument_names() {
    let def = FunctionDef {
      name: intern("f"),
      args: vec![
        Param { name: intern("x"), annotation: num_ann(), pos: Pos::default() },
        Param { name: intern("x"), annotation: num_ann(), pos: Pos::default() },
      ],
      returns: None,
      body: vec![],
      pos: Pos::default(),
    };
    assert!(bind_function(&def).is_err());
  }

  #[test]
  fn selector_is_keccak_prefix() {
    // Pinned per S1: KECCAK256("transfer(address,int128)")[:4], big-endian.
    let sel = selector_of("transfer(address,int128)");
    let digest = Keccak256::digest(b"transfer(address,int128)");
    let expected = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    assert_eq!(sel, expected);
  }
}
