//! The module reader (component C): partitions a module's top-level items
//! into persistent storage field declarations and function definitions.

use hashbrown::HashMap;
use log::debug;

use crate::error::{Error, Result};
use crate::symbol::Symbol;
use crate::types::ast::{self, Item};
use crate::types::ty::{self, Location, Type};

/// One persistent storage field: its sequential slot index and declared
/// type. Slots are assigned 0, 1, 2, ... in declaration order; nested
/// layout within a field (struct members, list elements) is addressed by
/// hashing from this slot, not by consuming additional top-level slots.
#[derive(Clone, Debug, PartialEq)]
pub struct Global {
  pub name: Symbol,
  pub slot: u32,
  pub typ: Type,
}

/// The module, partitioned.
#[derive(Clone, Debug, Default)]
pub struct ModuleItems {
  pub globals: Vec<Global>,
  pub functions: Vec<ast::FunctionDef>,
}

/// Read the top-level items of a module. Fields must all precede functions;
/// no field may be redeclared; any item that is neither an annotated
/// assignment nor a function definition is a structure error.
pub fn read_module(module: &ast::Module) -> Result<ModuleItems> {
  let mut globals = Vec::new();
  let mut functions: Vec<ast::FunctionDef> = Vec::new();
  let mut seen: HashMap<Symbol, ()> = HashMap::new();
  let mut next_slot = 0u32;

  for item in module {
    match item {
      Item::AnnAssign { target, annotation, pos } => {
        if !functions.is_empty() {
          return Err(Error::structure(*pos, "storage field declarations must precede all functions"));
        }
        if !ty::is_varname_valid(&target.as_str()) {
          return Err(Error::var_decl(*pos, format!("`{}` is a reserved name", target.as_str())));
        }
        if seen.insert(*target, ()).is_some() {
          return Err(Error::var_decl(*pos, format!("storage field `{}` redeclared", target.as_str())));
        }
        let typ = ty::parse_type(annotation, Location::Storage)?;
        debug!(target: "contractc::module", "storage field `{}` assigned slot {next_slot}", target.as_str());
        globals.push(Global { name: *target, slot: next_slot, typ });
        next_slot += 1;
      }
      Item::FunctionDef(f) => {
        debug!(target: "contractc::module", "function `{}` read in source position", f.name.as_str());
        functions.push(f.clone());
      }
    }
  }
  Ok(ModuleItems { globals, functions })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::span::Pos;
  use crate::symbol::intern;
  use crate::types::ast::{Expr, FunctionDef};

  fn num_ann(pos: Pos) -> Expr { Expr::Name(intern("num"), pos) }

  #[test]
  fn assigns_sequential_slots() {
    let pos = Pos::default();
    let module = vec![
      Item::AnnAssign { target: intern("a"), annotation: num_ann(pos), pos },
      Item::AnnAssign { target: intern("b"), annotation: num_ann(pos), pos },
    ];
    let items = read_module(&module).unwrap();
    assert_eq!(items.globals[0].slot, 0);
    assert_eq!(items.globals[1].slot, 1);
  }

  #[test]
  fn rejects_field_after_function() {
    let pos = Pos::default();
    let module = vec![
      Item::FunctionDef(FunctionDef { name: intern("f"), args: vec![], returns: None, body: vec![], pos }),
      Item::AnnAssign { target: intern("a"), annotation: num_ann(pos), pos },
    ];
    assert!(read_module(&module).is_err());
  }

  #[test]
  fn rejects_duplicate_field() {
    let pos = Pos::default();
    let module = vec![
      Item::AnnAssign { target: intern("a"), annotation: num_ann(pos), pos },
      Item::AnnAssign { target: intern("a"), annotation: num_ann(pos), pos },
    ];
    assert!(read_module(&module).is_err());
  }
}
