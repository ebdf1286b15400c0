//! The translation context (component E): the per-function symbol tables
//! (`args`, `vars`, `globals`, `forvars`) and the memory bump allocator,
//! threaded by mutable reference through the statement walker and by
//! shared reference through expression evaluation.

use hashbrown::HashMap;
use log::trace;

use crate::config::{Options, WORD_SIZE};
use crate::error::{Error, Result};
use crate::module::Global;
use crate::span::Pos;
use crate::symbol::Symbol;
use crate::types::ty::{self, Type};

/// A function argument's binding: its calldata offset (negative for the
/// constructor, which reads arguments appended after the code rather than
/// from calldata) and declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgSlot {
  pub offset: i64,
  pub typ: Type,
}

/// A local variable's binding: its memory offset and declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct VarSlot {
  pub offset: u32,
  pub typ: Type,
}

/// Per-function translation state (§4.E). One `Context` is built per
/// function and never shared across functions; translating several
/// functions (or modules) concurrently is safe as long as each uses its own
/// instance (§5).
#[derive(Debug)]
pub struct Context<'g> {
  pub args: HashMap<Symbol, ArgSlot>,
  pub vars: HashMap<Symbol, VarSlot>,
  pub globals: &'g HashMap<Symbol, Global>,
  /// Loop-index names currently live (§3 symbol tables); a `for` over an
  /// already-live name reuses its memory slot instead of allocating a new
  /// one (mirrors the original compiler's `context.forvars`).
  pub forvars: HashMap<Symbol, ()>,
  pub return_type: Option<Type>,
  pub is_constant: bool,
  next_mem: u32,
  opts: Options,
  /// The function under translation, purely for `log` correlation (§4.K).
  func_name: Symbol,
}

impl<'g> Context<'g> {
  #[must_use] pub fn new(
    args: HashMap<Symbol, ArgSlot>,
    globals: &'g HashMap<Symbol, Global>,
    return_type: Option<Type>,
    is_constant: bool,
    func_name: Symbol,
    opts: Options,
  ) -> Self {
    Self {
      args, globals, return_type, is_constant, func_name, opts,
      vars: HashMap::new(),
      forvars: HashMap::new(),
      next_mem: opts.reserved_memory,
    }
  }

  /// The next free memory offset (§4.E `get_next_mem`); always
  /// `>= Options::reserved_memory`.
  #[must_use] pub fn get_next_mem(&self) -> u32 { self.next_mem }

  /// Allocate a new local variable: validates the name against reserved
  /// words and against `args`/`vars`/`globals`, bumps the memory cursor by
  /// `32 * size_of(typ)`, and records the binding.
  pub fn new_variable(&mut self, name: Symbol, typ: Type, pos: Pos) -> Result<u32> {
    let text = name.as_str();
    if !ty::is_varname_valid(&text) {
      return Err(Error::var_decl(pos, format!("variable name invalid or reserved: {text}")));
    }
    if self.vars.contains_key(&name) || self.args.contains_key(&name) || self.globals.contains_key(&name) {
      return Err(Error::var_decl(pos, format!("duplicate variable name: {text}")));
    }
    let size = ty::get_size_of_type(&typ, pos)?;
    let offset = self.next_mem;
    self.next_mem = self.next_mem.saturating_add(WORD_SIZE.saturating_mul(size));
    trace!(target: "contractc::context", "{}: variable `{text}` allocated at memory offset {offset}", self.func_name);
    self.vars.insert(name, VarSlot { offset, typ });
    Ok(offset)
  }

  #[must_use] pub fn options(&self) -> Options { self.opts }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::intern;

  fn empty_globals() -> HashMap<Symbol, Global> { HashMap::new() }

  #[test]
  fn allocates_sequentially_by_size() {
    let globals = empty_globals();
    let mut ctx = Context::new(HashMap::new(), &globals, None, false, intern("f"), Options::default());
    let a = ctx.new_variable(intern("a"), Type::num(), Pos::default()).unwrap();
    let b = ctx.new_variable(intern("b"), Type::List(std::rc::Rc::new(Type::num()), 3), Pos::default()).unwrap();
    let c = ctx.new_variable(intern("c"), Type::num(), Pos::default()).unwrap();
    assert_eq!(a, 256);
    assert_eq!(b, 288);
    assert_eq!(c, 288 + 3 * 32);
    assert_eq!(ctx.get_next_mem(), c + 32);
  }

  #[test]
  fn rejects_duplicate_and_reserved_names() {
    let globals = empty_globals();
    let mut ctx = Context::new(HashMap::new(), &globals, None, false, intern("f"), Options::default());
    ctx.new_variable(intern("a"), Type::num(), Pos::default()).unwrap();
    assert!(ctx.new_variable(intern("a"), Type::num(), Pos::default()).is_err());
    assert!(ctx.new_variable(intern("_tmp"), Type::num(), Pos::default()).is_err());
  }
}
