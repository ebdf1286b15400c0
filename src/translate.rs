//! The top-level assembler (component J, §4.J): turns a whole module into
//! one LIR tree plus its ABI descriptor list. Everything below this module
//! is pure per-function translation; this is the only place that knows how
//! functions are stitched into a deployable whole.
//!
//! The four assembly shapes (no functions, constructor only, functions
//! only, both) and the prelude's contents are pinned to what the original
//! compiler this crate's semantics are drawn from actually emits, not just
//! to the specification's prose description of them — in particular the
//! constructor-only case's trailing terminator. The source text ends that
//! case with a bare, zero-argument `selfdestruct`, but this crate's opcode
//! registry (§4.L) models `SELFDESTRUCT` with its real EVM arity of one
//! (the beneficiary address), since a lowering stage downstream has no
//! zero-arg form to lower. We supply `ADDRESS` (the contract's own address)
//! as that argument rather than invent a second, assembly-only pseudo-op
//! for a single call site; see DESIGN.md for the full writeup of this
//! decision.

use hashbrown::HashMap;
use log::{debug, info};

use crate::binder::{bind_function, BoundFunction};
use crate::config::Options;
use crate::context::{ArgSlot, Context};
use crate::error::{Error, Result};
use crate::module::{read_module, Global};
use crate::numeric;
use crate::span::Pos;
use crate::stmt::translate_body;
use crate::symbol::Symbol;
use crate::types::abi::{describe, AbiFunction};
use crate::types::ast::Module;
use crate::types::entity::OpTable;
use crate::types::lir::Node;

/// The result of assembling a whole module: the single LIR tree a lowering
/// stage would encode to bytecode, and the ABI descriptor for every
/// function (constructor included, per §4.I's convention).
#[derive(Debug)]
pub struct TranslatedModule {
  pub code: Node,
  pub abi: Vec<AbiFunction>,
}

/// Translate a whole module (§4.J): partition it, bind every function,
/// detect duplicate names before translating any body, translate each
/// function's code, and assemble the result per the module's shape.
pub fn translate_module(module: &Module, table: &dyn OpTable, opts: Options) -> Result<TranslatedModule> {
  let items = read_module(module)?;

  // Top-level duplicate-function-name detection runs before any function is
  // translated and preempts per-function errors (§7).
  let mut seen_names: HashMap<Symbol, ()> = HashMap::new();
  for f in &items.functions {
    if seen_names.insert(f.name, ()).is_some() {
      return Err(Error::var_decl(f.pos, format!("duplicate function name: `{}`", f.name.as_str())));
    }
  }

  let globals: HashMap<Symbol, Global> = items.globals.iter().map(|g| (g.name, g.clone())).collect();

  let mut bound = Vec::with_capacity(items.functions.len());
  for f in &items.functions {
    bound.push((f, bind_function(f)?));
  }

  let ctor: Option<(&crate::types::ast::FunctionDef, &BoundFunction)> =
    bound.iter().find(|(_, b)| b.is_constructor()).map(|(d, b)| (*d, b));
  let others: Vec<(&crate::types::ast::FunctionDef, &BoundFunction)> =
    bound.iter().filter(|(_, b)| !b.is_constructor()).map(|(d, b)| (*d, b)).collect();

  let mut abi = Vec::with_capacity(bound.len());
  for (_, b) in &bound {
    abi.push(function_abi(b, Pos::default())?);
  }

  let code = match (ctor, others.is_empty()) {
    (None, true) => Node::pass(),
    (None, false) => {
      let dispatch = build_dispatch(&others, &globals, table, opts)?;
      deployer(dispatch, table, opts)?
    }
    (Some((def, b)), true) => {
      let ctor_body = translate_function_body(def, b, &globals, table, opts)?;
      Node::seq(vec![prelude(table, opts)?, ctor_body, terminator(table, opts, def.pos)?])
    }
    (Some((def, b)), false) => {
      let ctor_body = translate_function_body(def, b, &globals, table, opts)?;
      let dispatch = build_dispatch(&others, &globals, table, opts)?;
      Node::seq(vec![prelude(table, opts)?, ctor_body, deployer(dispatch, table, opts)?])
    }
  };

  info!(target: "contractc::translate", "assembled module: {} function(s), {} storage field(s)", bound.len(), globals.len());
  Ok(TranslatedModule { code, abi })
}

/// The fixed prelude (§3): copy the 4-byte selector out of calldata into
/// its scratch slot, then seed the five numeric-bounds slots every argument
/// clamp in the expression translator reads from (§4.C/§4.F).
fn prelude(table: &dyn OpTable, opts: Options) -> Result<Node> {
  let pos = Pos::default();
  let selector = Node::op("MSTORE", vec![
    Node::int(i64::from(crate::config::SELECTOR_SLOT)),
    Node::op("CALLDATALOAD", vec![Node::int(0i64)], table, pos)?,
  ], table, pos)?;
  let bounds = [
    (opts.addr_bound_slot(), numeric::addr_bound()),
    (opts.maxnum_slot(), numeric::maxnum()),
    (opts.minnum_slot(), numeric::minnum()),
    (opts.maxdecimal_slot(), numeric::maxdecimal(opts.decimal_scale_exp)),
    (opts.mindecimal_slot(), numeric::mindecimal(opts.decimal_scale_exp)),
  ];
  let mut stmts = vec![selector];
  for (slot, value) in bounds {
    stmts.push(Node::op("MSTORE", vec![Node::int(i64::from(slot)), Node::bigint(value)], table, pos)?);
  }
  Ok(Node::seq(stmts))
}

/// `selfdestruct(address())`, the constructor-only case's terminator. See
/// the module doc comment for why this differs in arity from the source
/// text's bare `selfdestruct`.
fn terminator(table: &dyn OpTable, _opts: Options, pos: Pos) -> Result<Node> {
  let addr = Node::op("ADDRESS", vec![], table, pos)?;
  Node::op("SELFDESTRUCT", vec![addr], table, pos)
}

/// Wrap a flat sequence of per-function dispatch arms as the deployed
/// runtime code: `return 0, lll(seq(prelude, arm1, arm2, ...), 0)`. The
/// inner `lll`'s own prelude is a second, independent copy — the dispatch
/// chain runs in the context of a fresh call into already-deployed code,
/// which needs its own selector/bounds setup just like the outer one that
/// runs the constructor.
fn deployer(dispatch: Vec<Node>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let pos = Pos::default();
  let mut body = vec![prelude(table, opts)?];
  body.extend(dispatch);
  let inner = Node::seq(body);
  let lll = Node::op("LLL", vec![inner, Node::int(0i64)], table, pos)?;
  Node::op("RETURN", vec![Node::int(0i64), lll], table, pos)
}

/// Build one `if eq(mload(0), selector) then seq(stmts)` arm per regular
/// function (§4.J). Siblings are independent `if`s in a flat `seq`, not a
/// nested if/elif chain: a call whose selector matches none of them falls
/// through every arm and returns nothing, matching the source semantics.
fn build_dispatch(
  others: &[(&crate::types::ast::FunctionDef, &BoundFunction)],
  globals: &HashMap<Symbol, Global>,
  table: &dyn OpTable,
  opts: Options,
) -> Result<Vec<Node>> {
  let mut arms = Vec::with_capacity(others.len());
  for (def, bound) in others {
    let body = translate_function_body(def, bound, globals, table, opts)?;
    let test = Node::op("EQ", vec![
      Node::op("MLOAD", vec![Node::int(0i64)], table, def.pos)?,
      Node::int(i64::from(bound.selector)),
    ], table, def.pos)?;
    arms.push(Node::if_(test, body, None, def.pos)?);
  }
  Ok(arms)
}

/// Build the per-function [`Context`] from its bound argument layout and
/// translate its body (§4.E/§4.G).
fn translate_function_body(
  def: &crate::types::ast::FunctionDef,
  bound: &BoundFunction,
  globals: &HashMap<Symbol, Global>,
  table: &dyn OpTable,
  opts: Options,
) -> Result<Node> {
  let args: HashMap<Symbol, ArgSlot> = bound.args.iter()
    .map(|a| (a.name, ArgSlot { offset: a.offset, typ: a.typ.clone() }))
    .collect();
  for a in &bound.args {
    if globals.contains_key(&a.name) {
      return Err(Error::var_decl(def.pos, format!(
        "variable name duplicated between function arguments and globals: {}", a.name.as_str()
      )));
    }
  }
  let mut ctx = Context::new(args, globals, bound.output_type.clone(), bound.is_constant, bound.name, opts);
  debug!(target: "contractc::translate", "translating function `{}` (selector {:#010x})", bound.name.as_str(), bound.selector);
  translate_body(&def.body, &mut ctx, table, opts)
}

fn function_abi(bound: &BoundFunction, pos: Pos) -> Result<AbiFunction> {
  let params: Vec<(Symbol, crate::types::ty::Type)> = bound.args.iter().map(|a| (a.name, a.typ.clone())).collect();
  describe(bound.signature.clone(), &params, bound.output_type.as_ref(), bound.is_constant, bound.is_constructor(), pos)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::binder::CONSTRUCTOR_NAME;
  use crate::symbol::intern;
  use crate::types::ast::{Expr, FunctionDef, Item, Param};
  use crate::types::entity::StaticOpTable;

  fn num_ann(pos: Pos) -> Expr { Expr::Name(intern("num"), pos) }

  #[test]
  fn empty_module_is_a_no_op() {
    let table = StaticOpTable;
    let module: Module = vec![];
    let out = translate_module(&module, &table, Options::default()).unwrap();
    assert_eq!(out.code.valency(), 0);
    assert!(out.abi.is_empty());
  }

  #[test]
  fn functions_only_wraps_return_lll() {
    let table = StaticOpTable;
    let pos = Pos::default();
    let f = FunctionDef {
      name: intern("get"),
      args: vec![],
      returns: Some(num_ann(pos)),
      body: vec![crate::types::ast::Stmt::Return {
        value: Some(Expr::Num(crate::types::ast::NumLit::Int(num::BigInt::from(1)), pos)),
        pos,
      }],
      pos,
    };
    let module: Module = vec![Item::FunctionDef(f)];
    let out = translate_module(&module, &table, Options::default()).unwrap();
    assert_eq!(out.code.valency(), 0);
    assert_eq!(out.abi.len(), 1);
  }

  #[test]
  fn constructor_only_ends_in_selfdestruct() {
    let table = StaticOpTable;
    let pos = Pos::default();
    let ctor = FunctionDef {
      name: intern(CONSTRUCTOR_NAME),
      args: vec![],
      returns: None,
      body: vec![crate::types::ast::Stmt::Pass { pos }],
      pos,
    };
    let module: Module = vec![Item::FunctionDef(ctor)];
    let out = translate_module(&module, &table, Options::default()).unwrap();
    // seq(prelude, ctor_body, terminator) -- last child is the terminator,
    // a valency-0 SELFDESTRUCT node.
    assert_eq!(out.code.valency(), 0);
    assert_eq!(out.abi[0].kind, crate::types::abi::AbiKind::Constructor);
  }

  #[test]
  fn both_ctor_and_functions_assembles_seq_of_three() {
    let table = StaticOpTable;
    let pos = Pos::default();
    let ctor = FunctionDef { name: intern(CONSTRUCTOR_NAME), args: vec![], returns: None, body: vec![], pos };
    let getter = FunctionDef {
      name: intern("get"),
      args: vec![],
      returns: Some(num_ann(pos)),
      body: vec![crate::types::ast::Stmt::Return {
        value: Some(Expr::Num(crate::types::ast::NumLit::Int(num::BigInt::from(1)), pos)),
        pos,
      }],
      pos,
    };
    let module: Module = vec![Item::FunctionDef(ctor), Item::FunctionDef(getter)];
    let out = translate_module(&module, &table, Options::default()).unwrap();
    assert_eq!(out.code.args.len(), 3);
    assert_eq!(out.abi.len(), 2);
  }

  #[test]
  fn duplicate_function_names_are_rejected_before_translation() {
    let table = StaticOpTable;
    let pos = Pos::default();
    let f1 = FunctionDef { name: intern("f"), args: vec![], returns: None, body: vec![], pos };
    let f2 = FunctionDef { name: intern("f"), args: vec![Param { name: intern("bad arg"), annotation: num_ann(pos), pos }], returns: None, body: vec![], pos };
    let module: Module = vec![Item::FunctionDef(f1), Item::FunctionDef(f2)];
    // Would also fail argument binding if translated, but duplicate-name
    // detection must fire first.
    let err = translate_module(&module, &table, Options::default()).unwrap_err();
    assert!(matches!(err, Error::VariableDeclaration { .. }));
  }
}
