//! The statement translator (component G): walks a function body, threading
//! the mutable [`Context`] for variable introduction and memory allocation,
//! and lowers each [`Stmt`] to a valency-0 LIR [`Node`].
//!
//! `send`/`selfdestruct`/`suicide` are not ordinary function calls here —
//! the source grammar only recognizes them as the value of a bare
//! expression-statement (`ast.Expr` wrapping `ast.Call`), so
//! [`translate_expr_statement`] is the only place that accepts a `Call`.

use log::trace;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::expr::{translate_expr, translate_value_expr};
use crate::setter::make_setter;
use crate::span::Pos;
use crate::symbol::Symbol;
use crate::types::ast::{BinOpKind, Expr, Stmt};
use crate::types::entity::OpTable;
use crate::types::lir::{Location, Node};
use crate::types::ty::{self, BaseKind, Type};
use crate::config::Options;

/// Translate a function body: each statement in source order, joined by a
/// `seq`.
pub fn translate_body(body: &[Stmt], ctx: &mut Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let mut stmts = Vec::with_capacity(body.len());
  for s in body {
    stmts.push(translate_stmt(s, ctx, table, opts)?);
  }
  Ok(Node::seq(stmts))
}

fn translate_stmt(stmt: &Stmt, ctx: &mut Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  match stmt {
    Stmt::Expr { value, pos } => translate_expr_statement(value, *pos, ctx, table, opts),
    Stmt::Pass { .. } => Ok(Node::pass()),
    Stmt::AnnAssign { target, annotation, pos } => {
      let typ = ty::parse_type(annotation, Location::None)?;
      trace!(target: "contractc::stmt", "declaring local variable `{target}`");
      ctx.new_variable(*target, typ, *pos)?;
      Ok(Node::pass())
    }
    Stmt::Assign { targets, value, pos } => translate_assign(targets, value, *pos, ctx, table, opts),
    Stmt::If { test, body, orelse, pos } => translate_if(test, body, orelse, *pos, ctx, table, opts),
    Stmt::Assert { test, pos } => {
      let cond = translate_value_expr(test, ctx, table, opts)?;
      Node::op("ASSERT", vec![cond], table, *pos)
    }
    Stmt::For { target, iter, body, pos } => translate_for(*target, iter, body, *pos, ctx, table, opts),
    Stmt::AugAssign { target, op, value, pos } => translate_augassign(target, *op, value, *pos, ctx, table, opts),
    Stmt::Break { .. } => Ok(Node::break_()),
    Stmt::Return { value, pos } => translate_return(value.as_ref(), *pos, ctx, table, opts),
  }
}

/// `ast.Expr` only ever wraps the `send`/`selfdestruct`/`suicide` builtins in
/// this grammar; anything else at statement position is a structure error.
fn translate_expr_statement(value: &Expr, pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let Expr::Call { func, args, pos: call_pos } = value else {
    return Err(Error::structure(pos, "function call must be one of: send, selfdestruct"));
  };
  let Expr::Name(name, _) = func.as_ref() else {
    return Err(Error::structure(*call_pos, "function call must be one of: send, selfdestruct"));
  };
  match name.as_str().as_ref() {
    "send" => translate_send(args, *call_pos, ctx, table, opts),
    "suicide" | "selfdestruct" => translate_selfdestruct(args, *call_pos, ctx, table, opts),
    other => Err(Error::structure(*call_pos, format!("function call must be one of: send, selfdestruct (got `{other}`)"))),
  }
}

fn is_address(typ: &Type) -> bool {
  matches!(typ, Type::Base(b) if b.kind == BaseKind::Address)
}

fn is_sendable_number(typ: &Type) -> bool {
  matches!(typ, Type::Base(b) if matches!(b.kind, BaseKind::Num | BaseKind::Num256))
}

fn translate_send(args: &[Expr], pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  if ctx.is_constant {
    return Err(Error::constancy(pos, "cannot send ether inside a constant function"));
  }
  if args.len() != 2 {
    return Err(Error::structure(pos, "send expects 2 arguments"));
  }
  let to = translate_value_expr(&args[0], ctx, table, opts)?;
  if !to.typ.as_ref().is_some_and(is_address) {
    return Err(Error::type_mismatch(pos, "expected an address as destination for send"));
  }
  let value = translate_value_expr(&args[1], ctx, table, opts)?;
  if !value.typ.as_ref().is_some_and(is_sendable_number) {
    return Err(Error::type_mismatch(pos, "send value must be a number"));
  }
  let call = Node::op("CALL", vec![
    Node::int(0), to, value, Node::int(0), Node::int(0), Node::int(0), Node::int(0),
  ], table, pos)?;
  Node::op("POP", vec![call], table, pos)
}

fn translate_selfdestruct(args: &[Expr], pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  if ctx.is_constant {
    return Err(Error::constancy(pos, "cannot selfdestruct inside a constant function"));
  }
  if args.len() != 1 {
    return Err(Error::structure(pos, "selfdestruct expects 1 argument"));
  }
  let sub = translate_value_expr(&args[0], ctx, table, opts)?;
  if !sub.typ.as_ref().is_some_and(is_address) {
    return Err(Error::type_mismatch(pos, "selfdestruct expects an address"));
  }
  Node::op("SELFDESTRUCT", vec![sub], table, pos)
}

fn translate_assign(targets: &[Expr], value: &Expr, pos: Pos, ctx: &mut Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let [target] = targets else {
    return Err(Error::structure(pos, "assignment statement must have exactly one target"));
  };
  let sub = translate_expr(value, ctx, table, opts)?;
  if let Expr::Name(name, name_pos) = target {
    if !ctx.vars.contains_key(name) {
      let sub_typ = sub.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "assignment source has no type"))?;
      let offset = ctx.new_variable(*name, ty::set_default_units(&sub_typ), *name_pos)?;
      let left = Node::int(i64::from(offset)).typed(sub_typ, Location::Memory);
      return make_setter(left, sub, table, pos, opts);
    }
  }
  let left = translate_expr(target, ctx, table, opts)?;
  if left.location == Location::Storage && ctx.is_constant {
    return Err(Error::constancy(pos, "cannot modify storage inside a constant function"));
  }
  make_setter(left, sub, table, pos, opts)
}

fn translate_if(test: &Expr, body: &[Stmt], orelse: &[Stmt], pos: Pos, ctx: &mut Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let cond = translate_value_expr(test, ctx, table, opts)?;
  let then = translate_body(body, ctx, table, opts)?;
  let else_ = if orelse.is_empty() {
    None
  } else {
    Some(translate_body(orelse, ctx, table, opts)?)
  };
  Node::if_(cond, then, else_, pos)
}

/// The three accepted `range(...)` shapes; `for i in range(x, x + 5)`
/// requires a syntactically identical expression on both sides of the `+`,
/// checked by the caller (this just carries a resolved start/rounds pair).
enum RangeShape {
  /// `range(n)`: start 0, `n` rounds.
  Count(i64),
  /// `range(a, b)` with constant bounds: start `a`, `b - a` rounds.
  ConstBounds(i64, i64),
  /// `range(x, x + n)`: runtime start `x`, constant `n` rounds.
  RuntimeStart(Expr, i64),
}

fn const_int(e: &Expr) -> Option<i64> {
  if let Expr::Num(crate::types::ast::NumLit::Int(n), _) = e {
    return i64::try_from(n).ok();
  }
  None
}

fn classify_range(iter: &Expr, pos: Pos) -> Result<RangeShape> {
  let Expr::Call { func, args, .. } = iter else {
    return Err(Error::structure(pos, "for statements must iterate over a range(...) call"));
  };
  let Expr::Name(name, _) = func.as_ref() else {
    return Err(Error::structure(pos, "for statements must iterate over a range(...) call"));
  };
  if name.as_str().as_ref() != "range" || !matches!(args.len(), 1 | 2) {
    return Err(Error::structure(pos, "for statements must be of the form `for i in range(rounds): ..` or `for i in range(start, start + rounds): ..`"));
  }
  if args.len() == 1 {
    let n = const_int(&args[0])
      .ok_or_else(|| Error::structure(pos, "repeat must have a nonzero positive integral number of rounds"))?;
    return Ok(RangeShape::Count(n));
  }
  if let (Some(a), Some(b)) = (const_int(&args[0]), const_int(&args[1])) {
    return Ok(RangeShape::ConstBounds(a, b));
  }
  let Expr::BinOp { left, op: BinOpKind::Add, right, .. } = &args[1] else {
    return Err(Error::structure(pos, "two-arg for statements must be of the form `for i in range(start, start + rounds): ...`"));
  };
  if format!("{:?}", strip_pos(&args[0])) != format!("{:?}", strip_pos(left)) {
    return Err(Error::structure(pos, "two-arg for statements of the form `for i in range(x, x + y): ...` must have `x` identical in both places"));
  }
  let n = const_int(right)
    .ok_or_else(|| Error::structure(pos, "repeat must have a nonzero positive integral number of rounds"))?;
  Ok(RangeShape::RuntimeStart(args[0].clone(), n))
}

/// Structural equality ignoring source position, so `for i in range(x, x + 5)`
/// recognizes the same `x` on both sides regardless of where each occurrence
/// was parsed.
fn strip_pos(e: &Expr) -> Expr {
  let z = Pos::default();
  match e {
    Expr::Num(n, _) => Expr::Num(n.clone(), z),
    Expr::Str(s, _) => Expr::Str(s.clone(), z),
    Expr::NameConstant(n, _) => Expr::NameConstant(*n, z),
    Expr::Name(s, _) => Expr::Name(*s, z),
    Expr::Attribute { value, attr, .. } => Expr::Attribute { value: Box::new(strip_pos(value)), attr: *attr, pos: z },
    Expr::Subscript { value, index, .. } => Expr::Subscript { value: Box::new(strip_pos(value)), index: Box::new(strip_pos(index)), pos: z },
    Expr::BinOp { left, op, right, .. } => Expr::BinOp { left: Box::new(strip_pos(left)), op: *op, right: Box::new(strip_pos(right)), pos: z },
    Expr::BoolOp { op, values, .. } => Expr::BoolOp { op: *op, values: values.iter().map(strip_pos).collect(), pos: z },
    Expr::UnaryOp { op, operand, .. } => Expr::UnaryOp { op: *op, operand: Box::new(strip_pos(operand)), pos: z },
    Expr::Compare { left, ops, comparators, .. } =>
      Expr::Compare { left: Box::new(strip_pos(left)), ops: ops.clone(), comparators: comparators.iter().map(strip_pos).collect(), pos: z },
    Expr::Call { func, args, .. } => Expr::Call { func: Box::new(strip_pos(func)), args: args.iter().map(strip_pos).collect(), pos: z },
    Expr::List { elts, .. } => Expr::List { elts: elts.iter().map(strip_pos).collect(), pos: z },
    Expr::Dict { keys, values, .. } => Expr::Dict { keys: keys.clone(), values: values.iter().map(strip_pos).collect(), pos: z },
  }
}

fn translate_for(target: Symbol, iter: &Expr, body: &[Stmt], pos: Pos, ctx: &mut Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let shape = classify_range(iter, pos)?;
  let (start, rounds) = match shape {
    RangeShape::Count(n) => (Node::int(0), n),
    RangeShape::ConstBounds(a, b) => (Node::int(a), b - a),
    RangeShape::RuntimeStart(x, n) => (translate_value_expr(&x, ctx, table, opts)?, n),
  };
  if rounds <= 0 {
    return Err(Error::structure(pos, "repeat must have a nonzero positive integral number of rounds"));
  }
  let mem_offset = if ctx.forvars.contains_key(&target) {
    ctx.vars.get(&target).map(|v| v.offset)
      .ok_or_else(|| Error::var_decl(pos, "loop index missing its memory slot"))?
  } else {
    ctx.new_variable(target, Type::num(), pos)?
  };
  let body_node = translate_body(body, ctx, table, opts)?;
  ctx.forvars.insert(target, ());
  Node::repeat(Node::int(i64::from(mem_offset)), start, rounds, body_node, pos)
}

fn translate_augassign(target: &Expr, op: BinOpKind, value: &Expr, pos: Pos, ctx: &mut Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let target_node = translate_expr(target, ctx, table, opts)?;
  let target_typ = target_node.typ.clone()
    .ok_or_else(|| Error::type_mismatch(pos, "assignment target has no type"))?;
  if !matches!(target_typ, Type::Base(_)) {
    return Err(Error::type_mismatch(pos, "can only use augmented-assignment operators with simple types"));
  }
  let (mnemonic, is_storage) = match target_node.location {
    Location::Storage => ("SLOAD", true),
    Location::Memory => ("MLOAD", false),
    Location::Calldata | Location::None =>
      return Err(Error::type_mismatch(pos, "augmented-assignment target must live in storage or memory")),
  };
  if is_storage && ctx.is_constant {
    return Err(Error::constancy(pos, "cannot modify storage inside a constant function"));
  }
  let addr_sym = crate::symbol::intern("_addr");
  let addr_var = Node::var(addr_sym);

  let sub = translate_value_expr(value, ctx, table, opts)?;

  // `t op= e` is lowered exactly as `t = t op e`: the right operand is the
  // source expression's own (unconverted) node, so mixed num/decimal pairs
  // still take the cross-kind branches in `binop_nodes` (unit algebra,
  // `10^10` scaling, the `guarded_mul` overflow check, divisor guards) —
  // converting `e` to the target type here first would make every
  // augmented assignment look same-kind and skip them.
  let current = Node::op(mnemonic, vec![addr_var.clone()], table, pos)?.typed(target_typ.clone(), Location::None);
  let combined = crate::expr::binop_nodes(current, op, sub, pos, table, opts)?;
  let combined = crate::expr::finalize_value(combined, table, opts, pos)?;
  let combined_typ = combined.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "augmented-assignment result has no type"))?;
  let stored = crate::expr::base_type_conversion(combined, &combined_typ, &target_typ, table, pos, opts)?;

  let store_mnemonic = if is_storage { "SSTORE" } else { "MSTORE" };
  let store = Node::op(store_mnemonic, vec![addr_var, stored], table, pos)?;
  Node::with(addr_sym, target_node, store, pos)
}

fn translate_return(value: Option<&Expr>, pos: Pos, ctx: &Context<'_>, table: &dyn OpTable, opts: Options) -> Result<Node> {
  let Some(return_type) = ctx.return_type.clone() else {
    if value.is_some() {
      return Err(Error::type_mismatch(pos, "not expecting to return a value"));
    }
    return Node::op("RETURN", vec![Node::int(0), Node::int(0)], table, pos);
  };
  let Some(value) = value else {
    return Err(Error::type_mismatch(pos, "expecting to return a value"));
  };
  let sub = translate_expr(value, ctx, table, opts)?;
  let sub_typ = sub.typ.clone().ok_or_else(|| Error::type_mismatch(pos, "return value has no type"))?;

  match &sub_typ {
    Type::Base(sub_base) => {
      let Type::Base(ret_base) = &return_type else {
        return Err(Error::type_mismatch(pos, "trying to return a base type where the declared output is not one"));
      };
      let sub = crate::expr::unwrap_location(sub, table, pos)?;
      if !ty::are_units_compatible(sub_base, ret_base) {
        return Err(Error::type_mismatch(pos, "return type units mismatch"));
      }
      if sub_base.kind == ret_base.kind
        || (sub_base.kind == BaseKind::Num && ret_base.kind == BaseKind::Signed256)
      {
        let store = Node::op("MSTORE", vec![Node::int(0), sub], table, pos)?;
        let ret = Node::op("RETURN", vec![Node::int(0), Node::int(32)], table, pos)?;
        return Ok(Node::seq(vec![store, ret]));
      }
      if sub_base.kind == BaseKind::Num && ret_base.kind == BaseKind::Num256 {
        let store = Node::op("MSTORE", vec![Node::int(0), sub], table, pos)?;
        let loaded = Node::op("MLOAD", vec![Node::int(0)], table, pos)?;
        let nonneg = Node::op("LT", vec![loaded, Node::int(0)], table, pos)?;
        let check = Node::op("ASSERT", vec![Node::op("ISZERO", vec![nonneg], table, pos)?], table, pos)?;
        let ret = Node::op("RETURN", vec![Node::int(0), Node::int(32)], table, pos)?;
        return Ok(Node::seq(vec![store, check, ret]));
      }
      Err(Error::type_mismatch(pos, format!("unsupported return type conversion: {sub_base:?} to {ret_base:?}")))
    }
    Type::ByteArray(sub_maxlen) => {
      let Type::ByteArray(ret_maxlen) = &return_type else {
        return Err(Error::type_mismatch(pos, "trying to return a byte array where the declared output is not one"));
      };
      if sub_maxlen > ret_maxlen {
        return Err(Error::type_mismatch(pos, "cannot cast from a greater max-length to a shorter max-length"));
      }
      match sub.location {
        Location::Calldata => {
          let pos_sym = crate::symbol::intern("_pos");
          let len_sym = crate::symbol::intern("_len");
          let pos_var = Node::var(pos_sym);
          let len_var = Node::var(len_sym);
          let pos_init = Node::op("ADD", vec![Node::int(4), sub], table, pos)?;
          let len_loaded = Node::op("CALLDATALOAD", vec![pos_var.clone()], table, pos)?;
          let len_plus32 = Node::op("ADD", vec![len_loaded, Node::int(32)], table, pos)?;
          let len_init = Node::op("CEIL32", vec![len_plus32], table, pos)?;
          let assert_bound = Node::op("ASSERT", vec![
            Node::op("LT", vec![len_var.clone(), Node::int(i64::from(*sub_maxlen))], table, pos)?,
          ], table, pos)?;
          let next_mem = ctx.get_next_mem();
          let mstore_len = Node::op("MSTORE", vec![Node::int(i64::from(next_mem)), Node::int(32)], table, pos)?;
          let copy = Node::op("CALLDATACOPY", vec![
            Node::int(i64::from(next_mem + 32)), pos_var, len_var.clone(),
          ], table, pos)?;
          let ret_len = Node::op("ADD", vec![len_var, Node::int(32)], table, pos)?;
          let ret = Node::op("RETURN", vec![Node::int(i64::from(next_mem)), ret_len], table, pos)?;
          let inner = Node::seq(vec![assert_bound, mstore_len, copy, ret]);
          let with_len = Node::with(len_sym, len_init, inner, pos)?;
          Node::with(pos_sym, pos_init, with_len, pos)
        }
        Location::Memory => {
          let loc_sym = crate::symbol::intern("_loc");
          let loc_var = Node::var(loc_sym);
          let header_addr = Node::op("SUB", vec![loc_var.clone(), Node::int(32)], table, pos)?;
          let mstore_len = Node::op("MSTORE", vec![header_addr.clone(), Node::int(32)], table, pos)?;
          let loaded_len = Node::op("MLOAD", vec![loc_var.clone()], table, pos)?;
          let ret_len = Node::op("ADD", vec![loaded_len, Node::int(32)], table, pos)?;
          let ret = Node::op("RETURN", vec![header_addr, ret_len], table, pos)?;
          let inner = Node::seq(vec![mstore_len, ret]);
          Node::with(loc_sym, sub, inner, pos)
        }
        Location::Storage =>
          Err(Error::type_mismatch(pos, "returning a byte array directly out of storage is not supported")),
        Location::None =>
          Err(Error::type_mismatch(pos, "byte array return value must be in calldata or memory")),
      }
    }
    other => Err(Error::type_mismatch(pos, format!("can only return a base type or byte array, found {other:?}"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use hashbrown::HashMap;
  use crate::config::Options;
  use crate::module::Global;
  use crate::symbol::intern;
  use crate::types::ast::NumLit;
  use crate::types::entity::StaticOpTable;
  use num::BigInt;

  fn ctx_fixture(globals: &HashMap<Symbol, Global>, is_constant: bool) -> Context<'_> {
    Context::new(HashMap::new(), globals, None, is_constant, intern("f"), Options::default())
  }

  #[test]
  fn pass_statement_is_noop() {
    let globals = HashMap::new();
    let mut ctx = ctx_fixture(&globals, false);
    let node = translate_stmt(&Stmt::Pass { pos: Pos::default() }, &mut ctx, &StaticOpTable, Options::default()).unwrap();
    assert_eq!(node.valency(), 0);
  }

  #[test]
  fn new_variable_assignment_allocates_and_stores() {
    let globals = HashMap::new();
    let mut ctx = ctx_fixture(&globals, false);
    let stmt = Stmt::Assign {
      targets: vec![Expr::Name(intern("x"), Pos::default())],
      value: Expr::Num(NumLit::Int(BigInt::from(5)), Pos::default()),
      pos: Pos::default(),
    };
    let node = translate_stmt(&stmt, &mut ctx, &StaticOpTable, Options::default()).unwrap();
    assert_eq!(node.valency(), 0);
    assert!(ctx.vars.contains_key(&intern("x")));
  }

  #[test]
  fn assert_wraps_condition_in_assert_opcode() {
    let globals = HashMap::new();
    let mut ctx = ctx_fixture(&globals, false);
    let stmt = Stmt::Assert {
      test: Expr::NameConstant(crate::types::ast::NameConstant::True, Pos::default()),
      pos: Pos::default(),
    };
    let node = translate_stmt(&stmt, &mut ctx, &StaticOpTable, Options::default()).unwrap();
    assert_eq!(node.valency(), 0);
  }

  #[test]
  fn send_is_rejected_in_constant_functions() {
    let globals = HashMap::new();
    let mut ctx = ctx_fixture(&globals, true);
    let stmt = Stmt::Expr {
      value: Expr::Call {
        func: Box::new(Expr::Name(intern("send"), Pos::default())),
        args: vec![
          Expr::Name(intern("self"), Pos::default()),
          Expr::Num(NumLit::Int(BigInt::from(1)), Pos::default()),
        ],
        pos: Pos::default(),
      },
      pos: Pos::default(),
    };
    assert!(translate_stmt(&stmt, &mut ctx, &StaticOpTable, Options::default()).is_err());
  }

  #[test]
  fn range_count_loop_builds_repeat_node() {
    let globals = HashMap::new();
    let mut ctx = ctx_fixture(&globals, false);
    let stmt = Stmt::For {
      target: intern("i"),
      iter: Expr::Call {
        func: Box::new(Expr::Name(intern("range"), Pos::default())),
        args: vec![Expr::Num(NumLit::Int(BigInt::from(10)), Pos::default())],
        pos: Pos::default(),
      },
      body: vec![Stmt::Pass { pos: Pos::default() }],
      pos: Pos::default(),
    };
    let node = translate_stmt(&stmt, &mut ctx, &StaticOpTable, Options::default()).unwrap();
    assert_eq!(node.valency(), 0);
  }

  fn contains_sym(node: &Node, name: &str) -> bool {
    if let crate::types::lir::Value::Sym(s) = &node.value {
      if s.as_str().as_ref() == name {
        return true;
      }
    }
    node.args.iter().any(|a| contains_sym(a, name))
  }

  #[test]
  fn augassign_div_guards_against_a_zero_divisor() {
    let globals = HashMap::new();
    let mut ctx = ctx_fixture(&globals, false);
    ctx.new_variable(intern("x"), ty::Type::Base(ty::Base { kind: BaseKind::Num, unit: None, positional: false }), Pos::default()).unwrap();
    let stmt = Stmt::AugAssign {
      target: Expr::Name(intern("x"), Pos::default()),
      op: BinOpKind::Div,
      value: Expr::Num(NumLit::Int(BigInt::from(2)), Pos::default()),
      pos: Pos::default(),
    };
    let node = translate_stmt(&stmt, &mut ctx, &StaticOpTable, Options::default()).unwrap();
    assert!(contains_sym(&node, "CLAMP_NONZERO"), "augmented division must guard its divisor, matching ordinary `/`");
  }

  #[test]
  fn augassign_decimal_mul_emits_the_overflow_guard() {
    let globals = HashMap::new();
    let mut ctx = ctx_fixture(&globals, false);
    ctx.new_variable(intern("x"), ty::Type::Base(ty::Base { kind: BaseKind::Decimal, unit: None, positional: false }), Pos::default()).unwrap();
    let stmt = Stmt::AugAssign {
      target: Expr::Name(intern("x"), Pos::default()),
      op: BinOpKind::Mul,
      value: Expr::Num(NumLit::Float(4.0), Pos::default()),
      pos: Pos::default(),
    };
    let node = translate_stmt(&stmt, &mut ctx, &StaticOpTable, Options::default()).unwrap();
    assert!(contains_sym(&node, "ASSERT"), "decimal `*=` must carry the same overflow assertion as ordinary `*`");
    assert!(contains_sym(&node, "SDIV"), "decimal `*=` must descale by 10^10 like ordinary decimal multiplication");
  }

  #[test]
  fn return_with_no_declared_type_rejects_a_value() {
    let globals = HashMap::new();
    let ctx = ctx_fixture(&globals, false);
    let stmt = Stmt::Return { value: Some(Expr::Num(NumLit::Int(BigInt::from(1)), Pos::default())), pos: Pos::default() };
    assert!(translate_return(match &stmt { Stmt::Return { value, .. } => value.as_ref(), _ => unreachable!() }, Pos::default(), &ctx, &StaticOpTable, Options::default()).is_err());
  }
}
