//! `contractc`: a type-directed translator from a contract-oriented source
//! language's AST to a low-level, stack-machine-flavored intermediate
//! representation (LIR).
//!
//! The pipeline runs top to bottom through this crate's modules:
//!
//! 1. [`module`] partitions a module's top-level items into persistent
//!    storage field declarations and function definitions.
//! 2. [`binder`] resolves each function's parameter layout, return type,
//!    constancy, canonical signature, and 4-byte selector.
//! 3. [`context`] is the per-function symbol table and memory bump
//!    allocator threaded through the next two stages.
//! 4. [`expr`] and [`stmt`] lower expressions and statements into
//!    [`types::lir::Node`] trees, validated against the opcode registry in
//!    [`types::entity`] as they're built.
//! 5. [`setter`] synthesizes the copy/store logic a plain assignment
//!    expands into, for every assignable type shape.
//! 6. [`translate`] assembles whole-module output: the prelude, the
//!    per-function dispatch chain, and the four top-level shapes a module
//!    can take.
//! 7. [`types::abi`] derives the externally visible ABI descriptor from the
//!    same bound-function information [`binder`] already computed.
//!
//! [`types::ty`] (the type system), [`numeric`] (arbitrary-precision
//! constant helpers) and [`config`] (fixed memory layout and tunable
//! [`config::Options`]) are shared infrastructure the stages above draw on.
//! [`error`] holds the five-variant error taxonomy every fallible entry
//! point returns; [`span`] and [`symbol`] are the position and interned-name
//! primitives carried through every AST and LIR node.

pub mod binder;
pub mod config;
pub mod context;
pub mod error;
pub mod expr;
pub mod module;
pub mod numeric;
pub mod setter;
pub mod span;
pub mod stmt;
pub mod symbol;
pub mod translate;
pub mod types;

pub use config::Options;
pub use error::{Error, Result};
pub use translate::{translate_module, TranslatedModule};
pub use types::abi::AbiFunction;
pub use types::ast::Module;
pub use types::entity::{OpTable, StaticOpTable};
