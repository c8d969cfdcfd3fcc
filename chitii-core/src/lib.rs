//! Core compiler pipeline for the chitii language.
//!
//! chitii is a small imperative language with 32-bit integers, string
//! literals, fixed-size integer arrays, functions, `print` and
//! `input()`. The pipeline is:
//!
//!   source text
//!     -> lexer    (tokens)
//!     -> parser   (flat statement list)
//!     -> codegen  (LLVM IR module, rendered as text)
//!
//! The core performs no I/O. Higher-level tools (the CLI, a JIT
//! harness, a compile service) feed it source text and hand the IR to
//! an LLVM toolchain.

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Back-end: IR model, code generation and compiler orchestration
// ---------------------------------------------------------------------

pub mod ir;
pub mod codegen;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use codegen::CodegenOptions;
pub use compiler::{CompilationArtifact, compile, emit_llvm_ir};
pub use error::{CodegenError, CoreError, LexError, ParseError};
