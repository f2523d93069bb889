#![forbid(unsafe_code)]

//! C target for the contract model translator: a small construction API for
//! expressions, statements and declarations, a printer, and the declarations
//! of the verification runtime the printed code links against.

mod emit;
pub mod runtime;
pub mod syntax;

pub use runtime::{RUNTIME_HEADER, runtime_header};
pub use syntax::{CBlock, CExpr, CForInit, CFunction, CParam, CProgram, CStmt, CStruct, CVarDecl};
