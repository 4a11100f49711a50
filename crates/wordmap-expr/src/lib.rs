//! Expression engine for word/status mapping.
//!
//! Status and command mappings are written as small expressions over word
//! identifiers (`W0`, `W1`, …) and command variables (`current`):
//!
//! ```text
//! W3 & 0xFF                 low byte of word 3
//! W1 # 2 ? 'open' : 'shut'  bit 2 of word 1
//! W2 # 5 = current          command: write bit 5 of word 2
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use wordmap_expr::{evaluate, parse, Value};
//!
//! let tree = parse("W0 # 3").unwrap();
//! let mut context = HashMap::new();
//! context.insert("W0".to_string(), Value::Number(8.0));
//! assert!(evaluate(&tree, &context).unwrap().is_truthy());
//! ```

pub mod ast;
pub mod deps;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{BinaryOp, CompiledExpr, Expr, UnaryOp};
pub use deps::identifiers;
pub use error::{ExprError, Result};
pub use eval::{evaluate, Context};
pub use parser::parse;
pub use value::Value;
