//! A stack virtual machine for the GCL command language.
//!
//! gclvm executes compiled command-language programs: an ordered list of
//! stack instructions operating on typed cells, variable scopes, per-level
//! operand stacks and a registry of overloaded functions.
//!
//! # Modules
//!
//! - [`runtime`] -- Cells, scopes, stacks, the function registry and call binder, and the engine.
//! - [`codec`] -- Binary encoder and decoder for cells.
//! - [`program`] -- JSON program files: top-level instructions plus user-defined functions.
//!
//! # Example
//!
//! Load a program, install its functions, and run it:
//!
//! ```
//! use gclvm::program::Program;
//! use gclvm::runtime::{Cell, ExecutionResult, Machine};
//!
//! let program = Program::from_json(r#"{
//!     "functions": [
//!         { "signature": "Double[x->INTEGER] =: INTEGER", "line": 1, "body": [
//!             { "op": "push-ref", "name": "x" },
//!             { "op": "push", "value": { "integer": 2 } },
//!             { "op": "binary", "operator": "times" }
//!         ]}
//!     ],
//!     "main": [
//!         { "op": "init-call", "function": "Double" },
//!         { "op": "push", "value": { "integer": 21 } },
//!         { "op": "bind" },
//!         { "op": "call" }
//!     ]
//! }"#).unwrap();
//!
//! let mut machine = Machine::builder().output(Box::new(std::io::sink())).build();
//! let main = program.install(&mut machine).unwrap();
//! assert_eq!(machine.execute(&main).unwrap(), ExecutionResult::Success);
//! assert_eq!(machine.peek(), Some(&Cell::Integer(42)));
//! ```

pub mod codec;
pub mod program;
pub mod runtime;
