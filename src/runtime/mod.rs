//! Command-language runtime
//!
//! This module provides the stack machine: value representation, scope
//! tables, per-level operand stacks, the function registry and call binder,
//! and the instruction execution engine.

pub mod binder;
pub mod cell;
pub mod diagnostics;
pub mod executor;
pub mod frame;
pub mod instruction;
pub mod limits;
pub mod rational;
pub mod registry;
pub mod scope;
pub mod signature;
pub mod stack;
pub mod stdlib;
pub mod test_utils;

pub use binder::{Args, PassMode};
pub use cell::{Cell, CellType, DomainObject, Handle, List, ListError, StreamHandle};
pub use diagnostics::Diagnostic;
pub use executor::{Machine, MachineBuilder};
pub use instruction::{function_line, BinaryOp, Instruction, InstructionKind, UnaryOp};
pub use rational::Rational;
pub use registry::{Body, NativeFn, Overload};
pub use signature::{FuncFlags, Param, Signature, SignatureError};

/// How a program run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    Success,
    /// A `Quit` instruction was reached
    UserQuit,
    /// An instruction failed; inside a user function body the line is
    /// `function_line * 65536 + body_line`
    FailureAtLine(u32),
}

/// Violations of the engine's contract by a malformed compiled program
///
/// These abort the whole run. Everything a script can recover from is an
/// Error cell or a catalog diagnostic instead.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Bind or call without a pending call")]
    NoPendingCall,
    #[error("Conditional jump on a non-boolean value at line {line}")]
    NonBooleanCondition { line: u32 },
    #[error("Jump target {target} out of range 1..={len}")]
    InvalidJumpTarget { target: usize, len: usize },
    #[error("Frame depth {depth} at teardown, expected 1")]
    FrameImbalance { depth: usize },
    #[error("{0} pending calls outstanding at teardown")]
    PendingCallsOutstanding(usize),
}
