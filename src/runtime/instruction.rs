//! Compiled instruction representation
//!
//! A program is an ordered slice of [`Instruction`]s. Jump targets are
//! absolute 1-based positions in that same slice.

use super::binder::PassMode;
use super::cell::Cell;
use std::fmt;

/// Lines inside a user function body are reported as `function_line * LINE_SCALE + body_line`
pub const LINE_SCALE: u32 = 65_536;

/// Encode a line inside a function body for [`FailureAtLine`](super::ExecutionResult::FailureAtLine)
///
/// Both parts must be below [`LINE_SCALE`].
pub fn function_line(function: u32, body: u32) -> u32 {
    function * LINE_SCALE + body
}

/// One compiled instruction and the source line it came from
#[derive(Debug, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub line: u32,
}

impl Instruction {
    pub fn new(kind: InstructionKind, line: u32) -> Self {
        Instruction { kind, line }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// Unary operators, compiled to a call of the function of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnaryOp {
    Negate,
    Not,
}

impl UnaryOp {
    pub fn function_name(self) -> &'static str {
        match self {
            UnaryOp::Negate => "Negate",
            UnaryOp::Not => "Not",
        }
    }
}

/// Binary operators, compiled to a two-argument call of the function of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryOp {
    Plus,
    Minus,
    Times,
    Divide,
    IntegerDivide,
    Modulus,
    Power,
    Concat,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Assign,
    Write,
    Read,
    Subscript,
}

impl BinaryOp {
    pub fn function_name(self) -> &'static str {
        match self {
            BinaryOp::Plus => "Plus",
            BinaryOp::Minus => "Minus",
            BinaryOp::Times => "Times",
            BinaryOp::Divide => "Divide",
            BinaryOp::IntegerDivide => "IntegerDivide",
            BinaryOp::Modulus => "Modulus",
            BinaryOp::Power => "Power",
            BinaryOp::Concat => "Concat",
            BinaryOp::Equal => "Equal",
            BinaryOp::NotEqual => "NotEqual",
            BinaryOp::Less => "Less",
            BinaryOp::Greater => "Greater",
            BinaryOp::LessEqual => "LessEqual",
            BinaryOp::GreaterEqual => "GreaterEqual",
            BinaryOp::And => "And",
            BinaryOp::Or => "Or",
            BinaryOp::Assign => "Assign",
            BinaryOp::Write => "Write",
            BinaryOp::Read => "Read",
            BinaryOp::Subscript => "Subscript",
        }
    }
}

/// Every opcode the engine understands
#[derive(Debug, PartialEq)]
pub enum InstructionKind {
    // Stack
    /// Push a value copy of the constant
    Push(Cell),
    /// Push an unresolved reference to a variable
    PushRef(String),
    /// Pop n cells and push them as one list
    PushList(usize),
    Pop,
    Flush,
    Dump,
    Output,
    Clear,
    UnAssign,

    // Operator sugar
    Unary(UnaryOp),
    Binary(BinaryOp),

    // Calls
    InitCall(String),
    Bind { param: Option<String>, mode: PassMode },
    Call,
    Help(String),

    // Control
    Jump(usize),
    JumpIf(usize),
    Quit,
}

impl InstructionKind {
    pub fn mnemonic(&self) -> &'static str {
        use InstructionKind::*;

        match self {
            Push(_) => "push",
            PushRef(_) => "push-ref",
            PushList(_) => "push-list",
            Pop => "pop",
            Flush => "flush",
            Dump => "dump",
            Output => "output",
            Clear => "clear",
            UnAssign => "unassign",
            Unary(_) => "unary",
            Binary(_) => "binary",
            InitCall(_) => "init-call",
            Bind { .. } => "bind",
            Call => "call",
            Help(_) => "help",
            Jump(_) => "jump",
            JumpIf(_) => "jump-if",
            Quit => "quit",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InstructionKind::*;

        write!(f, "{}", self.mnemonic())?;

        match self {
            Push(cell) => write!(f, " {cell}"),
            PushRef(name) | InitCall(name) | Help(name) => write!(f, " {name}"),
            PushList(n) => write!(f, " {n}"),
            Unary(op) => write!(f, " {}", op.function_name()),
            Binary(op) => write!(f, " {}", op.function_name()),
            Bind { param, mode } => {
                if let Some(param) = param {
                    write!(f, " {param}")?;
                }
                match mode {
                    PassMode::Auto => Ok(()),
                    PassMode::Value => write!(f, " (value)"),
                    PassMode::Reference => write!(f, " (reference)"),
                }
            }
            Jump(target) | JumpIf(target) => write!(f, " {target}"),
            _ => Ok(()),
        }
    }
}
