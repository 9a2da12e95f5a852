//! Program files
//!
//! A compiled program is supplied as JSON: the top-level instruction list
//! plus the user-defined functions it may call.
//!
//! ```json
//! {
//!   "functions": [
//!     { "signature": "Double[x->INTEGER] =: INTEGER", "line": 1, "body": [
//!         { "op": "push-ref", "name": "x" },
//!         { "op": "push", "value": { "integer": 2 } },
//!         { "op": "binary", "operator": "times" }
//!     ]}
//!   ],
//!   "main": [
//!     { "op": "init-call", "function": "Double" },
//!     { "op": "push", "value": { "integer": 21 } },
//!     { "op": "bind" },
//!     { "op": "call" }
//!   ]
//! }
//! ```
//!
//! Entries without a `line` take their 1-based position. Lines inside a
//! function body are combined with the function's own line so failures
//! report both.

use crate::runtime::instruction::LINE_SCALE;
use crate::runtime::signature::parse_type;
use crate::runtime::{
    function_line, BinaryOp, Cell, Instruction, InstructionKind, List, Machine, PassMode, Rational, SignatureError,
    UnaryOp,
};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("cannot read program: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed program: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid literal at line {line}: {message}")]
    Literal { line: u32, message: String },
    #[error("line {line} out of range for {signature}")]
    LineOutOfRange { signature: String, line: u32 },
    #[error("invalid signature \"{signature}\": {source}")]
    Signature {
        signature: String,
        #[source]
        source: SignatureError,
    },
    #[error("{0} is ambiguous with an existing overload")]
    Ambiguous(String),
}

/// Constant as written in a program file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Rational { num: i64, den: i64 },
    Text(String),
    List(Vec<Literal>),
    /// Typed Null, e.g. `{ "null": "TEXT" }`
    Null(String),
}

impl Literal {
    pub fn to_cell(&self) -> Result<Cell, String> {
        match self {
            Literal::Boolean(b) => Ok(Cell::Boolean(*b)),
            Literal::Integer(i) => Ok(Cell::Integer(*i)),
            Literal::Float(x) => Ok(Cell::Float(*x)),
            Literal::Rational { num, den } => Rational::new(*num, *den)
                .map(Cell::Rational)
                .ok_or_else(|| format!("{num}/{den} is not a rational")),
            Literal::Text(text) => Ok(Cell::text(text)),
            Literal::List(items) => {
                let cells = items.iter().map(Literal::to_cell).collect::<Result<Vec<_>, _>>()?;
                List::from_cells(cells).map(Cell::List).map_err(|e| e.to_string())
            }
            Literal::Null(ty) => parse_type(ty).map(Cell::Null).map_err(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum Op {
    Push { value: Literal },
    PushRef { name: String },
    PushList { count: usize },
    Pop,
    Flush,
    Dump,
    Output,
    Clear,
    Unassign,
    Unary { operator: UnaryOp },
    Binary { operator: BinaryOp },
    InitCall { function: String },
    Bind {
        #[serde(default)]
        param: Option<String>,
        #[serde(default)]
        mode: PassMode,
    },
    Call,
    Help { function: String },
    Jump { target: usize },
    JumpIf { target: usize },
    Quit,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    line: Option<u32>,
    #[serde(flatten)]
    op: Op,
}

#[derive(Debug, Deserialize)]
struct FunctionFile {
    signature: String,
    #[serde(default)]
    line: u32,
    body: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct ProgramFile {
    #[serde(default)]
    functions: Vec<FunctionFile>,
    main: Vec<Entry>,
}

/// A user-defined function ready to register
#[derive(Debug)]
pub struct FunctionDef {
    pub signature: String,
    pub body: Vec<Instruction>,
}

/// A loaded program
#[derive(Debug)]
pub struct Program {
    pub functions: Vec<FunctionDef>,
    pub main: Vec<Instruction>,
}

impl Program {
    pub fn from_json(text: &str) -> Result<Program, ProgramError> {
        let file: ProgramFile = serde_json::from_str(text)?;

        let mut functions = Vec::with_capacity(file.functions.len());
        for function in file.functions {
            if function.line >= LINE_SCALE {
                return Err(ProgramError::LineOutOfRange {
                    signature: function.signature,
                    line: function.line,
                });
            }
            let body = compile(function.body)?;
            for instruction in &body {
                if instruction.line >= LINE_SCALE {
                    return Err(ProgramError::LineOutOfRange {
                        signature: function.signature,
                        line: instruction.line,
                    });
                }
            }
            let body = body
                .into_iter()
                .map(|i| Instruction::new(i.kind, function_line(function.line, i.line)))
                .collect();
            functions.push(FunctionDef {
                signature: function.signature,
                body,
            });
        }

        Ok(Program {
            functions,
            main: compile(file.main)?,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Program, ProgramError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Register the program's functions and hand back its top-level instructions
    pub fn install(self, machine: &mut Machine) -> Result<Vec<Instruction>, ProgramError> {
        for function in self.functions {
            let registered = machine
                .define_function(&function.signature, function.body)
                .map_err(|source| ProgramError::Signature {
                    signature: function.signature.clone(),
                    source,
                })?;
            if !registered {
                return Err(ProgramError::Ambiguous(function.signature));
            }
        }
        Ok(self.main)
    }
}

fn compile(entries: Vec<Entry>) -> Result<Vec<Instruction>, ProgramError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let line = entry.line.unwrap_or(index as u32 + 1);
            let kind = match entry.op {
                Op::Push { value } => {
                    let cell = value.to_cell().map_err(|message| ProgramError::Literal { line, message })?;
                    InstructionKind::Push(cell)
                }
                Op::PushRef { name } => InstructionKind::PushRef(name),
                Op::PushList { count } => InstructionKind::PushList(count),
                Op::Pop => InstructionKind::Pop,
                Op::Flush => InstructionKind::Flush,
                Op::Dump => InstructionKind::Dump,
                Op::Output => InstructionKind::Output,
                Op::Clear => InstructionKind::Clear,
                Op::Unassign => InstructionKind::UnAssign,
                Op::Unary { operator } => InstructionKind::Unary(operator),
                Op::Binary { operator } => InstructionKind::Binary(operator),
                Op::InitCall { function } => InstructionKind::InitCall(function),
                Op::Bind { param, mode } => InstructionKind::Bind { param, mode },
                Op::Call => InstructionKind::Call,
                Op::Help { function } => InstructionKind::Help(function),
                Op::Jump { target } => InstructionKind::Jump(target),
                Op::JumpIf { target } => InstructionKind::JumpIf(target),
                Op::Quit => InstructionKind::Quit,
            };
            Ok(Instruction::new(kind, line))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CellType;
    use rstest::rstest;

    #[test]
    fn test_parses_every_opcode() {
        let program = Program::from_json(
            r#"{ "main": [
                { "op": "push", "value": { "integer": 1 } },
                { "op": "push-ref", "name": "x" },
                { "op": "push-list", "count": 2 },
                { "op": "pop" }, { "op": "flush" }, { "op": "dump" },
                { "op": "output" }, { "op": "clear" }, { "op": "unassign" },
                { "op": "unary", "operator": "negate" },
                { "op": "binary", "operator": "integer-divide" },
                { "op": "init-call", "function": "F" },
                { "op": "bind", "param": "y", "mode": "reference" },
                { "op": "call" },
                { "op": "help", "function": "F" },
                { "op": "jump", "target": 1 },
                { "op": "jump-if", "target": 2, "line": 40 },
                { "op": "quit" }
            ] }"#,
        )
        .unwrap();

        assert_eq!(program.main.len(), 18);
        assert_eq!(program.main[10].kind, InstructionKind::Binary(BinaryOp::IntegerDivide));
        assert_eq!(
            program.main[12].kind,
            InstructionKind::Bind {
                param: Some("y".to_string()),
                mode: PassMode::Reference
            }
        );
        assert_eq!(program.main[16].line, 40);
        assert_eq!(program.main[17].line, 18);
    }

    #[test]
    fn test_function_lines_are_combined() {
        let program = Program::from_json(
            r#"{ "functions": [ { "signature": "F[] =: INTEGER", "line": 3, "body": [
                    { "op": "push", "value": { "integer": 1 } },
                    { "op": "quit", "line": 7 }
                ] } ],
                "main": [] }"#,
        )
        .unwrap();
        let body = &program.functions[0].body;
        assert_eq!(body[0].line, function_line(3, 1));
        assert_eq!(body[1].line, 3 * 65_536 + 7);
    }

    #[rstest]
    #[case(r#"{ "boolean": true }"#, Cell::Boolean(true))]
    #[case(r#"{ "float": 0.5 }"#, Cell::Float(0.5))]
    #[case(r#"{ "rational": { "num": 2, "den": 4 } }"#, Cell::Rational(Rational::new(1, 2).unwrap()))]
    #[case(r#"{ "text": "hi" }"#, Cell::text("hi"))]
    #[case(r#"{ "null": "LIST(TEXT)" }"#, Cell::Null(CellType::list_of(CellType::Text)))]
    fn test_literals(#[case] json: &str, #[case] expected: Cell) {
        let literal: Literal = serde_json::from_str(json).unwrap();
        assert_eq!(literal.to_cell().unwrap(), expected);
    }

    #[test]
    fn test_mixed_numeric_list_literal() {
        let literal: Literal = serde_json::from_str(r#"{ "list": [ { "integer": 1 }, { "float": 2.0 } ] }"#).unwrap();
        let cell = literal.to_cell().unwrap();
        assert_eq!(cell.cell_type(), CellType::list_of(CellType::Number));
    }

    #[rstest]
    #[case(r#"{ "main": [ { "op": "push", "value": { "rational": { "num": 1, "den": 0 } } } ] }"#, "invalid literal at line 1")]
    #[case(r#"{ "main": [ { "op": "push", "value": { "list": [ { "integer": 1 }, { "text": "a" } ] } } ] }"#, "invalid literal")]
    #[case(r#"{ "main": [ { "op": "teleport" } ] }"#, "malformed program")]
    #[case(r#"{ "functions": [ { "signature": "F[]", "body": [ { "op": "pop", "line": 70000 } ] } ], "main": [] }"#, "out of range")]
    #[case(r#"{ "functions": [ { "signature": "F[]", "line": 70000, "body": [ { "op": "pop" } ] } ], "main": [] }"#, "line 70000 out of range")]
    #[case(r#"{ "functions": [ { "signature": "F[]", "line": 65536, "body": [] } ], "main": [] }"#, "line 65536 out of range")]
    fn test_rejects_bad_programs(#[case] json: &str, #[case] fragment: &str) {
        let err = Program::from_json(json).unwrap_err();
        assert!(err.to_string().contains(fragment), "{err}");
    }

    #[test]
    fn test_install_reports_bad_and_ambiguous_signatures() {
        let mut machine = Machine::builder().with_stdlib(false).build();
        let program = Program::from_json(r#"{ "functions": [ { "signature": "F[x->", "body": [] } ], "main": [] }"#).unwrap();
        assert!(matches!(program.install(&mut machine), Err(ProgramError::Signature { .. })));

        let program = Program::from_json(
            r#"{ "functions": [
                { "signature": "F[x->INTEGER] =: ANY", "body": [] },
                { "signature": "F[y->NUMBER] =: ANY", "body": [] }
            ], "main": [] }"#,
        )
        .unwrap();
        assert!(matches!(program.install(&mut machine), Err(ProgramError::Ambiguous(_))));
    }
}
