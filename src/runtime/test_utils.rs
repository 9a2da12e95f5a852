//! Test utilities for runtime testing
//!
//! This module provides test helpers that can be used by any runtime test
//! without creating circular dependencies.

#[cfg(test)]
pub mod test {
    use crate::runtime::executor::{Machine, MachineBuilder};
    use crate::runtime::instruction::{BinaryOp, Instruction, InstructionKind};
    use crate::runtime::{Cell, ExecutionResult};
    use std::cell::RefCell;
    use std::io::{self, Cursor, Write};
    use std::rc::Rc;

    /// In-memory sink that stays readable after being boxed into a machine
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Captured output and error streams of one machine
    #[derive(Clone, Default)]
    pub struct Captured {
        output: SharedBuffer,
        errors: SharedBuffer,
    }

    impl Captured {
        /// Builder wired to these buffers, with empty input
        pub fn builder(&self) -> MachineBuilder {
            self.builder_with_input("")
        }

        pub fn builder_with_input(&self, input: &str) -> MachineBuilder {
            Machine::builder()
                .output(Box::new(self.output.clone()))
                .errors(Box::new(self.errors.clone()))
                .input(Box::new(Cursor::new(input.as_bytes().to_vec())))
        }

        pub fn output(&self) -> String {
            self.output.contents()
        }

        pub fn errors(&self) -> String {
            self.errors.contents()
        }
    }

    /// Machine with the core library and captured streams
    pub fn captured_machine() -> (Machine, Captured) {
        let captured = Captured::default();
        (captured.builder().build(), captured)
    }

    /// Test builder for running small programs fluently
    pub struct ProgramTest {
        instructions: Vec<Instruction>,
        machine: Machine,
        captured: Captured,
    }

    impl ProgramTest {
        pub fn new() -> Self {
            let (machine, captured) = captured_machine();
            ProgramTest {
                instructions: Vec::new(),
                machine,
                captured,
            }
        }

        /// Append an instruction; its line is its 1-based position
        pub fn inst(mut self, kind: InstructionKind) -> Self {
            let line = self.instructions.len() as u32 + 1;
            self.instructions.push(Instruction::new(kind, line));
            self
        }

        pub fn push(self, cell: Cell) -> Self {
            self.inst(InstructionKind::Push(cell))
        }

        pub fn binary(self, left: Cell, op: BinaryOp, right: Cell) -> Self {
            self.push(left).push(right).inst(InstructionKind::Binary(op))
        }

        pub fn run(mut self) -> (ExecutionResult, Machine, Captured) {
            let result = self.machine.execute(&self.instructions).unwrap();
            (result, self.machine, self.captured)
        }

        /// Run and check that the program succeeded leaving `expected` on top
        pub fn expect_top(self, expected: Cell) {
            let (result, machine, captured) = self.run();
            assert_eq!(result, ExecutionResult::Success, "errors: {}", captured.errors());
            assert_eq!(machine.peek(), Some(&expected));
        }

        /// Run and check that the program failed with an Error cell on top
        pub fn expect_error(self, message: &str) {
            let (result, machine, _) = self.run();
            assert!(matches!(result, ExecutionResult::FailureAtLine(_)), "{result:?}");
            assert_eq!(machine.peek(), Some(&Cell::error(message)));
        }
    }
}
