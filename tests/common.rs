//! Common test utilities shared between integration tests

#![allow(dead_code)]

use gclvm::program::Program;
use gclvm::runtime::{ExecutionResult, Machine, MachineBuilder};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

/// Captured writer that stores output for testing
#[derive(Clone, Default)]
pub struct CapturedWriter(pub Arc<Mutex<Vec<u8>>>);

impl CapturedWriter {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Output and diagnostics streams of one machine
#[derive(Clone, Default)]
pub struct Streams {
    pub output: CapturedWriter,
    pub errors: CapturedWriter,
}

impl Streams {
    pub fn builder(&self, input: &str) -> MachineBuilder {
        Machine::builder()
            .output(Box::new(self.output.clone()))
            .errors(Box::new(self.errors.clone()))
            .input(Box::new(Cursor::new(input.as_bytes().to_vec())))
    }
}

/// Machine with the core library and captured streams
pub fn machine() -> (Machine, Streams) {
    let streams = Streams::default();
    (streams.builder("").build(), streams)
}

/// Load a JSON program into a fresh machine and run it
pub fn run_json(json: &str) -> (ExecutionResult, Machine, Streams) {
    run_json_with_input(json, "")
}

pub fn run_json_with_input(json: &str, input: &str) -> (ExecutionResult, Machine, Streams) {
    let streams = Streams::default();
    let mut machine = streams.builder(input).build();
    let program = Program::from_json(json).expect("program should load");
    let main = program.install(&mut machine).expect("functions should install");
    let result = machine.execute(&main).expect("no contract violation");
    (result, machine, streams)
}
