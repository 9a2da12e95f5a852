//! The stack machine
//!
//! [`Machine`] owns the frame arena, the function registry, the open
//! pending calls and the ambient streams. Programs run through
//! [`Machine::execute`], which is re-entrant: user-defined function bodies
//! and operator sugar run through the same loop one level deeper.

use super::{
    binder::{Args, Argument, BoundCall, PassMode, PendingCall},
    cell::{Cell, CellType, List, StreamHandle},
    diagnostics::Diagnostic,
    frame::CallStack,
    instruction::{BinaryOp, Instruction, InstructionKind, UnaryOp, LINE_SCALE},
    limits::{DEFAULT_STACK_CAPACITY, MAX_CALL_DEPTH, STACK_GROWTH, STACK_RED_ZONE},
    registry::{Body, NativeFn, Overload, Registry},
    scope::{protected_value, ScopeError},
    signature::{FuncFlags, Signature, SignatureError},
    stdlib, ExecutionResult, RuntimeError,
};
use std::io::{self, BufRead, Write};
use std::rc::Rc;

/// Embeddable command-language machine
pub struct Machine {
    calls: CallStack,
    registry: Registry,
    pending: Vec<PendingCall>,
    output: Box<dyn Write>,
    errors: Box<dyn Write>,
    input: Box<dyn BufRead>,
    max_call_depth: usize,
    reported: Vec<Diagnostic>,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("depth", &self.calls.depth())
            .field("functions", &self.registry.len())
            .field("pending", &self.pending.len())
            .field("max_call_depth", &self.max_call_depth)
            .finish()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// Machine on the process streams with the core library installed
    pub fn new() -> Self {
        MachineBuilder::new().build()
    }

    pub fn builder() -> MachineBuilder {
        MachineBuilder::new()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register one native resolver under one or more signature descriptions
    ///
    /// Each description becomes its own overload sharing `resolver`. Returns
    /// the number of overloads accepted; ambiguous ones are reported and skipped.
    pub fn register<F>(&mut self, descriptions: &[&str], flags: FuncFlags, resolver: F) -> Result<usize, SignatureError>
    where
        F: Fn(&mut Machine, &mut Args) -> Cell + 'static,
    {
        let resolver: NativeFn = Rc::new(resolver);
        let signatures = descriptions
            .iter()
            .map(|d| Signature::parse(d).map(|s| s.flags(flags)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut accepted = 0;
        for signature in signatures {
            if self.add_function(Overload::native(signature, Rc::clone(&resolver))) {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Register a user-defined function from its description and compiled body
    pub fn define_function(&mut self, description: &str, body: Vec<Instruction>) -> Result<bool, SignatureError> {
        let signature = Signature::parse(description)?;
        Ok(self.add_function(Overload::user(signature, body)))
    }

    /// Add an overload; an ambiguous one is reported and rejected
    pub fn add_function(&mut self, overload: Overload) -> bool {
        match self.registry.register(overload) {
            Ok(()) => true,
            Err(diagnostic) => {
                self.report(diagnostic);
                false
            }
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // =========================================================================
    // Operand stack
    // =========================================================================

    pub fn push(&mut self, cell: Cell) {
        self.calls.active_mut().stack.push(cell);
    }

    pub fn push_ref(&mut self, name: &str) {
        self.push(Cell::reference(name));
    }

    /// Pop `count` cells and push them back as one list, in their original order
    ///
    /// Elements that cannot be inserted are reported and skipped; the list is
    /// pushed either way and the result tells whether every element made it.
    pub fn push_list(&mut self, count: usize) -> Result<bool, RuntimeError> {
        let cells = self.calls.active_mut().stack.pop_n(count)?;
        let mut list = List::new();
        let mut complete = true;

        for cell in cells {
            let cell = self.resolve(cell);
            if let Cell::Reference(name) = &cell {
                self.report(Diagnostic::UndefinedListElement(name.clone()));
                complete = false;
                continue;
            }
            if list.push(cell.value_copy()).is_err() {
                self.report(Diagnostic::MixedListTypes);
                complete = false;
            }
        }

        self.push(Cell::List(list));
        Ok(complete)
    }

    pub fn pop(&mut self) -> Result<Cell, RuntimeError> {
        self.calls.active_mut().stack.pop()
    }

    pub fn peek(&self) -> Option<&Cell> {
        self.calls.active().stack.peek()
    }

    /// Operand count on the active level
    pub fn depth(&self) -> usize {
        self.calls.active().stack.depth()
    }

    /// Number of call-nesting levels, 1 at top level
    pub fn call_depth(&self) -> usize {
        self.calls.depth()
    }

    /// Empty the active operand stack
    pub fn flush(&mut self) {
        self.calls.active_mut().stack.clear();
    }

    /// Empty the operand stack and reset the top-level variable table
    pub fn clear(&mut self) {
        self.flush();
        self.calls.active_mut().scope.clear();
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Bind a variable in the active scope, reporting why if it cannot be bound
    pub fn define(&mut self, name: &str, cell: Cell) -> bool {
        match self.calls.active_mut().scope.define(name, cell) {
            Ok(()) => true,
            Err(ScopeError::ReadOnly(name)) => {
                self.report(Diagnostic::ReadOnlyAssign(name));
                false
            }
            Err(ScopeError::TypeChange { name, .. }) => {
                self.report(Diagnostic::TypeChange(name));
                false
            }
            Err(ScopeError::Undefined(_)) => false,
        }
    }

    /// Reference copy of a variable's value, protected names included
    pub fn lookup(&self, name: &str) -> Option<Cell> {
        self.calls.active().scope.lookup(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.calls.active().scope.is_defined(name)
    }

    /// Remove a variable, handing back its value
    ///
    /// Protected names cannot be removed; a value copy of the protected
    /// value is returned instead.
    pub fn remove(&mut self, name: &str) -> Option<Cell> {
        match self.calls.active_mut().scope.remove(name) {
            Ok(cell) => Some(cell),
            Err(ScopeError::ReadOnly(name)) => {
                self.report(Diagnostic::ReadOnlyRemove(name.clone()));
                protected_value(&name).map(|cell| cell.value_copy())
            }
            Err(_) => None,
        }
    }

    /// Resolve a reference against the active scope
    ///
    /// Unbound names come back as the original reference. A binding whose
    /// domain object has been destroyed is dropped and the reference returned.
    pub fn resolve(&mut self, cell: Cell) -> Cell {
        match cell {
            Cell::Reference(name) => self.resolve_name(&name).unwrap_or(Cell::Reference(name)),
            other => other,
        }
    }

    fn resolve_name(&mut self, name: &str) -> Option<Cell> {
        let scope = &mut self.calls.active_mut().scope;
        let cell = scope.lookup(name)?;
        if cell.is_valid() {
            return Some(cell);
        }
        tracing::debug!(variable = name, "dropped binding to destroyed object");
        let _ = scope.remove(name);
        None
    }

    /// Pop a reference and push the value it was bound to, removing the binding
    pub fn unassign(&mut self) -> Result<bool, RuntimeError> {
        match self.pop()? {
            Cell::Reference(name) if self.is_defined(&name) => {
                if let Some(cell) = self.remove(&name) {
                    self.push(cell);
                }
                Ok(true)
            }
            Cell::Reference(name) => {
                self.report(Diagnostic::UnAssignUndefined(name.clone()));
                self.push(Cell::Reference(name));
                Ok(false)
            }
            other => {
                self.push(other);
                self.report(Diagnostic::UnAssignNonReference);
                Ok(false)
            }
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Open a pending call over every overload registered under `name`
    pub fn init_call(&mut self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(entry) => {
                self.pending.push(PendingCall::new(name, entry.overloads()));
                true
            }
            None => {
                self.report(Diagnostic::UndefinedFunction(name.to_string()));
                false
            }
        }
    }

    /// Bind the top operand to the innermost pending call
    pub fn bind(&mut self, param: Option<&str>) -> Result<bool, RuntimeError> {
        self.bind_with(param, PassMode::Auto)
    }

    pub fn bind_val(&mut self, param: Option<&str>) -> Result<bool, RuntimeError> {
        self.bind_with(param, PassMode::Value)
    }

    pub fn bind_ref(&mut self, param: Option<&str>) -> Result<bool, RuntimeError> {
        self.bind_with(param, PassMode::Reference)
    }

    pub fn bind_with(&mut self, param: Option<&str>, mode: PassMode) -> Result<bool, RuntimeError> {
        if self.pending.is_empty() {
            return Err(RuntimeError::NoPendingCall);
        }

        let argument = match self.pop()? {
            Cell::Reference(name) => {
                let cell = self.resolve(Cell::Reference(name.clone()));
                Argument::variable(name, cell)
            }
            cell => Argument::value(cell),
        };

        let pending = self.pending.last_mut().ok_or(RuntimeError::NoPendingCall)?;
        if pending.is_failed() {
            return Ok(false);
        }
        match pending.bind(param, argument, mode) {
            Ok(()) => Ok(true),
            Err(diagnostic) => {
                self.report(diagnostic);
                Ok(false)
            }
        }
    }

    /// Invoke the innermost pending call and push its result
    ///
    /// Returns false when binding was incomplete, when the result is an
    /// Error cell, or when a by-reference write-back was refused.
    pub fn call(&mut self) -> Result<bool, RuntimeError> {
        let pending = self.pending.pop().ok_or(RuntimeError::NoPendingCall)?;
        let already_reported = pending.is_failed();

        let BoundCall {
            overload,
            mut args,
            variables,
        } = match pending.finish() {
            Ok(bound) => bound,
            Err(diagnostic) => {
                let message = diagnostic.to_string();
                if !already_reported {
                    self.report(diagnostic);
                }
                self.push(Cell::error(message));
                return Ok(false);
            }
        };

        let result = self.invoke(&overload, &mut args)?;
        let mut succeeded = !result.is_error();
        self.push(result);

        for (index, variable) in variables.into_iter().enumerate() {
            let Some(variable) = variable else {
                continue;
            };
            if !args.is_rebound(index) {
                continue;
            }
            if let Some(cell) = args.take(index) {
                succeeded &= self.define(&variable, cell);
            }
        }

        Ok(succeeded)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(function = %overload.signature.name))]
    fn invoke(&mut self, overload: &Rc<Overload>, args: &mut Args) -> Result<Cell, RuntimeError> {
        let signature = &overload.signature;

        if signature.flags.contains(FuncFlags::MATCH_OWNER) && !owners_agree(args) {
            let diagnostic = Diagnostic::OwnerMismatch(signature.name.clone());
            let message = diagnostic.to_string();
            self.report(diagnostic);
            return Ok(Cell::error(message));
        }

        if signature.is_listable() && needs_broadcast(signature, args) {
            return self.broadcast(overload, args);
        }

        match &overload.body {
            Body::Native(resolver) => {
                let resolver = Rc::clone(resolver);
                Ok(resolver(self, args))
            }
            Body::User(body) => {
                let body = Rc::clone(body);
                self.call_user(signature, &body, args)
            }
        }
    }

    /// Apply a listable overload element-wise across its list arguments
    fn broadcast(&mut self, overload: &Rc<Overload>, args: &Args) -> Result<Cell, RuntimeError> {
        let signature = &overload.signature;
        let spread: Vec<bool> = signature
            .params
            .iter()
            .zip(args.iter())
            .map(|(param, cell)| !param.by_ref && !param.accepts(cell) && param.accepts_broadcast(cell))
            .collect();

        let mut len = None;
        for (cell, _) in args.iter().zip(&spread).filter(|(_, spread)| **spread) {
            let n = cell.as_list().map_or(0, List::len);
            match len {
                None => len = Some(n),
                Some(m) if m != n => {
                    let diagnostic = Diagnostic::ListLengthMismatch(signature.name.clone());
                    let message = diagnostic.to_string();
                    self.report(diagnostic);
                    return Ok(Cell::error(message));
                }
                Some(_) => {}
            }
        }

        let mut results = List::new();
        for index in 0..len.unwrap_or(0) {
            let cells = args
                .iter()
                .zip(&spread)
                .map(|(cell, spread)| match (spread, cell) {
                    (true, Cell::List(list)) => list
                        .get(index)
                        .map(Cell::value_copy)
                        .unwrap_or(Cell::Null(CellType::Undetermined)),
                    _ => cell.value_copy(),
                })
                .collect();

            let result = self.invoke(overload, &mut Args::new(cells))?;
            if result.is_error() {
                return Ok(result);
            }
            if results.push(result).is_err() {
                self.report(Diagnostic::MixedListTypes);
                return Ok(Cell::error(Diagnostic::MixedListTypes.to_string()));
            }
        }
        Ok(Cell::List(results))
    }

    /// Run a user-defined body in a fresh frame
    fn call_user(&mut self, signature: &Signature, body: &[Instruction], args: &mut Args) -> Result<Cell, RuntimeError> {
        if self.calls.depth() >= self.max_call_depth {
            tracing::warn!(function = %signature.name, depth = self.calls.depth(), "call stack overflow");
            return Ok(Cell::error("Error: Call stack overflow"));
        }

        self.calls.enter();
        tracing::debug!(function = %signature.name, depth = self.calls.depth(), "entered frame");

        for (param, cell) in signature.params.iter().zip(args.iter()) {
            if !cell.is_reference() {
                self.define(&param.name, cell.value_copy());
            }
        }

        // Each nesting level recurses on the host stack; grow it on demand
        let outcome = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || self.execute(body));
        let result = match outcome {
            Ok(ExecutionResult::Success) => match self.pop() {
                Err(_) => Cell::error("Error: No return value"),
                Ok(top) => match self.resolve(top) {
                    Cell::Reference(name) => Cell::error(format!("Error: Undefined variable \"{name}\" returned")),
                    cell => cell.value_copy(),
                },
            },
            Ok(ExecutionResult::UserQuit) => Cell::error("Error: Interruption by user"),
            Ok(ExecutionResult::FailureAtLine(line)) => Cell::error(format!(
                "Error at line {} in function, line {} in source code",
                line / LINE_SCALE,
                line % LINE_SCALE
            )),
            Err(err) => {
                self.calls.leave();
                return Err(err);
            }
        };

        for (index, param) in signature.params.iter().enumerate() {
            if !param.by_ref {
                continue;
            }
            if let Ok(cell) = self.calls.active_mut().scope.remove(&param.name) {
                args.set(index, cell);
            }
        }

        self.calls.leave();
        tracing::debug!(function = %signature.name, depth = self.calls.depth(), "left frame");
        Ok(result)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run a compiled program on the active level
    ///
    /// Pending calls opened by this run and not completed are discarded when
    /// it halts, whatever the reason.
    pub fn execute(&mut self, program: &[Instruction]) -> Result<ExecutionResult, RuntimeError> {
        let floor = self.pending.len();
        let outcome = self.run(program);

        if self.pending.len() > floor {
            tracing::debug!(discarded = self.pending.len() - floor, "discarding pending calls");
            self.pending.truncate(floor);
        }
        outcome
    }

    fn run(&mut self, program: &[Instruction]) -> Result<ExecutionResult, RuntimeError> {
        let len = program.len();
        let mut pc = 1;

        while pc <= len {
            let instruction = &program[pc - 1];
            tracing::trace!(pc, line = instruction.line, instruction = %instruction, "execute");

            match &instruction.kind {
                InstructionKind::Quit => return Ok(ExecutionResult::UserQuit),
                InstructionKind::Jump(target) => {
                    pc = jump_target(*target, len)?;
                }
                InstructionKind::JumpIf(target) => {
                    let condition = self.pop()?;
                    match self.resolve(condition) {
                        Cell::Boolean(true) => pc = jump_target(*target, len)?,
                        Cell::Boolean(false) => pc += 1,
                        other => {
                            self.push(other);
                            return Err(RuntimeError::NonBooleanCondition { line: instruction.line });
                        }
                    }
                }
                kind => {
                    if !self.step(kind)? {
                        return Ok(ExecutionResult::FailureAtLine(instruction.line));
                    }
                    pc += 1;
                }
            }
        }

        Ok(ExecutionResult::Success)
    }

    fn step(&mut self, kind: &InstructionKind) -> Result<bool, RuntimeError> {
        use InstructionKind::*;

        match kind {
            Push(cell) => {
                self.push(cell.value_copy());
                Ok(true)
            }
            PushRef(name) => {
                self.push_ref(name);
                Ok(true)
            }
            PushList(count) => self.push_list(*count),
            Pop => {
                let _ = self.pop();
                Ok(true)
            }
            Flush => {
                self.flush();
                Ok(true)
            }
            Dump => Ok(self.dump()),
            Output => self.output(),
            Clear => {
                self.clear();
                Ok(true)
            }
            UnAssign => self.unassign(),
            Unary(op) => self.unary(*op),
            Binary(op) => self.binary(*op),
            InitCall(name) => Ok(self.init_call(name)),
            Bind { param, mode } => self.bind_with(param.as_deref(), *mode),
            Call => self.call(),
            Help(name) => Ok(self.help(name)),
            // Handled by the execution loop
            Jump(_) | JumpIf(_) | Quit => Ok(true),
        }
    }

    // =========================================================================
    // Operator sugar
    // =========================================================================

    /// Call the one-argument function behind a unary operator on the top operand
    pub fn unary(&mut self, op: UnaryOp) -> Result<bool, RuntimeError> {
        self.sugar(op.function_name(), 1)
    }

    /// Call the two-argument function behind a binary operator on the top two operands
    ///
    /// The left operand (pushed first) is bound to the first parameter.
    pub fn binary(&mut self, op: BinaryOp) -> Result<bool, RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let name = match op {
            BinaryOp::Subscript => {
                let left = self.resolve(left);
                let right = self.resolve(right);
                let name = if matches!(left, Cell::Text(_)) { "NthChar" } else { "NthElement" };
                self.push(right);
                self.push(left);
                name
            }
            op => {
                self.push(right);
                self.push(left);
                op.function_name()
            }
        };
        self.sugar(name, 2)
    }

    fn sugar(&mut self, name: &str, arity: usize) -> Result<bool, RuntimeError> {
        let mut program = Vec::with_capacity(arity + 2);
        program.push(Instruction::new(InstructionKind::InitCall(name.to_string()), 0));
        for _ in 0..arity {
            program.push(Instruction::new(
                InstructionKind::Bind {
                    param: None,
                    mode: PassMode::Auto,
                },
                0,
            ));
        }
        program.push(Instruction::new(InstructionKind::Call, 0));

        Ok(self.execute(&program)? == ExecutionResult::Success)
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Print the resolved top operand and leave it on the stack
    pub fn output(&mut self) -> Result<bool, RuntimeError> {
        let top = self.pop()?;
        let cell = self.resolve(top);
        let written = writeln!(self.output, "{}", render(&cell)).is_ok();
        self.push(cell);
        Ok(written)
    }

    /// Print every operand from the top down, emptying the stack
    pub fn dump(&mut self) -> bool {
        let cells = self.calls.active_mut().stack.drain();
        let mut written = true;

        if cells.is_empty() {
            written &= writeln!(self.output, "Stack : NULL").is_ok();
        }
        for (index, cell) in cells.into_iter().enumerate().rev() {
            let cell = self.resolve(cell);
            written &= writeln!(self.output, "Stack element {index} : {}", render(&cell)).is_ok();
        }
        written &= writeln!(self.output).is_ok();
        written
    }

    /// Print every overload signature of a function
    pub fn help(&mut self, name: &str) -> bool {
        let lines: Vec<String> = match self.registry.get(name) {
            Some(entry) => entry.overloads().iter().map(|o| o.signature.to_string()).collect(),
            None => {
                self.report(Diagnostic::HelpNotFound(name.to_string()));
                return false;
            }
        };
        lines.iter().all(|line| writeln!(self.output, "{line}").is_ok())
    }

    /// Write text to one of the ambient output streams
    pub fn write_stream(&mut self, stream: StreamHandle, text: &str) -> io::Result<()> {
        match stream {
            StreamHandle::Output => self.output.write_all(text.as_bytes()),
            StreamHandle::Discard | StreamHandle::Input => Ok(()),
        }
    }

    /// Read one line from the ambient input stream, `None` at end of input
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    // =========================================================================
    // Diagnostics and teardown
    // =========================================================================

    /// Emit one catalog diagnostic to the error stream
    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(code = diagnostic.code(), "{diagnostic}");
        let _ = writeln!(self.errors, "{}", diagnostic.render());
        self.reported.push(diagnostic);
    }

    /// Every diagnostic emitted so far, oldest first
    pub fn reported(&self) -> &[Diagnostic] {
        &self.reported
    }

    /// Check that every call has returned, then flush the streams
    pub fn teardown(&mut self) -> Result<(), RuntimeError> {
        if !self.pending.is_empty() {
            return Err(RuntimeError::PendingCallsOutstanding(self.pending.len()));
        }
        if self.calls.depth() != 1 {
            return Err(RuntimeError::FrameImbalance {
                depth: self.calls.depth(),
            });
        }
        self.flush();
        let _ = self.output.flush();
        let _ = self.errors.flush();
        Ok(())
    }
}

fn jump_target(target: usize, len: usize) -> Result<usize, RuntimeError> {
    if (1..=len).contains(&target) {
        Ok(target)
    } else {
        Err(RuntimeError::InvalidJumpTarget { target, len })
    }
}

/// How `Output` and `Dump` show a resolved cell
fn render(cell: &Cell) -> String {
    match cell {
        Cell::Reference(name) => format!("{name} (undefined)"),
        cell if !cell.is_valid() => "(undefined)".to_string(),
        cell => cell.to_string(),
    }
}

fn needs_broadcast(signature: &Signature, args: &Args) -> bool {
    signature
        .params
        .iter()
        .zip(args.iter())
        .any(|(param, cell)| !param.by_ref && !param.accepts(cell) && param.accepts_broadcast(cell))
}

fn owners_agree(args: &Args) -> bool {
    let mut owners = Vec::new();
    for cell in args.iter() {
        collect_owners(cell, &mut owners);
    }
    owners.windows(2).all(|pair| pair[0] == pair[1])
}

fn collect_owners(cell: &Cell, owners: &mut Vec<u64>) {
    match cell {
        Cell::Handle(handle) => owners.extend(handle.object().owner()),
        Cell::List(list) => list.iter().for_each(|item| collect_owners(item, owners)),
        _ => {}
    }
}

/// Builder for [`Machine`]
pub struct MachineBuilder {
    output: Option<Box<dyn Write>>,
    errors: Option<Box<dyn Write>>,
    input: Option<Box<dyn BufRead>>,
    max_call_depth: usize,
    stack_capacity: usize,
    stdlib: bool,
}

impl MachineBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            output: None,
            errors: None,
            input: None,
            max_call_depth: MAX_CALL_DEPTH,
            stack_capacity: DEFAULT_STACK_CAPACITY,
            stdlib: true,
        }
    }

    /// Set the stream behind `OUTPUT` and the printing instructions
    pub fn output(mut self, output: Box<dyn Write>) -> Self {
        self.output = Some(output);
        self
    }

    /// Set the stream diagnostics are written to
    pub fn errors(mut self, errors: Box<dyn Write>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Set the stream behind `INPUT`
    pub fn input(mut self, input: Box<dyn BufRead>) -> Self {
        self.input = Some(input);
        self
    }

    /// Set the nesting limit for user-defined function calls (top level counts as one)
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    /// Install the core operator library (on by default)
    pub fn with_stdlib(mut self, stdlib: bool) -> Self {
        self.stdlib = stdlib;
        self
    }

    pub fn build(self) -> Machine {
        let mut machine = Machine {
            calls: CallStack::new(self.stack_capacity),
            registry: Registry::new(),
            pending: Vec::new(),
            output: self.output.unwrap_or_else(|| Box::new(io::stdout())),
            errors: self.errors.unwrap_or_else(|| Box::new(io::stderr())),
            input: self.input.unwrap_or_else(|| Box::new(io::BufReader::new(io::stdin()))),
            max_call_depth: self.max_call_depth,
            reported: Vec::new(),
        };
        if self.stdlib {
            stdlib::install(&mut machine);
        }
        machine
    }
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_utils::test::{captured_machine, Captured};

    fn push_int(value: i64) -> Instruction {
        Instruction::new(InstructionKind::Push(Cell::Integer(value)), 1)
    }

    fn op(kind: InstructionKind, line: u32) -> Instruction {
        Instruction::new(kind, line)
    }

    fn bind() -> InstructionKind {
        InstructionKind::Bind {
            param: None,
            mode: PassMode::Auto,
        }
    }

    #[test]
    fn test_plus_program() {
        let (mut machine, _) = captured_machine();
        let program = vec![
            push_int(2),
            push_int(3),
            op(InstructionKind::InitCall("Plus".to_string()), 1),
            op(bind(), 1),
            op(bind(), 1),
            op(InstructionKind::Call, 1),
        ];

        assert_eq!(machine.execute(&program).unwrap(), ExecutionResult::Success);
        assert_eq!(machine.peek(), Some(&Cell::Integer(5)));
    }

    #[test]
    fn test_jumps_are_one_based() {
        let (mut machine, _) = captured_machine();
        let program = vec![
            op(InstructionKind::Jump(3), 1),
            push_int(1),
            op(InstructionKind::Push(Cell::Boolean(false)), 3),
            op(InstructionKind::JumpIf(2), 4),
            push_int(9),
        ];

        assert_eq!(machine.execute(&program).unwrap(), ExecutionResult::Success);
        assert_eq!(machine.depth(), 1);
        assert_eq!(machine.peek(), Some(&Cell::Integer(9)));
    }

    #[test]
    fn test_contract_violations() {
        let (mut machine, _) = captured_machine();
        let program = vec![op(InstructionKind::Jump(5), 1)];
        assert!(matches!(
            machine.execute(&program),
            Err(RuntimeError::InvalidJumpTarget { target: 5, len: 1 })
        ));

        let program = vec![push_int(1), op(InstructionKind::JumpIf(1), 7)];
        assert!(matches!(
            machine.execute(&program),
            Err(RuntimeError::NonBooleanCondition { line: 7 })
        ));
        assert_eq!(machine.peek(), Some(&Cell::Integer(1)));

        assert!(matches!(machine.bind(None), Err(RuntimeError::NoPendingCall)));
    }

    #[test]
    fn test_failure_reports_line() {
        let (mut machine, captured) = captured_machine();
        let program = vec![push_int(1), op(InstructionKind::InitCall("Nope".to_string()), 4), push_int(2)];

        assert_eq!(machine.execute(&program).unwrap(), ExecutionResult::FailureAtLine(4));
        assert_eq!(machine.depth(), 1);
        assert_eq!(captured.errors(), "GCL: Function Nope[] undefined\n");
        assert_eq!(machine.reported()[0].code(), 25);
    }

    #[test]
    fn test_unbound_reference_renders_undefined() {
        let (mut machine, captured) = captured_machine();
        machine.push_ref("ghost");
        assert!(machine.output().unwrap());
        assert_eq!(captured.output(), "ghost (undefined)\n");
        assert_eq!(machine.pop().unwrap(), Cell::reference("ghost"));
    }

    #[test]
    fn test_dump_empties_stack() {
        let (mut machine, captured) = captured_machine();
        machine.dump();
        machine.push(Cell::Integer(1));
        machine.push(Cell::text("a"));
        machine.dump();

        assert_eq!(
            captured.output(),
            "Stack : NULL\n\nStack element 1 : \"a\"\nStack element 0 : 1\n\n"
        );
        assert_eq!(machine.depth(), 0);
    }

    #[test]
    fn test_push_list_skips_rejected_elements() {
        let (mut machine, captured) = captured_machine();
        machine.push(Cell::Integer(1));
        machine.push_ref("missing");
        machine.push(Cell::text("x"));
        machine.push(Cell::Integer(2));

        assert!(!machine.push_list(4).unwrap());
        let Some(Cell::List(list)) = machine.peek() else {
            panic!("expected a list");
        };
        assert_eq!(list.len(), 2);
        assert_eq!(
            captured.errors(),
            "GCL: Cannot insert undefined reference \"missing\" into a list\nGCL: Cannot create a list of mixed types\n"
        );
    }

    #[test]
    fn test_unassign() {
        let (mut machine, _) = captured_machine();
        machine.define("x", Cell::Integer(4));

        machine.push_ref("x");
        assert!(machine.unassign().unwrap());
        assert_eq!(machine.pop().unwrap(), Cell::Integer(4));
        assert!(!machine.is_defined("x"));

        machine.push_ref("x");
        assert!(!machine.unassign().unwrap());
        machine.push(Cell::Integer(1));
        assert!(!machine.unassign().unwrap());

        machine.push_ref("OUTPUT");
        assert!(machine.unassign().unwrap());
        assert_eq!(machine.pop().unwrap(), Cell::Stream(StreamHandle::Output));

        let codes: Vec<u32> = machine.reported().iter().map(Diagnostic::code).collect();
        assert_eq!(codes, vec![54, 53, 55]);
    }

    #[test]
    fn test_help() {
        let (mut machine, captured) = captured_machine();
        assert!(machine.help("Negate"));
        assert!(captured.output().starts_with("Negate[x->NUMBER] =: NUMBER"));
        assert!(!machine.help("Nope"));
        assert_eq!(machine.reported()[0].code(), 62);
    }

    #[test]
    fn test_teardown_checks_balance() {
        let (mut machine, _) = captured_machine();
        machine.push(Cell::Integer(1));
        assert!(machine.init_call("Plus"));
        assert!(matches!(machine.teardown(), Err(RuntimeError::PendingCallsOutstanding(1))));

        machine.pending.clear();
        assert!(machine.teardown().is_ok());
        assert_eq!(machine.depth(), 0);
    }

    #[test]
    fn test_call_depth_limit() {
        let captured = Captured::default();
        let mut machine = captured.builder().max_call_depth(3).build();
        let body = vec![
            op(InstructionKind::InitCall("Deep".to_string()), 65_537),
            op(InstructionKind::Call, 65_537),
        ];
        machine.define_function("Deep[] =: ANY", body).unwrap();

        let program = vec![op(InstructionKind::InitCall("Deep".to_string()), 1), op(InstructionKind::Call, 1)];
        assert_eq!(machine.execute(&program).unwrap(), ExecutionResult::FailureAtLine(1));
        assert_eq!(machine.call_depth(), 1);
        assert_eq!(
            machine.peek(),
            Some(&Cell::error("Error at line 1 in function, line 1 in source code"))
        );
    }
}
