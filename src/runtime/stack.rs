//! Per-level operand stack

use super::{Cell, RuntimeError};

/// The operand stack of one call-nesting level
///
/// Cells are moved in and out; popping transfers ownership to the caller
/// and nothing else keeps a handle on a popped cell.
#[derive(Debug, Default)]
pub struct Stack {
    cells: Vec<Cell>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Stack { cells: Vec::new() }
    }

    /// Create an empty stack with room for `capacity` cells
    pub fn with_capacity(capacity: usize) -> Self {
        Stack {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Push a cell onto the stack
    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    /// Pop the top cell, handing ownership to the caller
    pub fn pop(&mut self) -> Result<Cell, RuntimeError> {
        self.cells.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop `count` cells, returned in push order; nothing is popped on underflow
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<Cell>, RuntimeError> {
        let split = self
            .cells
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.cells.split_off(split))
    }

    /// Borrow the top cell without popping it
    pub fn peek(&self) -> Option<&Cell> {
        self.cells.last()
    }

    /// Number of cells on the stack
    pub fn depth(&self) -> usize {
        self.cells.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Drop every cell
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Take every cell, bottom-most first
    pub fn drain(&mut self) -> Vec<Cell> {
        std::mem::take(&mut self.cells)
    }
}
