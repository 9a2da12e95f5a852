//! Call frames
//!
//! Every call-nesting level owns one variable table and one operand stack.
//! Frames live in an arena indexed by depth. The depth is capped by the
//! machine's call limit; the host stack behind each level is grown on demand.

use super::{scope::Scope, stack::Stack};

/// One nesting level: its variable table plus its private operand stack
#[derive(Debug, Default)]
pub struct Frame {
    pub scope: Scope,
    pub stack: Stack,
}

impl Frame {
    /// Fresh frame with an empty table and stack
    pub fn new(stack_capacity: usize) -> Self {
        Frame {
            scope: Scope::new(),
            stack: Stack::with_capacity(stack_capacity),
        }
    }
}

/// Stack of frames; the last one is active. Never empty.
#[derive(Debug)]
pub struct CallStack {
    frames: Vec<Frame>,
    stack_capacity: usize,
}

impl CallStack {
    /// Create a call stack holding only the top-level frame
    pub fn new(stack_capacity: usize) -> Self {
        CallStack {
            frames: vec![Frame::new(stack_capacity)],
            stack_capacity,
        }
    }

    /// Number of frames, 1 at top level
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a fresh frame and make it active
    pub fn enter(&mut self) {
        self.frames.push(Frame::new(self.stack_capacity));
    }

    /// Drop the active frame with its table and stack; the top-level frame is never dropped
    pub fn leave(&mut self) -> bool {
        if self.frames.len() <= 1 {
            return false;
        }
        self.frames.pop();
        true
    }

    /// The innermost frame
    pub fn active(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    /// Mutable access to the innermost frame
    pub fn active_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Cell;

    #[test]
    fn test_enter_and_leave_pair() {
        let mut calls = CallStack::new(4);
        calls.active_mut().scope.define("x", Cell::Integer(1)).unwrap();

        calls.enter();
        assert_eq!(calls.depth(), 2);
        assert!(calls.active().scope.lookup("x").is_none());
        calls.active_mut().stack.push(Cell::Integer(2));

        assert!(calls.leave());
        assert_eq!(calls.depth(), 1);
        assert_eq!(calls.active().scope.lookup("x"), Some(Cell::Integer(1)));
        assert!(calls.active().stack.is_empty());
    }

    #[test]
    fn test_top_level_frame_is_kept() {
        let mut calls = CallStack::new(4);
        assert!(!calls.leave());
        assert_eq!(calls.depth(), 1);
    }
}
