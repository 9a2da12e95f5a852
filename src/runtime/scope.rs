//! Variable binding tables
//!
//! One [`Scope`] exists per call-nesting level. The names in [`PROTECTED`]
//! denote the ambient streams; they resolve in every scope, are never stored
//! in a table, and can be neither redefined nor removed.

use super::cell::{Cell, CellType, StreamHandle};
use std::collections::HashMap;

/// Protected names: ambient input stream, output stream, discard sink
pub const PROTECTED: [&str; 3] = ["INPUT", "OUTPUT", "NULL"];

/// Whether `name` is one of the read-only stream names
pub fn is_protected(name: &str) -> bool {
    PROTECTED.contains(&name)
}

/// The stream value behind a protected name
pub fn protected_value(name: &str) -> Option<Cell> {
    match name {
        "INPUT" => Some(Cell::Stream(StreamHandle::Input)),
        "OUTPUT" => Some(Cell::Stream(StreamHandle::Output)),
        "NULL" => Some(Cell::Stream(StreamHandle::Discard)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScopeError {
    #[error("variable \"{0}\" is read-only")]
    ReadOnly(String),
    #[error("variable \"{name}\" is bound to {existing}, cannot rebind to {attempted}")]
    TypeChange {
        name: String,
        existing: CellType,
        attempted: CellType,
    },
    #[error("variable \"{0}\" is undefined")]
    Undefined(String),
}

/// Variable table for one call-nesting level
#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Cell>,
}

impl Scope {
    /// Create an empty variable table
    pub fn new() -> Self {
        Scope {
            bindings: HashMap::new(),
        }
    }

    /// Whether `name` is bound, protected names included
    pub fn is_defined(&self, name: &str) -> bool {
        is_protected(name) || self.bindings.contains_key(name)
    }

    /// Bind `name` to `cell`
    ///
    /// Fails without mutation when the name is protected or already bound to
    /// an incompatible type. Related numeric types may replace one another.
    /// An empty list of undetermined element type takes over the element tag
    /// of the list it replaces.
    pub fn define(&mut self, name: &str, mut cell: Cell) -> Result<(), ScopeError> {
        if is_protected(name) {
            return Err(ScopeError::ReadOnly(name.to_string()));
        }

        if let Some(old) = self.bindings.get(name) {
            check_rebind(name, old, &mut cell)?;
        }

        self.bindings.insert(name.to_string(), cell);
        Ok(())
    }

    /// Reference copy of the bound value, including the protected streams
    pub fn lookup(&self, name: &str) -> Option<Cell> {
        protected_value(name).or_else(|| self.bindings.get(name).map(Cell::reference_copy))
    }

    /// Borrow a stored binding; protected names are not stored
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.bindings.get(name)
    }

    /// Remove a binding, handing its value to the caller
    pub fn remove(&mut self, name: &str) -> Result<Cell, ScopeError> {
        if is_protected(name) {
            return Err(ScopeError::ReadOnly(name.to_string()));
        }
        self.bindings
            .remove(name)
            .ok_or_else(|| ScopeError::Undefined(name.to_string()))
    }

    /// Number of stored bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no variable is stored
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Remove every stored binding
    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}

fn check_rebind(name: &str, old: &Cell, new: &mut Cell) -> Result<(), ScopeError> {
    let existing = old.cell_type();
    let attempted = new.cell_type();
    let type_change = || ScopeError::TypeChange {
        name: name.to_string(),
        existing: existing.clone(),
        attempted: attempted.clone(),
    };

    match (old, new) {
        (Cell::List(old_list), Cell::List(new_list)) => {
            if old_list.element_type() == new_list.element_type() {
                Ok(())
            } else if new_list.adopt_element_type(old_list.element_type().clone()) {
                Ok(())
            } else {
                Err(type_change())
            }
        }
        _ if existing == attempted => Ok(()),
        _ if existing.is_numeric() && attempted.is_numeric() => Ok(()),
        _ => Err(type_change()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cell::List;

    #[test]
    fn test_define_and_lookup() {
        let mut scope = Scope::new();
        scope.define("x", Cell::Integer(3)).unwrap();
        assert_eq!(scope.lookup("x"), Some(Cell::Integer(3)));
        assert_eq!(scope.lookup("y"), None);
        assert!(scope.is_defined("x"));
    }

    #[test]
    fn test_type_change_is_rejected_without_mutation() {
        let mut scope = Scope::new();
        scope.define("x", Cell::Integer(3)).unwrap();

        let err = scope.define("x", Cell::text("a")).unwrap_err();
        assert!(matches!(err, ScopeError::TypeChange { .. }));
        assert_eq!(scope.lookup("x"), Some(Cell::Integer(3)));
    }

    #[test]
    fn test_numeric_promotion_is_allowed() {
        let mut scope = Scope::new();
        scope.define("x", Cell::Integer(3)).unwrap();
        scope.define("x", Cell::Float(1.5)).unwrap();
        assert_eq!(scope.lookup("x"), Some(Cell::Float(1.5)));
    }

    #[test]
    fn test_protected_names() {
        let mut scope = Scope::new();
        assert_eq!(
            scope.define("OUTPUT", Cell::Integer(1)),
            Err(ScopeError::ReadOnly("OUTPUT".to_string()))
        );
        assert_eq!(scope.lookup("OUTPUT"), Some(Cell::Stream(StreamHandle::Output)));
        assert!(scope.is_defined("NULL"));
        assert!(scope.is_empty());
        assert_eq!(scope.remove("INPUT"), Err(ScopeError::ReadOnly("INPUT".to_string())));
    }

    #[test]
    fn test_empty_list_adopts_old_element_type() {
        let mut scope = Scope::new();
        scope
            .define("l", Cell::List(List::from_cells([Cell::Integer(1)]).unwrap()))
            .unwrap();
        scope.define("l", Cell::List(List::new())).unwrap();

        let Some(Cell::List(list)) = scope.get("l") else {
            panic!("expected a list");
        };
        assert_eq!(list.element_type(), &CellType::Integer);
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_element_mismatch_is_rejected() {
        let mut scope = Scope::new();
        scope
            .define("l", Cell::List(List::from_cells([Cell::Integer(1)]).unwrap()))
            .unwrap();
        let texts = Cell::List(List::from_cells([Cell::text("a")]).unwrap());
        assert!(scope.define("l", texts).is_err());
    }

    #[test]
    fn test_remove() {
        let mut scope = Scope::new();
        scope.define("x", Cell::Boolean(true)).unwrap();
        assert_eq!(scope.remove("x"), Ok(Cell::Boolean(true)));
        assert_eq!(scope.remove("x"), Err(ScopeError::Undefined("x".to_string())));
    }
}
