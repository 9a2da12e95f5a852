//! Function registry
//!
//! Every function name maps to one [`FunctionEntry`] holding its overloads
//! in registration order. Registration is append-only; an overload that
//! cannot be told apart from an existing one is rejected and the existing
//! one is kept.

use super::binder::Args;
use super::diagnostics::Diagnostic;
use super::executor::Machine;
use super::instruction::Instruction;
use super::signature::Signature;
use super::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A built-in resolver
///
/// Receives the machine (for re-entrant calls and stream access) and the
/// bound arguments in signature order. Rebinding a by-reference argument
/// goes through [`Args::set`].
pub type NativeFn = Rc<dyn Fn(&mut Machine, &mut Args) -> Cell>;

/// What runs when an overload is invoked
#[derive(Clone)]
pub enum Body {
    Native(NativeFn),
    /// A user-defined function's compiled body
    User(Rc<[Instruction]>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Native(_) => write!(f, "Native"),
            Body::User(body) => write!(f, "User({} instructions)", body.len()),
        }
    }
}

/// One concrete signature under a shared name
#[derive(Debug)]
pub struct Overload {
    pub signature: Signature,
    pub body: Body,
}

impl Overload {
    pub fn native(signature: Signature, resolver: NativeFn) -> Self {
        Overload {
            signature,
            body: Body::Native(resolver),
        }
    }

    pub fn user(signature: Signature, body: Vec<Instruction>) -> Self {
        Overload {
            signature,
            body: Body::User(body.into()),
        }
    }
}

/// All overloads sharing one name
#[derive(Debug, Default)]
pub struct FunctionEntry {
    overloads: Vec<Rc<Overload>>,
}

impl FunctionEntry {
    pub fn overloads(&self) -> &[Rc<Overload>] {
        &self.overloads
    }

    pub fn len(&self) -> usize {
        self.overloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overloads.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    functions: HashMap<String, FunctionEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            functions: HashMap::new(),
        }
    }

    /// Append an overload under its signature's name
    pub fn register(&mut self, overload: Overload) -> Result<(), Diagnostic> {
        let name = overload.signature.name.clone();
        let entry = self.functions.entry(name.clone()).or_default();

        if entry
            .overloads
            .iter()
            .any(|existing| existing.signature.is_ambiguous_with(&overload.signature))
        {
            tracing::warn!(function = %name, signature = %overload.signature, "rejected ambiguous overload");
            return Err(Diagnostic::AmbiguousOverload(name));
        }

        tracing::debug!(function = %name, signature = %overload.signature, "registered overload");
        entry.overloads.push(Rc::new(overload));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name).filter(|entry| !entry.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of function names with at least one overload
    pub fn len(&self) -> usize {
        self.functions.values().filter(|entry| !entry.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .functions
            .iter()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(description: &str) -> Overload {
        let signature = Signature::parse(description).unwrap();
        Overload::native(signature, Rc::new(|_, _| Cell::Boolean(true)))
    }

    #[test]
    fn test_register_overloads_in_order() {
        let mut registry = Registry::new();
        registry.register(native("F[x->INTEGER] =: INTEGER")).unwrap();
        registry.register(native("F[x->INTEGER, y->INTEGER] =: INTEGER")).unwrap();
        registry.register(native("F[x->TEXT] =: INTEGER")).unwrap();

        let entry = registry.get("F").unwrap();
        assert_eq!(entry.len(), 3);
        assert_eq!(entry.overloads()[1].signature.len(), 2);
        assert_eq!(registry.names(), vec!["F"]);
    }

    #[test]
    fn test_ambiguous_overload_is_rejected_and_existing_kept() {
        let mut registry = Registry::new();
        registry.register(native("F[x->NUMBER] =: INTEGER")).unwrap();

        let err = registry.register(native("F[y->INTEGER] =: TEXT")).unwrap_err();
        assert_eq!(err.code(), 60);

        let entry = registry.get("F").unwrap();
        assert_eq!(entry.len(), 1);
        assert_eq!(entry.overloads()[0].signature.params[0].name, "x");
    }

    #[test]
    fn test_unknown_name() {
        let registry = Registry::new();
        assert!(registry.get("Missing").is_none());
        assert!(registry.is_empty());
    }
}
