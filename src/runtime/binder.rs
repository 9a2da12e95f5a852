//! Progressive call binding
//!
//! A [`PendingCall`] is opened over every overload registered under a name.
//! Each bound argument narrows the set of viable overloads, so an argument
//! no overload can take is rejected as soon as it is bound rather than when
//! the call is finally invoked. Arguments already bound stay bound.

use super::cell::Cell;
use super::diagnostics::Diagnostic;
use super::registry::Overload;
use std::ops::Index;
use std::rc::Rc;

/// How an argument is handed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassMode {
    /// By reference if the parameter is declared by reference, else by value
    #[default]
    Auto,
    Value,
    Reference,
}

/// An argument as popped from the operand stack, after reference resolution
#[derive(Debug)]
pub struct Argument {
    /// The resolved value, or the `Reference` itself if the variable is unbound
    pub cell: Cell,
    /// Variable name when the operand was a reference
    pub variable: Option<String>,
}

impl Argument {
    pub fn value(cell: Cell) -> Self {
        Argument { cell, variable: None }
    }

    pub fn variable(name: impl Into<String>, cell: Cell) -> Self {
        Argument {
            cell,
            variable: Some(name.into()),
        }
    }

    fn is_unbound(&self) -> bool {
        self.cell.is_reference()
    }
}

/// Binding state for one call under construction
#[derive(Debug)]
pub struct PendingCall {
    name: String,
    overloads: Vec<Rc<Overload>>,
    /// Indices into `overloads`, kept in registration order
    viable: Vec<usize>,
    slots: Vec<Option<Argument>>,
    next: usize,
    failed: bool,
}

impl PendingCall {
    pub fn new(name: impl Into<String>, overloads: &[Rc<Overload>]) -> Self {
        let width = overloads.iter().map(|o| o.signature.len()).max().unwrap_or(0);
        PendingCall {
            name: name.into(),
            overloads: overloads.to_vec(),
            viable: (0..overloads.len()).collect(),
            slots: (0..width).map(|_| None).collect(),
            next: 0,
            failed: false,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Overloads that can still accept the arguments bound so far
    pub fn viable(&self) -> impl Iterator<Item = &Rc<Overload>> {
        self.viable.iter().map(|&i| &self.overloads[i])
    }

    /// Bind the next argument, positionally or to a named parameter
    ///
    /// On rejection the call is marked failed and the diagnostic to report
    /// is returned; earlier arguments are left bound.
    pub fn bind(&mut self, param: Option<&str>, argument: Argument, mode: PassMode) -> Result<(), Diagnostic> {
        let result = self.try_bind(param, argument, mode);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn try_bind(&mut self, param: Option<&str>, argument: Argument, mode: PassMode) -> Result<(), Diagnostic> {
        let position = match param {
            Some(param) => self
                .viable()
                .find_map(|o| o.signature.position(param))
                .ok_or_else(|| Diagnostic::UnknownParameter {
                    function: self.name.clone(),
                    param: param.to_string(),
                })?,
            None => self.next,
        };

        if let Some(Some(_)) = self.slots.get(position) {
            let param = param
                .map(str::to_string)
                .or_else(|| self.param_name(position))
                .unwrap_or_default();
            return Err(Diagnostic::ParameterBoundTwice {
                function: self.name.clone(),
                param,
            });
        }

        let overloads = &self.overloads;
        self.viable
            .retain(|&i| accepts(&overloads[i], position, param, &argument, mode));

        if self.viable.is_empty() {
            return Err(self.rejection(&argument, mode));
        }

        self.slots[position] = Some(argument);
        self.next = position + 1;
        Ok(())
    }

    fn rejection(&self, argument: &Argument, mode: PassMode) -> Diagnostic {
        if !argument.cell.is_valid() {
            return match mode {
                PassMode::Value => Diagnostic::UndefinedByValue,
                _ => Diagnostic::UndefinedByReference,
            };
        }
        if argument.is_unbound() {
            return match mode {
                PassMode::Reference => Diagnostic::UndefinedByReference,
                _ => Diagnostic::UndefinedByValue,
            };
        }
        Diagnostic::NoMatchingOverload(self.name.clone())
    }

    fn param_name(&self, position: usize) -> Option<String> {
        self.viable()
            .find_map(|o| o.signature.params.get(position))
            .map(|p| p.name.clone())
    }

    /// Select the overload to invoke and assemble its arguments
    ///
    /// The first viable overload (in registration order) whose required
    /// parameters are all bound wins. Unbound optional parameters take a
    /// value copy of their default.
    pub fn finish(mut self) -> Result<BoundCall, Diagnostic> {
        if self.failed {
            return Err(Diagnostic::NoMatchingOverload(self.name));
        }

        let slots = &self.slots;
        let chosen = self.viable.iter().copied().find(|&i| {
            self.overloads[i]
                .signature
                .params
                .iter()
                .enumerate()
                .all(|(pos, p)| !p.is_required() || slots[pos].is_some())
        });

        let Some(chosen) = chosen else {
            let missing = self.viable().next().and_then(|o| {
                o.signature
                    .params
                    .iter()
                    .enumerate()
                    .find(|(pos, p)| p.is_required() && self.slots[*pos].is_none())
                    .map(|(_, p)| p.name.clone())
            });
            return Err(match missing {
                Some(param) => Diagnostic::MissingParameter {
                    function: self.name,
                    param,
                },
                None => Diagnostic::NoMatchingOverload(self.name),
            });
        };

        let overload = Rc::clone(&self.overloads[chosen]);
        let mut cells = Vec::with_capacity(overload.signature.len());
        let mut variables = Vec::with_capacity(overload.signature.len());

        for (pos, param) in overload.signature.params.iter().enumerate() {
            match self.slots[pos].take() {
                Some(argument) if param.by_ref => {
                    cells.push(argument.cell);
                    variables.push(argument.variable);
                }
                Some(argument) => {
                    cells.push(argument.cell.value_copy());
                    variables.push(None);
                }
                None => {
                    let default = param
                        .default
                        .as_ref()
                        .map(Cell::value_copy)
                        .unwrap_or_else(|| Cell::Null(param.ty.clone()));
                    cells.push(default);
                    variables.push(None);
                }
            }
        }

        Ok(BoundCall {
            overload,
            args: Args::new(cells),
            variables,
        })
    }
}

fn accepts(overload: &Overload, position: usize, named: Option<&str>, argument: &Argument, mode: PassMode) -> bool {
    let signature = &overload.signature;
    let Some(param) = signature.params.get(position) else {
        return false;
    };
    if named.is_some_and(|name| name != param.name) || !argument.cell.is_valid() {
        return false;
    }
    match mode {
        PassMode::Value if param.by_ref => return false,
        PassMode::Reference if !param.by_ref => return false,
        _ => {}
    }

    if param.by_ref {
        // An unbound variable is created by the callee's write-back
        argument.is_unbound() || param.accepts(&argument.cell)
    } else {
        !argument.is_unbound()
            && (param.accepts(&argument.cell) || (signature.is_listable() && param.accepts_broadcast(&argument.cell)))
    }
}

/// A fully bound call, ready to invoke
#[derive(Debug)]
pub struct BoundCall {
    pub overload: Rc<Overload>,
    pub args: Args,
    /// Caller variable behind each by-reference argument, for write-back
    pub variables: Vec<Option<String>>,
}

/// Arguments in signature order, as seen by a resolver
#[derive(Debug)]
pub struct Args {
    cells: Vec<Cell>,
    rebound: Vec<bool>,
}

impl Args {
    pub fn new(cells: Vec<Cell>) -> Self {
        let rebound = vec![false; cells.len()];
        Args { cells, rebound }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Move an argument out, leaving an undetermined `Null` behind
    pub fn take(&mut self, index: usize) -> Option<Cell> {
        self.cells
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, Cell::Null(super::CellType::Undetermined)))
    }

    /// Rebind an argument; by-reference arguments are written back to the caller
    pub fn set(&mut self, index: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(index) {
            *slot = cell;
            self.rebound[index] = true;
        }
    }

    pub fn is_rebound(&self, index: usize) -> bool {
        self.rebound.get(index).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.cells.iter()
    }

    pub fn integer(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Cell::as_integer)
    }

    pub fn boolean(&self, index: usize) -> Option<bool> {
        self.get(index).and_then(Cell::as_bool)
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Cell::as_text)
    }
}

impl Index<usize> for Args {
    type Output = Cell;

    fn index(&self, index: usize) -> &Cell {
        &self.cells[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::signature::Signature;
    use rstest::rstest;

    fn overloads(descriptions: &[&str]) -> Vec<Rc<Overload>> {
        descriptions
            .iter()
            .map(|d| {
                let signature = Signature::parse(d).unwrap();
                Rc::new(Overload::native(signature, Rc::new(|_, _| Cell::Boolean(true))))
            })
            .collect()
    }

    #[test]
    fn test_arity_selects_overload() {
        let set = overloads(&["F[x->INTEGER] =: INTEGER", "F[x->INTEGER, y->INTEGER] =: INTEGER"]);

        let mut call = PendingCall::new("F", &set);
        call.bind(None, Argument::value(Cell::Integer(1)), PassMode::Auto).unwrap();
        call.bind(None, Argument::value(Cell::Integer(2)), PassMode::Auto).unwrap();
        let bound = call.finish().unwrap();
        assert_eq!(bound.overload.signature.len(), 2);

        let mut call = PendingCall::new("F", &set);
        call.bind(None, Argument::value(Cell::Integer(1)), PassMode::Auto).unwrap();
        let bound = call.finish().unwrap();
        assert_eq!(bound.overload.signature.len(), 1);
    }

    #[test]
    fn test_rejects_at_first_bad_argument() {
        let set = overloads(&["F[x->INTEGER, y->INTEGER] =: INTEGER"]);
        let mut call = PendingCall::new("F", &set);

        let err = call
            .bind(None, Argument::value(Cell::text("no")), PassMode::Auto)
            .unwrap_err();
        assert_eq!(err.code(), 26);
        assert!(call.is_failed());
        assert_eq!(call.viable().count(), 0);
        assert!(call.finish().is_err());
    }

    #[test]
    fn test_narrowing_by_type() {
        let set = overloads(&["F[x->INTEGER] =: INTEGER", "F[x->TEXT] =: TEXT"]);
        let mut call = PendingCall::new("F", &set);
        call.bind(None, Argument::value(Cell::text("a")), PassMode::Auto).unwrap();
        assert_eq!(call.viable().count(), 1);
        assert_eq!(call.finish().unwrap().overload.signature.returns, crate::runtime::CellType::Text);
    }

    #[test]
    fn test_missing_required_parameter() {
        let set = overloads(&["F[x->INTEGER, y->INTEGER] =: INTEGER"]);
        let mut call = PendingCall::new("F", &set);
        call.bind(None, Argument::value(Cell::Integer(1)), PassMode::Auto).unwrap();

        let err = call.finish().unwrap_err();
        assert_eq!(
            err,
            Diagnostic::MissingParameter {
                function: "F".to_string(),
                param: "y".to_string()
            }
        );
    }

    #[test]
    fn test_defaults_fill_unbound_optionals() {
        let set = overloads(&["F[x->INTEGER, {y->INTEGER = 10}, {z->TEXT = \"z\"}] =: INTEGER"]);
        let mut call = PendingCall::new("F", &set);
        call.bind(None, Argument::value(Cell::Integer(1)), PassMode::Auto).unwrap();
        call.bind(Some("z"), Argument::value(Cell::text("given")), PassMode::Auto).unwrap();

        let bound = call.finish().unwrap();
        assert_eq!(bound.args.get(1), Some(&Cell::Integer(10)));
        assert_eq!(bound.args.text(2), Some("given"));
    }

    #[rstest]
    #[case(Some("w"), 27)]
    #[case(Some("x"), 28)]
    #[case(None, 26)]
    fn test_named_binding_errors(#[case] param: Option<&str>, #[case] code: u32) {
        let set = overloads(&["F[x->INTEGER] =: INTEGER"]);
        let mut call = PendingCall::new("F", &set);
        call.bind(None, Argument::value(Cell::Integer(1)), PassMode::Auto).unwrap();

        let err = call
            .bind(param, Argument::value(Cell::Integer(2)), PassMode::Auto)
            .unwrap_err();
        assert_eq!(err.code(), code);
    }

    #[test]
    fn test_unbound_reference() {
        let set = overloads(&["F[x->INTEGER] =: INTEGER", "G[x<->ANY] =: ANY"]);

        let mut by_value = PendingCall::new("F", &set[..1]);
        let err = by_value
            .bind(None, Argument::variable("v", Cell::reference("v")), PassMode::Auto)
            .unwrap_err();
        assert_eq!(err.code(), 61);

        let mut by_ref = PendingCall::new("G", &set[1..]);
        by_ref
            .bind(None, Argument::variable("v", Cell::reference("v")), PassMode::Auto)
            .unwrap();
        let bound = by_ref.finish().unwrap();
        assert_eq!(bound.variables, vec![Some("v".to_string())]);
        assert!(bound.args[0].is_reference());
    }

    #[test]
    fn test_pass_mode_narrows() {
        let set = overloads(&["F[x<->INTEGER] =: INTEGER"]);
        let mut call = PendingCall::new("F", &set);
        let err = call
            .bind(None, Argument::variable("v", Cell::Integer(1)), PassMode::Value)
            .unwrap_err();
        assert_eq!(err.code(), 26);
    }

    #[test]
    fn test_listable_accepts_lists() {
        use crate::runtime::cell::List;

        let set = overloads(&["F[x->INTEGER] =: INTEGER"]);
        let list = || Cell::List(List::from_cells([Cell::Integer(1)]).unwrap());
        let mut call = PendingCall::new("F", &set);
        assert!(call.bind(None, Argument::value(list()), PassMode::Auto).is_err());

        let signature = Signature::parse("F[x->INTEGER] =: INTEGER")
            .unwrap()
            .flags(crate::runtime::signature::FuncFlags::LISTABLE);
        let set = vec![Rc::new(Overload::native(signature, Rc::new(|_, _| Cell::Boolean(true))))];
        let mut call = PendingCall::new("F", &set);
        call.bind(None, Argument::value(list()), PassMode::Auto).unwrap();
    }

    #[test]
    fn test_args_rebinding() {
        let mut args = Args::new(vec![Cell::Integer(1), Cell::Integer(2)]);
        assert!(!args.is_rebound(0));
        args.set(0, Cell::Integer(5));
        assert!(args.is_rebound(0));
        assert_eq!(args.take(0), Some(Cell::Integer(5)));
        assert_eq!(args.integer(1), Some(2));
        assert_eq!(args.take(9), None);
    }
}
