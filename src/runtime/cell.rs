//! Runtime value representation
//!
//! A [`Cell`] is the machine's unit of data. Cells are move-only: there is no
//! `Clone`. Duplicating a cell is always an explicit choice between
//!
//! - [`Cell::value_copy`]: fresh, independent storage (deep for lists), and
//! - [`Cell::reference_copy`]: cheap, shares the original's text/list storage.
//!
//! Shared storage is never written through. List mutation goes through
//! `Rc::make_mut`, so a holder of a reference copy that modifies its list
//! detaches first and the original is left untouched.

use super::rational::Rational;
use std::fmt;
use std::rc::Rc;

/// Type tag of a cell, list element or signature parameter
///
/// `Undetermined`, `Any` and `Number` never describe a single cell: they are
/// the element tag of an empty list, the wildcard parameter type, and the
/// element tag of a list mixing related numeric types respectively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellType {
    Undetermined,
    Any,
    Number,
    Boolean,
    Integer,
    Float,
    Rational,
    Text,
    List(Box<CellType>),
    Reference,
    /// Domain object handle, tagged with the domain type name
    Handle(String),
    Error,
    Null,
    Input,
    Output,
}

impl CellType {
    pub fn list_of(element: CellType) -> Self {
        CellType::List(Box::new(element))
    }

    /// Integer, Float, Rational, or the mixed-numeric tag
    pub fn is_numeric(&self) -> bool {
        matches!(self, CellType::Integer | CellType::Float | CellType::Rational | CellType::Number)
    }

    /// Whether a parameter declared with this type accepts a value of type `actual`
    pub fn accepts(&self, actual: &CellType) -> bool {
        match (self, actual) {
            (CellType::Any, _) => true,
            (CellType::Number, t) => t.is_numeric(),
            (CellType::List(want), CellType::List(have)) => **have == CellType::Undetermined || want.accepts(have),
            (want, have) => want == have,
        }
    }

    /// Whether some value could be accepted by both types
    pub fn overlaps(&self, other: &CellType) -> bool {
        match (self, other) {
            (CellType::List(a), CellType::List(b)) => a.overlaps(b),
            (a, b) => a.accepts(b) || b.accepts(a),
        }
    }

    /// Merge two list element tags, `None` if they cannot share a list
    pub fn unify(&self, other: &CellType) -> Option<CellType> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (CellType::Undetermined, b) => Some(b.clone()),
            (a, CellType::Undetermined) => Some(a.clone()),
            (a, b) if a.is_numeric() && b.is_numeric() => Some(CellType::Number),
            (CellType::List(a), CellType::List(b)) => a.unify(b).map(CellType::list_of),
            _ => None,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellType::Undetermined => write!(f, "UNDETERMINED"),
            CellType::Any => write!(f, "ANY"),
            CellType::Number => write!(f, "NUMBER"),
            CellType::Boolean => write!(f, "BOOLEAN"),
            CellType::Integer => write!(f, "INTEGER"),
            CellType::Float => write!(f, "FLOAT"),
            CellType::Rational => write!(f, "RATIONAL"),
            CellType::Text => write!(f, "TEXT"),
            CellType::List(element) => write!(f, "LIST({element})"),
            CellType::Reference => write!(f, "REFERENCE"),
            CellType::Handle(name) => write!(f, "{name}"),
            CellType::Error => write!(f, "ERROR"),
            CellType::Null => write!(f, "NULL"),
            CellType::Input => write!(f, "INPUT"),
            CellType::Output => write!(f, "OUTPUT"),
        }
    }
}

/// An object owned by a domain library and exposed to scripts through a handle
///
/// The machine never destroys domain objects. A library that destroys one
/// reports it through `is_valid`; bindings to it are dropped lazily, the
/// next time they are read.
pub trait DomainObject: fmt::Debug {
    /// Type tag used for signature matching, e.g. `NFG`
    fn type_name(&self) -> &str;

    fn is_valid(&self) -> bool {
        true
    }

    /// Identity of the object this one belongs to (e.g. its game)
    fn owner(&self) -> Option<u64> {
        None
    }

    fn render(&self) -> String {
        format!("({})", self.type_name())
    }
}

/// Shared handle onto a [`DomainObject`]
#[derive(Debug, Clone)]
pub struct Handle(Rc<dyn DomainObject>);

impl Handle {
    pub fn new(object: Rc<dyn DomainObject>) -> Self {
        Handle(object)
    }

    pub fn object(&self) -> &dyn DomainObject {
        self.0.as_ref()
    }

    /// Whether both handles denote the same domain object
    pub fn same_object(&self, other: &Handle) -> bool {
        std::ptr::eq(Rc::as_ptr(&self.0) as *const (), Rc::as_ptr(&other.0) as *const ())
    }
}

/// The ambient streams behind the protected names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamHandle {
    Input,
    Output,
    /// Output sink that discards everything written to it
    Discard,
}

/// Why a list refused an element
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ListError {
    #[error("cannot insert undefined reference \"{0}\" into a list")]
    UnresolvedReference(String),
    #[error("cannot insert {found} into a list of {expected}")]
    MixedTypes { expected: CellType, found: CellType },
    #[error("list index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// List storage; cloning it (only ever done by `Rc::make_mut`) reference-copies the elements
#[derive(Debug, Default)]
struct Items(Vec<Cell>);

impl Clone for Items {
    fn clone(&self) -> Self {
        Items(self.0.iter().map(Cell::reference_copy).collect())
    }
}

/// Homogeneous list of cells
///
/// All elements share one element tag. An empty list starts `Undetermined`
/// and adopts the tag of its first element; related numeric tags merge into
/// `Number`.
#[derive(Debug)]
pub struct List {
    element: CellType,
    items: Rc<Items>,
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl List {
    pub fn new() -> Self {
        Self::with_element_type(CellType::Undetermined)
    }

    pub fn with_element_type(element: CellType) -> Self {
        List {
            element,
            items: Rc::new(Items::default()),
        }
    }

    /// Build a list from cells, stopping at the first rejected element
    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> Result<Self, ListError> {
        let mut list = List::new();
        for cell in cells {
            list.push(cell)?;
        }
        Ok(list)
    }

    pub fn element_type(&self) -> &CellType {
        &self.element
    }

    /// Give an undetermined list a concrete element tag; determined lists keep theirs
    pub fn adopt_element_type(&mut self, element: CellType) -> bool {
        if self.element != CellType::Undetermined {
            return false;
        }
        self.element = element;
        true
    }

    pub fn len(&self) -> usize {
        self.items.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.items.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.items.0.iter()
    }

    pub fn push(&mut self, cell: Cell) -> Result<(), ListError> {
        let index = self.len();
        self.insert(index, cell)
    }

    /// Insert at `index` (0-based), enforcing the element tag
    pub fn insert(&mut self, index: usize, cell: Cell) -> Result<(), ListError> {
        if let Cell::Reference(name) = &cell {
            return Err(ListError::UnresolvedReference(name.clone()));
        }
        if index > self.len() {
            return Err(ListError::IndexOutOfBounds { index, len: self.len() });
        }
        let found = cell.cell_type();
        let merged = self.element.unify(&found).ok_or_else(|| ListError::MixedTypes {
            expected: self.element.clone(),
            found,
        })?;

        self.element = merged;
        Rc::make_mut(&mut self.items).0.insert(index, cell);
        Ok(())
    }

    fn value_copy(&self) -> Self {
        List {
            element: self.element.clone(),
            items: Rc::new(Items(self.items.0.iter().map(Cell::value_copy).collect())),
        }
    }

    fn reference_copy(&self) -> Self {
        List {
            element: self.element.clone(),
            items: Rc::clone(&self.items),
        }
    }
}

/// A tagged runtime value
#[derive(Debug)]
pub enum Cell {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Rational(Rational),
    Text(Rc<str>),
    List(List),
    /// Unresolved variable name
    Reference(String),
    Handle(Handle),
    Error(Rc<str>),
    /// Typed placeholder for "no object of this type"
    Null(CellType),
    Stream(StreamHandle),
}

impl Cell {
    pub fn text(text: &str) -> Self {
        Cell::Text(Rc::from(text))
    }

    pub fn error(message: impl AsRef<str>) -> Self {
        Cell::Error(Rc::from(message.as_ref()))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Cell::Reference(name.into())
    }

    pub fn handle(object: Rc<dyn DomainObject>) -> Self {
        Cell::Handle(Handle::new(object))
    }

    /// Type tag of this cell
    pub fn cell_type(&self) -> CellType {
        match self {
            Cell::Boolean(_) => CellType::Boolean,
            Cell::Integer(_) => CellType::Integer,
            Cell::Float(_) => CellType::Float,
            Cell::Rational(_) => CellType::Rational,
            Cell::Text(_) => CellType::Text,
            Cell::List(list) => CellType::list_of(list.element.clone()),
            Cell::Reference(_) => CellType::Reference,
            Cell::Handle(handle) => CellType::Handle(handle.object().type_name().to_string()),
            Cell::Error(_) => CellType::Error,
            Cell::Null(_) => CellType::Null,
            Cell::Stream(StreamHandle::Input) => CellType::Input,
            Cell::Stream(StreamHandle::Output | StreamHandle::Discard) => CellType::Output,
        }
    }

    /// Independent copy with its own storage, recursive for lists
    pub fn value_copy(&self) -> Cell {
        match self {
            Cell::Boolean(b) => Cell::Boolean(*b),
            Cell::Integer(i) => Cell::Integer(*i),
            Cell::Float(x) => Cell::Float(*x),
            Cell::Rational(q) => Cell::Rational(*q),
            Cell::Text(text) => Cell::Text(Rc::from(&**text)),
            Cell::List(list) => Cell::List(list.value_copy()),
            Cell::Reference(name) => Cell::Reference(name.clone()),
            // Domain objects belong to their library; a copy is another handle
            Cell::Handle(handle) => Cell::Handle(handle.clone()),
            Cell::Error(message) => Cell::Error(Rc::from(&**message)),
            Cell::Null(t) => Cell::Null(t.clone()),
            Cell::Stream(stream) => Cell::Stream(*stream),
        }
    }

    /// Cheap copy that may alias this cell's storage
    pub fn reference_copy(&self) -> Cell {
        match self {
            Cell::Text(text) => Cell::Text(Rc::clone(text)),
            Cell::List(list) => Cell::List(list.reference_copy()),
            Cell::Error(message) => Cell::Error(Rc::clone(message)),
            other => other.value_copy(),
        }
    }

    /// Whether the two cells alias the same text or list storage
    pub fn shares_storage(&self, other: &Cell) -> bool {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) | (Cell::Error(a), Cell::Error(b)) => Rc::ptr_eq(a, b),
            (Cell::List(a), Cell::List(b)) => Rc::ptr_eq(&a.items, &b.items),
            _ => false,
        }
    }

    /// False once the underlying domain object has been destroyed
    pub fn is_valid(&self) -> bool {
        match self {
            Cell::Handle(handle) => handle.object().is_valid(),
            _ => true,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Cell::Error(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Cell::Reference(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Cell::List(list) => Some(list),
            _ => None,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Boolean(a), Cell::Boolean(b)) => a == b,
            (Cell::Integer(a), Cell::Integer(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => a == b,
            (Cell::Rational(a), Cell::Rational(b)) => a == b,
            (Cell::Text(a), Cell::Text(b)) | (Cell::Error(a), Cell::Error(b)) => a == b,
            (Cell::List(a), Cell::List(b)) => a.element == b.element && a.iter().eq(b.iter()),
            (Cell::Reference(a), Cell::Reference(b)) => a == b,
            (Cell::Handle(a), Cell::Handle(b)) => a.same_object(b),
            (Cell::Null(a), Cell::Null(b)) => a == b,
            (Cell::Stream(a), Cell::Stream(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Boolean(b)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Integer(i)
    }
}

impl From<f64> for Cell {
    fn from(x: f64) -> Self {
        Cell::Float(x)
    }
}

impl From<Rational> for Cell {
    fn from(q: Rational) -> Self {
        Cell::Rational(q)
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::text(text)
    }
}

impl From<List> for Cell {
    fn from(list: List) -> Self {
        Cell::List(list)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Boolean(true) => write!(f, "True"),
            Cell::Boolean(false) => write!(f, "False"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Float(x) => write!(f, "{x:?}"),
            Cell::Rational(q) => write!(f, "{q}"),
            Cell::Text(text) => write!(f, "\"{text}\""),
            Cell::List(list) => {
                if list.is_empty() {
                    return write!(f, "{{ }}");
                }
                write!(f, "{{ ")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, " }}")
            }
            Cell::Reference(name) => write!(f, "{name}"),
            Cell::Handle(handle) => write!(f, "{}", handle.object().render()),
            Cell::Error(message) => write!(f, "{message}"),
            Cell::Null(_) => write!(f, "Null"),
            Cell::Stream(StreamHandle::Input) => write!(f, "Input"),
            Cell::Stream(StreamHandle::Output) => write!(f, "Output"),
            Cell::Stream(StreamHandle::Discard) => write!(f, "Null"),
        }
    }
}
