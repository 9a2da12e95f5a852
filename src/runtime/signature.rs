//! Function signatures and their text descriptions
//!
//! Built-in libraries describe each overload with one line:
//!
//! ```text
//! Name[p->TYPE, q<->TYPE*, {r->TYPE = literal}] =: RETURN
//! ```
//!
//! - `->` passes by value, `<->` by reference (callee rebinding is written
//!   back to the caller's variable);
//! - a trailing `*` lets the parameter accept a `Null` of its type;
//! - braces mark an optional parameter, which must carry a literal default.
//!
//! Types are `BOOLEAN INTEGER FLOAT RATIONAL NUMBER TEXT ANY INPUT OUTPUT
//! ERROR LIST(T)`; any other upper-case identifier names a domain handle type.

use super::cell::{Cell, CellType, List};
use super::limits::MAX_SIGNATURE_PARAMS;
use super::rational::Rational;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\[(.*)\]\s*=:\s*(\S+)\s*$").expect("signature header pattern")
});

static PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*(<->|->)\s*([A-Za-z_][A-Za-z0-9_()]*)\s*(\*)?\s*(?:=\s*(.+))?$")
        .expect("parameter pattern")
});

static HANDLE_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("handle type pattern"));

bitflags::bitflags! {
    /// Behaviours the engine applies generically around an overload
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FuncFlags: u8 {
        /// Broadcast element-wise over list arguments the parameter does not accept directly
        const LISTABLE = 0b01;
        /// All domain-handle arguments must belong to the same owning object
        const MATCH_OWNER = 0b10;
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature: {0}")]
    Malformed(String),
    #[error("malformed parameter: {0}")]
    MalformedParameter(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("invalid default for parameter \"{param}\": {text}")]
    InvalidDefault { param: String, text: String },
    #[error("default for parameter \"{0}\" does not match its type")]
    DefaultTypeMismatch(String),
    #[error("optional parameter \"{0}\" needs a default")]
    MissingDefault(String),
    #[error("required parameter \"{0}\" cannot have a default")]
    DefaultOnRequired(String),
    #[error("parameter \"{0}\" declared twice")]
    DuplicateParameter(String),
    #[error("too many parameters: {0}")]
    TooManyParams(usize),
}

/// One formal parameter
#[derive(Debug)]
pub struct Param {
    pub name: String,
    pub ty: CellType,
    /// Present exactly when the parameter is optional
    pub default: Option<Cell>,
    pub by_ref: bool,
    pub nullable: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: CellType) -> Self {
        Param {
            name: name.into(),
            ty,
            default: None,
            by_ref: false,
            nullable: false,
        }
    }

    pub fn by_reference(mut self) -> Self {
        self.by_ref = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: Cell) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Whether a bound argument matches this parameter directly
    pub fn accepts(&self, cell: &Cell) -> bool {
        match cell {
            Cell::Null(placeholder) if self.nullable => self.ty.accepts(placeholder),
            _ => self.ty.accepts(&cell.cell_type()),
        }
    }

    /// Whether the argument matches directly or through element-wise broadcast
    pub fn accepts_broadcast(&self, cell: &Cell) -> bool {
        self.accepts(cell) || accepts_elements(&self.ty, &cell.cell_type())
    }
}

fn accepts_elements(ty: &CellType, actual: &CellType) -> bool {
    match actual {
        CellType::List(element) => {
            **element == CellType::Undetermined || ty.accepts(element) || accepts_elements(ty, element)
        }
        _ => false,
    }
}

/// One overload's parameter list, return type and flags
#[derive(Debug)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: CellType,
    pub flags: FuncFlags,
}

impl Signature {
    pub fn new(name: impl Into<String>, returns: CellType) -> Self {
        Signature {
            name: name.into(),
            params: Vec::new(),
            returns,
            flags: FuncFlags::empty(),
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn flags(mut self, flags: FuncFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Parse a signature description such as `Plus[x->NUMBER, y->NUMBER] =: NUMBER`
    pub fn parse(description: &str) -> Result<Self, SignatureError> {
        let caps = HEADER
            .captures(description)
            .ok_or_else(|| SignatureError::Malformed(description.to_string()))?;

        let mut signature = Signature::new(&caps[1], parse_type(&caps[3])?);
        for text in split_params(&caps[2])? {
            let param = parse_param(&text)?;
            if signature.params.iter().any(|p| p.name == param.name) {
                return Err(SignatureError::DuplicateParameter(param.name));
            }
            signature.params.push(param);
        }
        if signature.params.len() > MAX_SIGNATURE_PARAMS {
            return Err(SignatureError::TooManyParams(signature.params.len()));
        }
        Ok(signature)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_required()).count()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn is_listable(&self) -> bool {
        self.flags.contains(FuncFlags::LISTABLE)
    }

    /// Whether some positional call could match both signatures
    ///
    /// The smallest argument count both accept is checked; if every position
    /// up to it could take the same value, the overloads cannot be told apart.
    pub fn is_ambiguous_with(&self, other: &Signature) -> bool {
        let lo = self.required_count().max(other.required_count());
        let hi = self.len().min(other.len());
        if lo > hi {
            return false;
        }
        self.params[..lo]
            .iter()
            .zip(&other.params[..lo])
            .all(|(a, b)| a.ty.overlaps(&b.ty))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let arrow = if param.by_ref { "<->" } else { "->" };
            let star = if param.nullable { "*" } else { "" };
            match &param.default {
                Some(default) => write!(f, "{{{}{arrow}{}{star} = {default}}}", param.name, param.ty)?,
                None => write!(f, "{}{arrow}{}{star}", param.name, param.ty)?,
            }
        }
        write!(f, "] =: {}", self.returns)
    }
}

/// Parse a type name such as `INTEGER` or `LIST(LIST(NUMBER))`
pub fn parse_type(text: &str) -> Result<CellType, SignatureError> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("LIST(").and_then(|rest| rest.strip_suffix(')')) {
        return Ok(CellType::list_of(parse_type(inner)?));
    }
    Ok(match text {
        "BOOLEAN" => CellType::Boolean,
        "INTEGER" => CellType::Integer,
        "FLOAT" => CellType::Float,
        "RATIONAL" => CellType::Rational,
        "NUMBER" => CellType::Number,
        "TEXT" => CellType::Text,
        "ANY" => CellType::Any,
        "INPUT" => CellType::Input,
        "OUTPUT" => CellType::Output,
        "ERROR" => CellType::Error,
        other if HANDLE_TYPE.is_match(other) => CellType::Handle(other.to_string()),
        other => return Err(SignatureError::UnknownType(other.to_string())),
    })
}

/// Parse a literal as written in a default or read from an input stream
///
/// Accepts `True`, `False`, `Null`, integers, `n/d` rationals, floats,
/// double-quoted text and `{}`.
pub fn parse_literal(text: &str) -> Option<Cell> {
    let text = text.trim();
    match text {
        "True" => return Some(Cell::Boolean(true)),
        "False" => return Some(Cell::Boolean(false)),
        "Null" => return Some(Cell::Null(CellType::Undetermined)),
        "{}" => return Some(Cell::List(List::new())),
        _ => {}
    }
    if let Some(inner) = text.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        return Some(Cell::text(inner));
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Cell::Integer(i));
    }
    if let Some((num, den)) = text.split_once('/') {
        let num = num.trim().parse::<i64>().ok()?;
        let den = den.trim().parse::<i64>().ok()?;
        return Rational::new(num, den).map(Cell::Rational);
    }
    text.parse::<f64>().ok().map(Cell::Float)
}

fn parse_param(text: &str) -> Result<Param, SignatureError> {
    let trimmed = text.trim();
    let (body, optional) = match trimmed.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
        Some(inner) => (inner.trim(), true),
        None => (trimmed, false),
    };
    let caps = PARAM
        .captures(body)
        .ok_or_else(|| SignatureError::MalformedParameter(trimmed.to_string()))?;

    let name = caps[1].to_string();
    let mut param = Param::new(name.clone(), parse_type(&caps[3])?);
    if &caps[2] == "<->" {
        param = param.by_reference();
    }
    if caps.get(4).is_some() {
        param = param.nullable();
    }

    match (caps.get(5), optional) {
        (Some(default), true) => {
            let cell = parse_default(&param, default.as_str())?;
            Ok(param.with_default(cell))
        }
        (None, true) => Err(SignatureError::MissingDefault(name)),
        (Some(_), false) => Err(SignatureError::DefaultOnRequired(name)),
        (None, false) => Ok(param),
    }
}

fn parse_default(param: &Param, text: &str) -> Result<Cell, SignatureError> {
    let invalid = || SignatureError::InvalidDefault {
        param: param.name.clone(),
        text: text.to_string(),
    };
    let cell = match parse_literal(text).ok_or_else(invalid)? {
        // A bare Null takes the parameter's type as its placeholder
        Cell::Null(_) => Cell::Null(param.ty.clone()),
        Cell::List(mut list) => {
            if let CellType::List(element) = &param.ty {
                list.adopt_element_type((**element).clone());
            }
            Cell::List(list)
        }
        // Integer literals are fine for float and rational parameters
        Cell::Integer(i) if param.ty == CellType::Float => Cell::Float(i as f64),
        Cell::Integer(i) if param.ty == CellType::Rational => Cell::Rational(Rational::integer(i)),
        other => other,
    };
    if param.accepts(&cell) || matches!(cell, Cell::Null(_)) {
        Ok(cell)
    } else {
        Err(SignatureError::DefaultTypeMismatch(param.name.clone()))
    }
}

/// Split on commas that are outside quotes, parentheses and braces
fn split_params(text: &str) -> Result<Vec<String>, SignatureError> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_text = false;

    for ch in text.chars() {
        match ch {
            '"' => in_text = !in_text,
            '(' | '{' if !in_text => depth += 1,
            ')' | '}' if !in_text => depth -= 1,
            ',' if !in_text && depth == 0 => {
                params.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if depth != 0 || in_text {
        return Err(SignatureError::Malformed(text.to_string()));
    }
    if !current.trim().is_empty() || !params.is_empty() {
        params.push(current);
    }
    if params.iter().any(|p| p.trim().is_empty()) {
        return Err(SignatureError::Malformed(text.to_string()));
    }
    Ok(params)
}
