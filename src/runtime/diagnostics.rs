//! Numbered diagnostic catalog
//!
//! Every recoverable failure is reported exactly once through one of these
//! templates. The numbers are stable; embedders and tests match on
//! [`Diagnostic::code`] rather than on the message text.

/// One catalog entry with its arguments
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    #[error("Function {0}[] undefined")]
    UndefinedFunction(String),
    #[error("No matching parameter specification found for {0}[]")]
    NoMatchingOverload(String),
    #[error("Parameter \"{param}\" is not defined for {function}[]")]
    UnknownParameter { function: String, param: String },
    #[error("Parameter \"{param}\" of {function}[] bound more than once")]
    ParameterBoundTwice { function: String, param: String },
    #[error("Required parameter \"{param}\" missing in {function}[]")]
    MissingParameter { function: String, param: String },
    #[error("Arguments to {0}[] belong to different owning objects")]
    OwnerMismatch(String),
    #[error("Mismatched list lengths in listable call to {0}[]")]
    ListLengthMismatch(String),
    #[error("Cannot create a list of mixed types")]
    MixedListTypes,
    #[error("Cannot change the type of variable \"{0}\"")]
    TypeChange(String),
    #[error("Cannot assign to read-only variable \"{0}\"")]
    ReadOnlyAssign(String),
    #[error("Cannot insert undefined reference \"{0}\" into a list")]
    UndefinedListElement(String),
    #[error("UnAssign[] called on a non-reference value")]
    UnAssignNonReference,
    #[error("UnAssign[] called on undefined reference \"{0}\"")]
    UnAssignUndefined(String),
    #[error("Cannot remove read-only variable \"{0}\"")]
    ReadOnlyRemove(String),
    #[error("Cannot pass an undefined reference by reference to a function")]
    UndefinedByReference,
    #[error("New {0}[] parameters ambiguous with existing function")]
    AmbiguousOverload(String),
    #[error("Cannot pass an undefined reference to a function")]
    UndefinedByValue,
    #[error("Function {0}[] not found")]
    HelpNotFound(String),
}

impl Diagnostic {
    /// Stable catalog number
    pub fn code(&self) -> u32 {
        match self {
            Diagnostic::UndefinedFunction(_) => 25,
            Diagnostic::NoMatchingOverload(_) => 26,
            Diagnostic::UnknownParameter { .. } => 27,
            Diagnostic::ParameterBoundTwice { .. } => 28,
            Diagnostic::MissingParameter { .. } => 29,
            Diagnostic::OwnerMismatch(_) => 30,
            Diagnostic::ListLengthMismatch(_) => 31,
            Diagnostic::MixedListTypes => 35,
            Diagnostic::TypeChange(_) => 42,
            Diagnostic::ReadOnlyAssign(_) => 46,
            Diagnostic::UndefinedListElement(_) => 49,
            Diagnostic::UnAssignNonReference => 53,
            Diagnostic::UnAssignUndefined(_) => 54,
            Diagnostic::ReadOnlyRemove(_) => 55,
            Diagnostic::UndefinedByReference => 59,
            Diagnostic::AmbiguousOverload(_) => 60,
            Diagnostic::UndefinedByValue => 61,
            Diagnostic::HelpNotFound(_) => 62,
        }
    }

    /// The line written to the error stream, without the trailing newline
    pub fn render(&self) -> String {
        format!("GCL: {self}")
    }
}
