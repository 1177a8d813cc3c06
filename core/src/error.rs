use thiserror::Error;

/// Errors raised while marshaling host values or dispatching script operations.
///
/// Every native-call boundary returns one of these; the VM turns it into a
/// script-visible error carrying the `Display` text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The host value's kind has no VM representation.
    #[error("unsupported value type: {ty} ({kind})")]
    UnsupportedKind { kind: &'static str, ty: String },

    /// A deliberately deferred conversion (tables to composite host types).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("{expected} expected, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("cannot convert {from} to {to}")]
    Conversion { from: String, to: String },

    #[error("wrong number of arguments: got {got}, expected {expected}{}", arity_suffix(.variadic))]
    ArityMismatch { got: usize, expected: usize, variadic: bool },

    #[error("field {0:?} missing")]
    FieldNotFound(String),

    #[error("can't set field {0:?}")]
    FieldNotSettable(String),

    #[error("no hint provided for table conversion")]
    MissingHint,

    #[error("unable to convert {0} value to a host value")]
    UnsupportedValue(&'static str),

    #[error("failed to increase stack size")]
    StackOverflow,

    /// Abrupt failure inside a boundary, normalized to a regular error.
    #[error("{0}")]
    Internal(String),

    /// Failure raised by the VM itself rather than by the bindings.
    #[error("{0}")]
    Runtime(String),
}

fn arity_suffix(variadic: &bool) -> &'static str {
    if *variadic { " or more" } else { "" }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub(crate) fn conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Error::Conversion {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Map a host closure error back into the taxonomy.
    ///
    /// Errors that already carry a typed `Error` pass through; anything else
    /// becomes `Internal` with the original message.
    pub fn from_host(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(typed) => typed,
            Err(other) => Error::Internal(format!("{:#}", other)),
        }
    }
}
