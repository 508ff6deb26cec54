use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

pub type EvoflowResult<T> = Result<T, EvoflowError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidConfig,
    InvalidParameter,
    Engine,
    RunTracking,
    Population,
    Operator,
    Evaluation,
    MemoryLost,
    Persistence,
    Gateway,
    Verification,
    ShapeMismatch,
    Cancelled,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

/// How a persistence failure should be treated by the retry layer.
/// `Transient` failures are retried with backoff; `Conflict` (unique key)
/// and `NotFound` are terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PersistenceKind {
    Transient,
    Conflict,
    NotFound,
}

impl PersistenceKind {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PersistenceKind::Transient)
    }
}

#[derive(Debug)]
pub enum EvoflowError {
    InvalidConfig {
        message: ErrString,
    },
    InvalidParameter {
        message: ErrString,
    },
    Engine {
        message: ErrString,
    },
    /// No active run or generation where one is required, or a resume
    /// request against a run without completed generations.
    RunTracking {
        message: ErrString,
    },
    /// Operations on an empty population, or the population fell below
    /// the viable floor after filtering and replenishment.
    Population {
        message: ErrString,
    },
    /// A genetic operator produced no usable config. Recoverable; the
    /// breeding slot yields no child.
    Operator {
        message: ErrString,
    },
    Evaluation {
        message: ErrString,
    },
    /// The memory-preservation invariant was violated: a parent node's
    /// memory key is reachable neither in the child node of the same id
    /// nor under the workflow-level `deleted_<node_id>` entry.
    MemoryLost {
        key: ErrString,
        node_id: ErrString,
    },
    Persistence {
        message: ErrString,
        kind: PersistenceKind,
    },
    Gateway {
        message: ErrString,
    },
    Verification {
        message: ErrString,
    },
    /// Fingerprint vectors of different lengths were compared.
    ShapeMismatch {
        expected: usize,
        actual: usize,
    },
    Cancelled,

    Context {
        context: ErrorContext,
        source: Box<EvoflowError>,
    },
}

impl EvoflowError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            Self::Engine { .. } => ErrorCode::Engine,
            Self::RunTracking { .. } => ErrorCode::RunTracking,
            Self::Population { .. } => ErrorCode::Population,
            Self::Operator { .. } => ErrorCode::Operator,
            Self::Evaluation { .. } => ErrorCode::Evaluation,
            Self::MemoryLost { .. } => ErrorCode::MemoryLost,
            Self::Persistence { .. } => ErrorCode::Persistence,
            Self::Gateway { .. } => ErrorCode::Gateway,
            Self::Verification { .. } => ErrorCode::Verification,
            Self::ShapeMismatch { .. } => ErrorCode::ShapeMismatch,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    /// The root code of an error, unwrapping any context layers.
    pub fn root_code(&self) -> ErrorCode {
        match self {
            Self::Context { source, .. } => source.root_code(),
            other => other.code(),
        }
    }

    pub fn memory_lost(key: impl Into<ErrString>, node_id: impl Into<ErrString>) -> Self {
        EvoflowError::MemoryLost {
            key: key.into(),
            node_id: node_id.into(),
        }
    }

    pub fn persistence(message: impl Into<ErrString>, kind: PersistenceKind) -> Self {
        EvoflowError::Persistence {
            message: message.into(),
            kind,
        }
    }

    /// Whether the retry layer may try the failed operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence { kind, .. } => !kind.is_terminal(),
            Self::Evaluation { .. } | Self::Gateway { .. } => true,
            Self::Context { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        EvoflowError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
        }
    }
}

impl Display for EvoflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { message } => write!(f, "Invalid configuration: {}", message),
            Self::InvalidParameter { message } => write!(f, "Invalid parameter: {}", message),
            Self::Engine { message } => write!(f, "Engine error: {}", message),
            Self::RunTracking { message } => write!(f, "Run tracking error: {}", message),
            Self::Population { message } => write!(f, "Population error: {}", message),
            Self::Operator { message } => write!(f, "Operator failure: {}", message),
            Self::Evaluation { message } => write!(f, "Evaluation error: {}", message),
            Self::MemoryLost { key, node_id } => {
                write!(f, "Memory lost: key '{}' from node '{}'", key, node_id)
            }
            Self::Persistence { message, kind } => {
                write!(f, "Persistence error ({:?}): {}", kind, message)
            }
            Self::Gateway { message } => write!(f, "Gateway error: {}", message),
            Self::Verification { message } => write!(f, "Verification error: {}", message),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "Shape mismatch: expected {}, got {}", expected, actual)
            }
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for EvoflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

// Ergonomic Result extensions (context)
pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> EvoflowResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> EvoflowResult<T>;
}

impl<T, E: Into<EvoflowError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> EvoflowResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> EvoflowResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

// Macros: err, bail, ensure
#[doc(hidden)]
pub mod __private {
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use<E>(e: E) -> E {
        e
    }
}

#[macro_export]
macro_rules! evoflow_err {
    (ShapeMismatch: $expected:expr, $actual:expr $(,)?) => {
        $crate::__private::must_use($crate::EvoflowError::ShapeMismatch {
            expected: $expected,
            actual: $actual,
        })
    };
    (Cancelled) => {
        $crate::__private::must_use($crate::EvoflowError::Cancelled)
    };
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::EvoflowError::$variant {
            message: format!($fmt, $($arg),*).into(),
        })
    };
}

#[macro_export]
macro_rules! evoflow_bail {
    ($($tt:tt)+) => { return Err($crate::evoflow_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::evoflow_bail!($($tt)+); }
    };
}
