mod adhoc;
mod consistency;
mod flush;
mod not_found;
mod precondition;
mod validation;

use adhoc::AdhocError;
use consistency::ConsistencyError;
use flush::FlushError;
use not_found::NotFoundError;
use precondition::PreconditionError;
use validation::ValidationError;

pub use validation::FieldError;

use std::sync::Arc;

/// Creates an [`Error`] from format arguments.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::from_args(format_args!($($arg)*))
    };
}

/// Returns early with an [`Error`] built from format arguments.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::from_args(format_args!($($arg)*)))
    };
}

/// An error that can occur in strata.
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

#[derive(Debug)]
enum ErrorKind {
    Anyhow(anyhow::Error),
    Adhoc(AdhocError),
    /// Path-tagged conversion errors, aggregated over one read/write pass.
    Validation(ValidationError),
    /// Unknown discriminator, missing or invalid identifier.
    Consistency(ConsistencyError),
    /// Bulk count mismatch or optimistic-version conflict; fatal for the
    /// whole flush.
    Flush(FlushError),
    /// A point lookup found no document.
    NotFound(NotFoundError),
    /// Caller misuse, e.g. persisting a detached object.
    Precondition(PreconditionError),
    Unknown,
}

impl Error {
    pub fn from_args(args: core::fmt::Arguments<'_>) -> Self {
        Self::from(ErrorKind::Adhoc(AdhocError::new(args)))
    }

    /// Aggregates the field errors collected during one conversion pass.
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::from(ErrorKind::Validation(ValidationError::new(errors)))
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::from(ErrorKind::Consistency(ConsistencyError::new(
            message.into(),
        )))
    }

    pub fn flush(message: impl Into<String>) -> Self {
        Self::from(ErrorKind::Flush(FlushError::new(message.into())))
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Self::from(ErrorKind::NotFound(NotFoundError::new(context.into())))
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::from(ErrorKind::Precondition(PreconditionError::new(
            message.into(),
        )))
    }

    /// Adds context to this error.
    ///
    /// Context is displayed in reverse order: the most recently added context
    /// is shown first, ending with the root cause.
    #[inline(always)]
    pub fn context(self, consequent: Error) -> Error {
        self.context_impl(consequent)
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let mut err = consequent;
        if err.inner.is_none() {
            err = Error::from(ErrorKind::Unknown);
        }
        let inner = err.inner.as_mut().unwrap();
        assert!(
            inner.cause.is_none(),
            "consequent error must not already have a cause"
        );
        Arc::get_mut(inner).unwrap().cause = Some(self);
        err
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation(_))
    }

    pub fn is_consistency(&self) -> bool {
        matches!(self.kind(), ErrorKind::Consistency(_))
    }

    pub fn is_flush(&self) -> bool {
        matches!(self.kind(), ErrorKind::Flush(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound(_))
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self.kind(), ErrorKind::Precondition(_))
    }

    /// The aggregated field errors, if this is a validation error.
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self.kind() {
            ErrorKind::Validation(err) => Some(err.errors()),
            _ => None,
        }
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            Validation(err) => core::fmt::Display::fmt(err, f),
            Consistency(err) => core::fmt::Display::fmt(err, f),
            Flush(err) => core::fmt::Display::fmt(err, f),
            NotFound(err) => core::fmt::Display::fmt(err, f),
            Precondition(err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown strata error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}
