/// A single conversion failure, tagged with the dotted path of the field
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl core::fmt::Display for FieldError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// All field errors collected over one read/write pass.
#[derive(Debug)]
pub(super) struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub(super) fn new(errors: Vec<FieldError>) -> Self {
        ValidationError { errors }
    }

    pub(super) fn errors(&self) -> &[FieldError] {
        &self.errors
    }
}

impl std::error::Error for ValidationError {}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("validation failed: ")?;
        let mut it = self.errors.iter().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err, f)?;
            if it.peek().is_some() {
                f.write_str("; ")?;
            }
        }
        Ok(())
    }
}
