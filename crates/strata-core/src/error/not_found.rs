/// A point lookup that matched no document.
#[derive(Debug)]
pub(super) struct NotFoundError {
    context: String,
}

impl NotFoundError {
    pub(super) fn new(context: String) -> Self {
        NotFoundError { context }
    }
}

impl std::error::Error for NotFoundError {}

impl core::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "document not found: {}", self.context)
    }
}
