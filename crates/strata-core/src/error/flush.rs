/// A failed flush: the store reported different effect counts than were
/// queued, or an optimistic version no longer matched.
#[derive(Debug)]
pub(super) struct FlushError {
    message: String,
}

impl FlushError {
    pub(super) fn new(message: String) -> Self {
        FlushError { message }
    }
}

impl std::error::Error for FlushError {}

impl core::fmt::Display for FlushError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "flush failed: {}", self.message)
    }
}
