/// Caller misuse detected before any store work is issued, e.g. persisting
/// a detached object. Raised synchronously, never batched.
#[derive(Debug)]
pub(super) struct PreconditionError {
    message: String,
}

impl PreconditionError {
    pub(super) fn new(message: String) -> Self {
        PreconditionError { message }
    }
}

impl std::error::Error for PreconditionError {}

impl core::fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}
