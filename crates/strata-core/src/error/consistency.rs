/// A conversion-level invariant violation: unknown discriminator value,
/// missing identifier, or an identifier the configured generator rejects.
#[derive(Debug)]
pub(super) struct ConsistencyError {
    message: String,
}

impl ConsistencyError {
    pub(super) fn new(message: String) -> Self {
        ConsistencyError { message }
    }
}

impl std::error::Error for ConsistencyError {}

impl core::fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}
