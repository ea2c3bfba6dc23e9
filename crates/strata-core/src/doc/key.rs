/// The hashable projection of an identifier [`Value`], used to key the
/// identity map and the coalescer queue.
///
/// [`Value`]: super::Value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdKey {
    String(String),
    I64(i64),
    Binary(Vec<u8>),
}

impl core::fmt::Display for IdKey {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            IdKey::String(v) => write!(f, "{v:?}"),
            IdKey::I64(v) => write!(f, "{v}"),
            IdKey::Binary(v) => write!(f, "binary({} bytes)", v.len()),
        }
    }
}
