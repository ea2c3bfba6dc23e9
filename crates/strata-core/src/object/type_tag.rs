use std::rc::Rc;

/// The runtime type of an [`ObjectHandle`], used for discriminator dispatch
/// on write. Cheap to clone and compare.
///
/// [`ObjectHandle`]: super::ObjectHandle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeTag(Rc<str>);

impl TypeTag {
    pub fn new(name: impl AsRef<str>) -> Self {
        TypeTag(Rc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(src: &str) -> Self {
        TypeTag::new(src)
    }
}
