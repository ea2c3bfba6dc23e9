mod handle;
pub use handle::{ChangeObserver, HandleKey, ObjectData, ObjectHandle};

mod type_tag;
pub use type_tag::TypeTag;

mod value;
pub use value::ObjectValue;

mod reference;
pub use reference::Reference;
