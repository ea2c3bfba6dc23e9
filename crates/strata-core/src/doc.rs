mod document;
pub use document::Document;

mod key;
pub use key::IdKey;

mod update;
pub use update::UpdateDoc;

mod value;
pub use value::Value;
