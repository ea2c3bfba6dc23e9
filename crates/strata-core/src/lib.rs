mod error;
pub use error::{Error, FieldError};

pub mod doc;
pub use doc::{Document, IdKey, UpdateDoc, Value};

pub mod object;
pub use object::{ObjectHandle, ObjectValue, TypeTag};

pub mod mapping;
pub use mapping::{Mapping, MappingId, Registry};

pub mod identity;
pub use identity::IdentityGenerator;

pub mod store;

/// A Result type alias that uses strata's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

pub use async_trait::async_trait;
