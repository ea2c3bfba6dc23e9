//! The session layer: unit-of-work sessions over the `strata-core` mapping
//! tree, with batched flushes and identifier-coalesced point lookups.

mod coalescer;
pub use coalescer::Coalescer;

mod persister;
pub use persister::Persister;

mod session;
pub use session::{ObjectState, Session};

pub use strata_core::{
    self as core, doc, document, mapping, object, store, Error, Result,
};
