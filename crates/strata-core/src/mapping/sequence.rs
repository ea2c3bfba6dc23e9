use super::MappingId;

/// Homogeneous ordered collection.
#[derive(Debug, Clone, Copy)]
pub struct ArrayMapping {
    pub element: MappingId,
}

/// Homogeneous collection deduplicated on read; rejects values that were
/// expected to be a set but arrive as a plain sequence mapping and vice
/// versa at the object layer.
#[derive(Debug, Clone, Copy)]
pub struct SetMapping {
    pub element: MappingId,
}

/// Fixed-arity heterogeneous sequence; length mismatches are errors.
#[derive(Debug, Clone)]
pub struct TupleMapping {
    pub elements: Vec<MappingId>,
}
