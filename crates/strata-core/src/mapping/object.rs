use super::Property;
use crate::object::TypeTag;

/// The structural payload shared by embeddable, class and entity nodes:
/// a runtime type plus its declared properties.
#[derive(Debug)]
pub struct ObjectMapping {
    pub type_tag: TypeTag,
    pub properties: Vec<Property>,
}

impl ObjectMapping {
    pub fn new(type_tag: TypeTag) -> Self {
        ObjectMapping {
            type_tag,
            properties: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_by_field(&self, field: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.field == field)
    }
}
