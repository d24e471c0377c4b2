use serde::{Deserialize, Serialize};

/// An ontology-typed entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Ontology class ID (e.g. E22_Human-Made_Object)
    pub class: String,
    /// Name or identifier of the entity instance
    pub name: String,
}

/// One directed fact in ontology mode: domain --property--> range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyTriplet {
    pub domain: Entity,
    pub property: String,
    pub range: Entity,
}

/// One directed fact in schema-free mode: bare strings throughout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTriplet {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}
