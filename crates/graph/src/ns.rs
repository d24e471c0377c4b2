use serde::{Deserialize, Serialize};

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

/// Classification predicates are kept out of BFS traversal and QA context.
pub fn is_type_or_label(predicate: &str) -> bool {
    predicate == RDF_TYPE || predicate == RDFS_LABEL
}

/// URI prefixes for graph terms: `base` for entity instances (and every
/// term of a schema-free triplet), `ontology` for classes and properties.
/// Loaded once at startup and passed by reference thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespaces {
    pub base: String,
    pub ontology: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            base: "http://example.org/kg#".to_string(),
            ontology: "http://example.org/ontology/".to_string(),
        }
    }
}

impl Namespaces {
    /// Instance URI: base prefix + name with spaces replaced by underscores.
    pub fn instance_uri(&self, name: &str) -> String {
        format!("{}{}", self.base, name.replace(' ', "_"))
    }

    /// Class or property URI under the ontology prefix.
    pub fn ontology_uri(&self, id: &str) -> String {
        format!("{}{}", self.ontology, id)
    }

    /// Human-readable local name: strip the prefix, underscores back to
    /// spaces. Falls back to the last `#`/`/` segment for foreign URIs.
    pub fn local_name(&self, uri: &str) -> String {
        if let Some(local) = uri.strip_prefix(&self.base) {
            return local.replace('_', " ");
        }
        uri.rsplit(['#', '/'])
            .next()
            .unwrap_or(uri)
            .replace('_', " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_uri_replaces_spaces() {
        let ns = Namespaces::default();
        assert_eq!(
            ns.instance_uri("Analytical Engine"),
            "http://example.org/kg#Analytical_Engine"
        );
    }

    #[test]
    fn test_local_name_round_trips_instances() {
        let ns = Namespaces::default();
        let uri = ns.instance_uri("Analytical Engine");
        assert_eq!(ns.local_name(&uri), "Analytical Engine");
    }

    #[test]
    fn test_local_name_falls_back_for_foreign_uris() {
        let ns = Namespaces::default();
        assert_eq!(ns.local_name(RDF_TYPE), "type");
    }
}
