use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use extract::{OntologyTriplet, SimpleTriplet};

use crate::ns::{Namespaces, RDF_TYPE};

/// A graph term: a named resource or a literal value. Literals never act
/// as subjects and are never traversed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Term {
    Node(String),
    Literal(String),
}

impl Term {
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    pub fn as_node(&self) -> Option<&str> {
        match self {
            Term::Node(uri) => Some(uri),
            Term::Literal(_) => None,
        }
    }
}

/// One directed labeled edge of the assembled graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

/// Turns validated triplets into edges. Pure: edges are a function of the
/// triplet and the configured namespaces alone, so re-assembly of the same
/// triplet set yields an identical edge multiset.
pub struct EdgeBuilder {
    ns: Namespaces,
    literal_classes: HashSet<String>,
}

impl EdgeBuilder {
    pub fn new(ns: Namespaces, literal_classes: impl IntoIterator<Item = String>) -> Self {
        Self {
            ns,
            literal_classes: literal_classes.into_iter().collect(),
        }
    }

    /// Default literal-class set: the CIDOC string class.
    pub fn with_defaults(ns: Namespaces) -> Self {
        Self::new(ns, ["E62_String".to_string()])
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.ns
    }

    /// Schema-free mode: one edge, every term under the base namespace.
    pub fn simple_edges(&self, triplet: &SimpleTriplet) -> Vec<Edge> {
        vec![Edge {
            subject: self.ns.instance_uri(&triplet.subject),
            predicate: self.ns.instance_uri(&triplet.predicate),
            object: Term::Node(self.ns.instance_uri(&triplet.object)),
        }]
    }

    /// Ontology mode: the domain→range edge plus type assertions. The
    /// domain's type edge is always emitted; the range gets one only when
    /// its class is not a literal class, in which case the main edge's
    /// object is a node rather than a literal.
    pub fn ontology_edges(&self, triplet: &OntologyTriplet) -> Vec<Edge> {
        let subject = self.ns.instance_uri(&triplet.domain.name);
        let range_is_literal = self.literal_classes.contains(&triplet.range.class);

        let object = if range_is_literal {
            Term::Literal(triplet.range.name.clone())
        } else {
            Term::Node(self.ns.instance_uri(&triplet.range.name))
        };

        let mut edges = vec![
            Edge {
                subject: subject.clone(),
                predicate: self.ns.ontology_uri(&triplet.property),
                object,
            },
            Edge {
                subject,
                predicate: RDF_TYPE.to_string(),
                object: Term::Node(self.ns.ontology_uri(&triplet.domain.class)),
            },
        ];

        if !range_is_literal {
            edges.push(Edge {
                subject: self.ns.instance_uri(&triplet.range.name),
                predicate: RDF_TYPE.to_string(),
                object: Term::Node(self.ns.ontology_uri(&triplet.range.class)),
            });
        }

        edges
    }
}
