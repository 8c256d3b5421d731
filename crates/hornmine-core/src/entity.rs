//! Entity, predicate and fact types

use serde::{Deserialize, Serialize};

use crate::limits::{validate_name, ValidationError};

/// Predicate used by knowledge bases to record entity types
pub const DEFAULT_TYPE_PREDICATE: &str = "rdf:type";

macro_rules! string_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a handle, rejecting names the storage formats cannot carry
            pub fn parse(s: impl Into<String>) -> Result<Self, ValidationError> {
                let s = s.into();
                validate_name(&s)?;
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&String> for $name {
            fn from(s: &String) -> Self {
                Self(s.clone())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_handle!(
    /// Opaque identifier of a knowledge graph node
    Entity
);

string_handle!(
    /// Opaque identifier of a relation
    Predicate
);

string_handle!(
    /// Type classification of an entity (itself a node of the graph)
    EntityType
);

impl EntityType {
    /// The type as a graph node, for use as a query constant
    pub fn as_entity(&self) -> Entity {
        Entity(self.0.clone())
    }
}

/// Subject and object types of a predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateTypes {
    pub subject: EntityType,
    pub object: EntityType,
}

impl PredicateTypes {
    pub fn new(subject: impl Into<EntityType>, object: impl Into<EntityType>) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
        }
    }
}

/// Direction for neighbourhood lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

/// A subject-predicate-object triple
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub subject: Entity,
    pub predicate: Predicate,
    pub object: Entity,
}

impl Fact {
    pub fn new(
        subject: impl Into<Entity>,
        predicate: impl Into<Predicate>,
        object: impl Into<Entity>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// The endpoint opposite to `entity`, if the fact touches it
    pub fn other_end(&self, entity: &Entity) -> Option<&Entity> {
        if &self.subject == entity {
            Some(&self.object)
        } else if &self.object == entity {
            Some(&self.subject)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.predicate, self.subject, self.object)
    }
}
