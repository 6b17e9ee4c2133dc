use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use oxrdf::NamedNode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `owl:Thing`, the universal superclass.
pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";
/// `owl:Nothing`, the empty class.
pub const OWL_NOTHING: &str = "http://www.w3.org/2002/07/owl#Nothing";
/// Annotation property marking classes declared by the loaded document itself
/// rather than pulled in through an import.
pub const ORIGINALLY_DEFINED: &str = "urn:ontoeval:vocab#originallyDefined";

/// Value object ensuring that supplied text represents a valid IRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iri {
    value: String,
}

impl Iri {
    /// Validates and constructs a new [`Iri`] value object.
    ///
    /// The constructor rejects malformed identifiers in order to guarantee that
    /// every class, property and ontology uses canonical identifiers.
    pub fn new(value: impl Into<String>) -> Result<Self, IriError> {
        let value = value.into();
        NamedNode::new(value.as_str()).map_err(|_| IriError::Invalid {
            value: value.clone(),
        })?;
        Ok(Self { value })
    }

    /// Returns the underlying textual representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the local name: the text after the last `#`, or after the last
    /// `/` when there is no `#`. Empty local names yield `None`.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        let start = self
            .value
            .rfind('#')
            .or_else(|| self.value.rfind('/'))
            .or_else(|| self.value.rfind(':'))?;
        let fragment = &self.value[start + 1..];
        (!fragment.is_empty()).then_some(fragment)
    }

    /// Returns `true` when both IRIs carry the same non-empty fragment.
    #[must_use]
    pub fn same_fragment(&self, other: &Self) -> bool {
        matches!((self.fragment(), other.fragment()), (Some(a), Some(b)) if a == b)
    }

    /// Returns `true` if this is `owl:Thing`.
    #[must_use]
    pub fn is_thing(&self) -> bool {
        self.value == OWL_THING
    }

    /// Returns `true` if this is `owl:Nothing`.
    #[must_use]
    pub fn is_nothing(&self) -> bool {
        self.value == OWL_NOTHING
    }

    /// `owl:Thing` as a value object.
    #[must_use]
    pub fn thing() -> Self {
        Self {
            value: OWL_THING.to_owned(),
        }
    }

    /// The originally-defined marker property.
    #[must_use]
    pub fn originally_defined() -> Self {
        Self {
            value: ORIGINALLY_DEFINED.to_owned(),
        }
    }
}

impl Display for Iri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Iri {
    type Err = IriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for Iri {
    type Error = IriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Iri> for String {
    fn from(iri: Iri) -> Self {
        iri.value
    }
}

/// Errors produced when validating an [`Iri`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IriError {
    /// The provided text could not be parsed as an IRI.
    #[error("invalid IRI: {value}")]
    Invalid { value: String },
}
