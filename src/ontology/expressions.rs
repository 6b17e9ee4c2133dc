use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::value_objects::Iri;

/// Class expression tree.
///
/// Expressions are immutable values ordered structurally, which lets them sit
/// in `BTreeSet`s and serve as graph nodes. Normalizers build new expressions
/// bottom-up instead of editing existing ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassExpression {
    /// A named class.
    Class(Iri),
    Intersection(BTreeSet<ClassExpression>),
    Union(BTreeSet<ClassExpression>),
    Complement(Box<ClassExpression>),
    /// A property restriction.
    Restriction {
        property: Iri,
        kind: RestrictionKind,
    },
    /// An enumeration of individuals (`ObjectOneOf`).
    Enumeration(BTreeSet<Iri>),
}

/// Quantifier and filler of a [`ClassExpression::Restriction`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    Some(Box<ClassExpression>),
    Only(Box<ClassExpression>),
    Min(u32, Box<ClassExpression>),
    Max(u32, Box<ClassExpression>),
    Exactly(u32, Box<ClassExpression>),
    HasValue(Iri),
    HasSelf,
    DataSome(Iri),
    DataOnly(Iri),
    DataHasValue(String),
}

impl RestrictionKind {
    /// Returns the class filler for object restrictions that carry one.
    #[must_use]
    pub fn filler(&self) -> Option<&ClassExpression> {
        match self {
            Self::Some(filler)
            | Self::Only(filler)
            | Self::Min(_, filler)
            | Self::Max(_, filler)
            | Self::Exactly(_, filler) => Some(filler),
            Self::HasValue(_)
            | Self::HasSelf
            | Self::DataSome(_)
            | Self::DataOnly(_)
            | Self::DataHasValue(_) => None,
        }
    }

    /// Rebuilds the restriction around another filler. Kinds without a class
    /// filler are returned unchanged.
    #[must_use]
    pub fn with_filler(&self, filler: ClassExpression) -> Self {
        let filler = Box::new(filler);
        match self {
            Self::Some(_) => Self::Some(filler),
            Self::Only(_) => Self::Only(filler),
            Self::Min(n, _) => Self::Min(*n, filler),
            Self::Max(n, _) => Self::Max(*n, filler),
            Self::Exactly(n, _) => Self::Exactly(*n, filler),
            other => other.clone(),
        }
    }

    fn map_iris(&self, f: &mut impl FnMut(&Iri) -> Iri) -> Self {
        match self {
            Self::Some(filler) => Self::Some(Box::new(filler.map_iris(f))),
            Self::Only(filler) => Self::Only(Box::new(filler.map_iris(f))),
            Self::Min(n, filler) => Self::Min(*n, Box::new(filler.map_iris(f))),
            Self::Max(n, filler) => Self::Max(*n, Box::new(filler.map_iris(f))),
            Self::Exactly(n, filler) => Self::Exactly(*n, Box::new(filler.map_iris(f))),
            Self::HasValue(individual) => Self::HasValue(f(individual)),
            Self::HasSelf => Self::HasSelf,
            Self::DataSome(datatype) => Self::DataSome(f(datatype)),
            Self::DataOnly(datatype) => Self::DataOnly(f(datatype)),
            Self::DataHasValue(literal) => Self::DataHasValue(literal.clone()),
        }
    }
}

impl ClassExpression {
    /// Shorthand for an atomic class.
    #[must_use]
    pub fn class(iri: Iri) -> Self {
        Self::Class(iri)
    }

    /// Builds an intersection of the supplied operands.
    pub fn intersection(operands: impl IntoIterator<Item = ClassExpression>) -> Self {
        Self::Intersection(operands.into_iter().collect())
    }

    /// Builds a union of the supplied operands.
    pub fn union(operands: impl IntoIterator<Item = ClassExpression>) -> Self {
        Self::Union(operands.into_iter().collect())
    }

    /// Builds the complement of `operand`.
    #[must_use]
    pub fn complement(operand: ClassExpression) -> Self {
        Self::Complement(Box::new(operand))
    }

    /// Builds an existential restriction `property some filler`.
    #[must_use]
    pub fn some(property: Iri, filler: ClassExpression) -> Self {
        Self::Restriction {
            property,
            kind: RestrictionKind::Some(Box::new(filler)),
        }
    }

    /// Builds a universal restriction `property only filler`.
    #[must_use]
    pub fn only(property: Iri, filler: ClassExpression) -> Self {
        Self::Restriction {
            property,
            kind: RestrictionKind::Only(Box::new(filler)),
        }
    }

    /// Returns the IRI of a named class.
    #[must_use]
    pub fn as_class(&self) -> Option<&Iri> {
        match self {
            Self::Class(iri) => Some(iri),
            _ => None,
        }
    }

    /// Returns `true` for named classes.
    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self, Self::Class(_))
    }

    /// Returns `true` for `owl:Thing`.
    #[must_use]
    pub fn is_thing(&self) -> bool {
        self.as_class().is_some_and(Iri::is_thing)
    }

    /// Collects the named classes mentioned anywhere in the expression.
    pub fn collect_classes(&self, into: &mut BTreeSet<Iri>) {
        match self {
            Self::Class(iri) => {
                into.insert(iri.clone());
            }
            Self::Intersection(operands) | Self::Union(operands) => {
                for operand in operands {
                    operand.collect_classes(into);
                }
            }
            Self::Complement(operand) => operand.collect_classes(into),
            Self::Restriction { kind, .. } => {
                if let Some(filler) = kind.filler() {
                    filler.collect_classes(into);
                }
            }
            Self::Enumeration(_) => {}
        }
    }

    /// Collects every IRI mentioned in the expression: classes, properties,
    /// individuals and datatypes.
    pub fn collect_iris(&self, into: &mut BTreeSet<Iri>) {
        match self {
            Self::Class(iri) => {
                into.insert(iri.clone());
            }
            Self::Intersection(operands) | Self::Union(operands) => {
                for operand in operands {
                    operand.collect_iris(into);
                }
            }
            Self::Complement(operand) => operand.collect_iris(into),
            Self::Restriction { property, kind } => {
                into.insert(property.clone());
                match kind {
                    RestrictionKind::HasValue(iri)
                    | RestrictionKind::DataSome(iri)
                    | RestrictionKind::DataOnly(iri) => {
                        into.insert(iri.clone());
                    }
                    _ => {}
                }
                if let Some(filler) = kind.filler() {
                    filler.collect_iris(into);
                }
            }
            Self::Enumeration(individuals) => into.extend(individuals.iter().cloned()),
        }
    }

    /// Rebuilds the expression with every IRI passed through `f`.
    #[must_use]
    pub fn map_iris(&self, f: &mut impl FnMut(&Iri) -> Iri) -> Self {
        match self {
            Self::Class(iri) => Self::Class(f(iri)),
            Self::Intersection(operands) => {
                Self::Intersection(operands.iter().map(|op| op.map_iris(f)).collect())
            }
            Self::Union(operands) => Self::Union(operands.iter().map(|op| op.map_iris(f)).collect()),
            Self::Complement(operand) => Self::Complement(Box::new(operand.map_iris(f))),
            Self::Restriction { property, kind } => Self::Restriction {
                property: f(property),
                kind: kind.map_iris(f),
            },
            Self::Enumeration(individuals) => {
                Self::Enumeration(individuals.iter().map(|iri| f(iri)).collect())
            }
        }
    }
}

impl From<Iri> for ClassExpression {
    fn from(iri: Iri) -> Self {
        Self::Class(iri)
    }
}

fn write_operands<'a>(
    f: &mut Formatter<'_>,
    name: &str,
    operands: impl IntoIterator<Item = &'a ClassExpression>,
) -> fmt::Result {
    write!(f, "{name}(")?;
    for (idx, operand) in operands.into_iter().enumerate() {
        if idx > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{operand}")?;
    }
    f.write_str(")")
}

/// Canonical functional-style rendering. Operand order follows the set order,
/// so equal expressions always render identically.
impl Display for ClassExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(iri) => write!(f, "<{iri}>"),
            Self::Intersection(operands) => write_operands(f, "ObjectIntersectionOf", operands),
            Self::Union(operands) => write_operands(f, "ObjectUnionOf", operands),
            Self::Complement(operand) => write!(f, "ObjectComplementOf({operand})"),
            Self::Restriction { property, kind } => match kind {
                RestrictionKind::Some(filler) => {
                    write!(f, "ObjectSomeValuesFrom(<{property}> {filler})")
                }
                RestrictionKind::Only(filler) => {
                    write!(f, "ObjectAllValuesFrom(<{property}> {filler})")
                }
                RestrictionKind::Min(n, filler) => {
                    write!(f, "ObjectMinCardinality({n} <{property}> {filler})")
                }
                RestrictionKind::Max(n, filler) => {
                    write!(f, "ObjectMaxCardinality({n} <{property}> {filler})")
                }
                RestrictionKind::Exactly(n, filler) => {
                    write!(f, "ObjectExactCardinality({n} <{property}> {filler})")
                }
                RestrictionKind::HasValue(individual) => {
                    write!(f, "ObjectHasValue(<{property}> <{individual}>)")
                }
                RestrictionKind::HasSelf => write!(f, "ObjectHasSelf(<{property}>)"),
                RestrictionKind::DataSome(datatype) => {
                    write!(f, "DataSomeValuesFrom(<{property}> <{datatype}>)")
                }
                RestrictionKind::DataOnly(datatype) => {
                    write!(f, "DataAllValuesFrom(<{property}> <{datatype}>)")
                }
                RestrictionKind::DataHasValue(literal) => {
                    write!(f, "DataHasValue(<{property}> {literal:?})")
                }
            },
            Self::Enumeration(individuals) => {
                f.write_str("ObjectOneOf(")?;
                for (idx, individual) in individuals.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "<{individual}>")?;
                }
                f.write_str(")")
            }
        }
    }
}
