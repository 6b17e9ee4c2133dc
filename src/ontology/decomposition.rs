//! Taxonomic decomposition of class expressions.
//!
//! Intersections and unions are split into their operands. Complements and
//! object restrictions mask their filler: they are pushed onto a context stack
//! and every terminal found below them is rebuilt through that stack, so
//! `P some (A and B)` yields `P some A` and `P some B` but never the bare `A`.

use std::collections::{BTreeSet, VecDeque};

use super::{
    expressions::{ClassExpression, RestrictionKind},
    value_objects::Iri,
};

/// A masking connective waiting to be replayed around a terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Mask {
    Complement,
    Restriction { property: Iri, kind: RestrictionKind },
}

impl Mask {
    fn wrap(&self, inner: ClassExpression) -> ClassExpression {
        match self {
            Self::Complement => ClassExpression::complement(inner),
            Self::Restriction { property, kind } => ClassExpression::Restriction {
                property: property.clone(),
                kind: kind.with_filler(inner),
            },
        }
    }
}

/// Returns the taxonomically relevant sub-expressions of `source`, the source
/// itself included.
#[must_use]
pub fn decompose(source: &ClassExpression) -> BTreeSet<ClassExpression> {
    let mut result = BTreeSet::new();
    let mut queue: VecDeque<(ClassExpression, Vec<Mask>)> =
        VecDeque::from([(source.clone(), Vec::new())]);

    while let Some((expression, stack)) = queue.pop_front() {
        if stack.is_empty() {
            result.insert(expression.clone());
        }
        match expression {
            ClassExpression::Intersection(operands) | ClassExpression::Union(operands) => {
                queue.extend(operands.into_iter().map(|op| (op, stack.clone())));
            }
            ClassExpression::Complement(operand) => {
                let mut masked = stack;
                masked.push(Mask::Complement);
                queue.push_back((*operand, masked));
            }
            ClassExpression::Restriction { property, kind } => match kind.filler().cloned() {
                Some(filler) => {
                    let mut masked = stack;
                    masked.push(Mask::Restriction { property, kind });
                    queue.push_back((filler, masked));
                }
                None => {
                    result.insert(unwind(ClassExpression::Restriction { property, kind }, &stack));
                }
            },
            ClassExpression::Enumeration(individuals) => {
                for subset in power_set(&individuals) {
                    result.insert(unwind(ClassExpression::Enumeration(subset), &stack));
                }
            }
            terminal @ ClassExpression::Class(_) => {
                result.insert(unwind(terminal, &stack));
            }
        }
    }

    result.insert(source.clone());
    result
}

/// Rebuilds `terminal` inside every mask, innermost first.
fn unwind(terminal: ClassExpression, stack: &[Mask]) -> ClassExpression {
    stack
        .iter()
        .rev()
        .fold(terminal, |inner, mask| mask.wrap(inner))
}

/// Every non-empty subset of `items`.
fn power_set(items: &BTreeSet<Iri>) -> Vec<BTreeSet<Iri>> {
    let Some((first, rest)) = items.iter().next().map(|first| {
        let rest: BTreeSet<Iri> = items.iter().skip(1).cloned().collect();
        (first.clone(), rest)
    }) else {
        return Vec::new();
    };

    let tails = power_set(&rest);
    let mut subsets = Vec::with_capacity(tails.len() * 2 + 1);
    subsets.push(BTreeSet::from([first.clone()]));
    for tail in tails {
        let mut with_first = tail.clone();
        with_first.insert(first.clone());
        subsets.push(with_first);
        subsets.push(tail);
    }
    subsets
}
