//! Comparison of desired and observed configurations

use crate::model::{EXISTS, ResourceConfig};
use crate::types::{AttributeValue, Mutability};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One attribute whose desired value is not what was observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    pub attribute: String,
    pub desired: Option<AttributeValue>,
    pub observed: Option<AttributeValue>,
    pub mutability: Mutability,
}

impl Difference {
    fn existence(desired: bool, observed: bool) -> Self {
        Self {
            attribute: EXISTS.to_string(),
            desired: Some(AttributeValue::Bool(desired)),
            observed: Some(AttributeValue::Bool(observed)),
            mutability: Mutability::Settable,
        }
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<AttributeValue>| {
            v.as_ref()
                .map_or_else(|| "(unset)".to_string(), ToString::to_string)
        };
        write!(
            f,
            "{}: {} → {}",
            self.attribute,
            show(&self.observed),
            show(&self.desired)
        )
    }
}

/// Outcome of comparing desired against observed state
///
/// Differences keep attribute evaluation order. Callers should rely only on
/// which attributes are present, not on their position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonResult {
    Identical,
    Different(Vec<Difference>),
}

impl ComparisonResult {
    pub fn is_identical(&self) -> bool {
        matches!(self, Self::Identical)
    }

    pub fn differences(&self) -> &[Difference] {
        match self {
            Self::Identical => &[],
            Self::Different(diffs) => diffs,
        }
    }

    /// Look up the difference for an attribute
    pub fn find(&self, attribute: &str) -> Option<&Difference> {
        self.differences().iter().find(|d| d.attribute == attribute)
    }

    /// Whether the result is the single existence difference
    pub fn is_existence_change(&self) -> bool {
        matches!(self.differences(), [only] if only.attribute == EXISTS)
    }

    /// First difference on an attribute that cannot change in place
    pub fn immutable_difference(&self) -> Option<&Difference> {
        self.differences()
            .iter()
            .find(|d| d.mutability == Mutability::Immutable)
    }
}

/// Compare a desired configuration against observed state of the same kind
///
/// 1. Both absent: identical, nothing else is looked at.
/// 2. Existence differs: exactly one `Exists` difference.
/// 3. Otherwise every attribute that is set on `desired` and passes its
///    guard is compared against the observed value.
pub fn compare<C: ResourceConfig>(desired: &C, observed: &C) -> ComparisonResult {
    if !desired.exists() && !observed.exists() {
        return ComparisonResult::Identical;
    }

    if desired.exists() != observed.exists() {
        return ComparisonResult::Different(vec![Difference::existence(
            desired.exists(),
            observed.exists(),
        )]);
    }

    let observed_attrs = observed.attributes();
    let mut differences = Vec::new();

    for attr in desired.attributes() {
        if !attr.relevant {
            continue;
        }
        let Some(want) = attr.value else {
            continue;
        };

        let have = observed_attrs
            .iter()
            .find(|a| a.name == attr.name)
            .and_then(|a| a.value.clone());

        if !have.as_ref().is_some_and(|h| want.matches(h)) {
            differences.push(Difference {
                attribute: attr.name.to_string(),
                desired: Some(want),
                observed: have,
                mutability: attr.mutability,
            });
        }
    }

    if differences.is_empty() {
        ComparisonResult::Identical
    } else {
        ComparisonResult::Different(differences)
    }
}
