use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use super::level::{Level, UnivConstraint};
use super::stage::Stage;

/// `lower ⊑ upper` between two stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageConstraint {
    pub lower: Stage,
    pub upper: Stage,
}

impl Display for StageConstraint {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} ⊑ {}", self.lower, self.upper)
    }
}

/// Universe and stage constraints produced by a derivation. Sets are ordered so
/// that equality does not depend on the order constraints were found in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstraintSet {
    univs: BTreeSet<UnivConstraint>,
    stages: BTreeSet<StageConstraint>,
}

impl ConstraintSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.univs.is_empty() && self.stages.is_empty()
    }

    pub fn union(mut self, other: &ConstraintSet) -> Self {
        self.union_with(other);
        self
    }

    pub fn union_with(&mut self, other: &ConstraintSet) {
        self.univs.extend(other.univs.iter().copied());
        self.stages.extend(other.stages.iter().copied());
    }

    pub fn add_univ(&mut self, c: UnivConstraint) {
        self.univs.insert(c);
    }

    /// Records `lower ⊑ upper`, dropping constraints that hold for any
    /// assignment.
    pub fn add_stage(&mut self, lower: Stage, upper: Stage) {
        let trivial = match (lower, upper) {
            (_, Stage::Infty) => true,
            (Stage::Var(v, k), Stage::Var(w, j)) => v == w && k <= j,
            _ => false,
        };
        if !trivial {
            self.stages.insert(StageConstraint { lower, upper });
        }
    }

    pub fn univs(&self) -> impl Iterator<Item = &UnivConstraint> + '_ {
        self.univs.iter()
    }

    pub fn stages(&self) -> impl Iterator<Item = &StageConstraint> + '_ {
        self.stages.iter()
    }

    pub fn univ_count(&self) -> usize {
        self.univs.len()
    }

    pub fn universe_part(&self) -> Self {
        ConstraintSet {
            univs: self.univs.clone(),
            stages: BTreeSet::new(),
        }
    }

    pub fn subst_instance(&self, inst: &[Level]) -> Self {
        ConstraintSet {
            univs: self.univs.iter().map(|c| c.subst_instance(inst)).collect(),
            stages: self.stages.clone(),
        }
    }
}

impl Display for ConstraintSet {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str("{")?;
        let mut first = true;
        for c in &self.univs {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}", c)?;
        }
        for c in &self.stages {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}", c)?;
        }
        f.write_str("}")
    }
}
