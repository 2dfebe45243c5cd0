use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A size variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SVar(pub u32);

impl Display for SVar {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "s{}", self.0)
    }
}

/// A stage: `∞`, or a size variable with a number of successors applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Infty,
    Var(SVar, u32),
}

impl Stage {
    pub fn var(v: SVar) -> Self {
        Stage::Var(v, 0)
    }

    pub fn succ(self) -> Self {
        match self {
            Stage::Infty => Stage::Infty,
            Stage::Var(v, k) => Stage::Var(v, k + 1),
        }
    }

    pub fn plus(self, n: u32) -> Self {
        match self {
            Stage::Infty => Stage::Infty,
            Stage::Var(v, k) => Stage::Var(v, k + n),
        }
    }

    pub fn var_of(self) -> Option<SVar> {
        match self {
            Stage::Infty => None,
            Stage::Var(v, _) => Some(v),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Stage::Infty => f.write_str("∞"),
            Stage::Var(v, 0) => write!(f, "{}", v),
            Stage::Var(v, k) => write!(f, "{}+{}", v, k),
        }
    }
}

/// The size annotation carried by an occurrence of an inductive type.
///
/// `Star` marks a position whose size is a candidate measure of the
/// enclosing (co)fixpoint; `Glob` marks a size-polymorphic position of a
/// global declaration's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Annot {
    Empty,
    Star(Stage),
    Stage(Stage),
    Glob(Stage),
}

impl Annot {
    pub fn stage(self) -> Stage {
        match self {
            Annot::Empty => Stage::Infty,
            Annot::Star(s) | Annot::Stage(s) | Annot::Glob(s) => s,
        }
    }

    pub fn is_star(self) -> bool {
        matches!(self, Annot::Star(_))
    }
}

impl Display for Annot {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Annot::Empty => Ok(()),
            Annot::Star(s) => write!(f, "^{}*", s),
            Annot::Stage(s) => write!(f, "^{}", s),
            Annot::Glob(s) => write!(f, "^{}@", s),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Frame {
    vars: BTreeSet<SVar>,
}

/// Allocation of size variables during one top-level check.
///
/// One frame is pushed per (co)fixpoint being validated; every variable
/// allocated while it is open belongs to it until it is popped, at which point
/// its variables move to the enclosing frame. A variable is ordinary, star or
/// infinite; nothing ever becomes a star again once demoted.
#[derive(Debug, Clone)]
pub struct StageState {
    next: u32,
    frames: Vec<Frame>,
    stars: BTreeSet<SVar>,
    infty: BTreeSet<SVar>,
}

impl StageState {
    pub fn new() -> Self {
        StageState {
            next: 0,
            frames: vec![Frame::default()],
            stars: BTreeSet::new(),
            infty: BTreeSet::new(),
        }
    }

    pub fn next_var(&mut self) -> SVar {
        let v = SVar(self.next);
        self.next += 1;
        if let Some(frame) = self.frames.last_mut() {
            frame.vars.insert(v);
        }
        v
    }

    pub fn next_stage(&mut self) -> Stage {
        Stage::var(self.next_var())
    }

    /// Number of variables allocated so far; every `SVar(i)` with `i` below
    /// it exists.
    pub fn allocated(&self) -> u32 {
        self.next
    }

    /// The variables allocated before `mark`: the surrounding context and
    /// whatever was declared before it was taken.
    pub fn vars_below(&self, mark: u32) -> BTreeSet<SVar> {
        (0..mark).map(SVar).collect()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Closes the innermost frame. Stars that survived validation go back to
    /// being ordinary variables.
    pub fn pop_frame(&mut self) -> BTreeSet<SVar> {
        if self.frames.len() <= 1 {
            return BTreeSet::new();
        }
        let frame = self.frames.pop().unwrap_or_default();
        for v in &frame.vars {
            self.stars.remove(v);
        }
        if let Some(parent) = self.frames.last_mut() {
            parent.vars.extend(frame.vars.iter().copied());
        }
        frame.vars
    }

    pub fn frame_vars(&self) -> BTreeSet<SVar> {
        self.frames.last().map(|f| f.vars.clone()).unwrap_or_default()
    }

    pub fn mark_star(&mut self, v: SVar) {
        debug_assert!(!self.infty.contains(&v));
        self.stars.insert(v);
    }

    pub fn is_star(&self, v: SVar) -> bool {
        self.stars.contains(&v)
    }

    pub fn is_infty(&self, v: SVar) -> bool {
        self.infty.contains(&v)
    }

    /// Stars allocated by the innermost frame.
    pub fn frame_stars(&self) -> BTreeSet<SVar> {
        match self.frames.last() {
            Some(frame) => self.stars.intersection(&frame.vars).copied().collect(),
            None => BTreeSet::new(),
        }
    }

    pub fn demote(&mut self, v: SVar) {
        self.stars.remove(&v);
    }

    pub fn set_infty<I: IntoIterator<Item = SVar>>(&mut self, vs: I) {
        for v in vs {
            self.stars.remove(&v);
            self.infty.insert(v);
        }
    }
}

impl Default for StageState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_hand_variables_outward() {
        let mut stg = StageState::new();
        let outer = stg.next_var();
        stg.push_frame();
        let inner = stg.next_var();
        assert_eq!(stg.frame_vars(), [inner].iter().copied().collect());
        stg.mark_star(inner);
        assert_eq!(stg.frame_stars().len(), 1);
        let popped = stg.pop_frame();
        assert!(popped.contains(&inner));
        assert!(!stg.is_star(inner));
        assert_eq!(stg.frame_vars(), [outer, inner].iter().copied().collect());
    }

    #[test]
    fn categories_are_exclusive() {
        let mut stg = StageState::new();
        let v = stg.next_var();
        stg.mark_star(v);
        stg.set_infty(vec![v]);
        assert!(!stg.is_star(v));
        assert!(stg.is_infty(v));
    }

    #[test]
    fn successor_of_infinity() {
        assert_eq!(Stage::Infty.succ(), Stage::Infty);
        assert_eq!(Stage::var(SVar(3)).succ(), Stage::Var(SVar(3), 1));
        assert_eq!(Annot::Empty.stage(), Stage::Infty);
    }
}
