use std::fmt::{Display, Formatter, Result as FmtResult};
use petgraph::{prelude::*, algo::FloatMeasure, dot::{Dot, Config as DotConfig}};
use super::constraint::ConstraintSet;

/// Path weight used by both the universe graph and the stage graph. The
/// `infinite` component only ever shows up through `FloatMeasure::infinite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub(crate) struct EdgeWeight {
    infinite: i32,
    finite: i32,
}

impl EdgeWeight {
    pub fn finite(finite: i32) -> Self {
        EdgeWeight {
            infinite: 0,
            finite,
        }
    }
}

impl std::ops::Add for EdgeWeight {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        EdgeWeight {
            infinite: self.infinite + rhs.infinite,
            finite: self.finite + rhs.finite,
        }
    }
}

impl std::ops::Neg for EdgeWeight {
    type Output = Self;

    fn neg(self) -> Self::Output {
        EdgeWeight {
            infinite: -self.infinite,
            finite: -self.finite,
        }
    }
}

impl Display for EdgeWeight {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if self.infinite == 0 {
            Display::fmt(&self.finite, f)
        } else if self.finite == 0 {
            write!(f, "{}ω", &self.infinite)
        } else {
            write!(f, "{}ω+{}", &self.infinite, &self.finite)
        }
    }
}

impl FloatMeasure for EdgeWeight {
    fn zero() -> Self {
        EdgeWeight::default()
    }

    fn infinite() -> Self {
        EdgeWeight {
            infinite: 1,
            finite: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Nothing;

impl Display for Nothing {
    fn fmt(&self, _: &mut Formatter) -> FmtResult {
        Ok(())
    }
}

type CtxGraph = DiGraph<Nothing, EdgeWeight, u32>;

pub type LevelVar = NodeIndex<u32>;

/// A universe level: `Set`, a global level declared in the graph, or the
/// `i`-th level of a universe-polymorphic declaration's instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Set,
    Var(LevelVar),
    Bound(u32),
}

impl Level {
    pub fn subst_instance(self, inst: &[Level]) -> Level {
        match self {
            Level::Bound(i) => inst.get(i as usize).copied().unwrap_or(self),
            _ => self,
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Level::Set => f.write_str("Set"),
            Level::Var(v) => write!(f, "u{}", v.index()),
            Level::Bound(i) => write!(f, "u#{}", i),
        }
    }
}

/// An algebraic universe: `max(l₀ + k₀, …, lₙ + kₙ)`, kept sorted with one
/// entry per level.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Universe(Vec<(Level, u32)>);

impl Universe {
    pub fn make(l: Level) -> Self {
        Universe(vec![(l, 0)])
    }

    pub fn set() -> Self {
        Self::make(Level::Set)
    }

    pub fn type1() -> Self {
        Universe(vec![(Level::Set, 1)])
    }

    fn normalize(mut entries: Vec<(Level, u32)>) -> Self {
        entries.sort();
        let mut out: Vec<(Level, u32)> = Vec::with_capacity(entries.len());
        for (l, k) in entries {
            match out.last_mut() {
                Some((l0, k0)) if *l0 == l => *k0 = k.max(*k0),
                _ => out.push((l, k)),
            }
        }
        if out.len() > 1 {
            out.retain(|&(l, k)| !(l == Level::Set && k == 0));
        }
        Universe(out)
    }

    pub fn entries(&self) -> &[(Level, u32)] {
        &self.0
    }

    pub fn levels(&self) -> impl Iterator<Item = Level> + '_ {
        self.0.iter().map(|&(l, _)| l)
    }

    /// The single level this universe denotes, if it is one.
    pub fn as_level(&self) -> Option<Level> {
        match self.0.as_slice() {
            &[(l, 0)] => Some(l),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.as_level() == Some(Level::Set)
    }

    pub fn super_(&self) -> Self {
        Universe(self.0.iter().map(|&(l, k)| (l, k + 1)).collect())
    }

    pub fn sup(&self, other: &Universe) -> Self {
        Self::normalize(self.0.iter().chain(other.0.iter()).copied().collect())
    }

    pub fn subst_instance(&self, inst: &[Level]) -> Self {
        Self::normalize(self.0.iter().map(|&(l, k)| (l.subst_instance(inst), k)).collect())
    }

    /// Replaces every occurrence of `l` by the universe `by`.
    pub fn subst_level(&self, l: Level, by: &Universe) -> Self {
        let mut entries = Vec::with_capacity(self.0.len());
        for &(l0, k) in &self.0 {
            if l0 == l {
                entries.extend(by.0.iter().map(|&(l1, k1)| (l1, k1 + k)));
            } else {
                entries.push((l0, k));
            }
        }
        Self::normalize(entries)
    }
}

impl Display for Universe {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let show = |f: &mut Formatter, &(l, k): &(Level, u32)| if k == 0 {
            write!(f, "{}", l)
        } else {
            write!(f, "{}+{}", l, k)
        };
        match self.0.as_slice() {
            [one] => show(f, one),
            entries => {
                f.write_str("max(")?;
                for (i, e) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    show(f, e)?;
                }
                f.write_str(")")
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintKind {
    Lt,
    Le,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnivConstraint {
    pub left: Level,
    pub kind: ConstraintKind,
    pub right: Level,
}

impl UnivConstraint {
    pub fn new(left: Level, kind: ConstraintKind, right: Level) -> Self {
        UnivConstraint { left, kind, right }
    }

    pub fn subst_instance(&self, inst: &[Level]) -> Self {
        UnivConstraint {
            left: self.left.subst_instance(inst),
            kind: self.kind,
            right: self.right.subst_instance(inst),
        }
    }
}

impl Display for UnivConstraint {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let op = match self.kind {
            ConstraintKind::Lt => "<",
            ConstraintKind::Le => "<=",
            ConstraintKind::Eq => "=",
        };
        write!(f, "{} {} {}", self.left, op, self.right)
    }
}

/// The universe graph. Node 0 is `Set`; an edge `a -w-> b` records
/// `a + o₀ <= b + o₁` with `w = o₁ - o₀`, so the constraints are satisfiable
/// exactly when there is no negative cycle.
#[derive(Debug, Clone)]
pub struct LevelSystem(CtxGraph);

impl LevelSystem {
    pub fn new() -> Self {
        let mut graph = CtxGraph::new();
        let bottom = graph.add_node(Nothing);
        debug_assert_eq!(bottom, Self::bottom());
        LevelSystem(graph)
    }

    pub fn bottom() -> LevelVar {
        LevelVar::new(0)
    }

    pub fn fresh_level(&mut self, offset: i32) -> LevelVar {
        let node = self.0.add_node(Nothing);
        let bottom = Self::bottom();
        self.add_le_constraint(bottom, offset, node, 0);
        node
    }

    pub fn add_eq_constraint(&mut self, a: LevelVar, offset0: i32, b: LevelVar, offset1: i32) {
        self.add_le_constraint(a, offset0, b, offset1);
        self.add_le_constraint(b, offset1, a, offset0);
    }

    pub fn add_le_constraint(&mut self, a: LevelVar, offset0: i32, b: LevelVar, offset1: i32) {
        let offset = offset1 - offset0;
        if let Some(e1) = self.0.find_edge(a, b) {
            if EdgeWeight::finite(offset) < self.0[e1] {
                self.0[e1] = EdgeWeight::finite(offset);
            }
        } else {
            self.0.add_edge(a, b, EdgeWeight::finite(offset));
        }
    }

    pub fn add_lt_constraint(&mut self, a: LevelVar, offset0: i32, b: LevelVar, offset1: i32) {
        self.add_le_constraint(a, offset0 + 1, b, offset1)
    }

    pub fn is_consistent(&self) -> bool {
        petgraph::algo::bellman_ford(&self.0, Self::bottom()).is_ok()
    }

    fn node_of(&self, l: Level) -> Option<LevelVar> {
        match l {
            Level::Set => Some(Self::bottom()),
            Level::Var(v) if v.index() < self.0.node_count() => Some(v),
            _ => None,
        }
    }

    pub fn is_declared(&self, l: Level) -> bool {
        self.node_of(l).is_some()
    }

    /// Adds one constraint to the graph; `false` if it mentions a level the
    /// graph does not know.
    pub fn enforce(&mut self, c: &UnivConstraint) -> bool {
        let (a, b) = match (self.node_of(c.left), self.node_of(c.right)) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        match c.kind {
            ConstraintKind::Lt => self.add_lt_constraint(a, 0, b, 0),
            ConstraintKind::Le => self.add_le_constraint(a, 0, b, 0),
            ConstraintKind::Eq => self.add_eq_constraint(a, 0, b, 0),
        }
        true
    }

    /// Whether `cs` can be added to the graph without making it inconsistent.
    pub fn check_constraints(&self, cs: &ConstraintSet) -> bool {
        let mut next = self.clone();
        next.merge(cs)
    }

    pub fn merge(&mut self, cs: &ConstraintSet) -> bool {
        for c in cs.univs() {
            if !self.enforce(c) {
                return false;
            }
        }
        self.is_consistent()
    }
}

impl Default for LevelSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for LevelSystem {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(&Dot::with_config(&self.0, &[DotConfig::NodeIndexLabel]), f)
    }
}
