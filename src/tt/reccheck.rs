//! Well-foundedness of the size constraints of a (co)fixpoint.
//!
//! Stage constraints are read as a weighted graph: `v₁ + k₁ ⊑ v₂ + k₂` is an
//! edge `v₁ → v₂` of weight `k₂ - k₁`, and `∞ ⊑ v` an edge from a distinguished
//! `∞` node. A negative cycle forces its variables to `∞`.

use std::collections::BTreeSet;
use fnv::FnvHashMap;
use log::debug;
use petgraph::{
    algo::{bellman_ford, tarjan_scc},
    prelude::*,
    visit::{Dfs, Reversed},
};
use super::constraint::ConstraintSet;
use super::level::EdgeWeight;
use super::stage::{SVar, Stage};

type StageNode = NodeIndex<u32>;

struct StageGraph {
    graph: DiGraph<Option<SVar>, EdgeWeight, u32>,
    nodes: FnvHashMap<SVar, StageNode>,
    infty: StageNode,
}

impl StageGraph {
    fn new(cs: &ConstraintSet) -> Self {
        let mut graph = DiGraph::default();
        let infty = graph.add_node(None);
        let mut this = StageGraph {
            graph,
            nodes: FnvHashMap::default(),
            infty,
        };
        for c in cs.stages() {
            this.add(c.lower, c.upper);
        }
        this
    }

    fn node(&mut self, v: SVar) -> StageNode {
        let graph = &mut self.graph;
        *self.nodes.entry(v).or_insert_with(|| graph.add_node(Some(v)))
    }

    fn edge(&mut self, a: StageNode, b: StageNode, w: i32) {
        let w = EdgeWeight::finite(w);
        match self.graph.find_edge(a, b) {
            Some(e) => if w < self.graph[e] {
                self.graph[e] = w;
            },
            None => {
                self.graph.add_edge(a, b, w);
            },
        }
    }

    fn add(&mut self, lower: Stage, upper: Stage) {
        match (lower, upper) {
            (_, Stage::Infty) => (),
            (Stage::Infty, Stage::Var(v, _)) => {
                let n = self.node(v);
                self.edge(self.infty, n, 0);
            },
            (Stage::Var(v1, k1), Stage::Var(v2, k2)) => {
                let (a, b) = (self.node(v1), self.node(v2));
                self.edge(a, b, k2 as i32 - k1 as i32);
            },
        }
    }

    fn vars_of(&self, nodes: impl IntoIterator<Item = StageNode>) -> BTreeSet<SVar> {
        nodes.into_iter().filter_map(|n| self.graph[n]).collect()
    }

    fn starts<'a>(&self, vs: impl IntoIterator<Item = &'a SVar>) -> Vec<StageNode> {
        vs.into_iter().filter_map(|v| self.nodes.get(v).copied()).collect()
    }

    fn reachable(&self, starts: Vec<StageNode>) -> BTreeSet<SVar> {
        let mut seen = Vec::new();
        let mut dfs = Dfs::empty(&self.graph);
        for s in starts {
            dfs.move_to(s);
            while let Some(n) = dfs.next(&self.graph) {
                seen.push(n);
            }
        }
        self.vars_of(seen)
    }

    /// Everything at or above some variable of `vs`.
    fn upward<'a>(&self, vs: impl IntoIterator<Item = &'a SVar>) -> BTreeSet<SVar> {
        self.reachable(self.starts(vs))
    }

    /// Everything at or below some variable of `vs`.
    fn downward<'a>(&self, vs: impl IntoIterator<Item = &'a SVar>) -> BTreeSet<SVar> {
        let rev = Reversed(&self.graph);
        let mut seen = Vec::new();
        let mut dfs = Dfs::empty(rev);
        for s in self.starts(vs) {
            dfs.move_to(s);
            while let Some(n) = dfs.next(rev) {
                seen.push(n);
            }
        }
        self.vars_of(seen)
    }

    /// Variables whose strongly connected component carries a negative
    /// cycle.
    fn negative_cycle_vars(&self) -> BTreeSet<SVar> {
        let mut out = BTreeSet::new();
        for scc in tarjan_scc(&self.graph) {
            let looped = scc.len() == 1 && self.graph.find_edge(scc[0], scc[0]).is_some();
            if scc.len() < 2 && !looped {
                continue;
            }
            let mut sub = DiGraph::<(), EdgeWeight, u32>::default();
            let local: FnvHashMap<_, _> = scc.iter().map(|&n| (n, sub.add_node(()))).collect();
            for &n in &scc {
                for e in self.graph.edges(n) {
                    if let Some(&t) = local.get(&e.target()) {
                        sub.add_edge(local[&n], t, *e.weight());
                    }
                }
            }
            if bellman_ford(&sub, NodeIndex::new(0)).is_err() {
                out.extend(self.vars_of(scc));
            }
        }
        out
    }
}

/// Successful check: the constraints to carry outward and the variables
/// found to be infinite.
#[derive(Debug, Clone)]
pub struct RecCheckOk {
    pub constraints: ConstraintSet,
    pub infinite: BTreeSet<SVar>,
}

/// The two sets of variables that could not be kept apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecCheckFailure {
    pub inferred: BTreeSet<SVar>,
    pub expected: BTreeSet<SVar>,
}

impl RecCheckFailure {
    pub fn implicated(&self) -> BTreeSet<SVar> {
        self.inferred.intersection(&self.expected).copied().collect()
    }
}

/// Checks that `alpha` can serve as the decreasing measure of a recursive
/// definition whose candidate sizes are `vstar`, and whose sizes `vneq` must
/// stay independent of the measure.
pub fn rec_check(
    alpha: SVar,
    vstar: &BTreeSet<SVar>,
    vneq: &BTreeSet<SVar>,
    mut cs: ConstraintSet,
) -> Result<RecCheckOk, RecCheckFailure> {
    let mut g = StageGraph::new(&cs);
    g.node(alpha);

    let mut roots = vstar.clone();
    roots.insert(alpha);
    let si = g.downward(&roots);
    let above_vneq = g.upward(vneq);
    let a = g.node(alpha);
    for &v in si.iter().filter(|&&v| v != alpha) {
        cs.add_stage(Stage::var(alpha), Stage::var(v));
        let b = g.node(v);
        g.edge(a, b, 0);
    }

    if !si.is_disjoint(vneq) {
        debug!("reccheck {}: measure reaches independent sizes", alpha);
        return Err(RecCheckFailure {
            inferred: si,
            expected: above_vneq,
        });
    }

    let infinite = g.negative_cycle_vars();
    for &v in &infinite {
        cs.add_stage(Stage::Infty, Stage::var(v));
        let n = g.node(v);
        g.edge(g.infty, n, 0);
    }
    let up_infty = g.reachable(vec![g.infty]);
    if !up_infty.is_disjoint(&si) {
        debug!("reccheck {}: measure forced to infinity", alpha);
        return Err(RecCheckFailure {
            inferred: up_infty,
            expected: si,
        });
    }

    let tied: BTreeSet<_> = vneq.intersection(&g.upward(&si)).copied().collect();
    let forced = g.upward(&tied);
    for &v in &forced {
        cs.add_stage(Stage::Infty, Stage::var(v));
    }
    let mut infinite = infinite;
    infinite.extend(forced);
    debug!("reccheck {}: ok, {} sizes infinite", alpha, infinite.len());
    Ok(RecCheckOk {
        constraints: cs,
        infinite,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(vs: &[u32]) -> BTreeSet<SVar> {
        vs.iter().map(|&v| SVar(v)).collect()
    }

    fn le(cs: &mut ConstraintSet, a: (u32, u32), b: (u32, u32)) {
        cs.add_stage(Stage::Var(SVar(a.0), a.1), Stage::Var(SVar(b.0), b.1));
    }

    #[test]
    fn structural_decrease_passes() {
        // body argument d with α+1 ⊑ d; case gives s with d ⊑ s+1; call at s ⊑ α
        let mut cs = ConstraintSet::empty();
        le(&mut cs, (0, 1), (1, 0));
        le(&mut cs, (1, 0), (2, 1));
        le(&mut cs, (2, 0), (0, 0));
        let ok = rec_check(SVar(0), &set(&[0]), &set(&[]), cs).unwrap();
        assert!(ok.infinite.is_empty());
    }

    #[test]
    fn calling_on_the_same_argument_fails() {
        let mut cs = ConstraintSet::empty();
        le(&mut cs, (0, 1), (1, 0));
        le(&mut cs, (1, 0), (0, 0));
        let err = rec_check(SVar(0), &set(&[0]), &set(&[]), cs).unwrap_err();
        assert!(err.implicated().contains(&SVar(0)));
    }

    #[test]
    fn outer_sizes_must_stay_independent() {
        let mut cs = ConstraintSet::empty();
        le(&mut cs, (5, 0), (0, 0));
        let err = rec_check(SVar(0), &set(&[0]), &set(&[5]), cs).unwrap_err();
        assert_eq!(err.implicated(), set(&[0, 5]));
    }

    #[test]
    fn stars_above_outer_sizes_are_implicated() {
        // outer 5 flows into the result star 1, which is tied to the measure 0
        let mut cs = ConstraintSet::empty();
        le(&mut cs, (5, 0), (1, 1));
        le(&mut cs, (0, 0), (1, 0));
        le(&mut cs, (1, 0), (0, 0));
        let err = rec_check(SVar(0), &set(&[0, 1]), &set(&[5]), cs).unwrap_err();
        assert!(err.implicated().contains(&SVar(1)));

        let mut cs = ConstraintSet::empty();
        le(&mut cs, (5, 0), (1, 1));
        assert!(rec_check(SVar(0), &set(&[0]), &set(&[1, 5]), cs).is_ok());
    }

    #[test]
    fn sizes_above_the_measure_and_independent_go_infinite() {
        let mut cs = ConstraintSet::empty();
        le(&mut cs, (0, 0), (3, 0));
        le(&mut cs, (3, 0), (4, 0));
        let ok = rec_check(SVar(0), &set(&[0]), &set(&[3]), cs).unwrap();
        assert_eq!(ok.infinite, set(&[3, 4]));
        assert!(ok.constraints.stages().any(|c| c.lower == Stage::Infty && c.upper == Stage::var(SVar(4))));
    }

    #[test]
    fn unrelated_outer_sizes_are_left_alone() {
        let mut cs = ConstraintSet::empty();
        le(&mut cs, (7, 0), (8, 0));
        let ok = rec_check(SVar(0), &set(&[0]), &set(&[7]), cs).unwrap();
        assert!(ok.infinite.is_empty());
    }
}
