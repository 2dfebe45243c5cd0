//! Typing of mutual fixpoints and cofixpoints.
//!
//! Each definition's declared type is starred: occurrences of the recursive
//! block get size variables that the bodies must respect one notch up. The
//! measure of each definition (the size of its recursive argument, or of its
//! conclusion for cofixpoints) is then checked well-founded by [`rec_check`].
//! Stars that prevent this are demoted to plain sizes and the check runs
//! again, until it succeeds or nothing is left to demote.

use std::collections::BTreeSet;
use std::rc::Rc;
use itertools::Itertools;
use log::{debug, trace};
use super::annot::{erase_infty, erase_stars, mark_star, shift_stars, star_vars};
use super::constraint::ConstraintSet;
use super::env::{Env, Finiteness};
use super::error::{KernelError, KernelResult, TypeErrorKind};
use super::guard::{check_cofix, check_fix};
use super::reccheck::rec_check;
use super::reduce::{conv_leq, find_inductive, finiteness};
use super::stage::{Annot, SVar, Stage};
use super::term::{decompose_prod_assum, lift, Binder, CoFixpoint, Constr, Fixpoint, LocalBinder, RecDecl, Term};
use super::typeops::{Checker, Judgment};

#[derive(Debug, Clone, Copy)]
enum RecKind<'a> {
    /// Positions of the recursive arguments.
    Fix(&'a [usize]),
    CoFix,
}

impl RecKind<'_> {
    fn guarded(self, decl: &RecDecl) -> Result<(), usize> {
        match self {
            RecKind::Fix(ks) => check_fix(decl, ks),
            RecKind::CoFix => check_cofix(decl),
        }
    }

    fn build(self, decl: RecDecl, index: usize) -> Constr {
        match self {
            RecKind::Fix(ks) => Term::fix(Fixpoint {
                rec_args: ks.iter().map(|&k| Some(k)).collect(),
                index,
                decl,
            }),
            RecKind::CoFix => Term::cofix(CoFixpoint { index, decl }),
        }
    }
}

fn check_arity(decl: &RecDecl, index: usize, nrec: Option<usize>) -> KernelResult<()> {
    let n = decl.names.len();
    let ok = n > 0
        && decl.types.len() == n
        && decl.bodies.len() == n
        && nrec.map_or(true, |r| r == n)
        && index < n;
    if ok {
        Ok(())
    } else {
        Err(KernelError::Anomaly(format!("malformed recursive block of {} definitions", n)))
    }
}

fn nassums(ty: &Constr) -> usize {
    decompose_prod_assum(ty)
        .0
        .iter()
        .filter(|b| matches!(b, LocalBinder::Assum(..)))
        .count()
}

/// The recursive inductive of a definition and the size variable of its
/// occurrence: at argument `k` for a fixpoint, in the conclusion for a
/// cofixpoint.
fn measure(env: &Env, ty: &Constr, kind: RecKind, i: usize) -> Option<(Rc<str>, SVar)> {
    let (ctx, concl) = decompose_prod_assum(ty);
    let (env, t, expected) = match kind {
        RecKind::Fix(ks) => {
            let pos = ctx
                .iter()
                .enumerate()
                .filter(|(_, b)| matches!(b, LocalBinder::Assum(..)))
                .nth(ks[i])?
                .0;
            let dom = match &ctx[pos] {
                LocalBinder::Assum(_, dom) => dom.clone(),
                LocalBinder::Def(..) => return None,
            };
            (env.push_binders(&ctx[..pos]), dom, Finiteness::Finite)
        },
        RecKind::CoFix => (env.push_binders(&ctx), concl, Finiteness::CoFinite),
    };
    match find_inductive(&env, &t)? {
        (ind, _, Annot::Stage(Stage::Var(v, _)), _) if finiteness(&env, &ind) == expected => {
            Some((ind.block, v))
        },
        _ => None,
    }
}

impl Checker {
    pub(crate) fn execute_fix(&mut self, env: &Env, fix: &Rc<Fixpoint>) -> KernelResult<Judgment> {
        trace!("fix {} of {} definitions", fix.index, fix.decl.len());
        check_arity(&fix.decl, fix.index, Some(fix.rec_args.len()))?;
        if let Some(ks) = fix.rec_args.iter().copied().collect::<Option<Vec<_>>>() {
            return self.type_fixpoint(env, &fix.decl, RecKind::Fix(&ks), fix.index);
        }
        let candidates = fix
            .rec_args
            .iter()
            .zip(&fix.decl.types)
            .map(|(k, ty)| match k {
                Some(k) => vec![*k],
                None => (0..nassums(ty)).collect(),
            })
            .multi_cartesian_product();
        for ks in candidates {
            let saved = self.stages.clone();
            let ndiag = self.diagnostics.len();
            match self.type_fixpoint(env, &fix.decl, RecKind::Fix(&ks), fix.index) {
                Ok(j) => return Ok(j),
                Err(e) if e.kind().map_or(false, TypeErrorKind::is_termination_failure) => {
                    debug!("decreasing arguments {:?} rejected: {}", ks, e);
                    self.stages = saved;
                    self.diagnostics.truncate(ndiag);
                },
                Err(e) => return Err(e),
            }
        }
        Err(TypeErrorKind::CannotGuessDecreasingArg.at(env))
    }

    pub(crate) fn execute_cofix(&mut self, env: &Env, cofix: &Rc<CoFixpoint>) -> KernelResult<Judgment> {
        trace!("cofix {} of {} definitions", cofix.index, cofix.decl.len());
        check_arity(&cofix.decl, cofix.index, None)?;
        self.type_fixpoint(env, &cofix.decl, RecKind::CoFix, cofix.index)
    }

    fn type_fixpoint(&mut self, env: &Env, decl: &RecDecl, kind: RecKind, index: usize) -> KernelResult<Judgment> {
        self.stages.push_frame();
        let r = self.type_fixpoint_in_frame(env, decl, kind, index);
        self.stages.pop_frame();
        r
    }

    fn type_fixpoint_in_frame(
        &mut self,
        env: &Env,
        decl: &RecDecl,
        kind: RecKind,
        index: usize,
    ) -> KernelResult<Judgment> {
        let n = decl.len();
        let flags = env.flags();
        let mut cs = ConstraintSet::empty();
        let mut names: Vec<Binder> = Vec::with_capacity(n);
        let mut lar: Vec<Constr> = Vec::with_capacity(n);
        for (b, ty) in decl.names.iter().zip(&decl.types) {
            let (jt, s) = self.execute_type(env, ty)?;
            names.push(self.repair_relevance(env, b, &s));
            cs.union_with(&jt.cstrnt);
            lar.push(jt.term);
        }

        if !flags.check_sized {
            return self.type_unsized(env, decl, kind, index, names, lar, cs);
        }

        let mut block: Option<Rc<str>> = None;
        let mut alphas = Vec::with_capacity(n);
        for (i, ty) in lar.iter().enumerate() {
            let not_inductive = || TypeErrorKind::RecursionNotOnInductive { index: i }.at(env);
            let (b, alpha) = measure(env, ty, kind, i).ok_or_else(not_inductive)?;
            match &block {
                Some(b0) if *b0 != b => return Err(not_inductive()),
                Some(_) => (),
                None => block = Some(b),
            }
            alphas.push(alpha);
        }
        let block = block.unwrap_or_else(|| "".into());
        let lar_star: Vec<_> = lar.iter().map(|t| mark_star(t, &block, &mut self.stages)).collect();
        let alpha_set: BTreeSet<SVar> = alphas.iter().copied().collect();

        let env_rec = push_recursive(env, &names, &lar_star);
        let mark = self.stages.allocated();
        let mut bodies = Vec::with_capacity(n);
        for body in &decl.bodies {
            let jb = self.execute(&env_rec, body)?;
            cs.union_with(&jb.cstrnt);
            bodies.push(jb);
        }

        let mut vstar = self.stages.frame_stars();
        loop {
            let vneq: BTreeSet<SVar> = self.stages.vars_below(mark).difference(&vstar).copied().collect();
            let lar_shift: Vec<_> = lar_star.iter().map(|t| shift_stars(t, &vstar)).collect();
            let mut acc = cs.clone();
            for (i, jb) in bodies.iter().enumerate() {
                let expected = lift(n, &lar_shift[i]);
                let c = conv_leq(&env_rec, &jb.ty, &expected).map_err(|_| TypeErrorKind::IllTypedRecBody {
                    index: i,
                    actual: jb.ty.clone(),
                    expected: expected.clone(),
                }.at(&env_rec))?;
                acc.union_with(&c);

                let (ctx, concl_star) = decompose_prod_assum(&lar_star[i]);
                let (_, concl_shift) = decompose_prod_assum(&lar_shift[i]);
                let env_c = env.push_binders(&ctx);
                let monotone = match kind {
                    RecKind::Fix(_) => conv_leq(&env_c, &concl_star, &concl_shift),
                    RecKind::CoFix => conv_leq(&env_c, &concl_shift, &concl_star),
                };
                let c = monotone.map_err(|_| TypeErrorKind::IllTypedRecBody {
                    index: i,
                    actual: concl_star.clone(),
                    expected: concl_shift.clone(),
                }.at(&env_c))?;
                acc.union_with(&c);
            }
            tie_stars(&mut acc, &lar_star, &alphas, &vstar);

            let mut infinite = BTreeSet::new();
            let mut failure = None;
            for &alpha in &alphas {
                match rec_check(alpha, &vstar, &vneq, acc.clone()) {
                    Ok(ok) => {
                        acc = ok.constraints;
                        infinite.extend(ok.infinite);
                    },
                    Err(f) => {
                        failure = Some(f);
                        break;
                    },
                }
            }

            let failure = match failure {
                None => {
                    self.stages.set_infty(infinite);
                    let decl = RecDecl {
                        names,
                        types: lar_star.iter().map(erase_stars).collect(),
                        bodies: bodies.iter().map(|j| erase_stars(&j.term)).collect(),
                    };
                    let ty = decl.types[index].clone();
                    return Ok(Judgment {
                        term: kind.build(decl, index),
                        ty,
                        cstrnt: acc,
                    });
                },
                Some(f) => f,
            };

            let removal: BTreeSet<SVar> = failure
                .implicated()
                .intersection(&vstar)
                .filter(|v| !alpha_set.contains(v))
                .copied()
                .collect();
            if removal.is_empty() {
                let elaborated = RecDecl {
                    names: names.clone(),
                    types: lar.clone(),
                    bodies: bodies.iter().map(|j| j.term.clone()).collect(),
                };
                if flags.check_guarded && kind.guarded(&elaborated).is_ok() {
                    debug!("size check failed, definition accepted by the guard condition");
                    let mut cs = cs;
                    for &v in &vstar {
                        cs.add_stage(Stage::Infty, Stage::var(v));
                    }
                    self.stages.set_infty(vstar);
                    let decl = RecDecl {
                        names,
                        types: lar.iter().map(erase_infty).collect(),
                        bodies: elaborated.bodies.iter().map(erase_stars).collect(),
                    };
                    let ty = decl.types[index].clone();
                    return Ok(Judgment {
                        term: kind.build(decl, index),
                        ty,
                        cstrnt: cs,
                    });
                }
                return Err(TypeErrorKind::UnsatisfiedStageConstraints {
                    inferred: failure.inferred,
                    expected: failure.expected,
                }.at(env));
            }
            debug!("demoting {:?} and checking again", removal);
            for v in removal {
                self.stages.demote(v);
                vstar.remove(&v);
            }
        }
    }

    /// Typing without sizes: bodies against the declared types, termination
    /// left to the guard condition when it is enabled.
    #[allow(clippy::too_many_arguments)]
    fn type_unsized(
        &mut self,
        env: &Env,
        decl: &RecDecl,
        kind: RecKind,
        index: usize,
        names: Vec<Binder>,
        lar: Vec<Constr>,
        mut cs: ConstraintSet,
    ) -> KernelResult<Judgment> {
        let n = decl.len();
        let env_rec = push_recursive(env, &names, &lar);
        let mut bodies = Vec::with_capacity(n);
        for (i, body) in decl.bodies.iter().enumerate() {
            let jb = self.execute(&env_rec, body)?;
            let expected = lift(n, &lar[i]);
            let c = conv_leq(&env_rec, &jb.ty, &expected).map_err(|_| TypeErrorKind::IllTypedRecBody {
                index: i,
                actual: jb.ty.clone(),
                expected: expected.clone(),
            }.at(&env_rec))?;
            cs.union_with(&jb.cstrnt);
            cs.union_with(&c);
            bodies.push(jb.term);
        }
        let decl = RecDecl {
            names,
            types: lar,
            bodies,
        };
        if env.flags().check_guarded {
            if let Err(i) = kind.guarded(&decl) {
                return Err(TypeErrorKind::IllFormedRecBody { index: i }.at(env));
            }
        }
        let ty = decl.types[index].clone();
        Ok(Judgment {
            term: kind.build(decl, index),
            ty,
            cstrnt: cs,
        })
    }
}

/// Pushes the recursive binders; definition `i` sees the `i` before it.
fn push_recursive(env: &Env, names: &[Binder], types: &[Constr]) -> Env {
    names
        .iter()
        .zip(types)
        .enumerate()
        .fold(env.clone(), |env, (i, (b, ty))| env.push_assum(b.clone(), lift(i, ty)))
}

/// Ties every remaining star of a definition to its measure, and the
/// measures of the block to one another.
fn tie_stars(cs: &mut ConstraintSet, lar_star: &[Constr], alphas: &[SVar], vstar: &BTreeSet<SVar>) {
    let tie = |cs: &mut ConstraintSet, a: SVar, b: SVar| {
        cs.add_stage(Stage::var(a), Stage::var(b));
        cs.add_stage(Stage::var(b), Stage::var(a));
    };
    for (ty, &alpha) in lar_star.iter().zip(alphas) {
        for v in star_vars(ty).intersection(vstar) {
            if *v != alpha {
                tie(cs, alpha, *v);
            }
        }
    }
    if let Some((&first, rest)) = alphas.split_first() {
        for &alpha in rest {
            tie(cs, first, alpha);
        }
    }
}
