//! The judgment engine: one typing rule per term construct.
//!
//! [`Checker::execute`] returns the elaborated term (its inductive
//! occurrences and references annotated with sizes), its type and the
//! universe and stage constraints the derivation needs. Annotations never
//! change the logical content of a term; [`infer`] and [`check`] erase them
//! from their results.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::rc::Rc;
use fnv::FnvHashMap;
use log::debug;
use super::annot::{collect_glob, erase, instantiate_glob};
use super::constraint::ConstraintSet;
use super::env::{ConstantBody, Env, Finiteness, LocalDecl, NamedDecl, PrimOp, Universes};
use super::error::{KernelError, KernelResult, TypeErrorKind};
use super::inductive::{
    branch_types, ctor_nargs, elim_allowed, is_record, lookup_mind_specif, motive_arity,
    projection_type, type_of_constructor, type_of_inductive_knowing_parameters, IndSpecif,
};
use super::level::{Level, Universe};
use super::reduce::{
    beta_applist, conv, conv_leq, convert, find_inductive, finiteness, reduce_to_sort, whd_all,
    whd_stack, ConvPb, ConvStrategy,
};
use super::stage::{Annot, StageState};
use super::term::{
    lift, subst1, subst_instance, Annots, Binder, CaseInfo, CastKind, Constr, Ident, IndRef,
    LocalBinder, Relevance, Sort, Term,
};

/// A typing judgment `Γ ⊢ term : ty ↝ cstrnt`.
#[derive(Debug, Clone)]
pub struct Judgment {
    pub term: Constr,
    pub ty: Constr,
    pub cstrnt: ConstraintSet,
}

impl Judgment {
    fn new(term: Constr, ty: Constr, cstrnt: ConstraintSet) -> Self {
        Judgment { term, ty, cstrnt }
    }
}

impl Display for Judgment {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} : {}", self.term, self.ty)?;
        if !self.cstrnt.is_empty() {
            write!(f, " ↝ {}", self.cstrnt)?;
        }
        Ok(())
    }
}

/// A binder whose declared relevance disagreed with the sort of its type.
/// The checker continues with the relevance of the sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub binder: Option<Ident>,
    pub declared: Relevance,
    pub actual: Relevance,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "binder {} is declared {:?} but its type is {:?}",
            self.binder.as_deref().unwrap_or("_"),
            self.declared,
            self.actual,
        )
    }
}

pub(crate) fn sort_of_sort(s: &Sort) -> Sort {
    match s {
        Sort::SProp | Sort::Prop | Sort::Set => Sort::type_(Universe::type1()),
        Sort::Type(u) => Sort::type_(u.super_()),
    }
}

pub(crate) fn sort_of_product(dom: &Sort, cod: &Sort) -> Sort {
    match (dom, cod) {
        (_, Sort::SProp) | (_, Sort::Prop) => cod.clone(),
        (Sort::Type(u), Sort::Set) => Sort::type_(u.sup(&Universe::set())),
        (_, Sort::Set) => Sort::Set,
        (Sort::Type(u1), Sort::Type(u2)) => Sort::type_(u1.sup(u2)),
        (_, Sort::Type(_)) => cod.clone(),
    }
}

fn is_template(env: &Env, ind: &IndRef) -> bool {
    lookup_mind_specif(env.globals(), ind)
        .map_or(false, |(mib, _)| matches!(mib.universes, Universes::Template { .. }))
}

/// Sort concluding `ty` after `n` products, reducing as needed.
fn arity_sort(env: &Env, ty: &Constr, n: usize) -> Option<Sort> {
    let mut env = env.clone();
    let mut t = ty.clone();
    for _ in 0..n {
        let w = whd_all(&env, &t);
        match &*w {
            Term::Prod(b, dom, cod) => {
                env = env.push_assum(b.clone(), dom.clone());
                t = cod.clone();
            },
            _ => return None,
        }
    }
    reduce_to_sort(&env, &t)
}

/// Runs the typing rules over terms, owning the size variables allocated
/// along the way.
#[derive(Debug, Default)]
pub struct Checker {
    pub(crate) stages: StageState,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &StageState {
        &self.stages
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn repair_relevance(&mut self, env: &Env, b: &Binder, sort: &Sort) -> Binder {
        let actual = sort.relevance();
        if b.relevance == actual {
            return b.clone();
        }
        debug!(
            "relevance of {} repaired from {:?} to {:?}",
            b, b.relevance, actual,
        );
        if env.flags().report_relevance {
            self.diagnostics.push(Diagnostic {
                binder: b.name.clone(),
                declared: b.relevance,
                actual,
            });
        }
        b.with_relevance(actual)
    }

    /// Types `t` and requires its type to reduce to a sort.
    pub fn execute_type(&mut self, env: &Env, t: &Constr) -> KernelResult<(Judgment, Sort)> {
        let j = self.execute(env, t)?;
        match reduce_to_sort(env, &j.ty) {
            Some(s) => Ok((j, s)),
            None => Err(TypeErrorKind::NotAType {
                term: t.clone(),
                ty: j.ty,
            }.at(env)),
        }
    }

    fn execute_all(&mut self, env: &Env, ts: &[Constr]) -> KernelResult<Vec<Judgment>> {
        ts.iter().map(|t| self.execute(env, t)).collect()
    }

    pub fn execute(&mut self, env: &Env, t: &Constr) -> KernelResult<Judgment> {
        match &**t {
            Term::Sort(s) => {
                if env.flags().check_universes {
                    let levels = env.globals().levels();
                    if let Some(l) = s.universe().levels().find(|&l| !levels.is_declared(l)) {
                        return Err(TypeErrorKind::UndeclaredLevel(l).at(env));
                    }
                }
                Ok(Judgment::new(t.clone(), Term::sort(sort_of_sort(s)), ConstraintSet::empty()))
            },
            Term::Rel(n, annots) => {
                let decl = env
                    .lookup_rel(*n)
                    .ok_or_else(|| TypeErrorKind::UnboundRel(*n).at(env))?;
                let ty = lift(n + 1, decl.ty());
                let (ty, annots) = self.instantiate_sizes(&ty, annots);
                Ok(Judgment::new(Rc::new(Term::Rel(*n, annots)), ty, ConstraintSet::empty()))
            },
            Term::Var(id, annots) => {
                let decl = env
                    .lookup_named(id)
                    .ok_or_else(|| TypeErrorKind::UnboundVar(id.clone()).at(env))?;
                let (ty, annots) = self.instantiate_sizes(&decl.ty, annots);
                Ok(Judgment::new(Rc::new(Term::Var(id.clone(), annots)), ty, ConstraintSet::empty()))
            },
            Term::Const(c, u, annots) => self.execute_const(env, t, c, u, annots),
            Term::Proj(pr, c) => {
                let jc = self.execute(env, c)?;
                let not_record = || TypeErrorKind::NotARecord(pr.ind.clone()).at(env);
                let (ind, u, _, args) = find_inductive(env, &jc.ty).ok_or_else(not_record)?;
                let spec = lookup_mind_specif(env.globals(), &ind).ok_or_else(not_record)?;
                if ind != pr.ind || !is_record(spec.0, spec.1) || args.len() < pr.npars {
                    return Err(not_record());
                }
                let ty = projection_type(spec, pr, &u, &args[..pr.npars], &jc.term)
                    .ok_or_else(not_record)?;
                Ok(Judgment::new(Rc::new(Term::Proj(pr.clone(), jc.term)), ty, jc.cstrnt))
            },
            Term::App(f, args) => {
                let (jf, jargs) = match &**f {
                    Term::Ind(ind, u, a) if is_template(env, ind) => {
                        let jargs = self.execute_all(env, args)?;
                        let sorts: Vec<_> = jargs.iter().map(|j| reduce_to_sort(env, &j.ty)).collect();
                        (self.execute_ind(env, ind, u, *a, &sorts)?, jargs)
                    },
                    _ => {
                        let jf = self.execute(env, f)?;
                        (jf, self.execute_all(env, args)?)
                    },
                };
                self.apply(env, jf, jargs)
            },
            Term::Lambda(b, ty, body) => {
                let (jt, s) = self.execute_type(env, ty)?;
                let b = self.repair_relevance(env, b, &s);
                let jb = self.execute(&env.push_assum(b.clone(), jt.term.clone()), body)?;
                Ok(Judgment::new(
                    Term::lambda(b.clone(), jt.term.clone(), jb.term),
                    Term::prod(b, jt.term, jb.ty),
                    jt.cstrnt.union(&jb.cstrnt),
                ))
            },
            Term::Prod(b, dom, cod) => {
                let (jd, s1) = self.execute_type(env, dom)?;
                let b = self.repair_relevance(env, b, &s1);
                let (jc, s2) = self.execute_type(&env.push_assum(b.clone(), jd.term.clone()), cod)?;
                Ok(Judgment::new(
                    Term::prod(b, jd.term, jc.term),
                    Term::sort(sort_of_product(&s1, &s2)),
                    jd.cstrnt.union(&jc.cstrnt),
                ))
            },
            Term::LetIn(b, value, ty, body) => {
                let (jt, s) = self.execute_type(env, ty)?;
                let jv = self.execute(env, value)?;
                let cs = conv_leq(env, &jv.ty, &jt.term).map_err(|_| TypeErrorKind::ActualType {
                    term: value.clone(),
                    actual: jv.ty.clone(),
                    expected: jt.term.clone(),
                }.at(env))?;
                let b = self.repair_relevance(env, b, &s);
                let inner = env.push_rel(LocalDecl::Def(b.clone(), jv.term.clone(), jt.term.clone()));
                let jb = self.execute(&inner, body)?;
                Ok(Judgment::new(
                    Term::let_in(b, jv.term.clone(), jt.term, jb.term),
                    subst1(&jv.term, &jb.ty),
                    jt.cstrnt.union(&jv.cstrnt).union(&cs).union(&jb.cstrnt),
                ))
            },
            Term::Cast(c, k, ty) => self.execute_cast(env, c, *k, ty),
            Term::Ind(ind, u, a) => self.execute_ind(env, ind, u, *a, &[]),
            Term::Construct(ctor, u) => {
                let unbound = || TypeErrorKind::UnboundReference(ctor.ind.block.clone()).at(env);
                let spec = lookup_mind_specif(env.globals(), &ctor.ind).ok_or_else(unbound)?;
                let mut cs = self.check_hyps(env, &spec.0.hyps, t)?;
                cs.union_with(&self.check_instance(env, &ctor.ind.block, &spec.0.universes, u)?);
                let cty = type_of_constructor(spec, ctor, u).ok_or_else(unbound)?;
                let (ty, _) = self.instantiate_sizes(&cty, &None);
                Ok(Judgment::new(t.clone(), ty, cs))
            },
            Term::Case(ci, p, c, brs) => self.execute_case(env, ci, p, c, brs),
            Term::Fix(fix) => self.execute_fix(env, fix),
            Term::CoFix(cofix) => self.execute_cofix(env, cofix),
            Term::Int(_) => {
                let int = env.globals().prims.int.clone().ok_or(KernelError::Configuration("int"))?;
                Ok(Judgment::new(t.clone(), Term::constant(&int), ConstraintSet::empty()))
            },
            Term::Evar(e) => Err(KernelError::Anomaly(format!("existential ?{} reached the kernel", e))),
        }
    }

    /// Gives each size-polymorphic variable of a reference's type a stage,
    /// reusing the reference's own annotations when they fit.
    fn instantiate_sizes(&mut self, ty: &Constr, annots: &Annots) -> (Constr, Annots) {
        let globs = collect_glob(ty);
        if globs.is_empty() {
            return (ty.clone(), None);
        }
        let stages: Vec<_> = match annots {
            Some(v) if v.len() == globs.len() => v.iter().map(|a| a.stage()).collect(),
            _ => globs.iter().map(|_| self.stages.next_stage()).collect(),
        };
        let subst: FnvHashMap<_, _> = globs.iter().copied().zip(stages.iter().copied()).collect();
        (instantiate_glob(ty, &subst), Some(stages.into_iter().map(Annot::Stage).collect()))
    }

    /// Every hypothesis of a global must be a section variable in scope with
    /// a convertible type. Bodies are compared only when both sides have one.
    fn check_hyps(&self, env: &Env, hyps: &[NamedDecl], reference: &Constr) -> KernelResult<ConstraintSet> {
        let mut cs = ConstraintSet::empty();
        for h in hyps {
            let mismatch = || TypeErrorKind::ReferenceVariables {
                id: h.id.clone(),
                reference: reference.clone(),
            }.at(env);
            let d = env.lookup_named(&h.id).ok_or_else(mismatch)?;
            cs.union_with(&conv(env, &d.ty, &h.ty).map_err(|_| mismatch())?);
            if let (Some(v), Some(hv)) = (&d.value, &h.value) {
                cs.union_with(&conv(env, v, hv).map_err(|_| mismatch())?);
            }
        }
        Ok(cs)
    }

    fn check_instance(
        &self,
        env: &Env,
        reference: &Ident,
        univs: &Universes,
        u: &[Level],
    ) -> KernelResult<ConstraintSet> {
        let expected = univs.nlevels();
        if u.len() != expected {
            return Err(TypeErrorKind::BadInstance {
                reference: reference.clone(),
                expected,
                found: u.len(),
            }.at(env));
        }
        let check = env.flags().check_universes;
        let levels = env.globals().levels();
        if check {
            if let Some(&l) = u.iter().find(|&&l| !levels.is_declared(l)) {
                return Err(TypeErrorKind::UndeclaredLevel(l).at(env));
            }
        }
        match univs {
            Universes::Polymorphic { constraints, .. } => {
                let cs = constraints.subst_instance(u);
                if check && !levels.check_constraints(&cs) {
                    return Err(TypeErrorKind::UnsatisfiedConstraints(cs).at(env));
                }
                Ok(cs)
            },
            _ => Ok(ConstraintSet::empty()),
        }
    }

    fn check_primitive(&self, env: &Env, op: PrimOp, ty: &Constr) -> KernelResult<()> {
        let prims = &env.globals().prims;
        let int = Term::constant(prims.int.as_deref().ok_or(KernelError::Configuration("int"))?);
        let ret = if op.returns_bool() {
            Term::ind(prims.bool.clone().ok_or(KernelError::Configuration("bool"))?)
        } else {
            int.clone()
        };
        let expected = Term::arrow(int.clone(), Term::arrow(int, ret));
        if conv(env, &erase(ty), &expected).is_err() {
            return Err(TypeErrorKind::IncorrectPrimitive {
                op,
                expected,
                actual: ty.clone(),
            }.at(env));
        }
        Ok(())
    }

    fn execute_const(
        &mut self,
        env: &Env,
        t: &Constr,
        c: &Ident,
        u: &[Level],
        annots: &Annots,
    ) -> KernelResult<Judgment> {
        let decl = env
            .globals()
            .lookup_constant(c)
            .ok_or_else(|| TypeErrorKind::UnboundReference(c.clone()).at(env))?;
        let mut cs = self.check_hyps(env, &decl.hyps, t)?;
        cs.union_with(&self.check_instance(env, c, &decl.universes, u)?);
        if let ConstantBody::Primitive(op) = decl.body {
            self.check_primitive(env, op, &decl.ty)?;
        }
        let (ty, annots) = self.instantiate_sizes(&subst_instance(&decl.ty, u), annots);
        Ok(Judgment::new(Rc::new(Term::Const(c.clone(), u.to_vec(), annots)), ty, cs))
    }

    fn execute_ind(
        &mut self,
        env: &Env,
        ind: &IndRef,
        u: &[Level],
        a: Annot,
        param_sorts: &[Option<Sort>],
    ) -> KernelResult<Judgment> {
        let spec = lookup_mind_specif(env.globals(), ind)
            .ok_or_else(|| TypeErrorKind::UnboundReference(ind.block.clone()).at(env))?;
        let term = Rc::new(Term::Ind(ind.clone(), u.to_vec(), a));
        let mut cs = self.check_hyps(env, &spec.0.hyps, &term)?;
        cs.union_with(&self.check_instance(env, &ind.block, &spec.0.universes, u)?);
        let a = match a {
            Annot::Empty => Annot::Stage(self.stages.next_stage()),
            a => a,
        };
        let ty = type_of_inductive_knowing_parameters(spec, u, param_sorts);
        Ok(Judgment::new(Rc::new(Term::Ind(ind.clone(), u.to_vec(), a)), ty, cs))
    }

    fn apply(&mut self, env: &Env, jf: Judgment, jargs: Vec<Judgment>) -> KernelResult<Judgment> {
        let mut ty = jf.ty.clone();
        let mut cs = jf.cstrnt.clone();
        for (i, ja) in jargs.iter().enumerate() {
            let (head, stack) = whd_stack(env, &ty);
            let next = match &*head {
                Term::Prod(_, dom, cod) if stack.is_empty() => {
                    let c = conv_leq(env, &ja.ty, dom).map_err(|_| TypeErrorKind::CantApplyBadType {
                        index: i + 1,
                        expected: dom.clone(),
                        actual: ja.ty.clone(),
                    }.at(env))?;
                    cs.union_with(&c);
                    cs.union_with(&ja.cstrnt);
                    subst1(&ja.term, cod)
                },
                Term::Prod(..) => {
                    return Err(KernelError::Anomaly(format!("product {} left applied", head)));
                },
                _ => return Err(TypeErrorKind::CantApplyNotFunctional {
                    func: jf.term.clone(),
                    func_ty: jf.ty.clone(),
                }.at(env)),
            };
            ty = next;
        }
        let term = Term::app(jf.term, jargs.into_iter().map(|j| j.term).collect());
        Ok(Judgment::new(term, ty, cs))
    }

    fn execute_cast(&mut self, env: &Env, c: &Constr, k: CastKind, ty: &Constr) -> KernelResult<Judgment> {
        let jc = self.execute(env, c)?;
        let (jt, _) = self.execute_type(env, ty)?;
        let cs = convert(env, ConvPb::Cumul, ConvStrategy::from(k), &jc.ty, &jt.term).map_err(|_| {
            TypeErrorKind::ActualType {
                term: c.clone(),
                actual: jc.ty.clone(),
                expected: jt.term.clone(),
            }.at(env)
        })?;
        Ok(Judgment::new(
            Term::cast(jc.term, k, jt.term.clone()),
            jt.term,
            jc.cstrnt.union(&jt.cstrnt).union(&cs),
        ))
    }

    fn execute_case(
        &mut self,
        env: &Env,
        ci: &Rc<CaseInfo>,
        p: &Constr,
        c: &Constr,
        brs: &[Constr],
    ) -> KernelResult<Judgment> {
        let jc = self.execute(env, c)?;
        let not_inductive = || TypeErrorKind::CaseNotInductive {
            term: c.clone(),
            ty: jc.ty.clone(),
        }.at(env);
        let (ind, u, annot, args) = find_inductive(env, &jc.ty).ok_or_else(not_inductive)?;
        let wrong = || TypeErrorKind::WrongCaseInfo(ci.ind.clone()).at(env);
        let spec: IndSpecif = lookup_mind_specif(env.globals(), &ind).ok_or_else(wrong)?;
        let (mib, mip) = spec;
        if ind != ci.ind || ci.npar != mib.nparams() || ci.cstr_nargs != ctor_nargs(spec) {
            return Err(wrong());
        }
        if args.len() < ci.npar {
            return Err(not_inductive());
        }
        let (params, indices) = args.split_at(ci.npar);

        let mut cs = jc.cstrnt.clone();
        let r = annot.stage();
        let s = self.stages.next_stage();
        match finiteness(env, &ind) {
            Finiteness::CoFinite => cs.add_stage(s.succ(), r),
            _ => cs.add_stage(r, s.succ()),
        }

        let jp = self.execute(env, p)?;
        cs.union_with(&jp.cstrnt);
        let bad_motive = || TypeErrorKind::ElimArity {
            ind: ind.clone(),
            motive_ty: jp.ty.clone(),
        }.at(env);
        let nidx = mip.indices.iter().filter(|b| matches!(b, LocalBinder::Assum(..))).count();
        let sort_p = arity_sort(env, &jp.ty, nidx + 1).ok_or_else(bad_motive)?;
        let expected = motive_arity(spec, &ind, &u, params, s.succ(), sort_p.clone()).ok_or_else(bad_motive)?;
        let c_motive = convert(env, ConvPb::Cumul, ConvStrategy::Default, &jp.ty, &expected)
            .map_err(|_| bad_motive())?;
        cs.union_with(&c_motive);
        if !elim_allowed(mip, mib.nparams(), &sort_p) {
            return Err(bad_motive());
        }

        let relevance = sort_p.relevance();
        let ci = if ci.relevance == relevance {
            ci.clone()
        } else {
            let b = Binder {
                name: Some(mip.name.clone()),
                relevance: ci.relevance,
            };
            self.repair_relevance(env, &b, &sort_p);
            Rc::new(CaseInfo {
                relevance,
                ..(**ci).clone()
            })
        };

        if brs.len() != mip.ctors.len() {
            return Err(TypeErrorKind::NumberBranches {
                expected: mip.ctors.len(),
                found: brs.len(),
            }.at(env));
        }
        let expected_brs = branch_types(spec, &ind, &u, params, &jp.term, s).ok_or_else(wrong)?;
        let mut terms = Vec::with_capacity(brs.len());
        for (index, (br, expected)) in brs.iter().zip(expected_brs).enumerate() {
            let jb = self.execute(env, br)?;
            let cb = conv_leq(env, &jb.ty, &expected).map_err(|_| TypeErrorKind::IllFormedBranch {
                index,
                actual: jb.ty.clone(),
                expected: expected.clone(),
            }.at(env))?;
            cs.union_with(&jb.cstrnt);
            cs.union_with(&cb);
            terms.push(jb.term);
        }

        let mut margs = indices.to_vec();
        margs.push(jc.term.clone());
        let ty = beta_applist(&jp.term, &margs);
        let term = Rc::new(Term::Case(ci, jp.term, jc.term, terms));
        Ok(Judgment::new(term, ty, cs))
    }
}

/// Checks the universe part of `cs` and returns it.
fn universe_checkpoint(env: &Env, cs: &ConstraintSet) -> KernelResult<ConstraintSet> {
    if env.flags().check_universes && !env.globals().levels().check_constraints(cs) {
        return Err(TypeErrorKind::UnsatisfiedConstraints(cs.clone()).at(env));
    }
    Ok(cs.universe_part())
}

/// Infers the type of `t`, with its size annotations erased.
pub fn infer(env: &Env, t: &Constr) -> KernelResult<(Constr, ConstraintSet)> {
    let mut checker = Checker::new();
    let j = checker.execute(env, t)?;
    let cs = universe_checkpoint(env, &j.cstrnt)?;
    Ok((erase(&j.ty), cs))
}

pub fn infer_type(env: &Env, t: &Constr) -> KernelResult<(Sort, ConstraintSet)> {
    let mut checker = Checker::new();
    let (j, s) = checker.execute_type(env, t)?;
    let cs = universe_checkpoint(env, &j.cstrnt)?;
    Ok((s, cs))
}

/// Checks `t` against `ty`.
pub fn check(env: &Env, t: &Constr, ty: &Constr) -> KernelResult<ConstraintSet> {
    let mut checker = Checker::new();
    let j = checker.execute(env, t)?;
    let (jt, _) = checker.execute_type(env, ty)?;
    let cs = conv_leq(env, &j.ty, &jt.term).map_err(|_| TypeErrorKind::ActualType {
        term: t.clone(),
        actual: j.ty.clone(),
        expected: jt.term.clone(),
    }.at(env))?;
    let cs = j.cstrnt.union(&jt.cstrnt).union(&cs);
    universe_checkpoint(env, &cs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::env::{ConstantDecl, GlobalContext, TypingFlags};
    use crate::tt::stage::{SVar, Stage};

    fn env() -> Env {
        Env::new(Rc::new(GlobalContext::new(TypingFlags::default())))
    }

    #[test]
    fn sorts() {
        let (ty, cs) = infer(&env(), &Term::prop()).unwrap();
        assert_eq!(ty, Term::type_(Universe::type1()));
        assert!(cs.is_empty());
        let all = Term::prod(Binder::named("P"), Term::prop(), Term::rel(0));
        let (s, _) = infer_type(&env(), &all).unwrap();
        assert_eq!(s, Sort::Prop);
    }

    #[test]
    fn unbound_rel() {
        let err = infer(&env(), &Term::rel(0)).unwrap_err();
        assert!(matches!(err.kind(), Some(TypeErrorKind::UnboundRel(0))));
    }

    #[test]
    fn not_functional() {
        let t = Term::app(Term::set(), vec![Term::set()]);
        let err = infer(&env(), &t).unwrap_err();
        assert!(matches!(err.kind(), Some(TypeErrorKind::CantApplyNotFunctional { .. })));
    }

    #[test]
    fn let_substitutes_into_the_type() {
        let ty = Term::type_(Universe::type1());
        let t = Term::let_in(
            Binder::named("A"),
            Term::set(),
            ty,
            Term::lambda(Binder::named("x"), Term::rel(0), Term::rel(0)),
        );
        let (ty, _) = infer(&env(), &t).unwrap();
        assert!(conv(&env(), &ty, &Term::arrow(Term::set(), Term::set())).is_ok());
    }

    #[test]
    fn evar_is_an_anomaly() {
        let err = infer(&env(), &Rc::new(Term::Evar(3))).unwrap_err();
        assert!(matches!(err, KernelError::Anomaly(_)));
    }

    #[test]
    fn size_polymorphic_constants_get_fresh_stages() {
        let mut g = GlobalContext::new(TypingFlags::default());
        let nat = IndRef::new("nat", 0);
        let glob = |k| Rc::new(Term::Ind(nat.clone(), vec![], Annot::Glob(Stage::Var(SVar(0), k))));
        g.add_constant("pred", ConstantDecl::axiom(Term::arrow(glob(1), glob(0))));
        let env = Env::new(Rc::new(g));
        let mut checker = Checker::new();
        let j = checker.execute(&env, &Term::constant("pred")).unwrap();
        let s = Stage::var(SVar(0));
        assert_eq!(*j.term, Term::Const("pred".into(), vec![], Some(vec![Annot::Stage(s)])));
        let at = |st| Rc::new(Term::Ind(nat.clone(), vec![], Annot::Stage(st)));
        assert_eq!(j.ty, Term::arrow(at(s.succ()), at(s)));
        let again = checker.execute(&env, &j.term).unwrap();
        assert_eq!(again.ty, j.ty);
        assert_eq!(checker.stages().allocated(), 1);
    }
}
