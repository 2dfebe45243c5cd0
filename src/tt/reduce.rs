//! Weak-head reduction and conversion.
//!
//! Conversion compares weak-head normal forms structurally and records the
//! universe and stage constraints under which the two sides are related.

use std::rc::Rc;
use log::trace;
use thiserror::Error;
use super::constraint::ConstraintSet;
use super::env::{ConstantBody, Env, Finiteness, LocalDecl, PrimOp};
use super::level::{ConstraintKind, Level, UnivConstraint, Universe};
use super::stage::{Annot, Stage};
use super::term::{
    decompose_app, lift, subst1, subst_instance, substl, Binder, CastKind, CoFixpoint, Constr,
    CtorRef, Fixpoint, IndRef, Instance, RecDecl, Sort, Term,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("terms are not convertible")]
pub struct NotConvertible;

type ConvResult<T = ()> = Result<T, NotConvertible>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvPb {
    Conv,
    Cumul,
}

/// How stages relate on the two sides of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Co,
    Contra,
    Inv,
}

impl Variance {
    fn flip(self) -> Self {
        match self {
            Variance::Co => Variance::Contra,
            Variance::Contra => Variance::Co,
            Variance::Inv => Variance::Inv,
        }
    }
}

/// Reduction order used by conversion. All strategies decide the same
/// relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvStrategy {
    Default,
    Reversed,
    Vm,
    Native,
}

impl From<CastKind> for ConvStrategy {
    fn from(k: CastKind) -> Self {
        match k {
            CastKind::Default => ConvStrategy::Default,
            CastKind::Revert => ConvStrategy::Reversed,
            CastKind::Vm => ConvStrategy::Vm,
            CastKind::Native => ConvStrategy::Native,
        }
    }
}

const INT_MASK: u64 = (1 << 63) - 1;

fn prim_int(op: PrimOp, a: u64, b: u64) -> Result<u64, bool> {
    Ok(match op {
        PrimOp::Add => a.wrapping_add(b) & INT_MASK,
        PrimOp::Sub => a.wrapping_sub(b) & INT_MASK,
        PrimOp::Mul => a.wrapping_mul(b) & INT_MASK,
        PrimOp::Div => if b == 0 { 0 } else { a / b },
        PrimOp::Mod => if b == 0 { a } else { a % b },
        PrimOp::Eqb => return Err(a == b),
        PrimOp::Ltb => return Err(a < b),
        PrimOp::Leb => return Err(a <= b),
    })
}

fn bool_value(env: &Env, b: bool) -> Option<Constr> {
    let ind = env.globals().prims.bool.clone()?;
    Some(Rc::new(Term::Construct(CtorRef::new(ind, if b { 0 } else { 1 }), Vec::new())))
}

fn whd_int(env: &Env, t: &Constr) -> Option<u64> {
    match &*whd_all(env, t) {
        Term::Int(i) => Some(*i),
        _ => None,
    }
}

fn contract_fix(fix: &Rc<Fixpoint>) -> Constr {
    let n = fix.decl.len();
    let copies: Vec<_> = (0..n)
        .map(|i| Term::fix(Fixpoint { index: i, ..(**fix).clone() }))
        .collect();
    substl(&copies, &fix.decl.bodies[fix.index])
}

fn contract_cofix(cofix: &Rc<CoFixpoint>) -> Constr {
    let n = cofix.decl.len();
    let copies: Vec<_> = (0..n)
        .map(|i| Term::cofix(CoFixpoint { index: i, decl: cofix.decl.clone() }))
        .collect();
    substl(&copies, &cofix.decl.bodies[cofix.index])
}

/// Reduces `t` to weak-head normal form, returning the head and the
/// arguments it is applied to.
pub fn whd_stack(env: &Env, t: &Constr) -> (Constr, Vec<Constr>) {
    let mut head = t.clone();
    let mut stack: Vec<Constr> = Vec::new();
    loop {
        let next = match &*head {
            Term::App(f, args) => {
                let mut s = args.clone();
                s.extend(stack.drain(..));
                stack = s;
                f.clone()
            },
            Term::Cast(c, _, _) => c.clone(),
            Term::Lambda(_, _, body) if !stack.is_empty() => {
                let arg = stack.remove(0);
                subst1(&arg, body)
            },
            Term::LetIn(_, v, _, body) => subst1(v, body),
            Term::Rel(n, _) => match env.lookup_rel(*n) {
                Some(LocalDecl::Def(_, v, _)) => lift(n + 1, v),
                _ => break,
            },
            Term::Var(id, _) => match env.lookup_named(id).and_then(|d| d.value.clone()) {
                Some(v) => v,
                None => break,
            },
            Term::Const(c, u, _) => match env.globals().lookup_constant(c).map(|d| &d.body) {
                Some(ConstantBody::Def(b)) => subst_instance(b, u),
                Some(ConstantBody::Primitive(op)) if stack.len() >= op.arity() => {
                    let a = whd_int(env, &stack[0]);
                    let b = whd_int(env, &stack[1]);
                    let value = match (a, b) {
                        (Some(a), Some(b)) => match prim_int(*op, a, b) {
                            Ok(i) => Some(Term::int(i)),
                            Err(b) => bool_value(env, b),
                        },
                        _ => None,
                    };
                    match value {
                        Some(v) => {
                            stack.drain(..op.arity());
                            v
                        },
                        None => break,
                    }
                },
                _ => break,
            },
            Term::Case(ci, p, c, brs) => {
                let (ch, cargs) = whd_stack(env, c);
                match &*ch {
                    Term::Construct(ctor, _) if ctor.index < brs.len() => {
                        let mut s: Vec<_> = cargs.iter().skip(ci.npar).cloned().collect();
                        s.extend(stack.drain(..));
                        stack = s;
                        brs[ctor.index].clone()
                    },
                    Term::CoFix(cofix) => {
                        let unfolded = Term::app(contract_cofix(cofix), cargs);
                        Rc::new(Term::Case(ci.clone(), p.clone(), unfolded, brs.clone()))
                    },
                    _ => break,
                }
            },
            Term::Proj(pr, c) => {
                let (ch, cargs) = whd_stack(env, c);
                match &*ch {
                    Term::Construct(..) => match cargs.get(pr.npars + pr.field) {
                        Some(a) => a.clone(),
                        None => break,
                    },
                    Term::CoFix(cofix) => {
                        let unfolded = Term::app(contract_cofix(cofix), cargs);
                        Rc::new(Term::Proj(pr.clone(), unfolded))
                    },
                    _ => break,
                }
            },
            Term::Fix(fix) => {
                let k = match fix.rec_args.get(fix.index).copied().flatten() {
                    Some(k) if k < stack.len() => k,
                    _ => break,
                };
                let arg = whd_all(env, &stack[k]);
                if !matches!(&**decompose_app(&arg).0, Term::Construct(..)) {
                    break;
                }
                stack[k] = arg;
                contract_fix(fix)
            },
            _ => break,
        };
        head = next;
    }
    (head, stack)
}

pub fn whd_all(env: &Env, t: &Constr) -> Constr {
    let (head, stack) = whd_stack(env, t);
    Term::app(head, stack)
}

/// Beta-reduces `f` applied to `args` as far as `f` is a literal abstraction.
pub fn beta_applist(f: &Constr, args: &[Constr]) -> Constr {
    let mut f = f.clone();
    let mut i = 0;
    while i < args.len() {
        let next = match &*f {
            Term::Lambda(_, _, body) => subst1(&args[i], body),
            _ => break,
        };
        f = next;
        i += 1;
    }
    Term::app(f, args[i..].to_vec())
}

pub fn reduce_to_sort(env: &Env, t: &Constr) -> Option<Sort> {
    whd_all(env, t).as_sort().cloned()
}

/// Exposes an inductive type: the reference, its instance, its size
/// annotation and its arguments.
pub fn find_inductive(env: &Env, t: &Constr) -> Option<(IndRef, Instance, Annot, Vec<Constr>)> {
    let (head, args) = whd_stack(env, t);
    match &*head {
        Term::Ind(ind, u, a) => Some((ind.clone(), u.clone(), *a, args)),
        _ => None,
    }
}

pub fn finiteness(env: &Env, ind: &IndRef) -> Finiteness {
    env.globals()
        .lookup_mind(&ind.block)
        .map(|mib| mib.finite)
        .unwrap_or(Finiteness::Finite)
}

fn push_univ(cs: &mut ConstraintSet, l: Level, kind: ConstraintKind, r: Level) {
    let trivial = match kind {
        ConstraintKind::Le => l == r || l == Level::Set,
        ConstraintKind::Eq => l == r,
        ConstraintKind::Lt => false,
    };
    if !trivial {
        cs.add_univ(UnivConstraint::new(l, kind, r));
    }
}

/// Records `u <= v`, failing when `v` is an algebraic maximum that does not
/// already dominate `u`.
pub fn enforce_leq(u: &Universe, v: &Universe, cs: &mut ConstraintSet) -> ConvResult {
    for &(l1, k1) in u.entries() {
        let dominated = v.entries().iter().any(|&(l2, k2)| (l1 == l2 || l1 == Level::Set) && k1 <= k2);
        if dominated {
            continue;
        }
        match v.entries() {
            &[(l2, k2)] if k1 <= k2 => push_univ(cs, l1, ConstraintKind::Le, l2),
            &[(l2, k2)] if k1 == k2 + 1 && l1 != l2 => push_univ(cs, l1, ConstraintKind::Lt, l2),
            _ => return Err(NotConvertible),
        }
    }
    Ok(())
}

pub fn enforce_eq(u: &Universe, v: &Universe, cs: &mut ConstraintSet) -> ConvResult {
    if u == v {
        return Ok(());
    }
    match (u.entries(), v.entries()) {
        (&[(l1, k1)], &[(l2, k2)]) if k1 == k2 => {
            push_univ(cs, l1, ConstraintKind::Eq, l2);
            Ok(())
        },
        _ => {
            enforce_leq(u, v, cs)?;
            enforce_leq(v, u, cs)
        },
    }
}

fn sort_cmp(pb: ConvPb, s1: &Sort, s2: &Sort, cs: &mut ConstraintSet) -> ConvResult {
    match (pb, s1, s2) {
        (_, Sort::SProp, Sort::SProp) | (_, Sort::Prop, Sort::Prop) | (_, Sort::Set, Sort::Set) => Ok(()),
        (ConvPb::Cumul, Sort::Prop, Sort::Set)
        | (ConvPb::Cumul, Sort::Prop, Sort::Type(_))
        | (ConvPb::Cumul, Sort::Set, Sort::Type(_)) => Ok(()),
        (ConvPb::Conv, Sort::Type(_), Sort::Type(_))
        | (ConvPb::Conv, Sort::Type(_), Sort::Set)
        | (ConvPb::Conv, Sort::Set, Sort::Type(_)) => enforce_eq(&s1.universe(), &s2.universe(), cs),
        (ConvPb::Cumul, Sort::Type(u), Sort::Type(v)) => enforce_leq(u, v, cs),
        (ConvPb::Cumul, Sort::Type(u), Sort::Set) => enforce_leq(u, &Universe::set(), cs),
        _ => Err(NotConvertible),
    }
}

fn instance_eq(u: &[Level], v: &[Level], cs: &mut ConstraintSet) -> ConvResult {
    if u.len() != v.len() {
        return Err(NotConvertible);
    }
    for (&a, &b) in u.iter().zip(v) {
        push_univ(cs, a, ConstraintKind::Eq, b);
    }
    Ok(())
}

struct Converter {
    strategy: ConvStrategy,
    cs: ConstraintSet,
}

impl Converter {
    fn stage_cmp(&mut self, env: &Env, ind: &IndRef, var: Variance, a: Stage, b: Stage) {
        let (lo, hi) = match finiteness(env, ind) {
            Finiteness::CoFinite => (b, a),
            _ => (a, b),
        };
        match var {
            Variance::Co => self.cs.add_stage(lo, hi),
            Variance::Contra => self.cs.add_stage(hi, lo),
            Variance::Inv => {
                self.cs.add_stage(lo, hi);
                self.cs.add_stage(hi, lo);
            },
        }
    }

    fn conv(&mut self, env: &Env, pb: ConvPb, var: Variance, a: &Constr, b: &Constr) -> ConvResult {
        if Rc::ptr_eq(a, b) || a == b {
            return Ok(());
        }
        let ((ha, sa), (hb, sb)) = match self.strategy {
            ConvStrategy::Reversed => {
                let rb = whd_stack(env, b);
                (whd_stack(env, a), rb)
            },
            _ => (whd_stack(env, a), whd_stack(env, b)),
        };
        self.conv_whnf(env, pb, var, (&ha, &sa), (&hb, &sb))
    }

    fn conv_stacks(&mut self, env: &Env, sa: &[Constr], sb: &[Constr]) -> ConvResult {
        if sa.len() != sb.len() {
            return Err(NotConvertible);
        }
        for (x, y) in sa.iter().zip(sb) {
            self.conv(env, ConvPb::Conv, Variance::Inv, x, y)?;
        }
        Ok(())
    }

    fn conv_recdecl(&mut self, env: &Env, d1: &RecDecl, d2: &RecDecl) -> ConvResult {
        if d1.len() != d2.len() {
            return Err(NotConvertible);
        }
        for (t1, t2) in d1.types.iter().zip(&d2.types) {
            self.conv(env, ConvPb::Conv, Variance::Inv, t1, t2)?;
        }
        let inner = d1.types.iter().zip(&d1.names).enumerate().fold(env.clone(), |env, (i, (ty, b))| {
            env.push_assum(b.clone(), lift(i, ty))
        });
        for (b1, b2) in d1.bodies.iter().zip(&d2.bodies) {
            self.conv(&inner, ConvPb::Conv, Variance::Inv, b1, b2)?;
        }
        Ok(())
    }

    fn eta(&mut self, env: &Env, b: &Binder, dom: &Constr, body: &Constr, other: Constr) -> ConvResult {
        let expanded = Term::app(lift(1, &other), vec![Term::rel(0)]);
        self.conv(&env.push_assum(b.clone(), dom.clone()), ConvPb::Conv, Variance::Inv, body, &expanded)
    }

    fn conv_whnf(
        &mut self,
        env: &Env,
        pb: ConvPb,
        var: Variance,
        (ha, sa): (&Constr, &[Constr]),
        (hb, sb): (&Constr, &[Constr]),
    ) -> ConvResult {
        match (&**ha, &**hb) {
            (Term::Sort(s1), Term::Sort(s2)) if sa.is_empty() && sb.is_empty() => {
                sort_cmp(pb, s1, s2, &mut self.cs)
            },
            (Term::Prod(b1, d1, c1), Term::Prod(_, d2, c2)) if sa.is_empty() && sb.is_empty() => {
                self.conv(env, ConvPb::Conv, var.flip(), d1, d2)?;
                self.conv(&env.push_assum(b1.clone(), d1.clone()), pb, var, c1, c2)
            },
            (Term::Lambda(b1, d1, t1), Term::Lambda(_, d2, t2)) if sa.is_empty() && sb.is_empty() => {
                self.conv(env, ConvPb::Conv, Variance::Inv, d1, d2)?;
                self.conv(&env.push_assum(b1.clone(), d1.clone()), ConvPb::Conv, Variance::Inv, t1, t2)
            },
            (Term::Lambda(b1, d1, t1), _) if sa.is_empty() => {
                self.eta(env, b1, d1, t1, Term::app(hb.clone(), sb.to_vec()))
            },
            (_, Term::Lambda(b2, d2, t2)) if sb.is_empty() => {
                self.eta(env, b2, d2, t2, Term::app(ha.clone(), sa.to_vec()))
            },
            (Term::Rel(n, _), Term::Rel(m, _)) if n == m => self.conv_stacks(env, sa, sb),
            (Term::Var(x, _), Term::Var(y, _)) if x == y => self.conv_stacks(env, sa, sb),
            (Term::Evar(x), Term::Evar(y)) if x == y => self.conv_stacks(env, sa, sb),
            (Term::Const(c, u, _), Term::Const(d, v, _)) if c == d => {
                instance_eq(u, v, &mut self.cs)?;
                self.conv_stacks(env, sa, sb)
            },
            (Term::Ind(i, u, a1), Term::Ind(j, v, a2)) if i == j => {
                instance_eq(u, v, &mut self.cs)?;
                self.stage_cmp(env, i, var, a1.stage(), a2.stage());
                self.conv_stacks(env, sa, sb)
            },
            (Term::Construct(c, u), Term::Construct(d, v)) if c == d => {
                instance_eq(u, v, &mut self.cs)?;
                self.conv_stacks(env, sa, sb)
            },
            (Term::Int(x), Term::Int(y)) if x == y => self.conv_stacks(env, sa, sb),
            (Term::Case(ci1, p1, c1, br1), Term::Case(ci2, p2, c2, br2))
                if ci1.ind == ci2.ind && br1.len() == br2.len() =>
            {
                self.conv(env, ConvPb::Conv, Variance::Inv, p1, p2)?;
                self.conv(env, ConvPb::Conv, Variance::Inv, c1, c2)?;
                for (x, y) in br1.iter().zip(br2) {
                    self.conv(env, ConvPb::Conv, Variance::Inv, x, y)?;
                }
                self.conv_stacks(env, sa, sb)
            },
            (Term::Proj(p1, c1), Term::Proj(p2, c2)) if p1 == p2 => {
                self.conv(env, ConvPb::Conv, Variance::Inv, c1, c2)?;
                self.conv_stacks(env, sa, sb)
            },
            (Term::Fix(f1), Term::Fix(f2)) if f1.index == f2.index && f1.rec_args == f2.rec_args => {
                self.conv_recdecl(env, &f1.decl, &f2.decl)?;
                self.conv_stacks(env, sa, sb)
            },
            (Term::CoFix(f1), Term::CoFix(f2)) if f1.index == f2.index => {
                self.conv_recdecl(env, &f1.decl, &f2.decl)?;
                self.conv_stacks(env, sa, sb)
            },
            _ => Err(NotConvertible),
        }
    }
}

/// Decides `a = b` (`Conv`) or `a ≤ b` (`Cumul`), returning the constraints
/// under which it holds.
pub fn convert(
    env: &Env,
    pb: ConvPb,
    strategy: ConvStrategy,
    a: &Constr,
    b: &Constr,
) -> ConvResult<ConstraintSet> {
    if let ConvStrategy::Vm | ConvStrategy::Native = strategy {
        trace!("{:?} conversion handled by the kernel algorithm", strategy);
    }
    let var = match pb {
        ConvPb::Conv => Variance::Inv,
        ConvPb::Cumul => Variance::Co,
    };
    let mut c = Converter {
        strategy,
        cs: ConstraintSet::empty(),
    };
    c.conv(env, pb, var, a, b)?;
    Ok(c.cs)
}

pub fn conv(env: &Env, a: &Constr, b: &Constr) -> ConvResult<ConstraintSet> {
    convert(env, ConvPb::Conv, ConvStrategy::Default, a, b)
}

pub fn conv_leq(env: &Env, a: &Constr, b: &Constr) -> ConvResult<ConstraintSet> {
    convert(env, ConvPb::Cumul, ConvStrategy::Default, a, b)
}
