use std::fmt::{Display, Formatter, Result as FmtResult};
use std::rc::Rc;
use super::level::{Level, Universe};
use super::stage::Annot;

pub type Ident = Rc<str>;
pub type DeBruijn = usize;
pub type Constr = Rc<Term>;
pub type Instance = Vec<Level>;
/// One annotation per sized occurrence reachable from a reference's type.
pub type Annots = Option<Vec<Annot>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sort {
    SProp,
    Prop,
    Set,
    Type(Universe),
}

impl Sort {
    pub fn type_(u: Universe) -> Self {
        if u.is_set() {
            Sort::Set
        } else {
            Sort::Type(u)
        }
    }

    /// The universe the sort lives in when used as a level; impredicative
    /// sorts count as `Set`.
    pub fn universe(&self) -> Universe {
        match self {
            Sort::Type(u) => u.clone(),
            _ => Universe::set(),
        }
    }

    pub fn relevance(&self) -> Relevance {
        match self {
            Sort::SProp => Relevance::Irrelevant,
            _ => Relevance::Relevant,
        }
    }

    pub fn subst_instance(&self, inst: &[Level]) -> Self {
        match self {
            Sort::Type(u) => Sort::type_(u.subst_instance(inst)),
            s => s.clone(),
        }
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Sort::SProp => f.write_str("SProp"),
            Sort::Prop => f.write_str("Prop"),
            Sort::Set => f.write_str("Set"),
            Sort::Type(u) => write!(f, "Type@{{{}}}", u),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relevance {
    Relevant,
    Irrelevant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binder {
    pub name: Option<Ident>,
    pub relevance: Relevance,
}

impl Binder {
    pub fn named(name: &str) -> Self {
        Binder {
            name: Some(name.into()),
            relevance: Relevance::Relevant,
        }
    }

    pub fn anonymous() -> Self {
        Binder {
            name: None,
            relevance: Relevance::Relevant,
        }
    }

    pub fn with_relevance(&self, relevance: Relevance) -> Self {
        Binder {
            name: self.name.clone(),
            relevance,
        }
    }
}

impl Display for Binder {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match &self.name {
            Some(n) => f.write_str(n),
            None => f.write_str("_"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    Default,
    Revert,
    Vm,
    Native,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndRef {
    pub block: Ident,
    pub index: usize,
}

impl IndRef {
    pub fn new(block: &str, index: usize) -> Self {
        IndRef {
            block: block.into(),
            index,
        }
    }
}

impl Display for IndRef {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if self.index == 0 {
            f.write_str(&self.block)
        } else {
            write!(f, "{}#{}", self.block, self.index)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CtorRef {
    pub ind: IndRef,
    pub index: usize,
}

impl CtorRef {
    pub fn new(ind: IndRef, index: usize) -> Self {
        CtorRef { ind, index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjRef {
    pub ind: IndRef,
    pub npars: usize,
    pub field: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseInfo {
    pub ind: IndRef,
    pub npar: usize,
    /// Number of non-parameter arguments of each constructor.
    pub cstr_nargs: Vec<usize>,
    pub relevance: Relevance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecDecl {
    pub names: Vec<Binder>,
    pub types: Vec<Constr>,
    /// Bodies live under one binder per component, the last component
    /// being `Rel(0)`.
    pub bodies: Vec<Constr>,
}

impl RecDecl {
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixpoint {
    /// Recursive argument of each component, counted over assumption
    /// binders; `None` asks the kernel to find one.
    pub rec_args: Vec<Option<usize>>,
    pub index: usize,
    pub decl: RecDecl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoFixpoint {
    pub index: usize,
    pub decl: RecDecl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Sort(Sort),
    Rel(DeBruijn, Annots),
    Var(Ident, Annots),
    Const(Ident, Instance, Annots),
    Proj(ProjRef, Constr),
    App(Constr, Vec<Constr>),
    Lambda(Binder, Constr, Constr),
    Prod(Binder, Constr, Constr),
    /// `let x : ty := value in body`, stored as value, type, body.
    LetIn(Binder, Constr, Constr, Constr),
    Cast(Constr, CastKind, Constr),
    Ind(IndRef, Instance, Annot),
    Construct(CtorRef, Instance),
    /// Case info, motive, scrutinee, branches.
    Case(Rc<CaseInfo>, Constr, Constr, Vec<Constr>),
    Fix(Rc<Fixpoint>),
    CoFix(Rc<CoFixpoint>),
    Int(u64),
    /// An unresolved existential; never valid kernel input.
    Evar(u32),
}

impl Term {
    pub fn sort(s: Sort) -> Constr {
        Rc::new(Term::Sort(s))
    }

    pub fn prop() -> Constr {
        Self::sort(Sort::Prop)
    }

    pub fn set() -> Constr {
        Self::sort(Sort::Set)
    }

    pub fn type_(u: Universe) -> Constr {
        Self::sort(Sort::type_(u))
    }

    pub fn rel(n: DeBruijn) -> Constr {
        Rc::new(Term::Rel(n, None))
    }

    pub fn var(id: &str) -> Constr {
        Rc::new(Term::Var(id.into(), None))
    }

    pub fn constant(name: &str) -> Constr {
        Rc::new(Term::Const(name.into(), Vec::new(), None))
    }

    pub fn ind(ind: IndRef) -> Constr {
        Rc::new(Term::Ind(ind, Vec::new(), Annot::Empty))
    }

    pub fn construct(ind: IndRef, index: usize) -> Constr {
        Rc::new(Term::Construct(CtorRef::new(ind, index), Vec::new()))
    }

    pub fn int(i: u64) -> Constr {
        Rc::new(Term::Int(i))
    }

    /// Application, flattening nested applications and dropping empty ones.
    pub fn app(f: Constr, args: Vec<Constr>) -> Constr {
        if args.is_empty() {
            return f;
        }
        match &*f {
            Term::App(g, inner) => {
                let mut all = inner.clone();
                all.extend(args);
                Rc::new(Term::App(g.clone(), all))
            },
            _ => Rc::new(Term::App(f, args)),
        }
    }

    pub fn lambda(b: Binder, ty: Constr, body: Constr) -> Constr {
        Rc::new(Term::Lambda(b, ty, body))
    }

    pub fn prod(b: Binder, ty: Constr, body: Constr) -> Constr {
        Rc::new(Term::Prod(b, ty, body))
    }

    /// Non-dependent product; `cod` is read in the outer context.
    pub fn arrow(dom: Constr, cod: Constr) -> Constr {
        Rc::new(Term::Prod(Binder::anonymous(), dom, lift(1, &cod)))
    }

    pub fn let_in(b: Binder, value: Constr, ty: Constr, body: Constr) -> Constr {
        Rc::new(Term::LetIn(b, value, ty, body))
    }

    pub fn cast(c: Constr, k: CastKind, ty: Constr) -> Constr {
        Rc::new(Term::Cast(c, k, ty))
    }

    pub fn case(ci: CaseInfo, motive: Constr, scrut: Constr, branches: Vec<Constr>) -> Constr {
        Rc::new(Term::Case(Rc::new(ci), motive, scrut, branches))
    }

    pub fn fix(fix: Fixpoint) -> Constr {
        Rc::new(Term::Fix(Rc::new(fix)))
    }

    pub fn cofix(cofix: CoFixpoint) -> Constr {
        Rc::new(Term::CoFix(Rc::new(cofix)))
    }

    pub fn as_sort(&self) -> Option<&Sort> {
        match self {
            Term::Sort(s) => Some(s),
            _ => None,
        }
    }
}

/// Splits an application into its head and arguments.
pub fn decompose_app(t: &Constr) -> (&Constr, &[Constr]) {
    match &**t {
        Term::App(f, args) => (f, args),
        _ => (t, &[]),
    }
}

pub fn strip_outer_cast(t: &Constr) -> &Constr {
    match &**t {
        Term::Cast(c, _, _) => strip_outer_cast(c),
        _ => t,
    }
}

fn same(a: &[Constr], b: &[Constr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Rc::ptr_eq(x, y))
}

/// Rebuilds the immediate children of `t` with `f`, which receives each
/// child and the number of binders above it. A node whose children all come
/// back pointer-identical is returned as is.
pub fn map_children<F>(t: &Constr, depth: usize, mut f: F) -> Constr
where
    F: FnMut(&Constr, usize) -> Constr,
{
    match &**t {
        Term::Sort(_)
        | Term::Rel(..)
        | Term::Var(..)
        | Term::Const(..)
        | Term::Ind(..)
        | Term::Construct(..)
        | Term::Int(_)
        | Term::Evar(_) => t.clone(),
        Term::Proj(p, c) => {
            let c2 = f(c, depth);
            if Rc::ptr_eq(c, &c2) {
                t.clone()
            } else {
                Rc::new(Term::Proj(p.clone(), c2))
            }
        },
        Term::App(h, args) => {
            let h2 = f(h, depth);
            let args2: Vec<_> = args.iter().map(|a| f(a, depth)).collect();
            if Rc::ptr_eq(h, &h2) && same(args, &args2) {
                t.clone()
            } else {
                Rc::new(Term::App(h2, args2))
            }
        },
        Term::Lambda(b, ty, body) | Term::Prod(b, ty, body) => {
            let ty2 = f(ty, depth);
            let body2 = f(body, depth + 1);
            if Rc::ptr_eq(ty, &ty2) && Rc::ptr_eq(body, &body2) {
                t.clone()
            } else if let Term::Lambda(..) = &**t {
                Rc::new(Term::Lambda(b.clone(), ty2, body2))
            } else {
                Rc::new(Term::Prod(b.clone(), ty2, body2))
            }
        },
        Term::LetIn(b, v, ty, body) => {
            let v2 = f(v, depth);
            let ty2 = f(ty, depth);
            let body2 = f(body, depth + 1);
            if Rc::ptr_eq(v, &v2) && Rc::ptr_eq(ty, &ty2) && Rc::ptr_eq(body, &body2) {
                t.clone()
            } else {
                Rc::new(Term::LetIn(b.clone(), v2, ty2, body2))
            }
        },
        Term::Cast(c, k, ty) => {
            let c2 = f(c, depth);
            let ty2 = f(ty, depth);
            if Rc::ptr_eq(c, &c2) && Rc::ptr_eq(ty, &ty2) {
                t.clone()
            } else {
                Rc::new(Term::Cast(c2, *k, ty2))
            }
        },
        Term::Case(ci, p, c, brs) => {
            let p2 = f(p, depth);
            let c2 = f(c, depth);
            let brs2: Vec<_> = brs.iter().map(|b| f(b, depth)).collect();
            if Rc::ptr_eq(p, &p2) && Rc::ptr_eq(c, &c2) && same(brs, &brs2) {
                t.clone()
            } else {
                Rc::new(Term::Case(ci.clone(), p2, c2, brs2))
            }
        },
        Term::Fix(fix) => match map_recdecl(&fix.decl, depth, &mut f) {
            Some(decl) => Term::fix(Fixpoint { decl, ..(**fix).clone() }),
            None => t.clone(),
        },
        Term::CoFix(cofix) => match map_recdecl(&cofix.decl, depth, &mut f) {
            Some(decl) => Term::cofix(CoFixpoint { decl, index: cofix.index }),
            None => t.clone(),
        },
    }
}

fn map_recdecl<F>(decl: &RecDecl, depth: usize, f: &mut F) -> Option<RecDecl>
where
    F: FnMut(&Constr, usize) -> Constr,
{
    let n = decl.len();
    let types: Vec<_> = decl.types.iter().map(|ty| f(ty, depth)).collect();
    let bodies: Vec<_> = decl.bodies.iter().map(|b| f(b, depth + n)).collect();
    if same(&decl.types, &types) && same(&decl.bodies, &bodies) {
        None
    } else {
        Some(RecDecl {
            names: decl.names.clone(),
            types,
            bodies,
        })
    }
}

/// Visits the immediate children of `t` with their binder depth.
pub fn iter_children<F>(t: &Term, depth: usize, mut f: F)
where
    F: FnMut(&Constr, usize),
{
    match t {
        Term::Sort(_)
        | Term::Rel(..)
        | Term::Var(..)
        | Term::Const(..)
        | Term::Ind(..)
        | Term::Construct(..)
        | Term::Int(_)
        | Term::Evar(_) => (),
        Term::Proj(_, c) => f(c, depth),
        Term::App(h, args) => {
            f(h, depth);
            args.iter().for_each(|a| f(a, depth));
        },
        Term::Lambda(_, ty, body) | Term::Prod(_, ty, body) => {
            f(ty, depth);
            f(body, depth + 1);
        },
        Term::LetIn(_, v, ty, body) => {
            f(v, depth);
            f(ty, depth);
            f(body, depth + 1);
        },
        Term::Cast(c, _, ty) => {
            f(c, depth);
            f(ty, depth);
        },
        Term::Case(_, p, c, brs) => {
            f(p, depth);
            f(c, depth);
            brs.iter().for_each(|b| f(b, depth));
        },
        Term::Fix(fix) => iter_recdecl(&fix.decl, depth, &mut f),
        Term::CoFix(cofix) => iter_recdecl(&cofix.decl, depth, &mut f),
    }
}

fn iter_recdecl<F>(decl: &RecDecl, depth: usize, f: &mut F)
where
    F: FnMut(&Constr, usize),
{
    let n = decl.len();
    decl.types.iter().for_each(|ty| f(ty, depth));
    decl.bodies.iter().for_each(|b| f(b, depth + n));
}

fn liftn_rec(t: &Constr, n: usize, k: usize) -> Constr {
    match &**t {
        Term::Rel(i, a) if *i >= k => Rc::new(Term::Rel(i + n, a.clone())),
        _ => map_children(t, k, |c, k| liftn_rec(c, n, k)),
    }
}

/// Adds `n` to every free index at or above `k`.
pub fn liftn(n: usize, k: usize, t: &Constr) -> Constr {
    if n == 0 {
        t.clone()
    } else {
        liftn_rec(t, n, k)
    }
}

pub fn lift(n: usize, t: &Constr) -> Constr {
    liftn(n, 0, t)
}

fn substn_rec(t: &Constr, vals: &[Constr], k: usize) -> Constr {
    match &**t {
        Term::Rel(i, a) if *i >= k => {
            let j = *i - k;
            if j < vals.len() {
                lift(k, &vals[j])
            } else {
                Rc::new(Term::Rel(*i - vals.len(), a.clone()))
            }
        },
        _ => map_children(t, k, |c, k| substn_rec(c, vals, k)),
    }
}

/// Replaces `Rel(k + j)` by `vals[j]` and lowers the indices above.
pub fn substn(vals: &[Constr], k: usize, t: &Constr) -> Constr {
    if vals.is_empty() {
        t.clone()
    } else {
        substn_rec(t, vals, k)
    }
}

pub fn subst1(v: &Constr, t: &Constr) -> Constr {
    substn(std::slice::from_ref(v), 0, t)
}

/// Instantiates a telescope body with `args`, given outermost first.
pub fn substl(args: &[Constr], t: &Constr) -> Constr {
    let rev: Vec<_> = args.iter().rev().cloned().collect();
    substn(&rev, 0, t)
}

fn occurs_rel_rec(t: &Term, lo: usize, hi: usize, depth: usize, found: &mut bool) {
    if *found {
        return;
    }
    match t {
        Term::Rel(i, _) => if *i >= lo + depth && *i < hi + depth {
            *found = true;
        },
        _ => iter_children(t, depth, |c, d| occurs_rel_rec(c, lo, hi, d, found)),
    }
}

/// Whether some `Rel(i)` with `lo <= i < hi` occurs free in `t`.
pub fn occurs_rel_between(t: &Term, lo: usize, hi: usize) -> bool {
    let mut found = false;
    occurs_rel_rec(t, lo, hi, 0, &mut found);
    found
}

pub fn noccurn(n: usize, t: &Term) -> bool {
    !occurs_rel_between(t, n, n + 1)
}

/// Instantiates the universe-polymorphic levels of `t`.
pub fn subst_instance(t: &Constr, inst: &[Level]) -> Constr {
    if inst.is_empty() {
        return t.clone();
    }
    let subst = |u: &Instance| u.iter().map(|l| l.subst_instance(inst)).collect::<Vec<_>>();
    match &**t {
        Term::Sort(s) => Term::sort(s.subst_instance(inst)),
        Term::Const(c, u, a) => Rc::new(Term::Const(c.clone(), subst(u), a.clone())),
        Term::Ind(i, u, a) => Rc::new(Term::Ind(i.clone(), subst(u), *a)),
        Term::Construct(c, u) => Rc::new(Term::Construct(c.clone(), subst(u))),
        _ => map_children(t, 0, |c, _| subst_instance(c, inst)),
    }
}

/// Splits leading products (and lets) into a context and a conclusion.
pub fn decompose_prod_assum(t: &Constr) -> (Vec<LocalBinder>, Constr) {
    let mut ctx = Vec::new();
    let mut t = t.clone();
    loop {
        let next = match &*t {
            Term::Prod(b, ty, body) => {
                ctx.push(LocalBinder::Assum(b.clone(), ty.clone()));
                body.clone()
            },
            Term::LetIn(b, v, ty, body) => {
                ctx.push(LocalBinder::Def(b.clone(), v.clone(), ty.clone()));
                body.clone()
            },
            Term::Cast(c, _, _) => c.clone(),
            _ => return (ctx, t),
        };
        t = next;
    }
}

/// A binder of a syntactic telescope, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalBinder {
    Assum(Binder, Constr),
    Def(Binder, Constr, Constr),
}

/// Rebuilds `Π ctx. concl`.
pub fn it_mk_prod(ctx: &[LocalBinder], concl: Constr) -> Constr {
    ctx.iter().rev().fold(concl, |acc, d| match d {
        LocalBinder::Assum(b, ty) => Term::prod(b.clone(), ty.clone(), acc),
        LocalBinder::Def(b, v, ty) => Term::let_in(b.clone(), v.clone(), ty.clone(), acc),
    })
}

fn fmt_args(f: &mut Formatter, args: &[Constr]) -> FmtResult {
    for a in args {
        write!(f, " {}", a)?;
    }
    Ok(())
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Term::Sort(s) => write!(f, "{}", s),
            Term::Rel(n, _) => write!(f, "#{}", n),
            Term::Var(id, _) => f.write_str(id),
            Term::Const(c, _, _) => f.write_str(c),
            Term::Proj(p, c) => write!(f, "{}.({})", c, p.field),
            Term::App(h, args) => {
                write!(f, "({}", h)?;
                fmt_args(f, args)?;
                f.write_str(")")
            },
            Term::Lambda(b, ty, body) => write!(f, "(fun ({} : {}) => {})", b, ty, body),
            Term::Prod(b, ty, body) => if b.name.is_none() && noccurn(0, body) {
                write!(f, "({} -> {})", ty, body)
            } else {
                write!(f, "(forall ({} : {}), {})", b, ty, body)
            },
            Term::LetIn(b, v, ty, body) => write!(f, "(let {} : {} := {} in {})", b, ty, v, body),
            Term::Cast(c, _, ty) => write!(f, "({} : {})", c, ty),
            Term::Ind(i, _, a) => write!(f, "{}{}", i, a),
            Term::Construct(c, _) => write!(f, "{}.{}", c.ind, c.index),
            Term::Case(_, p, c, brs) => {
                write!(f, "(match {} return {} with", c, p)?;
                for b in brs {
                    write!(f, " | {}", b)?;
                }
                f.write_str(" end)")
            },
            Term::Fix(fix) => write!(f, "(fix {} ...)", fix.decl.names[fix.index]),
            Term::CoFix(cofix) => write!(f, "(cofix {} ...)", cofix.decl.names[cofix.index]),
            Term::Int(i) => write!(f, "{}%uint63", i),
            Term::Evar(e) => write!(f, "?e{}", e),
        }
    }
}
