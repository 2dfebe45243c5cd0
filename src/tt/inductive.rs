//! Types derived from inductive declarations: arities, constructor types,
//! branch types and projections.

use std::rc::Rc;
use super::annot::{annotate_glob, instantiate_glob};
use super::env::{Finiteness, GlobalContext, MutInductive, OneInductive, Universes};
use super::level::{Level, Universe};
use super::reduce::beta_applist;
use super::stage::{Annot, SVar, Stage};
use super::term::{
    decompose_app, decompose_prod_assum, it_mk_prod, lift, map_children, subst_instance, substl,
    Binder, Constr, CtorRef, IndRef, LocalBinder, ProjRef, Sort, Term,
};

/// The size variable constructor types are polymorphic in.
const CTOR_SIZE: SVar = SVar(0);

pub type IndSpecif<'a> = (&'a MutInductive, &'a OneInductive);

pub fn lookup_mind_specif<'a>(globals: &'a GlobalContext, ind: &IndRef) -> Option<IndSpecif<'a>> {
    let mib = globals.lookup_mind(&ind.block)?;
    let mip = mib.packets.get(ind.index)?;
    Some((mib, mip))
}

fn arity(mib: &MutInductive, mip: &OneInductive, sort: Sort) -> Constr {
    let mut ctx = mib.params.clone();
    ctx.extend(mip.indices.iter().cloned());
    it_mk_prod(&ctx, Term::sort(sort))
}

pub fn type_of_inductive((mib, mip): IndSpecif, inst: &[Level]) -> Constr {
    subst_instance(&arity(mib, mip, mip.sort.clone()), inst)
}

fn subst_level(t: &Constr, l: Level, by: &Universe) -> Constr {
    match &**t {
        Term::Sort(Sort::Type(u)) if u.levels().any(|l0| l0 == l) => {
            Term::sort(Sort::type_(u.subst_level(l, by)))
        },
        _ => map_children(t, 0, |c, _| subst_level(c, l, by)),
    }
}

/// The arity of a template-polymorphic inductive, with each parameter level
/// replaced by the sort of the corresponding argument's type when known.
pub fn type_of_inductive_knowing_parameters(
    (mib, mip): IndSpecif,
    inst: &[Level],
    param_sorts: &[Option<Sort>],
) -> Constr {
    let base = type_of_inductive((mib, mip), inst);
    match &mib.universes {
        Universes::Template { param_levels } => param_levels
            .iter()
            .zip(param_sorts)
            .fold(base, |ty, (level, sort)| match (level, sort) {
                (Some(l), Some(s)) => subst_level(&ty, *l, &s.universe()),
                _ => ty,
            }),
        _ => base,
    }
}

/// The type of a constructor: occurrences of its own block are sized with
/// the glob variable `s`, the conclusion with `s + 1`.
pub fn type_of_constructor((mib, _): IndSpecif, ctor: &CtorRef, inst: &[Level]) -> Option<Constr> {
    let mip = mib.packets.get(ctor.ind.index)?;
    let raw = subst_instance(&mip.ctors.get(ctor.index)?.ty, inst);
    if mib.finite == Finiteness::BiFinite {
        return Some(raw);
    }
    let block = ctor.ind.block.clone();
    let (ctx, concl) = decompose_prod_assum(&raw);
    let ctx: Vec<_> = ctx
        .iter()
        .map(|b| match b {
            LocalBinder::Assum(n, ty) => LocalBinder::Assum(
                n.clone(),
                annotate_glob(ty, |i| i.block == block, Stage::var(CTOR_SIZE)),
            ),
            LocalBinder::Def(..) => b.clone(),
        })
        .collect();
    let (head, args) = decompose_app(&concl);
    let head = match &**head {
        Term::Ind(i, u, _) => Rc::new(Term::Ind(i.clone(), u.clone(), Annot::Glob(Stage::Var(CTOR_SIZE, 1)))),
        _ => head.clone(),
    };
    Some(it_mk_prod(&ctx, Term::app(head, args.to_vec())))
}

/// Instantiates the leading parameter telescope of `ty` with `params`.
pub fn instantiate_params(ty: &Constr, tele: &[LocalBinder], params: &[Constr]) -> Option<Constr> {
    let mut subst: Vec<Constr> = Vec::with_capacity(tele.len());
    let mut args = params.iter();
    let mut t = ty.clone();
    for b in tele {
        let next = match (b, &*t) {
            (LocalBinder::Assum(..), Term::Prod(_, _, body)) => {
                subst.push(args.next()?.clone());
                body.clone()
            },
            (LocalBinder::Def(..), Term::LetIn(_, v, _, body)) => {
                subst.push(substl(&subst, v));
                body.clone()
            },
            _ => return None,
        };
        t = next;
    }
    Some(substl(&subst, &t))
}

fn assum_rels(ctx: &[LocalBinder]) -> Vec<Constr> {
    let n = ctx.len();
    ctx.iter()
        .enumerate()
        .filter(|(_, b)| matches!(b, LocalBinder::Assum(..)))
        .map(|(i, _)| Term::rel(n - 1 - i))
        .collect()
}

/// Number of arguments of each constructor, parameters excluded.
pub fn ctor_nargs((mib, mip): IndSpecif) -> Vec<usize> {
    mip.ctors
        .iter()
        .map(|c| {
            let (ctx, _) = decompose_prod_assum(&c.ty);
            ctx[mib.params.len().min(ctx.len())..]
                .iter()
                .filter(|b| matches!(b, LocalBinder::Assum(..)))
                .count()
        })
        .collect()
}

/// The type a motive must have when matching on `I params indices` at
/// `stage`, returning into `sort`.
pub fn motive_arity(
    (mib, mip): IndSpecif,
    ind: &IndRef,
    inst: &[Level],
    params: &[Constr],
    stage: Stage,
    sort: Sort,
) -> Option<Constr> {
    let ar = instantiate_params(&type_of_inductive((mib, mip), inst), &mib.params, params)?;
    let (idx_ctx, _) = decompose_prod_assum(&ar);
    let nidx = idx_ctx.len();
    let mut args: Vec<_> = params.iter().map(|p| lift(nidx, p)).collect();
    args.extend(assum_rels(&idx_ctx));
    let self_ty = Term::app(Rc::new(Term::Ind(ind.clone(), inst.to_vec(), Annot::Stage(stage))), args);
    let mut ctx = idx_ctx;
    ctx.push(LocalBinder::Assum(Binder::named("x"), self_ty));
    Some(it_mk_prod(&ctx, Term::sort(sort)))
}

/// Expected types of the branches of a match on `I params _` whose
/// recursive arguments have size `stage`.
pub fn branch_types(
    spec: IndSpecif,
    ind: &IndRef,
    inst: &[Level],
    params: &[Constr],
    motive: &Constr,
    stage: Stage,
) -> Option<Vec<Constr>> {
    let (mib, mip) = spec;
    let npar_assum = mib.nparams();
    let mut sizes = fnv::FnvHashMap::default();
    sizes.insert(CTOR_SIZE, stage);
    (0..mip.ctors.len())
        .map(|j| {
            let ctor = CtorRef::new(ind.clone(), j);
            let cty = instantiate_glob(&type_of_constructor(spec, &ctor, inst)?, &sizes);
            let cty = instantiate_params(&cty, &mib.params, params)?;
            let (ctx, concl) = decompose_prod_assum(&cty);
            let n = ctx.len();
            let (_, concl_args) = decompose_app(&concl);
            let mut cargs: Vec<_> = params.iter().map(|p| lift(n, p)).collect();
            cargs.extend(assum_rels(&ctx));
            let ctor_app = Term::app(Rc::new(Term::Construct(ctor, inst.to_vec())), cargs);
            let mut margs: Vec<_> = concl_args.iter().skip(npar_assum).cloned().collect();
            margs.push(ctor_app);
            Some(it_mk_prod(&ctx, beta_applist(&lift(n, motive), &margs)))
        })
        .collect()
}

/// Whether matching on `mip` may return into `sort`.
pub fn elim_allowed(mip: &OneInductive, nparams: usize, sort: &Sort) -> bool {
    match mip.sort {
        Sort::SProp => mip.ctors.is_empty() || *sort == Sort::SProp,
        Sort::Prop => {
            let singleton = match mip.ctors.as_slice() {
                [] => true,
                [c] => decompose_prod_assum(&c.ty).0.len() <= nparams,
                _ => false,
            };
            singleton || matches!(sort, Sort::Prop | Sort::SProp)
        },
        _ => true,
    }
}

/// The type of field `pr.field` of the record value `c : I params`.
pub fn projection_type(
    spec: IndSpecif,
    pr: &ProjRef,
    inst: &[Level],
    params: &[Constr],
    c: &Constr,
) -> Option<Constr> {
    let (mib, mip) = spec;
    let ctor = mip.ctors.first()?;
    let cty = instantiate_params(&subst_instance(&ctor.ty, inst), &mib.params, params)?;
    let (ctx, _) = decompose_prod_assum(&cty);
    let mut previous = Vec::with_capacity(pr.field);
    for (j, b) in ctx.iter().enumerate() {
        let ty = match b {
            LocalBinder::Assum(_, ty) => substl(&previous, ty),
            LocalBinder::Def(..) => return None,
        };
        if j == pr.field {
            return Some(ty);
        }
        previous.push(Rc::new(Term::Proj(ProjRef { field: j, ..pr.clone() }, c.clone())));
    }
    None
}

pub fn is_record(mib: &MutInductive, mip: &OneInductive) -> bool {
    mib.finite == Finiteness::BiFinite && mip.ctors.len() == 1 && mip.indices.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::annot::collect_glob;
    use crate::tt::env::Constructor;

    fn nat_block() -> MutInductive {
        let nat = Term::ind(IndRef::new("nat", 0));
        MutInductive {
            params: vec![],
            packets: vec![OneInductive {
                name: "nat".into(),
                indices: vec![],
                sort: Sort::Set,
                ctors: vec![
                    Constructor { name: "O".into(), ty: nat.clone() },
                    Constructor { name: "S".into(), ty: Term::arrow(nat.clone(), nat) },
                ],
            }],
            finite: Finiteness::Finite,
            universes: Universes::Monomorphic,
            hyps: vec![],
        }
    }

    #[test]
    fn successor_is_size_increasing() {
        let mib = nat_block();
        let ty = type_of_constructor((&mib, &mib.packets[0]), &CtorRef::new(IndRef::new("nat", 0), 1), &[]).unwrap();
        assert_eq!(collect_glob(&ty), vec![CTOR_SIZE]);
        match &*ty {
            Term::Prod(_, dom, cod) => {
                assert!(matches!(&**dom, Term::Ind(_, _, Annot::Glob(Stage::Var(_, 0)))));
                assert!(matches!(&**cod, Term::Ind(_, _, Annot::Glob(Stage::Var(_, 1)))));
            },
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn branch_types_use_the_match_size() {
        let mib = nat_block();
        let ind = IndRef::new("nat", 0);
        let motive = Term::lambda(Binder::named("n"), Term::ind(ind.clone()), Term::set());
        let s = Stage::var(SVar(4));
        let brs = branch_types((&mib, &mib.packets[0]), &ind, &[], &[], &motive, s).unwrap();
        assert_eq!(brs[0], Term::set());
        match &*brs[1] {
            Term::Prod(_, dom, cod) => {
                assert_eq!(**dom, Term::Ind(ind, vec![], Annot::Stage(s)));
                assert_eq!(*cod, Term::set());
            },
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn prop_elimination() {
        let or = OneInductive {
            name: "or".into(),
            indices: vec![],
            sort: Sort::Prop,
            ctors: vec![
                Constructor { name: "l".into(), ty: Term::ind(IndRef::new("or", 0)) },
                Constructor { name: "r".into(), ty: Term::ind(IndRef::new("or", 0)) },
            ],
        };
        assert!(elim_allowed(&or, 0, &Sort::Prop));
        assert!(!elim_allowed(&or, 0, &Sort::Set));
    }
}
