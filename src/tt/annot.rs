//! Size annotations as an overlay on terms.
//!
//! Annotations live on inductive occurrences and on the annotation vectors of
//! references. Nothing here changes the logical content of a term: erasing the
//! annotations of an annotated term gives back the term it came from.

use std::collections::BTreeSet;
use std::rc::Rc;
use fnv::FnvHashMap;
use super::stage::{Annot, SVar, Stage, StageState};
use super::term::{iter_children, map_children, Annots, Constr, IndRef, Term};

#[derive(Debug, Clone, Copy)]
enum Site<'a> {
    Ind(&'a IndRef),
    Reference,
}

fn map_vec<F>(annots: &[Annot], f: &mut F) -> Option<Annots>
where
    F: FnMut(Site, Annot) -> Annot,
{
    let mapped: Vec<_> = annots.iter().map(|&a| f(Site::Reference, a)).collect();
    if mapped.as_slice() == annots {
        None
    } else if mapped.iter().all(|&a| a == Annot::Empty) {
        Some(None)
    } else {
        Some(Some(mapped))
    }
}

fn map_annots<F>(t: &Constr, f: &mut F) -> Constr
where
    F: FnMut(Site, Annot) -> Annot,
{
    match &**t {
        Term::Ind(ind, u, a) => {
            let a2 = f(Site::Ind(ind), *a);
            if a2 == *a {
                t.clone()
            } else {
                Rc::new(Term::Ind(ind.clone(), u.clone(), a2))
            }
        },
        Term::Rel(n, Some(v)) => match map_vec(v, f) {
            Some(v2) => Rc::new(Term::Rel(*n, v2)),
            None => t.clone(),
        },
        Term::Var(id, Some(v)) => match map_vec(v, f) {
            Some(v2) => Rc::new(Term::Var(id.clone(), v2)),
            None => t.clone(),
        },
        Term::Const(c, u, Some(v)) => match map_vec(v, f) {
            Some(v2) => Rc::new(Term::Const(c.clone(), u.clone(), v2)),
            None => t.clone(),
        },
        _ => map_children(t, 0, |c, _| map_annots(c, f)),
    }
}

fn fold_annots<F>(t: &Term, f: &mut F)
where
    F: FnMut(Annot),
{
    match t {
        Term::Ind(_, _, a) => f(*a),
        Term::Rel(_, Some(v)) | Term::Var(_, Some(v)) | Term::Const(_, _, Some(v)) => {
            v.iter().for_each(|&a| f(a))
        },
        _ => iter_children(t, 0, |c, _| fold_annots(c, f)),
    }
}

/// Gives every unannotated inductive occurrence a fresh size variable.
pub fn annotate(t: &Constr, stg: &mut StageState) -> Constr {
    map_annots(t, &mut |site, a| match (site, a) {
        (Site::Ind(_), Annot::Empty) => Annot::Stage(stg.next_stage()),
        _ => a,
    })
}

/// Marks the unannotated occurrences of inductives selected by `pred` as
/// size-polymorphic at `stage`.
pub fn annotate_glob<P>(t: &Constr, pred: P, stage: Stage) -> Constr
where
    P: Fn(&IndRef) -> bool,
{
    map_annots(t, &mut |site, a| match (site, a) {
        (Site::Ind(ind), Annot::Empty) if pred(ind) => Annot::Glob(stage),
        _ => a,
    })
}

/// Strips every annotation.
pub fn erase(t: &Constr) -> Constr {
    map_annots(t, &mut |_, _| Annot::Empty)
}

/// Forgets every local size, keeping size-polymorphic positions.
pub fn erase_infty(t: &Constr) -> Constr {
    map_annots(t, &mut |_, a| match a {
        Annot::Star(_) | Annot::Stage(_) => Annot::Stage(Stage::Infty),
        a => a,
    })
}

/// Forgets size polymorphism; glob positions read as `∞` afterwards.
pub fn erase_glob(t: &Constr) -> Constr {
    map_annots(t, &mut |_, a| match a {
        Annot::Glob(_) => Annot::Empty,
        a => a,
    })
}

pub fn erase_stars(t: &Constr) -> Constr {
    map_annots(t, &mut |_, a| match a {
        Annot::Star(s) => Annot::Stage(s),
        a => a,
    })
}

/// Size variables occurring in local (star or plain) annotations.
pub fn collect_vars(t: &Term) -> BTreeSet<SVar> {
    let mut vars = BTreeSet::new();
    fold_annots(t, &mut |a| match a {
        Annot::Star(s) | Annot::Stage(s) => vars.extend(s.var_of()),
        _ => (),
    });
    vars
}

/// Distinct size-polymorphic variables, in order of first occurrence.
pub fn collect_glob(t: &Term) -> Vec<SVar> {
    let mut vars = Vec::new();
    fold_annots(t, &mut |a| if let Annot::Glob(Stage::Var(v, _)) = a {
        if !vars.contains(&v) {
            vars.push(v);
        }
    });
    vars
}

/// Replaces each glob variable by the stage it is mapped to. Unmapped glob
/// positions, like glob `∞`, become `∞`.
pub fn instantiate_glob(t: &Constr, subst: &FnvHashMap<SVar, Stage>) -> Constr {
    map_annots(t, &mut |_, a| match a {
        Annot::Glob(Stage::Var(v, k)) => match subst.get(&v) {
            Some(s) => Annot::Stage(s.plus(k)),
            None => Annot::Stage(Stage::Infty),
        },
        Annot::Glob(Stage::Infty) => Annot::Stage(Stage::Infty),
        a => a,
    })
}

/// Stars every sized occurrence of an inductive of `block`, recording the
/// variables as stars in `stg`.
pub fn mark_star(t: &Constr, block: &str, stg: &mut StageState) -> Constr {
    map_annots(t, &mut |site, a| match (site, a) {
        (Site::Ind(ind), Annot::Stage(Stage::Var(v, k))) if &*ind.block == block => {
            stg.mark_star(v);
            Annot::Star(Stage::Var(v, k))
        },
        _ => a,
    })
}

/// The successor-shifted version of a starred type: stars over `vstar` move
/// one notch up, stars that were demoted become plain stages.
pub fn shift_stars(t: &Constr, vstar: &BTreeSet<SVar>) -> Constr {
    map_annots(t, &mut |_, a| match a {
        Annot::Star(s) => match s.var_of() {
            Some(v) if vstar.contains(&v) => Annot::Star(s.succ()),
            _ => Annot::Stage(s),
        },
        a => a,
    })
}

/// Sizes of the star annotations in `t`.
pub fn star_vars(t: &Term) -> BTreeSet<SVar> {
    let mut vars = BTreeSet::new();
    fold_annots(t, &mut |a| if let Annot::Star(s) = a {
        vars.extend(s.var_of());
    });
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::term::Binder;
    use proptest::prelude::*;

    fn nat() -> IndRef {
        IndRef::new("nat", 0)
    }

    fn arb_term() -> impl Strategy<Value = Constr> {
        let leaf = prop_oneof![
            Just(Term::set()),
            Just(Term::prop()),
            (0usize..4).prop_map(Term::rel),
            Just(Term::ind(nat())),
            Just(Term::ind(IndRef::new("list", 0))),
            Just(Term::constant("c")),
        ];
        leaf.prop_recursive(4, 32, 3, |inner| prop_oneof![
            (inner.clone(), prop::collection::vec(inner.clone(), 1..3))
                .prop_map(|(f, args)| Term::app(f, args)),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Term::lambda(Binder::named("x"), a, b)),
            (inner.clone(), inner)
                .prop_map(|(a, b)| Term::prod(Binder::anonymous(), a, b)),
        ])
    }

    proptest! {
        #[test]
        fn erase_undoes_annotate(t in arb_term()) {
            let mut stg = StageState::new();
            let annotated = annotate(&t, &mut stg);
            prop_assert_eq!(erase(&annotated), t.clone());
            prop_assert_eq!(erase(&erase_infty(&annotated)), t);
        }

        #[test]
        fn erase_undoes_annotate_glob(t in arb_term()) {
            let glob = annotate_glob(&t, |i| &*i.block == "nat", Stage::var(SVar(0)));
            prop_assert_eq!(erase_glob(&glob), t.clone());
            prop_assert_eq!(erase(&glob), t);
        }
    }

    #[test]
    fn annotate_allocates_per_occurrence() {
        let t = Term::arrow(Term::ind(nat()), Term::ind(nat()));
        let mut stg = StageState::new();
        let a = annotate(&t, &mut stg);
        assert_eq!(collect_vars(&a).len(), 2);
        assert_eq!(stg.allocated(), 2);
        // already annotated occurrences keep their sizes
        let again = annotate(&a, &mut stg);
        assert!(Rc::ptr_eq(&a, &again));
    }

    #[test]
    fn shift_only_moves_live_stars() {
        let mut stg = StageState::new();
        let t = annotate(&Term::arrow(Term::ind(nat()), Term::ind(nat())), &mut stg);
        let starred = mark_star(&t, "nat", &mut stg);
        assert_eq!(star_vars(&starred), [SVar(0), SVar(1)].iter().copied().collect());
        let live: BTreeSet<_> = [SVar(0)].iter().copied().collect();
        let shifted = shift_stars(&starred, &live);
        match &*shifted {
            Term::Prod(_, dom, cod) => {
                assert_eq!(**dom, Term::Ind(nat(), vec![], Annot::Star(Stage::Var(SVar(0), 1))));
                assert_eq!(**cod, Term::Ind(nat(), vec![], Annot::Stage(Stage::var(SVar(1)))));
            },
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn glob_instantiation() {
        let ty = Term::arrow(Term::ind(nat()), Term::ind(nat()));
        let ty = annotate_glob(&ty, |_| true, Stage::var(SVar(0)));
        assert_eq!(collect_glob(&ty), vec![SVar(0)]);
        let mut subst = FnvHashMap::default();
        subst.insert(SVar(0), Stage::Var(SVar(9), 1));
        let inst = instantiate_glob(&ty, &subst);
        assert_eq!(collect_vars(&inst), [SVar(9)].iter().copied().collect());
        assert!(collect_glob(&inst).is_empty());
    }
}
