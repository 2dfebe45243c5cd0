#![allow(dead_code)]

use std::rc::Rc;
use sized_cic::*;

pub fn nat() -> IndRef {
    IndRef::new("nat", 0)
}

pub fn bool_() -> IndRef {
    IndRef::new("bool", 0)
}

pub fn stream() -> IndRef {
    IndRef::new("stream", 0)
}

fn simple(name: &str, sort: Sort, finite: Finiteness, ctors: Vec<(&str, Constr)>) -> MutInductive {
    MutInductive {
        params: vec![],
        packets: vec![OneInductive {
            name: name.into(),
            indices: vec![],
            sort,
            ctors: ctors
                .into_iter()
                .map(|(name, ty)| Constructor { name: name.into(), ty })
                .collect(),
        }],
        finite,
        universes: Universes::Monomorphic,
        hyps: vec![],
    }
}

/// `nat`, `bool` and a stream of naturals.
pub fn globals(flags: TypingFlags) -> GlobalContext {
    let mut g = GlobalContext::new(flags);
    let n = Term::ind(nat());
    let b = Term::ind(bool_());
    let s = Term::ind(stream());
    g.add_inductive("nat", simple("nat", Sort::Set, Finiteness::Finite, vec![
        ("O", n.clone()),
        ("S", Term::arrow(n.clone(), n.clone())),
    ]));
    g.add_inductive("bool", simple("bool", Sort::Set, Finiteness::Finite, vec![
        ("true", b.clone()),
        ("false", b),
    ]));
    g.add_inductive("stream", simple("stream", Sort::Set, Finiteness::CoFinite, vec![
        ("Cons", Term::arrow(n, Term::arrow(s.clone(), s))),
    ]));
    g
}

pub fn env_with(g: GlobalContext) -> Env {
    Env::new(Rc::new(g))
}

pub fn env() -> Env {
    env_with(globals(TypingFlags::default()))
}

pub fn num(k: usize) -> Constr {
    (0..k).fold(Term::construct(nat(), 0), |acc, _| Term::app(Term::construct(nat(), 1), vec![acc]))
}

pub fn nat_ty() -> Constr {
    Term::ind(nat())
}

pub fn nat_case(motive: Constr, scrut: Constr, brs: Vec<Constr>) -> Constr {
    let ci = CaseInfo {
        ind: nat(),
        npar: 0,
        cstr_nargs: vec![0, 1],
        relevance: Relevance::Relevant,
    };
    Term::case(ci, motive, scrut, brs)
}

/// `fun _ : nat => nat`
pub fn to_nat() -> Constr {
    Term::lambda(Binder::named("x"), nat_ty(), nat_ty())
}

pub fn fix1(name: &str, rec_arg: Option<usize>, ty: Constr, body: Constr) -> Constr {
    Term::fix(Fixpoint {
        rec_args: vec![rec_arg],
        index: 0,
        decl: RecDecl {
            names: vec![Binder::named(name)],
            types: vec![ty],
            bodies: vec![body],
        },
    })
}

pub fn cofix1(name: &str, ty: Constr, body: Constr) -> Constr {
    Term::cofix(CoFixpoint {
        index: 0,
        decl: RecDecl {
            names: vec![Binder::named(name)],
            types: vec![ty],
            bodies: vec![body],
        },
    })
}

pub fn nat2() -> Constr {
    Term::arrow(nat_ty(), Term::arrow(nat_ty(), nat_ty()))
}

/// `fix plus n m := match n with O => m | S p => S (plus p m) end`
pub fn plus(rec_arg: Option<usize>) -> Constr {
    let succ = Term::lambda(
        Binder::named("p"),
        nat_ty(),
        Term::app(Term::construct(nat(), 1), vec![Term::app(Term::rel(3), vec![Term::rel(0), Term::rel(1)])]),
    );
    let body = Term::lambda(
        Binder::named("n"),
        nat_ty(),
        Term::lambda(
            Binder::named("m"),
            nat_ty(),
            nat_case(to_nat(), Term::rel(1), vec![Term::rel(0), succ]),
        ),
    );
    fix1("plus", rec_arg, nat2(), body)
}

pub fn kind(r: KernelResult<impl Sized>) -> TypeErrorKind {
    match r {
        Ok(_) => panic!("expected a type error"),
        Err(e) => match e.kind() {
            Some(k) => k.clone(),
            None => panic!("expected a type error, got {}", e),
        },
    }
}
