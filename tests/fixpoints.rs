mod common;

use common::*;
use sized_cic::*;

fn flags(check_sized: bool, check_guarded: bool) -> TypingFlags {
    TypingFlags {
        check_sized,
        check_guarded,
        ..TypingFlags::default()
    }
}

/// `fix f n := f n`
fn looping(rec_arg: Option<usize>) -> Constr {
    let body = Term::lambda(Binder::named("n"), nat_ty(), Term::app(Term::rel(1), vec![Term::rel(0)]));
    fix1("f", rec_arg, Term::arrow(nat_ty(), nat_ty()), body)
}

/// `fix f m n := match n with O => m | S p => f m p end`
fn on_second(rec_arg: Option<usize>) -> Constr {
    let step = Term::lambda(Binder::named("p"), nat_ty(), Term::app(Term::rel(3), vec![Term::rel(2), Term::rel(0)]));
    let body = Term::lambda(
        Binder::named("m"),
        nat_ty(),
        Term::lambda(
            Binder::named("n"),
            nat_ty(),
            nat_case(to_nat(), Term::rel(0), vec![Term::rel(1), step]),
        ),
    );
    fix1("f", rec_arg, nat2(), body)
}

/// `fix f n := match n with O => O | S p => f (p : mynat) end`, where
/// `mynat := nat` carries no sizes.
fn through_alias() -> Constr {
    let call = Term::app(Term::rel(2), vec![Term::cast(Term::rel(0), CastKind::Default, Term::constant("mynat"))]);
    let body = Term::lambda(
        Binder::named("n"),
        nat_ty(),
        nat_case(to_nat(), Term::rel(0), vec![num(0), Term::lambda(Binder::named("p"), nat_ty(), call)]),
    );
    fix1("f", Some(0), Term::arrow(nat_ty(), nat_ty()), body)
}

/// `fun k => fix f n := match n with O => k | S p => f p end`
fn returns_outer() -> Constr {
    let step = Term::lambda(Binder::named("p"), nat_ty(), Term::app(Term::rel(2), vec![Term::rel(0)]));
    let body = Term::lambda(
        Binder::named("n"),
        nat_ty(),
        nat_case(to_nat(), Term::rel(0), vec![Term::rel(2), step]),
    );
    Term::lambda(Binder::named("k"), nat_ty(), fix1("f", Some(0), Term::arrow(nat_ty(), nat_ty()), body))
}

/// `fix f n := match n with
///  | O => O
///  | S p => (fix g m := match m with O => f x | S q => g q end) p
///  end`, with `x` given as an index under `m`.
fn nested(x: usize) -> Constr {
    let inner_step = Term::lambda(Binder::named("q"), nat_ty(), Term::app(Term::rel(2), vec![Term::rel(0)]));
    let inner_body = Term::lambda(
        Binder::named("m"),
        nat_ty(),
        nat_case(to_nat(), Term::rel(0), vec![Term::app(Term::rel(4), vec![Term::rel(x)]), inner_step]),
    );
    let inner = fix1("g", Some(0), Term::arrow(nat_ty(), nat_ty()), inner_body);
    let step = Term::lambda(Binder::named("p"), nat_ty(), Term::app(inner, vec![Term::rel(0)]));
    let body = Term::lambda(
        Binder::named("n"),
        nat_ty(),
        nat_case(to_nat(), Term::rel(0), vec![num(0), step]),
    );
    fix1("f", Some(0), Term::arrow(nat_ty(), nat_ty()), body)
}

fn alias_env(flags: TypingFlags) -> Env {
    let mut g = common::globals(flags);
    g.add_constant("mynat", ConstantDecl::definition(Term::set(), nat_ty()));
    env_with(g)
}

fn elaborated_rec_args(env: &Env, t: &Constr) -> Vec<Option<usize>> {
    let mut checker = Checker::new();
    let j = checker.execute(env, t).unwrap();
    match &*j.term {
        Term::Fix(fix) => fix.rec_args.clone(),
        other => panic!("expected a fixpoint, got {}", other),
    }
}

#[test]
fn addition_is_accepted() {
    let (ty, cs) = infer(&env(), &plus(Some(0))).unwrap();
    assert_eq!(ty, nat2());
    assert!(cs.stages().next().is_none());
    assert_eq!(elaborated_rec_args(&env(), &plus(None)), vec![Some(0)]);
}

#[test]
fn addition_applied() {
    let (ty, _) = infer(&env(), &Term::app(plus(None), vec![num(2), num(3)])).unwrap();
    assert_eq!(ty, nat_ty());
}

#[test]
fn decreasing_argument_is_searched() {
    assert_eq!(elaborated_rec_args(&env(), &on_second(None)), vec![Some(1)]);
    assert!(matches!(
        kind(infer(&env(), &on_second(Some(0)))),
        TypeErrorKind::UnsatisfiedStageConstraints { .. }
    ));
}

#[test]
fn non_decreasing_call_is_rejected() {
    assert!(matches!(kind(infer(&env(), &looping(None))), TypeErrorKind::CannotGuessDecreasingArg));
    assert!(matches!(
        kind(infer(&env(), &looping(Some(0)))),
        TypeErrorKind::UnsatisfiedStageConstraints { .. }
    ));
}

#[test]
fn results_may_depend_on_outer_variables() {
    let (ty, _) = infer(&env(), &returns_outer()).unwrap();
    assert_eq!(ty, Term::prod(Binder::named("k"), nat_ty(), Term::arrow(nat_ty(), nat_ty())));
}

#[test]
fn outer_variables_are_not_smaller() {
    // fun k => fix f n := f k
    let body = Term::lambda(Binder::named("n"), nat_ty(), Term::app(Term::rel(1), vec![Term::rel(2)]));
    let t = Term::lambda(Binder::named("k"), nat_ty(), fix1("f", Some(0), Term::arrow(nat_ty(), nat_ty()), body));
    assert!(matches!(
        kind(infer(&env(), &t)),
        TypeErrorKind::UnsatisfiedStageConstraints { .. }
    ));
}

#[test]
fn nested_fixpoint_calls_the_enclosing_one() {
    // f p
    let (ty, _) = infer(&env(), &nested(2)).unwrap();
    assert_eq!(ty, Term::arrow(nat_ty(), nat_ty()));

    // f n
    assert!(matches!(
        kind(infer(&env(), &nested(3))),
        TypeErrorKind::UnsatisfiedStageConstraints { .. }
    ));
}

#[test]
fn recursion_must_be_on_an_inductive() {
    let body = Term::lambda(Binder::named("A"), Term::set(), Term::rel(0));
    let t = fix1("f", Some(0), Term::arrow(Term::set(), Term::set()), body);
    assert!(matches!(kind(infer(&env(), &t)), TypeErrorKind::RecursionNotOnInductive { index: 0 }));

    let t = fix1("f", Some(3), Term::arrow(nat_ty(), nat_ty()), Term::lambda(Binder::named("n"), nat_ty(), Term::rel(0)));
    assert!(matches!(kind(infer(&env(), &t)), TypeErrorKind::RecursionNotOnInductive { index: 0 }));
}

#[test]
fn ill_typed_body() {
    let t = fix1("f", Some(0), Term::arrow(nat_ty(), nat_ty()), Term::lambda(Binder::named("n"), nat_ty(), Term::set()));
    assert!(matches!(kind(infer(&env(), &t)), TypeErrorKind::IllTypedRecBody { index: 0, .. }));
}

#[test]
fn mutual_even_odd() {
    let b = || Term::ind(bool_());
    let to_bool = Term::lambda(Binder::named("x"), nat_ty(), b());
    let body = |base: Constr, other: usize| {
        let step = Term::lambda(Binder::named("p"), nat_ty(), Term::app(Term::rel(other), vec![Term::rel(0)]));
        Term::lambda(Binder::named("n"), nat_ty(), nat_case(to_bool.clone(), Term::rel(0), vec![base, step]))
    };
    let decl = RecDecl {
        names: vec![Binder::named("even"), Binder::named("odd")],
        types: vec![Term::arrow(nat_ty(), b()), Term::arrow(nat_ty(), b())],
        bodies: vec![
            body(Term::construct(bool_(), 0), 2),
            body(Term::construct(bool_(), 1), 3),
        ],
    };
    let even = Term::fix(Fixpoint { rec_args: vec![None, None], index: 0, decl: decl.clone() });
    let (ty, _) = infer(&env(), &even).unwrap();
    assert_eq!(ty, Term::arrow(nat_ty(), b()));

    let odd = Term::fix(Fixpoint { rec_args: vec![Some(0), Some(0)], index: 1, decl });
    assert!(infer(&env(), &odd).is_ok());
}

#[test]
fn malformed_block_is_an_anomaly() {
    let t = Term::fix(Fixpoint {
        rec_args: vec![Some(0)],
        index: 1,
        decl: RecDecl {
            names: vec![Binder::named("f")],
            types: vec![Term::arrow(nat_ty(), nat_ty())],
            bodies: vec![Term::lambda(Binder::named("n"), nat_ty(), Term::rel(0))],
        },
    });
    assert!(matches!(infer(&env(), &t), Err(KernelError::Anomaly(_))));
}

#[test]
fn guard_rescues_what_sizes_cannot_see() {
    let sized_only = alias_env(flags(true, false));
    assert!(matches!(
        kind(infer(&sized_only, &through_alias())),
        TypeErrorKind::UnsatisfiedStageConstraints { .. }
    ));

    let with_guard = alias_env(flags(true, true));
    let (ty, _) = infer(&with_guard, &through_alias()).unwrap();
    assert_eq!(ty, Term::arrow(nat_ty(), nat_ty()));
}

#[test]
fn guard_alone() {
    let e = env_with(common::globals(flags(false, true)));
    assert!(infer(&e, &plus(None)).is_ok());
    assert_eq!(elaborated_rec_args(&e, &on_second(None)), vec![Some(1)]);
    assert!(matches!(kind(infer(&e, &looping(None))), TypeErrorKind::CannotGuessDecreasingArg));
    assert!(matches!(
        kind(infer(&e, &looping(Some(0)))),
        TypeErrorKind::IllFormedRecBody { index: 0 }
    ));
}

#[test]
fn unchecked_termination() {
    let e = env_with(common::globals(flags(false, false)));
    assert!(infer(&e, &looping(None)).is_ok());
    assert_eq!(elaborated_rec_args(&e, &looping(None)), vec![Some(0)]);
}
