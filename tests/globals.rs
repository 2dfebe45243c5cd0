mod common;

use std::rc::Rc;
use common::*;
use sized_cic::*;

fn poly(g: &mut GlobalContext, constraint: UnivConstraint) {
    let mut constraints = ConstraintSet::empty();
    constraints.add_univ(constraint);
    g.add_constant("T", ConstantDecl {
        ty: Term::type_(Universe::make(Level::Bound(0))),
        body: ConstantBody::Undef,
        universes: Universes::Polymorphic { nlevels: 1, constraints },
        hyps: vec![],
    });
}

fn at(name: &str, inst: Vec<Level>) -> Constr {
    Rc::new(Term::Const(name.into(), inst, None))
}

#[test]
fn section_variables_must_be_in_scope() {
    let mut g = common::globals(TypingFlags::default());
    g.add_constant("c", ConstantDecl {
        hyps: vec![NamedDecl::assum("A", Term::set())],
        ..ConstantDecl::axiom(Term::set())
    });
    let e = env_with(g);
    assert!(matches!(
        kind(infer(&e, &Term::constant("c"))),
        TypeErrorKind::ReferenceVariables { .. }
    ));

    let wrong = e.push_named(NamedDecl::assum("A", Term::prop()));
    assert!(matches!(
        kind(infer(&wrong, &Term::constant("c"))),
        TypeErrorKind::ReferenceVariables { .. }
    ));

    let right = e.push_named(NamedDecl::assum("A", Term::set()));
    let (ty, _) = infer(&right, &Term::constant("c")).unwrap();
    assert_eq!(ty, Term::set());
}

#[test]
fn section_definitions_must_agree() {
    let mut g = common::globals(TypingFlags::default());
    g.add_constant("c", ConstantDecl {
        hyps: vec![NamedDecl::def("A", nat_ty(), Term::set())],
        ..ConstantDecl::axiom(Term::set())
    });
    let e = env_with(g);

    let other = e.push_named(NamedDecl::def("A", Term::ind(bool_()), Term::set()));
    assert!(matches!(
        kind(infer(&other, &Term::constant("c"))),
        TypeErrorKind::ReferenceVariables { .. }
    ));

    let same = e.push_named(NamedDecl::def("A", nat_ty(), Term::set()));
    assert!(infer(&same, &Term::constant("c")).is_ok());

    // an assumption can stand for a definition
    let opaque = e.push_named(NamedDecl::assum("A", Term::set()));
    assert!(infer(&opaque, &Term::constant("c")).is_ok());
}

#[test]
fn unbound_references() {
    assert!(matches!(
        kind(infer(&env(), &Term::constant("nope"))),
        TypeErrorKind::UnboundReference(_)
    ));
    assert!(matches!(kind(infer(&env(), &Term::var("x"))), TypeErrorKind::UnboundVar(_)));
}

#[test]
fn universe_polymorphic_instances() {
    let mut g = common::globals(TypingFlags::default());
    let l = g.fresh();
    poly(&mut g, UnivConstraint::new(Level::Set, ConstraintKind::Lt, Level::Bound(0)));
    let e = env_with(g);

    let (ty, cs) = infer(&e, &at("T", vec![l])).unwrap();
    assert_eq!(ty, Term::type_(Universe::make(l)));
    assert_eq!(cs.univ_count(), 1);

    assert!(matches!(
        kind(infer(&e, &at("T", vec![]))),
        TypeErrorKind::BadInstance { expected: 1, found: 0, .. }
    ));
    assert!(matches!(
        kind(infer(&e, &at("T", vec![l, l]))),
        TypeErrorKind::BadInstance { expected: 1, found: 2, .. }
    ));
}

#[test]
fn unsatisfiable_instances() {
    let mut g = common::globals(TypingFlags::default());
    let l = g.fresh();
    poly(&mut g, UnivConstraint::new(Level::Bound(0), ConstraintKind::Lt, Level::Set));
    let e = env_with(g);
    assert!(matches!(
        kind(infer(&e, &at("T", vec![l]))),
        TypeErrorKind::UnsatisfiedConstraints(_)
    ));

    let mut lax = common::globals(TypingFlags {
        check_universes: false,
        ..TypingFlags::default()
    });
    let l = lax.fresh();
    poly(&mut lax, UnivConstraint::new(Level::Bound(0), ConstraintKind::Lt, Level::Set));
    assert!(infer(&env_with(lax), &at("T", vec![l])).is_ok());
}

#[test]
fn undeclared_levels() {
    let mut other = GlobalContext::default();
    let stray = (0..8).map(|_| other.fresh()).last().unwrap();

    let mut g = common::globals(TypingFlags::default());
    poly(&mut g, UnivConstraint::new(Level::Set, ConstraintKind::Le, Level::Bound(0)));
    let e = env_with(g);
    assert!(matches!(kind(infer(&e, &at("T", vec![stray]))), TypeErrorKind::UndeclaredLevel(_)));
    assert!(matches!(
        kind(infer(&e, &Term::type_(Universe::make(stray)))),
        TypeErrorKind::UndeclaredLevel(_)
    ));
}

fn prims(flags: TypingFlags) -> GlobalContext {
    let mut g = common::globals(flags);
    g.add_constant("int", ConstantDecl::axiom(Term::set()));
    g.register_int("int");
    g.register_bool(bool_());
    let int = || Term::constant("int");
    for (name, op, ret) in vec![
        ("add", PrimOp::Add, int()),
        ("mul", PrimOp::Mul, int()),
        ("eqb", PrimOp::Eqb, Term::ind(bool_())),
    ] {
        g.add_constant(name, ConstantDecl {
            body: ConstantBody::Primitive(op),
            ..ConstantDecl::axiom(Term::arrow(int(), Term::arrow(int(), ret)))
        });
    }
    g
}

#[test]
fn primitive_integers() {
    let e = env_with(prims(TypingFlags::default()));
    let sum = Term::app(Term::constant("add"), vec![Term::int(2), Term::int(3)]);
    let (ty, _) = infer(&e, &sum).unwrap();
    assert_eq!(ty, Term::constant("int"));
    assert_eq!(reduce::whd_all(&e, &sum), Term::int(5));

    let prod = Term::app(Term::constant("mul"), vec![sum, Term::int(4)]);
    assert_eq!(reduce::whd_all(&e, &prod), Term::int(20));

    let same = Term::app(Term::constant("eqb"), vec![Term::int(7), Term::int(7)]);
    let (ty, _) = infer(&e, &same).unwrap();
    assert_eq!(ty, Term::ind(bool_()));
    assert_eq!(reduce::whd_all(&e, &same), Term::construct(bool_(), 0));
}

#[test]
fn primitive_declarations_are_checked() {
    let mut g = prims(TypingFlags::default());
    g.add_constant("bad", ConstantDecl {
        body: ConstantBody::Primitive(PrimOp::Ltb),
        ..ConstantDecl::axiom(Term::arrow(Term::constant("int"), Term::constant("int")))
    });
    let e = env_with(g);
    assert!(matches!(
        kind(infer(&e, &Term::constant("bad"))),
        TypeErrorKind::IncorrectPrimitive { op: PrimOp::Ltb, .. }
    ));
}

#[test]
fn primitives_need_registration() {
    let e = env();
    assert!(matches!(infer(&e, &Term::int(1)), Err(KernelError::Configuration(_))));
}

#[test]
fn template_polymorphism() {
    let mut g = common::globals(TypingFlags::default());
    let l = g.fresh();
    let list = IndRef::new("list", 0);
    let a_sort = Term::type_(Universe::make(l));
    let list_of = |a: Constr| Term::app(Term::ind(list.clone()), vec![a]);
    g.add_inductive("list", MutInductive {
        params: vec![LocalBinder::Assum(Binder::named("A"), a_sort.clone())],
        packets: vec![OneInductive {
            name: "list".into(),
            indices: vec![],
            sort: Sort::type_(Universe::make(l)),
            ctors: vec![
                Constructor {
                    name: "nil".into(),
                    ty: Term::prod(Binder::named("A"), a_sort.clone(), list_of(Term::rel(0))),
                },
                Constructor {
                    name: "cons".into(),
                    ty: Term::prod(
                        Binder::named("A"),
                        a_sort,
                        Term::arrow(Term::rel(0), Term::arrow(list_of(Term::rel(1)), list_of(Term::rel(2)))),
                    ),
                },
            ],
        }],
        finite: Finiteness::Finite,
        universes: Universes::Template { param_levels: vec![Some(l)] },
        hyps: vec![],
    });
    let e = env_with(g);

    let (ty, _) = infer(&e, &list_of(nat_ty())).unwrap();
    assert_eq!(ty, Term::set());

    let (ty, _) = infer(&e, &list_of(Term::set())).unwrap();
    assert_eq!(ty, Term::type_(Universe::type1()));

    let one = Term::app(Term::construct(list.clone(), 1), vec![
        nat_ty(),
        num(1),
        Term::app(Term::construct(list, 0), vec![nat_ty()]),
    ]);
    assert!(infer(&e, &one).is_ok());
}

#[test]
fn size_preserving_constants() {
    let mut g = common::globals(TypingFlags::default());
    // pred : nat^ı -> nat^ı
    let sized = Rc::new(Term::Ind(nat(), vec![], Annot::Glob(Stage::var(SVar(0)))));
    g.add_constant("pred", ConstantDecl::axiom(Term::arrow(sized.clone(), sized)));
    g.add_constant("opaque_pred", ConstantDecl::axiom(Term::arrow(nat_ty(), nat_ty())));
    let e = env_with(g);

    // fix f n := match n with O => O | S p => f (pred p) end
    let through = |c: &str| {
        let call = Term::app(Term::rel(2), vec![Term::app(Term::constant(c), vec![Term::rel(0)])]);
        let body = Term::lambda(
            Binder::named("n"),
            nat_ty(),
            nat_case(to_nat(), Term::rel(0), vec![num(0), Term::lambda(Binder::named("p"), nat_ty(), call)]),
        );
        fix1("f", Some(0), Term::arrow(nat_ty(), nat_ty()), body)
    };
    assert!(infer(&e, &through("pred")).is_ok());
    assert!(matches!(
        kind(infer(&e, &through("opaque_pred"))),
        TypeErrorKind::UnsatisfiedStageConstraints { .. }
    ));
}
