use std::rc::Rc;
use log::LevelFilter;
use sized_cic::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "sized-cic", about = "Type checks a few recursive definitions with sized types")]
struct Cli {
    #[structopt(
        long,
        help = "Sets the log level",
        default_value = "info",
        possible_values = &["off", "error", "warn", "info", "debug", "trace"]
    )]
    log_level: LevelFilter,

    #[structopt(long, help = "Checks (co)fixpoints without size annotations")]
    no_sized: bool,

    #[structopt(long, help = "Enables the syntactic guard condition")]
    guard: bool,
}

fn setup_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}: {}", record.level().to_string().to_lowercase(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}

fn nat() -> IndRef {
    IndRef::new("nat", 0)
}

fn stream() -> IndRef {
    IndRef::new("stream", 0)
}

fn globals(flags: TypingFlags) -> GlobalContext {
    let mut ctx = GlobalContext::new(flags);
    let n = Term::ind(nat());
    ctx.add_inductive("nat", MutInductive {
        params: vec![],
        packets: vec![OneInductive {
            name: "nat".into(),
            indices: vec![],
            sort: Sort::Set,
            ctors: vec![
                Constructor { name: "O".into(), ty: n.clone() },
                Constructor { name: "S".into(), ty: Term::arrow(n.clone(), n.clone()) },
            ],
        }],
        finite: Finiteness::Finite,
        universes: Universes::Monomorphic,
        hyps: vec![],
    });
    let s = Term::ind(stream());
    ctx.add_inductive("stream", MutInductive {
        params: vec![],
        packets: vec![OneInductive {
            name: "stream".into(),
            indices: vec![],
            sort: Sort::Set,
            ctors: vec![Constructor {
                name: "Cons".into(),
                ty: Term::arrow(n, Term::arrow(s.clone(), s)),
            }],
        }],
        finite: Finiteness::CoFinite,
        universes: Universes::Monomorphic,
        hyps: vec![],
    });
    ctx
}

fn num(k: usize) -> Constr {
    (0..k).fold(Term::construct(nat(), 0), |acc, _| Term::app(Term::construct(nat(), 1), vec![acc]))
}

fn nat_case(motive: Constr, scrut: Constr, brs: Vec<Constr>) -> Constr {
    let ci = CaseInfo {
        ind: nat(),
        npar: 0,
        cstr_nargs: vec![0, 1],
        relevance: Relevance::Relevant,
    };
    Term::case(ci, motive, scrut, brs)
}

/// `fix plus n m := match n with O => m | S p => S (plus p m) end`
fn plus() -> Constr {
    let n = Term::ind(nat());
    let motive = Term::lambda(Binder::named("x"), n.clone(), n.clone());
    let succ = Term::lambda(
        Binder::named("p"),
        n.clone(),
        Term::app(Term::construct(nat(), 1), vec![Term::app(Term::rel(3), vec![Term::rel(0), Term::rel(1)])]),
    );
    let body = Term::lambda(
        Binder::named("n"),
        n.clone(),
        Term::lambda(Binder::named("m"), n.clone(), nat_case(motive, Term::rel(1), vec![Term::rel(0), succ])),
    );
    Term::fix(Fixpoint {
        rec_args: vec![None],
        index: 0,
        decl: RecDecl {
            names: vec![Binder::named("plus")],
            types: vec![Term::arrow(n.clone(), Term::arrow(n.clone(), n))],
            bodies: vec![body],
        },
    })
}

/// `fix loop n := loop n`
fn looping() -> Constr {
    let n = Term::ind(nat());
    Term::fix(Fixpoint {
        rec_args: vec![None],
        index: 0,
        decl: RecDecl {
            names: vec![Binder::named("loop")],
            types: vec![Term::arrow(n.clone(), n.clone())],
            bodies: vec![Term::lambda(Binder::named("n"), n, Term::app(Term::rel(1), vec![Term::rel(0)]))],
        },
    })
}

/// `cofix zeros := Cons O zeros`
fn zeros() -> Constr {
    Term::cofix(CoFixpoint {
        index: 0,
        decl: RecDecl {
            names: vec![Binder::named("zeros")],
            types: vec![Term::ind(stream())],
            bodies: vec![Term::app(Term::construct(stream(), 0), vec![num(0), Term::rel(0)])],
        },
    })
}

fn main() -> Result<(), log::SetLoggerError> {
    let cli = Cli::from_args();
    setup_logging(cli.log_level)?;
    let flags = TypingFlags {
        check_sized: !cli.no_sized,
        check_guarded: cli.guard,
        ..TypingFlags::default()
    };
    let env = Env::new(Rc::new(globals(flags)));

    let samples = vec![
        ("plus", plus()),
        ("plus 2 3", Term::app(plus(), vec![num(2), num(3)])),
        ("loop", looping()),
        ("zeros", zeros()),
    ];
    for (name, t) in samples {
        let mut checker = Checker::new();
        match checker.execute(&env, &t) {
            Ok(j) => println!("{} : {}\n  sized: {}", name, annot::erase(&j.ty), j),
            Err(e) => println!("{} rejected: {}", name, e),
        }
    }
    let mut checker = Checker::new();
    if let Ok(j) = checker.execute(&env, &Term::app(plus(), vec![num(2), num(3)])) {
        println!("plus 2 3 has head normal form {}", annot::erase(&reduce::whd_all(&env, &j.term)));
    }
    Ok(())
}
