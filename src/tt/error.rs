use std::collections::BTreeSet;
use thiserror::Error;
use super::constraint::ConstraintSet;
use super::env::{Env, PrimOp};
use super::level::Level;
use super::stage::SVar;
use super::term::{Constr, Ident, IndRef};

fn show_vars(vs: &BTreeSet<SVar>) -> String {
    let vs: Vec<_> = vs.iter().map(ToString::to_string).collect();
    format!("{{{}}}", vs.join(", "))
}

#[derive(Debug, Clone, Error)]
pub enum TypeErrorKind {
    #[error("unbound de Bruijn index {0}")]
    UnboundRel(usize),
    #[error("unbound variable {0}")]
    UnboundVar(Ident),
    #[error("unbound reference {0}")]
    UnboundReference(Ident),
    #[error("{term} has type {ty}, which is not a sort")]
    NotAType { term: Constr, ty: Constr },
    #[error("{term} has type {actual} but is expected to have type {expected}")]
    ActualType {
        term: Constr,
        actual: Constr,
        expected: Constr,
    },
    #[error("{func} of type {func_ty} cannot be applied")]
    CantApplyNotFunctional { func: Constr, func_ty: Constr },
    #[error("argument {index} has type {actual} but {expected} was expected")]
    CantApplyBadType {
        index: usize,
        expected: Constr,
        actual: Constr,
    },
    #[error("{term} of type {ty} cannot be matched on")]
    CaseNotInductive { term: Constr, ty: Constr },
    #[error("case annotation does not describe {0}")]
    WrongCaseInfo(IndRef),
    #[error("{found} branches given where {expected} were expected")]
    NumberBranches { expected: usize, found: usize },
    #[error("branch {index} has type {actual} but {expected} was expected")]
    IllFormedBranch {
        index: usize,
        actual: Constr,
        expected: Constr,
    },
    #[error("return clause of type {motive_ty} is not a valid elimination of {ind}")]
    ElimArity { ind: IndRef, motive_ty: Constr },
    #[error("recursive body {index} has type {actual} but {expected} was expected")]
    IllTypedRecBody {
        index: usize,
        actual: Constr,
        expected: Constr,
    },
    #[error("component {index} does not recurse on a sized inductive")]
    RecursionNotOnInductive { index: usize },
    #[error("cannot guess a decreasing argument")]
    CannotGuessDecreasingArg,
    #[error("size constraints cannot be satisfied: {} against {}", show_vars(.inferred), show_vars(.expected))]
    UnsatisfiedStageConstraints {
        inferred: BTreeSet<SVar>,
        expected: BTreeSet<SVar>,
    },
    #[error("recursive body {index} is not guarded")]
    IllFormedRecBody { index: usize },
    #[error("universe constraints {0} are unsatisfiable")]
    UnsatisfiedConstraints(ConstraintSet),
    #[error("undeclared universe level {0}")]
    UndeclaredLevel(Level),
    #[error("{reference} expects {expected} universe levels, {found} given")]
    BadInstance {
        reference: Ident,
        expected: usize,
        found: usize,
    },
    #[error("{reference} refers to variable {id} which is not available here")]
    ReferenceVariables { id: Ident, reference: Constr },
    #[error("primitive {op} is declared with type {actual} instead of {expected}")]
    IncorrectPrimitive {
        op: PrimOp,
        expected: Constr,
        actual: Constr,
    },
    #[error("{0} is not a record")]
    NotARecord(IndRef),
}

impl TypeErrorKind {
    pub fn at(self, env: &Env) -> KernelError {
        TypeError {
            env: env.clone(),
            kind: self,
        }.into()
    }

    /// Failures that depend on the choice of decreasing arguments.
    pub fn is_termination_failure(&self) -> bool {
        matches!(
            self,
            TypeErrorKind::RecursionNotOnInductive { .. }
                | TypeErrorKind::UnsatisfiedStageConstraints { .. }
                | TypeErrorKind::IllFormedRecBody { .. }
        )
    }
}

/// A recoverable typing error and the environment it arose in.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct TypeError {
    pub env: Env,
    pub kind: TypeErrorKind,
}

#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error(transparent)]
    Type(Box<TypeError>),
    /// The kernel reached a state well-formed input cannot produce.
    #[error("anomaly: {0}")]
    Anomaly(String),
    #[error("no {0} type registered for primitives")]
    Configuration(&'static str),
}

impl KernelError {
    pub fn kind(&self) -> Option<&TypeErrorKind> {
        match self {
            KernelError::Type(e) => Some(&e.kind),
            _ => None,
        }
    }
}

impl From<TypeError> for KernelError {
    fn from(e: TypeError) -> Self {
        KernelError::Type(Box::new(e))
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
