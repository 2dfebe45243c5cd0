//! A typing kernel for the calculus of inductive constructions with sized
//! types.

pub mod annot;
pub mod constraint;
pub mod env;
pub mod error;
pub mod fixpoint;
pub mod guard;
pub mod inductive;
pub mod level;
pub mod reccheck;
pub mod reduce;
pub mod stage;
pub mod term;
pub mod typeops;

pub use constraint::{ConstraintSet, StageConstraint};
pub use env::{
    ConstantBody, ConstantDecl, Constructor, Env, Finiteness, GlobalContext, LocalDecl, MutInductive,
    NamedDecl, OneInductive, PrimOp, Universes, TypingFlags,
};
pub use error::{KernelError, KernelResult, TypeError, TypeErrorKind};
pub use level::{ConstraintKind, Level, UnivConstraint, Universe};
pub use stage::{Annot, SVar, Stage, StageState};
pub use term::{
    Binder, CaseInfo, CastKind, CoFixpoint, Constr, CtorRef, Fixpoint, IndRef, LocalBinder, ProjRef,
    RecDecl, Relevance, Sort, Term,
};
pub use typeops::{check, infer, infer_type, Checker, Diagnostic, Judgment};
