use std::fmt::{Display, Formatter, Result as FmtResult};
use std::rc::Rc;
use fnv::FnvHashMap;
use super::constraint::ConstraintSet;
use super::level::{Level, LevelSystem};
use super::term::{Binder, Constr, Ident, IndRef, LocalBinder, Sort};

/// Switches for the checks the kernel performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingFlags {
    /// Validate (co)fixpoints with size annotations.
    pub check_sized: bool,
    /// Validate (co)fixpoints with the syntactic guard condition, as a
    /// fallback for sized checking or on its own.
    pub check_guarded: bool,
    /// Check accumulated universe constraints against the universe graph.
    pub check_universes: bool,
    /// Record relevance repairs as diagnostics.
    pub report_relevance: bool,
}

impl Default for TypingFlags {
    fn default() -> Self {
        TypingFlags {
            check_sized: true,
            check_guarded: false,
            check_universes: true,
            report_relevance: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalDecl {
    Assum(Binder, Constr),
    /// Binder, value, type.
    Def(Binder, Constr, Constr),
}

impl LocalDecl {
    pub fn binder(&self) -> &Binder {
        match self {
            LocalDecl::Assum(b, _) | LocalDecl::Def(b, _, _) => b,
        }
    }

    pub fn ty(&self) -> &Constr {
        match self {
            LocalDecl::Assum(_, ty) | LocalDecl::Def(_, _, ty) => ty,
        }
    }

    pub fn value(&self) -> Option<&Constr> {
        match self {
            LocalDecl::Assum(..) => None,
            LocalDecl::Def(_, v, _) => Some(v),
        }
    }
}

impl From<&LocalBinder> for LocalDecl {
    fn from(b: &LocalBinder) -> Self {
        match b {
            LocalBinder::Assum(b, ty) => LocalDecl::Assum(b.clone(), ty.clone()),
            LocalBinder::Def(b, v, ty) => LocalDecl::Def(b.clone(), v.clone(), ty.clone()),
        }
    }
}

/// A section variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedDecl {
    pub id: Ident,
    pub ty: Constr,
    pub value: Option<Constr>,
}

impl NamedDecl {
    pub fn assum(id: &str, ty: Constr) -> Self {
        NamedDecl {
            id: id.into(),
            ty,
            value: None,
        }
    }

    pub fn def(id: &str, value: Constr, ty: Constr) -> Self {
        NamedDecl {
            id: id.into(),
            ty,
            value: Some(value),
        }
    }
}

#[derive(Debug)]
struct RelNode {
    decl: LocalDecl,
    next: Option<Rc<RelNode>>,
}

/// The de Bruijn context, innermost declaration first. Pushing shares the
/// tail.
#[derive(Debug, Clone, Default)]
pub struct RelContext {
    head: Option<Rc<RelNode>>,
    len: usize,
}

impl RelContext {
    pub fn push(&self, decl: LocalDecl) -> Self {
        RelContext {
            head: Some(Rc::new(RelNode {
                decl,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn lookup(&self, n: usize) -> Option<&LocalDecl> {
        self.iter().nth(n)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalDecl> + '_ {
        let mut cur = self.head.as_deref();
        std::iter::from_fn(move || {
            let node = cur?;
            cur = node.next.as_deref();
            Some(&node.decl)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eqb,
    Ltb,
    Leb,
}

impl PrimOp {
    pub fn returns_bool(self) -> bool {
        matches!(self, PrimOp::Eqb | PrimOp::Ltb | PrimOp::Leb)
    }

    pub fn arity(self) -> usize {
        2
    }
}

impl Display for PrimOp {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(match self {
            PrimOp::Add => "add",
            PrimOp::Sub => "sub",
            PrimOp::Mul => "mul",
            PrimOp::Div => "div",
            PrimOp::Mod => "mod",
            PrimOp::Eqb => "eqb",
            PrimOp::Ltb => "ltb",
            PrimOp::Leb => "leb",
        })
    }
}

/// The types primitive literals and operators are typed with. `bool` is an
/// inductive whose first constructor is `true`.
#[derive(Debug, Clone, Default)]
pub struct PrimTable {
    pub int: Option<Ident>,
    pub bool: Option<IndRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantBody {
    Undef,
    Def(Constr),
    Opaque(Constr),
    Primitive(PrimOp),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Universes {
    Monomorphic,
    /// Levels `Bound(0..nlevels)` instantiated at each use, under
    /// `constraints`.
    Polymorphic {
        nlevels: usize,
        constraints: ConstraintSet,
    },
    /// For inductives: the global level each parameter's sort is bound by,
    /// when the parameter is a type. The inductive's sort is recomputed from
    /// the actual arguments.
    Template {
        param_levels: Vec<Option<Level>>,
    },
}

impl Universes {
    pub fn nlevels(&self) -> usize {
        match self {
            Universes::Polymorphic { nlevels, .. } => *nlevels,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstantDecl {
    pub ty: Constr,
    pub body: ConstantBody,
    pub universes: Universes,
    pub hyps: Vec<NamedDecl>,
}

impl ConstantDecl {
    pub fn axiom(ty: Constr) -> Self {
        ConstantDecl {
            ty,
            body: ConstantBody::Undef,
            universes: Universes::Monomorphic,
            hyps: Vec::new(),
        }
    }

    pub fn definition(ty: Constr, body: Constr) -> Self {
        ConstantDecl {
            body: ConstantBody::Def(body),
            ..Self::axiom(ty)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finiteness {
    Finite,
    CoFinite,
    /// Non-recursive records.
    BiFinite,
}

#[derive(Debug, Clone)]
pub struct Constructor {
    pub name: Ident,
    /// The full type, parameters included; the block's inductives occur as
    /// unannotated `Ind` references.
    pub ty: Constr,
}

#[derive(Debug, Clone)]
pub struct OneInductive {
    pub name: Ident,
    /// Index telescope, under the parameters.
    pub indices: Vec<LocalBinder>,
    pub sort: Sort,
    pub ctors: Vec<Constructor>,
}

#[derive(Debug, Clone)]
pub struct MutInductive {
    pub params: Vec<LocalBinder>,
    pub packets: Vec<OneInductive>,
    pub finite: Finiteness,
    pub universes: Universes,
    pub hyps: Vec<NamedDecl>,
}

impl MutInductive {
    pub fn nparams(&self) -> usize {
        self.params.iter().filter(|b| matches!(b, LocalBinder::Assum(..))).count()
    }
}

/// Global declarations, the universe graph and the typing flags.
#[derive(Debug, Clone, Default)]
pub struct GlobalContext {
    constants: FnvHashMap<Ident, ConstantDecl>,
    inductives: FnvHashMap<Ident, MutInductive>,
    levels: LevelSystem,
    pub flags: TypingFlags,
    pub prims: PrimTable,
}

impl GlobalContext {
    pub fn new(flags: TypingFlags) -> Self {
        GlobalContext {
            flags,
            ..Self::default()
        }
    }

    pub fn fresh(&mut self) -> Level {
        Level::Var(self.levels.fresh_level(0))
    }

    pub fn levels(&self) -> &LevelSystem {
        &self.levels
    }

    /// Adds global universe constraints; `false` (and no change) if they
    /// would make the graph inconsistent.
    pub fn add_constraints(&mut self, cs: &ConstraintSet) -> bool {
        let mut next = self.levels.clone();
        if next.merge(cs) {
            self.levels = next;
            true
        } else {
            false
        }
    }

    pub fn add_constant(&mut self, name: &str, decl: ConstantDecl) {
        self.constants.insert(name.into(), decl);
    }

    pub fn add_inductive(&mut self, name: &str, mib: MutInductive) {
        self.inductives.insert(name.into(), mib);
    }

    pub fn register_int(&mut self, name: &str) {
        self.prims.int = Some(name.into());
    }

    pub fn register_bool(&mut self, ind: IndRef) {
        self.prims.bool = Some(ind);
    }

    pub fn lookup_constant(&self, name: &str) -> Option<&ConstantDecl> {
        self.constants.get(name)
    }

    pub fn lookup_mind(&self, name: &str) -> Option<&MutInductive> {
        self.inductives.get(name)
    }
}

impl Display for GlobalContext {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(&self.levels, f)
    }
}

/// Everything a judgment is made under. Cheap to clone; extending it never
/// touches the original.
#[derive(Debug, Clone)]
pub struct Env {
    globals: Rc<GlobalContext>,
    rels: RelContext,
    named: Rc<Vec<NamedDecl>>,
}

impl Env {
    pub fn new(globals: Rc<GlobalContext>) -> Self {
        Env {
            globals,
            rels: RelContext::default(),
            named: Rc::new(Vec::new()),
        }
    }

    pub fn globals(&self) -> &GlobalContext {
        &self.globals
    }

    pub fn flags(&self) -> TypingFlags {
        self.globals.flags
    }

    pub fn rels(&self) -> &RelContext {
        &self.rels
    }

    pub fn nrels(&self) -> usize {
        self.rels.len()
    }

    pub fn push_rel(&self, decl: LocalDecl) -> Self {
        Env {
            globals: self.globals.clone(),
            rels: self.rels.push(decl),
            named: self.named.clone(),
        }
    }

    pub fn push_assum(&self, b: Binder, ty: Constr) -> Self {
        self.push_rel(LocalDecl::Assum(b, ty))
    }

    /// Pushes a telescope, outermost first.
    pub fn push_binders(&self, ctx: &[LocalBinder]) -> Self {
        ctx.iter().fold(self.clone(), |env, b| env.push_rel(b.into()))
    }

    pub fn lookup_rel(&self, n: usize) -> Option<&LocalDecl> {
        self.rels.lookup(n)
    }

    pub fn push_named(&self, decl: NamedDecl) -> Self {
        let mut named = (*self.named).clone();
        named.push(decl);
        Env {
            globals: self.globals.clone(),
            rels: self.rels.clone(),
            named: Rc::new(named),
        }
    }

    pub fn lookup_named(&self, id: &str) -> Option<&NamedDecl> {
        self.named.iter().rev().find(|d| &*d.id == id)
    }

    pub fn named(&self) -> &[NamedDecl] {
        &self.named
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::term::Term;

    #[test]
    fn rel_context_is_persistent() {
        let env = Env::new(Rc::new(GlobalContext::default()));
        let e1 = env.push_assum(Binder::named("x"), Term::set());
        let e2 = e1.push_assum(Binder::named("y"), Term::prop());
        assert_eq!(env.nrels(), 0);
        assert_eq!(e1.nrels(), 1);
        assert_eq!(e2.lookup_rel(0).map(|d| d.ty().clone()), Some(Term::prop()));
        assert_eq!(e2.lookup_rel(1).map(|d| d.ty().clone()), Some(Term::set()));
        assert!(e2.lookup_rel(2).is_none());
    }

    #[test]
    fn named_lookup_prefers_latest() {
        let env = Env::new(Rc::new(GlobalContext::default()))
            .push_named(NamedDecl::assum("a", Term::set()))
            .push_named(NamedDecl::assum("a", Term::prop()));
        assert_eq!(env.lookup_named("a").map(|d| d.ty.clone()), Some(Term::prop()));
    }

    #[test]
    fn inconsistent_constraints_are_refused() {
        use crate::tt::level::{ConstraintKind, UnivConstraint};
        let mut globals = GlobalContext::default();
        let u = globals.fresh();
        let mut cs = ConstraintSet::empty();
        cs.add_univ(UnivConstraint::new(u, ConstraintKind::Lt, Level::Set));
        assert!(!globals.add_constraints(&cs));
        assert!(globals.levels().is_consistent());
    }
}
