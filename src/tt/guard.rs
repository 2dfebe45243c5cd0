//! The syntactic guard condition, kept as a fallback for definitions sized
//! typing cannot justify.
//!
//! Bodies are read under the block's recursive binders: in the body of a
//! block of `n` definitions, `Rel(depth + n - 1 - j)` is definition `j`.
//! Local binders are tracked by level, counted from the top of the body.

use super::term::{decompose_app, iter_children, occurs_rel_between, strip_outer_cast, Constr, RecDecl, Term};

struct FixGuard<'a> {
    ks: &'a [usize],
}

impl FixGuard<'_> {
    fn rec_fn(&self, r: usize, depth: usize) -> Option<usize> {
        let n = self.ks.len();
        if r >= depth && r - depth < n {
            Some(n - 1 - (r - depth))
        } else {
            None
        }
    }

    fn level_of(t: &Constr, depth: usize) -> Option<usize> {
        match &**strip_outer_cast(t) {
            Term::Rel(q, _) if *q < depth => Some(depth - 1 - q),
            _ => None,
        }
    }

    fn check(&self, t: &Constr, depth: usize, subterms: &[usize], rec: Option<usize>) -> bool {
        let (head, args) = decompose_app(t);
        if let Term::Rel(r, _) = &**head {
            if let Some(j) = self.rec_fn(*r, depth) {
                let decreasing = args
                    .get(self.ks[j])
                    .and_then(|a| Self::level_of(a, depth))
                    .map_or(false, |l| subterms.contains(&l));
                return decreasing && args.iter().all(|a| self.check(a, depth, subterms, rec));
            }
        }
        if !args.is_empty() {
            return self.check(head, depth, subterms, rec)
                && args.iter().all(|a| self.check(a, depth, subterms, rec));
        }
        match &**t {
            Term::Rel(r, _) => self.rec_fn(*r, depth).is_none(),
            Term::Case(ci, p, c, brs) => {
                if !self.check(p, depth, subterms, rec) || !self.check(c, depth, subterms, rec) {
                    return false;
                }
                let destructs = Self::level_of(c, depth)
                    .map_or(false, |l| rec == Some(l) || subterms.contains(&l));
                brs.iter().enumerate().all(|(j, br)| {
                    let nargs = if destructs {
                        ci.cstr_nargs.get(j).copied().unwrap_or(0)
                    } else {
                        0
                    };
                    self.check_branch(br, depth, subterms.to_vec(), rec, nargs)
                })
            },
            _ => {
                let mut ok = true;
                iter_children(t, depth, |c, d| ok = ok && self.check(c, d, subterms, rec));
                ok
            },
        }
    }

    /// Constructor arguments bound by a branch destructing a subterm are
    /// subterms themselves.
    fn check_branch(&self, br: &Constr, depth: usize, mut subterms: Vec<usize>, rec: Option<usize>, nargs: usize) -> bool {
        match &**br {
            Term::Lambda(_, ty, body) if nargs > 0 => {
                if !self.check(ty, depth, &subterms, rec) {
                    return false;
                }
                subterms.push(depth);
                self.check_branch(body, depth + 1, subterms, rec, nargs - 1)
            },
            _ => self.check(br, depth, &subterms, rec),
        }
    }

    fn check_body(&self, body: &Constr, k: usize) -> bool {
        let mut t = body.clone();
        for depth in 0..=k {
            let next = match &*t {
                Term::Lambda(_, ty, b) if self.check(ty, depth, &[], None) => b.clone(),
                _ => return false,
            };
            t = next;
        }
        self.check(&t, k + 1, &[], Some(k))
    }
}

/// Checks that every recursive call of the block decreases structurally on
/// the arguments `ks`, returning the first offending definition otherwise.
pub fn check_fix(decl: &RecDecl, ks: &[usize]) -> Result<(), usize> {
    let guard = FixGuard { ks };
    match decl
        .bodies
        .iter()
        .zip(ks)
        .position(|(body, &k)| !guard.check_body(body, k))
    {
        Some(i) => Err(i),
        None => Ok(()),
    }
}

fn check_cobody(t: &Constr, depth: usize, n: usize, guarded: bool) -> bool {
    let mentions = |c: &Constr, d: usize| occurs_rel_between(c, d, d + n);
    let (head, args) = decompose_app(t);
    if !args.is_empty() {
        return match &**head {
            Term::Construct(..) => args.iter().all(|a| check_cobody(a, depth, n, true)),
            Term::Rel(r, _) if *r >= depth && r - depth < n => {
                guarded && !args.iter().any(|a| mentions(a, depth))
            },
            _ => !mentions(t, depth),
        };
    }
    match &**t {
        Term::Rel(r, _) if *r >= depth && r - depth < n => guarded,
        Term::Lambda(_, ty, body) => !mentions(ty, depth) && check_cobody(body, depth + 1, n, guarded),
        Term::LetIn(_, v, ty, body) => {
            !mentions(v, depth) && !mentions(ty, depth) && check_cobody(body, depth + 1, n, guarded)
        },
        Term::Cast(c, _, ty) => !mentions(ty, depth) && check_cobody(c, depth, n, guarded),
        Term::Case(_, p, c, brs) => {
            !mentions(p, depth) && !mentions(c, depth) && brs.iter().all(|b| check_cobody(b, depth, n, guarded))
        },
        _ => !mentions(t, depth),
    }
}

/// Checks that every corecursive call of the block is guarded by a
/// constructor.
pub fn check_cofix(decl: &RecDecl) -> Result<(), usize> {
    let n = decl.len();
    match decl.bodies.iter().position(|b| !check_cobody(b, 0, n, false)) {
        Some(i) => Err(i),
        None => Ok(()),
    }
}
