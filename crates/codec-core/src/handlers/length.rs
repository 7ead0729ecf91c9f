//! Length-bound consolidation, shared by the string, bytes, and sequence
//! handlers: reduce an arbitrary set of `Length` constraints to at most one
//! effective lower and one effective upper bound, with `Eq` dominating both
//! sides.

use crate::constraints::{Comparator, Constraint, ConstraintId, Constraints};
use crate::issue::{Issue, IssueKind};
use crate::pointer::Pointer;

pub struct LengthBounds {
    pub lower: Option<(Comparator, usize)>,
    pub upper: Option<(Comparator, usize)>,
}

pub fn consolidate(constraints: &Constraints) -> LengthBounds {
    if let Some(Constraint::Length { limit, .. }) = constraints.get(ConstraintId::Length(Comparator::Eq)) {
        return LengthBounds { lower: Some((Comparator::Ge, *limit)), upper: Some((Comparator::Le, *limit)) };
    }
    let mut lower: Option<(Comparator, usize)> = None;
    for comparator in [Comparator::Ge, Comparator::Gt] {
        if let Some(Constraint::Length { comparator, limit }) = constraints.get(ConstraintId::Length(comparator)) {
            lower = Some(match lower {
                Some((_, existing)) if existing >= *limit => lower.unwrap(),
                _ => (*comparator, *limit),
            });
        }
    }
    let mut upper: Option<(Comparator, usize)> = None;
    for comparator in [Comparator::Le, Comparator::Lt] {
        if let Some(Constraint::Length { comparator, limit }) = constraints.get(ConstraintId::Length(comparator)) {
            upper = Some(match upper {
                Some((_, existing)) if existing <= *limit => upper.unwrap(),
                _ => (*comparator, *limit),
            });
        }
    }
    LengthBounds { lower, upper }
}

pub fn check(bounds: &LengthBounds, actual: usize, pointer: &Pointer) -> Vec<Issue> {
    let mut issues = Vec::new();
    if let Some((comparator, limit)) = bounds.lower {
        let ok = match comparator {
            Comparator::Ge => actual >= limit,
            Comparator::Gt => actual > limit,
            _ => true,
        };
        if !ok {
            issues.push(Issue::new(pointer.clone(), IssueKind::Length { comparator, limit, actual }));
        }
    }
    if let Some((comparator, limit)) = bounds.upper {
        let ok = match comparator {
            Comparator::Le => actual <= limit,
            Comparator::Lt => actual < limit,
            _ => true,
        };
        if !ok {
            issues.push(Issue::new(pointer.clone(), IssueKind::Length { comparator, limit, actual }));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_dominates_both_sides() {
        let mut constraints = Constraints::empty();
        constraints.insert(Constraint::Length { comparator: Comparator::Ge, limit: 1 });
        constraints.insert(Constraint::Length { comparator: Comparator::Eq, limit: 3 });
        let bounds = consolidate(&constraints);
        assert_eq!(bounds.lower, Some((Comparator::Ge, 3)));
        assert_eq!(bounds.upper, Some((Comparator::Le, 3)));
    }
}
