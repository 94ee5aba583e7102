use crate::models::core::{SpaceId, Value};
use crate::models::formula::Formula;
use crate::services::evaluator::Valuation;
use crate::services::store::Database;

/// Finds the ids of spaces, drawn from `candidates`, for which the given
/// formula evaluates to `target`.
///
/// `candidates` must be sorted ascending by id; the result is as well.
/// The compound cases swap union and intersection between the true and
/// false targets deliberately: a conjunction fails when any child fails,
/// a disjunction holds when any child holds.
pub fn spaces_matching(
    db: &Database,
    formula: &Formula,
    target: Valuation,
    candidates: &[SpaceId],
) -> Vec<SpaceId> {
    match formula {
        Formula::Atom {
            property, value, ..
        } => {
            let keep = |space: &&SpaceId| match target {
                Valuation::True => db.value_of(**space, *property) == Some(*value),
                Valuation::Unknown => db.value_of(**space, *property).is_none(),
                Valuation::False => match Value::negate(*value) {
                    Ok(negated) => db.value_of(**space, *property) == Some(negated),
                    Err(_) => false,
                },
            };
            candidates.iter().filter(keep).copied().collect()
        }
        Formula::And(subs) => match target {
            Valuation::True => {
                intersection(subs.iter().map(|sf| spaces_matching(db, sf, target, candidates)))
            }
            Valuation::False => {
                union(subs.iter().map(|sf| spaces_matching(db, sf, target, candidates)))
            }
            Valuation::Unknown => residue(db, formula, candidates),
        },
        Formula::Or(subs) => match target {
            Valuation::True => {
                union(subs.iter().map(|sf| spaces_matching(db, sf, target, candidates)))
            }
            Valuation::False => {
                intersection(subs.iter().map(|sf| spaces_matching(db, sf, target, candidates)))
            }
            Valuation::Unknown => residue(db, formula, candidates),
        },
        Formula::Empty => match target {
            Valuation::True => candidates.to_vec(),
            _ => Vec::new(),
        },
    }
}

/// Candidates on which the compound is neither true nor false.
fn residue(db: &Database, formula: &Formula, candidates: &[SpaceId]) -> Vec<SpaceId> {
    let sure = union(
        [
            spaces_matching(db, formula, Valuation::True, candidates),
            spaces_matching(db, formula, Valuation::False, candidates),
        ]
        .into_iter(),
    );
    difference(candidates, &sure)
}

/// Merges sorted id sequences, deduplicating.
pub fn union(lists: impl Iterator<Item = Vec<SpaceId>>) -> Vec<SpaceId> {
    let mut out: Vec<SpaceId> = Vec::new();
    for list in lists {
        out = merge_two(&out, &list);
    }
    out
}

fn merge_two(a: &[SpaceId], b: &[SpaceId]) -> Vec<SpaceId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let next = match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                i += 1;
                a[i - 1]
            }
            std::cmp::Ordering::Greater => {
                j += 1;
                b[j - 1]
            }
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
                a[i - 1]
            }
        };
        out.push(next);
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Intersects sorted id sequences.
pub fn intersection(mut lists: impl Iterator<Item = Vec<SpaceId>>) -> Vec<SpaceId> {
    let mut out = match lists.next() {
        Some(first) => first,
        None => return Vec::new(),
    };
    for list in lists {
        let mut next = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < out.len() && j < list.len() {
            match out[i].cmp(&list[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    next.push(out[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out = next;
    }
    out
}

/// Elements of sorted `a` not present in sorted `b`.
fn difference(a: &[SpaceId], b: &[SpaceId]) -> Vec<SpaceId> {
    let mut out = Vec::new();
    let mut j = 0;
    for &x in a {
        while j < b.len() && b[j] < x {
            j += 1;
        }
        if j >= b.len() || b[j] != x {
            out.push(x);
        }
    }
    out
}
