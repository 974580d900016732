//! Lookup strategies: cached-binding replay and combinatorial search
//!
//! Both strategies only pick contributors out of a backlog. Merging and
//! persistence stay with the engine.

use dispatch_permutation::{PermutationError, PermutationList};
use dispatch_types::{Payload, Signature, UnitDescriptor, UnitId};

/// An ordered selection of distinct backlog payloads
pub type Combination<'a> = Vec<&'a Payload>;

/// Replay a learned binding against the backlog.
///
/// Each source in the binding resolves, in binding order, to the oldest
/// backlog payload whose single source equals it and that is not already
/// taken. Returns `None` when any entry fails to resolve, or when the
/// resolved combination no longer satisfies the unit's signature (the
/// binding is stale).
pub fn resolve_binding<'a>(
    backlog: &'a [Payload],
    binding: &[UnitId],
    unit: &UnitDescriptor,
) -> Option<Combination<'a>> {
    if binding.is_empty() || binding.len() > unit.input_count() {
        return None;
    }

    let mut chosen: Combination<'a> = Vec::with_capacity(binding.len());
    for source in binding {
        let payload = backlog.iter().find(|p| {
            p.single_source() == Some(source) && !chosen.iter().any(|c| c.id == p.id)
        })?;
        chosen.push(payload);
    }

    if combination_matches(&chosen, &unit.signature) {
        Some(chosen)
    } else {
        None
    }
}

/// Enumerate every ordered combination of distinct backlog payloads whose
/// concatenated argument kinds equal the unit's signature.
///
/// Matches are returned in enumeration order. The permutation list's
/// max-growth signal ends the enumeration and never surfaces as an error.
pub fn search<'a>(
    backlog: &'a [Payload],
    unit: &UnitDescriptor,
) -> Result<Vec<Combination<'a>>, PermutationError> {
    match backlog {
        [] => Ok(Vec::new()),
        [only] => {
            let candidate = vec![only];
            if combination_matches(&candidate, &unit.signature) {
                Ok(vec![candidate])
            } else {
                Ok(Vec::new())
            }
        }
        _ => {
            let values = backlog.iter().collect::<Vec<_>>();
            let mut list = PermutationList::new(values, unit.input_count())?;
            let mut matches = Vec::new();

            let mut step = list.permute_by(0);
            loop {
                match step {
                    Ok(()) => {}
                    Err(e) if e.is_max_growth_reached() => break,
                    Err(e) => return Err(e),
                }

                let members = list.members();
                if is_distinct(members) && combination_matches(members, &unit.signature) {
                    matches.push(members.to_vec());
                }

                step = list.permute_by(1);
            }

            Ok(matches)
        }
    }
}

fn combination_matches(members: &[&Payload], signature: &Signature) -> bool {
    signature.matches(members.iter().flat_map(|p| p.args.iter()))
}

fn is_distinct(members: &[&Payload]) -> bool {
    members
        .iter()
        .enumerate()
        .all(|(i, a)| members[..i].iter().all(|b| a.id != b.id))
}
