//! Merging contributor payloads into one invocation payload

use dispatch_types::{Payload, UnitId};

/// Merge an ordered list of contributors into a payload for `destination`.
///
/// The merged payload takes the context of the first contributor, the
/// concatenation of every contributor's non-context arguments, and the
/// concatenation of every contributor's sources, all in contributor order.
/// Returns `None` for an empty contributor list.
pub fn merge_payloads(destination: &UnitId, contributors: &[&Payload]) -> Option<Payload> {
    let first = contributors.first()?;

    let args = contributors
        .iter()
        .flat_map(|p| p.args.iter().cloned())
        .collect();
    let sources = contributors
        .iter()
        .flat_map(|p| p.sources.iter().cloned())
        .collect();

    Some(Payload::from_parts(
        first.context.clone(),
        args,
        destination.clone(),
        sources,
    ))
}
