//! String encodings of persisted state
//!
//! - backlog: JSON array of payloads
//! - binding: comma-joined source identifiers

use dispatch_types::{Payload, UnitId};

const BINDING_SEPARATOR: char = ',';

pub fn encode_backlog(backlog: &[Payload]) -> Result<String, String> {
    serde_json::to_string(backlog).map_err(|e| format!("backlog encode failed: {e}"))
}

pub fn decode_backlog(raw: &str) -> Result<Vec<Payload>, String> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| format!("backlog decode failed: {e}"))
}

/// Whether a source identifier survives a binding round trip: non-empty
/// and free of the separator.
pub fn is_encodable_source(source: &UnitId) -> bool {
    !source.is_empty() && !source.as_str().contains(BINDING_SEPARATOR)
}

/// Join source identifiers. Identifiers that would not survive a round
/// trip are rejected.
pub fn encode_binding(sources: &[UnitId]) -> Result<String, String> {
    if let Some(bad) = sources.iter().find(|s| !is_encodable_source(s)) {
        return Err(format!("source identifier '{}' cannot be encoded", bad));
    }
    Ok(sources
        .iter()
        .map(UnitId::as_str)
        .collect::<Vec<_>>()
        .join(","))
}

pub fn decode_binding(raw: &str) -> Vec<UnitId> {
    raw.split(BINDING_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(UnitId::new)
        .collect()
}
