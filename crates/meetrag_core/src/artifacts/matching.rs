//! Tolerant lookup of a stored artifact from a caller-supplied meeting id.
//!
//! Artifact names look like `Weekly_Sync_20240501_120000.json`. Callers tend to
//! pass `weekly sync`, `Weekly Sync` or `weekly_sync`, so the lookup runs an
//! ordered list of strategies and stops at the first one that matches anything.
//! Among that strategy's matches the most recently created artifact wins; equal
//! creation times fall back to the greatest name (the later timestamp suffix).

use super::ArtifactEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// The id equals the artifact's file name, its stem, or its meeting name.
    Exact,
    /// As `Exact`, after lower-casing.
    CaseInsensitive,
    /// As `Exact`, after lower-casing and collapsing whitespace/underscore/hyphen runs.
    Normalized,
    /// Normalized artifact stem starts with the normalized id plus `_`.
    Prefix,
}

impl MatchStrategy {
    pub const ORDERED: [MatchStrategy; 4] = [
        MatchStrategy::Exact,
        MatchStrategy::CaseInsensitive,
        MatchStrategy::Normalized,
        MatchStrategy::Prefix,
    ];

    fn matches(self, artifact_name: &str, meeting_id: &str) -> bool {
        let names = [
            artifact_name,
            strip_json_extension(artifact_name),
            artifact_meeting_name(artifact_name),
        ];
        match self {
            MatchStrategy::Exact => names.iter().any(|n| *n == meeting_id),
            MatchStrategy::CaseInsensitive => {
                let id = meeting_id.to_lowercase();
                names.iter().any(|n| n.to_lowercase() == id)
            }
            MatchStrategy::Normalized => {
                let id = normalize_meeting_id(meeting_id);
                names.iter().any(|n| normalize_meeting_id(n) == id)
            }
            MatchStrategy::Prefix => {
                let stem = normalize_meeting_id(strip_json_extension(artifact_name));
                let id = normalize_meeting_id(meeting_id);
                stem.starts_with(&format!("{id}_"))
            }
        }
    }
}

/// Resolve `meeting_id` against `entries`. Returns the winning entry and the strategy that found it.
pub fn resolve_artifact<'a>(
    entries: &'a [ArtifactEntry],
    meeting_id: &str,
) -> Option<(&'a ArtifactEntry, MatchStrategy)> {
    let id = meeting_id.trim();
    if normalize_meeting_id(id).is_empty() {
        return None;
    }

    for strategy in MatchStrategy::ORDERED {
        let best = entries
            .iter()
            .filter(|e| strategy.matches(&e.name, id))
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        if let Some(entry) = best {
            return Some((entry, strategy));
        }
    }
    None
}

/// Meeting name of an artifact: the file name without `.json` and without a
/// trailing `_YYYYMMDD_HHMMSS` timestamp.
pub fn artifact_meeting_name(artifact_name: &str) -> &str {
    let stem = strip_json_extension(artifact_name);
    // "_YYYYMMDD_HHMMSS" is 16 ASCII bytes.
    if stem.len() > 16 && stem.is_char_boundary(stem.len() - 16) {
        let (head, tail) = stem.split_at(stem.len() - 16);
        if is_timestamp_suffix(tail.as_bytes()) {
            return head;
        }
    }
    stem
}

fn strip_json_extension(name: &str) -> &str {
    if name.len() >= 5 && name.is_char_boundary(name.len() - 5) {
        let (head, ext) = name.split_at(name.len() - 5);
        if ext.eq_ignore_ascii_case(".json") {
            return head;
        }
    }
    name
}

fn is_timestamp_suffix(b: &[u8]) -> bool {
    b.len() == 16
        && b[0] == b'_'
        && b[1..9].iter().all(u8::is_ascii_digit)
        && b[9] == b'_'
        && b[10..16].iter().all(u8::is_ascii_digit)
}

/// Lower-case and collapse runs of whitespace, `_` and `-` into a single `_`.
pub fn normalize_meeting_id(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for ch in s.chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(ch.to_lowercase());
    }
    out
}
