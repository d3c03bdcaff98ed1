use std::collections::HashSet;

use crate::models::{normalize_name, Candidate, Recommendation};

/// Deduplicate, truncate, and attach provenance.
///
/// The dedup key is the candidate's stable identifier when present, else a
/// normalized artist/label composite, so mbid-less hits for the same item
/// arriving from different seeds still collapse. First-seen wins and keeps
/// its position and reason (stable filter, not a re-sort). Truncation
/// happens strictly after deduplication: cutting first could drop a unique
/// later item in favor of an earlier duplicate.
pub fn assemble(candidates: Vec<Candidate>, limit: usize) -> Vec<Recommendation> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<Recommendation> = Vec::new();

    for candidate in candidates {
        if !seen.insert(dedup_key(&candidate)) {
            continue;
        }
        out.push(Recommendation::from(candidate));
    }

    out.truncate(limit);
    out
}

fn dedup_key(candidate: &Candidate) -> String {
    let id = candidate.id.trim();
    if id.is_empty() {
        format!(
            "{}::{}",
            normalize_name(&candidate.artist),
            normalize_name(&candidate.label)
        )
    } else {
        id.to_lowercase()
    }
}
