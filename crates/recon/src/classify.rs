use crate::model::{MatchOutcome, MatchResult};

/// Turn matcher outcomes into reportable results. Two-record results get
/// sequential pair ids starting at 1, in outcome order; any result touching a
/// record with parse warnings is flagged low-confidence.
pub fn classify(outcomes: Vec<MatchOutcome>) -> Vec<MatchResult> {
    let mut next_pair_id: u32 = 1;
    outcomes
        .into_iter()
        .map(|outcome| {
            let low_confidence = outcome.records().any(|r| r.has_warnings());
            let pair_id = if outcome.a.is_some() && outcome.b.is_some() {
                let id = next_pair_id;
                next_pair_id += 1;
                Some(id)
            } else {
                None
            };
            MatchResult {
                status: outcome.status,
                low_confidence,
                basis: outcome.basis,
                pair_id,
                key: outcome.key,
                a: outcome.a,
                b: outcome.b,
                variance: outcome.variance,
            }
        })
        .collect()
}
