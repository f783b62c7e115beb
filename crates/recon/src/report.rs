use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::model::{
    DetailRow, MatchResult, MatchStatus, ReconMeta, ReconReport, ReconSummary, Record, Side,
};

/// Assemble the final report: one detail row per record (side A in row
/// order, then side B) and the summary counts.
pub fn build_report(meta: ReconMeta, results: Vec<MatchResult>) -> ReconReport {
    let details = build_details(&results);
    let summary = compute_summary(&results);
    ReconReport { meta, summary, results, details }
}

fn build_details(results: &[MatchResult]) -> Vec<DetailRow> {
    let mut rows: Vec<((Side, usize), DetailRow)> = Vec::new();
    for result in results {
        for record in result.records() {
            let counterpart = match record.side {
                Side::A => result.b.as_ref(),
                Side::B => result.a.as_ref(),
            };
            rows.push(((record.side, record.ordinal), detail_row(result, record, counterpart)));
        }
    }
    rows.sort_by(|x, y| x.0.cmp(&y.0));
    rows.into_iter().map(|(_, row)| row).collect()
}

fn detail_row(result: &MatchResult, record: &Record, counterpart: Option<&Record>) -> DetailRow {
    DetailRow {
        side: record.side,
        source_row: record.source_row.clone(),
        party_id: record.party_id.clone(),
        invoice_number: record.invoice_number.clone(),
        invoice_date: record.invoice_date,
        total_value: record.total_value,
        status: result.status,
        low_confidence: result.low_confidence,
        label: result.label(),
        basis: result.basis,
        pair_id: result.pair_id,
        counterpart_row: counterpart.map(|r| r.source_row.clone()),
        variance: result.variance,
        warnings: record.warnings.iter().map(|w| w.to_string()).collect(),
    }
}

/// Record counts per status plus pair, low-confidence and variance totals.
/// The variance total clamps to the `Decimal` range.
pub fn compute_summary(results: &[MatchResult]) -> ReconSummary {
    let mut status_counts: BTreeMap<MatchStatus, usize> =
        MatchStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut records_a = 0;
    let mut records_b = 0;
    let mut pairs = 0;
    let mut low_confidence = 0;
    let mut mismatch_variance = Decimal::ZERO;

    for r in results {
        let n = r.records().count();
        *status_counts.entry(r.status).or_insert(0) += n;
        records_a += usize::from(r.a.is_some());
        records_b += usize::from(r.b.is_some());
        if r.pair_id.is_some() {
            pairs += 1;
        }
        if r.low_confidence {
            low_confidence += n;
        }
        if r.status == MatchStatus::MismatchedAmount {
            let v = r.variance.unwrap_or(Decimal::ZERO);
            mismatch_variance = mismatch_variance.checked_add(v).unwrap_or_else(|| {
                log::warn!("mismatch variance total is out of range, clamping");
                if v.is_sign_negative() { Decimal::MIN } else { Decimal::MAX }
            });
        }
    }

    ReconSummary {
        records_a,
        records_b,
        pairs,
        low_confidence,
        status_counts,
        mismatch_variance,
    }
}
