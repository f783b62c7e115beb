use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::{CompareMode, FallbackStrategy, ReconConfig};
use crate::index::KeyIndex;
use crate::model::{MatchBasis, MatchKey, MatchOutcome, MatchStatus, Record, Side};

/// |a − b|, saturating at `Decimal::MAX` instead of overflowing.
fn gap(a: Decimal, b: Decimal) -> Decimal {
    a.checked_sub(b).map(|d| d.abs()).unwrap_or(Decimal::MAX)
}

/// a − b, clamped to the `Decimal` range.
fn saturating_diff(a: Decimal, b: Decimal) -> Decimal {
    a.checked_sub(b).unwrap_or(if a > b { Decimal::MAX } else { Decimal::MIN })
}

// ---------------------------------------------------------------------------
// Amount comparison
// ---------------------------------------------------------------------------

/// Distance and verdict between two records under the configured compare mode.
#[derive(Debug, Clone, Copy)]
pub struct Comparator {
    pub mode: CompareMode,
    pub tolerance: Decimal,
}

impl Comparator {
    pub fn from_config(config: &ReconConfig) -> Self {
        Self { mode: config.amounts.compare, tolerance: config.tolerance }
    }

    /// Total mode: |A.total − B.total|. Components mode: the largest absolute
    /// difference over taxable value, every named component and total.
    /// Differences past the `Decimal` range read as `Decimal::MAX`.
    pub fn distance(&self, a: &Record, b: &Record) -> Decimal {
        let total = gap(a.total_value, b.total_value);
        match self.mode {
            CompareMode::Total => total,
            CompareMode::Components => {
                let mut max = total.max(gap(a.taxable_value, b.taxable_value));
                for name in a.tax_components.keys().chain(b.tax_components.keys()) {
                    max = max.max(gap(a.component(name), b.component(name)));
                }
                max
            }
        }
    }

    pub fn within(&self, distance: Decimal) -> bool {
        distance <= self.tolerance
    }

    pub fn status(&self, distance: Decimal) -> MatchStatus {
        if distance.is_zero() {
            MatchStatus::MatchedExact
        } else if self.within(distance) {
            MatchStatus::MatchedWithinTolerance
        } else {
            MatchStatus::MismatchedAmount
        }
    }
}

// ---------------------------------------------------------------------------
// Greedy pairing
// ---------------------------------------------------------------------------

/// Pair records of one bucket, smallest distance first, ties broken by A row
/// order then B row order. Returns (a index, b index, distance) in take order.
fn greedy_pairs(a: &[Record], b: &[Record], cmp: &Comparator) -> Vec<(usize, usize, Decimal)> {
    let mut candidates: Vec<(Decimal, usize, usize, usize, usize)> = Vec::with_capacity(a.len() * b.len());
    for (ai, ra) in a.iter().enumerate() {
        for (bi, rb) in b.iter().enumerate() {
            candidates.push((cmp.distance(ra, rb), ra.ordinal, rb.ordinal, ai, bi));
        }
    }
    take_closest(candidates, a.len(), b.len())
}

/// Like `greedy_pairs`, but only pairings within tolerance are considered.
/// B records are sorted by total so each A record only looks at the window
/// of totals within tolerance; the total gap bounds the distance in both
/// compare modes.
fn greedy_pairs_within(a: &[Record], b: &[Record], cmp: &Comparator) -> Vec<(usize, usize, Decimal)> {
    let mut by_total: Vec<usize> = (0..b.len()).collect();
    by_total.sort_by_key(|&bi| (b[bi].total_value, b[bi].ordinal));

    let mut candidates = Vec::new();
    for (ai, ra) in a.iter().enumerate() {
        let low = ra.total_value.checked_sub(cmp.tolerance).unwrap_or(Decimal::MIN);
        let high = ra.total_value.checked_add(cmp.tolerance).unwrap_or(Decimal::MAX);
        let start = by_total.partition_point(|&bi| b[bi].total_value < low);
        for &bi in by_total[start..].iter().take_while(|&&bi| b[bi].total_value <= high) {
            let distance = cmp.distance(ra, &b[bi]);
            if cmp.within(distance) {
                candidates.push((distance, ra.ordinal, b[bi].ordinal, ai, bi));
            }
        }
    }
    take_closest(candidates, a.len(), b.len())
}

fn take_closest(
    mut candidates: Vec<(Decimal, usize, usize, usize, usize)>,
    a_len: usize,
    b_len: usize,
) -> Vec<(usize, usize, Decimal)> {
    candidates.sort();

    let mut a_used = vec![false; a_len];
    let mut b_used = vec![false; b_len];
    let mut remaining = a_len.min(b_len);
    let mut pairs = Vec::new();

    for (distance, _, _, ai, bi) in candidates {
        if remaining == 0 {
            break;
        }
        if a_used[ai] || b_used[bi] {
            continue;
        }
        a_used[ai] = true;
        b_used[bi] = true;
        remaining -= 1;
        pairs.push((ai, bi, distance));
    }
    pairs
}

fn paired(key: MatchKey, status: MatchStatus, basis: MatchBasis, a: Record, b: Record) -> MatchOutcome {
    let variance = saturating_diff(a.total_value, b.total_value);
    MatchOutcome { key, status, basis, a: Some(a), b: Some(b), variance: Some(variance) }
}

fn single(key: MatchKey, status: MatchStatus, record: Record) -> MatchOutcome {
    let (a, b) = match record.side {
        Side::A => (Some(record), None),
        Side::B => (None, Some(record)),
    };
    MatchOutcome { key, status, basis: MatchBasis::InvoiceKey, a, b, variance: None }
}

/// Move records out of a bucket by index; `None` marks consumed slots.
fn into_slots(records: Vec<Record>) -> Vec<Option<Record>> {
    records.into_iter().map(Some).collect()
}

// ---------------------------------------------------------------------------
// Primary pass
// ---------------------------------------------------------------------------

/// Match two key indexes. Every record ends up in exactly one outcome.
/// Outcomes follow key order; within a shared key, pairs come in take order,
/// then A leftovers, then B leftovers.
pub fn match_indexes(mut a: KeyIndex, mut b: KeyIndex, cmp: &Comparator) -> Vec<MatchOutcome> {
    let keys: BTreeSet<MatchKey> = a.keys().chain(b.keys()).cloned().collect();
    let mut outcomes = Vec::new();
    let mut duplicate_keys = 0usize;

    for key in keys {
        match (a.remove(&key), b.remove(&key)) {
            (Some(bucket_a), Some(bucket_b)) => {
                if bucket_a.len() > 1 || bucket_b.len() > 1 {
                    duplicate_keys += 1;
                }
                match_bucket(&key, bucket_a, bucket_b, cmp, &mut outcomes);
            }
            (Some(bucket_a), None) => {
                for record in bucket_a {
                    outcomes.push(single(key.clone(), MatchStatus::MissingInB, record));
                }
            }
            (None, Some(bucket_b)) => {
                for record in bucket_b {
                    outcomes.push(single(key.clone(), MatchStatus::MissingInA, record));
                }
            }
            (None, None) => {}
        }
    }

    if duplicate_keys > 0 {
        log::debug!("{duplicate_keys} shared key(s) hold duplicates");
    }
    outcomes
}

fn match_bucket(
    key: &MatchKey,
    bucket_a: Vec<Record>,
    bucket_b: Vec<Record>,
    cmp: &Comparator,
    outcomes: &mut Vec<MatchOutcome>,
) {
    let pairs = greedy_pairs(&bucket_a, &bucket_b, cmp);
    let mut slots_a = into_slots(bucket_a);
    let mut slots_b = into_slots(bucket_b);

    for (ai, bi, distance) in pairs {
        if let (Some(ra), Some(rb)) = (slots_a[ai].take(), slots_b[bi].take()) {
            outcomes.push(paired(key.clone(), cmp.status(distance), MatchBasis::InvoiceKey, ra, rb));
        }
    }

    for record in slots_a.into_iter().chain(slots_b).flatten() {
        outcomes.push(single(key.clone(), MatchStatus::DuplicateUnmatched, record));
    }
}

// ---------------------------------------------------------------------------
// Fallback passes
// ---------------------------------------------------------------------------

/// Tax regime of an invoice: inter-state (IGST) or intra-state (CGST/SGST).
/// Records without either amount group together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaxHead {
    Igst,
    CgstSgst,
    Untaxed,
}

impl TaxHead {
    pub fn of(record: &Record) -> Self {
        if !record.component("IGST").is_zero() {
            Self::Igst
        } else if !record.component("CGST").is_zero() || !record.component("SGST").is_zero() {
            Self::CgstSgst
        } else {
            Self::Untaxed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum FallbackKey {
    PartyDate(String, NaiveDate),
    /// `blank` is the side whose party id is missing.
    MissingPartyId { head: TaxHead, blank: Side },
    AmountOnly(TaxHead),
}

impl FallbackStrategy {
    fn basis(&self) -> MatchBasis {
        match self {
            Self::PartyDate => MatchBasis::PartyDate,
            Self::MissingPartyId => MatchBasis::MissingPartyId,
            Self::AmountOnly => MatchBasis::AmountOnly,
        }
    }

    /// Bucket a record belongs to under this strategy; `None` keeps it out.
    fn key(&self, record: &Record) -> Option<FallbackKey> {
        let has_party = !record.party_id.is_empty();
        match self {
            Self::PartyDate => match record.invoice_date {
                Some(date) if has_party => Some(FallbackKey::PartyDate(record.party_id.clone(), date)),
                _ => None,
            },
            Self::MissingPartyId => {
                // A record with an id looks for a partner whose id is blank
                let blank = if has_party { record.side.other() } else { record.side };
                Some(FallbackKey::MissingPartyId { head: TaxHead::of(record), blank })
            }
            Self::AmountOnly => Some(FallbackKey::AmountOnly(TaxHead::of(record))),
        }
    }
}

/// Re-pair records left missing after the primary pass, running each
/// strategy in order over whatever the previous ones left. Only pairings
/// within tolerance are accepted; the rest keep their missing status.
pub fn fallback_pass(
    outcomes: Vec<MatchOutcome>,
    cmp: &Comparator,
    strategies: &[FallbackStrategy],
) -> Vec<MatchOutcome> {
    let mut kept = Vec::with_capacity(outcomes.len());
    let mut pool: Vec<Record> = Vec::new();
    for outcome in outcomes {
        if matches!(outcome.status, MatchStatus::MissingInA | MatchStatus::MissingInB) {
            let MatchOutcome { a, b, .. } = outcome;
            pool.extend(a.into_iter().chain(b));
        } else {
            kept.push(outcome);
        }
    }

    for strategy in strategies {
        let (pairs, leftover) = strategy_pass(*strategy, pool, cmp);
        if !pairs.is_empty() {
            log::info!("fallback {} paired {} record pair(s)", strategy.as_str(), pairs.len());
        }
        kept.extend(pairs);
        pool = leftover;
    }

    pool.sort_by_key(|r| (r.side, r.ordinal));
    for record in pool {
        let status = match record.side {
            Side::A => MatchStatus::MissingInB,
            Side::B => MatchStatus::MissingInA,
        };
        kept.push(single(record.key(), status, record));
    }
    kept
}

/// One strategy over the pool: (accepted pairs, records still unpaired).
fn strategy_pass(
    strategy: FallbackStrategy,
    pool: Vec<Record>,
    cmp: &Comparator,
) -> (Vec<MatchOutcome>, Vec<Record>) {
    let mut buckets_a: BTreeMap<FallbackKey, Vec<Record>> = BTreeMap::new();
    let mut buckets_b: BTreeMap<FallbackKey, Vec<Record>> = BTreeMap::new();
    let mut leftover = Vec::new();
    for record in pool {
        let Some(key) = strategy.key(&record) else {
            leftover.push(record);
            continue;
        };
        let buckets = match record.side {
            Side::A => &mut buckets_a,
            Side::B => &mut buckets_b,
        };
        buckets.entry(key).or_default().push(record);
    }

    let mut pairs = Vec::new();
    let keys: BTreeSet<FallbackKey> = buckets_a.keys().chain(buckets_b.keys()).cloned().collect();
    for key in keys {
        let bucket_a = buckets_a.remove(&key).unwrap_or_default();
        let bucket_b = buckets_b.remove(&key).unwrap_or_default();
        let taken = greedy_pairs_within(&bucket_a, &bucket_b, cmp);
        let mut slots_a = into_slots(bucket_a);
        let mut slots_b = into_slots(bucket_b);

        for (ai, bi, distance) in taken {
            if let (Some(ra), Some(rb)) = (slots_a[ai].take(), slots_b[bi].take()) {
                pairs.push(paired(ra.key(), cmp.status(distance), strategy.basis(), ra, rb));
            }
        }
        leftover.extend(slots_a.into_iter().chain(slots_b).flatten());
    }
    (pairs, leftover)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
