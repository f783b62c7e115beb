use crate::classify::classify;
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::index::{duplicate_keys, index_records};
use crate::matcher::{fallback_pass, match_indexes, Comparator};
use crate::model::{ReconInput, ReconMeta, ReconReport, Record, Side};
use crate::normalize::normalize_side;
use crate::report::build_report;

/// Run reconciliation per config. Returns the classified report.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconReport, ReconError> {
    config.validate()?;
    RunContext::new(config, input).execute()
}

/// State of a single run. Nothing outlives it.
struct RunContext<'a> {
    config: &'a ReconConfig,
    input: &'a ReconInput,
    comparator: Comparator,
}

impl<'a> RunContext<'a> {
    fn new(config: &'a ReconConfig, input: &'a ReconInput) -> Self {
        Self { config, input, comparator: Comparator::from_config(config) }
    }

    fn execute(self) -> Result<ReconReport, ReconError> {
        // Both sides must normalize before anything is matched
        let records_a = self.normalize(Side::A)?;
        let records_b = self.normalize(Side::B)?;
        log::info!(
            "reconciling {} record(s) from '{}' against {} record(s) from '{}' (tolerance {})",
            records_a.len(),
            self.input.a.label,
            records_b.len(),
            self.input.b.label,
            self.config.tolerance,
        );

        let index_a = index_records(records_a);
        let index_b = index_records(records_b);
        for (side, index) in [(Side::A, &index_a), (Side::B, &index_b)] {
            for (key, count) in duplicate_keys(index) {
                log::debug!("side {side}: key {key} appears {count} times");
            }
        }

        let mut outcomes = match_indexes(index_a, index_b, &self.comparator);
        if self.config.fallback.enabled {
            outcomes = fallback_pass(outcomes, &self.comparator, &self.config.fallback.strategies);
        }

        let results = classify(outcomes);
        let report = build_report(self.meta(), results);
        log::info!(
            "{} pair(s), {} discrepancy record(s), {} low-confidence record(s)",
            report.summary.pairs,
            report.summary.discrepancies(),
            report.summary.low_confidence,
        );
        Ok(report)
    }

    fn normalize(&self, side: Side) -> Result<Vec<Record>, ReconError> {
        normalize_side(side, self.input.side(side), self.config)
    }

    fn meta(&self) -> ReconMeta {
        ReconMeta {
            label_a: self.input.a.label.clone(),
            label_b: self.input.b.label.clone(),
            tolerance: self.config.tolerance,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
