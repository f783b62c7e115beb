use std::str::FromStr;

use rust_decimal::Decimal;
use taxrecon_recon::config::ReconConfig;
use taxrecon_recon::engine::run;
use taxrecon_recon::model::{
    MatchBasis, MatchStatus, RawRow, ReconInput, ReconReport, RowRef, Side, SideInput,
};
use taxrecon_recon::ReconError;

const GSTIN: &str = "29ABCDE1234F1Z5";
const OTHER_GSTIN: &str = "27PQRSX6789K1Z2";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A register-style row with the usual GSTR headers.
fn invoice(source: &str, row: usize, gstin: &str, number: &str, date: &str, total: &str) -> RawRow {
    RawRow::new(RowRef::new(source, row))
        .with("GSTIN of Supplier", gstin)
        .with("Trade/Legal name", "Acme Traders")
        .with("Invoice number", number)
        .with("Invoice Date", date)
        .with("Invoice Value", total)
}

fn books(rows: Vec<RawRow>) -> SideInput {
    SideInput::new("Purchase Register", rows)
}

fn gstr2b(rows: Vec<RawRow>) -> SideInput {
    SideInput::new("GSTR-2B", rows)
}

fn config() -> ReconConfig {
    ReconConfig::new(Decimal::ONE)
}

fn from_toml(input: &str) -> Result<ReconConfig, ReconError> {
    ReconConfig::from_toml(input, Decimal::ONE)
}

fn reconcile(a: Vec<RawRow>, b: Vec<RawRow>, tolerance: &str) -> ReconReport {
    let config = ReconConfig::new(dec(tolerance));
    run(&config, &ReconInput { a: books(a), b: gstr2b(b) }).unwrap()
}

// -------------------------------------------------------------------------
// Statuses
// -------------------------------------------------------------------------

#[test]
fn exact_match() {
    let report = reconcile(
        vec![invoice("PR", 2, GSTIN, "INV-001", "01-04-2024", "1000.00")],
        vec![invoice("2B", 2, GSTIN, "INV-001", "01-04-2024", "1000.00")],
        "0",
    );
    assert_eq!(report.results.len(), 1);
    let r = &report.results[0];
    assert_eq!(r.status, MatchStatus::MatchedExact);
    assert_eq!(r.variance, Some(Decimal::ZERO));
    assert!(!r.low_confidence);
    assert_eq!(report.summary.pairs, 1);
    assert_eq!(report.summary.discrepancies(), 0);
}

#[test]
fn tolerance_boundary() {
    let a = vec![invoice("PR", 2, GSTIN, "INV-001", "01-04-2024", "1000.00")];
    let b = vec![invoice("2B", 2, GSTIN, "INV-001", "01-04-2024", "1000.50")];

    let loose = reconcile(a.clone(), b.clone(), "1.0");
    assert_eq!(loose.results[0].status, MatchStatus::MatchedWithinTolerance);
    assert_eq!(loose.results[0].variance, Some(dec("-0.50")));

    let tight = reconcile(a, b, "0.25");
    assert_eq!(tight.results[0].status, MatchStatus::MismatchedAmount);
    assert_eq!(tight.results[0].variance.map(|v| v.abs()), Some(dec("0.50")));
    assert_eq!(tight.summary.mismatch_variance, dec("-0.50"));
}

#[test]
fn missing_on_either_side() {
    let report = reconcile(
        vec![
            invoice("PR", 2, GSTIN, "INV-001", "01-04-2024", "100"),
            invoice("PR", 3, GSTIN, "INV-002", "02-04-2024", "200"),
        ],
        vec![
            invoice("2B", 2, GSTIN, "INV-001", "01-04-2024", "100"),
            invoice("2B", 3, OTHER_GSTIN, "INV-002", "02-04-2024", "200"),
        ],
        "1",
    );
    assert_eq!(report.summary.count(MatchStatus::MissingInB), 1);
    assert_eq!(report.summary.count(MatchStatus::MissingInA), 1);
    assert_eq!(report.summary.count(MatchStatus::MatchedExact), 2);

    // Every record appears in exactly one result
    let total: usize = report.results.iter().map(|r| r.records().count()).sum();
    assert_eq!(total, 4);
    assert_eq!(report.details.len(), 4);
}

#[test]
fn duplicates_in_one_side() {
    let report = reconcile(
        vec![
            invoice("PR", 2, GSTIN, "INV-9", "01-04-2024", "100"),
            invoice("PR", 3, GSTIN, "INV-9", "01-04-2024", "105"),
        ],
        vec![invoice("2B", 2, GSTIN, "INV-9", "01-04-2024", "100")],
        "1",
    );
    let a_rows: Vec<_> = report.details_for(Side::A).collect();
    assert_eq!(a_rows[0].status, MatchStatus::MatchedExact);
    assert_eq!(a_rows[0].counterpart_row, Some(RowRef::new("2B", 2)));
    assert_eq!(a_rows[1].status, MatchStatus::DuplicateUnmatched);
    assert_eq!(a_rows[1].total_value, dec("105"));
    assert_eq!(a_rows[1].pair_id, None);
}

#[test]
fn keys_normalize_across_formatting() {
    let report = reconcile(
        vec![invoice("PR", 2, " 29abcde1234f1z5 ", "inv/001", "01/04/2024", "1,180.00")],
        vec![invoice("2B", 2, GSTIN, "INV-001", "2024-04-01", "1180")],
        "0",
    );
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].status, MatchStatus::MatchedExact);
    assert!(!report.results[0].low_confidence);
}

// -------------------------------------------------------------------------
// Determinism and symmetry
// -------------------------------------------------------------------------

fn mixed_rows() -> (Vec<RawRow>, Vec<RawRow>) {
    let a = vec![
        invoice("PR", 2, GSTIN, "A-1", "01-04-2024", "100"),
        invoice("PR", 3, GSTIN, "A-2", "02-04-2024", "250.75"),
        invoice("PR", 4, GSTIN, "A-3", "03-04-2024", "80"),
        invoice("PR", 5, GSTIN, "A-3", "03-04-2024", "95"),
        invoice("PR", 6, OTHER_GSTIN, "A-4", "04-04-2024", "60"),
    ];
    let b = vec![
        invoice("2B", 2, GSTIN, "A-1", "01-04-2024", "100.40"),
        invoice("2B", 3, GSTIN, "A-2", "02-04-2024", "240"),
        invoice("2B", 4, GSTIN, "A-3", "03-04-2024", "81"),
        invoice("2B", 5, OTHER_GSTIN, "B-9", "05-04-2024", "10"),
    ];
    (a, b)
}

#[test]
fn identical_input_gives_identical_report() {
    let (a, b) = mixed_rows();
    let first = reconcile(a.clone(), b.clone(), "1");
    let second = reconcile(a, b, "1");
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn swapping_sides_mirrors_the_report() {
    let (a, b) = mixed_rows();
    let forward = reconcile(a.clone(), b.clone(), "1");
    let backward = reconcile(b, a, "1");

    for status in MatchStatus::ALL {
        assert_eq!(
            forward.summary.count(status),
            backward.summary.count(status.mirrored()),
            "count for {status}"
        );
    }
    assert_eq!(forward.summary.pairs, backward.summary.pairs);
    assert_eq!(forward.summary.mismatch_variance, -backward.summary.mismatch_variance);
    assert_eq!(forward.summary.records_a, backward.summary.records_b);

    let mut fwd: Vec<_> = forward.results.iter().filter_map(|r| r.variance).collect();
    let mut bwd: Vec<_> = backward.results.iter().filter_map(|r| r.variance.map(|v| -v)).collect();
    fwd.sort();
    bwd.sort();
    assert_eq!(fwd, bwd);
}

// -------------------------------------------------------------------------
// Warnings and confidence
// -------------------------------------------------------------------------

#[test]
fn unparsable_date_still_matches_with_low_confidence() {
    let report = reconcile(
        vec![invoice("PR", 2, GSTIN, "INV-001", "31/02/2024", "500")],
        vec![invoice("2B", 2, GSTIN, "INV-001", "29-02-2024", "500")],
        "0",
    );
    let r = &report.results[0];
    assert_eq!(r.status, MatchStatus::MatchedExact);
    assert!(r.low_confidence);
    assert_eq!(r.label(), "MatchedExact (low confidence)");
    assert_eq!(report.summary.low_confidence, 2);

    let a_row = report.details_for(Side::A).next().unwrap();
    assert_eq!(a_row.invoice_date, None);
    assert_eq!(a_row.warnings.len(), 1);
    assert!(a_row.warnings[0].contains("invoice date"));
}

#[test]
fn unparsable_amount_becomes_zero_with_warning() {
    let report = reconcile(
        vec![invoice("PR", 2, GSTIN, "INV-001", "01-04-2024", "12O.00")],
        vec![invoice("2B", 2, GSTIN, "INV-001", "01-04-2024", "120")],
        "1",
    );
    let r = &report.results[0];
    assert_eq!(r.status, MatchStatus::MismatchedAmount);
    assert!(r.low_confidence);
    assert_eq!(r.variance, Some(dec("-120")));
}

// -------------------------------------------------------------------------
// Configuration-driven behaviour
// -------------------------------------------------------------------------

#[test]
fn fallback_pairs_renumbered_invoices() {
    let config = from_toml("tolerance = \"1\"\n[fallback]\nenabled = true").unwrap();
    let input = ReconInput {
        a: books(vec![invoice("PR", 2, GSTIN, "TI/24-25/118", "07-05-2024", "5900")]),
        b: gstr2b(vec![invoice("2B", 2, GSTIN, "118", "07-05-2024", "5900")]),
    };
    let report = run(&config, &input).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].basis, MatchBasis::PartyDate);
    assert_eq!(report.results[0].status, MatchStatus::MatchedExact);

    let without = run(&crate::config(), &input).unwrap();
    assert_eq!(without.summary.count(MatchStatus::MissingInA), 1);
    assert_eq!(without.summary.count(MatchStatus::MissingInB), 1);
}

#[test]
fn components_mode_from_toml() {
    let row = |source: &str, taxable: &str, igst: &str, total: &str| {
        RawRow::new(RowRef::new(source, 2))
            .with("GSTIN", GSTIN)
            .with("Invoice No", "INV-5")
            .with("Taxable Value", taxable)
            .with("IGST", igst)
            .with("Invoice Value", total)
    };
    let input = ReconInput {
        a: books(vec![row("PR", "1000", "180", "1180")]),
        b: gstr2b(vec![row("2B", "1100", "80", "1180")]),
    };

    let total_mode = run(&config(), &input).unwrap();
    assert_eq!(total_mode.results[0].status, MatchStatus::MatchedExact);

    let config = from_toml("[amounts]\ncompare = \"components\"").unwrap();
    let components = run(&config, &input).unwrap();
    assert_eq!(components.results[0].status, MatchStatus::MismatchedAmount);
}

#[test]
fn missing_invoice_column_is_structural_error() {
    let rows = vec![RawRow::new(RowRef::new("2B", 2)).with("GSTIN", GSTIN).with("Amount Total", "10")];
    let input = ReconInput {
        a: books(vec![invoice("PR", 2, GSTIN, "INV-1", "01-04-2024", "10")]),
        b: gstr2b(rows),
    };
    let err = run(&config(), &input).unwrap_err();
    assert!(err.is_input_error());
    let msg = err.to_string();
    assert!(msg.contains("GSTR-2B"), "{msg}");
    assert!(msg.contains("invoice number"), "{msg}");
}

#[test]
fn tagged_rows_split_into_sides() {
    let input = ReconInput::from_tagged(
        "Books",
        "2B",
        vec![
            (Side::A, invoice("Books", 2, GSTIN, "X1", "01-04-2024", "10")),
            (Side::B, invoice("2B", 2, GSTIN, "X1", "01-04-2024", "10")),
            (Side::A, invoice("Books", 3, GSTIN, "X2", "01-04-2024", "20")),
        ],
    );
    let report = run(&config(), &input).unwrap();
    assert_eq!(report.summary.records_a, 2);
    assert_eq!(report.summary.records_b, 1);
    assert_eq!(report.meta.label_b, "2B");
}

#[test]
fn invalid_config_is_rejected() {
    let err = from_toml("tolerance = \"-0.5\"").unwrap_err();
    assert!(matches!(err, ReconError::InvalidTolerance(_)));
}

#[test]
fn weaker_fallbacks_pair_by_tax_head() {
    let row = |source: &str, n: usize, gstin: &str, number: &str, igst: &str, cgst: &str| {
        RawRow::new(RowRef::new(source, n))
            .with("GSTIN of Supplier", gstin)
            .with("Invoice number", number)
            .with("Taxable Value", "1000")
            .with("Integrated Tax", igst)
            .with("Central Tax", cgst)
    };
    let input = ReconInput {
        a: books(vec![
            row("PR", 2, GSTIN, "P-1", "180", ""),
            row("PR", 3, GSTIN, "P-2", "", "90"),
            row("PR", 4, GSTIN, "P-3", "", "90"),
        ]),
        b: gstr2b(vec![
            row("2B", 2, "", "B-1", "180.40", ""),
            row("2B", 3, OTHER_GSTIN, "B-2", "", "90"),
            row("2B", 4, OTHER_GSTIN, "B-3", "90", ""),
        ]),
    };

    let config =
        from_toml("[fallback]\nenabled = true\nstrategies = [\"missing_party_id\", \"amount_only\"]").unwrap();
    let report = run(&config, &input).unwrap();
    let basis_of = |number: &str| {
        report
            .results
            .iter()
            .find(|r| r.a.as_ref().is_some_and(|a| a.invoice_number == number))
            .map(|r| (r.basis, r.status))
    };
    assert_eq!(basis_of("P1"), Some((MatchBasis::MissingPartyId, MatchStatus::MatchedWithinTolerance)));
    assert_eq!(basis_of("P2"), Some((MatchBasis::AmountOnly, MatchStatus::MatchedExact)));
    // P-3 is CGST; the only B left is IGST
    assert_eq!(basis_of("P3"), Some((MatchBasis::InvoiceKey, MatchStatus::MissingInB)));
    assert_eq!(report.summary.count(MatchStatus::MissingInA), 1);

    // The default strategy list only pairs by party and date
    let party_date = from_toml("[fallback]\nenabled = true").unwrap();
    let report = run(&party_date, &input).unwrap();
    assert!(report.results.iter().all(|r| r.basis == MatchBasis::InvoiceKey));
}

#[test]
fn sheet_column_order_picks_party_column() {
    let row = RawRow::new(RowRef::new("PR", 2))
        .with("Supplier GSTIN", GSTIN)
        .with("Company GSTIN", OTHER_GSTIN)
        .with("Invoice No", "INV-1")
        .with("Invoice Value", "100");
    let headers = ["Supplier GSTIN", "Company GSTIN", "Invoice No", "Invoice Value"];
    let input = ReconInput {
        a: books(vec![row]).with_headers(headers.iter().map(|h| h.to_string()).collect()),
        b: gstr2b(vec![invoice("2B", 2, GSTIN, "INV-1", "01-04-2024", "100")]),
    };
    let report = run(&config(), &input).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].status, MatchStatus::MatchedExact);
    assert_eq!(report.results[0].key.party_id, GSTIN);
}

#[test]
fn amounts_past_the_limit_are_zeroed_with_warnings() {
    let huge = "70000000000000000000000000000";
    let report = reconcile(
        vec![invoice("PR", 2, GSTIN, "INV-1", "01-04-2024", huge)],
        vec![invoice("2B", 2, GSTIN, "INV-1", "01-04-2024", &format!("-{huge}"))],
        "1",
    );
    let r = &report.results[0];
    assert_eq!(r.status, MatchStatus::MatchedExact);
    assert!(r.low_confidence);
    assert_eq!(r.variance, Some(Decimal::ZERO));
    assert!(report.details.iter().all(|d| d.warnings.len() == 1));
}
