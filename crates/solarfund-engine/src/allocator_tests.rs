//! Tests for the greedy allocator.

use super::*;
use solarfund_core::{Condition, Constraint, Fund};
use solarfund_test::{backlog_system, scenario_fund, scenario_systems, ACCOUNT};

fn ledger(fund: &Fund, target: f64, backlog: &[&SystemRecord]) -> FundLedger {
    let (budgets, _) = FundBudgets::initialize(fund, target, &[]).unwrap();
    FundLedger::new(budgets, target, vec![true; backlog.len()])
}

fn ids(ledger: &FundLedger, backlog: &[&SystemRecord]) -> Vec<String> {
    ledger
        .allocated()
        .iter()
        .map(|&i| backlog[i].id.clone())
        .collect()
}

#[test]
fn test_scenario_allocation() {
    let table = scenario_systems();
    let backlog: Vec<&SystemRecord> = table.iter().collect();
    let mut ledgers = vec![ledger(&scenario_fund(), 1_000_000.0, &backlog)];

    let assignment = allocate(&backlog, &mut ledgers);

    assert_eq!(assignment, [Some(0), Some(0), None, Some(0)]);
    let fund = &ledgers[0];
    assert_eq!(ids(fund, &backlog), ["S1", "S2", "S4"]);
    assert_eq!(fund.allocated_fmv(), 800_000.0);
    assert_eq!(fund.remaining(), 200_000.0);
    assert_eq!(fund.budgets().get("StateCap_CA").unwrap().remaining, 100_000.0);
    assert_eq!(fund.budgets().get("StateCap_TX").unwrap().remaining, 0.0);
    assert_eq!(
        fund.rejections().reasons(),
        [concat!(
            "Constraint 'StateCap_CA' on state='CA' exceeded capacity ",
            "(1 system, largest shortfall 100,000.00)"
        )]
    );
}

#[test]
fn test_rejection_debits_nothing_and_tallies_every_failure() {
    let fund = Fund::new("F", 100.0).with_constraint(
        Constraint::upper_bound("CaCap", "state", 0.5)
            .with_condition(Condition::one_of("state", ["CA"])),
    );
    let big = backlog_system("BIG", 150.0, "CA");
    let small = backlog_system("SMALL", 40.0, "CA");
    let backlog = [&big, &small];
    let mut fund = ledger(&fund, 100.0, &backlog);

    assert!(!fund.try_admit(0, &big));
    assert_eq!(fund.remaining(), 100.0);
    assert_eq!(fund.budgets().get("CaCap").unwrap().remaining, 50.0);
    assert_eq!(fund.rejections().len(), 2);
    assert_eq!(
        fund.rejections().get(&Rejection::FundCapacity),
        Some(&RejectionTally {
            systems: 1,
            largest_shortfall: 50.0
        })
    );

    assert!(fund.try_admit(1, &small));
    assert_eq!(fund.remaining(), 60.0);
    assert_eq!(fund.budgets().get("CaCap").unwrap().remaining, 10.0);
}

#[test]
fn test_tally_keeps_largest_shortfall() {
    let mut log = RejectionLog::default();
    log.record(Rejection::FundCapacity, 10.0);
    log.record(Rejection::FundCapacity, 2_500.5);
    log.record(Rejection::FundCapacity, 7.0);
    assert_eq!(
        log.reasons(),
        ["Fund capacity exceeded (3 systems, largest shortfall 2,500.50)"]
    );
}

#[test]
fn test_exact_fit_is_admitted() {
    let fund = Fund::new("F", 300.0);
    let s = backlog_system("S", 300.0, "CA");
    let backlog = [&s];
    let mut fund = ledger(&fund, 300.0, &backlog);
    assert!(fund.try_admit(0, &s));
    assert_eq!(fund.remaining(), 0.0);
}

#[test]
fn test_customer_cap() {
    let fund = Fund::new("F", 1_000.0);
    let a1 = backlog_system("A1", 300.0, "CA").with_attribute(ACCOUNT, "ACME");
    let a2 = backlog_system("A2", 200.0, "CA").with_attribute(ACCOUNT, "ACME");
    let b1 = backlog_system("B1", 200.0, "CA").with_attribute(ACCOUNT, "Other");
    let held = backlog_system("H", 100.0, "CA").with_attribute(ACCOUNT, "ACME");
    let backlog = [&a1, &a2, &b1];

    let mut ledgers =
        vec![ledger(&fund, 1_000.0, &backlog).with_customer_cap(ACCOUNT, 450.0, &[&held])];
    let assignment = allocate(&backlog, &mut ledgers);

    assert_eq!(assignment, [Some(0), None, Some(0)]);
    let reasons = ledgers[0].rejections().reasons();
    assert_eq!(
        reasons,
        [concat!(
            "Customer account 'ACME' exceeded the per-customer cap ",
            "(1 system, largest shortfall 150.00)"
        )]
    );
}

#[test]
fn test_ineligible_placements_are_skipped() {
    let fund = Fund::new("F", 1_000.0);
    let a = backlog_system("A", 100.0, "CA");
    let b = backlog_system("B", 50.0, "CA");
    let backlog = [&a, &b];
    let (budgets, _) = FundBudgets::initialize(&fund, 1_000.0, &[]).unwrap();
    let mut ledgers = vec![FundLedger::new(budgets, 1_000.0, vec![false, true])];

    assert_eq!(allocate(&backlog, &mut ledgers), [None, Some(0)]);
    assert!(ledgers[0].rejections().is_empty());
}

#[test]
fn test_global_order_shares_backlog_between_funds() {
    let a = Fund::new("A", 500_000.0);
    let b = Fund::new("B", 500_000.0);
    let x = backlog_system("X", 400_000.0, "CA");
    let y = backlog_system("Y", 300_000.0, "CA");
    let z = backlog_system("Z", 200_000.0, "CA");
    let backlog = [&z, &x, &y];
    let mut ledgers = vec![
        ledger(&a, 500_000.0, &backlog),
        ledger(&b, 500_000.0, &backlog),
    ];

    let order: Vec<(usize, usize)> = placements(&backlog, &ledgers)
        .into_iter()
        .map(|p| (p.system, p.fund))
        .collect();
    assert_eq!(order, [(1, 0), (1, 1), (2, 0), (2, 1), (0, 0), (0, 1)]);

    let assignment = allocate(&backlog, &mut ledgers);
    assert_eq!(assignment, [Some(1), Some(0), Some(1)]);
    assert_eq!(ledgers[0].allocated_fmv(), 400_000.0);
    assert_eq!(ledgers[1].allocated_fmv(), 500_000.0);
    assert_eq!(ledgers[0].rejections().get(&Rejection::FundCapacity).unwrap().systems, 2);
}

#[test]
fn test_ties_keep_backlog_order() {
    let fund = Fund::new("F", 100.0);
    let first = backlog_system("first", 60.0, "CA");
    let second = backlog_system("second", 60.0, "CA");
    let backlog = [&first, &second];
    let mut ledgers = vec![ledger(&fund, 100.0, &backlog)];
    assert_eq!(allocate(&backlog, &mut ledgers), [Some(0), None]);
}

#[test]
fn test_format_amount() {
    assert_eq!(format_amount(0.0), "0.00");
    assert_eq!(format_amount(1_234_567.891), "1,234,567.89");
    assert_eq!(format_amount(-42.5), "-42.50");
}
