//! Backlog Allocation Example
//!
//! Two funds compete for one developer backlog. Each fund caps its exposure
//! per state, per utility group and to large systems, and one of them already
//! holds part of its capacity.
//!
//! Run with `RUST_LOG=solarfund_engine=debug` to see every budget.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use solarfund::engine::format_amount;
use solarfund::prelude::*;

const CUSTOMER: &str = "Asset Portfolio - Customer";
const STAGE: &str = "Stage";
const ACCOUNT: &str = "Customer Account";
const DEVELOPER: &str = "Sunrise Development";

const STATES: [&str; 5] = ["CA", "TX", "NY", "AZ", "HI"];
const UTILITIES: [&str; 4] = ["PG&E", "SCE", "Oncor", "APS"];

const DOCUMENT: &str = r#"{
    "Fund A": {
        "capacity": 8000000,
        "constraints": [
            {
                "name": "StateCap",
                "category": "Geographic",
                "constraint_type": "Upper Bound",
                "attribute": "state",
                "apply_per_value": true,
                "conditions": [
                    {
                        "type": "state",
                        "condition": "In",
                        "values": { "CA": 0.4, "TX": 0.25, "__OTHERS__": 0.2 }
                    }
                ]
            },
            {
                "name": "WestUtilities",
                "category": "Partner",
                "constraint_type": "Upper Bound",
                "attribute": "utility",
                "upper_bound": 0.45,
                "group_name": "West",
                "conditions": [
                    { "type": "utility", "condition": "In", "values": ["PG&E", "SCE"] }
                ]
            },
            {
                "name": "NoHawaii",
                "category": "Geographic",
                "constraint_type": "Exclusion",
                "attribute": "state",
                "conditions": [
                    { "type": "state", "condition": "Equals", "values": ["HI"] }
                ]
            }
        ]
    },
    "Fund B": {
        "capacity": 5000000,
        "constraints": [
            {
                "name": "LargeSystems",
                "category": "Equipment",
                "constraint_type": "Upper Bound",
                "attribute": "kw",
                "upper_bound": 0.3,
                "conditions": [
                    { "type": "kw", "condition": "Greater Than", "value": 15 }
                ]
            },
            {
                "name": "TexasOnly",
                "category": "Geographic",
                "constraint_type": "Exclusion",
                "attribute": "state",
                "conditions": [
                    { "type": "state", "condition": "Not In", "values": ["TX", "AZ"] }
                ]
            }
        ]
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    solarfund::console::init();

    let document = ConstraintDocument::from_json_str(DOCUMENT)?;
    let resolved = document.resolve()?;
    for warning in &resolved.warnings {
        println!("warning: {warning}");
    }

    let settings = AllocationConfig::new()
        .with_backlog_customer(DEVELOPER)
        .with_per_customer_cap(1_500_000.0);
    let request = AllocationRequest::new(build_systems(42, 120)?)
        .with_settings(settings)
        .with_selected_funds(
            &resolved.funds,
            [
                ("Fund A", TargetCapacity::Percentage(90.0)),
                ("Fund B", TargetCapacity::FullCapacity),
            ],
        )?;

    println!("\nPreview:");
    for fund in preview(&request)? {
        println!(
            "  {:<8} {} open, {} eligible, {} excluded",
            fund.fund,
            format_amount(fund.remaining_capacity),
            fund.eligible_backlog,
            fund.excluded_backlog,
        );
    }
    println!();

    let outcome = run_allocation(&request)?;
    print_outcome(&outcome);
    Ok(())
}

/// Builds a backlog for [`DEVELOPER`] plus a small existing book for Fund A.
fn build_systems(seed: u64, count: usize) -> Result<SystemTable, solarfund::DataShapeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut table = SystemTable::new([CUSTOMER, STAGE, ACCOUNT, "state", "utility", "kw"]);

    for i in 0..count {
        let stage = if rng.random_bool(0.1) { "Substantial" } else { "Pending" };
        table.push(
            SystemRecord::new(format!("SYS-{i:04}"), rng.random_range(20..=400) as f64 * 1000.0)
                .with_attribute(CUSTOMER, DEVELOPER)
                .with_attribute(STAGE, stage)
                .with_attribute(ACCOUNT, format!("ACCT-{}", rng.random_range(0..20)))
                .with_attribute("state", STATES[rng.random_range(0..STATES.len())])
                .with_attribute("utility", UTILITIES[rng.random_range(0..UTILITIES.len())])
                .with_attribute("kw", format!("{:.1}", rng.random_range(40..=220) as f64 / 10.0)),
        )?;
    }

    for (i, (fmv, state)) in [(900_000.0, "CA"), (400_000.0, "TX"), (250_000.0, "NY")]
        .into_iter()
        .enumerate()
    {
        table.push(
            SystemRecord::new(format!("HELD-{i}"), fmv)
                .with_attribute(CUSTOMER, "Fund A")
                .with_attribute(STAGE, "Active")
                .with_attribute(ACCOUNT, "ACCT-HELD")
                .with_attribute("state", state)
                .with_attribute("utility", "SCE")
                .with_attribute("kw", "12.0"),
        )?;
    }
    Ok(table)
}

fn print_outcome(outcome: &AllocationOutcome) {
    for fund in &outcome.funds {
        println!(
            "\n{}: {} systems, {} allocated ({:.1}% of target)",
            fund.fund,
            fund.allocated.len(),
            format_amount(fund.allocated_fmv),
            fund.percent_of_target,
        );
        println!(
            "  {:<24} {:>16} {:>16} {:>7} {:>8}",
            "Budget", "Used", "Cap", "Use", "Backlog"
        );
        for row in &fund.report {
            println!(
                "  {:<24} {:>16} {:>16} {:>6.1}% {:>8}",
                row.constraint_name,
                format_amount(row.usage),
                format_amount(row.upper_bound),
                row.usage_percentage * 100.0,
                row.backlog_systems_satisfying,
            );
        }
        for reason in &fund.infeasible_reasons {
            println!("  - {reason}");
        }
    }

    for failure in &outcome.failures {
        println!("\n{} failed: {}", failure.fund, failure.error);
    }
    println!("\nUnallocated: {} systems", outcome.unallocated.len());
}
