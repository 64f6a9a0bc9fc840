//! Seeded random backlogs.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use solarfund_core::{
    Condition, ConditionOperator, ConditionValue, Constraint, ConstraintCategory, Fund,
    SystemRecord, SystemTable, OTHERS,
};

use crate::scenario::{ACCOUNT, CUSTOMER, DEVELOPER, STAGE};

pub const STATES: [&str; 6] = ["CA", "TX", "NY", "AZ", "NV", "HI"];
pub const UTILITIES: [&str; 4] = ["PG&E", "SCE", "Oncor", "APS"];
const INSTALLERS: [&str; 3] = ["SunCo", "BrightPath", "Helio"];

/// Generates `count` systems deterministically from `seed`.
///
/// Columns: customer, stage, customer account, `state`, `utility`,
/// `installer`, `kw`. Roughly one system in ten sits in stage
/// "Substantial"; the rest are "Pending". FMV is a whole thousand between
/// 10,000 and 500,000.
pub fn random_backlog(seed: u64, count: usize) -> SystemTable {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut table = SystemTable::new([
        CUSTOMER,
        STAGE,
        ACCOUNT,
        "state",
        "utility",
        "installer",
        "kw",
    ]);

    for i in 0..count {
        let fmv = rng.random_range(10..=500) as f64 * 1000.0;
        let stage = if rng.random_bool(0.1) {
            "Substantial"
        } else {
            "Pending"
        };
        let kw = rng.random_range(30..=200) as f64 / 10.0;
        let record = SystemRecord::new(format!("R{seed}-{i}"), fmv)
            .with_attribute(CUSTOMER, DEVELOPER)
            .with_attribute(STAGE, stage)
            .with_attribute(ACCOUNT, format!("ACC-{}", rng.random_range(0..12)))
            .with_attribute("state", STATES[rng.random_range(0..STATES.len())])
            .with_attribute("utility", UTILITIES[rng.random_range(0..UTILITIES.len())])
            .with_attribute("installer", INSTALLERS[rng.random_range(0..INSTALLERS.len())])
            .with_attribute("kw", kw.to_string());
        table
            .push(record)
            .unwrap_or_else(|e| panic!("generated record is malformed: {e}"));
    }
    table
}

/// A fund exercising every budget kind against [`random_backlog`] columns:
/// per-value bounds with an OTHERS slice, a shared group, a per-value list,
/// a numeric predicate, an exclusion, and an inactive constraint.
pub fn mixed_fund(name: &str, capacity: f64) -> Fund {
    let big_systems = Condition::new(
        "kw",
        ConditionOperator::GreaterThan,
        ConditionValue::Scalar("15".to_string()),
    )
    .unwrap_or_else(|e| panic!("fixture condition is malformed: {e}"));

    Fund::new(name, capacity)
        .with_constraint(
            Constraint::upper_bound("StateCap", "state", 1.0)
                .per_value()
                .with_category(ConstraintCategory::Geographic)
                .with_condition(Condition::bounded(
                    "state",
                    [("CA", 0.3), ("TX", 0.2), (OTHERS, 0.25)],
                )),
        )
        .with_constraint(
            Constraint::upper_bound("WestUtilities", "utility", 0.4)
                .with_category(ConstraintCategory::Partner)
                .with_group_name("West")
                .with_condition(Condition::one_of("utility", ["PG&E", "SCE"])),
        )
        .with_constraint(
            Constraint::upper_bound("InstallerCap", "installer", 0.35)
                .per_value()
                .with_category(ConstraintCategory::Partner)
                .with_condition(Condition::one_of("installer", ["SunCo", "BrightPath"])),
        )
        .with_constraint(
            Constraint::upper_bound("LargeSystems", "kw", 0.2)
                .with_category(ConstraintCategory::Equipment)
                .with_condition(big_systems),
        )
        .with_constraint(
            Constraint::exclusion("NoHawaii", "state")
                .with_category(ConstraintCategory::Geographic)
                .with_condition(Condition::one_of("state", ["HI"])),
        )
        .with_constraint(
            Constraint::upper_bound("Retired", "state", 0.01)
                .inactive()
                .with_condition(Condition::one_of("state", ["CA"])),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_backlog_is_deterministic() {
        let a = random_backlog(7, 50);
        let b = random_backlog(7, 50);
        assert_eq!(a.records(), b.records());
        assert_eq!(a.len(), 50);
    }

    #[test]
    fn test_random_backlog_fmv_range() {
        let table = random_backlog(3, 200);
        assert!(table
            .iter()
            .all(|s| (10_000.0..=500_000.0).contains(&s.fmv)));
    }

    #[test]
    fn test_mixed_fund_shape() {
        let fund = mixed_fund("M", 5_000_000.0);
        assert_eq!(fund.budget_constraints().count(), 4);
        assert_eq!(fund.exclusions().count(), 1);
        assert!(fund.duplicate_constraint_name().is_none());
    }
}
