//! Hand-built funds and systems.

use solarfund_core::{Condition, Constraint, ConstraintCategory, Fund, SystemRecord, SystemTable};

/// Customer column name used by every fixture.
pub const CUSTOMER: &str = "Asset Portfolio - Customer";
/// Stage column name used by every fixture.
pub const STAGE: &str = "Stage";
/// Customer account column name used by every fixture.
pub const ACCOUNT: &str = "Customer Account";
/// Owner of backlog systems.
pub const DEVELOPER: &str = "Developer LLC";

/// A backlog system in `state`, owned by [`DEVELOPER`] in stage "Pending".
pub fn backlog_system(id: &str, fmv: f64, state: &str) -> SystemRecord {
    SystemRecord::new(id, fmv)
        .with_attribute(CUSTOMER, DEVELOPER)
        .with_attribute(STAGE, "Pending")
        .with_attribute(ACCOUNT, format!("ACC-{id}"))
        .with_attribute("state", state)
}

/// A system already held by `fund`, in stage "Active".
pub fn existing_system(id: &str, fmv: f64, state: &str, fund: &str) -> SystemRecord {
    backlog_system(id, fmv, state)
        .with_attribute(CUSTOMER, fund)
        .with_attribute(STAGE, "Active")
}

/// Fund F: capacity 1,000,000 with a per-value state cap of CA 50% and
/// TX 30%.
pub fn scenario_fund() -> Fund {
    Fund::new("F", 1_000_000.0).with_constraint(
        Constraint::upper_bound("StateCap", "state", 1.0)
            .per_value()
            .with_category(ConstraintCategory::Geographic)
            .with_condition(Condition::bounded("state", [("CA", 0.5), ("TX", 0.3)])),
    )
}

/// S1 (400k, CA), S2 (300k, TX), S3 (200k, CA), S4 (100k, NY).
pub fn scenario_systems() -> SystemTable {
    let mut table = SystemTable::new([CUSTOMER, STAGE, ACCOUNT, "state"]);
    for record in [
        backlog_system("S1", 400_000.0, "CA"),
        backlog_system("S2", 300_000.0, "TX"),
        backlog_system("S3", 200_000.0, "CA"),
        backlog_system("S4", 100_000.0, "NY"),
    ] {
        table
            .push(record)
            .unwrap_or_else(|e| panic!("scenario fixture is malformed: {e}"));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_system_belongs_to_fund() {
        let s = existing_system("E1", 10.0, "CA", "F");
        assert_eq!(s.attribute(CUSTOMER), Some("F"));
        assert_eq!(s.attribute(STAGE), Some("Active"));
    }
}
