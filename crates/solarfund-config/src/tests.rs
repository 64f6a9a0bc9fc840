//! Tests for run settings and constraint documents.

use super::*;
use solarfund_core::{
    ConditionOperator, ConditionValue, ConstraintCategory, ConstraintKind, Measure,
};
use solarfund_test::{mixed_fund, scenario_fund};

#[test]
fn test_defaults() {
    let config = AllocationConfig::default();
    assert_eq!(config.columns.customer, "Asset Portfolio - Customer");
    assert_eq!(config.columns.customer_account, "Customer Account");
    assert_eq!(config.backlog.customer, None);
    assert_eq!(config.backlog.excluded_stages, vec!["Substantial".to_string()]);
    assert_eq!(config.existing.excluded_stages, vec!["Cancelled".to_string()]);
    assert!(config.per_customer_cap.is_none());
}

#[test]
fn test_partial_table_keeps_other_defaults() {
    let config = AllocationConfig::from_toml_str(
        r#"
        [columns]
        stage = "Lifecycle"
    "#,
    )
    .unwrap();
    assert_eq!(config.columns.stage, "Lifecycle");
    assert_eq!(config.columns.customer, "Asset Portfolio - Customer");
}

#[test]
fn test_yaml_parsing() {
    let yaml = r#"
        per_customer_cap: 125000
        backlog:
          customer: Developer LLC
        existing:
          excluded_stages: [Cancelled, Terminated]
    "#;

    let config = AllocationConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.per_customer_cap, Some(125_000.0));
    assert_eq!(config.backlog.customer.as_deref(), Some("Developer LLC"));
    assert_eq!(config.backlog.excluded_stages, vec!["Substantial".to_string()]);
    assert_eq!(config.existing.excluded_stages.len(), 2);
}

#[test]
fn test_rejects_non_positive_customer_cap() {
    let err = AllocationConfig::from_toml_str("per_customer_cap = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_rejects_empty_column_name() {
    let err = AllocationConfig::from_toml_str("[columns]\ncustomer = \" \"").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("columns.customer")));
}

#[test]
fn test_builder() {
    let config = AllocationConfig::new()
        .with_per_customer_cap(50_000.0)
        .with_backlog_customer("Dev");
    assert_eq!(config.per_customer_cap, Some(50_000.0));
    assert_eq!(config.backlog.customer.as_deref(), Some("Dev"));
    assert!(config.validate().is_ok());
}

const DOCUMENT_JSON: &str = r#"{
    "Fund B": {
        "capacity": 2000000,
        "constraints": [
            {
                "name": "WestUtilities",
                "category": "Partner",
                "constraint_type": "Upper Bound",
                "attribute": "utility",
                "upper_bound": 0.4,
                "conditions": [{ "type": "utility", "condition": "In", "values": ["PG&E", "SCE"] }],
                "current_allocation": 12.5,
                "remaining_capacity": 0
            },
            {
                "name": "NoHawaii",
                "constraint_type": "Exclusion",
                "attribute": "state",
                "conditions": [{ "type": "state", "condition": "In", "values": ["HI"] }]
            }
        ]
    },
    "Fund A": {
        "capacity": 1000000
    }
}"#;

#[test]
fn test_json_document_keeps_order_and_ignores_unknown_keys() {
    let doc = ConstraintDocument::from_json_str(DOCUMENT_JSON).unwrap();
    let names: Vec<&str> = doc.fund_names().collect();
    assert_eq!(names, ["Fund B", "Fund A"]);

    let resolved = doc.resolve().unwrap();
    assert!(resolved.warnings.is_empty());
    let fund = resolved.fund("Fund B").unwrap();
    assert_eq!(fund.capacity, 2_000_000.0);

    let west = fund.constraint("WestUtilities").unwrap();
    assert_eq!(west.category, Some(ConstraintCategory::Partner));
    assert_eq!(west.measure, Measure::Fmv);
    assert!(west.active);
    assert_eq!(west.conditions[0].operator, ConditionOperator::In);

    let exclusion = fund.constraint("NoHawaii").unwrap();
    assert_eq!(exclusion.kind, ConstraintKind::Exclusion);
    assert!(resolved.fund("Fund A").unwrap().constraints.is_empty());
}

#[test]
fn test_yaml_document_with_scalar_value() {
    let yaml = r#"
        Fund A:
          capacity: 500000
          constraints:
            - name: LargeSystems
              constraint_type: Upper Bound
              attribute: kw
              upper_bound: 0.2
              conditions:
                - type: kw
                  condition: Greater Than
                  value: 12.5
    "#;
    let resolved = ConstraintDocument::from_yaml_str(yaml)
        .unwrap()
        .resolve()
        .unwrap();
    let condition = &resolved.funds[0].constraints[0].conditions[0];
    assert_eq!(condition.operator, ConditionOperator::GreaterThan);
    assert_eq!(condition.value, ConditionValue::Scalar("12.5".into()));
}

#[test]
fn test_toml_document_with_bounded_map() {
    let toml = r#"
        ["Fund A"]
        capacity = 1000000

        [["Fund A".constraints]]
        name = "StateCap"
        attribute = "state"
        apply_per_value = true

        [["Fund A".constraints.conditions]]
        type = "state"
        condition = "Equals"
        values = { CA = 0.5, TX = 300000 }
    "#;
    let resolved = ConstraintDocument::from_toml_str(toml)
        .unwrap()
        .resolve()
        .unwrap();
    let constraint = &resolved.funds[0].constraints[0];
    assert_eq!(constraint.kind, ConstraintKind::UpperBound);
    assert!(constraint.apply_per_value);
    match &constraint.conditions[0].value {
        ConditionValue::Bounded(bounds) => {
            assert_eq!(bounds.get("CA"), Some(&0.5));
            assert_eq!(bounds.get("TX"), Some(&300_000.0));
        }
        other => panic!("expected bounded map, got {other:?}"),
    }
}

#[test]
fn test_unusable_conditions_become_warnings() {
    let json = r#"{
        "F": {
            "capacity": 100,
            "constraints": [{
                "name": "Mixed",
                "attribute": "state",
                "upper_bound": 0.5,
                "apply_per_value": true,
                "conditions": [
                    { "type": "state", "values": ["CA"] },
                    { "type": "kw", "condition": "Greater Than", "values": ["5"] },
                    { "type": "state", "condition": "Between", "values": ["CA"] },
                    { "type": "state", "condition": "Equals", "values": { "CA": 0.2, "TX": null } }
                ]
            }]
        }
    }"#;
    let resolved = ConstraintDocument::from_json_str(json)
        .unwrap()
        .resolve()
        .unwrap();

    let indices: Vec<usize> = resolved.warnings.iter().map(|w| w.condition).collect();
    assert_eq!(indices, [0, 1, 2, 3]);
    assert!(resolved.warnings[0].reason.contains("missing operator"));
    assert!(resolved.warnings[3].reason.contains("'TX'"));

    let constraint = &resolved.funds[0].constraints[0];
    assert_eq!(constraint.conditions.len(), 1);
    match &constraint.conditions[0].value {
        ConditionValue::Bounded(bounds) => assert_eq!(bounds.len(), 1),
        other => panic!("expected bounded map, got {other:?}"),
    }
}

#[test]
fn test_duplicate_constraint_name_is_invalid() {
    let json = r#"{
        "F": { "capacity": 100, "constraints": [ { "name": "A" }, { "name": "A" } ] }
    }"#;
    let err = ConstraintDocument::from_json_str(json)
        .unwrap()
        .resolve()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("'A'")));
}

#[test]
fn test_negative_capacity_is_invalid() {
    let doc = ConstraintDocument::from_json_str(r#"{ "F": { "capacity": -1 } }"#).unwrap();
    assert!(matches!(doc.resolve(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_round_trip_through_every_format() {
    let funds = vec![scenario_fund(), mixed_fund("M", 5_000_000.0)];
    let doc = ConstraintDocument::from_funds(&funds);

    for format in [DocumentFormat::Json, DocumentFormat::Yaml, DocumentFormat::Toml] {
        let text = doc.render(format).unwrap();
        let parsed = ConstraintDocument::parse(&text, format).unwrap();
        assert_eq!(parsed, doc, "{format:?} document changed on round trip");

        let resolved = parsed.resolve().unwrap();
        assert!(resolved.warnings.is_empty());
        assert_eq!(resolved.funds, funds, "{format:?} model changed on round trip");
    }
}

#[test]
fn test_insert_and_remove_fund() {
    let mut doc = ConstraintDocument::from_json_str(DOCUMENT_JSON).unwrap();
    assert!(doc.insert_fund(&scenario_fund()).is_none());
    assert!(doc.remove_fund("Fund B").is_some());
    let names: Vec<&str> = doc.fund_names().collect();
    assert_eq!(names, ["Fund A", "F"]);
}

#[test]
fn test_format_from_path() {
    assert_eq!(
        DocumentFormat::from_path("funds.JSON").unwrap(),
        DocumentFormat::Json
    );
    assert_eq!(
        DocumentFormat::from_path("dir/funds.yml").unwrap(),
        DocumentFormat::Yaml
    );
    assert!(DocumentFormat::from_path("funds.txt").is_err());
}

#[test]
fn test_save_and_load() {
    let dir = std::env::temp_dir().join(format!("solarfund-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("funds.toml");

    let doc = ConstraintDocument::from_funds(&[scenario_fund()]);
    doc.save(&path).unwrap();
    let loaded = ConstraintDocument::load(&path).unwrap();
    assert_eq!(loaded, doc);

    std::fs::remove_dir_all(&dir).unwrap();
}
