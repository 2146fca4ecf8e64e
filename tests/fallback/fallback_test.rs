//! Integration tests for fallback template selection.

use bimigrate::config::Settings;
use bimigrate::connection::{classify, ConnectionDescriptor, ConnectionInfo, RelationDescriptor};
use bimigrate::fallback::{
    default_rules, fill_template, Condition, FallbackSelector, Field, Operator, SourceRule,
};
use insta::assert_snapshot;

fn sqlserver_query(query: &str) -> ConnectionInfo {
    ConnectionInfo {
        class_type: "sqlserver".to_string(),
        server: Some("db01".to_string()),
        database: Some("Sales".to_string()),
        raw_query: Some(query.to_string()),
        ..ConnectionInfo::default()
    }
}

#[test]
fn test_first_matching_rule_wins() {
    let selector = FallbackSelector::new(vec![
        SourceRule::new("never", vec![Condition::equals(Field::ClassType, "oracle")], "A"),
        SourceRule::new("first", vec![Condition::is_set(Field::Server)], "B"),
        SourceRule::new("second", vec![], "C"),
    ]);

    let filled = selector.select(&sqlserver_query("SELECT 1")).unwrap();
    assert_eq!(filled.kind, "first");
    assert_eq!(filled.code, "B");
}

#[test]
fn test_every_condition_must_hold() {
    let rule = SourceRule::new(
        "sqlserver-table",
        vec![
            Condition::equals(Field::ClassType, "sqlserver"),
            Condition::is_set(Field::Table),
        ],
        "x",
    );
    assert!(!rule.matches(&sqlserver_query("SELECT 1")));
}

#[test]
fn test_no_match_is_none() {
    let selector = FallbackSelector::new(default_rules());
    let info = ConnectionInfo {
        class_type: "oracle".to_string(),
        server: Some("ora01".to_string()),
        table: Some("ORDERS".to_string()),
        ..ConnectionInfo::default()
    };
    assert_eq!(selector.select(&info), None);
    assert!(FallbackSelector::default().select(&info).is_none());
}

#[test]
fn test_raw_query_quotes_are_escaped() {
    let selector = FallbackSelector::new(default_rules());
    let info = sqlserver_query(r#"SELECT "Order ID" FROM t WHERE s = 'a'"#);

    let filled = selector.select(&info).unwrap();
    assert_eq!(filled.kind, "sqlserver-query");
    assert_snapshot!(filled.code, @r#"
let
Source = Sql.Database("db01", "Sales", [Query="SELECT ""Order ID"" FROM t WHERE s = 'a'"])
in
Source
"#);
}

#[test]
fn test_default_excel_rule_from_classified_connection() {
    let connection = ConnectionDescriptor::new("federated").with_named(
        "excel-direct.0",
        ConnectionDescriptor::new("excel-direct").with_attr("filename", "C:/data/f.xlsx"),
    );
    let info = classify(
        &connection,
        Some(&RelationDescriptor::Table("Sheet1$".to_string())),
    );

    let filled = FallbackSelector::new(default_rules()).select(&info).unwrap();
    assert_eq!(filled.kind, "excel");
    assert!(filled.code.contains(r#"File.Contents("C:/data/f.xlsx")"#));
    assert!(filled.code.contains(r#"[Item="Sheet1",Kind="Sheet"]"#));
}

#[test]
fn test_fill_template_sources() {
    let mut info = ConnectionInfo {
        class_type: "snowflake".to_string(),
        server: Some("acct.snowflakecomputing.com".to_string()),
        ..ConnectionInfo::default()
    };
    info.additional_properties
        .insert("warehouse".to_string(), "WH".to_string());

    assert_eq!(
        fill_template("{server}|{warehouse}|{database}|{unknown}", &info),
        "acct.snowflakecomputing.com|WH||{unknown}"
    );
}

#[test]
fn test_rules_from_config() {
    let settings = Settings::from_toml(
        r#"
[fallback]
include_defaults = false

[[fallback.sources]]
kind = "snowflake"
template = 'Snowflake.Databases("{server}", "{warehouse}")'
conditions = [
    { field = "class_type", op = "equals", value = "Snowflake" },
    { field = "property:warehouse", op = "is_set" },
    { field = "server", op = "ends_with", value = ".snowflakecomputing.com" },
]
"#,
    )
    .unwrap();

    let rules = settings.fallback.rules();
    assert_eq!(
        rules[0].conditions[2],
        Condition::new(Field::Server, Operator::EndsWith, ".snowflakecomputing.com")
    );

    let mut info = ConnectionInfo {
        class_type: "snowflake".to_string(),
        server: Some("acct.snowflakecomputing.com".to_string()),
        ..ConnectionInfo::default()
    };
    let selector = FallbackSelector::new(rules);
    assert!(selector.select(&info).is_none());

    info.additional_properties
        .insert("warehouse".to_string(), "WH".to_string());
    assert_eq!(
        selector.select(&info).unwrap().code,
        r#"Snowflake.Databases("acct.snowflakecomputing.com", "WH")"#
    );
}
