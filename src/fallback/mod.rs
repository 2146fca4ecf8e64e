//! Static data-access templates used when translation is not possible.
//!
//! Each configured source kind carries a list of [`Condition`]s and an M-code
//! template. The first kind whose conditions all hold is selected and its
//! template filled from the [`ConnectionInfo`].

mod condition;

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::ConnectionInfo;

pub use condition::{Condition, Field, Operator};

/// `{name}` placeholders in templates.
static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").unwrap());

/// Placeholder names that always resolve, to an empty string when unset.
const KNOWN_PLACEHOLDERS: &[&str] = &[
    "class_type",
    "server",
    "database",
    "schema",
    "table",
    "raw_query",
    "file_path",
    "sheet",
];

/// One source kind: when all conditions hold, use the template.
///
/// A rule without conditions matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRule {
    pub kind: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub template: String,
}

impl SourceRule {
    pub fn new(kind: impl Into<String>, conditions: Vec<Condition>, template: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            conditions,
            template: template.into(),
        }
    }

    pub fn matches(&self, info: &ConnectionInfo) -> bool {
        self.conditions.iter().all(|c| c.evaluate(info))
    }
}

/// A filled template and the kind that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledTemplate {
    pub kind: String,
    pub code: String,
}

/// Picks and fills the first matching [`SourceRule`].
#[derive(Debug, Clone, Default)]
pub struct FallbackSelector {
    rules: Vec<SourceRule>,
}

impl FallbackSelector {
    pub fn new(rules: Vec<SourceRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[SourceRule] {
        &self.rules
    }

    /// The first rule whose conditions all hold.
    pub fn matching_rule(&self, info: &ConnectionInfo) -> Option<&SourceRule> {
        self.rules.iter().find(|rule| rule.matches(info))
    }

    /// Select and fill a template; `None` when no rule matches.
    pub fn select(&self, info: &ConnectionInfo) -> Option<FilledTemplate> {
        let rule = self.matching_rule(info)?;
        debug!(kind = %rule.kind, class_type = %info.class_type, "fallback template selected");
        Some(FilledTemplate {
            kind: rule.kind.clone(),
            code: fill_template(&rule.template, info),
        })
    }
}

/// Substitute `{name}` placeholders with fields of `info`.
///
/// Field names resolve first, then `additional_properties` keys; anything
/// else is left untouched. `{sheet}` is the table name without the `$`
/// suffix Excel sheets carry. Double quotes in `raw_query` are doubled so the
/// query stays a valid M string literal.
pub fn fill_template(template: &str, info: &ConnectionInfo) -> String {
    PLACEHOLDER_PATTERN
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match name {
                "raw_query" => info.raw_query.as_deref().unwrap_or("").replace('"', "\"\""),
                "sheet" => info
                    .table
                    .as_deref()
                    .map(|t| t.strip_suffix('$').unwrap_or(t))
                    .unwrap_or("")
                    .to_string(),
                _ if KNOWN_PLACEHOLDERS.contains(&name) => {
                    info.field(name).unwrap_or("").to_string()
                }
                _ => match info.additional_properties.get(name) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
}

/// Built-in rules for the common Tableau connection classes.
pub fn default_rules() -> Vec<SourceRule> {
    vec![
        SourceRule::new(
            "excel",
            vec![
                Condition::equals(Field::ClassType, "excel"),
                Condition::is_set(Field::Table),
            ],
            r#"let
Source = Excel.Workbook(File.Contents("{file_path}"), null, true),
Data = Source{[Item="{sheet}",Kind="Sheet"]}[Data],
Promoted = Table.PromoteHeaders(Data, [PromoteAllScalars=true])
in
Promoted"#,
        ),
        SourceRule::new(
            "csv",
            vec![Condition::equals(Field::ClassType, "textscan")],
            r#"let
Source = Csv.Document(File.Contents("{file_path}"), [Delimiter=",", Encoding=65001, QuoteStyle=QuoteStyle.Csv]),
Promoted = Table.PromoteHeaders(Source, [PromoteAllScalars=true])
in
Promoted"#,
        ),
        SourceRule::new(
            "sqlserver-query",
            vec![
                Condition::equals(Field::ClassType, "sqlserver"),
                Condition::is_set(Field::RawQuery),
            ],
            r#"let
Source = Sql.Database("{server}", "{database}", [Query="{raw_query}"])
in
Source"#,
        ),
        SourceRule::new(
            "sqlserver",
            vec![
                Condition::equals(Field::ClassType, "sqlserver"),
                Condition::is_set(Field::Table),
            ],
            r#"let
Source = Sql.Database("{server}", "{database}"),
Data = Source{[Schema="{schema}",Item="{table}"]}[Data]
in
Data"#,
        ),
        SourceRule::new(
            "postgres-query",
            vec![
                Condition::equals(Field::ClassType, "postgres"),
                Condition::is_set(Field::RawQuery),
            ],
            r#"let
Source = Value.NativeQuery(PostgreSQL.Database("{server}", "{database}"), "{raw_query}")
in
Source"#,
        ),
        SourceRule::new(
            "postgres",
            vec![
                Condition::equals(Field::ClassType, "postgres"),
                Condition::is_set(Field::Table),
            ],
            r#"let
Source = PostgreSQL.Database("{server}", "{database}"),
Data = Source{[Schema="{schema}",Item="{table}"]}[Data]
in
Data"#,
        ),
    ]
}
