//! Migration orchestration.
//!
//! Drives a workbook through the pipeline: calculations are resolved
//! dependency-first and translated one at a time, each datasource is
//! classified and given M code (translated, or filled from a fallback
//! template). Nothing here aborts the run; per-item problems become
//! [`MigrationWarning`]s in the [`MigrationReport`].

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calc::{BlockedNode, CalculationGraph, CalculationNode, DependencyResolver};
use crate::config::Settings;
use crate::connection::{classify, ConnectionInfo, DataSource};
use crate::fallback::FallbackSelector;
use crate::format::FormatOptions;
use crate::translate::{HttpTransport, TranslationClient, TranslationResult, Transport};
use crate::twb::Workbook;

/// A non-fatal problem met during a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationWarning {
    #[error("translation service unavailable; using fallback output")]
    TranslationUnavailable,

    #[error("translation of '{item}' failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    TranslationFailed {
        item: String,
        status: Option<u16>,
        message: String,
    },

    #[error("no fallback template matches table '{table}' (class '{class_type}')")]
    NoFallbackMatch { table: String, class_type: String },

    #[error("calculation '{calculation}' references unknown '{reference}'")]
    UnresolvedReference {
        calculation: String,
        reference: String,
    },

    #[error("calculation '{calculation}' is part of a cycle: {}", .path.join(" -> "))]
    Cycle {
        calculation: String,
        path: Vec<String>,
    },

    #[error("calculation '{calculation}' depends on a cycle: {}", .path.join(" -> "))]
    DependsOnCycle {
        calculation: String,
        path: Vec<String>,
    },

    #[error("calculation '{calculation}' not found")]
    MissingCalculation { calculation: String },
}

/// Where a table's M code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Translated,
    Template,
    None,
}

/// One migrated calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculationOutput {
    pub id: String,
    pub caption: String,
    pub table: String,
    pub is_measure: bool,
    pub data_type: String,
    pub formula: String,
    /// Formatted expression; empty when translation was not possible.
    pub dax: String,
}

impl CalculationOutput {
    fn from_node(node: &CalculationNode) -> Self {
        Self {
            id: node.source_id.clone(),
            caption: node.caption.clone(),
            table: node.table_name.clone(),
            is_measure: node.is_measure,
            data_type: node.data_type.clone(),
            formula: node.formula.clone(),
            dax: node.dax_formula.clone(),
        }
    }
}

/// One migrated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutput {
    pub name: String,
    pub connection: ConnectionInfo,
    pub m_code: String,
    pub origin: Origin,
    /// Fallback rule used, when `origin` is `template`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_kind: Option<String>,
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub calculations: Vec<CalculationOutput>,
    pub tables: Vec<TableOutput>,
    pub warnings: Vec<MigrationWarning>,
}

impl MigrationReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One entry of the calculation plan.
enum Step {
    Translate(CalculationNode),
    /// On or above a cycle; kept in the output untranslated.
    Blocked(BlockedNode),
}

impl Step {
    fn node(&self) -> &CalculationNode {
        match self {
            Step::Translate(node) => node,
            Step::Blocked(blocked) => &blocked.node,
        }
    }
}

/// Runs migrations with one configuration and at most one translation client.
pub struct Migrator<T: Transport = HttpTransport> {
    format: FormatOptions,
    fallback: FallbackSelector,
    translator: Option<TranslationClient<T>>,
    warnings: Vec<MigrationWarning>,
    unavailable_reported: bool,
}

impl<T: Transport> Migrator<T> {
    /// `translator` is ignored when translation is disabled in `settings`.
    pub fn new(settings: &Settings, translator: Option<TranslationClient<T>>) -> Self {
        let translator = translator.filter(|_| settings.translation.enabled);
        Self {
            format: settings.format,
            fallback: FallbackSelector::new(settings.fallback.rules()),
            translator,
            warnings: Vec::new(),
            unavailable_reported: false,
        }
    }

    pub fn translator(&self) -> Option<&TranslationClient<T>> {
        self.translator.as_ref()
    }

    /// Warnings recorded since the last [`Migrator::take_warnings`].
    pub fn warnings(&self) -> &[MigrationWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<MigrationWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Migrate a whole workbook.
    pub async fn run(&mut self, workbook: &Workbook) -> MigrationReport {
        let mut graph = workbook.calculation_graph();
        let calculations = self.migrate_calculations(&mut graph, None).await;

        let mut tables = Vec::with_capacity(workbook.datasources.len());
        for source in &workbook.datasources {
            tables.push(self.generate_table_code(source).await);
        }

        let report = MigrationReport {
            calculations,
            tables,
            warnings: self.take_warnings(),
        };
        info!(
            calculations = report.calculations.len(),
            tables = report.tables.len(),
            warnings = report.warnings.len(),
            "migration finished"
        );
        report
    }

    /// Resolve and translate `targets` (every calculation when `None`).
    ///
    /// Each node is translated once, after all of its dependencies, and the
    /// formatted result is written back to the graph. Nodes on or above a
    /// cycle are not translated but still appear in the output with their
    /// current (usually empty) `dax`. Output follows resolution order.
    pub async fn migrate_calculations(
        &mut self,
        graph: &mut CalculationGraph,
        targets: Option<&[String]>,
    ) -> Vec<CalculationOutput> {
        let targets: Vec<String> = match targets {
            Some(targets) => targets.to_vec(),
            None => graph.ids().into_iter().map(str::to_string).collect(),
        };

        let mut plan = Vec::new();
        {
            let mut resolver = DependencyResolver::new(graph);
            for target in &targets {
                match resolver.resolve_partial(target) {
                    Ok(resolution) => {
                        plan.extend(resolution.order.into_iter().map(Step::Translate));
                        plan.extend(resolution.blocked.into_iter().map(Step::Blocked));
                    }
                    // A partial walk only fails on a missing root.
                    Err(_) => self.record(MigrationWarning::MissingCalculation {
                        calculation: target.clone(),
                    }),
                }
            }
        }

        let mut outputs = Vec::with_capacity(plan.len());
        for step in plan {
            let node = step.node();
            for dep in &node.dependencies {
                if !graph.contains(dep) {
                    self.record(MigrationWarning::UnresolvedReference {
                        calculation: node.source_id.clone(),
                        reference: dep.clone(),
                    });
                }
            }

            match &step {
                Step::Translate(node) if !node.is_translated() => {
                    let dax = self.translate_calculation(graph, node).await;
                    if !dax.is_empty() {
                        graph.set_dax_formula(&node.source_id, dax);
                    }
                }
                Step::Translate(_) => {}
                Step::Blocked(blocked) => {
                    let calculation = blocked.node.source_id.clone();
                    let path = blocked.cycle.clone();
                    self.record(if blocked.on_cycle() {
                        MigrationWarning::Cycle { calculation, path }
                    } else {
                        MigrationWarning::DependsOnCycle { calculation, path }
                    });
                }
            }

            if let Some(updated) = graph.get(&step.node().source_id) {
                outputs.push(CalculationOutput::from_node(updated));
            }
        }
        outputs
    }

    async fn translate_calculation(&mut self, graph: &CalculationGraph, node: &CalculationNode) -> String {
        let Some(client) = self.translator.as_ref() else {
            return String::new();
        };

        let mappings: BTreeMap<String, String> = node
            .dependencies
            .iter()
            .filter_map(|dep| graph.get(dep).map(|d| (dep.clone(), d.caption.clone())))
            .collect();
        let mappings = (!mappings.is_empty()).then_some(mappings);

        let result = client
            .translate(&node.formula, &node.table_name, mappings.as_ref())
            .await;
        match result {
            TranslationResult::Translated(dax) => {
                debug!(calculation = %node.source_id, "calculation translated");
                self.format.format(&dax)
            }
            TranslationResult::Unavailable => {
                self.record_unavailable();
                String::new()
            }
            TranslationResult::Failed { status, body } => {
                self.record(MigrationWarning::TranslationFailed {
                    item: node.source_id.clone(),
                    status,
                    message: body,
                });
                String::new()
            }
        }
    }

    /// Classify a datasource and produce its M code.
    ///
    /// Translation is tried first when a client is configured; the fallback
    /// template is used when it is disabled, unavailable or fails. A
    /// datasource no rule matches gets empty code and a warning.
    pub async fn generate_table_code(&mut self, source: &DataSource) -> TableOutput {
        let info = classify(&source.connection, source.relation.as_ref());
        let name = source.table_name().to_string();

        if let Some(client) = self.translator.as_ref() {
            match client.generate_m_code(&info).await {
                TranslationResult::Translated(code) => {
                    debug!(table = %name, "m code translated");
                    return TableOutput {
                        m_code: self.format.format(&code),
                        name,
                        connection: info,
                        origin: Origin::Translated,
                        template_kind: None,
                    };
                }
                TranslationResult::Unavailable => self.record_unavailable(),
                TranslationResult::Failed { status, body } => {
                    self.record(MigrationWarning::TranslationFailed {
                        item: name.clone(),
                        status,
                        message: body,
                    });
                }
            }
        }

        match self.fallback.select(&info) {
            Some(filled) => TableOutput {
                m_code: self.format.format(&filled.code),
                name,
                connection: info,
                origin: Origin::Template,
                template_kind: Some(filled.kind),
            },
            None => {
                self.record(MigrationWarning::NoFallbackMatch {
                    table: name.clone(),
                    class_type: info.class_type.clone(),
                });
                TableOutput {
                    m_code: String::new(),
                    name,
                    connection: info,
                    origin: Origin::None,
                    template_kind: None,
                }
            }
        }
    }

    fn record_unavailable(&mut self) {
        if !self.unavailable_reported {
            self.unavailable_reported = true;
            self.record(MigrationWarning::TranslationUnavailable);
        }
    }

    fn record(&mut self, warning: MigrationWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }
}
